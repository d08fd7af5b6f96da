pub mod merge;
pub mod screen;
pub mod store;

pub use merge::merge_messages;
pub use screen::ConversationScreen;
pub use store::MessageStore;
