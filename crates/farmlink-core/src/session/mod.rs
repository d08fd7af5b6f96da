pub mod resolver;

pub use resolver::{SessionResolver, derive_session_id};
