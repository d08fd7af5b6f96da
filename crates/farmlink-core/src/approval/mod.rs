pub mod workflow;

pub use workflow::ApprovalWorkflow;
