pub mod types;
pub mod workflow;

pub use types::{SubmissionState, SubmitOutcome, TicketDraft};
pub use workflow::SubmissionWorkflow;
