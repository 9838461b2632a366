pub mod processing_state;

pub use processing_state::{ProcessingState, ProcessingStatus};
