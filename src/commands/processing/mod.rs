pub mod process_batch_command;

pub use process_batch_command::{PartYield, ProcessBatchCommand, ProcessingOutcome};
