//! Log processing for fixprint
//!
//! This crate provides the line input, interrupt handling, the decode loop,
//! the per type summary and the final report.

mod input;
mod interrupt;
mod report;
mod stream;
mod summary;

pub use input::{InputError, InputSource, MAX_LINE_LEN, RawLine};
pub use interrupt::InterruptFlag;
pub use report::{Report, ReportError};
pub use stream::{LoopState, RunOutcome, StopReason, StreamError, StreamLoop};
pub use summary::MessageSummary;

// Re-export types used in our public API
pub use fixprint_types::{DecodedMessage, Decoder, TypeRegistry};
