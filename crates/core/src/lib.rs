//! Domain logic for the scribe transcription client.
//!
//! Everything in this crate is pure: status projection, result
//! materialization, submission options and time estimation. Network I/O
//! and task tracking live in `scribe-client`.

pub mod error;
pub mod estimation;
pub mod lifecycle;
pub mod results;
pub mod status;
pub mod submission;
pub mod types;
