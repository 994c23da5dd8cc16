//! Library half of the `scribe` command-line client.
//!
//! Holds the terminal rendering of tracker events and results so it can
//! be tested without a backend.

pub mod output;
