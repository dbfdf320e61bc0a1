//! Presentation of scan progress and results.
//!
//! This module handles:
//! - Colored console output
//! - Progress bar driven by the scan's progress callback

pub mod console;

pub use console::ConsoleOutput;
