//! Local-first time tracker for the terminal. Entries and projects are kept in a JSON
//! document inside the application state directory. Nothing leaves the machine.
//!

pub mod cli;
pub mod fs;
pub mod report;
pub mod storage;
pub mod timer;
pub mod tracking;
pub mod utils;
