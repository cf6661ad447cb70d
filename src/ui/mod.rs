//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All command output goes through this module so quiet mode and `--json`
//! behave the same everywhere.

pub mod output;
