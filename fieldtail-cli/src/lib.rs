//! fieldtail operator CLI library.
//!
//! Exposes the argument definitions, output rendering and command
//! handlers so they can be exercised from integration tests.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
