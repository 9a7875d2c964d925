//! Launcher configuration.

pub mod options;
