//! Rerun launchers.

pub mod command;

pub use command::CommandRerunLauncher;
