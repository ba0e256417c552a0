//! Interactive console

pub mod commands;
pub mod console;

pub use console::Console;
