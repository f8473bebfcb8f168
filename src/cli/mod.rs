//! Command-line interface

pub mod args;
pub mod runner;

pub use args::{Cli, Command, RegistryArgs};
pub use runner::run;
