//! The closed set of commands, how a command line is split into them, and the
//! handlers that run them.
//!
//! Positional arguments are segmented into a queue of [`command::Command`]s.
//! Each command is executed by the [`registry::CommandHandler`] the
//! [`registry::Registry`] binds to its name; by default that handler spawns a
//! `pregyp-<command>` program.

pub mod command;
pub mod external;
pub mod registry;
pub mod segment;
