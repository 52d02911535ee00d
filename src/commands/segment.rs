//! Splits positional arguments into a queue of commands, each followed by
//! the arguments that belong to it.

use log::trace;

use crate::commands::command::{Command, CommandKind, CommandQueue};

/// Alternative spellings for command names.
#[derive(Debug, Clone, Copy)]
pub struct AliasTable<'a> {
    entries: &'a [(&'a str, &'a str)],
}

pub const COMMAND_ALIASES: AliasTable<'static> = AliasTable::new(&[
    ("test-package", "testpackage"),
    ("test-binary", "testbinary"),
]);

impl<'a> AliasTable<'a> {
    #[must_use]
    pub const fn new(entries: &'a [(&'a str, &'a str)]) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, target)| *target)
    }

    /// Map every token through the table. Tokens without an alias pass
    /// through unchanged.
    #[must_use]
    pub fn expand(&self, tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .map(|token| self.resolve(token).map_or_else(|| token.clone(), String::from))
            .collect()
    }
}

/// Split positional arguments into commands.
///
/// Each known command name starts a new command which takes every following
/// token up to the next command name. Tokens before the first command name
/// belong to nothing and are dropped.
#[must_use]
pub fn segment(tokens: &[String], aliases: &AliasTable<'_>) -> CommandQueue {
    let mut queue = CommandQueue::new();
    let mut current: Option<Command> = None;

    for token in aliases.expand(tokens) {
        if let Some(kind) = CommandKind::from_name(&token) {
            queue.extend(current.take());
            current = Some(Command::new(kind, Vec::new()));
        } else if let Some(command) = current.as_mut() {
            command.args.push(token);
        } else {
            trace!("dropping {token:?}, no command before it");
        }
    }
    queue.extend(current);

    queue
}
