use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;

use crate::commands::command::{Command, CommandKind};
use crate::commands::external::ExternalCommand;
use crate::run::Run;

/// Errors a command handler can report
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unable to start `{}`", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{}` failed with {status}", .program.display())]
    Failed { program: PathBuf, status: ExitStatus },
    #[error("{0}")]
    Message(String),
}

/// Implementation of one command.
///
/// Resolving with `Ok` completes the command, optionally with values to hand
/// back to the caller. Resolving with `Err` fails the whole run.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run `command` with its arguments.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` when the command fails.
    async fn run(
        &self,
        run: &Run,
        command: CommandKind,
        args: &[String],
    ) -> Result<Vec<String>, CommandError>;
}

/// One handler per known command, fixed once built.
pub struct Registry {
    handlers: [Arc<dyn CommandHandler>; CommandKind::COUNT],
}

impl Registry {
    /// Bind a handler to every command in [`CommandKind::ALL`].
    pub fn new<F>(resolve: F) -> Self
    where
        F: FnMut(CommandKind) -> Arc<dyn CommandHandler>,
    {
        Self {
            handlers: CommandKind::ALL.map(resolve),
        }
    }

    /// Registry delegating every command to its `pregyp-<command>` program.
    #[must_use]
    pub fn external() -> Self {
        Self::new(|kind| -> Arc<dyn CommandHandler> { Arc::new(ExternalCommand::new(kind)) })
    }

    /// Replace the handler bound to `kind`.
    #[must_use]
    pub fn with_handler(mut self, kind: CommandKind, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers[kind.index()] = handler;
        self
    }

    #[must_use]
    pub fn handler(&self, kind: CommandKind) -> &Arc<dyn CommandHandler> {
        &self.handlers[kind.index()]
    }

    /// Hand `command` to its handler.
    ///
    /// # Errors
    ///
    /// Returns whatever `CommandError` the handler reports.
    pub async fn dispatch(&self, run: &Run, command: &Command) -> Result<Vec<String>, CommandError> {
        debug!("command {} {:?}", command.name, command.args);
        self.handler(command.name)
            .run(run, command.name, &command.args)
            .await
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("commands", &CommandKind::ALL)
            .finish_non_exhaustive()
    }
}
