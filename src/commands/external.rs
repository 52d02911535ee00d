use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::process::Command as ProcessCommand;

use crate::commands::command::CommandKind;
use crate::commands::registry::{CommandError, CommandHandler};
use crate::environment::ENV_PREFIX;
use crate::run::Run;

/// Command programs are named `pregyp-<command>`.
pub const PROGRAM_PREFIX: &str = "pregyp-";

/// Directory to look for command programs in, instead of `PATH`.
pub const LIBEXEC_VAR: &str = "PREGYP_LIBEXEC";

/// Runs a command by spawning its program.
///
/// The options of the run are exported back as `npm_config_*` variables so a
/// nested dispatcher started by the program sees the same configuration.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: PathBuf,
}

impl ExternalCommand {
    #[must_use]
    pub fn new(kind: CommandKind) -> Self {
        let name = format!("{PROGRAM_PREFIX}{kind}");
        let program = std::env::var_os(LIBEXEC_VAR)
            .map_or_else(|| PathBuf::from(&name), |dir| PathBuf::from(dir).join(&name));
        Self { program }
    }

    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, run: &Run, args: &[String]) -> ProcessCommand {
        let mut command = ProcessCommand::new(&self.program);
        command.args(args).kill_on_drop(true);
        for (key, value) in run.options().iter() {
            command.env(format!("{ENV_PREFIX}{key}"), value.to_string());
        }
        command.env(format!("{ENV_PREFIX}loglevel"), run.level().get().as_str());
        if let Some(dir) = run.options().get_str("directory")
            && !dir.is_empty()
        {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl CommandHandler for ExternalCommand {
    async fn run(
        &self,
        run: &Run,
        command: CommandKind,
        args: &[String],
    ) -> Result<Vec<String>, CommandError> {
        debug!("{command}: spawning {} {args:?}", self.program.display());
        let status = self
            .command(run, args)
            .status()
            .await
            .map_err(|source| CommandError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(Vec::new())
        } else {
            Err(CommandError::Failed {
                program: self.program.clone(),
                status,
            })
        }
    }
}
