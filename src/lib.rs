//! Core implementation of the pregyp command dispatcher
//!
//! pregyp turns a command line such as `pregyp clean install --arch=arm64`
//! into a queue of commands and runs them one after the other, stopping at the
//! first failure. Options come from a config file, the command line and the
//! `npm_config_*` environment npm exports to lifecycle scripts. The commands
//! themselves are provided by handlers bound in a [`Registry`].

use log::debug;

use crate::config_file::{Config, ConfigError};
use crate::logger::LevelCell;
use crate::options::OptionsMap;

pub mod commands;
pub mod config_file;
pub mod diagnostics;
pub mod environment;
pub mod logger;
pub mod options;
pub mod run;

pub use commands::registry::{CommandError, CommandHandler, Registry};
pub use run::{DispatchError, Outcome, Run, RunStatus};

/// Build a run from a process argument list and the given environment.
///
/// Layers, lowest first: config file, command line, inherited environment.
///
/// # Errors
///
/// Returns `ConfigError` if a config file exists but cannot be loaded, or the
/// working directory is unknown.
pub fn load_run_with_env<A, S, E, K, V>(
    argv: A,
    level: LevelCell,
    vars: E,
) -> Result<Run, ConfigError>
where
    A: IntoIterator<Item = S>,
    S: Into<String>,
    E: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut run = Run::new(level);
    run.parse_argv(argv);

    let root = config_file::search_root(run.options())?;
    if let Some((config, path)) = Config::discover(&root)? {
        debug!("Applying options from {}", path.display());
        run.apply_config(config);
    }

    run.merge_env(vars);
    Ok(run)
}

/// Build a run from a process argument list and the process environment.
///
/// # Errors
///
/// Returns `ConfigError` if a config file exists but cannot be loaded.
pub fn load_run<A, S>(argv: A, level: LevelCell) -> Result<Run, ConfigError>
where
    A: IntoIterator<Item = S>,
    S: Into<String>,
{
    load_run_with_env(argv, level, std::env::vars())
}

/// Run `install` with `options` injected over everything else.
///
/// # Errors
///
/// Returns `DispatchError` if the install command fails.
pub async fn install(
    options: OptionsMap,
    registry: &Registry,
    level: LevelCell,
) -> Result<Outcome, DispatchError> {
    let mut run = Run::new(level);
    run.parse_argv([env!("CARGO_PKG_NAME"), "install"]);
    run.merge_process_env();
    run.inject(options);
    run.execute(registry).await
}
