//! A single dispatcher session: parsed options, the command queue, and the
//! sequential executor that drains it.

use std::fmt::Write as _;

use log::{debug, error, info};
use thiserror::Error;

use crate::commands::command::{Command, CommandKind, CommandQueue};
use crate::commands::registry::{CommandError, Registry};
use crate::commands::segment::{COMMAND_ALIASES, segment};
use crate::config_file::Config;
use crate::diagnostics::{RUNTIME_VERSION, Report};
use crate::environment;
use crate::logger::LevelCell;
use crate::options::{OptionParser, OptionsMap};

/// Leading entries of a process argument list that are not arguments: the
/// program path.
pub const RESERVED_ARGS: usize = 1;

/// Name and version reported in usage and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
}

impl Default for PackageInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// What a successful run produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Commands that completed, in execution order.
    pub completed: Vec<CommandKind>,
    /// Extra values handed back by commands, in execution order.
    pub output: Vec<(CommandKind, Vec<String>)>,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{command} error")]
    Command {
        command: CommandKind,
        #[source]
        source: CommandError,
        report: Box<Report>,
    },
    #[error("run already started (status {0:?})")]
    AlreadyStarted(RunStatus),
}

impl DispatchError {
    /// The diagnostics emitted for a failed command.
    #[must_use]
    pub fn report(&self) -> Option<&Report> {
        match self {
            DispatchError::Command { report, .. } => Some(report.as_ref()),
            DispatchError::AlreadyStarted(_) => None,
        }
    }
}

/// State of one dispatcher session. Not shared between runs, and not reused
/// once executed.
#[derive(Debug)]
pub struct Run {
    options: OptionsMap,
    argv: Vec<String>,
    todo: CommandQueue,
    invoked: Vec<String>,
    package: PackageInfo,
    level: LevelCell,
    status: RunStatus,
}

impl Run {
    #[must_use]
    pub fn new(level: LevelCell) -> Self {
        Self {
            options: OptionsMap::new(),
            argv: Vec::new(),
            todo: CommandQueue::new(),
            invoked: Vec::new(),
            package: PackageInfo::default(),
            level,
            status: RunStatus::Idle,
        }
    }

    #[must_use]
    pub fn with_package(mut self, package: PackageInfo) -> Self {
        self.package = package;
        self
    }

    /// Parse a full process argument list and build the command queue.
    ///
    /// Replaces any options, positional arguments and queued commands from a
    /// previous call.
    pub fn parse_argv<I, S>(&mut self, argv: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invoked = argv.into_iter().map(Into::into).collect();
        let parsed = OptionParser::default().parse(self.invoked.iter().skip(RESERVED_ARGS).cloned());
        self.options = parsed.options;
        self.argv = parsed.remain;
        self.todo = segment(&self.argv, &COMMAND_ALIASES);
        debug!(
            "queued {:?}",
            self.todo.iter().map(|c| c.name).collect::<Vec<_>>()
        );

        if let Some(name) = self.options.get_str("loglevel")
            && !name.is_empty()
        {
            self.level.set_named(name);
        }
    }

    /// Layer config file options under what is already set.
    pub fn apply_config(&mut self, config: Config) {
        for (name, value) in config.into_options() {
            self.options.insert_default(name, value);
        }
    }

    /// Fold inherited `npm_config_*` variables into the options.
    pub fn merge_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        environment::merge_env(&mut self.options, &self.argv, &self.level, vars);
    }

    pub fn merge_process_env(&mut self) {
        self.merge_env(std::env::vars());
    }

    /// Overwrite options directly, bypassing argument parsing.
    pub fn inject(&mut self, options: OptionsMap) {
        for (name, value) in options {
            self.options.insert(name, value);
        }
        if let Some(name) = self.options.get_str("loglevel")
            && !name.is_empty()
        {
            self.level.set_named(name);
        }
    }

    #[must_use]
    pub fn options(&self) -> &OptionsMap {
        &self.options
    }

    /// Positional arguments left after option parsing.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The argument list as originally given, program path included.
    #[must_use]
    pub fn invoked(&self) -> &[String] {
        &self.invoked
    }

    #[must_use]
    pub fn todo(&self) -> &CommandQueue {
        &self.todo
    }

    #[must_use]
    pub fn package(&self) -> &PackageInfo {
        &self.package
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.package.version
    }

    #[must_use]
    pub fn level(&self) -> &LevelCell {
        &self.level
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Run every queued command in order, stopping at the first failure.
    ///
    /// Control is yielded back to the runtime between commands. A failing
    /// command has its diagnostics emitted before the error is returned, and
    /// the commands behind it are dropped.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Command` for the first failing command, or
    /// `DispatchError::AlreadyStarted` if this run was executed before.
    pub async fn execute(&mut self, registry: &Registry) -> Result<Outcome, DispatchError> {
        if self.status != RunStatus::Idle {
            return Err(DispatchError::AlreadyStarted(self.status));
        }
        self.status = RunStatus::Running;

        let mut outcome = Outcome::default();
        while let Some(command) = self.todo.pop_front() {
            match registry.dispatch(self, &command).await {
                Ok(values) => {
                    if !values.is_empty() {
                        outcome.output.push((command.name, values));
                    }
                    outcome.completed.push(command.name);
                    tokio::task::yield_now().await;
                }
                Err(source) => return Err(self.fail(&command, source)),
            }
        }

        self.status = RunStatus::Succeeded;
        info!("ok");
        Ok(outcome)
    }

    fn fail(&mut self, command: &Command, source: CommandError) -> DispatchError {
        self.status = RunStatus::Failed;
        if !self.todo.is_empty() {
            debug!("abandoning {} queued commands", self.todo.len());
            self.todo.clear();
        }

        let report = Report::collect(self, command.name, &source);
        report.emit();
        error!("not ok");

        DispatchError::Command {
            command: command.name,
            source,
            report: Box::new(report),
        }
    }

    /// Usage text listing every command.
    #[must_use]
    pub fn usage(&self) -> String {
        let name = &self.package.name;
        let mut usage = format!("\n  Usage: {name} <command> [options]\n\n  where <command> is one of:\n");
        for kind in CommandKind::ALL {
            let _ = writeln!(usage, "    - {kind} - {}", kind.usage());
        }
        let location = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let _ = write!(
            usage,
            "\n{name}@{}  {location}\n{RUNTIME_VERSION}",
            self.package.version
        );
        usage
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::commands::registry::CommandHandler;

    /// Records start and completion of every command it handles.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        fail: Option<CommandKind>,
    }

    #[async_trait]
    impl CommandHandler for Recorder {
        async fn run(
            &self,
            _run: &Run,
            command: CommandKind,
            args: &[String],
        ) -> Result<Vec<String>, CommandError> {
            self.events.lock().push(format!("start {command}"));
            tokio::task::yield_now().await;
            if self.fail == Some(command) {
                self.events.lock().push(format!("failed {command}"));
                return Err(CommandError::Message(format!("{command} broke")));
            }
            self.events.lock().push(format!("done {command}"));
            Ok(args.to_vec())
        }
    }

    fn registry(recorder: &Arc<Recorder>) -> Registry {
        let handler: Arc<dyn CommandHandler> = recorder.clone();
        Registry::new(|_| Arc::clone(&handler))
    }

    fn run_for(args: &[&str]) -> Run {
        let mut run = Run::new(LevelCell::default());
        run.parse_argv(std::iter::once("pregyp").chain(args.iter().copied()));
        run
    }

    #[tokio::test]
    async fn test_empty_queue_succeeds() {
        let recorder = Arc::new(Recorder::default());
        let mut run = run_for(&["nothing", "here"]);
        assert!(run.todo().is_empty());

        let outcome = run.execute(&registry(&recorder)).await.unwrap();
        assert!(outcome.completed.is_empty());
        assert_eq!(run.status(), RunStatus::Succeeded);
        assert!(recorder.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_commands_run_in_order() {
        let recorder = Arc::new(Recorder::default());
        let mut run = run_for(&["install", "build"]);

        let outcome = run.execute(&registry(&recorder)).await.unwrap();
        assert_eq!(outcome.completed, vec![CommandKind::Install, CommandKind::Build]);
        assert_eq!(
            *recorder.events.lock(),
            vec!["start install", "done install", "start build", "done build"]
        );
    }

    #[tokio::test]
    async fn test_flags_are_not_command_args() {
        let recorder = Arc::new(Recorder::default());
        let mut run = run_for(&["install", "--some-flag", "build", "foo", "bar"]);
        assert!(run.options().flag("some-flag"));

        let outcome = run.execute(&registry(&recorder)).await.unwrap();
        assert_eq!(
            outcome.output,
            vec![(CommandKind::Build, vec!["foo".to_string(), "bar".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_failure_stops_the_queue() {
        let recorder = Arc::new(Recorder {
            fail: Some(CommandKind::Build),
            ..Recorder::default()
        });
        let mut run = run_for(&["install", "build", "package"]);

        let err = run.execute(&registry(&recorder)).await.unwrap_err();
        match &err {
            DispatchError::Command { command, report, .. } => {
                assert_eq!(*command, CommandKind::Build);
                assert_eq!(report.failed_command, CommandKind::Build);
                assert_eq!(report.detail, "build broke");
                assert!(report.command.contains("\"install\""));
                assert!(!report.system.is_empty());
            }
            other => panic!("Expected Command error, got: {other:?}"),
        }
        assert_eq!(
            *recorder.events.lock(),
            vec!["start install", "done install", "start build", "failed build"]
        );
        assert_eq!(run.status(), RunStatus::Failed);
        assert!(run.todo().is_empty());
    }

    #[tokio::test]
    async fn test_run_is_not_reusable() {
        let recorder = Arc::new(Recorder::default());
        let registry = registry(&recorder);
        let mut run = run_for(&["clean"]);
        run.execute(&registry).await.unwrap();

        match run.execute(&registry).await {
            Err(DispatchError::AlreadyStarted(RunStatus::Succeeded)) => {}
            other => panic!("Expected AlreadyStarted, got: {other:?}"),
        }
        assert_eq!(recorder.events.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_commands_run_twice() {
        let recorder = Arc::new(Recorder::default());
        let mut run = run_for(&["install", "install"]);
        let outcome = run.execute(&registry(&recorder)).await.unwrap();
        assert_eq!(outcome.completed, vec![CommandKind::Install, CommandKind::Install]);
    }

    #[test]
    fn test_config_sits_under_flags() {
        let mut run = run_for(&["--arch", "x64", "build"]);
        let config: Config =
            serde_json::from_str(r#"{"options": {"arch": "ia32", "proxy": "http://p"}}"#).unwrap();
        run.apply_config(config);
        assert_eq!(run.options().get_str("arch"), Some("x64"));
        assert_eq!(run.options().get_str("proxy"), Some("http://p"));
    }

    #[test]
    fn test_program_path_is_not_a_command() {
        let run = run_for(&[]);
        assert!(run.todo().is_empty());
        let mut run = Run::new(LevelCell::default());
        run.parse_argv(["/usr/bin/install"]);
        assert!(run.todo().is_empty());
        assert_eq!(run.invoked(), ["/usr/bin/install"]);
    }

    #[test]
    fn test_usage_lists_every_command() {
        let run = Run::new(LevelCell::default()).with_package(PackageInfo {
            name: "prebuild-tool".to_string(),
            version: "2.3.4".to_string(),
        });
        let usage = run.usage();
        for kind in CommandKind::ALL {
            assert!(usage.contains(&format!("    - {kind} - ")), "missing {kind}");
        }
        assert!(usage.contains("Usage: prebuild-tool <command>"));
        assert!(usage.contains("prebuild-tool@2.3.4"));
    }
}
