//! Failure report emitted when a command fails

use std::error::Error;

use log::{Level, debug, error, log_enabled, trace};
use serde::Serialize;
use sysinfo::System;

use crate::commands::command::CommandKind;
use crate::run::Run;

/// `rustc -V` of the compiler this binary was built with.
pub const RUNTIME_VERSION: &str = env!("PREGYP_RUSTC_VERSION");

/// Everything needed to reproduce a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub system: String,
    pub command: String,
    pub cwd: String,
    pub runtime: String,
    pub package: String,
    pub package_version: String,
    pub failed_command: CommandKind,
    pub detail: String,
}

/// `name release`, falling back to the compile-time OS name.
#[must_use]
pub fn system_description() -> String {
    let name = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
    match System::kernel_version() {
        Some(release) => format!("{name} {release}"),
        None => name,
    }
}

/// Quote every token as a JSON string and join them with spaces.
#[must_use]
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| serde_json::to_string(arg).unwrap_or_else(|_| format!("{arg:?}")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The error and its sources, outermost first.
#[must_use]
pub fn error_chain(error: &dyn Error) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

impl Report {
    /// Gather the report for `failed` failing with `error` during `run`.
    #[must_use]
    pub fn collect(run: &Run, failed: CommandKind, error: &dyn Error) -> Self {
        let cwd = std::env::current_dir()
            .map_or_else(|e| format!("<unknown: {e}>"), |p| p.display().to_string());
        Self {
            system: system_description(),
            command: quote_args(run.invoked()),
            cwd,
            runtime: RUNTIME_VERSION.to_string(),
            package: run.package().name.clone(),
            package_version: format!("v{}", run.package().version),
            failed_command: failed,
            detail: error_chain(error),
        }
    }

    /// Heading and message pairs, in the order they are emitted.
    #[must_use]
    pub fn lines(&self) -> Vec<(String, String)> {
        vec![
            ("System".to_string(), self.system.clone()),
            ("command".to_string(), self.command.clone()),
            ("cwd".to_string(), self.cwd.clone()),
            ("rustc -V".to_string(), self.runtime.clone()),
            (format!("{} -v", self.package), self.package_version.clone()),
            (format!("{} error", self.failed_command), self.detail.clone()),
        ]
    }

    /// The whole report as a single JSON object.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which only happens for non-string map keys.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Log every line at error level, then the JSON form at trace level.
    pub fn emit(&self) {
        for (heading, message) in self.lines() {
            error!("{heading} {message}");
        }
        if log_enabled!(Level::Trace) {
            match self.to_json() {
                Ok(json) => trace!("report {json}"),
                Err(e) => debug!("report not serializable: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::registry::CommandError;

    #[test]
    fn test_quote_args() {
        let args = vec![
            "pregyp".to_string(),
            "install".to_string(),
            "--proxy=a b".to_string(),
            "say \"hi\"".to_string(),
        ];
        assert_eq!(
            quote_args(&args),
            r#""pregyp" "install" "--proxy=a b" "say \"hi\"""#
        );
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let error = CommandError::Spawn {
            program: "pregyp-build".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(
            error_chain(&error),
            "unable to start `pregyp-build`: not found"
        );
    }

    #[test]
    fn test_lines_end_with_failure() {
        let report = Report {
            system: "Linux 6.1".to_string(),
            command: "\"pregyp\"".to_string(),
            cwd: "/tmp".to_string(),
            runtime: "rustc 1.95.0".to_string(),
            package: "pregyp".to_string(),
            package_version: "v0.1.0".to_string(),
            failed_command: CommandKind::Build,
            detail: "boom".to_string(),
        };
        let lines = report.lines();
        assert_eq!(lines[0].0, "System");
        assert_eq!(lines[4], ("pregyp -v".to_string(), "v0.1.0".to_string()));
        assert_eq!(
            lines.last(),
            Some(&("build error".to_string(), "boom".to_string()))
        );
    }

    #[test]
    fn test_runtime_is_the_building_compiler() {
        assert!(RUNTIME_VERSION.starts_with("rustc "));
        assert_ne!(RUNTIME_VERSION, env!("CARGO_PKG_RUST_VERSION"));
        assert_ne!(
            RUNTIME_VERSION,
            format!("rustc {}", env!("CARGO_PKG_RUST_VERSION"))
        );
    }

    #[test]
    fn test_json_form() {
        let report = Report {
            system: "Linux 6.1".to_string(),
            command: "\"pregyp\" \"testpackage\"".to_string(),
            cwd: "/tmp".to_string(),
            runtime: "rustc 1.95.0".to_string(),
            package: "pregyp".to_string(),
            package_version: "v0.1.0".to_string(),
            failed_command: CommandKind::TestPackage,
            detail: "boom".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["failed_command"], "testpackage");
        assert_eq!(value["runtime"], "rustc 1.95.0");
        assert_eq!(value["detail"], "boom");
    }
}
