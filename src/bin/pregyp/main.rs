use std::process::ExitCode;

use log::debug;

use pregyp::logger::{self, LevelCell};
use pregyp::{Registry, Run};

/// What to do when the command line names no command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Idle {
    Version,
    Help,
    Usage,
}

impl Idle {
    /// `None` when there are commands to run; the flags only count otherwise.
    fn from_run(run: &Run) -> Option<Self> {
        if !run.todo().is_empty() {
            return None;
        }
        let options = run.options();
        Some(if options.flag("version") || options.flag("v") {
            Idle::Version
        } else if options.flag("help") || options.flag("h") {
            Idle::Help
        } else {
            Idle::Usage
        })
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let level = LevelCell::from_env();
    logger::init(level.clone())?;

    let mut run = pregyp::load_run(std::env::args(), level)?;

    if let Some(idle) = Idle::from_run(&run) {
        return Ok(match idle {
            Idle::Version => {
                println!("v{}", run.version());
                ExitCode::SUCCESS
            }
            Idle::Help => {
                println!("{}", run.usage());
                ExitCode::SUCCESS
            }
            Idle::Usage => {
                println!("{}", run.usage());
                ExitCode::FAILURE
            }
        });
    }

    let registry = Registry::external();
    match run.execute(&registry).await {
        Ok(outcome) => {
            for (_, values) in &outcome.output {
                println!("{}", values.join(" "));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            // Diagnostics were already emitted by the executor
            debug!("run failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_for(args: &[&str]) -> Option<Idle> {
        let mut run = Run::new(LevelCell::default());
        run.parse_argv(std::iter::once("pregyp").chain(args.iter().copied()));
        Idle::from_run(&run)
    }

    #[test]
    fn test_short_and_long_flags() {
        assert_eq!(idle_for(&["-h"]), Some(Idle::Help));
        assert_eq!(idle_for(&["--help"]), Some(Idle::Help));
        assert_eq!(idle_for(&["-v"]), Some(Idle::Version));
        assert_eq!(idle_for(&["--version"]), Some(Idle::Version));
        assert_eq!(idle_for(&[]), Some(Idle::Usage));
        assert_eq!(idle_for(&["bogus"]), Some(Idle::Usage));
    }

    #[test]
    fn test_flags_ignored_with_queued_commands() {
        assert_eq!(idle_for(&["--help", "install"]), None);
        assert_eq!(idle_for(&["-v", "build"]), None);
        assert_eq!(idle_for(&["clean", "-h"]), None);
    }
}
