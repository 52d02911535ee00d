//! Command names, their usage text and the queue entries built from them.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

/// The closed set of commands the dispatcher knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Clean,
    Install,
    Reinstall,
    Build,
    Rebuild,
    Package,
    TestPackage,
    Publish,
    Unpublish,
    Info,
    TestBinary,
}

impl CommandKind {
    pub const COUNT: usize = 11;

    /// Every command, in usage order.
    pub const ALL: [CommandKind; Self::COUNT] = [
        CommandKind::Clean,
        CommandKind::Install,
        CommandKind::Reinstall,
        CommandKind::Build,
        CommandKind::Rebuild,
        CommandKind::Package,
        CommandKind::TestPackage,
        CommandKind::Publish,
        CommandKind::Unpublish,
        CommandKind::Info,
        CommandKind::TestBinary,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            CommandKind::Clean => "clean",
            CommandKind::Install => "install",
            CommandKind::Reinstall => "reinstall",
            CommandKind::Build => "build",
            CommandKind::Rebuild => "rebuild",
            CommandKind::Package => "package",
            CommandKind::TestPackage => "testpackage",
            CommandKind::Publish => "publish",
            CommandKind::Unpublish => "unpublish",
            CommandKind::Info => "info",
            CommandKind::TestBinary => "testbinary",
        }
    }

    /// One-line description shown in the usage text.
    #[must_use]
    pub const fn usage(self) -> &'static str {
        match self {
            CommandKind::Clean => "Removes the directory holding the compiled binary",
            CommandKind::Install => "Installs a prebuilt binary, building from source if none fits",
            CommandKind::Reinstall => "Runs \"clean\" and \"install\" at once",
            CommandKind::Build => "Compiles the binary from source",
            CommandKind::Rebuild => "Runs \"clean\" and \"build\" at once",
            CommandKind::Package => "Packs the binary and its directory into a staged tarball",
            CommandKind::TestPackage => "Checks that the staged tarball is valid",
            CommandKind::Publish => "Publishes the staged tarball",
            CommandKind::Unpublish => "Removes a published tarball",
            CommandKind::Info => "Lists published binaries",
            CommandKind::TestBinary => "Checks that the installed binary loads",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Position in [`CommandKind::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command to run and the arguments that followed it on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: CommandKind,
    pub args: Vec<String>,
}

impl Command {
    #[must_use]
    pub fn new(name: CommandKind, args: Vec<String>) -> Self {
        Self { name, args }
    }
}

/// Commands waiting to run, front first.
pub type CommandQueue = VecDeque<Command>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_index() {
        for (i, kind) in CommandKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(CommandKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(CommandKind::from_name("configure"), None);
        assert_eq!(CommandKind::from_name("Install"), None);
    }
}
