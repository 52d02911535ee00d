use std::fmt;
use std::io::{IsTerminal, Write};
use std::str::FromStr;
use std::sync::Arc;

use anstyle::{AnsiColor, Reset, Style};
use log::{Level, LevelFilter, Log, Metadata, Record, warn};
use parking_lot::Mutex;
use thiserror::Error;

/// Prefix written before every log line, to tell our output apart from the
/// output of the commands we spawn.
pub const HEADING: &str = "pregyp";

const ERROR_STYLE: Style = Style::new()
    .fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)))
    .bold();
const WARN_STYLE: Style = Style::new()
    .fg_color(Some(anstyle::Color::Ansi(AnsiColor::Black)))
    .bg_color(Some(anstyle::Color::Ansi(AnsiColor::Yellow)));
const INFO_STYLE: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Green)));
const VERBOSE_STYLE: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Blue)));
const SILLY_STYLE: Style = Style::new().invert();
const HEADING_STYLE: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::White)));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level `{0}`")]
pub struct UnknownLevel(pub String);

/// npm-style verbosity names, ordered from quietest to noisiest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    Notice,
    Http,
    Timing,
    #[default]
    Info,
    Verbose,
    Silly,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Silent => "silent",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Notice => "notice",
            LogLevel::Http => "http",
            LogLevel::Timing => "timing",
            LogLevel::Info => "info",
            LogLevel::Verbose => "verbose",
            LogLevel::Silly => "silly",
        }
    }

    /// The `log` filter this level lets through.
    #[must_use]
    pub const fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Notice | LogLevel::Http | LogLevel::Timing | LogLevel::Info => {
                LevelFilter::Info
            }
            LogLevel::Verbose => LevelFilter::Debug,
            LogLevel::Silly => LevelFilter::Trace,
        }
    }

    #[must_use]
    pub const fn from_filter(filter: LevelFilter) -> Self {
        match filter {
            LevelFilter::Off => LogLevel::Silent,
            LevelFilter::Error => LogLevel::Error,
            LevelFilter::Warn => LogLevel::Warn,
            LevelFilter::Info => LogLevel::Info,
            LevelFilter::Debug => LogLevel::Verbose,
            LevelFilter::Trace => LogLevel::Silly,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "notice" => Ok(LogLevel::Notice),
            "http" => Ok(LogLevel::Http),
            "timing" => Ok(LogLevel::Timing),
            "info" => Ok(LogLevel::Info),
            "verbose" => Ok(LogLevel::Verbose),
            "silly" => Ok(LogLevel::Silly),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// Shared handle to the active verbosity.
///
/// The option parser and environment merger write to it before a run starts,
/// the logger reads it on every record. Clones point at the same cell.
#[derive(Debug, Clone, Default)]
pub struct LevelCell(Arc<Mutex<LogLevel>>);

impl LevelCell {
    #[must_use]
    pub fn new(level: LogLevel) -> Self {
        Self(Arc::new(Mutex::new(level)))
    }

    /// Seed the level from `RUST_LOG`, falling back to `info`.
    #[must_use]
    pub fn from_env() -> Self {
        let level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse::<LevelFilter>().ok())
            .map_or(LogLevel::Info, LogLevel::from_filter);
        Self::new(level)
    }

    #[must_use]
    pub fn get(&self) -> LogLevel {
        *self.0.lock()
    }

    pub fn set(&self, level: LogLevel) {
        *self.0.lock() = level;
    }

    /// Set the level from its npm name. Unknown names are reported and the
    /// current level is kept. Returns whether the level changed.
    pub fn set_named(&self, name: &str) -> bool {
        match name.parse::<LogLevel>() {
            Ok(level) => {
                self.set(level);
                true
            }
            Err(e) => {
                warn!("{e}, keeping `{}`", self.get());
                false
            }
        }
    }

    #[must_use]
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.get().filter()
    }
}

struct PregypLogger {
    level: LevelCell,
    color: bool,
}

impl PregypLogger {
    fn tag(level: Level) -> (&'static str, Style) {
        match level {
            Level::Error => ("ERR!", ERROR_STYLE),
            Level::Warn => ("WARN", WARN_STYLE),
            Level::Info => ("info", INFO_STYLE),
            Level::Debug => ("verb", VERBOSE_STYLE),
            Level::Trace => ("sill", SILLY_STYLE),
        }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.color {
            format!("{style}{text}{Reset}")
        } else {
            text.to_string()
        }
    }
}

impl Log for PregypLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.level.enabled(metadata.level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let (tag, style) = Self::tag(record.level());
        let _ = writeln!(
            std::io::stderr().lock(),
            "{} {} {}",
            self.paint(HEADING_STYLE, HEADING),
            self.paint(style, tag),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the stderr logger, filtered by `level`.
///
/// # Errors
///
/// Returns `SetLoggerError` if a logger was already installed.
pub fn init(level: LevelCell) -> Result<(), log::SetLoggerError> {
    let logger = PregypLogger {
        level,
        color: std::io::stderr().is_terminal(),
    };
    log::set_boxed_logger(Box::new(logger))?;
    // Filtering happens against the cell, which can change after init
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}
