//! Inherit configuration from `npm_config_*` environment variables
//!
//! When we run as part of an npm lifecycle script, npm exports its own
//! configuration as environment variables. Those are folded into the options.

use log::{debug, trace};

use crate::logger::LevelCell;
use crate::options::{OptionValue, OptionsMap};

/// Prefix marking an inherited configuration variable.
pub const ENV_PREFIX: &str = "npm_config_";

/// Option name an inherited variable maps to, if it carries the prefix.
#[must_use]
pub fn option_name(key: &str) -> Option<&str> {
    key.strip_prefix(ENV_PREFIX).filter(|name| !name.is_empty())
}

/// Fold prefixed variables from `vars` into `options`.
///
/// Inherited values overwrite existing options, with two exceptions:
/// `loglevel` goes straight to `level`, and `argv` is only taken when `remain`
/// (the positional arguments from the command line) is empty.
///
/// A `loglevel` already in `options` is applied first, so an inherited
/// `loglevel` wins over it.
pub fn merge_env<I, K, V>(options: &mut OptionsMap, remain: &[String], level: &LevelCell, vars: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut inherited_level = None;

    for (key, value) in vars {
        let Some(name) = option_name(key.as_ref()) else {
            continue;
        };
        let value: String = value.into();
        match name {
            "loglevel" => inherited_level = Some(value),
            "argv" if !remain.is_empty() => {
                debug!(
                    "ignoring inherited argv, {} positional arguments given",
                    remain.len()
                );
            }
            _ => {
                trace!("inherited {name}={value}");
                options.insert(name, OptionValue::Str(value));
            }
        }
    }

    if let Some(name) = options.get_str("loglevel")
        && !name.is_empty()
    {
        level.set_named(name);
    }
    if let Some(name) = inherited_level {
        level.set_named(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::LogLevel;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_prefixed_vars_overwrite_options() {
        let mut options = OptionsMap::new();
        options.insert("arch", "x64");
        let level = LevelCell::default();
        merge_env(
            &mut options,
            &[],
            &level,
            vars(&[
                ("npm_config_arch", "arm64"),
                ("npm_config_proxy", "http://proxy"),
                ("HOME", "/root"),
                ("npm_config_", "empty"),
            ]),
        );
        assert_eq!(options.get_str("arch"), Some("arm64"));
        assert_eq!(options.get_str("proxy"), Some("http://proxy"));
        assert_eq!(options.len(), 2);
    }

    #[test]
    fn test_argv_ignored_when_positionals_given() {
        let mut options = OptionsMap::new();
        let level = LevelCell::default();
        let remain = vec!["install".to_string()];
        merge_env(
            &mut options,
            &remain,
            &level,
            vars(&[("npm_config_argv", r#"{"remain":["build"]}"#)]),
        );
        assert!(!options.contains_key("argv"));
    }

    #[test]
    fn test_argv_taken_without_positionals() {
        let mut options = OptionsMap::new();
        let level = LevelCell::default();
        merge_env(
            &mut options,
            &[],
            &level,
            vars(&[("npm_config_argv", r#"{"remain":[]}"#)]),
        );
        assert_eq!(options.get_str("argv"), Some(r#"{"remain":[]}"#));
    }

    #[test]
    fn test_inherited_loglevel_wins() {
        let mut options = OptionsMap::new();
        options.insert("loglevel", "info");
        let level = LevelCell::default();
        merge_env(
            &mut options,
            &[],
            &level,
            vars(&[("npm_config_loglevel", "silly")]),
        );
        assert_eq!(level.get(), LogLevel::Silly);
        // The inherited level never enters the options
        assert_eq!(options.get_str("loglevel"), Some("info"));
    }

    #[test]
    fn test_option_loglevel_applied() {
        let mut options = OptionsMap::new();
        options.insert("loglevel", "warn");
        let level = LevelCell::default();
        merge_env(&mut options, &[], &level, Vec::<(String, String)>::new());
        assert_eq!(level.get(), LogLevel::Warn);
    }
}
