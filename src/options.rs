//! Permissive command-line option parsing
//!
//! Flags are parsed against a small table of typed definitions. Flags that
//! aren't defined are kept rather than rejected, so options meant for the
//! commands we dispatch to survive the trip.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fmt;

use log::{trace, warn};
use serde::{Deserialize, Serialize};

/// The type of value a flag carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    String,
}

/// Where an option is meaningful. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Everywhere,
    Configure,
    Build,
    Bin,
    Install,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDefinition {
    pub name: &'static str,
    pub kind: ValueKind,
    pub scope: Scope,
}

impl OptionDefinition {
    const fn new(name: &'static str, kind: ValueKind, scope: Scope) -> Self {
        Self { name, kind, scope }
    }
}

pub const OPTION_DEFS: &[OptionDefinition] = &[
    OptionDefinition::new("help", ValueKind::Boolean, Scope::Everywhere),
    OptionDefinition::new("arch", ValueKind::String, Scope::Configure),
    OptionDefinition::new("debug", ValueKind::Boolean, Scope::Build),
    OptionDefinition::new("directory", ValueKind::String, Scope::Bin),
    OptionDefinition::new("proxy", ValueKind::String, Scope::Install),
    OptionDefinition::new("loglevel", ValueKind::String, Scope::Everywhere),
    OptionDefinition::new("jobs", ValueKind::String, Scope::Build),
];

/// Rewrites allowed per argument before a shorthand is taken literally.
/// Bounds cyclic tables such as `a -> --b, b -> --a`.
const SHORTHAND_DEPTH: usize = 8;

/// Shorthand flags and the tokens they expand to. Expansions are split on
/// whitespace.
pub const SHORTHANDS: &[(&str, &str)] = &[
    ("release", "--no-debug"),
    ("C", "--directory"),
    ("debug", "--debug"),
    ("j", "--jobs"),
    ("silly", "--loglevel=silly"),
    ("verbose", "--loglevel=verbose"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
}

impl OptionValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            OptionValue::Bool(_) => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            OptionValue::Str(_) => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

/// Option name to value, in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionsMap(BTreeMap<String, OptionValue>);

impl OptionsMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Set `key` only if it has no value yet. Returns whether it was set.
    pub fn insert_default(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> bool {
        let mut inserted = false;
        self.0.entry(key.into()).or_insert_with(|| {
            inserted = true;
            value.into()
        });
        inserted
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(OptionValue::as_str)
    }

    /// True when `key` is set to boolean true.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(OptionValue::as_bool).unwrap_or(false)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for OptionsMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for OptionsMap {
    type Item = (String, OptionValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, OptionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Result of parsing: the recognized flags and every positional token left.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub options: OptionsMap,
    pub remain: Vec<String>,
}

/// Parser over a set of definitions and shorthands.
#[derive(Debug, Clone, Copy)]
pub struct OptionParser<'a> {
    defs: &'a [OptionDefinition],
    shorthands: &'a [(&'a str, &'a str)],
}

impl Default for OptionParser<'static> {
    fn default() -> Self {
        Self::new(OPTION_DEFS, SHORTHANDS)
    }
}

/// `-x`, `--xy`: anything that reads as a flag rather than a value.
fn looks_like_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}

impl<'a> OptionParser<'a> {
    #[must_use]
    pub const fn new(defs: &'a [OptionDefinition], shorthands: &'a [(&'a str, &'a str)]) -> Self {
        Self { defs, shorthands }
    }

    fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.defs.iter().find(|d| d.name == name).map(|d| d.kind)
    }

    fn shorthand(&self, name: &str) -> Option<&'a str> {
        self.shorthands
            .iter()
            .find(|(short, _)| *short == name)
            .map(|(_, expansion)| *expansion)
    }

    /// Expand a dash-prefixed shorthand into its replacement tokens.
    fn expand_shorthand(&self, arg: &str) -> Option<Vec<String>> {
        let body = arg.trim_start_matches('-');
        if body.is_empty() || body.contains('=') || self.kind_of(body).is_some() {
            return None;
        }

        if let Some(expansion) = self.shorthand(body) {
            let tokens: Vec<String> = expansion.split_whitespace().map(String::from).collect();
            if tokens.len() == 1 && tokens[0] == arg {
                return None;
            }
            return Some(tokens);
        }

        // Bundled single letters: `-Cj` is `-C -j`
        if !arg.starts_with("--") && body.chars().count() > 1 {
            let mut tokens = Vec::new();
            for letter in body.chars() {
                let expansion = self.shorthand(letter.encode_utf8(&mut [0; 4]))?;
                tokens.extend(expansion.split_whitespace().map(String::from));
            }
            return Some(tokens);
        }

        None
    }

    /// Parse `args` (already stripped of the program path).
    #[must_use]
    pub fn parse<I, S>(&self, args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue: VecDeque<String> = args.into_iter().map(Into::into).collect();
        let mut parsed = ParsedArgs::default();
        let mut budget = (queue.len() + 1) * SHORTHAND_DEPTH;

        while let Some(arg) = queue.pop_front() {
            if arg == "--" {
                parsed.remain.extend(queue.drain(..));
                break;
            }
            if !looks_like_flag(&arg) {
                parsed.remain.push(arg);
                continue;
            }
            if let Some(expansion) = self.expand_shorthand(&arg) {
                if budget > 0 {
                    budget -= 1;
                    trace!("expanded {arg} to {expansion:?}");
                    for token in expansion.into_iter().rev() {
                        queue.push_front(token);
                    }
                    continue;
                }
                warn!("shorthand {arg} keeps expanding, taking it literally");
            }
            self.parse_flag(&arg, &mut queue, &mut parsed.options);
        }

        parsed
    }

    fn parse_flag(&self, arg: &str, queue: &mut VecDeque<String>, options: &mut OptionsMap) {
        let body = arg.trim_start_matches('-');
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (body, None),
        };

        let (name, negated) = match name.strip_prefix("no-") {
            Some(rest) if self.kind_of(name).is_none() => (rest, true),
            _ => (name, false),
        };

        match (self.kind_of(name), inline) {
            (Some(ValueKind::String), _) if negated => {
                options.remove(name);
            }
            (Some(ValueKind::String), Some(value)) => options.insert(name, value),
            (Some(ValueKind::String), None) => {
                let value = match queue.front() {
                    Some(next) if !looks_like_flag(next) && next != "--" => {
                        queue.pop_front().unwrap_or_default()
                    }
                    _ => String::new(),
                };
                options.insert(name, value);
            }
            (Some(ValueKind::Boolean), Some(value)) => {
                let value = !matches!(value.as_str(), "false" | "0" | "");
                options.insert(name, value != negated);
            }
            (None, Some(value)) if !negated => options.insert(name, value),
            (None, Some(value)) => {
                // `--no-foo=bar` has no boolean meaning, keep it verbatim
                options.insert(format!("no-{name}"), value);
            }
            (Some(ValueKind::Boolean) | None, None) => {
                let value = match queue.front().map(String::as_str) {
                    Some("true") => {
                        queue.pop_front();
                        true
                    }
                    Some("false") => {
                        queue.pop_front();
                        false
                    }
                    _ => true,
                };
                options.insert(name, value != negated);
            }
        }
    }
}

/// Parse with the built-in definitions and shorthands.
#[must_use]
pub fn parse_argv<I, S>(args: I) -> ParsedArgs
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    OptionParser::default().parse(args)
}
