use std::fmt;

use thiserror::Error;

use crate::limits::TimeConfig;

pub const HASH: &str = "Hash";
pub const CLEAR_HASH: &str = "Clear Hash";
pub const THREADS: &str = "Threads";
pub const PONDER: &str = "Ponder";
pub const MOVE_OVERHEAD: &str = "Move Overhead";
pub const MIN_THINKING_TIME: &str = "Minimum Thinking Time";
pub const CHESS960: &str = "UCI_Chess960";
pub const EXPERIENCE_FILE: &str = "Experience File";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("No such option: {0}")]
    NoSuchOption(String),
    #[error("Invalid value '{value}' for option {name}")]
    InvalidValue { name: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Check,
    Spin { min: i64, max: i64 },
    Button,
    String,
}

/// Side effect the engine has to carry out after an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnChange {
    ResizeHash(usize),
    ClearHash,
    Timing(TimeConfig),
}

#[derive(Debug, Clone)]
pub struct UciOption {
    name: &'static str,
    kind: OptionKind,
    default: &'static str,
    value: String,
}

impl UciOption {
    fn new(name: &'static str, kind: OptionKind, default: &'static str) -> Self {
        Self {
            name,
            kind,
            default,
            value: default.to_string(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for UciOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "option name {} type ", self.name)?;
        match self.kind {
            OptionKind::Check => write!(f, "check default {}", self.default),
            OptionKind::Spin { min, max } => {
                write!(f, "spin default {} min {min} max {max}", self.default)
            }
            OptionKind::Button => write!(f, "button"),
            OptionKind::String => write!(f, "string default {}", self.default),
        }
    }
}

/// Engine options in the order `uci` lists them.
#[derive(Debug, Clone)]
pub struct OptionTable {
    options: Vec<UciOption>,
}

impl Default for OptionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionTable {
    pub fn new() -> Self {
        Self {
            options: vec![
                UciOption::new(THREADS, OptionKind::Spin { min: 1, max: 1 }, "1"),
                UciOption::new(HASH, OptionKind::Spin { min: 1, max: 1024 }, "16"),
                UciOption::new(CLEAR_HASH, OptionKind::Button, ""),
                UciOption::new(PONDER, OptionKind::Check, "false"),
                UciOption::new(MOVE_OVERHEAD, OptionKind::Spin { min: 0, max: 5000 }, "30"),
                UciOption::new(MIN_THINKING_TIME, OptionKind::Spin { min: 0, max: 5000 }, "20"),
                UciOption::new(CHESS960, OptionKind::Check, "false"),
                UciOption::new(EXPERIENCE_FILE, OptionKind::String, "experience.json"),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&UciOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UciOption> {
        self.options.iter()
    }

    /// Assigns `value` to the option called exactly `name`. Values are
    /// checked against the option type; on error nothing changes.
    pub fn set(&mut self, name: &str, value: &str) -> Result<Option<OnChange>, OptionError> {
        let option = self
            .options
            .iter_mut()
            .find(|o| o.name == name)
            .ok_or_else(|| OptionError::NoSuchOption(name.to_string()))?;
        let invalid = || OptionError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        };

        match option.kind {
            OptionKind::Check => {
                if value != "true" && value != "false" {
                    return Err(invalid());
                }
            }
            OptionKind::Spin { min, max } => {
                let n: i64 = value.parse().map_err(|_| invalid())?;
                if !(min..=max).contains(&n) {
                    return Err(invalid());
                }
            }
            OptionKind::Button => {
                return Ok((option.name == CLEAR_HASH).then_some(OnChange::ClearHash));
            }
            OptionKind::String => {}
        }
        option.value = value.to_string();

        Ok(match option.name {
            HASH => Some(OnChange::ResizeHash(self.hash_mb())),
            MOVE_OVERHEAD | MIN_THINKING_TIME => Some(OnChange::Timing(self.time_config())),
            _ => None,
        })
    }

    fn spin(&self, name: &str) -> i64 {
        self.get(name).and_then(|o| o.value.parse().ok()).unwrap_or(0)
    }

    fn check(&self, name: &str) -> bool {
        self.get(name).is_some_and(|o| o.value == "true")
    }

    pub fn hash_mb(&self) -> usize {
        self.spin(HASH) as usize
    }

    pub fn chess960(&self) -> bool {
        self.check(CHESS960)
    }

    pub fn experience_file(&self) -> &str {
        self.get(EXPERIENCE_FILE).map_or("", |o| o.value())
    }

    pub fn time_config(&self) -> TimeConfig {
        TimeConfig {
            move_overhead: self.spin(MOVE_OVERHEAD) as u64,
            min_thinking_time: self.spin(MIN_THINKING_TIME) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_options_in_declaration_order() {
        let table = OptionTable::new();
        let lines: Vec<String> = table.iter().map(ToString::to_string).collect();
        assert_eq!(lines[0], "option name Threads type spin default 1 min 1 max 1");
        assert_eq!(lines[1], "option name Hash type spin default 16 min 1 max 1024");
        assert_eq!(lines[2], "option name Clear Hash type button");
        assert_eq!(lines[6], "option name UCI_Chess960 type check default false");
        assert_eq!(lines[7], "option name Experience File type string default experience.json");
    }

    #[test]
    fn unknown_option_is_rejected() {
        let mut table = OptionTable::new();
        let before: Vec<String> = table.iter().map(|o| o.value().to_string()).collect();
        assert_eq!(
            table.set("NoSuchOption", "1"),
            Err(OptionError::NoSuchOption("NoSuchOption".to_string()))
        );
        assert_eq!(
            OptionError::NoSuchOption("NoSuchOption".into()).to_string(),
            "No such option: NoSuchOption"
        );
        let after: Vec<String> = table.iter().map(|o| o.value().to_string()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn lookup_is_exact() {
        let mut table = OptionTable::new();
        assert!(matches!(table.set("hash", "32"), Err(OptionError::NoSuchOption(_))));
        assert_eq!(table.set("Hash", "32"), Ok(Some(OnChange::ResizeHash(32))));
        assert_eq!(table.hash_mb(), 32);
    }

    #[test]
    fn values_are_validated() {
        let mut table = OptionTable::new();
        assert!(matches!(table.set("Hash", "0"), Err(OptionError::InvalidValue { .. })));
        assert!(matches!(table.set("Hash", "lots"), Err(OptionError::InvalidValue { .. })));
        assert!(matches!(table.set("UCI_Chess960", "yes"), Err(OptionError::InvalidValue { .. })));
        assert_eq!(table.hash_mb(), 16);
        assert!(!table.chess960());

        assert_eq!(table.set("UCI_Chess960", "true"), Ok(None));
        assert!(table.chess960());
    }

    #[test]
    fn side_effects() {
        let mut table = OptionTable::new();
        assert_eq!(table.set("Clear Hash", ""), Ok(Some(OnChange::ClearHash)));
        assert_eq!(
            table.set("Move Overhead", "100"),
            Ok(Some(OnChange::Timing(TimeConfig {
                move_overhead: 100,
                min_thinking_time: 20
            })))
        );
        assert_eq!(table.set("Experience File", "my games.json"), Ok(None));
        assert_eq!(table.experience_file(), "my games.json");
    }
}
