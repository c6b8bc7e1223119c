//! # Foundation Context
//!
//! Immutable configuration snapshot derived from environment variables plus
//! programmatic overrides. Precedence: programmatic > environment > defaults.
//!
//! Recognized variables (prefix `GROUNDWORK_`):
//!
//! | Variable | Type |
//! |---|---|
//! | `GROUNDWORK_SERVICE_NAME` | string |
//! | `GROUNDWORK_ENVIRONMENT` | string |
//! | `GROUNDWORK_LOG_LEVEL` | level name, case-insensitive |
//! | `GROUNDWORK_LOG_MODULE_LEVELS` | comma-separated `name:LEVEL` pairs |
//! | `GROUNDWORK_LOG_CONSOLE_FORMATTER` | `key_value` \| `json` |
//! | `GROUNDWORK_LOG_OMIT_TIMESTAMP` | boolean |
//! | `GROUNDWORK_LOG_FILE` | path |
//! | `GROUNDWORK_ENABLED_EVENT_SETS` | comma-separated names |
//! | `GROUNDWORK_EMOJI_ENABLED` | boolean |
//! | `GROUNDWORK_SANITIZE_PATTERNS` | comma-separated key patterns |
//! | `GROUNDWORK_TELEMETRY_DISABLED` | boolean |
//!
//! Booleans accept case-insensitive `true|1|yes|on` / `false|0|no|off`; any
//! other value is `InvalidConfiguration`. Any variable whose value begins
//! with `file://` is read from the referenced file, trimmed of its trailing
//! newline (secret indirection).


use std::path::PathBuf;

use indexmap::IndexMap;

use crate::errors::{FoundationError, Result};
use crate::event::Level;

pub const ENV_PREFIX: &str = "GROUNDWORK_";

/// Console output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormatter {
  #[default]
  KeyValue,
  Json,
}

impl ConsoleFormatter {
  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "key_value" => Ok(ConsoleFormatter::KeyValue),
      "json" => Ok(ConsoleFormatter::Json),
      other => Err(FoundationError::invalid_config(
        "GROUNDWORK_LOG_CONSOLE_FORMATTER",
        format!("expected 'key_value' or 'json', got '{}'", other),
      )),
    }
  }
}

/// Immutable configuration snapshot. Cheap to clone; never mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct FoundationContext {
  pub service_name: String,
  pub environment: String,
  pub default_level: Level,
  /// Module-prefix → level overrides, in declaration order.
  pub module_levels: IndexMap<String, Level>,
  pub console_formatter: ConsoleFormatter,
  pub omit_timestamp: bool,
  /// Event-set names to enable, in order. Empty means "all built-ins".
  pub enabled_event_sets: Vec<String>,
  pub emoji_enabled: bool,
  /// Case-insensitive key substrings redacted regardless of event-set
  /// transforms.
  pub sanitize_patterns: Vec<String>,
  pub log_file_path: Option<PathBuf>,
  pub telemetry_disabled: bool,
}

impl Default for FoundationContext {
  fn default() -> Self {
    Self {
      service_name: "app".to_string(),
      environment: "development".to_string(),
      default_level: Level::Info,
      module_levels: IndexMap::new(),
      console_formatter: ConsoleFormatter::KeyValue,
      omit_timestamp: false,
      enabled_event_sets: Vec::new(),
      emoji_enabled: true,
      sanitize_patterns: default_sanitize_patterns(),
      log_file_path: None,
      telemetry_disabled: false,
    }
  }
}

pub fn default_sanitize_patterns() -> Vec<String> {
  ["password", "token", "secret", "authorization", "api_key"]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl FoundationContext {
  /// Snapshot from the process environment over built-in defaults.
  pub fn from_env() -> Result<Self> {
    ContextBuilder::new().build()
  }

  pub fn builder() -> ContextBuilder {
    ContextBuilder::new()
  }
}

/// Programmatic overrides layered over environment-derived values.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
  service_name: Option<String>,
  environment: Option<String>,
  default_level: Option<Level>,
  module_levels: Option<IndexMap<String, Level>>,
  console_formatter: Option<ConsoleFormatter>,
  omit_timestamp: Option<bool>,
  enabled_event_sets: Option<Vec<String>>,
  emoji_enabled: Option<bool>,
  sanitize_patterns: Option<Vec<String>>,
  log_file_path: Option<Option<PathBuf>>,
  telemetry_disabled: Option<bool>,
}

impl ContextBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn service_name(mut self, name: impl Into<String>) -> Self {
    self.service_name = Some(name.into());
    self
  }

  pub fn environment(mut self, env: impl Into<String>) -> Self {
    self.environment = Some(env.into());
    self
  }

  pub fn default_level(mut self, level: Level) -> Self {
    self.default_level = Some(level);
    self
  }

  pub fn module_level(mut self, prefix: impl Into<String>, level: Level) -> Self {
    self
      .module_levels
      .get_or_insert_with(IndexMap::new)
      .insert(prefix.into(), level);
    self
  }

  pub fn console_formatter(mut self, formatter: ConsoleFormatter) -> Self {
    self.console_formatter = Some(formatter);
    self
  }

  pub fn omit_timestamp(mut self, omit: bool) -> Self {
    self.omit_timestamp = Some(omit);
    self
  }

  pub fn enabled_event_sets(mut self, names: Vec<String>) -> Self {
    self.enabled_event_sets = Some(names);
    self
  }

  pub fn emoji_enabled(mut self, enabled: bool) -> Self {
    self.emoji_enabled = Some(enabled);
    self
  }

  pub fn sanitize_patterns(mut self, patterns: Vec<String>) -> Self {
    self.sanitize_patterns = Some(patterns);
    self
  }

  pub fn log_file_path(mut self, path: Option<PathBuf>) -> Self {
    self.log_file_path = Some(path);
    self
  }

  pub fn telemetry_disabled(mut self, disabled: bool) -> Self {
    self.telemetry_disabled = Some(disabled);
    self
  }

  /// Merge defaults ← environment ← overrides. An explicit override wins
  /// without consulting (or validating) the corresponding variable.
  pub fn build(self) -> Result<FoundationContext> {
    let mut ctx = FoundationContext::default();

    if let Some(name) = resolve(self.service_name, "SERVICE_NAME", |raw| Ok(raw))? {
      ctx.service_name = name;
    }
    if let Some(env) = resolve(self.environment, "ENVIRONMENT", |raw| Ok(raw))? {
      ctx.environment = env;
    }
    if let Some(level) = resolve(self.default_level, "LOG_LEVEL", |raw| {
      raw
        .parse::<Level>()
        .map_err(|e| FoundationError::invalid_config(env_key("LOG_LEVEL"), e.to_string()))
    })? {
      ctx.default_level = level;
    }
    if let Some(levels) = resolve(self.module_levels, "LOG_MODULE_LEVELS", |raw| {
      parse_module_levels(&raw)
    })? {
      ctx.module_levels = levels;
    }
    if let Some(formatter) = resolve(self.console_formatter, "LOG_CONSOLE_FORMATTER", |raw| {
      ConsoleFormatter::parse(&raw)
    })? {
      ctx.console_formatter = formatter;
    }
    if let Some(omit) = resolve(self.omit_timestamp, "LOG_OMIT_TIMESTAMP", |raw| {
      parse_bool(&raw, env_key("LOG_OMIT_TIMESTAMP"))
    })? {
      ctx.omit_timestamp = omit;
    }
    if let Some(sets) = resolve(self.enabled_event_sets, "ENABLED_EVENT_SETS", |raw| {
      Ok(parse_list(&raw))
    })? {
      ctx.enabled_event_sets = sets;
    }
    if let Some(emoji) = resolve(self.emoji_enabled, "EMOJI_ENABLED", |raw| {
      parse_bool(&raw, env_key("EMOJI_ENABLED"))
    })? {
      ctx.emoji_enabled = emoji;
    }
    if let Some(patterns) = resolve(self.sanitize_patterns, "SANITIZE_PATTERNS", |raw| {
      Ok(parse_list(&raw))
    })? {
      ctx.sanitize_patterns = patterns;
    }
    if let Some(path) = resolve(self.log_file_path, "LOG_FILE", |raw| {
      Ok(Some(PathBuf::from(raw)))
    })? {
      ctx.log_file_path = path;
    }
    if let Some(disabled) = resolve(self.telemetry_disabled, "TELEMETRY_DISABLED", |raw| {
      parse_bool(&raw, env_key("TELEMETRY_DISABLED"))
    })? {
      ctx.telemetry_disabled = disabled;
    }

    Ok(ctx)
  }
}

fn env_key(suffix: &str) -> String {
  format!("{}{}", ENV_PREFIX, suffix)
}

/// Override > environment > absent.
fn resolve<T>(
  override_value: Option<T>,
  suffix: &str,
  parse: impl FnOnce(String) -> Result<T>,
) -> Result<Option<T>> {
  if override_value.is_some() {
    return Ok(override_value);
  }
  match env_value(&env_key(suffix))? {
    Some(raw) => parse(raw).map(Some),
    None => Ok(None),
  }
}

/// Read a variable, applying `file://` secret indirection.
pub fn env_value(key: &str) -> Result<Option<String>> {
  let raw = match std::env::var(key) {
    Ok(v) => v,
    Err(std::env::VarError::NotPresent) => return Ok(None),
    Err(std::env::VarError::NotUnicode(_)) => {
      return Err(FoundationError::invalid_config(key, "value is not valid UTF-8"));
    },
  };

  if let Some(path) = raw.strip_prefix("file://") {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      FoundationError::invalid_config(key, format!("cannot read '{}': {}", path, e))
    })?;
    let trimmed = contents.strip_suffix('\n').unwrap_or(&contents);
    let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
    return Ok(Some(trimmed.to_string()));
  }

  Ok(Some(raw))
}

/// Case-insensitive `true|1|yes|on` / `false|0|no|off`.
pub fn parse_bool(raw: &str, key: impl Into<String>) -> Result<bool> {
  match raw.to_ascii_lowercase().as_str() {
    "true" | "1" | "yes" | "on" => Ok(true),
    "false" | "0" | "no" | "off" => Ok(false),
    other => Err(FoundationError::invalid_config(
      key,
      format!("expected a boolean, got '{}'", other),
    )),
  }
}

/// Comma-separated list; elements trimmed, empties dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}

/// Comma-separated `name:LEVEL` pairs.
pub fn parse_module_levels(raw: &str) -> Result<IndexMap<String, Level>> {
  let key = env_key("LOG_MODULE_LEVELS");
  let mut levels = IndexMap::new();
  for part in parse_list(raw) {
    let Some((name, level)) = part.split_once(':') else {
      return Err(FoundationError::invalid_config(
        key.as_str(),
        format!("expected 'name:LEVEL', got '{}'", part),
      ));
    };
    let name = name.trim();
    if name.is_empty() {
      return Err(FoundationError::invalid_config(key.as_str(), "empty module name"));
    }
    let level = level
      .trim()
      .parse::<Level>()
      .map_err(|e| FoundationError::invalid_config(key.as_str(), e.to_string()))?;
    levels.insert(name.to_string(), level);
  }
  Ok(levels)
}
