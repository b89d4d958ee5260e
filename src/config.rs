//! Per-machine configuration, fixed when the machine is constructed.

use std::env;

/// Environment variable that switches per-instruction tracing on.
pub const TRACE_ENV: &str = "INTCODE_TRACE";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineConfig {
  /// Appears in every log line the machine emits, to tell pipeline stages apart.
  pub name  : String,
  /// Log every decoded instruction at `trace` level.
  pub trace : bool,
}

impl Default for MachineConfig {
  fn default() -> Self {
    MachineConfig {
      name  : "intcode".to_string(),
      trace : false,
    }
  }
}

impl MachineConfig {
  /// The default configuration, with tracing taken from `INTCODE_TRACE`.
  pub fn from_env() -> MachineConfig {
    let trace = env::var(TRACE_ENV).map(|value| parse_flag(&value)).unwrap_or(false);
    MachineConfig { trace, ..MachineConfig::default() }
  }

  pub fn named<S: Into<String>>(mut self, name: S) -> MachineConfig {
    self.name = name.into();
    self
  }

  pub fn traced(mut self, trace: bool) -> MachineConfig {
    self.trace = trace;
    self
  }
}

fn parse_flag(value: &str) -> bool {
  matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
