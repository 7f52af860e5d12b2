use std::fs;
use std::path::Path;
use std::time::Duration;

use bridge_core::{BridgeError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`BridgeConfig::call_timeout_ms`].
pub const ENV_CALL_TIMEOUT_MS: &str = "CAPBRIDGE_CALL_TIMEOUT_MS";
/// Environment variable overriding [`BridgeConfig::default_queue`].
pub const ENV_DEFAULT_QUEUE: &str = "CAPBRIDGE_DEFAULT_QUEUE";

/// Settings shared by every generation a host creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound applied by the async call boundary. `None` waits forever.
    pub call_timeout_ms: Option<u64>,
    /// Name of the shared serial queue used by default-affinity records.
    pub default_queue: String,
    /// Stack size for queue threads; the platform default when unset.
    pub queue_stack_kib: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: None,
            default_queue: "default".into(),
            queue_stack_kib: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig = toml::from_str(contents).map_err(|err| {
            BridgeError::Config(ErrorInfo::new("bridge.config.parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.default_queue.trim().is_empty() {
            return Err(BridgeError::Config(
                ErrorInfo::new("bridge.config.default_queue", "default queue name is empty")
                    .with_hint("set default_queue to a non-empty name"),
            ));
        }
        if self.default_queue.contains('\0') {
            return Err(BridgeError::Config(
                ErrorInfo::new(
                    "bridge.config.default_queue",
                    "default queue name contains a NUL byte",
                )
                .with_context("queue", self.default_queue.escape_default().to_string()),
            ));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(BridgeError::Config(
                ErrorInfo::new("bridge.config.call_timeout", "call timeout must be positive")
                    .with_hint("omit call_timeout_ms to disable the timeout"),
            ));
        }
        if self.queue_stack_kib == Some(0) {
            return Err(BridgeError::Config(ErrorInfo::new(
                "bridge.config.queue_stack",
                "queue stack size must be positive",
            )));
        }
        if let Some(kib) = self.queue_stack_kib {
            if kib.checked_mul(1024).is_none() {
                return Err(BridgeError::Config(
                    ErrorInfo::new("bridge.config.queue_stack", "queue stack size is too large")
                        .with_context("queue_stack_kib", kib.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Applies overrides from `lookup`, keyed by the `CAPBRIDGE_*` names.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BridgeError> {
        if let Some(raw) = lookup(ENV_CALL_TIMEOUT_MS) {
            let millis = raw.trim().parse::<u64>().map_err(|err| {
                BridgeError::Config(
                    ErrorInfo::new("bridge.config.call_timeout", err.to_string())
                        .with_context("variable", ENV_CALL_TIMEOUT_MS)
                        .with_context("value", raw.clone()),
                )
            })?;
            self.call_timeout_ms = Some(millis);
        }
        if let Some(queue) = lookup(ENV_DEFAULT_QUEUE) {
            self.default_queue = queue;
        }
        self.validate()?;
        Ok(self)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, BridgeError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    pub fn queue_stack_size(&self) -> Option<usize> {
        self.queue_stack_kib.and_then(|kib| kib.checked_mul(1024))
    }
}

/// Reads and validates a bridge configuration file.
pub fn load_bridge_config(path: &Path) -> Result<BridgeConfig, BridgeError> {
    let contents = fs::read_to_string(path).map_err(|err| {
        BridgeError::Config(
            ErrorInfo::new(
                "bridge.config.read",
                format!("failed to read config: {err}"),
            )
            .with_context("path", path.display().to_string()),
        )
    })?;
    BridgeConfig::from_toml_str(&contents)
        .map_err(|err| err.with_context("path", path.display().to_string()))
}
