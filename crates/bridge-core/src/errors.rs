//! Structured error types shared across capability bridge crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable code for a module name registered twice within one generation.
pub const CODE_DUPLICATE_NAME: &str = "bridge.duplicate_name";
/// Stable code for a lookup of an unregistered module.
pub const CODE_MODULE_NOT_FOUND: &str = "bridge.module_not_found";
/// Stable code for a lookup of an unexported method.
pub const CODE_METHOD_NOT_FOUND: &str = "bridge.method_not_found";
/// Stable code for arguments that do not match a method descriptor.
pub const CODE_ARGUMENT_MISMATCH: &str = "bridge.argument_mismatch";
/// Stable code for calls routed to an inactive generation.
pub const CODE_GENERATION_TORN_DOWN: &str = "bridge.generation_torn_down";
/// Stable code for calls that exceeded the boundary timeout.
pub const CODE_TIMEOUT: &str = "bridge.timeout";
/// Code attached to failures caused by a panicking method body.
pub const CODE_PANIC: &str = "E_PANIC";
/// Code attached to promise-style calls whose promise was dropped unsettled.
pub const CODE_PROMISE_DROPPED: &str = "E_PROMISE_DROPPED";

/// Structured payload attached to every [`BridgeError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (generation, module, method, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

/// Canonical error type for the capability bridge.
///
/// Every variant is recoverable: the registry returns them from fallible
/// operations and the dispatcher hands them to the reject continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail")]
pub enum BridgeError {
    /// A record with the same name already exists in the generation.
    #[error("duplicate name: {0}")]
    DuplicateName(ErrorInfo),
    /// No record is registered under the requested module name.
    #[error("module not found: {0}")]
    ModuleNotFound(ErrorInfo),
    /// The module exists but does not export the requested method.
    #[error("method not found: {0}")]
    MethodNotFound(ErrorInfo),
    /// Argument count or shape does not match the method descriptor.
    #[error("argument mismatch: {0}")]
    ArgumentMismatch(ErrorInfo),
    /// A fault raised inside a method body, caught at the execution boundary.
    #[error("native invocation failure: {0}")]
    NativeInvocationFailure(ErrorInfo),
    /// The target generation is no longer active.
    #[error("generation torn down: {0}")]
    GenerationTornDown(ErrorInfo),
    /// The caller stopped waiting for a result at the async boundary.
    #[error("timeout: {0}")]
    Timeout(ErrorInfo),
    /// Invalid bridge or record configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl BridgeError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            BridgeError::DuplicateName(info)
            | BridgeError::ModuleNotFound(info)
            | BridgeError::MethodNotFound(info)
            | BridgeError::ArgumentMismatch(info)
            | BridgeError::NativeInvocationFailure(info)
            | BridgeError::GenerationTornDown(info)
            | BridgeError::Timeout(info)
            | BridgeError::Config(info)
            | BridgeError::Serde(info) => info,
        }
    }

    /// Error code handed to the scripting side alongside the message.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Human readable message handed to the scripting side.
    pub fn message(&self) -> &str {
        &self.info().message
    }

    /// Builds a [`BridgeError::DuplicateName`] for the given name.
    pub fn duplicate_name(name: &str) -> Self {
        BridgeError::DuplicateName(
            ErrorInfo::new(CODE_DUPLICATE_NAME, format!("'{name}' is already registered"))
                .with_context("name", name),
        )
    }

    /// Builds a [`BridgeError::ModuleNotFound`] for the given module.
    pub fn module_not_found(module: &str) -> Self {
        BridgeError::ModuleNotFound(
            ErrorInfo::new(
                CODE_MODULE_NOT_FOUND,
                format!("no module named '{module}' is registered"),
            )
            .with_context("module", module),
        )
    }

    /// Builds a [`BridgeError::MethodNotFound`] for the given module and method.
    pub fn method_not_found(module: &str, method: &str) -> Self {
        BridgeError::MethodNotFound(
            ErrorInfo::new(
                CODE_METHOD_NOT_FOUND,
                format!("module '{module}' does not export a method named '{method}'"),
            )
            .with_context("module", module)
            .with_context("method", method),
        )
    }

    /// Builds a [`BridgeError::NativeInvocationFailure`] with a provider code.
    pub fn native_failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::NativeInvocationFailure(ErrorInfo::new(code, message))
    }

    /// Builds a [`BridgeError::GenerationTornDown`] for the given tag.
    pub fn generation_torn_down(tag: &str) -> Self {
        BridgeError::GenerationTornDown(
            ErrorInfo::new(
                CODE_GENERATION_TORN_DOWN,
                format!("generation '{tag}' is not active"),
            )
            .with_context("generation", tag),
        )
    }

    /// Returns a copy of the error with one more context entry.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        match self {
            BridgeError::DuplicateName(info) => {
                BridgeError::DuplicateName(info.with_context(key, value))
            }
            BridgeError::ModuleNotFound(info) => {
                BridgeError::ModuleNotFound(info.with_context(key, value))
            }
            BridgeError::MethodNotFound(info) => {
                BridgeError::MethodNotFound(info.with_context(key, value))
            }
            BridgeError::ArgumentMismatch(info) => {
                BridgeError::ArgumentMismatch(info.with_context(key, value))
            }
            BridgeError::NativeInvocationFailure(info) => {
                BridgeError::NativeInvocationFailure(info.with_context(key, value))
            }
            BridgeError::GenerationTornDown(info) => {
                BridgeError::GenerationTornDown(info.with_context(key, value))
            }
            BridgeError::Timeout(info) => BridgeError::Timeout(info.with_context(key, value)),
            BridgeError::Config(info) => BridgeError::Config(info.with_context(key, value)),
            BridgeError::Serde(info) => BridgeError::Serde(info.with_context(key, value)),
        }
    }
}

/// Failure reported by a method body.
///
/// The dispatcher converts it into [`BridgeError::NativeInvocationFailure`]
/// carrying the same code and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message} (code: {code})")]
pub struct MethodError {
    /// Provider specific error code.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

impl MethodError {
    /// Creates a new method error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<MethodError> for BridgeError {
    fn from(err: MethodError) -> Self {
        BridgeError::native_failure(err.code, err.message)
    }
}
