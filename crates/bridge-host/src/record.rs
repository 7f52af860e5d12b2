//! Capability records: one exported native module each.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bridge_core::errors::CODE_PANIC;
use bridge_core::{
    validate_arguments, ArgSpec, Arguments, BridgeError, Constants, ErrorInfo, MethodError, Value,
};

use crate::manifest::{CallStyle, MethodSignature};
use crate::promise::Promise;
use crate::queue::QueueAffinity;

/// Body of a method that returns its result directly.
pub type SyncBody = Arc<dyn Fn(Arguments) -> Result<Value, MethodError> + Send + Sync>;
/// Body of a method that settles a [`Promise`].
pub type PromiseBody = Arc<dyn Fn(Arguments, Promise) + Send + Sync>;
/// Computes a fresh constants snapshot.
pub type ConstantsProvider = Arc<dyn Fn() -> Constants + Send + Sync>;

#[derive(Clone)]
pub(crate) enum MethodBody {
    Sync(SyncBody),
    Promise(PromiseBody),
}

/// Invocable entry of a record's method table.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    args: Vec<ArgSpec>,
    body: MethodBody,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn style(&self) -> CallStyle {
        match self.body {
            MethodBody::Sync(_) => CallStyle::Sync,
            MethodBody::Promise(_) => CallStyle::Promise,
        }
    }

    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name.clone(),
            arity: self.arity(),
            args: self.args.clone(),
            style: self.style(),
        }
    }

    /// Checks positional arguments against the declared specs.
    pub fn validate(&self, args: &[Value]) -> Result<(), BridgeError> {
        validate_arguments(&self.args, args)
            .map_err(|err| err.with_context("method", self.name.clone()))
    }

    pub(crate) fn body(&self) -> &MethodBody {
        &self.body
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("style", &self.style())
            .finish_non_exhaustive()
    }
}

/// Registered description of one exported native module.
///
/// Name, method table and queue affinity are fixed at construction.
/// Constants are recomputed on every read and handed out as an owned
/// snapshot.
pub struct CapabilityRecord {
    name: String,
    affinity: QueueAffinity,
    methods: BTreeMap<String, MethodDescriptor>,
    constants: Option<ConstantsProvider>,
}

impl CapabilityRecord {
    pub fn builder(name: impl Into<String>) -> CapabilityRecordBuilder {
        CapabilityRecordBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn affinity(&self) -> &QueueAffinity {
        &self.affinity
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl ExactSizeIterator<Item = &MethodDescriptor> + '_ {
        self.methods.values()
    }

    /// Public signatures of every method reachable through dispatch.
    pub fn method_table(&self) -> BTreeMap<String, MethodSignature> {
        self.methods
            .iter()
            .map(|(name, descriptor)| (name.clone(), descriptor.signature()))
            .collect()
    }

    /// Computes a fresh constants snapshot.
    ///
    /// A panicking provider is reported as a native invocation failure.
    pub fn constants(&self) -> Result<Constants, BridgeError> {
        let Some(provider) = &self.constants else {
            return Ok(Constants::new());
        };
        catch_unwind(AssertUnwindSafe(|| provider())).map_err(|_| {
            BridgeError::native_failure(
                CODE_PANIC,
                format!("constants provider of '{}' panicked", self.name),
            )
            .with_context("module", self.name.clone())
        })
    }
}

impl fmt::Debug for CapabilityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRecord")
            .field("name", &self.name)
            .field("affinity", &self.affinity)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("has_constants", &self.constants.is_some())
            .finish()
    }
}

/// Builds a [`CapabilityRecord`]. The first configuration error is kept and
/// returned by [`CapabilityRecordBuilder::build`].
pub struct CapabilityRecordBuilder {
    name: String,
    affinity: QueueAffinity,
    methods: BTreeMap<String, MethodDescriptor>,
    constants: Option<ConstantsProvider>,
    error: Option<BridgeError>,
}

impl CapabilityRecordBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affinity: QueueAffinity::Default,
            methods: BTreeMap::new(),
            constants: None,
            error: None,
        }
    }

    pub fn affinity(mut self, affinity: QueueAffinity) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn constants<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Constants + Send + Sync + 'static,
    {
        self.constants = Some(Arc::new(provider));
        self
    }

    /// Exports a method whose body returns its value directly.
    pub fn sync_method<F>(
        self,
        name: impl Into<String>,
        args: impl IntoIterator<Item = ArgSpec>,
        body: F,
    ) -> Self
    where
        F: Fn(Arguments) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        self.export(name.into(), args, MethodBody::Sync(Arc::new(body)))
    }

    /// Exports a method whose body settles a [`Promise`].
    pub fn promise_method<F>(
        self,
        name: impl Into<String>,
        args: impl IntoIterator<Item = ArgSpec>,
        body: F,
    ) -> Self
    where
        F: Fn(Arguments, Promise) + Send + Sync + 'static,
    {
        self.export(name.into(), args, MethodBody::Promise(Arc::new(body)))
    }

    fn export(
        mut self,
        name: String,
        args: impl IntoIterator<Item = ArgSpec>,
        body: MethodBody,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        if name.trim().is_empty() {
            self.error = Some(BridgeError::Config(
                ErrorInfo::new("bridge.config.method_name", "method name is empty")
                    .with_context("module", self.name.clone()),
            ));
            return self;
        }
        if self.methods.contains_key(&name) {
            self.error = Some(
                BridgeError::duplicate_name(&name).with_context("module", self.name.clone()),
            );
            return self;
        }
        let descriptor = MethodDescriptor {
            name: name.clone(),
            args: args.into_iter().collect(),
            body,
        };
        self.methods.insert(name, descriptor);
        self
    }

    pub fn build(self) -> Result<CapabilityRecord, BridgeError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.name.trim().is_empty() {
            return Err(BridgeError::Config(ErrorInfo::new(
                "bridge.config.module_name",
                "module name is empty",
            )));
        }
        if let QueueAffinity::Dedicated(queue) = &self.affinity {
            if queue.trim().is_empty() {
                return Err(BridgeError::Config(
                    ErrorInfo::new("bridge.config.queue_name", "dedicated queue name is empty")
                        .with_context("module", self.name.clone()),
                ));
            }
            if queue.contains('\0') {
                return Err(BridgeError::Config(
                    ErrorInfo::new(
                        "bridge.config.queue_name",
                        "dedicated queue name contains a NUL byte",
                    )
                    .with_context("module", self.name.clone())
                    .with_context("queue", queue.escape_default().to_string()),
                ));
            }
        }
        Ok(CapabilityRecord {
            name: self.name,
            affinity: self.affinity,
            methods: self.methods,
            constants: self.constants,
        })
    }
}
