use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use bridge_core::errors::CODE_TIMEOUT;
use bridge_core::{BridgeError, Constants, ErrorInfo, GenerationTag, Value};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::dispatcher::{Dispatcher, InvocationRequest};
use crate::manifest::{MethodSignature, ModuleManifest};
use crate::queue::{QueueAffinity, QueuePool};
use crate::record::CapabilityRecord;
use crate::registry::Registry;

/// One isolated bridge instance: a registry, its dispatcher and its queues.
///
/// Nothing is shared with other generations, so two generations may both
/// register a module under the same name.
pub struct Generation {
    tag: GenerationTag,
    call_timeout: Option<Duration>,
    registry: Arc<RwLock<Registry>>,
    queues: Arc<QueuePool>,
    dispatcher: Dispatcher,
    active: Arc<AtomicBool>,
}

impl Generation {
    /// Creates an active generation and starts its default queue.
    pub fn new(tag: GenerationTag, config: &BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let registry = Arc::new(RwLock::new(Registry::new()));
        let queues = Arc::new(QueuePool::new(
            tag.clone(),
            config.default_queue.clone(),
            config.queue_stack_size(),
        ));
        queues.ensure(&QueueAffinity::Default)?;
        let active = Arc::new(AtomicBool::new(true));
        let dispatcher =
            Dispatcher::new(tag.clone(), registry.clone(), queues.clone(), active.clone());
        Ok(Self {
            tag,
            call_timeout: config.call_timeout(),
            registry,
            queues,
            dispatcher,
            active,
        })
    }

    pub fn tag(&self) -> &GenerationTag {
        &self.tag
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_active(&self) -> Result<(), BridgeError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(BridgeError::generation_torn_down(self.tag.as_str()))
        }
    }

    /// Registers a record and starts its affinity queue if needed.
    pub fn register(&self, record: CapabilityRecord) -> Result<(), BridgeError> {
        self.ensure_active()?;
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if registry.contains(record.name()) {
            return Err(BridgeError::duplicate_name(record.name())
                .with_context("generation", self.tag.as_str()));
        }
        self.queues.ensure(record.affinity())?;
        let record = registry.register(record)?;
        debug!(
            generation = %self.tag,
            module = %self.tag.qualify(record.name()),
            methods = record.methods().len(),
            affinity = ?record.affinity(),
            "registered capability"
        );
        Ok(())
    }

    pub fn lookup(&self, module: &str) -> Result<Arc<CapabilityRecord>, BridgeError> {
        self.ensure_active()?;
        self.registry().lookup(module)
    }

    pub fn invoke(&self, request: InvocationRequest) {
        self.dispatcher.invoke(request);
    }

    /// Convenience form of [`Generation::invoke`] taking the continuations
    /// directly.
    pub fn invoke_with<R, J>(
        &self,
        module: &str,
        method: &str,
        arguments: Vec<Value>,
        resolve: R,
        reject: J,
    ) where
        R: FnOnce(Value) + Send + 'static,
        J: FnOnce(BridgeError) + Send + 'static,
    {
        self.dispatcher
            .invoke(InvocationRequest::new(module, method, arguments, resolve, reject));
    }

    /// Invokes a method and awaits its outcome, bounded by the configured
    /// call timeout.
    pub async fn call(
        &self,
        module: &str,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, BridgeError> {
        self.call_bounded(module, method, arguments, self.call_timeout)
            .await
    }

    /// Invokes a method and awaits its outcome for at most `limit`.
    pub async fn call_with_timeout(
        &self,
        module: &str,
        method: &str,
        arguments: Vec<Value>,
        limit: Duration,
    ) -> Result<Value, BridgeError> {
        self.call_bounded(module, method, arguments, Some(limit))
            .await
    }

    async fn call_bounded(
        &self,
        module: &str,
        method: &str,
        arguments: Vec<Value>,
        limit: Option<Duration>,
    ) -> Result<Value, BridgeError> {
        let (sender, receiver) = oneshot::channel();
        self.dispatcher.invoke(InvocationRequest::with_completion(
            module,
            method,
            arguments,
            move |outcome| {
                let _ = sender.send(outcome);
            },
        ));
        let received = match limit {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    return Err(BridgeError::Timeout(
                        ErrorInfo::new(
                            CODE_TIMEOUT,
                            format!("{module}.{method} did not settle within {limit:?}"),
                        )
                        .with_context("generation", self.tag.as_str())
                        .with_context("module", module)
                        .with_context("method", method),
                    ))
                }
            },
            None => receiver.await,
        };
        received.unwrap_or_else(|_| Err(BridgeError::generation_torn_down(self.tag.as_str())))
    }

    /// Computes a fresh constants snapshot outside the registry lock.
    pub fn constants(&self, module: &str) -> Result<Constants, BridgeError> {
        self.lookup(module)?.constants()
    }

    pub fn method_table(
        &self,
        module: &str,
    ) -> Result<BTreeMap<String, MethodSignature>, BridgeError> {
        self.ensure_active()?;
        self.registry().method_table(module)
    }

    pub fn manifest(&self, module: &str) -> Result<ModuleManifest, BridgeError> {
        let record = self.lookup(module)?;
        ModuleManifest::from_record(&self.tag, &record)
    }

    pub fn module_names(&self) -> Vec<String> {
        self.registry().names()
    }

    pub fn queue_names(&self) -> Vec<String> {
        self.queues.names()
    }

    pub fn pending_count(&self) -> usize {
        self.dispatcher.pending_count()
    }

    /// Deactivates the generation, rejects in-flight calls with
    /// `GenerationTornDown`, releases every record and stops the queues.
    /// Returns how many in-flight calls were rejected. Idempotent.
    pub fn teardown(&self) -> usize {
        if !self.active.swap(false, Ordering::AcqRel) {
            return 0;
        }
        let rejected = self.dispatcher.fail_pending();
        let released = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        let queues = self.queues.shutdown();
        info!(generation = %self.tag, rejected, released, queues, "generation torn down");
        rejected
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generation")
            .field("tag", &self.tag)
            .field("active", &self.is_active())
            .field("modules", &self.module_names())
            .finish_non_exhaustive()
    }
}
