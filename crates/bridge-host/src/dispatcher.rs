//! Asynchronous dispatch of invocation requests onto affinity queues.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bridge_core::errors::CODE_PANIC;
use bridge_core::{Arguments, BridgeError, GenerationTag, Value};
use tracing::{trace, warn};

use crate::promise::{CallId, Continuation, PendingCalls, Promise, Settlement};
use crate::queue::{Job, QueuePool};
use crate::record::MethodBody;
use crate::registry::Registry;

/// One call from the scripting side into a capability method.
pub struct InvocationRequest {
    module: String,
    method: String,
    arguments: Vec<Value>,
    continuation: Continuation,
}

impl InvocationRequest {
    pub fn new<R, J>(
        module: impl Into<String>,
        method: impl Into<String>,
        arguments: Vec<Value>,
        resolve: R,
        reject: J,
    ) -> Self
    where
        R: FnOnce(Value) + Send + 'static,
        J: FnOnce(BridgeError) + Send + 'static,
    {
        Self {
            module: module.into(),
            method: method.into(),
            arguments,
            continuation: Continuation::Split {
                resolve: Box::new(resolve),
                reject: Box::new(reject),
            },
        }
    }

    /// Builds a request whose outcome is delivered to a single callback.
    pub fn with_completion<F>(
        module: impl Into<String>,
        method: impl Into<String>,
        arguments: Vec<Value>,
        complete: F,
    ) -> Self
    where
        F: FnOnce(Result<Value, BridgeError>) + Send + 'static,
    {
        Self {
            module: module.into(),
            method: method.into(),
            arguments,
            continuation: Continuation::Unified(Box::new(complete)),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Rejects the request without scheduling it.
    pub(crate) fn fail(self, err: BridgeError) {
        self.continuation.complete(Err(err));
    }
}

impl std::fmt::Debug for InvocationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationRequest")
            .field("module", &self.module)
            .field("method", &self.method)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// Routes requests of one generation to their records' queues.
pub struct Dispatcher {
    tag: GenerationTag,
    registry: Arc<RwLock<Registry>>,
    queues: Arc<QueuePool>,
    pending: Arc<PendingCalls>,
    active: Arc<AtomicBool>,
    next_call: AtomicU64,
}

impl Dispatcher {
    pub(crate) fn new(
        tag: GenerationTag,
        registry: Arc<RwLock<Registry>>,
        queues: Arc<QueuePool>,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            tag,
            registry,
            queues,
            pending: Arc::new(PendingCalls::default()),
            active,
            next_call: AtomicU64::new(1),
        }
    }

    /// Validates and schedules `request`, returning before the method body
    /// runs. Exactly one of the request's continuations fires, exactly once.
    pub fn invoke(&self, request: InvocationRequest) {
        if !self.active.load(Ordering::Acquire) {
            request.fail(BridgeError::generation_torn_down(self.tag.as_str()));
            return;
        }
        let lookup = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(&request.module);
        let record = match lookup {
            Ok(record) => record,
            Err(err) => {
                trace!(generation = %self.tag, module = %request.module, "rejected unknown module");
                request.fail(err);
                return;
            }
        };
        let Some(descriptor) = record.method(&request.method) else {
            trace!(
                generation = %self.tag,
                module = %request.module,
                method = %request.method,
                "rejected unknown method"
            );
            let err = BridgeError::method_not_found(&request.module, &request.method);
            request.fail(err);
            return;
        };
        if let Err(err) = descriptor.validate(&request.arguments) {
            let err = err.with_context("module", request.module.clone());
            request.fail(err);
            return;
        }
        let Some(queue) = self.queues.get(record.affinity()) else {
            request.fail(BridgeError::generation_torn_down(self.tag.as_str()));
            return;
        };

        let body = descriptor.body().clone();
        let InvocationRequest {
            module,
            method,
            arguments,
            continuation,
        } = request;
        let id = CallId::from_raw(self.next_call.fetch_add(1, Ordering::Relaxed));
        let settlement = Arc::new(Settlement::new(
            id,
            &module,
            &method,
            continuation,
            Arc::downgrade(&self.pending),
        ));
        self.pending.insert(settlement.clone());
        // Teardown may have drained the table between the first check and
        // the insert above.
        if !self.active.load(Ordering::Acquire) {
            settlement.settle(Err(self.torn_down(id)));
            return;
        }

        let job = execution_job(
            self.tag.clone(),
            self.active.clone(),
            body,
            Arguments::new(arguments),
            settlement.clone(),
        );
        if queue.submit(job).is_err() {
            settlement.settle(Err(self.torn_down(id)));
            return;
        }
        trace!(
            generation = %self.tag,
            call = %id,
            module = %module,
            method = %method,
            queue = queue.name(),
            "scheduled"
        );
    }

    /// Number of accepted calls that have not settled yet.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Rejects every pending call with `GenerationTornDown`. Returns how
    /// many calls this rejected.
    pub(crate) fn fail_pending(&self) -> usize {
        self.pending
            .drain()
            .into_iter()
            .filter(|settlement| settlement.settle(Err(self.torn_down(settlement.id()))))
            .count()
    }

    fn torn_down(&self, id: CallId) -> BridgeError {
        BridgeError::generation_torn_down(self.tag.as_str()).with_context("call", id.to_string())
    }
}

fn execution_job(
    tag: GenerationTag,
    active: Arc<AtomicBool>,
    body: MethodBody,
    arguments: Arguments,
    settlement: Arc<Settlement>,
) -> Job {
    Box::new(move || {
        if !active.load(Ordering::Acquire) {
            settlement.settle(Err(BridgeError::generation_torn_down(tag.as_str())
                .with_context("call", settlement.id().to_string())));
            return;
        }
        match body {
            MethodBody::Sync(body) => {
                let outcome = match catch_unwind(AssertUnwindSafe(|| body(arguments))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(BridgeError::from(err)),
                    Err(payload) => Err(panic_failure(&tag, settlement.id(), payload)),
                };
                settlement.settle(outcome);
            }
            MethodBody::Promise(body) => {
                let promise = Promise::new(settlement.clone());
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| body(arguments, promise))) {
                    settlement.settle(Err(panic_failure(&tag, settlement.id(), payload)));
                }
            }
        }
    })
}

fn panic_failure(tag: &GenerationTag, id: CallId, payload: Box<dyn Any + Send>) -> BridgeError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "method body panicked".to_string());
    warn!(generation = %tag, call = %id, %message, "method body panicked");
    BridgeError::native_failure(CODE_PANIC, message).with_context("call", id.to_string())
}
