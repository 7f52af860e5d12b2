//! Exactly-once continuations for invocation requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;

use bridge_core::errors::{CODE_PANIC, CODE_PROMISE_DROPPED};
use bridge_core::{BridgeError, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Receives the success value of an invocation.
pub type ResolveFn = Box<dyn FnOnce(Value) + Send + 'static>;
/// Receives the failure of an invocation.
pub type RejectFn = Box<dyn FnOnce(BridgeError) + Send + 'static>;
/// Receives either outcome of an invocation.
pub type CompletionFn = Box<dyn FnOnce(Result<Value, BridgeError>) + Send + 'static>;

/// Identifier assigned to every accepted invocation within a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallId(u64);

impl CallId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The continuation pair carried by an invocation request.
pub(crate) enum Continuation {
    Split { resolve: ResolveFn, reject: RejectFn },
    Unified(CompletionFn),
}

impl Continuation {
    pub(crate) fn complete(self, outcome: Result<Value, BridgeError>) {
        match (self, outcome) {
            (Continuation::Split { resolve, .. }, Ok(value)) => resolve(value),
            (Continuation::Split { reject, .. }, Err(err)) => reject(err),
            (Continuation::Unified(complete), outcome) => complete(outcome),
        }
    }
}

/// Shared settle-once state of one accepted invocation.
pub(crate) struct Settlement {
    id: CallId,
    module: String,
    method: String,
    slot: Mutex<Option<Continuation>>,
    pending: Weak<PendingCalls>,
}

impl Settlement {
    pub(crate) fn new(
        id: CallId,
        module: &str,
        method: &str,
        continuation: Continuation,
        pending: Weak<PendingCalls>,
    ) -> Self {
        Self {
            id,
            module: module.to_string(),
            method: method.to_string(),
            slot: Mutex::new(Some(continuation)),
            pending,
        }
    }

    pub(crate) fn id(&self) -> CallId {
        self.id
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Runs the continuation if nobody has yet. Returns false when the call
    /// was already settled.
    pub(crate) fn settle(&self, outcome: Result<Value, BridgeError>) -> bool {
        let taken = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(continuation) = taken else {
            debug!(
                call = %self.id,
                module = %self.module,
                method = %self.method,
                ok = outcome.is_ok(),
                "ignored settlement of an already settled call"
            );
            return false;
        };
        if let Some(pending) = self.pending.upgrade() {
            pending.remove(self.id);
        }
        continuation.complete(outcome);
        true
    }
}

/// Accepted calls that have not settled yet.
#[derive(Default)]
pub(crate) struct PendingCalls {
    calls: Mutex<HashMap<CallId, Arc<Settlement>>>,
}

impl PendingCalls {
    pub(crate) fn insert(&self, settlement: Arc<Settlement>) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(settlement.id(), settlement);
    }

    fn remove(&self, id: CallId) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Removes and returns every pending call, ordered by id.
    pub(crate) fn drain(&self) -> Vec<Arc<Settlement>> {
        let mut drained: Vec<_> = self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, settlement)| settlement)
            .collect();
        drained.sort_by_key(|settlement| settlement.id());
        drained
    }
}

/// Settles a promise-style method call.
///
/// A `Promise` may be moved to another thread and settled later. Only the
/// first settlement reaches the caller; a promise dropped without being
/// settled rejects the call with `E_PROMISE_DROPPED`, or with `E_PANIC` when
/// the thread holding it is unwinding.
pub struct Promise {
    settlement: Arc<Settlement>,
}

impl Promise {
    pub(crate) fn new(settlement: Arc<Settlement>) -> Self {
        Self { settlement }
    }

    pub fn call_id(&self) -> CallId {
        self.settlement.id()
    }

    /// True once the call was resolved, rejected or failed by teardown.
    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }

    pub fn resolve(self, value: impl Into<Value>) {
        self.settlement.settle(Ok(value.into()));
    }

    /// Rejects with a provider code and message.
    pub fn reject(self, code: impl Into<String>, message: impl Into<String>) {
        self.settlement
            .settle(Err(BridgeError::native_failure(code, message)));
    }

    /// Rejects with an existing bridge error, e.g. one forwarded from a
    /// nested call.
    pub fn reject_with(self, err: BridgeError) {
        self.settlement.settle(Err(err));
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("call", &self.settlement.id)
            .field("module", &self.settlement.module)
            .field("method", &self.settlement.method)
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl Drop for Promise {
    fn drop(&mut self) {
        if self.settlement.is_settled() {
            return;
        }
        let settlement = &self.settlement;
        if thread::panicking() {
            let current = thread::current();
            let holder = current.name().unwrap_or("unnamed");
            warn!(
                call = %settlement.id,
                module = %settlement.module,
                method = %settlement.method,
                thread = holder,
                "promise dropped while its holder panicked"
            );
            settlement.settle(Err(BridgeError::native_failure(
                CODE_PANIC,
                format!(
                    "{}.{} panicked on thread '{holder}' before settling its promise",
                    settlement.module, settlement.method
                ),
            )));
            return;
        }
        warn!(
            call = %settlement.id,
            module = %settlement.module,
            method = %settlement.method,
            "promise dropped without being settled"
        );
        settlement.settle(Err(BridgeError::native_failure(
            CODE_PROMISE_DROPPED,
            format!(
                "{}.{} dropped its promise without settling it",
                settlement.module, settlement.method
            ),
        )));
    }
}
