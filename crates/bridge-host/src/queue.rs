//! Serial execution contexts that method bodies run on.
//!
//! Each queue is one named OS thread draining an unbounded channel, so jobs
//! submitted to the same queue run one at a time in submission order.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use bridge_core::{BridgeError, ErrorInfo, GenerationTag};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Which execution context a record's method bodies run on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "queue")]
pub enum QueueAffinity {
    /// The generation's shared serial queue.
    #[default]
    Default,
    /// A named serial queue with its own thread. Records naming the same
    /// queue share it.
    Dedicated(String),
}

impl QueueAffinity {
    pub fn dedicated(name: impl Into<String>) -> Self {
        QueueAffinity::Dedicated(name.into())
    }

    /// Resolves the queue name, falling back to `default` for shared affinity.
    pub fn queue_name<'a>(&'a self, default: &'a str) -> &'a str {
        match self {
            QueueAffinity::Default => default,
            QueueAffinity::Dedicated(name) => name,
        }
    }
}

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct ExecutionQueue {
    name: String,
    sender: mpsc::UnboundedSender<Job>,
}

impl ExecutionQueue {
    fn spawn(
        tag: &GenerationTag,
        name: &str,
        stack_size: Option<usize>,
    ) -> Result<Self, BridgeError> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let thread_name = format!("{tag}.{name}");
        if thread_name.contains('\0') {
            return Err(BridgeError::Config(
                ErrorInfo::new("bridge.config.queue_name", "queue name contains a NUL byte")
                    .with_context("queue", thread_name.escape_default().to_string()),
            ));
        }
        let mut builder = thread::Builder::new().name(thread_name.clone());
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }
        builder
            .spawn(move || {
                let current = thread::current();
                let queue = current.name().unwrap_or("?");
                while let Some(job) = receiver.blocking_recv() {
                    // Method faults are caught by the dispatcher; this only
                    // guards against panicking continuations.
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        warn!(queue, "job panicked outside the execution boundary");
                    }
                }
                debug!(queue, "queue drained");
            })
            .map_err(|err| {
                BridgeError::Config(
                    ErrorInfo::new("bridge.config.queue_spawn", err.to_string())
                        .with_context("queue", thread_name),
                )
            })?;
        debug!(generation = %tag, queue = name, "queue started");
        Ok(Self {
            name: name.to_string(),
            sender,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues a job, handing it back if the worker is gone.
    pub(crate) fn submit(&self, job: Job) -> Result<(), Job> {
        self.sender.send(job).map_err(|err| err.0)
    }
}

/// The queues owned by one generation, keyed by queue name.
pub(crate) struct QueuePool {
    tag: GenerationTag,
    default_name: String,
    stack_size: Option<usize>,
    queues: Mutex<BTreeMap<String, Arc<ExecutionQueue>>>,
}

impl QueuePool {
    pub(crate) fn new(
        tag: GenerationTag,
        default_name: impl Into<String>,
        stack_size: Option<usize>,
    ) -> Self {
        Self {
            tag,
            default_name: default_name.into(),
            stack_size,
            queues: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the queue for `affinity`, starting its thread on first use.
    pub(crate) fn ensure(
        &self,
        affinity: &QueueAffinity,
    ) -> Result<Arc<ExecutionQueue>, BridgeError> {
        let name = affinity.queue_name(&self.default_name);
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = queues.get(name) {
            return Ok(queue.clone());
        }
        let queue = Arc::new(ExecutionQueue::spawn(&self.tag, name, self.stack_size)?);
        queues.insert(name.to_string(), queue.clone());
        Ok(queue)
    }

    pub(crate) fn get(&self, affinity: &QueueAffinity) -> Option<Arc<ExecutionQueue>> {
        let name = affinity.queue_name(&self.default_name);
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Drops every queue sender. Workers finish the jobs already queued and
    /// then exit on their own; they are not joined.
    pub(crate) fn shutdown(&self) -> usize {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let count = queues.len();
        queues.clear();
        count
    }
}
