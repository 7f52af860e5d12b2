//! Generation-isolated capability registry and dispatcher.
//!
//! A [`BridgeHost`] owns any number of [`Generation`]s. Each generation has
//! its own [`Registry`] of [`CapabilityRecord`]s and a [`Dispatcher`] that
//! runs method bodies on the records' affinity queues and settles every
//! accepted call exactly once.

mod config;
mod dispatcher;
mod generation;
mod hash;
mod host;
mod manifest;
mod promise;
mod queue;
mod record;
mod registry;
mod serde;

pub use config::{load_bridge_config, BridgeConfig, ENV_CALL_TIMEOUT_MS, ENV_DEFAULT_QUEUE};
pub use dispatcher::{Dispatcher, InvocationRequest};
pub use generation::Generation;
pub use hash::method_table_fingerprint;
pub use host::BridgeHost;
pub use manifest::{CallStyle, MethodSignature, ModuleManifest};
pub use promise::{CallId, CompletionFn, Promise, RejectFn, ResolveFn};
pub use queue::QueueAffinity;
pub use record::{
    CapabilityRecord, CapabilityRecordBuilder, ConstantsProvider, MethodDescriptor, PromiseBody,
    SyncBody,
};
pub use registry::Registry;
pub use crate::serde::{from_json_slice, to_canonical_json_bytes};

pub use bridge_core::{
    ArgShape, ArgSpec, Arguments, BridgeError, BridgeVersion, Constants, ErrorInfo,
    GenerationTag, MethodError, Value,
};
