use std::collections::BTreeMap;

use bridge_core::{ArgSpec, BridgeError, GenerationTag};
use serde::{Deserialize, Serialize};

use crate::hash::method_table_fingerprint;
use crate::queue::QueueAffinity;
use crate::record::CapabilityRecord;

/// How a method body delivers its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStyle {
    /// The body returns its value (or error) directly.
    Sync,
    /// The body receives a [`crate::Promise`] and settles it, possibly later.
    Promise,
}

/// Public signature of one exported method, used to generate typed stubs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub arity: usize,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    pub style: CallStyle,
}

/// Everything a host needs to know about one registered module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    /// Module name prefixed with the generation namespace.
    pub qualified_name: String,
    pub generation: GenerationTag,
    pub affinity: QueueAffinity,
    pub methods: BTreeMap<String, MethodSignature>,
    pub fingerprint: String,
}

impl ModuleManifest {
    pub fn from_record(
        generation: &GenerationTag,
        record: &CapabilityRecord,
    ) -> Result<Self, BridgeError> {
        let methods = record.method_table();
        let fingerprint = method_table_fingerprint(&methods)?;
        Ok(Self {
            name: record.name().to_string(),
            qualified_name: generation.qualify(record.name()),
            generation: generation.clone(),
            affinity: record.affinity().clone(),
            methods,
            fingerprint,
        })
    }
}
