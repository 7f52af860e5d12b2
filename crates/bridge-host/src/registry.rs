use std::collections::BTreeMap;
use std::sync::Arc;

use bridge_core::{BridgeError, Constants};

use crate::manifest::MethodSignature;
use crate::record::{CapabilityRecord, MethodDescriptor};

/// Name-unique set of capability records for one generation.
///
/// Mutation is expected during a single-writer registration phase; lookups
/// take `&self` and are safe from any number of threads afterwards.
#[derive(Debug, Default)]
pub struct Registry {
    records: BTreeMap<String, Arc<CapabilityRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record`, failing with `DuplicateName` if its name is taken.
    /// The existing record is left untouched on failure.
    pub fn register(
        &mut self,
        record: CapabilityRecord,
    ) -> Result<Arc<CapabilityRecord>, BridgeError> {
        if self.records.contains_key(record.name()) {
            return Err(BridgeError::duplicate_name(record.name()));
        }
        let record = Arc::new(record);
        self.records.insert(record.name().to_string(), record.clone());
        Ok(record)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<CapabilityRecord>, BridgeError> {
        self.records
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::module_not_found(name))
    }

    pub fn method_descriptor(
        &self,
        name: &str,
        method: &str,
    ) -> Result<&MethodDescriptor, BridgeError> {
        let record = self
            .records
            .get(name)
            .ok_or_else(|| BridgeError::module_not_found(name))?;
        record
            .method(method)
            .ok_or_else(|| BridgeError::method_not_found(name, method))
    }

    pub fn constants(&self, name: &str) -> Result<Constants, BridgeError> {
        self.lookup(name)?.constants()
    }

    pub fn method_table(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, MethodSignature>, BridgeError> {
        Ok(self.lookup(name)?.method_table())
    }

    /// Registered module names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Releases every record, returning how many were held.
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        count
    }
}
