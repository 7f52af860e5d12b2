//! Version isolation layer: routes every entry point by generation tag.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use bridge_core::{BridgeError, Constants, GenerationTag, Value};
use tracing::info;

use crate::config::BridgeConfig;
use crate::dispatcher::InvocationRequest;
use crate::generation::Generation;
use crate::manifest::{MethodSignature, ModuleManifest};
use crate::record::CapabilityRecord;

/// Hosts any number of independent bridge generations in one process.
#[derive(Debug)]
pub struct BridgeHost {
    config: BridgeConfig,
    generations: RwLock<BTreeMap<GenerationTag, Arc<Generation>>>,
}

impl BridgeHost {
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self {
            config,
            generations: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Creates and activates a generation. Fails with `DuplicateName` if a
    /// generation with the same tag is active.
    pub fn create_generation(&self, tag: GenerationTag) -> Result<Arc<Generation>, BridgeError> {
        let mut generations = self
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if generations.contains_key(&tag) {
            return Err(
                BridgeError::duplicate_name(tag.as_str()).with_context("scope", "generation")
            );
        }
        let generation = Arc::new(Generation::new(tag.clone(), &self.config)?);
        generations.insert(tag.clone(), generation.clone());
        info!(generation = %tag, "generation created");
        Ok(generation)
    }

    /// Tears a generation down and forgets it. In-flight calls are rejected
    /// with `GenerationTornDown`; the count of rejected calls is returned.
    pub fn teardown_generation(&self, tag: &GenerationTag) -> Result<usize, BridgeError> {
        let removed = self
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tag);
        match removed {
            Some(generation) => Ok(generation.teardown()),
            None => Err(BridgeError::generation_torn_down(tag.as_str())),
        }
    }

    pub fn generation(&self, tag: &GenerationTag) -> Result<Arc<Generation>, BridgeError> {
        self.generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
            .cloned()
            .ok_or_else(|| BridgeError::generation_torn_down(tag.as_str()))
    }

    /// Tags of every active generation in sorted order.
    pub fn generations(&self) -> Vec<GenerationTag> {
        self.generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn register(
        &self,
        tag: &GenerationTag,
        record: CapabilityRecord,
    ) -> Result<(), BridgeError> {
        self.generation(tag)?.register(record)
    }

    /// Schedules a call in the given generation. Unknown tags reject with
    /// `GenerationTornDown`.
    pub fn invoke<R, J>(
        &self,
        tag: &GenerationTag,
        module: &str,
        method: &str,
        arguments: Vec<Value>,
        resolve: R,
        reject: J,
    ) where
        R: FnOnce(Value) + Send + 'static,
        J: FnOnce(BridgeError) + Send + 'static,
    {
        self.invoke_request(
            tag,
            InvocationRequest::new(module, method, arguments, resolve, reject),
        );
    }

    pub fn invoke_request(&self, tag: &GenerationTag, request: InvocationRequest) {
        match self.generation(tag) {
            Ok(generation) => generation.invoke(request),
            Err(err) => request.fail(err),
        }
    }

    /// Awaits the outcome of a call, bounded by the configured timeout.
    pub async fn call(
        &self,
        tag: &GenerationTag,
        module: &str,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, BridgeError> {
        let generation = self.generation(tag)?;
        generation.call(module, method, arguments).await
    }

    pub fn constants(&self, tag: &GenerationTag, module: &str) -> Result<Constants, BridgeError> {
        self.generation(tag)?.constants(module)
    }

    pub fn method_table(
        &self,
        tag: &GenerationTag,
        module: &str,
    ) -> Result<BTreeMap<String, MethodSignature>, BridgeError> {
        self.generation(tag)?.method_table(module)
    }

    pub fn describe(
        &self,
        tag: &GenerationTag,
        module: &str,
    ) -> Result<ModuleManifest, BridgeError> {
        self.generation(tag)?.manifest(module)
    }

    pub fn method_table_fingerprint(
        &self,
        tag: &GenerationTag,
        module: &str,
    ) -> Result<String, BridgeError> {
        Ok(self.describe(tag, module)?.fingerprint)
    }

    /// Tears down every generation. Returns the total of rejected calls.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<_> = std::mem::take(
            &mut *self
                .generations
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        )
        .into_values()
        .collect();
        drained.iter().map(|generation| generation.teardown()).sum()
    }
}

impl Drop for BridgeHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}
