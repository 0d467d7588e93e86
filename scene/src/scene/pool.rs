//! The scene's descriptor pool: accumulated demand and the allocated pool.

use crate::backend::{GpuBackend, GpuDescriptorPool, GpuDescriptorSet};
use crate::descriptor::{DescriptorBinding, DescriptorPoolSizes};
use crate::error::SceneError;
use crate::graph::PassReplica;

#[derive(Debug, Clone, Copy)]
struct AllocatedPool {
    pool: GpuDescriptorPool,
    capacity: DescriptorPoolSizes,
}

/// Demand accumulated by registration, and the pool allocated from it.
///
/// Demand may only grow until the pool is allocated. Afterwards the pool is
/// frozen: registering more descriptor sets is rejected.
#[derive(Debug, Default)]
pub(crate) struct ScenePool {
    demand: DescriptorPoolSizes,
    allocated: Option<AllocatedPool>,
    frozen: bool,
}

impl ScenePool {
    pub(crate) fn demand(&self) -> DescriptorPoolSizes {
        self.demand
    }

    pub(crate) fn set_demand(&mut self, demand: DescriptorPoolSizes) {
        self.demand = demand;
    }

    pub(crate) fn pool(&self) -> Option<GpuDescriptorPool> {
        self.allocated.map(|allocated| allocated.pool)
    }

    pub(crate) fn capacity(&self) -> Option<DescriptorPoolSizes> {
        self.allocated.map(|allocated| allocated.capacity)
    }

    fn check_open(&self, label: &str) -> Result<(), SceneError> {
        if self.frozen {
            log::error!(
                "'{}' needs descriptors but the descriptor pool is already allocated",
                label
            );
            return Err(SceneError::DescriptorPoolFrozen {
                label: label.to_string(),
            });
        }
        Ok(())
    }

    /// Reserve one set made of `bindings`. Empty bindings reserve nothing.
    pub(crate) fn reserve(
        &mut self,
        label: &str,
        bindings: &[DescriptorBinding],
    ) -> Result<(), SceneError> {
        if bindings.is_empty() {
            return Ok(());
        }
        self.check_open(label)?;
        self.demand.add_set(label, bindings);
        Ok(())
    }

    /// Reserve one set per replica that needs one.
    pub(crate) fn reserve_replicas(
        &mut self,
        label: &str,
        replicas: &[PassReplica],
    ) -> Result<(), SceneError> {
        if !replicas.iter().any(PassReplica::needs_descriptor_set) {
            return Ok(());
        }
        self.check_open(label)?;
        for replica in replicas.iter().filter(|replica| replica.needs_descriptor_set()) {
            self.demand.add_set(label, &replica.bindings);
        }
        Ok(())
    }

    /// Give back the demand of one set.
    pub(crate) fn unreserve(&mut self, bindings: &[DescriptorBinding]) {
        if !bindings.is_empty() {
            self.demand.remove_set(bindings);
        }
    }

    /// Allocate the pool at the accumulated demand, once, and freeze it.
    ///
    /// Returns `None` when nothing needs a descriptor set.
    pub(crate) fn ensure(
        &mut self,
        backend: &dyn GpuBackend,
    ) -> Result<Option<GpuDescriptorPool>, SceneError> {
        self.frozen = true;
        if let Some(allocated) = self.allocated {
            if !self.demand.fits_in(&allocated.capacity) {
                log::warn!("Descriptor demand exceeds the allocated pool");
            }
            return Ok(Some(allocated.pool));
        }
        if self.demand.is_empty() {
            return Ok(None);
        }

        let pool = backend.create_descriptor_pool(&self.demand)?;
        log::debug!(
            "Allocated descriptor pool: {} sets, {:?}",
            self.demand.max_sets(),
            self.demand.iter().collect::<Vec<_>>()
        );
        self.allocated = Some(AllocatedPool {
            pool,
            capacity: self.demand,
        });
        Ok(Some(pool))
    }

    /// Allocate a set from the pool.
    pub(crate) fn allocate(
        &self,
        backend: &dyn GpuBackend,
        label: &str,
        bindings: &[DescriptorBinding],
    ) -> Result<GpuDescriptorSet, SceneError> {
        let Some(pool) = self.pool() else {
            return Err(SceneError::ObjectCreationFailed(format!(
                "'{label}': no descriptor pool allocated"
            )));
        };
        backend.allocate_descriptor_set(pool, bindings)
    }

    /// Return a set to the pool.
    pub(crate) fn free(&self, backend: &dyn GpuBackend, set: GpuDescriptorSet) {
        if let Some(pool) = self.pool() {
            backend.free_descriptor_set(pool, set);
        }
    }

    /// Destroy the pool and every set allocated from it. Demand is kept and
    /// the next `ensure` allocates a fresh pool.
    pub(crate) fn destroy(&mut self, backend: &dyn GpuBackend) {
        if let Some(allocated) = self.allocated.take() {
            backend.destroy_descriptor_pool(allocated.pool);
        }
    }
}
