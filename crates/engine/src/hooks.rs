use eavscope_core::{AttributeRegistry, Entity, EntityId};

use crate::error::EngineError;

/// Callbacks run by the repository around every persistence call. All
/// methods default to no-ops; an error aborts the operation and is returned
/// to the caller as is.
pub trait LifecycleHooks {
    fn before_save(&self, _entity: &mut Entity, _registry: &AttributeRegistry) -> Result<(), EngineError> {
        Ok(())
    }

    fn after_save(&self, _entity: &Entity) -> Result<(), EngineError> {
        Ok(())
    }

    fn before_delete(&self, _entity_id: EntityId) -> Result<(), EngineError> {
        Ok(())
    }

    fn after_delete(&self, _entity_id: EntityId) -> Result<(), EngineError> {
        Ok(())
    }

    fn after_load(&self, _entity: &mut Entity) -> Result<(), EngineError> {
        Ok(())
    }
}
