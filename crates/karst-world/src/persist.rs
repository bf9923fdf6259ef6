//! Dirty-entity collection and fire-and-forget batch saves.

use tracing::debug;

use karst_core::{Entity, EntitySnapshot, PersistenceClass};

use crate::services::PersistenceSink;

/// Collect snapshots of every dirty persistent entity reachable from
/// `entity`, clearing dirty flags as it goes. Recurses into container
/// inventories so a saved chest carries its contents.
pub fn collect_dirty(entity: &mut Entity, out: &mut Vec<EntitySnapshot>) {
    if entity.persistence != PersistenceClass::Never && entity.dirty {
        out.push(EntitySnapshot::of(entity));
        entity.dirty = false;
    }
    if let Some(container) = entity.container.as_mut() {
        for item in container.items.values_mut() {
            collect_dirty(item, out);
        }
    }
    if let Some(creature) = entity.creature.as_mut() {
        for item in creature.equipped.values_mut() {
            collect_dirty(item, out);
        }
    }
}

/// Submit a batch to the sink. Completion is observed only through the
/// sink's callback; the caller does not block.
pub fn submit(sink: &dyn PersistenceSink, batch: Vec<EntitySnapshot>) {
    if batch.is_empty() {
        return;
    }
    let count = batch.len();
    sink.save_batch(
        batch,
        Box::new(move |ok| {
            if !ok {
                debug!(count, "entity batch save failed");
            }
        }),
    );
}
