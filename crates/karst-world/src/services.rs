use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use karst_core::{
    CellId, CreatureState, EncounterSpec, Entity, EntityKind, EntitySnapshot, EntityTemplate,
    InstanceSpec, ObjectGuid, Position, TreasureSpec,
};

/// Creates entities from template data.
pub trait EntityFactory: Send + Sync {
    /// Instantiate one entity from a template, allocating a dynamic guid.
    /// `None` when the template id is unknown.
    fn create_from_template(&self, template_id: u32) -> Option<Entity>;

    /// Instantiate placed instances with their stable guids. Specs whose
    /// template is unknown are skipped.
    fn create_batch(&self, specs: &[InstanceSpec]) -> Vec<Entity>;
}

/// Read access to world/shard data. Treated as an opaque query service.
pub trait WorldDataService: Send + Sync {
    /// Static template instances for a cell.
    fn static_instances(&self, cell: CellId) -> Vec<InstanceSpec>;

    /// Persisted dynamic objects (corpses, dropped items) for a cell.
    fn dynamic_instances(&self, cell: CellId) -> Vec<InstanceSpec>;

    /// Semi-randomized encounter spawns for a cell.
    fn encounters(&self, cell: CellId) -> Vec<EncounterSpec>;

    /// A cached treasure table, if the id names one.
    fn treasure_table(&self, id: u32) -> Option<TreasureSpec>;

    /// Named entry counts of whatever caches back this service, surfaced
    /// through the world snapshot. Services without caches report nothing.
    fn cache_counts(&self) -> Vec<(String, usize)> {
        Vec::new()
    }
}

/// Collision/placement integration.
pub trait PlacementService: Send + Sync {
    /// Place an entity at an exact position. `false` on collision failure.
    fn place_at(&self, entity: &mut Entity, position: &Position) -> bool;

    /// Place an entity at a random point within `radius` of `origin`,
    /// retrying internally up to an implementation-defined bound. `false`
    /// when every candidate failed.
    fn random_scatter(&self, entity: &mut Entity, origin: &Position, radius: f32) -> bool;

    /// Release an entity's collision/physics resources.
    fn remove_from_world(&self, entity: &Entity);
}

/// Visibility and state-change notification. Wire format out of scope.
pub trait BroadcastService: Send + Sync {
    /// Notify nearby observers about an entity event.
    fn notify_nearby(&self, entity: &Entity, message: &str);
}

/// Asynchronous persistence writes.
pub trait PersistenceSink: Send + Sync {
    /// Write a batch of snapshots. The callback fires when the write
    /// settles; errors stay on the sink's own channel.
    fn save_batch(&self, batch: Vec<EntitySnapshot>, on_complete: Box<dyn FnOnce(bool) + Send>);
}

/// The collaborator bundle a world is built with.
#[derive(Clone)]
pub struct Services {
    /// Entity factory.
    pub factory: Arc<dyn EntityFactory>,
    /// World/shard data service.
    pub data: Arc<dyn WorldDataService>,
    /// Collision/placement service.
    pub placement: Arc<dyn PlacementService>,
    /// Broadcast service.
    pub broadcast: Arc<dyn BroadcastService>,
    /// Persistence sink.
    pub persistence: Arc<dyn PersistenceSink>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

impl Services {
    /// A bundle of the in-memory reference implementations, suitable for
    /// tests and headless embedding.
    pub fn in_memory(factory: MemoryFactory, data: MemoryDataService) -> Self {
        Self {
            factory: Arc::new(factory),
            data: Arc::new(data),
            placement: Arc::new(OpenPlacement::new(0)),
            broadcast: Arc::new(NullBroadcast),
            persistence: Arc::new(MemorySink::default()),
        }
    }
}

/// Fixed AI cadence handed to factory-created creatures.
const FACTORY_AI_INTERVAL: f64 = 1.0;

/// In-memory entity factory over a registered template set.
pub struct MemoryFactory {
    templates: HashMap<u32, EntityTemplate>,
    next_guid: AtomicU32,
}

impl MemoryFactory {
    /// A factory over the given templates.
    pub fn new(templates: Vec<EntityTemplate>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.id, t)).collect(),
            next_guid: AtomicU32::new(ObjectGuid::DYNAMIC_MIN),
        }
    }

    fn instantiate(&self, template_id: u32, guid: ObjectGuid) -> Option<Entity> {
        let template = self.templates.get(&template_id)?;
        let mut entity = Entity::new(guid, template.kind, template.name.clone(), template.id);
        entity.properties = template.properties.clone();
        entity.time_to_rot = template.time_to_rot;
        if let Some(interval) = template.heartbeat_interval {
            entity = entity.with_heartbeat(interval);
        }
        if template.kind == EntityKind::Creature {
            entity = entity.with_creature(CreatureState::new(FACTORY_AI_INTERVAL));
        }
        Some(entity)
    }
}

impl EntityFactory for MemoryFactory {
    fn create_from_template(&self, template_id: u32) -> Option<Entity> {
        let guid = ObjectGuid(self.next_guid.fetch_add(1, Ordering::Relaxed));
        self.instantiate(template_id, guid)
    }

    fn create_batch(&self, specs: &[InstanceSpec]) -> Vec<Entity> {
        specs
            .iter()
            .filter_map(|spec| {
                let Some(mut entity) = self.instantiate(spec.template_id, spec.guid) else {
                    debug!(template = spec.template_id, "skipping unknown template");
                    return None;
                };
                entity.position = Some(spec.position);
                entity.persistence = spec.persistence;
                Some(entity)
            })
            .collect()
    }
}

/// In-memory world data service backed by plain maps.
#[derive(Default)]
pub struct MemoryDataService {
    statics: HashMap<CellId, Vec<InstanceSpec>>,
    dynamics: HashMap<CellId, Vec<InstanceSpec>>,
    encounters: HashMap<CellId, Vec<EncounterSpec>>,
    treasures: HashMap<u32, TreasureSpec>,
}

impl MemoryDataService {
    /// Register static instances for a cell.
    pub fn with_statics(mut self, cell: CellId, specs: Vec<InstanceSpec>) -> Self {
        self.statics.insert(cell, specs);
        self
    }

    /// Register persisted dynamic instances for a cell.
    pub fn with_dynamics(mut self, cell: CellId, specs: Vec<InstanceSpec>) -> Self {
        self.dynamics.insert(cell, specs);
        self
    }

    /// Register encounter spawns for a cell.
    pub fn with_encounters(mut self, cell: CellId, specs: Vec<EncounterSpec>) -> Self {
        self.encounters.insert(cell, specs);
        self
    }

    /// Register a treasure table.
    pub fn with_treasure(mut self, table: TreasureSpec) -> Self {
        self.treasures.insert(table.id, table);
        self
    }
}

impl WorldDataService for MemoryDataService {
    fn static_instances(&self, cell: CellId) -> Vec<InstanceSpec> {
        self.statics.get(&cell).cloned().unwrap_or_default()
    }

    fn dynamic_instances(&self, cell: CellId) -> Vec<InstanceSpec> {
        self.dynamics.get(&cell).cloned().unwrap_or_default()
    }

    fn encounters(&self, cell: CellId) -> Vec<EncounterSpec> {
        self.encounters.get(&cell).cloned().unwrap_or_default()
    }

    fn treasure_table(&self, id: u32) -> Option<TreasureSpec> {
        self.treasures.get(&id).cloned()
    }

    fn cache_counts(&self) -> Vec<(String, usize)> {
        vec![
            ("statics".into(), self.statics.values().map(Vec::len).sum()),
            ("dynamics".into(), self.dynamics.values().map(Vec::len).sum()),
            ("encounters".into(), self.encounters.values().map(Vec::len).sum()),
            ("treasure_tables".into(), self.treasures.len()),
        ]
    }
}

/// How many scatter candidates are attempted before giving up.
pub const SCATTER_MAX_TRIES: u32 = 4;

/// Collision-free reference placement: every exact placement succeeds and
/// scatter picks a uniform offset within the radius.
pub struct OpenPlacement {
    rng: Mutex<StdRng>,
}

impl OpenPlacement {
    /// A placement service with its own seeded RNG.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl PlacementService for OpenPlacement {
    fn place_at(&self, entity: &mut Entity, position: &Position) -> bool {
        entity.position = Some(*position);
        true
    }

    fn random_scatter(&self, entity: &mut Entity, origin: &Position, radius: f32) -> bool {
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        for _ in 0..SCATTER_MAX_TRIES {
            let dx = rng.random_range(-radius..=radius);
            let dy = rng.random_range(-radius..=radius);
            let candidate = origin.offset(dx, dy, 0.0);
            if candidate.in_bounds() {
                entity.position = Some(candidate);
                return true;
            }
        }
        false
    }

    fn remove_from_world(&self, entity: &Entity) {
        debug!(guid = %entity.guid, "released placement resources");
    }
}

/// Broadcast service that drops every notification.
pub struct NullBroadcast;

impl BroadcastService for NullBroadcast {
    fn notify_nearby(&self, _entity: &Entity, _message: &str) {}
}

/// Persistence sink that records batches in memory.
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<EntitySnapshot>>>,
}

impl MemorySink {
    /// Every batch saved so far, by value.
    pub fn saved_batches(&self) -> Vec<Vec<EntitySnapshot>> {
        match self.batches.lock() {
            Ok(batches) => batches.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Total snapshots across all batches.
    pub fn saved_count(&self) -> usize {
        self.saved_batches().iter().map(Vec::len).sum()
    }
}

impl PersistenceSink for MemorySink {
    fn save_batch(&self, batch: Vec<EntitySnapshot>, on_complete: Box<dyn FnOnce(bool) + Send>) {
        info!(count = batch.len(), "saving entity batch");
        match self.batches.lock() {
            Ok(mut batches) => batches.push(batch),
            Err(poisoned) => poisoned.into_inner().push(batch),
        }
        on_complete(true);
    }
}
