//! Cell lifecycle: loading, background population, ticking, adjacency,
//! and the unload sweep.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use karst_core::{CellId, Entity, EntityKind, ObjectGuid, Position};

use crate::action::ActionSender;
use crate::config::WorldConfig;
use crate::diagnostics::{CellStats, WorldSnapshot};
use crate::error::{WorldError, WorldResult};
use crate::landblock::Landblock;
use crate::services::Services;

/// Local units per encounter-grid slot.
const ENCOUNTER_STRIDE: f32 = 24.0;

/// Owns every loaded cell and drives their ticks.
pub struct LandblockManager {
    config: WorldConfig,
    services: Services,
    landblocks: HashMap<CellId, Landblock>,
    loaders: Vec<JoinHandle<()>>,
}

impl LandblockManager {
    /// A manager with no cells loaded.
    pub fn new(config: WorldConfig, services: Services) -> Self {
        Self {
            config,
            services,
            landblocks: HashMap::new(),
            loaders: Vec::new(),
        }
    }

    /// Whether a cell is loaded.
    pub fn is_loaded(&self, id: CellId) -> bool {
        self.landblocks.contains_key(&id)
    }

    /// Number of loaded cells.
    pub fn loaded_count(&self) -> usize {
        self.landblocks.len()
    }

    /// Borrow a loaded cell.
    pub fn get(&self, id: CellId) -> Option<&Landblock> {
        self.landblocks.get(&id)
    }

    /// Mutably borrow a loaded cell.
    pub fn get_mut(&mut self, id: CellId) -> Option<&mut Landblock> {
        self.landblocks.get_mut(&id)
    }

    /// A producer handle for a loaded cell's action queue, for callers on
    /// other threads that need to hand it work.
    pub fn sender_for(&self, id: CellId) -> WorldResult<ActionSender<Landblock>> {
        self.landblocks
            .get(&id)
            .map(Landblock::sender)
            .ok_or(WorldError::CellNotLoaded(id))
    }

    /// Fetch a cell, loading it first if needed.
    ///
    /// A fresh cell starts ticking immediately; its population streams in
    /// from a background thread through the cell's action queue, so a load
    /// never stalls the tick loop. Loading an already-loaded cell is a
    /// no-op lookup and never duplicates the population.
    pub fn get_or_load(&mut self, id: CellId, now: f64) -> &mut Landblock {
        let mut neighbors = Vec::new();
        if !self.landblocks.contains_key(&id) {
            info!(cell = %id, "loading cell");
            neighbors = self.link_neighbors(id);
        }
        match self.landblocks.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut block =
                    Landblock::new(id, self.config.clone(), self.services.clone(), now);
                block.set_adjacents(neighbors);
                let sender = block.sender();
                let services = self.services.clone();
                self.loaders.push(thread::spawn(move || {
                    populate(id, &services, &sender);
                }));
                entry.insert(block)
            }
        }
    }

    /// Block until every in-flight background population has finished
    /// enqueueing. The entities still land on the next tick.
    pub fn join_background_loads(&mut self) {
        for handle in self.loaders.drain(..) {
            if handle.join().is_err() {
                warn!("population thread panicked");
            }
        }
    }

    /// Tick every loaded cell, then sweep out the ones that requested
    /// unload.
    pub fn tick_all(&mut self, now: f64) {
        for block in self.landblocks.values_mut() {
            block.tick(now);
        }
        let unloadable: Vec<CellId> = self
            .landblocks
            .values()
            .filter(|b| b.unload_requested() && !b.is_permaload())
            .map(|b| b.id())
            .collect();
        for id in unloadable {
            if let Some(mut block) = self.landblocks.remove(&id) {
                block.unload(now);
            }
            for neighbor in id.neighbors() {
                if let Some(block) = self.landblocks.get_mut(&neighbor) {
                    let kept: Vec<CellId> =
                        block.adjacents().iter().copied().filter(|a| *a != id).collect();
                    block.set_adjacents(kept);
                }
            }
        }
    }

    /// Wake a cell and its loaded neighbors, refreshing activity clocks.
    pub fn set_active(&mut self, id: CellId, now: f64) {
        if let Some(block) = self.landblocks.get_mut(&id) {
            block.set_active(now);
        }
        for neighbor in id.neighbors() {
            if let Some(block) = self.landblocks.get_mut(&neighbor) {
                block.set_active(now);
            }
        }
    }

    /// Look up an entity in a cell, falling back to its loaded neighbors.
    /// Staged changes are observed the same way a cell-local lookup would.
    pub fn get_object(&self, id: CellId, guid: ObjectGuid) -> Option<&Entity> {
        let block = self.landblocks.get(&id)?;
        if let Some(entity) = block.get_object(guid) {
            return Some(entity);
        }
        for adjacent in block.adjacents() {
            if let Some(entity) = self
                .landblocks
                .get(adjacent)
                .and_then(|b| b.get_object(guid))
            {
                return Some(entity);
            }
        }
        None
    }

    /// Find an item wielded by a creature in a cell, optionally searching
    /// the loaded neighbors too. Does not recurse into inventories.
    pub fn find_wielded(
        &self,
        id: CellId,
        guid: ObjectGuid,
        search_adjacents: bool,
    ) -> Option<&Entity> {
        let block = self.landblocks.get(&id)?;
        if let Some(entity) = block.find_wielded(guid) {
            return Some(entity);
        }
        if search_adjacents {
            for adjacent in block.adjacents() {
                if let Some(entity) = self
                    .landblocks
                    .get(adjacent)
                    .and_then(|b| b.find_wielded(guid))
                {
                    return Some(entity);
                }
            }
        }
        None
    }

    /// Copy out a point-in-time view of the world: cell counts, residents
    /// by kind, the `top_n` busiest cells by average tick duration, and the
    /// data service's cache counts.
    pub fn snapshot(&self, top_n: usize) -> WorldSnapshot {
        let mut residents_by_kind = HashMap::new();
        for kind in [
            EntityKind::Player,
            EntityKind::Creature,
            EntityKind::Static,
            EntityKind::Dynamic,
            EntityKind::Missile,
            EntityKind::Other,
        ] {
            let count: usize = self
                .landblocks
                .values()
                .map(|b| b.count_of_kind(kind))
                .sum();
            if count > 0 {
                residents_by_kind.insert(kind, count);
            }
        }

        let mut busiest: Vec<CellStats> =
            self.landblocks.values().map(Landblock::stats).collect();
        busiest.sort_by(|a, b| b.tick.average.total_cmp(&a.tick.average));
        busiest.truncate(top_n);

        WorldSnapshot {
            loaded: self.landblocks.len(),
            dormant: self.landblocks.values().filter(|b| b.is_dormant()).count(),
            residents_by_kind,
            busiest,
            caches: self.services.data.cache_counts(),
        }
    }

    /// Add a soon-to-load cell to its loaded neighbors' adjacency lists and
    /// return those neighbors for the new cell's own list.
    fn link_neighbors(&mut self, id: CellId) -> Vec<CellId> {
        let loaded: Vec<CellId> = id
            .neighbors()
            .into_iter()
            .filter(|n| self.landblocks.contains_key(n))
            .collect();
        for neighbor in &loaded {
            if let Some(block) = self.landblocks.get_mut(neighbor) {
                let mut adjacents = block.adjacents().to_vec();
                if !adjacents.contains(&id) {
                    adjacents.push(id);
                    block.set_adjacents(adjacents);
                }
            }
        }
        loaded
    }
}

/// Background population: statics first (completing the population flag),
/// then persisted dynamics, then encounter spawns. Everything arrives on
/// the cell's tick thread through its action queue.
fn populate(id: CellId, services: &Services, sender: &ActionSender<Landblock>) {
    let statics = services.factory.create_batch(&services.data.static_instances(id));
    debug!(cell = %id, count = statics.len(), "statics created");
    sender.enqueue(Box::new(move |cell, _| {
        for entity in statics {
            if let Err(err) = cell.add_entity(entity) {
                warn!(cell = %cell.id(), %err, "static instance dropped");
            }
        }
        cell.mark_population_complete();
    }));

    let dynamics = services.factory.create_batch(&services.data.dynamic_instances(id));
    if !dynamics.is_empty() {
        debug!(cell = %id, count = dynamics.len(), "dynamics created");
        sender.enqueue(Box::new(move |cell, _| {
            for entity in dynamics {
                if let Err(err) = cell.add_entity(entity) {
                    warn!(cell = %cell.id(), %err, "dynamic instance dropped");
                }
            }
        }));
    }

    let mut encounters = Vec::new();
    for spec in services.data.encounters(id) {
        let Some(mut entity) = services.factory.create_from_template(spec.template_id) else {
            debug!(cell = %id, template = spec.template_id, "unknown encounter template");
            continue;
        };
        let x = (f32::from(spec.cell_x) * ENCOUNTER_STRIDE).clamp(0.5, 191.5);
        let y = (f32::from(spec.cell_y) * ENCOUNTER_STRIDE).clamp(0.5, 191.5);
        entity.position = Some(Position::new(id, x, y, 0.0));
        encounters.push(entity);
    }
    if !encounters.is_empty() {
        sender.enqueue(Box::new(move |cell, _| {
            for entity in encounters {
                if let Err(err) = cell.add_entity(entity) {
                    warn!(cell = %cell.id(), %err, "encounter spawn dropped");
                }
            }
        }));
    }
}
