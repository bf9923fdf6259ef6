//! A spatial cell: the unit of simulation ownership.
//!
//! Each cell owns its resident entities outright and is ticked by exactly
//! one thread at a time, so all mutation happens tick-locally. Cross-thread
//! input arrives through the cell's action queue, and membership changes
//! made mid-tick are staged and applied at defined points rather than
//! mutating the live set under iteration.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use karst_core::{CellId, Entity, EntityKind, ObjectGuid};

use crate::action::{ActionQueue, ActionSender, run_isolated};
use crate::config::WorldConfig;
use crate::decay::{self, Disposal, ROT_INSTANT, ROT_NEVER};
use crate::diagnostics::{CellStats, TickMonitor};
use crate::error::{WorldError, WorldResult};
use crate::generator::{self, GeneratorEvent};
use crate::persist;
use crate::schedule::ScheduleList;
use crate::services::Services;

/// One simulated cell and everything resident in it.
pub struct Landblock {
    id: CellId,
    config: WorldConfig,
    services: Services,
    rng: StdRng,

    world_objects: HashMap<ObjectGuid, Entity>,
    pending_additions: HashMap<ObjectGuid, Entity>,
    pending_removals: Vec<ObjectGuid>,

    players: Vec<ObjectGuid>,
    creature_rotation: VecDeque<ObjectGuid>,
    heartbeats: ScheduleList,
    generator_updates: ScheduleList,
    regenerations: ScheduleList,

    queue: ActionQueue<Landblock>,
    adjacents: Vec<CellId>,

    permaload: bool,
    dormant: bool,
    unload_requested: bool,
    population_complete: bool,

    last_active_at: f64,
    last_heartbeat_at: Option<f64>,
    last_save_at: Option<f64>,
    monitor: TickMonitor,
}

impl Landblock {
    /// Create an empty cell. Its RNG stream is derived from the world seed
    /// and the cell id, so two worlds with one seed replay identically.
    pub fn new(id: CellId, config: WorldConfig, services: Services, now: f64) -> Self {
        let rng = StdRng::seed_from_u64(config.seed ^ u64::from(id.raw()));
        Self {
            id,
            config,
            services,
            rng,
            world_objects: HashMap::new(),
            pending_additions: HashMap::new(),
            pending_removals: Vec::new(),
            players: Vec::new(),
            creature_rotation: VecDeque::new(),
            heartbeats: ScheduleList::new(),
            generator_updates: ScheduleList::new(),
            regenerations: ScheduleList::new(),
            queue: ActionQueue::new(),
            adjacents: Vec::new(),
            permaload: false,
            dormant: false,
            unload_requested: false,
            population_complete: false,
            last_active_at: now,
            last_heartbeat_at: None,
            last_save_at: None,
            monitor: TickMonitor::new(now),
        }
    }

    /// The cell id.
    pub fn id(&self) -> CellId {
        self.id
    }

    /// A producer handle for enqueueing work from any thread.
    pub fn sender(&self) -> ActionSender<Landblock> {
        self.queue.sender()
    }

    /// Whether the cell is dormant.
    pub fn is_dormant(&self) -> bool {
        self.dormant
    }

    /// Whether the cell has requested unload.
    pub fn unload_requested(&self) -> bool {
        self.unload_requested
    }

    /// Whether the cell is pinned in memory.
    pub fn is_permaload(&self) -> bool {
        self.permaload
    }

    /// Pin or unpin the cell.
    pub fn set_permaload(&mut self, permaload: bool) {
        self.permaload = permaload;
        if permaload {
            self.unload_requested = false;
        }
    }

    /// Whether the background population finished.
    pub fn population_complete(&self) -> bool {
        self.population_complete
    }

    /// Record that the background population finished.
    pub fn mark_population_complete(&mut self) {
        self.population_complete = true;
    }

    /// Cell ids this cell treats as adjacent.
    pub fn adjacents(&self) -> &[CellId] {
        &self.adjacents
    }

    /// Replace the adjacency set.
    pub fn set_adjacents(&mut self, adjacents: Vec<CellId>) {
        self.adjacents = adjacents;
    }

    /// Entities in the applied live set.
    pub fn resident_count(&self) -> usize {
        self.world_objects.len()
    }

    /// Count applied residents of one kind.
    pub fn count_of_kind(&self, kind: EntityKind) -> usize {
        self.world_objects.values().filter(|e| e.kind == kind).count()
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> CellStats {
        CellStats {
            id: self.id,
            residents: self.world_objects.len(),
            dormant: self.dormant,
            tick: self.monitor.stats(),
        }
    }

    /// Wake the cell: clear dormancy and refresh the activity clock.
    pub fn set_active(&mut self, now: f64) {
        self.dormant = false;
        self.unload_requested = false;
        self.last_active_at = now;
    }

    /// Stage an entity for membership. The entity must be positioned.
    ///
    /// Adding a guid that is already live only cancels any pending removal;
    /// staging the same guid twice keeps the last entity staged.
    pub fn add_entity(&mut self, entity: Entity) -> WorldResult<()> {
        if entity.position.is_none() {
            return Err(WorldError::MissingPosition(entity.guid));
        }
        let guid = entity.guid;
        if self.world_objects.contains_key(&guid) {
            self.pending_removals.retain(|g| *g != guid);
            return Ok(());
        }
        self.pending_additions.insert(guid, entity);
        Ok(())
    }

    /// Stage an entity for removal.
    ///
    /// `adjacency_move` suppresses the visual teardown for entities that
    /// are merely crossing into a neighboring cell. `from_pickup` runs the
    /// pickup side effects: the decay clock resets unless an explicit
    /// instant/never sentinel was set, and the spawning generator is told
    /// its instance left.
    pub fn remove_entity(&mut self, guid: ObjectGuid, adjacency_move: bool, from_pickup: bool, now: f64) {
        if from_pickup {
            let mut generator_guid = None;
            let entry = if self.world_objects.contains_key(&guid) {
                self.world_objects.get_mut(&guid)
            } else {
                self.pending_additions.get_mut(&guid)
            };
            if let Some(entity) = entry {
                match entity.time_to_rot {
                    Some(t) if t == ROT_INSTANT || t == ROT_NEVER => {}
                    _ => entity.time_to_rot = None,
                }
                generator_guid = entity.generator_id.take();
            }
            if let Some(gen_guid) = generator_guid {
                if let Some(spawner) = self.world_objects.get_mut(&gen_guid) {
                    generator::notify(spawner, guid, GeneratorEvent::PickUp, now);
                }
            }
        }

        if self.world_objects.contains_key(&guid) {
            if !self.pending_removals.contains(&guid) {
                self.pending_removals.push(guid);
            }
            if !adjacency_move {
                if let Some(entity) = self.world_objects.get(&guid) {
                    self.services.broadcast.notify_nearby(entity, "removed");
                    self.services.placement.remove_from_world(entity);
                }
            }
        } else if self.pending_additions.remove(&guid).is_some() {
            debug!(cell = %self.id, %guid, "staged addition cancelled");
        } else {
            warn!(cell = %self.id, %guid, "remove of unknown entity ignored");
        }
    }

    /// Destroy an entity: its generator's slot frees per its trigger, then
    /// the entity is staged for removal.
    pub fn destroy_entity(&mut self, guid: ObjectGuid, now: f64) {
        let generator_guid = self.get_object(guid).and_then(|e| e.generator_id);
        if let Some(gen_guid) = generator_guid {
            if let Some(spawner) = self.world_objects.get_mut(&gen_guid) {
                generator::notify(spawner, guid, GeneratorEvent::Destruction, now);
            }
        }
        self.remove_entity(guid, false, false, now);
    }

    /// Look up an entity, observing staged changes: a pending removal hides
    /// a live entity, a pending addition is already visible.
    pub fn get_object(&self, guid: ObjectGuid) -> Option<&Entity> {
        if self.pending_removals.contains(&guid) {
            return None;
        }
        if let Some(entity) = self.pending_additions.get(&guid) {
            return Some(entity);
        }
        self.world_objects.get(&guid)
    }

    /// Find an item wielded by any resident creature.
    pub fn find_wielded(&self, guid: ObjectGuid) -> Option<&Entity> {
        self.world_objects
            .values()
            .filter_map(|e| e.creature.as_ref())
            .find_map(|c| c.equipped.get(&guid))
    }

    /// Run one simulation tick at `now`.
    pub fn tick(&mut self, now: f64) {
        let started = Instant::now();

        let actions = self.queue.take_due(now);
        run_isolated(self, actions, now, "cell action queue");
        self.apply_staged(now);

        if !self.players.is_empty() {
            self.last_active_at = now;
            self.dormant = false;
        }

        if !self.dormant {
            self.tick_creatures(now);
        }
        self.tick_heartbeats(now);
        self.tick_generator_updates(now);
        self.tick_regenerations(now);

        let heartbeat_due = match self.last_heartbeat_at {
            None => true,
            Some(prev) => now - prev >= self.config.heartbeat_interval,
        };
        if heartbeat_due {
            self.heartbeat(now);
        }

        let save_due = match self.last_save_at {
            None => true,
            Some(prev) => now - prev >= self.config.save_interval,
        };
        if save_due {
            self.apply_staged(now);
            self.save(now);
        }

        self.monitor.record(started.elapsed().as_secs_f64());
        self.monitor.maybe_clear(now, self.config.monitor_clear_interval);
    }

    /// One rotation through the resident creatures, running AI for those
    /// whose interval has elapsed. Each creature is visited once per tick.
    fn tick_creatures(&mut self, now: f64) {
        for _ in 0..self.creature_rotation.len() {
            let Some(guid) = self.creature_rotation.pop_front() else {
                break;
            };
            let Some(entity) = self.world_objects.get_mut(&guid) else {
                continue; // stale rotation entry, dropped
            };
            if let Some(creature) = entity.creature.as_mut() {
                if creature.next_ai_at <= now {
                    creature.next_ai_at = now + creature.ai_interval;
                }
            }
            self.creature_rotation.push_back(guid);
        }
    }

    /// Drain the due general-heartbeat entries and reschedule each.
    fn tick_heartbeats(&mut self, now: f64) {
        while let Some(guid) = self.heartbeats.pop_ready(now) {
            let next = {
                let Some(entity) = self.world_objects.get_mut(&guid) else {
                    continue;
                };
                // A container whose viewer left the cell closes itself.
                let viewer_gone = entity
                    .container
                    .as_ref()
                    .and_then(|c| c.viewer)
                    .is_some_and(|v| !self.players.contains(&v));
                if let Some(container) = entity.container.as_mut().filter(|_| viewer_gone) {
                    container.is_open = false;
                    container.viewer = None;
                }
                // A non-positive interval would reschedule at `now` and be
                // popped again forever; such entries run once and drop out.
                if entity.heartbeat_interval <= 0.0 {
                    continue;
                }
                entity.next_heartbeat_at = now + entity.heartbeat_interval;
                entity.next_heartbeat_at
            };
            self.heartbeats.insert(next, guid);
        }
    }

    /// Drain the due generator-update entries, staging whatever each
    /// generator placed into the world. Rescheduling appends at the tail:
    /// the list shares one fixed interval, so tail order is time order.
    fn tick_generator_updates(&mut self, now: f64) {
        let mut due = Vec::new();
        while let Some(guid) = self.generator_updates.pop_ready(now) {
            due.push(guid);
        }
        for guid in due {
            let (placed, next) = {
                let Some(entity) = self.world_objects.get_mut(&guid) else {
                    continue;
                };
                let placed = generator::update_generator(
                    entity,
                    &self.services,
                    &mut self.rng,
                    now,
                    &self.config,
                );
                (placed, entity.next_generator_update_at)
            };
            for spawn in placed {
                if let Err(err) = self.add_entity(spawn) {
                    warn!(cell = %self.id, %err, "generated spawn could not be staged");
                }
            }
            self.generator_updates.push_back(next, guid);
        }
    }

    /// Drain the due regeneration entries; intervals vary per generator, so
    /// rescheduling is a sorted reinsert.
    fn tick_regenerations(&mut self, now: f64) {
        let mut due = Vec::new();
        while let Some(guid) = self.regenerations.pop_ready(now) {
            due.push(guid);
        }
        for guid in due {
            let next = {
                let Some(entity) = self.world_objects.get_mut(&guid) else {
                    continue;
                };
                generator::regenerate(entity, now, &self.config);
                entity.next_regeneration_at
            };
            self.regenerations.insert(next, guid);
        }
    }

    /// The periodic heartbeat block: apply staged membership, run decay for
    /// the elapsed window, and evaluate dormancy and unload eligibility.
    /// The first heartbeat only anchors the clock; decay needs a measured
    /// elapsed window.
    fn heartbeat(&mut self, now: f64) {
        self.apply_staged(now);

        if let Some(prev) = self.last_heartbeat_at {
            self.run_decay(now - prev, now);
        }

        if self.players.is_empty() {
            let idle = now - self.last_active_at;
            if !self.dormant && idle >= self.config.dormant_after {
                debug!(cell = %self.id, idle, "cell going dormant");
                self.dormant = true;
            }
            if !self.permaload && idle >= self.config.unload_after {
                self.unload_requested = true;
            }
        }

        self.last_heartbeat_at = Some(now);
    }

    /// Advance decay for every decayable resident and carry out disposals.
    fn run_decay(&mut self, elapsed: f64, now: f64) {
        let guids: Vec<ObjectGuid> = self.world_objects.keys().copied().collect();
        for guid in guids {
            let disposal = {
                let Some(entity) = self.world_objects.get_mut(&guid) else {
                    continue;
                };
                if !decay::is_decayable(entity) {
                    continue;
                }
                decay::apply(entity, elapsed, &self.config)
            };
            match disposal {
                Disposal::None => {}
                Disposal::Immediate => {
                    if let Some(entity) = self.world_objects.get(&guid) {
                        self.services.broadcast.notify_nearby(entity, "rotted away");
                    }
                    self.remove_entity(guid, false, false, now);
                }
                Disposal::CorpseSpill {
                    items,
                    teardown_delay,
                } => {
                    let mut batch = Vec::new();
                    for mut item in items {
                        persist::collect_dirty(&mut item, &mut batch);
                        if let Err(err) = self.add_entity(item) {
                            warn!(cell = %self.id, %err, "spilled item could not be staged");
                        }
                    }
                    persist::submit(self.services.persistence.as_ref(), batch);
                    if let Some(corpse) = self.world_objects.get(&guid) {
                        self.services
                            .broadcast
                            .notify_nearby(corpse, "crumbles to dust");
                    }
                    self.queue.enqueue_delayed(
                        now + teardown_delay,
                        Box::new(move |cell: &mut Landblock, t| {
                            cell.remove_entity(guid, false, false, t);
                        }),
                    );
                }
            }
        }
    }

    /// Apply staged membership changes to the live set and index the
    /// arrivals into the players list, creature rotation, and schedules.
    fn apply_staged(&mut self, now: f64) {
        for guid in std::mem::take(&mut self.pending_removals) {
            if let Some(entity) = self.world_objects.remove(&guid) {
                self.players.retain(|g| *g != guid);
                self.creature_rotation.retain(|g| *g != guid);
                self.heartbeats.remove(guid);
                self.generator_updates.remove(guid);
                self.regenerations.remove(guid);
                debug!(cell = %self.id, %guid, kind = %entity.kind, "entity removed");
            }
        }

        for (guid, entity) in std::mem::take(&mut self.pending_additions) {
            if entity.kind == EntityKind::Player {
                if !self.players.contains(&guid) {
                    self.players.push(guid);
                }
                self.set_active(now);
            } else if entity.creature.is_some() {
                self.creature_rotation.push_back(guid);
            }
            self.heartbeats.insert(entity.next_heartbeat_at, guid);
            self.generator_updates.insert(entity.next_generator_update_at, guid);
            self.regenerations.insert(entity.next_regeneration_at, guid);
            self.world_objects.insert(guid, entity);
        }
    }

    /// Collect every dirty persistent resident into one batch and hand it
    /// to the sink.
    fn save(&mut self, now: f64) {
        let mut batch = Vec::new();
        for entity in self.world_objects.values_mut() {
            persist::collect_dirty(entity, &mut batch);
        }
        if !batch.is_empty() {
            debug!(cell = %self.id, count = batch.len(), "persistence pass");
        }
        persist::submit(self.services.persistence.as_ref(), batch);
        self.last_save_at = Some(now);
    }

    /// Unload the cell: drain remaining work, save everything dirty, tear
    /// down residents, and close the queue so late completions are dropped.
    pub fn unload(&mut self, now: f64) {
        let actions = self.queue.take_due(f64::MAX);
        run_isolated(self, actions, now, "cell unload drain");
        self.apply_staged(now);
        self.save(now);

        for entity in self.world_objects.values() {
            self.services.placement.remove_from_world(entity);
        }
        let residents = self.world_objects.len();
        self.world_objects.clear();
        self.players.clear();
        self.creature_rotation.clear();
        self.heartbeats = ScheduleList::new();
        self.generator_updates = ScheduleList::new();
        self.regenerations = ScheduleList::new();
        self.queue.close();
        info!(cell = %self.id, residents, "cell unloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use karst_core::{
        ContainerState, EntityTemplate, GeneratorHost, PersistenceClass, Position,
        ProfileConfig,
    };

    use crate::services::{
        MemoryDataService, MemoryFactory, MemorySink, NullBroadcast, OpenPlacement,
    };

    const CELL: CellId = CellId { x: 10, y: 10 };

    fn services_with_sink() -> (Services, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let services = Services {
            factory: Arc::new(MemoryFactory::new(vec![EntityTemplate::new(
                100,
                EntityKind::Creature,
                "drudge",
            )])),
            data: Arc::new(MemoryDataService::default()),
            placement: Arc::new(OpenPlacement::new(0)),
            broadcast: Arc::new(NullBroadcast),
            persistence: Arc::clone(&sink) as Arc<dyn crate::services::PersistenceSink>,
        };
        (services, sink)
    }

    fn block() -> Landblock {
        let (services, _) = services_with_sink();
        Landblock::new(CELL, WorldConfig::default(), services, 0.0)
    }

    fn pos() -> Position {
        Position::new(CELL, 50.0, 50.0, 0.0)
    }

    fn item(guid: u32) -> Entity {
        Entity::new(ObjectGuid(guid), EntityKind::Dynamic, "item", 7).at(pos())
    }

    #[test]
    fn add_requires_position() {
        let mut block = block();
        let bare = Entity::new(ObjectGuid(0x8000_0001), EntityKind::Dynamic, "item", 7);
        assert!(matches!(
            block.add_entity(bare),
            Err(WorldError::MissingPosition(_))
        ));
    }

    #[test]
    fn staged_addition_is_visible_then_applied() {
        let mut block = block();
        let guid = ObjectGuid(0x8000_0001);
        block.add_entity(item(guid.0)).unwrap();

        assert!(block.get_object(guid).is_some());
        assert_eq!(block.resident_count(), 0);

        block.tick(0.0);
        assert_eq!(block.resident_count(), 1);
        assert!(block.get_object(guid).is_some());
    }

    #[test]
    fn add_then_remove_before_apply_cancels() {
        let mut block = block();
        let guid = ObjectGuid(0x8000_0001);
        block.add_entity(item(guid.0)).unwrap();
        block.remove_entity(guid, false, false, 0.0);

        assert!(block.get_object(guid).is_none());
        block.tick(0.0);
        assert_eq!(block.resident_count(), 0);
    }

    #[test]
    fn removal_of_live_entity_hides_then_applies() {
        let mut block = block();
        let guid = ObjectGuid(0x8000_0001);
        block.add_entity(item(guid.0)).unwrap();
        block.tick(0.0);

        block.remove_entity(guid, false, false, 1.0);
        assert!(block.get_object(guid).is_none());
        assert_eq!(block.resident_count(), 1);

        block.tick(1.0);
        assert_eq!(block.resident_count(), 0);
    }

    #[test]
    fn re_adding_a_live_entity_cancels_pending_removal() {
        let mut block = block();
        let guid = ObjectGuid(0x8000_0001);
        block.add_entity(item(guid.0)).unwrap();
        block.tick(0.0);

        block.remove_entity(guid, false, false, 1.0);
        block.add_entity(item(guid.0)).unwrap();
        assert!(block.get_object(guid).is_some());

        block.tick(1.0);
        assert_eq!(block.resident_count(), 1);
    }

    #[test]
    fn queued_actions_run_during_tick() {
        let mut block = block();
        let sender = block.sender();
        sender.enqueue(Box::new(|cell, _| {
            cell.add_entity(item(0x8000_0001)).unwrap();
        }));

        block.tick(0.0);
        assert_eq!(block.resident_count(), 1);
    }

    #[test]
    fn generator_spawns_become_residents() {
        let mut block = block();
        let generator = Entity::new(ObjectGuid(0x2000), EntityKind::Static, "spawner", 50)
            .at(pos())
            .with_generator(GeneratorHost::new(
                vec![ProfileConfig::simple(100, 2, 2)],
                2,
                60.0,
            ));
        block.add_entity(generator).unwrap();

        // Update runs on the first tick; the heartbeat applies the spawns.
        block.tick(0.0);

        assert_eq!(block.count_of_kind(EntityKind::Creature), 2);
        let spawned: Vec<ObjectGuid> = block
            .world_objects
            .values()
            .filter(|e| e.generator_id == Some(ObjectGuid(0x2000)))
            .map(|e| e.guid)
            .collect();
        assert_eq!(spawned.len(), 2);
    }

    #[test]
    fn pickup_clears_decay_and_frees_generator_slot() {
        let mut block = block();
        let generator = Entity::new(ObjectGuid(0x2000), EntityKind::Static, "spawner", 50)
            .at(pos())
            .with_generator(GeneratorHost::new(
                vec![ProfileConfig::simple(100, 1, 1)],
                1,
                60.0,
            ));
        block.add_entity(generator).unwrap();
        block.tick(0.0);

        let spawned = block
            .world_objects
            .values()
            .find(|e| e.generator_id == Some(ObjectGuid(0x2000)))
            .map(|e| e.guid)
            .unwrap();

        block.remove_entity(spawned, false, true, 3.0);
        let spawner = block.world_objects.get(&ObjectGuid(0x2000)).unwrap();
        let host = spawner.generator.as_ref().unwrap();
        assert_eq!(host.profiles[0].remove_queue.len(), 1);
    }

    #[test]
    fn heartbeat_closes_container_whose_viewer_left() {
        let mut block = block();
        let chest_guid = ObjectGuid(0x8000_0001);
        let mut chest = item(chest_guid.0)
            .with_container(ContainerState::loaded())
            .with_heartbeat(5.0);
        {
            let container = chest.container.as_mut().unwrap();
            container.is_open = true;
            container.viewer = Some(ObjectGuid(0x5000_0001));
        }
        block.add_entity(chest).unwrap();
        block.tick(0.0);
        block.tick(5.0);

        let container = block
            .get_object(chest_guid)
            .and_then(|e| e.container.as_ref())
            .unwrap();
        assert!(!container.is_open);
        assert!(container.viewer.is_none());
    }

    #[test]
    fn zero_heartbeat_interval_runs_once_and_drops_out() {
        let mut block = block();
        let guid = ObjectGuid(0x8000_0001);
        block.add_entity(item(guid.0).with_heartbeat(0.0)).unwrap();

        block.tick(0.0);
        block.tick(5.0);

        assert!(block.get_object(guid).is_some());
        assert_eq!(block.resident_count(), 1);
    }

    #[test]
    fn decay_runs_between_heartbeats() {
        let mut block = block();
        let mut rot = item(0x8000_0001);
        rot.time_to_rot = Some(0.0);
        block.add_entity(rot).unwrap();

        block.tick(0.0); // first heartbeat anchors the clock, no decay
        assert_eq!(block.resident_count(), 1);

        block.tick(5.0); // second heartbeat decays instantly, stages removal
        assert!(block.get_object(ObjectGuid(0x8000_0001)).is_none());

        block.tick(6.0);
        assert_eq!(block.resident_count(), 0);
    }

    #[test]
    fn corpse_spill_lands_items_and_tears_corpse_down() {
        let mut block = block();
        let corpse_guid = ObjectGuid(0x8000_0001);
        let mut corpse = item(corpse_guid.0).with_container(ContainerState::corpse());
        corpse.add_to_inventory(item(0x8000_0002)).unwrap();
        corpse.add_to_inventory(item(0x8000_0003)).unwrap();
        corpse.time_to_rot = Some(1.0);
        block.add_entity(corpse).unwrap();

        block.tick(0.0);
        block.tick(5.0); // decay completes; items staged, teardown queued
        block.tick(10.0); // items applied, delayed teardown runs and applies

        assert!(block.get_object(corpse_guid).is_none());
        assert!(block.get_object(ObjectGuid(0x8000_0002)).is_some());
        assert!(block.get_object(ObjectGuid(0x8000_0003)).is_some());
        block.tick(11.0);
        assert_eq!(block.resident_count(), 2);
    }

    #[test]
    fn idle_cell_goes_dormant_then_requests_unload() {
        let mut block = block();
        block.tick(0.0);
        assert!(!block.is_dormant());

        block.tick(61.0);
        assert!(block.is_dormant());
        assert!(!block.unload_requested());

        block.tick(301.0);
        assert!(block.unload_requested());
    }

    #[test]
    fn players_keep_cell_awake() {
        let mut block = block();
        let player =
            Entity::new(ObjectGuid(0x5000_0001), EntityKind::Player, "hero", 1).at(pos());
        block.add_entity(player).unwrap();
        block.tick(0.0);

        block.tick(61.0);
        assert!(!block.is_dormant());
        block.tick(301.0);
        assert!(!block.unload_requested());
    }

    #[test]
    fn permaload_blocks_unload_request() {
        let mut block = block();
        block.set_permaload(true);
        block.tick(0.0);
        block.tick(301.0);
        assert!(block.is_dormant());
        assert!(!block.unload_requested());
    }

    #[test]
    fn first_tick_saves_dirty_persistent_entities() {
        let (services, sink) = services_with_sink();
        let mut block = Landblock::new(CELL, WorldConfig::default(), services, 0.0);
        let mut e = item(0x8000_0001).with_persistence(PersistenceClass::Dynamic);
        e.mark_dirty();
        block.add_entity(e).unwrap();

        block.tick(0.0);
        assert_eq!(sink.saved_count(), 1);

        // Nothing new to save on the next pass.
        block.tick(300.0);
        assert_eq!(sink.saved_count(), 1);
    }

    #[test]
    fn unload_saves_and_closes_queue() {
        let (services, sink) = services_with_sink();
        let mut block = Landblock::new(CELL, WorldConfig::default(), services, 0.0);
        let mut e = item(0x8000_0001).with_persistence(PersistenceClass::Dynamic);
        e.mark_dirty();
        block.add_entity(e).unwrap();

        let sender = block.sender();
        block.unload(1.0);

        assert_eq!(block.resident_count(), 0);
        assert_eq!(sink.saved_count(), 1);

        // Late completions for an unloaded cell are dropped.
        sender.enqueue(Box::new(|cell, _| {
            cell.add_entity(item(0x8000_0009)).unwrap();
        }));
        block.tick(2.0);
        assert_eq!(block.resident_count(), 0);
    }

    proptest::proptest! {
        #[test]
        fn live_set_matches_last_staged_operation(
            ops in proptest::collection::vec((0u32..8, proptest::prelude::any::<bool>()), 0..32),
        ) {
            let mut block = block();
            let mut model = std::collections::HashSet::new();
            for (n, add) in ops {
                let guid = 0x8000_0000 + n;
                if add {
                    block.add_entity(item(guid)).unwrap();
                    model.insert(n);
                } else {
                    block.remove_entity(ObjectGuid(guid), false, false, 0.0);
                    model.remove(&n);
                }
            }
            block.tick(0.0);
            proptest::prop_assert_eq!(block.resident_count(), model.len());
            for n in model {
                proptest::prop_assert!(block.get_object(ObjectGuid(0x8000_0000 + n)).is_some());
            }
        }
    }

    #[test]
    fn destroy_notifies_generator() {
        let mut block = block();
        let generator = Entity::new(ObjectGuid(0x2000), EntityKind::Static, "spawner", 50)
            .at(pos())
            .with_generator(GeneratorHost::new(
                vec![ProfileConfig::simple(100, 1, 1)],
                1,
                60.0,
            ));
        block.add_entity(generator).unwrap();
        block.tick(0.0);

        let spawned = block
            .world_objects
            .values()
            .find(|e| e.generator_id == Some(ObjectGuid(0x2000)))
            .map(|e| e.guid)
            .unwrap();
        block.destroy_entity(spawned, 3.0);

        let spawner = block.world_objects.get(&ObjectGuid(0x2000)).unwrap();
        assert_eq!(spawner.generator.as_ref().unwrap().profiles[0].remove_queue.len(), 1);
        assert!(block.get_object(spawned).is_none());
    }
}
