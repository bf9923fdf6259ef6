//! Generator spawn engine: initial population, spawn-queue processing,
//! slot lifecycle notifications, and regeneration.

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use karst_core::{Entity, ObjectGuid, SpawnPlacement, SpawnTrigger, SpawnedInfo};

use crate::config::WorldConfig;
use crate::services::Services;

/// A lifecycle event reported to the generator that spawned an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorEvent {
    /// The spawned entity was destroyed.
    Destruction,
    /// The spawned entity was picked up by a player.
    PickUp,
}

/// Run one generator update pass on a generator entity.
///
/// Enqueues the initial population on the first pass, then drains due
/// spawn-queue slots: each due slot materializes an entity from the
/// profile's template (or rolls its treasure table) and places it per the
/// profile's placement policy. Entities placed into the world are returned
/// for the owning cell to stage; contained spawns land directly in the
/// generator's inventory. A slot that fails to produce a spawned instance
/// frees its reservation.
pub fn update_generator(
    entity: &mut Entity,
    services: &Services,
    rng: &mut StdRng,
    now: f64,
    config: &WorldConfig,
) -> Vec<Entity> {
    let Some(mut host) = entity.generator.take() else {
        return Vec::new();
    };
    let mut placed = Vec::new();

    if !host.initial_spawn_done {
        let mut reserved = 0i32;
        for idx in 0..host.profiles.len() {
            let cap = host.effective_max(idx);
            let profile = &mut host.profiles[idx];
            if profile.config.placeholder {
                continue;
            }
            // The spawn queue counts against the cap as soon as it is
            // enqueued, so an over-generous init_create is clamped here.
            let mut count = profile.config.init_create as usize;
            if cap >= 0 {
                count = count.min((cap as usize).saturating_sub(profile.current_create()));
            }
            for _ in 0..count {
                profile.spawn_queue.push(now);
                reserved += 1;
            }
        }
        host.current_create += reserved;
        host.initial_spawn_done = true;
    }

    for idx in 0..host.profiles.len() {
        let cap = host.effective_max(idx);
        let due = {
            let queue = &mut host.profiles[idx].spawn_queue;
            let before = queue.len();
            queue.retain(|&at| at > now);
            before - queue.len()
        };

        for _ in 0..due {
            let mut spawned_one = false;

            if host.profiles[idx].config.treasure {
                let prior: Vec<ObjectGuid> =
                    host.profiles[idx].spawned.keys().copied().collect();
                for guid in &prior {
                    entity.remove_from_inventory(*guid);
                }
                host.profiles[idx].spawned.clear();
                host.current_create -= prior.len() as i32;
            }

            if cap >= 0 && host.profiles[idx].spawned.len() as i32 >= cap {
                host.current_create -= 1;
                continue;
            }

            let template_id = host.profiles[idx].config.template_id;
            let placement = host.profiles[idx].config.placement;

            if host.profiles[idx].config.treasure {
                let Some(table) = services.data.treasure_table(template_id) else {
                    debug!(generator = %entity.guid, table = template_id, "unknown treasure table");
                    host.current_create -= 1;
                    continue;
                };
                for entry in &table.entries {
                    if rng.random_range(0.0..1.0) >= entry.chance {
                        continue;
                    }
                    let Some(item) = services.factory.create_from_template(entry.template_id)
                    else {
                        debug!(template = entry.template_id, "unknown treasure template");
                        continue;
                    };
                    if let Some(info) = place_spawn(entity, placement, item, services, &mut placed)
                    {
                        host.profiles[idx].spawned.insert(info.guid, info);
                        host.generated_treasure = true;
                        spawned_one = true;
                    }
                }
            } else {
                let Some(item) = services.factory.create_from_template(template_id) else {
                    debug!(generator = %entity.guid, template = template_id, "unknown template");
                    host.current_create -= 1;
                    continue;
                };
                if let Some(info) = place_spawn(entity, placement, item, services, &mut placed) {
                    host.profiles[idx].spawned.insert(info.guid, info);
                    spawned_one = true;
                }
            }

            if !spawned_one {
                host.current_create -= 1;
            }
        }
    }

    entity.next_generator_update_at = now + config.generator_update_interval;
    entity.generator = Some(host);
    placed
}

/// Place one freshly-materialized spawn per policy. Returns the spawned
/// descriptor on success; world placements are pushed to `placed` for the
/// cell to stage, contained placements go into the generator's inventory.
fn place_spawn(
    generator: &mut Entity,
    placement: SpawnPlacement,
    mut item: Entity,
    services: &Services,
    placed: &mut Vec<Entity>,
) -> Option<SpawnedInfo> {
    item.generator_id = Some(generator.guid);
    let info = SpawnedInfo {
        guid: item.guid,
        template_id: item.template_id,
    };

    match placement {
        SpawnPlacement::Contain | SpawnPlacement::Shop => {
            if let Err(err) = generator.add_to_inventory(item) {
                debug!(generator = %generator.guid, %err, "contained spawn rejected");
                return None;
            }
        }
        SpawnPlacement::Absolute(pos) => {
            let origin = generator.position?;
            if pos.cell != origin.cell {
                debug!(generator = %generator.guid, target = %pos, "absolute spawn outside cell");
                return None;
            }
            if !services.placement.place_at(&mut item, &pos) {
                return None;
            }
            placed.push(item);
        }
        SpawnPlacement::Offset { dx, dy, dz } => {
            let origin = generator.position?;
            if !services.placement.place_at(&mut item, &origin.offset(dx, dy, dz)) {
                return None;
            }
            placed.push(item);
        }
        SpawnPlacement::Scatter { radius } => {
            let origin = generator.position?;
            if !services.placement.random_scatter(&mut item, &origin, radius) {
                debug!(generator = %generator.guid, "scatter placement exhausted retries");
                return None;
            }
            placed.push(item);
        }
        SpawnPlacement::Default => {
            let origin = generator.position?;
            if !services.placement.place_at(&mut item, &origin) {
                return None;
            }
            placed.push(item);
        }
    }
    Some(info)
}

/// Run one regeneration pass: process due removal-queue entries, freeing
/// their slots, then top the spawn queue back up to the initial population
/// when slots have freed.
pub fn regenerate(entity: &mut Entity, now: f64, config: &WorldConfig) {
    let interval = {
        let Some(host) = entity.generator.as_mut() else {
            return;
        };
        let mut freed = 0i32;
        for profile in &mut host.profiles {
            while let Some(&(at, guid)) = profile.remove_queue.front() {
                if at > now {
                    break;
                }
                profile.remove_queue.pop_front();
                if profile.spawned.remove(&guid).is_some() {
                    freed += 1;
                }
            }
        }
        host.current_create -= freed;

        if host.initial_spawn_done {
            let mut reserved = 0i32;
            for idx in 0..host.profiles.len() {
                let cap = host.effective_max(idx);
                let profile = &mut host.profiles[idx];
                if profile.config.placeholder {
                    continue;
                }
                let mut shortfall = (profile.config.init_create as usize)
                    .saturating_sub(profile.current_create());
                if cap >= 0 {
                    shortfall =
                        shortfall.min((cap as usize).saturating_sub(profile.current_create()));
                }
                for _ in 0..shortfall {
                    profile.spawn_queue.push(now);
                    reserved += 1;
                }
            }
            host.current_create += reserved;
        }

        if host.regeneration_interval > 0.0 {
            host.regeneration_interval
        } else {
            config.generator_update_interval
        }
    };
    entity.next_regeneration_at = now + interval;
}

/// Report a spawned instance's lifecycle event to its generator. A matching
/// trigger enqueues the slot for removal after the profile's respawn delay.
///
/// Only instances of the profile's own template participate: treasure loot
/// carries the rolled item's template rather than the table id, so its
/// lifecycle stays with the re-roll instead of the removal queue.
///
/// A pickup is coerced to a destruction for destruction-triggered profiles,
/// since the instance leaves the cell either way. An unset trigger is
/// rewritten to destruction the first time a destruction arrives.
pub fn notify(entity: &mut Entity, target: ObjectGuid, event: GeneratorEvent, now: f64) {
    let Some(host) = entity.generator.as_mut() else {
        return;
    };
    let delays: Vec<f64> = (0..host.profiles.len()).map(|i| host.delay(i)).collect();

    for (idx, profile) in host.profiles.iter_mut().enumerate() {
        let Some(info) = profile.spawned.get(&target) else {
            continue;
        };
        if info.template_id != profile.config.template_id {
            continue;
        }
        let mut trigger = profile.config.trigger;
        if trigger == SpawnTrigger::Undef && event == GeneratorEvent::Destruction {
            warn!(generator = %entity.guid, template = profile.config.template_id,
                "unset spawn trigger, rewriting to destruction");
            profile.config.trigger = SpawnTrigger::Destruction;
            trigger = SpawnTrigger::Destruction;
        }
        let effective = match (event, trigger) {
            (GeneratorEvent::PickUp, SpawnTrigger::Destruction) => SpawnTrigger::Destruction,
            (GeneratorEvent::PickUp, _) => SpawnTrigger::PickUp,
            (GeneratorEvent::Destruction, _) => SpawnTrigger::Destruction,
        };
        if trigger == effective {
            profile.remove_queue.push_back((now + delays[idx], target));
        }
    }
}
