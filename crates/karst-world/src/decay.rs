//! Time-to-rot bookkeeping for transient world objects.
//!
//! Decay uses sentinel values in `time_to_rot`: `None` means the default
//! lifetime applies on the first pass, `0` rots instantly, `-1` never rots,
//! and `-2` marks a completed decay awaiting disposal.

use karst_core::Entity;

use crate::config::WorldConfig;

/// Rotted instantly.
pub const ROT_INSTANT: f64 = 0.0;
/// Never rots.
pub const ROT_NEVER: f64 = -1.0;
/// Decay has completed; disposal is in progress.
pub const ROT_DONE: f64 = -2.0;

/// What the owning cell must do with an entity after a decay pass.
#[derive(Debug)]
pub enum Disposal {
    /// Nothing due.
    None,
    /// Remove the entity from the world now.
    Immediate,
    /// A corpse finished rotting: spill these items onto the cell, then
    /// tear the corpse down after a short delay.
    CorpseSpill {
        /// The corpse's former inventory, repositioned at the corpse.
        items: Vec<Entity>,
        /// Seconds to wait before removing the corpse itself.
        teardown_delay: f64,
    },
}

/// Whether an entity participates in decay at all.
///
/// Only dynamically-allocated objects decay, an explicit never-rot sentinel
/// opts out, and generators (or anything still linked to one) are managed
/// by their spawn lifecycle instead.
pub fn is_decayable(entity: &Entity) -> bool {
    if !entity.guid.is_dynamic() {
        return false;
    }
    if entity.time_to_rot == Some(ROT_NEVER) {
        return false;
    }
    if entity.is_generator() || entity.generator_id.is_some() {
        return false;
    }
    true
}

/// Advance an entity's decay clock by `elapsed` seconds and report the
/// required disposal.
pub fn apply(entity: &mut Entity, elapsed: f64, config: &WorldConfig) -> Disposal {
    if entity.decay_completed {
        return Disposal::None;
    }

    let Some(mut remaining) = entity.time_to_rot else {
        // First pass assigns the default lifetime without decrementing.
        entity.time_to_rot = Some(config.default_time_to_rot);
        return Disposal::None;
    };
    if remaining == ROT_NEVER {
        return Disposal::None;
    }

    if remaining != ROT_DONE {
        if let Some(container) = entity.container.as_ref().filter(|c| c.corpse) {
            if !container.contents_loaded {
                return Disposal::None;
            }
            // An empty corpse collapses on a short floor rather than
            // waiting out its full lifetime.
            if container.items.is_empty() && remaining > config.empty_corpse_floor {
                entity.time_to_rot = Some(config.empty_corpse_floor);
                return Disposal::None;
            }
        }

        if remaining > 0.0 {
            remaining -= elapsed;
            entity.time_to_rot = Some(remaining);
            if remaining > 0.0 {
                return Disposal::None;
            }
        }
        entity.time_to_rot = Some(ROT_DONE);
    }

    // Disposal waits while a player is looking inside.
    if entity.container.as_ref().is_some_and(|c| c.is_open) {
        return Disposal::None;
    }
    entity.decay_completed = true;

    let is_corpse = entity.container.as_ref().is_some_and(|c| c.corpse);
    if is_corpse {
        let position = entity.position;
        let mut items = Vec::new();
        if let Some(container) = entity.container.as_mut() {
            for (_, mut item) in container.items.drain() {
                item.position = position;
                item.mark_dirty();
                items.push(item);
            }
        }
        return Disposal::CorpseSpill {
            items,
            teardown_delay: config.corpse_teardown_delay,
        };
    }
    Disposal::Immediate
}

#[cfg(test)]
mod tests {
    use super::*;
    use karst_core::{CellId, ContainerState, EntityKind, ObjectGuid, Position};

    fn config() -> WorldConfig {
        WorldConfig::default()
    }

    fn item(guid: u32) -> Entity {
        Entity::new(ObjectGuid(guid), EntityKind::Dynamic, "item", 100)
            .at(Position::new(CellId::new(1, 1), 10.0, 10.0, 0.0))
    }

    #[test]
    fn static_guids_do_not_decay() {
        assert!(!is_decayable(&item(0x0000_1000)));
        assert!(is_decayable(&item(0x8000_0001)));
    }

    #[test]
    fn never_sentinel_opts_out() {
        let mut e = item(0x8000_0001);
        e.time_to_rot = Some(ROT_NEVER);
        assert!(!is_decayable(&e));
        assert!(matches!(apply(&mut e, 1000.0, &config()), Disposal::None));
        assert_eq!(e.time_to_rot, Some(ROT_NEVER));
    }

    #[test]
    fn generator_linked_objects_do_not_decay() {
        let mut e = item(0x8000_0001);
        e.generator_id = Some(ObjectGuid(0x2000));
        assert!(!is_decayable(&e));
    }

    #[test]
    fn first_pass_assigns_default_without_decrement() {
        let cfg = config();
        let mut e = item(0x8000_0001);
        assert!(matches!(apply(&mut e, 5.0, &cfg), Disposal::None));
        assert_eq!(e.time_to_rot, Some(cfg.default_time_to_rot));
    }

    #[test]
    fn counts_down_and_disposes() {
        let mut e = item(0x8000_0001);
        e.time_to_rot = Some(10.0);
        assert!(matches!(apply(&mut e, 5.0, &config()), Disposal::None));
        assert_eq!(e.time_to_rot, Some(5.0));
        assert!(matches!(apply(&mut e, 5.0, &config()), Disposal::Immediate));
        assert_eq!(e.time_to_rot, Some(ROT_DONE));
        assert!(e.decay_completed);
    }

    #[test]
    fn instant_sentinel_disposes_first_pass() {
        let mut e = item(0x8000_0001);
        e.time_to_rot = Some(ROT_INSTANT);
        assert!(matches!(apply(&mut e, 5.0, &config()), Disposal::Immediate));
    }

    #[test]
    fn disposal_is_idempotent() {
        let mut e = item(0x8000_0001);
        e.time_to_rot = Some(ROT_INSTANT);
        assert!(matches!(apply(&mut e, 5.0, &config()), Disposal::Immediate));
        assert!(matches!(apply(&mut e, 5.0, &config()), Disposal::None));
        assert!(matches!(apply(&mut e, 5.0, &config()), Disposal::None));
    }

    #[test]
    fn empty_corpse_collapses_to_floor() {
        let cfg = config();
        let mut corpse = item(0x8000_0001).with_container(ContainerState::corpse());
        corpse.time_to_rot = Some(200.0);
        assert!(matches!(apply(&mut corpse, 5.0, &cfg), Disposal::None));
        assert_eq!(corpse.time_to_rot, Some(cfg.empty_corpse_floor));

        // The floored lifetime runs out well before the 200s it started with.
        let disposal = apply(&mut corpse, cfg.empty_corpse_floor, &cfg);
        assert!(matches!(disposal, Disposal::CorpseSpill { items, .. } if items.is_empty()));
    }

    #[test]
    fn full_corpse_keeps_its_lifetime() {
        let mut corpse = item(0x8000_0001).with_container(ContainerState::corpse());
        corpse.add_to_inventory(item(0x8000_0002)).unwrap();
        corpse.time_to_rot = Some(200.0);
        assert!(matches!(apply(&mut corpse, 5.0, &config()), Disposal::None));
        assert_eq!(corpse.time_to_rot, Some(195.0));
    }

    #[test]
    fn unloaded_corpse_waits_for_contents() {
        let mut corpse = item(0x8000_0001).with_container(ContainerState::corpse());
        corpse.container.as_mut().unwrap().contents_loaded = false;
        corpse.time_to_rot = Some(1.0);
        assert!(matches!(apply(&mut corpse, 100.0, &config()), Disposal::None));
        assert_eq!(corpse.time_to_rot, Some(1.0));
    }

    #[test]
    fn open_container_defers_disposal() {
        let mut chest = item(0x8000_0001).with_container(ContainerState::loaded());
        chest.container.as_mut().unwrap().is_open = true;
        chest.time_to_rot = Some(1.0);
        assert!(matches!(apply(&mut chest, 5.0, &config()), Disposal::None));
        assert_eq!(chest.time_to_rot, Some(ROT_DONE));
        assert!(!chest.decay_completed);

        // Disposal proceeds once the viewer is gone.
        chest.container.as_mut().unwrap().is_open = false;
        assert!(matches!(apply(&mut chest, 5.0, &config()), Disposal::Immediate));
        assert!(chest.decay_completed);
    }

    #[test]
    fn corpse_spills_inventory_at_its_position() {
        let cfg = config();
        let mut corpse = item(0x8000_0001).with_container(ContainerState::corpse());
        corpse.add_to_inventory(item(0x8000_0002)).unwrap();
        corpse.add_to_inventory(item(0x8000_0003)).unwrap();
        corpse.time_to_rot = Some(1.0);

        let Disposal::CorpseSpill {
            items,
            teardown_delay,
        } = apply(&mut corpse, 5.0, &cfg)
        else {
            panic!("expected a corpse spill");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(teardown_delay, cfg.corpse_teardown_delay);
        for item in &items {
            assert_eq!(item.position, corpse.position);
            assert!(item.dirty);
        }
        assert_eq!(corpse.inventory_count(), 0);
    }
}
