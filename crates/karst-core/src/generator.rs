use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::entity::ObjectGuid;
use crate::position::Position;

/// The lifecycle event that frees a generated instance's slot for respawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnTrigger {
    /// Malformed data: no trigger configured. Treated as `Destruction` when
    /// a destruction event arrives.
    #[default]
    Undef,
    /// Slot frees when the instance is destroyed.
    Destruction,
    /// Slot frees when the instance is picked up.
    PickUp,
}

/// Where a profile places the entities it spawns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPlacement {
    /// At an absolute position.
    Absolute(Position),
    /// Offset from the generator's own position.
    Offset {
        /// Local east-west offset.
        dx: f32,
        /// Local north-south offset.
        dy: f32,
        /// Height offset.
        dz: f32,
    },
    /// Randomly scattered around the generator within a radius, delegated
    /// to collision placement with bounded retries.
    Scatter {
        /// Scatter radius in local units.
        radius: f32,
    },
    /// Into the generator's own container inventory.
    Contain,
    /// Into the generator's vendor stock.
    Shop,
    /// At the generator's own position.
    Default,
}

/// Static configuration of one generator profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Template id to spawn; for treasure profiles this is a treasure
    /// table id instead.
    pub template_id: u32,
    /// Number of instances enqueued on initial population.
    pub init_create: u32,
    /// Profile-level cap. `-1` defers to the generator entity's cap.
    pub max_create: i32,
    /// Placement policy for spawned instances.
    pub placement: SpawnPlacement,
    /// Whether the template id rolls a treasure table, yielding a
    /// variable-count batch and clearing prior treasure before re-rolling.
    pub treasure: bool,
    /// Respawn delay in seconds after the trigger fires. `None` falls back
    /// to the generator's first profile.
    pub delay: Option<f64>,
    /// The lifecycle event that frees a slot.
    pub trigger: SpawnTrigger,
    /// Placeholder profiles are link templates and never spawn.
    pub placeholder: bool,
}

impl ProfileConfig {
    /// A simple non-treasure profile spawning `template_id` at the
    /// generator's position.
    pub fn simple(template_id: u32, init_create: u32, max_create: i32) -> Self {
        Self {
            template_id,
            init_create,
            max_create,
            placement: SpawnPlacement::Default,
            treasure: false,
            delay: None,
            trigger: SpawnTrigger::Destruction,
            placeholder: false,
        }
    }
}

/// Lightweight descriptor for an instance a profile has spawned. The
/// authoritative owner of the instance remains the cell or container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpawnedInfo {
    /// The instance guid.
    pub guid: ObjectGuid,
    /// The template the instance was created from.
    pub template_id: u32,
}

/// Per-profile spawn-queue state machine attached to a generator entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorProfile {
    /// Static configuration.
    pub config: ProfileConfig,
    /// Currently-spawned instances, keyed by guid.
    pub spawned: HashMap<ObjectGuid, SpawnedInfo>,
    /// Pending spawn timestamps, in enqueue order.
    pub spawn_queue: Vec<f64>,
    /// Pending (removal time, instance guid) pairs.
    pub remove_queue: VecDeque<(f64, ObjectGuid)>,
}

impl GeneratorProfile {
    /// Create an idle profile from configuration.
    pub fn new(config: ProfileConfig) -> Self {
        Self {
            config,
            spawned: HashMap::new(),
            spawn_queue: Vec::new(),
            remove_queue: VecDeque::new(),
        }
    }

    /// Active spawned instances plus pending spawns.
    pub fn current_create(&self) -> usize {
        self.spawned.len() + self.spawn_queue.len()
    }
}

/// Generator capability attached to a spawner entity: profiles plus
/// generator-wide configuration and the live counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorHost {
    /// The spawn profiles.
    pub profiles: Vec<GeneratorProfile>,
    /// Generator-wide instance cap, used when a profile's cap is `-1`.
    pub max_create: i32,
    /// Live counter across profiles, incremented when initial spawns are
    /// reserved and decremented when slots free.
    pub current_create: i32,
    /// Seconds between regeneration passes. Zero forces zero respawn delay.
    pub regeneration_interval: f64,
    /// Chest-style generators always respawn with zero delay.
    pub chest: bool,
    /// Set after the initial population has been enqueued.
    pub initial_spawn_done: bool,
    /// Set once a treasure profile has produced loot.
    pub generated_treasure: bool,
}

impl GeneratorHost {
    /// Create a generator host from profiles.
    pub fn new(profiles: Vec<ProfileConfig>, max_create: i32, regeneration_interval: f64) -> Self {
        Self {
            profiles: profiles.into_iter().map(GeneratorProfile::new).collect(),
            max_create,
            current_create: 0,
            regeneration_interval,
            chest: false,
            initial_spawn_done: false,
            generated_treasure: false,
        }
    }

    /// Builder: mark this generator as chest-style (zero respawn delay).
    pub fn chest_style(mut self) -> Self {
        self.chest = true;
        self
    }

    /// The effective cap for a profile: a non-negative profile override
    /// wins, otherwise the generator-wide cap applies.
    pub fn effective_max(&self, profile: usize) -> i32 {
        let cap = self.profiles[profile].config.max_create;
        if cap > -1 { cap } else { self.max_create }
    }

    /// The respawn delay for a profile: zero for chest-style generators or
    /// a zero regeneration interval, else the profile delay falling back to
    /// the first profile's.
    pub fn delay(&self, profile: usize) -> f64 {
        if self.chest || self.regeneration_interval == 0.0 {
            return 0.0;
        }
        self.profiles[profile]
            .config
            .delay
            .or_else(|| self.profiles.first().and_then(|p| p.config.delay))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_max_prefers_profile_override() {
        let host = GeneratorHost::new(
            vec![
                ProfileConfig::simple(100, 1, 5),
                ProfileConfig::simple(101, 1, -1),
            ],
            3,
            60.0,
        );
        assert_eq!(host.effective_max(0), 5);
        assert_eq!(host.effective_max(1), 3);
    }

    #[test]
    fn zero_override_beats_generator_cap() {
        let host = GeneratorHost::new(vec![ProfileConfig::simple(100, 0, 0)], 3, 60.0);
        assert_eq!(host.effective_max(0), 0);
    }

    #[test]
    fn chest_delay_is_zero() {
        let mut cfg = ProfileConfig::simple(100, 1, 3);
        cfg.delay = Some(120.0);
        let host = GeneratorHost::new(vec![cfg], 3, 60.0).chest_style();
        assert_eq!(host.delay(0), 0.0);
    }

    #[test]
    fn delay_falls_back_to_first_profile() {
        let mut first = ProfileConfig::simple(100, 1, 3);
        first.delay = Some(45.0);
        let second = ProfileConfig::simple(101, 1, 3);
        let host = GeneratorHost::new(vec![first, second], 3, 60.0);
        assert_eq!(host.delay(1), 45.0);
    }

    #[test]
    fn zero_regeneration_interval_forces_zero_delay() {
        let mut cfg = ProfileConfig::simple(100, 1, 3);
        cfg.delay = Some(30.0);
        let host = GeneratorHost::new(vec![cfg], 3, 0.0);
        assert_eq!(host.delay(0), 0.0);
    }

    #[test]
    fn current_create_counts_spawned_and_pending() {
        let mut profile = GeneratorProfile::new(ProfileConfig::simple(100, 3, 3));
        profile.spawn_queue.push(0.0);
        profile.spawn_queue.push(0.0);
        profile.spawned.insert(
            ObjectGuid(0x8000_0001),
            SpawnedInfo {
                guid: ObjectGuid(0x8000_0001),
                template_id: 100,
            },
        );
        assert_eq!(profile.current_create(), 3);
    }
}
