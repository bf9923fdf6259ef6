/// Configuration for a simulated world.
///
/// All intervals are in simulated seconds against the time passed to
/// `tick`. Defaults carry the reference cadences: 5-second cell heartbeat,
/// 5-minute persistence pass, dormancy after 1 idle minute, unload
/// eligibility after 5.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// RNG seed; each cell derives its own stream from this and its id.
    pub seed: u64,
    /// Seconds between a cell's heartbeat marks (decay/dormancy pass).
    pub heartbeat_interval: f64,
    /// Seconds between persistence passes.
    pub save_interval: f64,
    /// A cell with no activity for this long becomes dormant.
    pub dormant_after: f64,
    /// A cell with no activity for this long is queued for unload, unless
    /// permanently loaded.
    pub unload_after: f64,
    /// Default time-to-rot applied on an entity's first decay pass.
    pub default_time_to_rot: f64,
    /// An empty corpse never outlives this many seconds of decay.
    pub empty_corpse_floor: f64,
    /// Seconds between a corpse's decay broadcast and its teardown.
    pub corpse_teardown_delay: f64,
    /// Fixed AI interval shared by all creatures.
    pub creature_ai_interval: f64,
    /// Seconds between generator-update passes.
    pub generator_update_interval: f64,
    /// Seconds between tick-monitor history clears.
    pub monitor_clear_interval: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            heartbeat_interval: 5.0,
            save_interval: 300.0,
            dormant_after: 60.0,
            unload_after: 300.0,
            default_time_to_rot: 300.0,
            empty_corpse_floor: 45.0,
            corpse_teardown_delay: 1.0,
            creature_ai_interval: 1.0,
            generator_update_interval: 5.0,
            monitor_clear_interval: 3600.0,
        }
    }
}

impl WorldConfig {
    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the cell heartbeat interval.
    pub fn with_heartbeat_interval(mut self, seconds: f64) -> Self {
        self.heartbeat_interval = seconds;
        self
    }

    /// Set the persistence pass interval.
    pub fn with_save_interval(mut self, seconds: f64) -> Self {
        self.save_interval = seconds;
        self
    }

    /// Set the idle window after which a cell goes dormant.
    pub fn with_dormant_after(mut self, seconds: f64) -> Self {
        self.dormant_after = seconds;
        self
    }

    /// Set the idle window after which a cell may unload.
    pub fn with_unload_after(mut self, seconds: f64) -> Self {
        self.unload_after = seconds;
        self
    }

    /// Set the default time-to-rot.
    pub fn with_default_time_to_rot(mut self, seconds: f64) -> Self {
        self.default_time_to_rot = seconds;
        self
    }

    /// Set the empty-corpse decay floor.
    pub fn with_empty_corpse_floor(mut self, seconds: f64) -> Self {
        self.empty_corpse_floor = seconds;
        self
    }
}
