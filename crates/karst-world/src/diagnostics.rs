use std::collections::HashMap;

use karst_core::{CellId, EntityKind};

/// Rolling per-cell tick-duration monitor.
///
/// Records how long each tick took and answers last/longest/average over a
/// trailing window; history clears periodically so "busiest cell" reflects
/// recent load rather than a lifetime average.
#[derive(Debug, Clone)]
pub struct TickMonitor {
    last: f64,
    longest: f64,
    total: f64,
    count: u64,
    last_clear_at: f64,
}

impl TickMonitor {
    /// A monitor with empty history, anchored at the given time.
    pub fn new(now: f64) -> Self {
        Self {
            last: 0.0,
            longest: 0.0,
            total: 0.0,
            count: 0,
            last_clear_at: now,
        }
    }

    /// Record one tick duration in seconds.
    pub fn record(&mut self, duration: f64) {
        self.last = duration;
        self.longest = self.longest.max(duration);
        self.total += duration;
        self.count += 1;
    }

    /// Drop history if the clear interval has elapsed.
    pub fn maybe_clear(&mut self, now: f64, interval: f64) {
        if now - self.last_clear_at >= interval {
            self.longest = 0.0;
            self.total = 0.0;
            self.count = 0;
            self.last_clear_at = now;
        }
    }

    /// Point-in-time statistics for the current window.
    pub fn stats(&self) -> TickStats {
        TickStats {
            last: self.last,
            longest: self.longest,
            average: if self.count > 0 {
                self.total / self.count as f64
            } else {
                0.0
            },
            count: self.count,
        }
    }
}

/// Snapshot of one monitor's trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickStats {
    /// Duration of the most recent tick, seconds.
    pub last: f64,
    /// Longest tick in the window, seconds.
    pub longest: f64,
    /// Average tick in the window, seconds.
    pub average: f64,
    /// Ticks in the window.
    pub count: u64,
}

/// Point-in-time view of one cell, safe to hand to a non-tick thread.
#[derive(Debug, Clone)]
pub struct CellStats {
    /// The cell.
    pub id: CellId,
    /// Resident entities in the applied live set.
    pub residents: usize,
    /// Whether the cell is dormant.
    pub dormant: bool,
    /// Tick-duration statistics.
    pub tick: TickStats,
}

/// Point-in-time view of the whole world, copied out by value.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    /// Currently loaded cells.
    pub loaded: usize,
    /// Currently dormant cells.
    pub dormant: usize,
    /// Resident entities by kind across all loaded cells.
    pub residents_by_kind: HashMap<EntityKind, usize>,
    /// Cells ordered by descending average tick duration, truncated to the
    /// requested count.
    pub busiest: Vec<CellStats>,
    /// Named entry counts reported by the world data service's caches.
    pub caches: Vec<(String, usize)>,
}
