//! World simulation: spatial cells, tick scheduling, generators, decay,
//! and persistence batching over the `karst-core` data model.
//!
//! The unit of simulation is the [`Landblock`]: a cell that owns its
//! resident entities and is ticked by one thread at a time. Cross-thread
//! input goes through each cell's action queue, and the
//! [`LandblockManager`] drives loading, ticking, adjacency, and unload.
//! Engine integrations plug in through the trait bundle in [`services`].

/// Per-cell action queues.
pub mod action;
/// World configuration.
pub mod config;
/// Time-to-rot bookkeeping.
pub mod decay;
/// Tick monitors and world snapshots.
pub mod diagnostics;
/// World error types.
pub mod error;
/// Generator spawn engine.
pub mod generator;
/// The spatial cell.
pub mod landblock;
/// Cell lifecycle and the world-wide view.
pub mod manager;
/// Dirty-entity collection and batch saves.
pub mod persist;
/// Per-cell schedule lists.
pub mod schedule;
/// Collaborator traits and reference implementations.
pub mod services;

pub use action::{Action, ActionQueue, ActionSender};
pub use config::WorldConfig;
pub use decay::Disposal;
pub use diagnostics::{CellStats, TickStats, WorldSnapshot};
pub use error::{WorldError, WorldResult};
pub use generator::GeneratorEvent;
pub use landblock::Landblock;
pub use manager::LandblockManager;
pub use services::{
    BroadcastService, EntityFactory, PersistenceSink, PlacementService, Services,
    WorldDataService,
};
