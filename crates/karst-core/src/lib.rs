//! Core types for Karst: entities, positions, and template data.
//!
//! This crate defines the data model that the simulation crate operates on.
//! It carries no tick logic — an [`Entity`] can be constructed, serialized,
//! and inspected without a running world.

/// Entity types, identifiers, kinds, and property values.
pub mod entity;
/// Error types used throughout the crate.
pub mod error;
/// Generator host and profile data attached to spawner entities.
pub mod generator;
/// Cell identifiers and world positions.
pub mod position;
/// Template, instance, encounter, treasure, and snapshot shapes.
pub mod template;

/// Re-export core entity types.
pub use entity::{
    ContainerState, CreatureState, Entity, EntityKind, NEVER, ObjectGuid, PersistenceClass,
    PropertyValue,
};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export generator data types.
pub use generator::{
    GeneratorHost, GeneratorProfile, ProfileConfig, SpawnPlacement, SpawnTrigger, SpawnedInfo,
};
/// Re-export position types.
pub use position::{CELL_EXTENT, CellId, Position};
/// Re-export template shapes.
pub use template::{
    EncounterSpec, EntitySnapshot, EntityTemplate, InstanceSpec, TreasureEntry, TreasureSpec,
};
