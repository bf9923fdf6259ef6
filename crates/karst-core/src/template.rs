use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind, ObjectGuid, PersistenceClass, PropertyValue};
use crate::position::Position;

/// A blueprint the entity factory instantiates entities from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTemplate {
    /// Template ("weenie") id.
    pub id: u32,
    /// Kind of entity this template produces.
    pub kind: EntityKind,
    /// Display name for produced entities.
    pub name: String,
    /// Default property bag copied onto produced entities.
    pub properties: HashMap<String, PropertyValue>,
    /// Default time-to-rot carried by produced entities. `0` and `-1` are
    /// the instant/never sentinels.
    pub time_to_rot: Option<f64>,
    /// Heartbeat interval for produced entities, if they heartbeat.
    pub heartbeat_interval: Option<f64>,
}

impl EntityTemplate {
    /// A minimal template of the given kind.
    pub fn new(id: u32, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            properties: HashMap::new(),
            time_to_rot: None,
            heartbeat_interval: None,
        }
    }
}

/// A placed instance of a template, as returned by the world data service
/// for a cell's static or dynamic population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Stable guid for the instance.
    pub guid: ObjectGuid,
    /// Template to instantiate.
    pub template_id: u32,
    /// Where the instance stands.
    pub position: Position,
    /// Persistence class for the produced entity.
    pub persistence: PersistenceClass,
}

/// A semi-randomized outdoor encounter spawn for a cell. Coordinates are in
/// encounter-grid units and are clamped into the cell interior at placement
/// time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EncounterSpec {
    /// Template to instantiate.
    pub template_id: u32,
    /// Encounter-grid east-west slot.
    pub cell_x: u8,
    /// Encounter-grid north-south slot.
    pub cell_y: u8,
}

/// One rollable entry in a treasure table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreasureEntry {
    /// Template produced when the entry hits.
    pub template_id: u32,
    /// Probability in `0.0..=1.0` that this entry yields an item.
    pub chance: f64,
}

/// A cached treasure table: each entry rolls independently, so one spawn
/// may yield a variable-count batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasureSpec {
    /// Table id. Shares the template-id namespace without overlap.
    pub id: u32,
    /// The rollable entries.
    pub entries: Vec<TreasureEntry>,
}

/// A by-value snapshot of an entity's persistent state, handed to the
/// persistence sink. Safe to write from any thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity identity.
    pub guid: ObjectGuid,
    /// Kind tag at snapshot time.
    pub kind: EntityKind,
    /// Template id.
    pub template_id: u32,
    /// Position at snapshot time.
    pub position: Option<Position>,
    /// Property bag at snapshot time.
    pub properties: HashMap<String, PropertyValue>,
    /// Remaining time-to-rot at snapshot time.
    pub time_to_rot: Option<f64>,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl EntitySnapshot {
    /// Snapshot an entity's persistent fields by value.
    pub fn of(entity: &Entity) -> Self {
        Self {
            guid: entity.guid,
            kind: entity.kind,
            template_id: entity.template_id,
            position: entity.position,
            properties: entity.properties.clone(),
            time_to_rot: entity.time_to_rot,
            taken_at: Utc::now(),
        }
    }
}
