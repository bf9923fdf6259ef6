use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::generator::GeneratorHost;
use crate::position::Position;

/// Schedule sentinel: an entity whose next-scheduled-time is `NEVER` is
/// omitted from that schedule list entirely.
pub const NEVER: f64 = f64::MAX;

/// Unique 32-bit identifier for every simulated entity.
///
/// Guids at or above [`ObjectGuid::DYNAMIC_MIN`] are dynamically allocated at
/// runtime; guids below it belong to template-backed static instances. The
/// split gates decay eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectGuid(pub u32);

impl ObjectGuid {
    /// First guid of the dynamically-allocated range.
    pub const DYNAMIC_MIN: u32 = 0x8000_0000;

    /// Whether this guid was dynamically allocated at runtime.
    pub fn is_dynamic(self) -> bool {
        self.0 >= Self::DYNAMIC_MIN
    }
}

impl fmt::Display for ObjectGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// The kind of a simulated entity. Closed set; capability data (container,
/// creature, generator) attaches separately on [`Entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A player character. Ticked every cell tick.
    Player,
    /// A creature with AI. Ticked from the per-cell AI list.
    Creature,
    /// A static fixture spawned from world data.
    Static,
    /// A dynamic object: dropped items, corpses, spawned loot.
    Dynamic,
    /// A projectile in flight.
    Missile,
    /// Anything else.
    Other,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Creature => write!(f, "creature"),
            Self::Static => write!(f, "static"),
            Self::Dynamic => write!(f, "dynamic"),
            Self::Missile => write!(f, "missile"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Which persistence class an entity belongs to. Only `Static` and
/// `Dynamic` entities are collected by the persistence batcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceClass {
    /// Never saved.
    #[default]
    Never,
    /// A static world instance whose mutations persist to the shard.
    Static,
    /// A dynamic object (corpse, dropped item) that persists to the shard.
    Dynamic,
}

/// A flexible property-bag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// A text value.
    String(String),
    /// A 64-bit signed integer value.
    Integer(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A boolean value.
    Boolean(bool),
}

/// Container capability: an inventory of owned entities plus view state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerState {
    /// The owned inventory, keyed by item guid.
    pub items: HashMap<ObjectGuid, Entity>,
    /// Whether a player currently has this container open.
    pub is_open: bool,
    /// The player viewing the open container, if any.
    pub viewer: Option<ObjectGuid>,
    /// Whether the inventory has finished loading from persistence. Decay
    /// of an empty corpse is deferred until this is set.
    pub contents_loaded: bool,
    /// Whether this container is a corpse: contents spill onto the cell
    /// when it decays.
    pub corpse: bool,
    /// Whether this container is vendor stock rather than loose inventory.
    pub vendor: bool,
}

impl ContainerState {
    /// A corpse container with contents already loaded.
    pub fn corpse() -> Self {
        Self {
            contents_loaded: true,
            corpse: true,
            ..Self::default()
        }
    }

    /// An ordinary loaded container.
    pub fn loaded() -> Self {
        Self {
            contents_loaded: true,
            ..Self::default()
        }
    }
}

/// Creature capability: AI scheduling and wielded equipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatureState {
    /// When this creature's AI next runs.
    pub next_ai_at: f64,
    /// The fixed AI interval shared by all creatures in a cell.
    pub ai_interval: f64,
    /// Items wielded by this creature, keyed by guid.
    pub equipped: HashMap<ObjectGuid, Entity>,
}

impl CreatureState {
    /// A creature state due for its first AI pass immediately.
    pub fn new(ai_interval: f64) -> Self {
        Self {
            next_ai_at: 0.0,
            ai_interval,
            equipped: HashMap::new(),
        }
    }
}

/// A simulated world object.
///
/// Owned by exactly one spatial cell at a time, or by a container entity
/// that is itself owned by a cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identity.
    pub guid: ObjectGuid,
    /// Closed kind tag.
    pub kind: EntityKind,
    /// Display name.
    pub name: String,
    /// The template ("weenie") this entity was created from.
    pub template_id: u32,
    /// Current world position. `None` until placed.
    pub position: Option<Position>,
    /// Mutable property bag.
    pub properties: HashMap<String, PropertyValue>,
    /// Persistence class; see [`PersistenceClass`].
    pub persistence: PersistenceClass,
    /// Set when the entity has unsaved mutations.
    pub dirty: bool,
    /// Back-reference to the generator that spawned this entity, if any.
    /// Cleared when a player picks the entity up.
    pub generator_id: Option<ObjectGuid>,
    /// Next general heartbeat time, or [`NEVER`].
    pub next_heartbeat_at: f64,
    /// Seconds between heartbeats.
    pub heartbeat_interval: f64,
    /// Next generator-update time, or [`NEVER`].
    pub next_generator_update_at: f64,
    /// Next generator-regeneration time, or [`NEVER`].
    pub next_regeneration_at: f64,
    /// Remaining time-to-rot in seconds. `None` = default applies on the
    /// first decay pass; `0` = instant; `-1` = never; `-2` = completed.
    pub time_to_rot: Option<f64>,
    /// Latch preventing double disposal once decay has completed.
    #[serde(default, skip)]
    pub decay_completed: bool,
    /// Container capability, if this entity owns an inventory.
    pub container: Option<ContainerState>,
    /// Creature capability, if this entity has AI.
    pub creature: Option<CreatureState>,
    /// Generator capability, if this entity procedurally spawns others.
    pub generator: Option<GeneratorHost>,
    /// Timestamp when the entity was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the entity was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new entity with no position and no scheduled times.
    pub fn new(guid: ObjectGuid, kind: EntityKind, name: impl Into<String>, template_id: u32) -> Self {
        let now = Utc::now();
        Self {
            guid,
            kind,
            name: name.into(),
            template_id,
            position: None,
            properties: HashMap::new(),
            persistence: PersistenceClass::default(),
            dirty: false,
            generator_id: None,
            next_heartbeat_at: NEVER,
            heartbeat_interval: 0.0,
            next_generator_update_at: NEVER,
            next_regeneration_at: NEVER,
            time_to_rot: None,
            decay_completed: false,
            container: None,
            creature: None,
            generator: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: place the entity at a position.
    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Builder: enable the general heartbeat at the given interval, due
    /// immediately.
    pub fn with_heartbeat(mut self, interval: f64) -> Self {
        self.heartbeat_interval = interval;
        self.next_heartbeat_at = 0.0;
        self
    }

    /// Builder: attach creature AI state.
    pub fn with_creature(mut self, state: CreatureState) -> Self {
        self.creature = Some(state);
        self
    }

    /// Builder: attach a container.
    pub fn with_container(mut self, state: ContainerState) -> Self {
        self.container = Some(state);
        self
    }

    /// Builder: attach a generator host, due for its first update
    /// immediately and its first regeneration after one interval.
    pub fn with_generator(mut self, host: GeneratorHost) -> Self {
        self.next_generator_update_at = 0.0;
        self.next_regeneration_at = 0.0;
        self.generator = Some(host);
        self
    }

    /// Builder: set the persistence class.
    pub fn with_persistence(mut self, class: PersistenceClass) -> Self {
        self.persistence = class;
        self
    }

    /// Mark the entity as having unsaved mutations.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.updated_at = Utc::now();
    }

    /// Whether this entity is (or is linked to) a generator.
    pub fn is_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Set an integer property and mark dirty.
    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.properties
            .insert(key.into(), PropertyValue::Integer(value));
        self.mark_dirty();
    }

    /// Read an integer property.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.properties.get(key) {
            Some(PropertyValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    /// Mutable access to the container state, failing for non-containers.
    pub fn container_mut(&mut self) -> CoreResult<&mut ContainerState> {
        let guid = self.guid;
        self.container
            .as_mut()
            .ok_or(CoreError::NotAContainer(guid))
    }

    /// Insert an item into this entity's inventory.
    pub fn add_to_inventory(&mut self, item: Entity) -> CoreResult<()> {
        let guid = self.guid;
        let container = self.container_mut()?;
        if container.items.contains_key(&item.guid) {
            return Err(CoreError::DuplicateItem {
                container: guid,
                item: item.guid,
            });
        }
        container.items.insert(item.guid, item);
        self.mark_dirty();
        Ok(())
    }

    /// Remove an item from this entity's inventory, if present.
    pub fn remove_from_inventory(&mut self, item: ObjectGuid) -> Option<Entity> {
        let removed = self.container.as_mut()?.items.remove(&item);
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }

    /// Number of items in this entity's inventory; zero for non-containers.
    pub fn inventory_count(&self) -> usize {
        self.container.as_ref().map_or(0, |c| c.items.len())
    }
}
