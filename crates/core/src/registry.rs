//! Static catalog of monitored stops and stations, plus their latest readings.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::reading::ArrivalReading;

/// Upstream API family an entity is polled through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Bus tracker predictions.
    Bus,
    /// Train tracker arrivals.
    Train,
    /// Bike-share station availability.
    BikeShare,
}

impl SourceKind {
    fn as_str(self) -> &'static str {
        match self {
            SourceKind::Bus => "bus",
            SourceKind::Train => "train",
            SourceKind::BikeShare => "bike_share",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal-cell coordinates on the kiosk board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: u16,
    /// Row.
    pub y: u16,
}

/// Stable identifier of a monitored entity: `<kind>:<route>:<stop>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Build the id for a kind/route/stop triple.
    pub fn new(kind: SourceKind, route: &str, stop: &str) -> Self {
        Self(format!("{kind}:{route}:{stop}"))
    }

    /// Borrow the id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog entry as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Source kind.
    pub kind: SourceKind,
    /// Route name (`Red`, `22`) or, for bike-share, the station id.
    pub route: String,
    /// Stop id or, for bike-share, the station name.
    pub stop: String,
    /// Short caption drawn next to the value.
    #[serde(default)]
    pub label: String,
    /// Where the value is drawn.
    #[serde(default)]
    pub position: Position,
}

/// One stop or station to poll. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredEntity {
    /// Derived identifier.
    pub id: EntityId,
    /// Source kind.
    pub kind: SourceKind,
    /// Route name or bike-share station id.
    pub route: String,
    /// Stop id or bike-share station name.
    pub stop: String,
    /// Caption for the board.
    pub label: String,
    /// Board position.
    pub position: Position,
}

impl From<EntitySpec> for MonitoredEntity {
    fn from(spec: EntitySpec) -> Self {
        let label = if spec.label.trim().is_empty() {
            format!("{} {}", spec.route, spec.stop)
        } else {
            spec.label
        };
        Self {
            id: EntityId::new(spec.kind, &spec.route, &spec.stop),
            kind: spec.kind,
            route: spec.route,
            stop: spec.stop,
            label,
            position: spec.position,
        }
    }
}

/// Owns the entity catalog and the current reading of every entity.
#[derive(Debug, Clone)]
pub struct Registry {
    entities: Vec<MonitoredEntity>,
    readings: HashMap<EntityId, ArrivalReading>,
}

impl Registry {
    /// Build a registry; every entity starts out `Loading`.
    pub fn from_entities(specs: impl IntoIterator<Item = EntitySpec>) -> Result<Self> {
        let entities: Vec<MonitoredEntity> = specs.into_iter().map(Into::into).collect();
        if entities.is_empty() {
            bail!("no monitored entities configured");
        }

        let mut seen = HashSet::new();
        for entity in &entities {
            if !seen.insert(entity.id.clone()) {
                bail!("duplicate monitored entity {}", entity.id);
            }
        }

        let readings = entities
            .iter()
            .map(|entity| (entity.id.clone(), ArrivalReading::Loading))
            .collect();
        Ok(Self { entities, readings })
    }

    /// All entities in catalog order.
    pub fn entities(&self) -> &[MonitoredEntity] {
        &self.entities
    }

    /// Entities polled through `kind`, in catalog order.
    pub fn of_kind(&self, kind: SourceKind) -> Vec<&MonitoredEntity> {
        self.entities
            .iter()
            .filter(|entity| entity.kind == kind)
            .collect()
    }

    /// Look up an entity by id.
    pub fn get(&self, id: &EntityId) -> Option<&MonitoredEntity> {
        self.entities.iter().find(|entity| &entity.id == id)
    }

    /// Current reading for `id`.
    pub fn reading(&self, id: &EntityId) -> Option<&ArrivalReading> {
        self.readings.get(id)
    }

    /// Current board text for `id`.
    pub fn display_text(&self, id: &EntityId) -> Option<String> {
        self.readings.get(id).map(ArrivalReading::display_text)
    }

    /// Replace the readings produced by one pass. Unknown ids are ignored.
    pub fn commit(&mut self, readings: impl IntoIterator<Item = (EntityId, ArrivalReading)>) {
        for (id, reading) in readings {
            if let Some(slot) = self.readings.get_mut(&id) {
                *slot = reading;
            }
        }
    }

    /// Number of monitored entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the catalog is empty (never true for a built registry).
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
