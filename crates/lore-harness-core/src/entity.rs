//! Canonical entity records.
//!
//! One struct per domain. All share `id`, `name`, and [`Source`]
//! provenance; unrecognized raw fields land in `notes` (scalars, as
//! `"key: value"`) or `attributes` (nested values, verbatim).
//!
//! Field order in each struct is the field order of the persisted JSON.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::category::Category;

/// Where a canonical entity came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub file: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A lineage value: most lineage fields are text, some (siblings,
/// consorts) are lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Appearance {
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Personality {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traits: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperament: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flaws: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtues: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Lineage {
    #[serde(flatten)]
    pub fields: IndexMap<String, TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primordial: Option<IndexMap<String, Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Prophecy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lore_fragment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub powers_foretold: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ability {
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub titles: Vec<String>,
    pub species: Option<String>,
    pub gender: Option<String>,
    pub age: Option<String>,
    pub realm: Option<String>,
    pub court: Option<String>,
    pub affiliations: Option<Vec<String>>,
    pub domains: Vec<String>,
    pub role: Option<String>,
    pub appearance: Appearance,
    pub personality: Personality,
    pub lineage: Lineage,
    pub prophecy: Prophecy,
    pub abilities: Vec<Ability>,
    pub relationships: IndexMap<String, Option<String>>,
    pub notes: Option<Vec<String>>,
    pub attributes: Option<IndexMap<String, Value>>,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Creature {
    pub id: String,
    pub name: String,
    pub kind: Option<String>,
    pub location: Option<String>,
    pub region: Option<String>,
    pub realm: Option<String>,
    pub description: Option<String>,
    pub abilities: Vec<String>,
    pub danger_level: Option<String>,
    pub attributes: Option<IndexMap<String, Value>>,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Realm {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub domains: Vec<String>,
    pub ruler: Option<String>,
    pub capital: Option<String>,
    pub factions: Option<Vec<String>>,
    pub notable_locations: Option<Vec<String>>,
    pub notes: Option<Vec<String>>,
    pub attributes: Option<IndexMap<String, Value>>,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plot {
    pub id: String,
    pub name: String,
    pub arc: Option<String>,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub notes: Option<Vec<String>>,
    pub attributes: Option<IndexMap<String, Value>>,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MagicAbility {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub school: Option<String>,
    pub description: Option<String>,
    pub domains: Vec<String>,
    pub notes: Option<Vec<String>>,
    pub attributes: Option<IndexMap<String, Value>>,
    pub source: Source,
}

/// A canonical entity of any category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Character(Character),
    Creature(Creature),
    Realm(Realm),
    Plot(Plot),
    Magic(MagicAbility),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Character(e) => &e.id,
            Entity::Creature(e) => &e.id,
            Entity::Realm(e) => &e.id,
            Entity::Plot(e) => &e.id,
            Entity::Magic(e) => &e.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Character(e) => &e.name,
            Entity::Creature(e) => &e.name,
            Entity::Realm(e) => &e.name,
            Entity::Plot(e) => &e.name,
            Entity::Magic(e) => &e.name,
        }
    }

    pub fn source(&self) -> &Source {
        match self {
            Entity::Character(e) => &e.source,
            Entity::Creature(e) => &e.source,
            Entity::Realm(e) => &e.source,
            Entity::Plot(e) => &e.source,
            Entity::Magic(e) => &e.source,
        }
    }

    pub fn category(&self) -> Category {
        self.source().category
    }

    /// The JSON document persisted for this entity.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
