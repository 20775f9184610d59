//! # Lore Harness Core
//!
//! Pure, I/O-free logic for Lore Harness: text cleanup, synonym tables,
//! raw-shape classification, per-category entity normalizers, index and
//! crosslink building, fuzzy matching, and the field mapping used to
//! translate canonical entities to and from a remote page store.
//!
//! This crate performs no filesystem or network access. Everything that
//! touches disk or the network lives in the `lore-harness` application
//! crate and calls into the functions here.
//!
//! ```text
//! raw JSON ──▶ shape::classify ──▶ normalize::* ──▶ Entity
//!                                      │
//!                    text::clean ◀─────┤─────▶ synonyms::canonicalize
//!
//! Entity files ──▶ index::entries_from_document ──▶ IndexEntry
//!                                      │
//!                     index::crosslinks ┴ fuzzy::search / resolve_related
//! ```

pub mod category;
pub mod entity;
pub mod fuzzy;
pub mod index;
pub mod mapping;
pub mod normalize;
pub mod remote;
pub mod shape;
pub mod synonyms;
pub mod text;

pub use category::Category;
pub use entity::Entity;
