//! # Lore Harness
//!
//! A local-first normalization, indexing, and sync pipeline for
//! worldbuilding lore.
//!
//! Raw JSON documents (characters, creatures, realms, plots, magic) are
//! normalized into one canonical file per entity, indexed with cross-category
//! crosslinks, searched with fuzzy matching, and synced both ways with a
//! Notion-style remote database. The pure transformations live in
//! `lore-harness-core`; this crate adds the filesystem, network, and
//! process around them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  raw JSON   │──▶│  Normalize  │──▶│  formatted/ │
//! │  documents  │   │ + synonyms  │   │  + indexes  │
//! └─────────────┘   └─────────────┘   └──────┬──────┘
//!                                            │
//!                      ┌─────────────────────┼──────────────┐
//!                      ▼                     ▼              ▼
//!                 ┌──────────┐         ┌──────────┐   ┌──────────┐
//!                 │   CLI    │         │   HTTP   │   │  Notion  │
//!                 │  (lore)  │         │   API    │   │   sync   │
//!                 └──────────┘         └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`storage`] | Lore tree layout and JSON file I/O |
//! | [`pipeline`] | Batch normalization driver |
//! | [`indexing`] | Category, master, and region indexes |
//! | [`search`] | Fuzzy search and crosslink lookup |
//! | [`migrate`] | Legacy layout migration |
//! | [`sync`] | Push, pull, and schema maintenance |
//! | [`notion`] | Notion API client |
//! | [`scheduler`] | Periodic background sync |
//! | [`server`] | HTTP API |

pub mod config;
pub mod indexing;
pub mod migrate;
pub mod notion;
pub mod pipeline;
pub mod scheduler;
pub mod search;
pub mod server;
pub mod storage;
pub mod sync;
