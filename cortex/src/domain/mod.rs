// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pattern model, in-memory graph and the pure algorithms that run over it.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Entities, value objects, persistence contract and events

pub mod pattern;
pub mod finding;
pub mod similarity;
pub mod graph;
pub mod traversal;
pub mod confidence;
pub mod repository;
pub mod events;
pub mod config;

pub use pattern::*;
pub use finding::*;
pub use similarity::*;
pub use graph::*;
pub use traversal::*;
pub use confidence::*;
pub use repository::*;
pub use events::*;
pub use config::*;
