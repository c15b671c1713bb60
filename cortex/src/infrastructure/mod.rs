// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the knowledge store

pub mod db;
pub mod event_bus;
pub mod provider_factory;
pub mod repositories;
pub mod telemetry;

pub use db::Database;
pub use event_bus::{EventBus, EventBusError, EventReceiver, PatternEventReceiver};
pub use provider_factory::create_persistence_provider;
pub use repositories::{InMemoryPersistenceProvider, PostgresPersistenceProvider};
pub use telemetry::init_tracing;
