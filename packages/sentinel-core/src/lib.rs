//! Sentinel Core - live camera-detection feed.
//!
//! This crate runs per-camera monitoring sessions that periodically invoke an
//! external object-detection worker, normalize its output into security
//! events, persist them and fan them out to every connected WebSocket client.
//! Each client additionally receives a synthetic feed of live events, sensor
//! readings and system health snapshots.
//!
//! # Architecture
//!
//! - [`directory`]: Camera lookup (REST or static) with a fallback catalog
//! - [`worker`]: Detection worker invocation and payload parsing
//! - [`events`]: Event model and the broadcast wire envelope
//! - [`persistence`]: Event storage
//! - [`services`]: Detection cycles, monitoring sessions and the live feed
//! - [`api`]: HTTP control endpoints and the WebSocket feed
//! - [`bootstrap`]: Composition root
//!
//! # Abstraction Traits
//!
//! - [`CameraDirectory`](directory::CameraDirectory): Camera metadata lookup
//! - [`WorkerInvoker`](worker::WorkerInvoker): Running the detection worker
//! - [`PersistenceGateway`](persistence::PersistenceGateway): Storing events
//! - [`Broadcaster`](events::Broadcaster): Fan-out to live connections
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod persistence;
pub mod protocol_constants;
pub mod runtime;
pub mod services;
pub mod utils;
pub mod worker;

// Re-export commonly used types at the crate root
pub use config::{Config, DirectoryConfig, IntervalRange, PersistenceConfig, WorkerConfig};
pub use error::{ErrorCode, SentinelError, SentinelResult};
pub use events::{BroadcastMessage, Broadcaster, Event, EventMetadata, LiveConnection, Severity};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use utils::now_millis;

// Re-export collaborator types
pub use directory::{
    CameraDirectory, CameraRecord, DirectoryError, FallbackCatalog, HttpCameraDirectory,
    StaticCameraDirectory,
};
pub use persistence::{
    JsonlEventStore, MemoryEventStore, NoopEventStore, PersistenceError, PersistenceGateway,
};
pub use worker::{ProcessWorker, WorkerError, WorkerInvoker, WorkerOutput};

// Re-export service types
pub use services::{CycleOutcome, DetectionService, LiveFeed, StartOutcome};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_services_with, BootstrappedServices, Collaborators};

// Re-export API types
pub use api::{start_server, AppState, ServerError};
