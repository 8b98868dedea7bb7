//! Application services layer.
//!
//! This module contains the detection pipeline and the live feed that sit
//! between the API layer and the collaborators (directory, worker, persistence).

pub mod detection_cycle;
pub mod detection_service;
pub mod live_feed;
pub mod normalizer;
pub mod publisher;
pub mod session_registry;
pub mod synthetic;

pub use detection_cycle::{CycleOutcome, DetectionCycleRunner};
pub use detection_service::{DetectionService, StartOutcome};
pub use live_feed::{FeedIntervals, FeedSubscription, LiveFeed};
pub use normalizer::{EventNormalizer, SyntheticEventKind, SYNTHETIC_EVENT_KINDS};
pub use publisher::{EventPublisher, Publication};
pub use session_registry::{SessionInfo, SessionRegistry};
pub use synthetic::SystemHealthSampler;
