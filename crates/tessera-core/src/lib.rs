//! Tessera Core - Domain types, sync planning, and the job state machine.
//!
//! This crate provides the core functionality for Tessera, including:
//!
//! - **Domain models**: [`SyncJob`], [`TrainingRecord`], [`Collection`]
//! - **Business logic**: Content-hash delta detection, sync planning
//! - **Services**: [`JobRunner`] single-stepping state machine,
//!   [`SyncProcessor`] and [`AnalysisProcessor`] units of work,
//!   [`CollectionRegistry`] store lifecycle
//! - **Traits**: [`VectorStoreAdapter`], [`JobStore`], [`RecordStore`],
//!   [`CollectionStore`], [`ContentSource`], [`ContentAnalyzer`] for
//!   dependency injection
//!
//! # Architecture
//!
//! This crate is designed to be reusable by different frontends (CLI,
//! scheduler hooks, etc.). Business logic is decoupled from I/O concerns
//! through traits:
//!
//! - [`VectorStoreAdapter`] - abstracts the remote index provider (the two
//!   concrete topologies live in `tessera-client`)
//! - [`JobStore`] / [`RecordStore`] / [`CollectionStore`] - abstract
//!   persistence (e.g., PostgreSQL via `tessera-db`)
//! - [`ContentSource`] - abstracts where content items come from
//!
//! # Example
//!
//! ```ignore
//! use tessera_core::{CollectionRegistry, JobKind, JobRunner, SyncProcessor};
//!
//! let registry = CollectionRegistry::new(collections, adapter);
//! let processor = SyncProcessor::new(registry, source, records, collection_id);
//! let plan = processor.plan().await?;
//! let runner = JobRunner::new(processor, job_store);
//! runner.initialize(plan.job_items(), JobKind::Direct).await?;
//! let job = runner.run_to_completion().await?;
//! ```

pub mod adapter;
pub mod analyze;
pub mod config;
pub mod error;
pub mod job;
pub mod job_store;
pub mod record;
pub mod registry;
pub mod runner;
pub mod sync;

// Error handling
pub use error::{AppError, ProviderErrorDetails, ProviderErrorKind};

// Configuration
pub use config::{
    CollectionEntry, CollectionsConfig, HttpConfig, PollConfig, ProviderKind,
    default_config_path, load_collections_config,
};

// Job state machine
pub use job::{ItemRef, JobKind, JobStatus, SyncJob};
pub use job_store::JobStore;
pub use runner::{CIRCUIT_BREAKER_THRESHOLD, JobRunner, UnitProcessor, cancel_job, job_status};

// Per-item sync state
pub use record::{
    MAX_ERROR_MESSAGE_CHARS, MAX_RECORD_RETRIES, RecordStatus, RecordStore, TrainingRecord,
    truncate_error_message,
};

// Sync planning and processing
pub use sync::{SyncDecision, SyncOutcome, SyncPlan, SyncProcessor, needs_resync};

// Collections and content
pub use registry::{
    Collection, CollectionRegistry, CollectionStore, ContentItem, ContentSource,
};

// Vector store abstraction
pub use adapter::{DocumentPayload, StoreInfo, StoreUpdate, VectorStoreAdapter};

// Content analysis
pub use analyze::{AnalysisProcessor, AnalysisReport, AnalysisSink, ContentAnalyzer};
