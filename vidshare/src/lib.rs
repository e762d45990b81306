//! vidshare data-access core.
//!
//! Composes multi-entity read views over a document store and keeps the
//! references between users, videos, comments, likes, subscriptions, tweets
//! and playlists consistent without cross-collection transactions.
//!
//! The entry point is [`Client`], which hands out the [`ViewComposer`],
//! [`ToggleEngine`], [`IntegrityOrchestrator`], [`StatsAggregator`] and
//! [`ContentService`] over an injected [`EntityStore`] and [`BlobStore`].

pub mod blob;
pub mod client;
pub mod config;
pub mod content;
pub mod envelope;
pub mod errors;
pub mod filters;
pub mod id;
pub mod integrity;
pub mod keys;
pub mod pipeline;
pub mod repository;
pub mod runtime;
pub mod search;
pub mod stats;
pub mod store;
pub mod toggle;
pub mod types;
pub mod validators;
pub mod views;

pub use blob::{BlobStore, LocalBlobStore, MemoryBlobStore, UploadedBlob};
pub use client::Client;
pub use config::{Config, ConfigError};
pub use content::ContentService;
pub use envelope::{ApiFailure, ApiResponse, respond};
pub use errors::*;
pub use id::EntityId;
pub use integrity::{CascadeReport, CascadeStep, IntegrityOrchestrator};
pub use repository::Repo;
pub use search::{Page, PageRequest, PaginateOptions, PaginatedDocs, PaginationSettings, SortOrder};
pub use stats::{ChannelStats, StatsAggregator};
pub use store::{EntityStore, MemoryStore, RedisStore, ToggleState};
pub use toggle::{ToggleEngine, ToggleResult};
pub use views::{VideoListQuery, ViewComposer};

// Re-export redis so embedders don't need to depend on a specific redis version
pub use redis;
