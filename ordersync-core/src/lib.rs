//! ordersync core library: domain types, field schema, collaborator traits,
//! file-backed stores, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: order identifiers, stored-record envelope, report references
//! - [`schema`]: [`FieldSchema`] and the declared order schema
//! - [`store`] / [`shipments`]: persistence traits and their file-backed forms
//! - [`feed`]: the [`SourceFeed`] seam
//! - [`config`]: `~/.ordersync/config.yaml` plus environment overrides
//! - [`error`]: [`StoreError`], [`FeedError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod feed;
pub mod paths;
pub mod schema;
pub mod shipments;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, FeedError, StoreError};
pub use feed::{SourceFeed, StatusFilter};
pub use schema::{order_schema, ElementKind, FieldKind, FieldSchema};
pub use shipments::{FileShipmentStore, MemoryShipmentStore, Shipment, ShipmentStore};
pub use store::{FileOrderStore, MemoryOrderStore, OrderStore, StoredSet, UnreadableRecord};
pub use types::{OrderId, RecordRef, StoredRecord};
