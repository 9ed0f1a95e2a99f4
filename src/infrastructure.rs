//! Infrastructure layer
//!
//! External collaborators (portal API client, credential provider, SQLite
//! store), configuration, logging, and the payload parsing stack.

pub mod config;
pub mod credential;
pub mod land_api;
pub mod listing_repository;
pub mod logging;
pub mod parsing;

pub use config::{ApiConfig, AppConfig, CollectorConfig, ConfigManager, LoggingConfig};
pub use credential::{Credential, CredentialProvider, StaticCredential};
pub use land_api::{LandApiClient, ListingSummary, SearchPage};
pub use listing_repository::SqliteListingStore;
pub use parsing::{FieldMapper, RawListingPayload, RecordProcessor};
