//! Compass Remote - Remote Store Adapters
//!
//! [`RestRemoteStore`] talks to the hosted schema over its REST endpoint;
//! [`OfflineRemoteStore`] stands in when no endpoint is configured.

pub mod config;
pub mod error;
pub mod offline;
pub mod rest;
pub mod rows;

pub use config::RemoteConfig;
pub use error::RestClientError;
pub use offline::OfflineRemoteStore;
pub use rest::RestRemoteStore;
