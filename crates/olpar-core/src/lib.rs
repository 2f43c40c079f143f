//! olpar-core - Persistence layer for the Olpar360 field-audit app
//!
//! This crate contains the shared models, the dual-mode (remote/local)
//! document stores, and the persistence façade used by every Olpar client.

pub mod config;
pub mod error;
pub mod export;
pub mod health;
pub mod models;
pub mod services;
pub mod session;
pub mod store;
pub mod util;

pub use config::{AppConfig, RemoteConfig};
pub use error::{Error, Result, StoreError};
pub use health::{CloudHealth, CloudState, CloudStatus};
pub use models::{AuditRecord, ClientValidationStatus, UserProfile};
pub use services::{Persistence, Subscription};
