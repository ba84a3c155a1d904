//! shield-core — shared building blocks for the Shield control plane.
//!
//! - [`quantity`]: byte and CPU quantity codec
//! - [`tenant`]: company name → namespace key derivation
//! - [`labels`]: label keys and selectors stamped on managed resources
//! - [`catalog`]: deployable service types, bundles, prices
//! - [`config`]: `shield.toml` parsing

pub mod catalog;
pub mod config;
pub mod labels;
pub mod quantity;
pub mod tenant;

pub use catalog::{BackupAction, BackupEngine, Category, Offering, PriceTable, ServiceTemplate};
pub use config::ShieldConfig;
pub use labels::Labels;
pub use quantity::{QuantityError, QuantityResult};
pub use tenant::{NamespacePolicy, TenantKey, TenantKeyError};
