//! Tentacle Cloud: DigitalOcean fleet provider
//!
//! Lists, creates and deletes droplets through the DigitalOcean v2 API and
//! exposes them to the orchestrator as [`tentacle_core::Machine`] records.

pub mod client;
pub mod droplet;
pub mod error;

pub use client::{collect_pages, DigitalOceanClient, DigitalOceanConfig, PER_PAGE};
pub use droplet::{CreateDropletRequest, Droplet, DropletPage};
pub use error::CloudError;

/// Result type for cloud operations
pub type Result<T> = std::result::Result<T, CloudError>;
