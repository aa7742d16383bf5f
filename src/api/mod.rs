/// Cluster management API client implementation
pub mod client;
pub mod error;
pub mod models;
pub mod params;
pub mod status;

pub use client::{Configuration, TlsSettings, Wrapper};
pub use error::{ClientError, ConfigurationError, Error};
pub use params::AuxiliaryParams;
