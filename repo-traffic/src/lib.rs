pub mod configuration;
pub mod domain;
pub mod enumerator;
pub mod error;
pub mod export;
pub mod github_client;
pub mod pipeline;
pub mod telemetry;

pub use error::TrafficError;
