//! Organization service client assembly.
//!
//! This crate is the composition root for the workspace. Responsibilities:
//!
//! 1. **Load configuration**: [`ClientConfig`] layers defaults, an optional
//!    TOML file and `ORGSERVICE_*` environment variables, then validates the
//!    result.
//! 2. **Wire observability**: [`init_logging`] installs a `tracing-subscriber`
//!    with a text or JSON layer. All spans and events emitted by the
//!    `orgservice` crate flow through it.
//! 3. **Assemble the client**: [`ServiceClient`] injects a caller-supplied
//!    [`orgservice::RequestExecutor`] into a batch registry and a metadata
//!    cache, optionally sharing the cache between clients.
//!
//! The transport behind the executor is supplied by the embedding
//! application.
//!
//! ```ignore
//! let config = ClientConfig::load("orgservice.toml")?;
//! init_logging(&config.logging)?;
//! let client = ServiceClient::new(Arc::new(HttpExecutor::new(url)), &config);
//! let account = client.metadata().entity_metadata("account", EntityFilters::ALL).await;
//! ```

pub mod config;
pub mod service_client;
pub mod telemetry;

pub use config::{ClientConfig, ConfigLoadError, LoggingSettings};
pub use service_client::ServiceClient;
pub use telemetry::{init_logging, TelemetryError};
