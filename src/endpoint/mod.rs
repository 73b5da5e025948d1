//! Endpoint facade: the API a higher-level protocol drives.

mod config;
#[allow(clippy::module_inception)]
mod endpoint;

pub use config::{EndpointConfig, EndpointConfigBuilder, Param, ParamKind};
pub use endpoint::Endpoint;
