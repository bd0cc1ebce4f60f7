/// Tracing subscriber setup for the binary.
pub mod logging;
/// `dossier.toml` configuration.
pub mod toml_config;

pub use toml_config::{ConfigError, DossierConfig};
