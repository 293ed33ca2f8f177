//! Domain types for the Blacklist Gateway.
//!
//! Records, configuration and error handling. Shared mutable state (cache,
//! interval) lives in `crate::cache` and `crate::scheduler`.

pub mod config;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use config::{
    ConfigError, GatewayConfig, LimitsConfig, RefreshConfig, SecurityConfig, ServerConfig, DEFAULT_PORT,
};
pub use error::{ApiError, ApiResult, GatewayError};
pub use types::{AttackRecord, NewAttack, TEST_ATTACKS};
