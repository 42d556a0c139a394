//! Configuration, file-system layout and logging bootstrap for trustline-mirror.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, NetworkConfig, TradingConfig, WalletConfig, ALLOWED_ENDPOINTS, DEFAULT_LOG_LEVEL,
    DEFAULT_WEBSOCKET_URL, LOCAL_SUBMIT_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
