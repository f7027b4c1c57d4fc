//! Infrastructure layer - external adapters (remote gateway, filesystem, HTTP).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod export_log;
pub mod gateway_client;
pub mod session;
pub mod status_server;

pub use config::{config_file_path, ensure_config_exists, load_config, save_config};
pub use export_log::read_records;
pub use gateway_client::GatewayClient;
pub use session::{Credentials, SessionStore};
pub use status_server::{install_signal_handler, serve, ServerState};
