//! Domain layer - core types and configuration.
//!
//! Records, configuration, job status and error types. No I/O.

pub mod config;
pub mod error;
pub mod job;
pub mod models;

pub use config::{AppConfig, ExportConfig, RemoteConfig};
pub use error::{AppError, Result};
pub use job::{JobStatus, RecentExport};
pub use models::{ChatLocator, ExportRecord, ExportSummary, MediaKind, ResolvedChat, TextEntity};
