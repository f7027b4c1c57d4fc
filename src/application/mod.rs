//! Application layer - use cases and orchestration.
//!
//! Streaming history from the remote, pacing it, writing the export log,
//! and turning logs into cleaned transcripts.

pub mod cleaner;
pub mod export_service;
pub mod formatter;
pub mod inspect;
pub mod job_tracker;
pub mod quick_export;
pub mod raw;
pub mod resolver;
pub mod scheduler;
pub mod stream;
pub mod sync_service;

pub use cleaner::{convert_to_clean_format, default_output_path, sample_lines, CleanFormat, CleanOptions};
pub use export_service::{ExportRequest, ExportService};
pub use formatter::{
    format_clean_stats, format_export_summary, format_inspection_table, format_sample,
    OutputFormat,
};
pub use inspect::LogInspection;
pub use job_tracker::JobTracker;
pub use quick_export::{run_quick_export, QuickExportRequest};
pub use scheduler::{LogProgress, SyncSchedule, TokioSleeper};
pub use sync_service::SyncService;
