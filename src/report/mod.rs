//! Report assembly and rendering.
//!
//! - `payload`: the JSON document sent to the template server, plus the summary
//! - `renderer`: the HTTP client and PDF persistence

pub mod payload;
pub mod renderer;

pub use payload::{ReportPayload, ReportSummary};
pub use renderer::{report_file_name, save_pdf, HttpReportRenderer, ReportRenderer};
