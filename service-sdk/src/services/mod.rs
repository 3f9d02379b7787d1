//! Shared plumbing for talking to the rescue collaborators
//!
//! - `common`: HTTP client construction and user agent
//! - `health`: `/health` probing and aggregate classification

pub mod common;
pub mod health;

pub use common::{build_http_client, UserAgent};
pub use health::{classify, HealthReport, HealthStatus, ServiceHealth};
