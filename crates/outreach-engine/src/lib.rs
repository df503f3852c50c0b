//! Prospect engagement scoring and lifecycle engine.
//!
//! Converts timestamped outreach interactions into a bounded score, an engagement group, and a
//! funnel status, and decays quiet prospects on a schedule. The [`engagement`] module holds the
//! engine itself; the remaining modules carry configuration, logging, and error plumbing shared
//! with the API service.

pub mod config;
pub mod engagement;
pub mod error;
pub mod telemetry;
