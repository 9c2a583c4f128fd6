//! Subcontractor compliance tracking.
//!
//! General contractors register subcontractors, attach AVS documents (insurance certificates,
//! licenses) with validity windows, and get alerted when documents are missing, expiring soon,
//! or expired. The [`compliance`] module holds the evaluation engine together with the
//! persistence and blob store seams the HTTP service is built on.

pub mod compliance;
pub mod config;
pub mod error;
pub mod telemetry;
