//! RTCC Backend REST Adapter
//!
//! Implements the `DataService` port over HTTP: incident and unit
//! listing and updates, traffic incidents, and read-only transit
//! status, with retries on transient failures.

pub mod client;

pub use client::{ApiError, RtccClient, RtccClientConfig};
