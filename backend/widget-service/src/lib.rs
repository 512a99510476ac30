//! HTTP service that resolves embedded widget page views.
//!
//! The embed script posts the page url plus session context to
//! `/v1/resolve`; the service walks the manifest resolution steps, loads
//! and orders the chosen feed, and returns the full widget payload in a
//! single response.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
