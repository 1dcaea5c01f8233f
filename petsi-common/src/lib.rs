//! PETSI Common - Shared configuration, errors, and logging for the PETSI gateway.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and their HTTP status mapping
//! - Logging setup and request trace context

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    AuthConfig, Config, GatewayConfig, ObservabilityConfig, SessionConfig, UpstreamConfig,
    UserConfig,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
