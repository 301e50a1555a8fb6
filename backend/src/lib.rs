//! Access Console - Backend Library
//!
//! Organizational directory (departments, units, users), access hierarchies
//! per information system, and directive-backed access grants scoped by each
//! caller's reading and writing authority.

#[macro_use]
mod macros;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
