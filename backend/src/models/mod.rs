//! Database models (SQLx).

pub mod access;
pub mod department;
pub mod directive;
pub mod information_system;
pub mod log;
pub mod unit;
pub mod user;
pub mod user_access;
