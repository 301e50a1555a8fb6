//! HTTP request handlers.

pub mod accesses;
pub mod admin;
pub mod auth;
pub mod departments;
pub mod directives;
pub mod export;
pub mod health;
pub mod information_systems;
pub mod logs;
pub mod units;
pub mod users;
