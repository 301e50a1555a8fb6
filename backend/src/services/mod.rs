//! Business logic services.

pub mod access_tree;
pub mod audit_service;
pub mod auth_service;
pub mod cascade;
pub mod catalog_service;
pub mod directory_service;
pub mod export_service;
pub mod grant_service;
pub mod import_service;
pub mod validation;
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_support;
