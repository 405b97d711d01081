/// Catalog state
///
/// This module handles the metadata side of the catalog:
/// - Database connection and queries (library.rs)
/// - Shared data structures and field rules (data.rs)
/// - Explicit created/modified stamping (audit.rs)

pub mod audit;
pub mod data;
pub mod library;
