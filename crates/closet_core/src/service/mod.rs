//! Catalog use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and photo-file calls into use-case level APIs.
//! - Keep FFI/CLI layers decoupled from storage details.

pub mod catalog_service;
