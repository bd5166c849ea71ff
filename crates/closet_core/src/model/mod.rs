//! Catalog domain model.
//!
//! # Responsibility
//! - Define the image, tag and image-with-tags records shared by every layer.
//! - Own tag-string normalization and client-side tag filtering.
//!
//! # Invariants
//! - Every image and tag is identified by a storage-assigned integer id.
//! - Tag names held by these records are always normalized.

pub mod image;
pub mod tag;
