//! Flutter-facing bindings for the closet catalog.

pub mod api;
