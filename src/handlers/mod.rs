//! HTTP handlers for generated view routes.

pub mod view;
