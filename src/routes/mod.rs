//! Router builders: application-level routes and generated view routes.

mod common;
mod view;

pub use common::common_routes;
pub use view::{full_paths, view_routes};
