//! Request extractors shared by generated routes.

mod request;
pub use request::RequestContext;
