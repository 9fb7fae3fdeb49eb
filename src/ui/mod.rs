//! Dashboard presentation data: the navigation menu and the client route table.

pub mod nav;
pub mod routes;

pub use nav::*;
pub use routes::*;
