pub mod chunked;
pub mod provider;

pub use chunked::*;
pub use provider::*;
