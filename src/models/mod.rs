pub mod file;
pub mod filter;
pub mod pagination;
pub mod user;

pub use file::*;
pub use filter::*;
pub use pagination::*;
pub use user::*;
