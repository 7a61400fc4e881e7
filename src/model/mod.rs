pub mod catalog;
pub mod common;
pub mod conflict;
pub mod filter;
pub mod group;
pub mod request;
pub mod status;
pub mod user_context;

pub use catalog::*;
pub use common::*;
pub use conflict::*;
pub use filter::*;
pub use group::*;
pub use request::*;
pub use status::*;
pub use user_context::*;
