pub mod memory;
pub mod postgres;
pub mod request_batch;
pub mod traits;

pub use memory::*;
pub use postgres::*;
pub use request_batch::*;
pub use traits::*;
