pub use chunk::*;
pub use tag::*;
pub use train::*;

pub mod chunk;
pub mod tag;
pub mod train;
