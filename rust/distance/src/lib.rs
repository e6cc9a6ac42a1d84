pub mod distance;
pub mod types;

pub use distance::*;
pub use types::*;
