mod annotation;
mod chunk;

pub use annotation::*;
pub use chunk::*;
