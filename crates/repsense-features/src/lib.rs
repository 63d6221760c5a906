mod assembler;
mod window;

pub use assembler::*;
pub use window::*;
