pub mod loader;
pub mod synthetic;
pub mod writer;

pub use loader::*;
pub use synthetic::*;
pub use writer::*;
