pub mod aligner;
pub mod builder;
pub mod compositor;
pub mod traits;
pub mod types;

pub use aligner::*;
pub use builder::*;
pub use compositor::*;
pub use traits::*;
pub use types::*;
