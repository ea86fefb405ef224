pub mod estimator;
pub mod landmarks;
pub mod point;
pub mod third_point;
pub mod transform;

pub use estimator::*;
pub use landmarks::*;
pub use point::*;
pub use third_point::*;
pub use transform::*;
