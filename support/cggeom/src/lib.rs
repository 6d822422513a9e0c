//! A helper library for `cgmath`, adding the 2D axis-aligned box and affine
//! transform constructors the rasterizer's geometry code needs.
pub use cgmath;

mod average;
mod boxes;
mod elementwise;
mod twodim;

pub use self::average::*;
pub use self::boxes::*;
pub use self::elementwise::*;
pub use self::twodim::*;

/// The prelude.
pub mod prelude {
    #[doc(no_inline)]
    pub use crate::{AxisAlignedBox, ElementWiseOp, ElementWisePartialOrd, Matrix3TwoDimExt};
}
