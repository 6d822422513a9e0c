//! Fast floating-point helpers used throughout the rasterizer's hot paths.
//!
//! These are not "correct IEEE" operations in all corner cases (see each
//! function's documentation for its NaN behavior); they are chosen because
//! they map to a single machine instruction on common targets and are cheap
//! enough to call per-pixel or per-edge without showing up in profiles.
mod cast;
mod cmp;
mod fma;

pub use self::cast::*;
pub use self::cmp::*;
pub use self::fma::*;
