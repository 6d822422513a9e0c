//! Provides a small sort implementation.
mod auto;
mod cstdlib;
mod insertion;
pub use self::auto::*;
pub use self::cstdlib::*;
pub use self::insertion::*;
