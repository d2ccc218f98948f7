//! Rasterisation primitives. Each operation mutates a [`Surface`](crate::canvas::Surface)
//! directly and knows nothing about tools, gestures or history.

pub mod fill;
pub mod shapes;
pub mod stamp;
pub mod stroke;
