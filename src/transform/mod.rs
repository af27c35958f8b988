//! Matrix math, the per-frame matrix stack and the view transform.

pub mod matrix;
pub mod stack;
pub mod view;
