//! Drawing contexts and the frame loop.

/// Drawing-context trait and backend selection.
pub mod context;
/// `vello_cpu` drawing context.
pub mod cpu;
/// Host frame scheduling and the render loop.
pub mod frame_loop;
