//! puppet-stage renders an interactively posed 2D puppet inside a fixed-size drawing surface.
//!
//! The crate keeps the puppet scaled, centered and framed as the surrounding display changes
//! shape, and turns pointer input into gaze, tap and zoom interactions:
//!
//! - [`AdaptiveLayoutEngine`] computes view bounds, puppet scale and position (memoized)
//! - [`ViewTransform`] and [`TransformStack`] compose the per-frame transform chain
//! - [`PuppetLifecycle`] loads, hot-swaps and releases the single active puppet
//! - [`RenderLoop`] ticks through a host [`FrameScheduler`]
//! - [`PuppetStage`] wires everything together
#![forbid(unsafe_code)]

pub mod animation;
pub mod assets;
pub mod foundation;
pub mod input;
pub mod layout;
pub mod puppet;
pub mod render;
pub mod stage;
pub mod transform;

pub use crate::animation::ease::Ease;
pub use crate::assets::decode::{PreparedImage, decode_image, encode_png_premul};
pub use crate::foundation::core::{
    Affine, FrameRGBA, PixelSize, Point, Rect, Rgba8Premul, Vec2,
};
pub use crate::foundation::error::{PuppetError, PuppetResult};
pub use crate::input::router::{InputAction, InputEvent, InputRouter};
pub use crate::layout::config::{AdaptiveConfig, AspectRatioRules, AspectRule};
pub use crate::layout::engine::{AdaptiveLayoutEngine, AdaptiveParams, LayoutInput};
pub use crate::puppet::definition::PuppetDefinition;
pub use crate::puppet::instance::PuppetInstance;
pub use crate::puppet::lifecycle::{LifecycleState, LoadOutcome, PuppetLifecycle};
pub use crate::puppet::loader::{
    FsPuppetLoader, LoadedPuppet, MemoryPuppetLoader, PuppetLoader, PuppetSource,
};
pub use crate::render::context::{
    BackendKind, DrawQuad, RenderContext, SharedContext, TextureHandle, create_context,
    share_context,
};
pub use crate::render::cpu::CpuRenderContext;
pub use crate::render::frame_loop::{FrameScheduler, FrameTime, ManualScheduler, RenderLoop};
pub use crate::stage::{AdaptiveStatus, PuppetStage, StageOptions};
pub use crate::transform::matrix::Matrix44;
pub use crate::transform::stack::TransformStack;
pub use crate::transform::view::{ViewBounds, ViewTransform};
