//! WebGPU rendering module
//!
//! One instanced draw: a unit quad per sprite, placed by a per-instance model
//! matrix and squeezed to the viewport aspect by a uniform.

pub mod pipeline;
pub mod shapes;

pub use pipeline::RenderState;
pub use shapes::SpriteInstance;
