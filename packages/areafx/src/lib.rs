pub mod kernel;
pub mod effect;
pub mod chain;
pub mod scene;
pub mod camera;
pub mod targeting;
pub mod uniforms;
pub mod compositor;
pub mod session;
pub mod gpu;

pub mod cli;
