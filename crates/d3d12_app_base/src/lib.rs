//! Shared boilerplate for the Direct3D 12 learning samples.
//!
//! Every sample has the same shape: the base application creates the device,
//! swap chain and per-frame resources, the sample builds its pipeline and
//! static buffers once, and the base then drives a clear/draw/present loop,
//! pacing the CPU against the GPU with one fence per frame slot.
//!
//! The frame pacing protocol, texture footprint math, configuration and shader
//! lookup are platform neutral so they can be exercised without a GPU. The
//! Direct3D 12 glue is only compiled on Windows.

pub mod config;
pub mod frame;
pub mod frame_pacing;
pub mod logging;
pub mod shader;
pub mod upload;

#[cfg(windows)]
pub mod app;
#[cfg(windows)]
pub mod d3d12;
#[cfg(windows)]
pub mod sample;
#[cfg(windows)]
pub mod window;

pub use config::SampleConfig;
pub use frame::FrameInfo;
pub use frame_pacing::FRAME_COUNT;
