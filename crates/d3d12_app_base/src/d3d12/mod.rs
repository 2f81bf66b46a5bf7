//! Thin helpers over the Direct3D 12 API shared by the base application and the samples.

pub mod barrier;
pub mod buffer;
pub mod debug_messages;
pub mod device;
pub mod fence;
pub mod pipeline;
pub mod root_signature;
pub mod upload_context;
