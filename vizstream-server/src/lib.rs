//! # vizstream-server: render node
//!
//! Listens for a display client, negotiates the stream parameters and
//! renders frames for the client's camera, refining them progressively
//! while the camera stays still. Frames are pushed as soon as they are
//! rendered, paced by the configured timestep.
//!
//! Rendering is done by the built-in test-pattern backend; real renderers
//! plug in through `vizstream_core::stream::RenderBackend`.

pub mod config;
pub mod service;
