//! # vizstream-client: headless display client
//!
//! Connects to a render node, announces its viewport and orbits a camera
//! around the scene origin, mirroring each received frame in host memory.
//! Useful for smoke-testing a node and measuring stream throughput without
//! a GPU.

pub mod config;
pub mod viewer;
