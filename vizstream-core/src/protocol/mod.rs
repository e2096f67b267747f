//! Typed payloads for each message kind.
//!
//! | kind        | module        | encoding            |
//! |-------------|---------------|---------------------|
//! | CAMERA      | [`camera`]    | fixed 100 bytes     |
//! | PIXELS      | [`pixels`]    | 24-byte sub-header + data |
//! | STATE       | [`state`]     | bincode             |
//! | RANGE       | [`range`]     | bincode             |
//! | HELLO / ACK / RESIZE / SET_FRAME | [`handshake`] | bincode |
//! | RENDER_DATA | (opaque)      | raw bytes           |

pub mod camera;
pub mod handshake;
pub mod pixels;
pub mod range;
pub mod state;

pub use camera::{CameraState, SensorFit, ViewPerspective};
pub use handshake::{Hello, HelloAck, PROTOCOL_VERSION, Resize, SetFrame};
pub use pixels::{PixelHeader, decode_pixels, encode_pixels};
pub use range::{DataBounds, RangeMode, RangeQuery};
pub use state::RenderState;
