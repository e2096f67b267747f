//! STATE payload: what the render peer reports after each frame.

use serde::{Deserialize, Serialize};

use crate::error::VizError;
use crate::protocol::range::DataBounds;

/// Render-side report sent right after every PIXELS message.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderState {
    /// Data extent discovered so far.
    pub bounds: DataBounds,
    /// Accumulated samples of the frame just sent.
    pub samples: u32,
    /// Render-side frames per second.
    pub fps: f32,
}

impl RenderState {
    pub fn to_bytes(&self) -> Result<Vec<u8>, VizError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, VizError> {
        Ok(bincode::deserialize(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_bytes() {
        let state = RenderState {
            bounds: DataBounds {
                lower: [-1.0; 3],
                upper: [1.0; 3],
                scalar_range: [0.0, 3.5],
            },
            samples: 16,
            fps: 29.5,
        };
        let bytes = state.to_bytes().unwrap();
        assert_eq!(RenderState::from_bytes(&bytes).unwrap(), state);
    }

    #[test]
    fn garbage_is_an_encoding_error() {
        assert!(matches!(
            RenderState::from_bytes(&[1, 2, 3]),
            Err(VizError::Encoding(_))
        ));
    }
}
