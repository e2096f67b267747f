//! Camera state and its fixed 100-byte wire layout.
//!
//! ```text
//! offset  size  field
//! 0       48    view_matrix        12 × f32, row-major 3x4 camera→world
//! 48      4     lens               f32 (mm)
//! 52      4     clip_start         f32
//! 56      4     clip_end           f32
//! 60      4     sensor_width       f32 (mm)
//! 64      4     sensor_height      f32 (mm)
//! 68      4     sensor_fit         i32 (0 auto, 1 horizontal, 2 vertical)
//! 72      4     view_camera_zoom   f32
//! 76      8     view_camera_offset 2 × f32
//! 84      4     use_view_camera    i32 (0 / 1)
//! 88      4     shift_x            f32
//! 92      4     shift_y            f32
//! 96      4     view_perspective   i32 (0 persp, 1 ortho, 2 camera)
//! ```

use bytes::{Buf, BufMut};

use crate::error::VizError;

// ── Enums ────────────────────────────────────────────────────────

/// How the sensor size maps onto the output aspect ratio.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SensorFit {
    #[default]
    Auto = 0,
    Horizontal = 1,
    Vertical = 2,
}

impl TryFrom<i32> for SensorFit {
    type Error = VizError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SensorFit::Auto),
            1 => Ok(SensorFit::Horizontal),
            2 => Ok(SensorFit::Vertical),
            _ => Err(VizError::UnknownVariant {
                type_name: "SensorFit",
                value: value as u64,
            }),
        }
    }
}

/// Projection used by the interactive viewport.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewPerspective {
    #[default]
    Perspective = 0,
    Orthographic = 1,
    /// Looking through the scene camera.
    Camera = 2,
}

impl TryFrom<i32> for ViewPerspective {
    type Error = VizError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ViewPerspective::Perspective),
            1 => Ok(ViewPerspective::Orthographic),
            2 => Ok(ViewPerspective::Camera),
            _ => Err(VizError::UnknownVariant {
                type_name: "ViewPerspective",
                value: value as u64,
            }),
        }
    }
}

// ── CameraState ──────────────────────────────────────────────────

/// The full view description sent with every camera update.
///
/// Always travels as one unit: [`decode`](Self::decode) and
/// [`validate`](Self::validate) either accept all fields or none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Row-major 3x4 camera-to-world transform. Translation lives in
    /// elements 3, 7 and 11.
    pub view_matrix: [f32; 12],
    pub lens: f32,
    pub clip_start: f32,
    pub clip_end: f32,
    pub sensor_width: f32,
    pub sensor_height: f32,
    pub sensor_fit: SensorFit,
    pub view_camera_zoom: f32,
    pub view_camera_offset: [f32; 2],
    pub use_view_camera: bool,
    pub shift_x: f32,
    pub shift_y: f32,
    pub view_perspective: ViewPerspective,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            view_matrix: IDENTITY,
            lens: 50.0,
            clip_start: 0.1,
            clip_end: 1000.0,
            sensor_width: 36.0,
            sensor_height: 24.0,
            sensor_fit: SensorFit::Auto,
            view_camera_zoom: 0.0,
            view_camera_offset: [0.0; 2],
            use_view_camera: false,
            shift_x: 0.0,
            shift_y: 0.0,
            view_perspective: ViewPerspective::Perspective,
        }
    }
}

const IDENTITY: [f32; 12] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0,
];

impl CameraState {
    /// Encoded size on the wire.
    pub const SIZE: usize = 100;

    /// Camera position in world space.
    pub fn position(&self) -> [f32; 3] {
        [self.view_matrix[3], self.view_matrix[7], self.view_matrix[11]]
    }

    pub fn set_position(&mut self, position: [f32; 3]) {
        self.view_matrix[3] = position[0];
        self.view_matrix[7] = position[1];
        self.view_matrix[11] = position[2];
    }

    /// Builder variant of [`set_position`](Self::set_position).
    pub fn with_position(mut self, position: [f32; 3]) -> Self {
        self.set_position(position);
        self
    }

    /// Camera at `eye` looking at `target`. The camera looks down its
    /// local -Z axis with +Y up.
    pub fn look_at(mut self, eye: [f32; 3], target: [f32; 3], up: [f32; 3]) -> Self {
        let forward = normalize(sub(target, eye));
        let right = normalize(cross(forward, up));
        let true_up = cross(right, forward);
        let back = [-forward[0], -forward[1], -forward[2]];
        for row in 0..3 {
            self.view_matrix[row * 4] = right[row];
            self.view_matrix[row * 4 + 1] = true_up[row];
            self.view_matrix[row * 4 + 2] = back[row];
            self.view_matrix[row * 4 + 3] = eye[row];
        }
        self
    }

    /// Reject non-finite or physically meaningless values.
    pub fn validate(&self) -> Result<(), VizError> {
        let floats = self.view_matrix.iter().chain([
            &self.lens,
            &self.clip_start,
            &self.clip_end,
            &self.sensor_width,
            &self.sensor_height,
            &self.view_camera_zoom,
            &self.view_camera_offset[0],
            &self.view_camera_offset[1],
            &self.shift_x,
            &self.shift_y,
        ]);
        for v in floats {
            if !v.is_finite() {
                return Err(VizError::InvalidCamera("non-finite field"));
            }
        }
        if self.lens <= 0.0 {
            return Err(VizError::InvalidCamera("lens must be positive"));
        }
        if self.clip_start < 0.0 || self.clip_end <= self.clip_start {
            return Err(VizError::InvalidCamera("clip range is empty"));
        }
        if self.sensor_width <= 0.0 || self.sensor_height <= 0.0 {
            return Err(VizError::InvalidCamera("sensor size must be positive"));
        }
        Ok(())
    }

    /// Serialize to the fixed wire layout (little-endian).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let mut buf = &mut out[..];
        for v in self.view_matrix {
            buf.put_f32_le(v);
        }
        buf.put_f32_le(self.lens);
        buf.put_f32_le(self.clip_start);
        buf.put_f32_le(self.clip_end);
        buf.put_f32_le(self.sensor_width);
        buf.put_f32_le(self.sensor_height);
        buf.put_i32_le(self.sensor_fit as i32);
        buf.put_f32_le(self.view_camera_zoom);
        buf.put_f32_le(self.view_camera_offset[0]);
        buf.put_f32_le(self.view_camera_offset[1]);
        buf.put_i32_le(self.use_view_camera as i32);
        buf.put_f32_le(self.shift_x);
        buf.put_f32_le(self.shift_y);
        buf.put_i32_le(self.view_perspective as i32);
        out
    }

    /// Deserialize and validate. The payload must be exactly [`SIZE`](Self::SIZE) bytes.
    pub fn decode(data: &[u8]) -> Result<Self, VizError> {
        if data.len() != Self::SIZE {
            return Err(VizError::Malformed(format!(
                "camera payload is {} bytes, expected {}",
                data.len(),
                Self::SIZE
            )));
        }
        let mut buf = data;
        let mut view_matrix = [0f32; 12];
        for v in view_matrix.iter_mut() {
            *v = buf.get_f32_le();
        }
        let lens = buf.get_f32_le();
        let clip_start = buf.get_f32_le();
        let clip_end = buf.get_f32_le();
        let sensor_width = buf.get_f32_le();
        let sensor_height = buf.get_f32_le();
        let sensor_fit = SensorFit::try_from(buf.get_i32_le())?;
        let view_camera_zoom = buf.get_f32_le();
        let view_camera_offset = [buf.get_f32_le(), buf.get_f32_le()];
        let use_view_camera = match buf.get_i32_le() {
            0 => false,
            1 => true,
            _ => return Err(VizError::InvalidCamera("use_view_camera must be 0 or 1")),
        };
        let shift_x = buf.get_f32_le();
        let shift_y = buf.get_f32_le();
        let view_perspective = ViewPerspective::try_from(buf.get_i32_le())?;

        let camera = Self {
            view_matrix,
            lens,
            clip_start,
            clip_end,
            sensor_width,
            sensor_height,
            sensor_fit,
            view_camera_zoom,
            view_camera_offset,
            use_view_camera,
            shift_x,
            shift_y,
            view_perspective,
        };
        camera.validate()?;
        Ok(camera)
    }
}

// ── Vector helpers ───────────────────────────────────────────────

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f32::EPSILON {
        return v;
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_camera() -> CameraState {
        CameraState {
            view_matrix: [
                0.1, 0.2, 0.3, 1.5, 0.4, 0.5, 0.6, -2.5, 0.7, 0.8, 0.9, 12.25,
            ],
            lens: 35.0,
            clip_start: 0.01,
            clip_end: 250.0,
            sensor_width: 32.0,
            sensor_height: 18.0,
            sensor_fit: SensorFit::Vertical,
            view_camera_zoom: 1.25,
            view_camera_offset: [0.05, -0.125],
            use_view_camera: true,
            shift_x: 0.3,
            shift_y: -0.2,
            view_perspective: ViewPerspective::Camera,
        }
    }

    #[test]
    fn all_fourteen_fields_survive_the_wire() {
        let cam = busy_camera();
        let bytes = cam.encode();
        assert_eq!(bytes.len(), CameraState::SIZE);
        assert_eq!(CameraState::decode(&bytes).unwrap(), cam);
    }

    #[test]
    fn field_offsets() {
        let bytes = busy_camera().encode();
        assert_eq!(&bytes[12..16], &1.5f32.to_le_bytes());
        assert_eq!(&bytes[48..52], &35.0f32.to_le_bytes());
        assert_eq!(&bytes[68..72], &2i32.to_le_bytes());
        assert_eq!(&bytes[84..88], &1i32.to_le_bytes());
        assert_eq!(&bytes[96..100], &2i32.to_le_bytes());
    }

    #[test]
    fn position_lives_in_translation_column() {
        let cam = CameraState::default().with_position([0.0, 0.0, 5.0]);
        assert_eq!(cam.position(), [0.0, 0.0, 5.0]);
        assert_eq!(cam.view_matrix[11], 5.0);
        assert_eq!(cam.lens, CameraState::default().lens);
    }

    #[test]
    fn wrong_length_rejected() {
        let bytes = busy_camera().encode();
        assert!(matches!(
            CameraState::decode(&bytes[..99]),
            Err(VizError::Malformed(_))
        ));
    }

    #[test]
    fn nan_rejects_whole_update() {
        let mut cam = busy_camera();
        cam.shift_y = f32::NAN;
        assert!(matches!(cam.validate(), Err(VizError::InvalidCamera(_))));
        assert!(CameraState::decode(&cam.encode()).is_err());
    }

    #[test]
    fn out_of_range_enum_rejected() {
        let mut bytes = busy_camera().encode();
        bytes[96..100].copy_from_slice(&7i32.to_le_bytes());
        assert!(matches!(
            CameraState::decode(&bytes),
            Err(VizError::UnknownVariant { type_name: "ViewPerspective", .. })
        ));
    }

    #[test]
    fn look_at_places_eye_and_faces_target() {
        let cam = CameraState::default().look_at([0.0, 0.0, 5.0], [0.0; 3], [0.0, 1.0, 0.0]);
        assert_eq!(cam.position(), [0.0, 0.0, 5.0]);
        // local +Z points away from the target
        assert!((cam.view_matrix[10] - 1.0).abs() < 1e-6);
        cam.validate().unwrap();
    }
}
