use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// Rotation packed into four signed 16-bit components.
///
/// Encoding scales each component by 32767 and truncates toward zero, so a
/// round trip loses at most `1 / 32767` per component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quat16 {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub w: i16,
}

impl Default for Quat16 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat16 {
    pub const MAX_VAL: f32 = 32767.0;
    pub const IDENTITY: Quat16 = Quat16 {
        x: 0,
        y: 0,
        z: 0,
        w: 32767,
    };

    pub fn from_quat(q: &glm::Quat) -> Self {
        Self {
            x: pack(q.i),
            y: pack(q.j),
            z: pack(q.k),
            w: pack(q.w),
        }
    }

    pub fn to_quat(&self) -> glm::Quat {
        glm::quat(
            self.x as f32 / Self::MAX_VAL,
            self.y as f32 / Self::MAX_VAL,
            self.z as f32 / Self::MAX_VAL,
            self.w as f32 / Self::MAX_VAL,
        )
    }

    pub fn components(&self) -> [i16; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn from_components(c: [i16; 4]) -> Self {
        Self {
            x: c[0],
            y: c[1],
            z: c[2],
            w: c[3],
        }
    }
}

fn pack(c: f32) -> i16 {
    // `as` truncates toward zero and saturates NaN to 0
    ((c * Quat16::MAX_VAL) as i32).clamp(-32767, 32767) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_components() {
        let q = Quat16::from_quat(&glm::quat(2.0, -2.0, 0.5, 1.0));
        assert_eq!(q.x, 32767);
        assert_eq!(q.y, -32767);
        assert_eq!(q.z, 16383);
        assert_eq!(q.w, 32767);
    }

    #[test]
    fn decode_is_within_one_step() {
        let src = glm::quat_normalize(&glm::quat(0.1, -0.7, 0.3, 0.6));
        let back = Quat16::from_quat(&src).to_quat();
        let step = 1.0 / Quat16::MAX_VAL;
        assert!((src.i - back.i).abs() <= step);
        assert!((src.j - back.j).abs() <= step);
        assert!((src.k - back.k).abs() <= step);
        assert!((src.w - back.w).abs() <= step);
    }
}
