//! Reference frames and local poses.

use serde::{Deserialize, Serialize};

use crate::math::{
    add_vec3, lerp_vec3, normalize_quat, quat_conjugate, quat_mul, quat_rotate_vec3, slerp_quat,
    sub_vec3, Quat, Vec3, QUAT_IDENTITY, VEC3_ZERO,
};

/// World placement of the node that targets are expressed relative to
/// (in practice the controlled node's parent).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    pub position: Vec3,
    /// Quaternion (x, y, z, w)
    pub rotation: Quat,
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ReferenceFrame {
    pub const IDENTITY: Self = Self {
        position: VEC3_ZERO,
        rotation: QUAT_IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation: normalize_quat(rotation),
        }
    }

    /// Local point → world point.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        add_vec3(self.position, quat_rotate_vec3(self.rotation, local))
    }

    /// World point → local point.
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        quat_rotate_vec3(
            quat_conjugate(self.rotation),
            sub_vec3(world, self.position),
        )
    }

    /// Local rotation → world rotation.
    pub fn transform_rotation(&self, local: Quat) -> Quat {
        normalize_quat(quat_mul(self.rotation, local))
    }

    /// World rotation → local rotation.
    pub fn inverse_transform_rotation(&self, world: Quat) -> Quat {
        normalize_quat(quat_mul(quat_conjugate(self.rotation), world))
    }
}

/// Translation + rotation pair. Used both for the node's local pose and
/// for world poses of reference targets.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigTransform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for RigTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigTransform {
    pub const IDENTITY: Self = Self {
        translation: VEC3_ZERO,
        rotation: QUAT_IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: QUAT_IDENTITY,
        }
    }

    /// Component-wise lerp for translation, slerp for rotation.
    pub fn lerp(a: &RigTransform, b: &RigTransform, t: f32) -> RigTransform {
        RigTransform {
            translation: lerp_vec3(a.translation, b.translation, t),
            rotation: slerp_quat(a.rotation, b.rotation, t),
        }
    }

    /// This pose expressed relative to `frame`.
    pub fn relative_to(&self, frame: &ReferenceFrame) -> RigTransform {
        RigTransform {
            translation: frame.inverse_transform_point(self.translation),
            rotation: frame.inverse_transform_rotation(self.rotation),
        }
    }
}
