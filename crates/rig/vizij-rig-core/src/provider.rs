//! Provider contract: anything that wants partial or full control of the
//! controlled node's pose.
//!
//! Providers are shared as `Rc<RefCell<dyn ConstraintProvider>>`. Blend stacks
//! keep only weak references, so the gameplay system that created a provider
//! decides its lifetime.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::frame::{ReferenceFrame, RigTransform};
use crate::math::{sanitize_unit, Quat, Vec3, QUAT_IDENTITY, VEC3_ZERO};
use crate::owner::OwnerHandle;

/// Which blend stack an entry lives in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintAxis {
    Position,
    Rotation,
}

/// Per-call context handed to providers.
#[derive(Copy, Clone, Debug)]
pub struct ConstraintQuery<'a> {
    /// Frame the returned target must be expressed in.
    pub frame: &'a ReferenceFrame,
    /// Fixed tick counter; stable for every query issued during one tick.
    pub tick: u64,
    /// Fixed-step delta of the tick being composed.
    pub delta_time: f32,
}

pub trait ConstraintProvider {
    /// How strongly a fully blended-in target overrides lower priorities, in [0, 1].
    fn strength(&self) -> f32;

    /// Called every tick with whether this provider participates in composition
    /// for `axis`. Inactive providers are not queried for that axis.
    fn set_active(&mut self, axis: ConstraintAxis, active: bool);

    /// Liveness of the object backing this provider.
    fn owner(&self) -> OwnerHandle {
        OwnerHandle::detached()
    }

    fn constraint_position(&mut self, _query: &ConstraintQuery<'_>) -> Vec3 {
        VEC3_ZERO
    }

    fn constraint_rotation(&mut self, _query: &ConstraintQuery<'_>) -> Quat {
        QUAT_IDENTITY
    }
}

pub type SharedProvider = Rc<RefCell<dyn ConstraintProvider>>;

/// Wrap a provider for registration.
pub fn share<P: ConstraintProvider + 'static>(provider: P) -> SharedProvider {
    Rc::new(RefCell::new(provider))
}

/// Erase a typed provider handle while the caller keeps typed access.
pub fn as_shared<P: ConstraintProvider + 'static>(provider: &Rc<RefCell<P>>) -> SharedProvider {
    provider.clone()
}

/// Per-axis activity flags as last set by a compositor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ActivityFlags {
    pub position: bool,
    pub rotation: bool,
}

impl ActivityFlags {
    pub fn set(&mut self, axis: ConstraintAxis, active: bool) {
        match axis {
            ConstraintAxis::Position => self.position = active,
            ConstraintAxis::Rotation => self.rotation = active,
        }
    }

    pub fn get(&self, axis: ConstraintAxis) -> bool {
        match axis {
            ConstraintAxis::Position => self.position,
            ConstraintAxis::Rotation => self.rotation,
        }
    }
}

/// Constant local pose, e.g. a scripted hold or a weapon aim offset.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    pub pose: RigTransform,
    pub strength: f32,
    pub owner: OwnerHandle,
    pub activity: ActivityFlags,
    /// Number of position/rotation queries answered so far.
    pub queries: u32,
}

impl FixedProvider {
    pub fn new(pose: RigTransform) -> Self {
        Self {
            pose,
            strength: 1.0,
            owner: OwnerHandle::detached(),
            activity: ActivityFlags::default(),
            queries: 0,
        }
    }

    pub fn position(translation: Vec3) -> Self {
        Self::new(RigTransform::from_translation(translation))
    }

    pub fn rotation(rotation: Quat) -> Self {
        Self::new(RigTransform::new(VEC3_ZERO, rotation))
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_owner(mut self, owner: OwnerHandle) -> Self {
        self.owner = owner;
        self
    }

    pub fn is_active(&self, axis: ConstraintAxis) -> bool {
        self.activity.get(axis)
    }
}

impl ConstraintProvider for FixedProvider {
    fn strength(&self) -> f32 {
        sanitize_unit(self.strength)
    }

    fn set_active(&mut self, axis: ConstraintAxis, active: bool) {
        self.activity.set(axis, active);
    }

    fn owner(&self) -> OwnerHandle {
        self.owner.clone()
    }

    fn constraint_position(&mut self, _query: &ConstraintQuery<'_>) -> Vec3 {
        self.queries += 1;
        self.pose.translation
    }

    fn constraint_rotation(&mut self, _query: &ConstraintQuery<'_>) -> Quat {
        self.queries += 1;
        self.pose.rotation
    }
}

/// World-space target pose, re-expressed in whatever frame the compositor asks for.
/// Suits look-at holds and lean anchors placed in the scene.
#[derive(Debug, Clone)]
pub struct WorldTargetProvider {
    pub target: RigTransform,
    pub strength: f32,
    pub owner: OwnerHandle,
    pub activity: ActivityFlags,
}

impl WorldTargetProvider {
    pub fn new(target: RigTransform) -> Self {
        Self {
            target,
            strength: 1.0,
            owner: OwnerHandle::detached(),
            activity: ActivityFlags::default(),
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_owner(mut self, owner: OwnerHandle) -> Self {
        self.owner = owner;
        self
    }
}

impl ConstraintProvider for WorldTargetProvider {
    fn strength(&self) -> f32 {
        sanitize_unit(self.strength)
    }

    fn set_active(&mut self, axis: ConstraintAxis, active: bool) {
        self.activity.set(axis, active);
    }

    fn owner(&self) -> OwnerHandle {
        self.owner.clone()
    }

    fn constraint_position(&mut self, query: &ConstraintQuery<'_>) -> Vec3 {
        query.frame.inverse_transform_point(self.target.translation)
    }

    fn constraint_rotation(&mut self, query: &ConstraintQuery<'_>) -> Quat {
        query.frame.inverse_transform_rotation(self.target.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_target_is_expressed_in_query_frame() {
        let mut p = WorldTargetProvider::new(RigTransform::from_translation([5.0, 1.0, 0.0]));
        let frame = ReferenceFrame::new([2.0, 1.0, 0.0], QUAT_IDENTITY);
        let q = ConstraintQuery {
            frame: &frame,
            tick: 1,
            delta_time: 1.0 / 60.0,
        };
        assert_eq!(p.constraint_position(&q), [3.0, 0.0, 0.0]);
    }

    #[test]
    fn strength_is_sanitized() {
        assert_eq!(FixedProvider::position(VEC3_ZERO).with_strength(3.0).strength(), 1.0);
        assert_eq!(
            FixedProvider::position(VEC3_ZERO)
                .with_strength(f32::NAN)
                .strength(),
            0.0
        );
    }

    #[test]
    fn activity_flags_are_per_axis() {
        let mut p = FixedProvider::position(VEC3_ZERO);
        p.set_active(ConstraintAxis::Position, true);
        assert!(p.is_active(ConstraintAxis::Position));
        assert!(!p.is_active(ConstraintAxis::Rotation));
    }
}
