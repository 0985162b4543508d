//! Built-in "no constraints" provider.
//!
//! Sits at priority 0 with full strength. With a reference target it damps
//! toward that target's pose; without one it contributes the identity pose.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};
use crate::frame::RigTransform;
use crate::math::{lerp_vec3, sanitize_unit, slerp_quat, Quat, Vec3, QUAT_IDENTITY, VEC3_ZERO};
use crate::provider::{ActivityFlags, ConstraintAxis, ConstraintProvider, ConstraintQuery};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// 0 snaps to the target every tick, 1 never moves.
    pub damping: f32,
    pub track_position: bool,
    pub track_rotation: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            damping: 0.25,
            track_position: true,
            track_rotation: true,
        }
    }
}

impl FallbackConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(RigError::InvalidConfig {
                reason: format!("fallback damping must be within [0, 1], got {}", self.damping),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    /// Per-tick lerp factor toward the target.
    fn smoothing(&self) -> f32 {
        1.0 - sanitize_unit(self.damping)
    }
}

/// World pose of the designated default reference, written by the host.
#[derive(Clone, Debug, Default)]
pub struct ReferenceTarget(Rc<Cell<RigTransform>>);

impl ReferenceTarget {
    pub fn new(pose: RigTransform) -> Self {
        Self(Rc::new(Cell::new(pose)))
    }

    pub fn set(&self, pose: RigTransform) {
        self.0.set(pose);
    }

    pub fn get(&self) -> RigTransform {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy)]
struct Damped<T> {
    value: T,
    last_tick: Option<u64>,
    seeded: bool,
}

impl<T: Copy> Damped<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            last_tick: None,
            seeded: false,
        }
    }

    /// Advance at most once per tick.
    fn step(&mut self, tick: u64, target: T, smoothing: f32, blend: impl Fn(T, T, f32) -> T) -> T {
        if self.last_tick == Some(tick) {
            return self.value;
        }
        self.value = if self.seeded {
            blend(self.value, target, smoothing)
        } else {
            self.seeded = true;
            target
        };
        self.last_tick = Some(tick);
        self.value
    }
}

#[derive(Debug)]
pub struct FallbackProvider {
    config: FallbackConfig,
    target: Option<ReferenceTarget>,
    position: Damped<Vec3>,
    rotation: Damped<Quat>,
    activity: ActivityFlags,
}

impl FallbackProvider {
    pub fn new(config: FallbackConfig, target: Option<ReferenceTarget>) -> Self {
        Self {
            config,
            target,
            position: Damped::new(VEC3_ZERO),
            rotation: Damped::new(QUAT_IDENTITY),
            activity: ActivityFlags::default(),
        }
    }

    pub fn set_target(&mut self, target: Option<ReferenceTarget>) {
        self.target = target;
        self.position.seeded = false;
        self.rotation.seeded = false;
    }

    pub fn target(&self) -> Option<&ReferenceTarget> {
        self.target.as_ref()
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    pub fn is_active(&self, axis: ConstraintAxis) -> bool {
        self.activity.get(axis)
    }
}

impl ConstraintProvider for FallbackProvider {
    fn strength(&self) -> f32 {
        1.0
    }

    fn set_active(&mut self, axis: ConstraintAxis, active: bool) {
        if active && !self.activity.get(axis) {
            // Re-seed from the live target instead of easing in from a stale pose.
            match axis {
                ConstraintAxis::Position => self.position.seeded = false,
                ConstraintAxis::Rotation => self.rotation.seeded = false,
            }
        }
        self.activity.set(axis, active);
    }

    fn constraint_position(&mut self, query: &ConstraintQuery<'_>) -> Vec3 {
        let Some(target) = self.target.as_ref().filter(|_| self.config.track_position) else {
            return VEC3_ZERO;
        };
        let local = query.frame.inverse_transform_point(target.get().translation);
        let smoothing = self.config.smoothing();
        self.position.step(query.tick, local, smoothing, lerp_vec3)
    }

    fn constraint_rotation(&mut self, query: &ConstraintQuery<'_>) -> Quat {
        let Some(target) = self.target.as_ref().filter(|_| self.config.track_rotation) else {
            return QUAT_IDENTITY;
        };
        let local = query.frame.inverse_transform_rotation(target.get().rotation);
        let smoothing = self.config.smoothing();
        self.rotation.step(query.tick, local, smoothing, slerp_quat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ReferenceFrame;

    fn query(frame: &ReferenceFrame, tick: u64) -> ConstraintQuery<'_> {
        ConstraintQuery {
            frame,
            tick,
            delta_time: 1.0 / 60.0,
        }
    }

    #[test]
    fn without_target_contributes_identity() {
        let mut fb = FallbackProvider::new(FallbackConfig::default(), None);
        let frame = ReferenceFrame::new([3.0, 0.0, 0.0], QUAT_IDENTITY);
        assert_eq!(fb.constraint_position(&query(&frame, 1)), VEC3_ZERO);
        assert_eq!(fb.constraint_rotation(&query(&frame, 1)), QUAT_IDENTITY);
    }

    #[test]
    fn damps_toward_moved_target_without_overshoot() {
        let target = ReferenceTarget::new(RigTransform::IDENTITY);
        let mut fb = FallbackProvider::new(
            FallbackConfig::default().with_damping(0.25),
            Some(target.clone()),
        );
        fb.set_active(ConstraintAxis::Position, true);
        let frame = ReferenceFrame::IDENTITY;
        assert_eq!(fb.constraint_position(&query(&frame, 1)), VEC3_ZERO);

        target.set(RigTransform::from_translation([1.0, 0.0, 0.0]));
        let mut last = 0.0;
        for tick in 2..12 {
            let x = fb.constraint_position(&query(&frame, tick))[0];
            assert!(x >= last && x <= 1.0, "tick {tick}: {x}");
            last = x;
        }
        assert!(last > 0.999);
    }

    #[test]
    fn repeated_queries_in_one_tick_are_idempotent() {
        let target = ReferenceTarget::new(RigTransform::IDENTITY);
        let mut fb = FallbackProvider::new(FallbackConfig::default(), Some(target.clone()));
        let frame = ReferenceFrame::IDENTITY;
        fb.constraint_position(&query(&frame, 1));
        target.set(RigTransform::from_translation([4.0, 0.0, 0.0]));
        let a = fb.constraint_position(&query(&frame, 2));
        let b = fb.constraint_position(&query(&frame, 2));
        assert_eq!(a, b);
    }

    #[test]
    fn reactivation_snaps_to_target() {
        let target = ReferenceTarget::new(RigTransform::IDENTITY);
        let mut fb = FallbackProvider::new(FallbackConfig::default(), Some(target.clone()));
        let frame = ReferenceFrame::IDENTITY;
        fb.set_active(ConstraintAxis::Position, true);
        fb.constraint_position(&query(&frame, 1));
        fb.set_active(ConstraintAxis::Position, false);
        target.set(RigTransform::from_translation([0.0, 0.0, 7.0]));
        fb.set_active(ConstraintAxis::Position, true);
        assert_eq!(fb.constraint_position(&query(&frame, 5)), [0.0, 0.0, 7.0]);
    }

    #[test]
    fn damping_is_validated() {
        assert!(FallbackConfig::default().with_damping(1.5).validate().is_err());
        assert!(FallbackConfig::default().with_damping(1.0).validate().is_ok());
    }
}
