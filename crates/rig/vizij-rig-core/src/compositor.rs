//! Compositor: owns the position and rotation stacks of one controlled node.
//!
//! Two entry points, driven by the host:
//! - `fixed_update(dt)` at the physics rate: apply queued commands, then recompose both stacks
//! - `frame_update(dt)` every rendered frame: interpolate between the last two fixed results

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::commands::{CommandQueue, ConstraintCommand};
use crate::config::CompositorConfig;
use crate::fallback::{FallbackConfig, FallbackProvider, ReferenceTarget};
use crate::frame::{ReferenceFrame, RigTransform};
use crate::provider::{ConstraintAxis, ConstraintQuery, SharedProvider};
use crate::stack::{EntrySnapshot, PositionStack, RotationStack};

/// Priority the fallback provider is installed at.
pub const FALLBACK_PRIORITY: i32 = 0;

#[derive(Debug)]
pub struct Compositor {
    config: CompositorConfig,
    position: PositionStack,
    rotation: RotationStack,
    frame: ReferenceFrame,
    commands: CommandQueue,
    fallback: Option<Rc<RefCell<FallbackProvider>>>,
    /// Set by the first gameplay add; the fallback can no longer be installed.
    constrained: bool,

    // Two-rate bookkeeping
    tick: u64,
    fixed_interval: f32,
    since_tick: f32,
    tick_progress: f32,
    local: RigTransform,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(CompositorConfig::default())
    }
}

impl Compositor {
    /// Create a compositor. When the config enables it, the fallback provider is
    /// installed on both stacks right away (without a reference target it
    /// contributes the identity pose).
    pub fn new(config: CompositorConfig) -> Self {
        let mut compositor = Self {
            position: PositionStack::new(config.blend_epsilon),
            rotation: RotationStack::new(config.blend_epsilon),
            frame: ReferenceFrame::IDENTITY,
            commands: CommandQueue::new(),
            fallback: None,
            constrained: false,
            tick: 0,
            fixed_interval: config.fixed_timestep,
            since_tick: 0.0,
            tick_progress: 0.0,
            local: RigTransform::IDENTITY,
            config,
        };
        if let Some(fb) = compositor.config.fallback.clone() {
            compositor.install_fallback(fb, None);
        }
        compositor
    }

    /// Designate the default reference the fallback damps toward.
    pub fn with_reference_target(mut self, target: ReferenceTarget) -> Self {
        self.set_reference_target(Some(target));
        self
    }

    /// Replace (or clear) the fallback's reference target. Installs the
    /// fallback if none exists yet and no constraint has been added; returns
    /// false when the target could not be attached.
    pub fn set_reference_target(&mut self, target: Option<ReferenceTarget>) -> bool {
        match &self.fallback {
            Some(fb) => {
                fb.borrow_mut().set_target(target);
                true
            }
            None if self.constrained => {
                debug!("constraints already registered; not installing a fallback provider");
                false
            }
            None => {
                let cfg = self.config.fallback.clone().unwrap_or_default();
                self.install_fallback(cfg, target);
                true
            }
        }
    }

    fn install_fallback(&mut self, config: FallbackConfig, target: Option<ReferenceTarget>) {
        let fb = Rc::new(RefCell::new(FallbackProvider::new(config, target)));
        let shared: SharedProvider = fb.clone();
        self.position.add(&shared, FALLBACK_PRIORITY, 0.0);
        self.rotation.add(&shared, FALLBACK_PRIORITY, 0.0);
        debug!("installed fallback provider at priority {FALLBACK_PRIORITY}");
        self.fallback = Some(fb);
    }

    pub fn fallback(&self) -> Option<&Rc<RefCell<FallbackProvider>>> {
        self.fallback.as_ref()
    }

    pub fn add_position_constraint(
        &mut self,
        provider: &SharedProvider,
        priority: i32,
        blend_duration: f32,
    ) {
        self.constrained = true;
        self.position.add(provider, priority, blend_duration);
    }

    pub fn remove_position_constraint(&mut self, provider: &SharedProvider, blend_duration: f32) {
        self.position.remove(provider, blend_duration);
    }

    pub fn add_rotation_constraint(
        &mut self,
        provider: &SharedProvider,
        priority: i32,
        blend_duration: f32,
    ) {
        self.constrained = true;
        self.rotation.add(provider, priority, blend_duration);
    }

    pub fn remove_rotation_constraint(&mut self, provider: &SharedProvider, blend_duration: f32) {
        self.rotation.remove(provider, blend_duration);
    }

    pub fn add_constraint(
        &mut self,
        axis: ConstraintAxis,
        provider: &SharedProvider,
        priority: i32,
        blend_duration: f32,
    ) {
        match axis {
            ConstraintAxis::Position => {
                self.add_position_constraint(provider, priority, blend_duration)
            }
            ConstraintAxis::Rotation => {
                self.add_rotation_constraint(provider, priority, blend_duration)
            }
        }
    }

    pub fn remove_constraint(
        &mut self,
        axis: ConstraintAxis,
        provider: &SharedProvider,
        blend_duration: f32,
    ) {
        match axis {
            ConstraintAxis::Position => self.remove_position_constraint(provider, blend_duration),
            ConstraintAxis::Rotation => self.remove_rotation_constraint(provider, blend_duration),
        }
    }

    /// Handle for deferred add/remove requests, applied at the next fixed tick.
    pub fn commands(&self) -> CommandQueue {
        self.commands.clone()
    }

    fn apply_commands(&mut self) {
        for command in self.commands.drain() {
            match command {
                ConstraintCommand::Add {
                    axis,
                    provider,
                    priority,
                    blend_duration,
                } => {
                    // Dropped before the tick it was queued for: nothing to add.
                    if let Some(provider) = provider.upgrade() {
                        self.add_constraint(axis, &provider, priority, blend_duration);
                    }
                }
                ConstraintCommand::Remove {
                    axis,
                    provider,
                    blend_duration,
                } => {
                    if let Some(provider) = provider.upgrade() {
                        self.remove_constraint(axis, &provider, blend_duration);
                    }
                }
            }
        }
    }

    /// World placement of the controlled node's parent.
    pub fn set_reference_frame(&mut self, frame: ReferenceFrame) {
        self.frame = frame;
    }

    pub fn reference_frame(&self) -> &ReferenceFrame {
        &self.frame
    }

    /// Physics-rate pass. Returns the newly composed local target pose.
    pub fn fixed_update(&mut self, delta_time: f32) -> RigTransform {
        self.apply_commands();

        self.tick = self.tick.wrapping_add(1);
        if delta_time.is_finite() && delta_time > 0.0 {
            self.fixed_interval = delta_time;
        }

        let frame = self.frame;
        let query = ConstraintQuery {
            frame: &frame,
            tick: self.tick,
            delta_time,
        };
        self.position.tick(delta_time, &query);
        self.rotation.tick(delta_time, &query);

        self.since_tick = 0.0;
        self.tick_progress = 0.0;
        self.target()
    }

    /// Frame-rate pass. Returns the visible local pose.
    pub fn frame_update(&mut self, delta_time: f32) -> RigTransform {
        if delta_time.is_finite() && delta_time > 0.0 {
            self.since_tick += delta_time;
        }
        self.tick_progress = if self.fixed_interval > 0.0 {
            (self.since_tick / self.fixed_interval).min(1.0)
        } else {
            1.0
        };
        self.local = RigTransform::lerp(&self.previous_target(), &self.target(), self.tick_progress);
        self.local
    }

    /// Visible local pose as of the last `frame_update`.
    pub fn local_transform(&self) -> RigTransform {
        self.local
    }

    /// Fraction of the current fixed interval already shown, in [0, 1].
    pub fn tick_progress(&self) -> f32 {
        self.tick_progress
    }

    /// Number of fixed ticks run so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Result of the latest fixed tick.
    pub fn target(&self) -> RigTransform {
        RigTransform::new(self.position.current(), self.rotation.current())
    }

    /// Result of the fixed tick before the latest one.
    pub fn previous_target(&self) -> RigTransform {
        RigTransform::new(self.position.previous(), self.rotation.previous())
    }

    pub fn position_stack(&self) -> &PositionStack {
        &self.position
    }

    pub fn rotation_stack(&self) -> &RotationStack {
        &self.rotation
    }

    pub fn position_entries(&self) -> Vec<EntrySnapshot> {
        self.position.snapshot()
    }

    pub fn rotation_entries(&self) -> Vec<EntrySnapshot> {
        self.rotation.snapshot()
    }

    pub fn position_cutoff(&self) -> usize {
        self.position.cutoff_index()
    }

    pub fn rotation_cutoff(&self) -> usize {
        self.rotation.cutoff_index()
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{as_shared, share, ConstraintProvider, FixedProvider};
    use crate::math::{Quat, Vec3};

    fn bare() -> Compositor {
        Compositor::new(CompositorConfig::default().with_fallback(None))
    }

    #[test]
    fn fallback_installed_once_on_both_stacks() {
        let c = Compositor::default();
        assert_eq!(c.position_entries().len(), 1);
        assert_eq!(c.rotation_entries().len(), 1);
        assert_eq!(c.position_entries()[0].priority, FALLBACK_PRIORITY);
        assert_eq!(c.position_entries()[0].blend, 1.0);
        assert!(bare().position_entries().is_empty());
    }

    #[test]
    fn queued_add_applies_on_next_fixed_tick() {
        let mut c = bare();
        let p = share(FixedProvider::position([0.0, 2.0, 0.0]));
        c.commands().add(ConstraintAxis::Position, &p, 1, 0.0);
        assert!(c.position_entries().is_empty());
        let out = c.fixed_update(1.0 / 60.0);
        assert_eq!(out.translation, [0.0, 2.0, 0.0]);
    }

    #[test]
    fn queued_add_for_dropped_provider_is_ignored() {
        let mut c = bare();
        let p = share(FixedProvider::position([0.0, 2.0, 0.0]));
        c.commands().add(ConstraintAxis::Position, &p, 1, 0.0);
        drop(p);
        c.fixed_update(1.0 / 60.0);
        assert!(c.position_entries().is_empty());
    }

    /// Provider that, when queried, asks for another provider on the rotation stack.
    struct Spawner {
        queue: CommandQueue,
        child: SharedProvider,
        fired: bool,
    }

    impl ConstraintProvider for Spawner {
        fn strength(&self) -> f32 {
            1.0
        }
        fn set_active(&mut self, _axis: ConstraintAxis, _active: bool) {}
        fn constraint_position(&mut self, _q: &ConstraintQuery<'_>) -> Vec3 {
            if !self.fired {
                self.queue.add(ConstraintAxis::Rotation, &self.child, 3, 0.0);
                self.fired = true;
            }
            [1.0, 0.0, 0.0]
        }
    }

    #[test]
    fn provider_can_request_constraints_mid_tick() {
        use crate::math::quat_from_axis_angle;
        let mut c = bare();
        let turn: Quat = quat_from_axis_angle([0.0, 1.0, 0.0], 0.5);
        let child = share(FixedProvider::rotation(turn));
        let spawner = share(Spawner {
            queue: c.commands(),
            child: child.clone(),
            fired: false,
        });
        c.add_position_constraint(&spawner, 1, 0.0);

        let first = c.fixed_update(0.1);
        assert_eq!(first.translation, [1.0, 0.0, 0.0]);
        assert!(c.rotation_entries().is_empty());

        let second = c.fixed_update(0.1);
        assert_eq!(c.rotation_entries().len(), 1);
        assert!(crate::math::quat_angle_between(second.rotation, turn) < 1e-3);
    }

    #[test]
    fn frame_update_interpolates_between_ticks() {
        let mut c = bare();
        let p = Rc::new(RefCell::new(FixedProvider::position([0.0, 0.0, 0.0])));
        c.add_position_constraint(&as_shared(&p), 1, 0.0);
        c.fixed_update(0.1);
        p.borrow_mut().pose.translation = [10.0, 0.0, 0.0];
        c.fixed_update(0.1);

        let half = c.frame_update(0.05);
        assert!((c.tick_progress() - 0.5).abs() < 1e-6);
        assert!((half.translation[0] - 5.0).abs() < 1e-4);

        let done = c.frame_update(0.2);
        assert_eq!(c.tick_progress(), 1.0);
        assert_eq!(done.translation, [10.0, 0.0, 0.0]);
        assert_eq!(c.local_transform(), done);
    }

    #[test]
    fn reference_target_without_config_installs_fallback() {
        let mut c = bare();
        let target = ReferenceTarget::new(RigTransform::from_translation([0.0, 1.5, 0.0]));
        assert!(c.set_reference_target(Some(target)));
        assert!(c.fallback().is_some());
        let out = c.fixed_update(1.0 / 60.0);
        assert_eq!(out.translation, [0.0, 1.5, 0.0]);
    }

    #[test]
    fn late_reference_target_never_slides_a_fallback_under_constraints() {
        let mut c = bare();
        let p = share(FixedProvider::position([1.0, 0.0, 0.0]).with_strength(0.5));
        c.add_position_constraint(&p, 1, 0.0);
        assert_eq!(c.fixed_update(0.1).translation, [0.5, 0.0, 0.0]);

        let target = ReferenceTarget::new(RigTransform::from_translation([0.0, 4.0, 0.0]));
        assert!(!c.set_reference_target(Some(target)));
        assert!(c.fallback().is_none());
        assert_eq!(c.position_entries().len(), 1);
        assert_eq!(c.fixed_update(0.1).translation, [0.5, 0.0, 0.0]);
    }

    #[test]
    fn existing_fallback_is_retargeted_after_constraints() {
        let mut c = Compositor::default();
        let p = share(FixedProvider::position([1.0, 0.0, 0.0]).with_strength(0.0));
        c.add_position_constraint(&p, 1, 0.0);
        let target = ReferenceTarget::new(RigTransform::from_translation([0.0, 4.0, 0.0]));
        assert!(c.set_reference_target(Some(target)));
        assert_eq!(c.position_entries().len(), 2);
        assert_eq!(c.fixed_update(0.1).translation, [0.0, 4.0, 0.0]);
    }

    #[test]
    fn reference_frame_is_passed_to_providers() {
        use crate::provider::WorldTargetProvider;
        let mut c = bare();
        c.set_reference_frame(ReferenceFrame::new([0.0, 0.0, 5.0], crate::math::QUAT_IDENTITY));
        let p = share(WorldTargetProvider::new(RigTransform::from_translation([
            1.0, 0.0, 5.0,
        ])));
        c.add_position_constraint(&p, 2, 0.0);
        assert_eq!(c.fixed_update(0.1).translation, [1.0, 0.0, 0.0]);
    }
}
