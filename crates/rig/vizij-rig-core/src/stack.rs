//! Priority-sorted blend stack shared by the position and rotation axis groups.
//!
//! Per fixed tick (see [`BlendStack::tick`]):
//! 1. snapshot the previous composed value
//! 2. advance blend weights and prune (dead owners, finished fade-outs), highest priority first
//! 3. find the cutoff: the highest entry whose `blend * strength` is fully opaque
//! 4. mark entries at/above the cutoff active, the rest inactive
//! 5. compose from identity at the cutoff upward, weighting each target by `strength * ease(blend)`

use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::cell::RefCell;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::ids::{EntryId, IdAllocator};
use crate::math::{
    lerp_vec3, normalize_quat, sanitize_unit, slerp_quat, smoothstep, Quat, Vec3, QUAT_IDENTITY,
    VEC3_ZERO,
};
use crate::provider::{ConstraintAxis, ConstraintProvider, ConstraintQuery, SharedProvider};

/// Blend durations below this are treated as instant.
pub const DEFAULT_BLEND_EPSILON: f32 = 0.001;

type WeakProvider = Weak<RefCell<dyn ConstraintProvider>>;

/// Axis group a stack composes: its value type, neutral value and blend operator.
pub trait StackAxis {
    type Value: Copy + fmt::Debug + PartialEq;
    const AXIS: ConstraintAxis;

    fn identity() -> Self::Value;
    fn blend(from: Self::Value, to: Self::Value, weight: f32) -> Self::Value;
    fn query(provider: &mut dyn ConstraintProvider, query: &ConstraintQuery<'_>) -> Self::Value;
    fn is_finite(value: &Self::Value) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PositionAxis;

impl StackAxis for PositionAxis {
    type Value = Vec3;
    const AXIS: ConstraintAxis = ConstraintAxis::Position;

    fn identity() -> Vec3 {
        VEC3_ZERO
    }

    fn blend(from: Vec3, to: Vec3, weight: f32) -> Vec3 {
        lerp_vec3(from, to, weight)
    }

    fn query(provider: &mut dyn ConstraintProvider, query: &ConstraintQuery<'_>) -> Vec3 {
        provider.constraint_position(query)
    }

    fn is_finite(value: &Vec3) -> bool {
        value.iter().all(|c| c.is_finite())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RotationAxis;

impl StackAxis for RotationAxis {
    type Value = Quat;
    const AXIS: ConstraintAxis = ConstraintAxis::Rotation;

    fn identity() -> Quat {
        QUAT_IDENTITY
    }

    fn blend(from: Quat, to: Quat, weight: f32) -> Quat {
        slerp_quat(from, to, weight)
    }

    fn query(provider: &mut dyn ConstraintProvider, query: &ConstraintQuery<'_>) -> Quat {
        normalize_quat(provider.constraint_rotation(query))
    }

    fn is_finite(value: &Quat) -> bool {
        value.iter().all(|c| c.is_finite())
    }
}

/// Compositor-owned bookkeeping for one provider registration.
pub struct ConstraintEntry {
    pub id: EntryId,
    provider: WeakProvider,
    /// Current blend weight in [0, 1].
    pub blend: f32,
    /// Positive while fading in, negative while fading out, 0 when settled.
    pub blend_rate: f32,
    pub priority: i32,
    /// Whether the entry sat at or above the cutoff on the last tick.
    pub active: bool,
}

impl ConstraintEntry {
    fn matches(&self, provider: &SharedProvider) -> bool {
        Weak::ptr_eq(&self.provider, &Rc::downgrade(provider))
    }

    /// Upgraded provider if both the provider and its owner still exist.
    fn live_provider(&self) -> Option<SharedProvider> {
        let provider = self.provider.upgrade()?;
        // A provider borrowed elsewhere right now cannot be inspected; it is
        // evidently still in use, so keep it.
        let alive = match provider.try_borrow() {
            Ok(p) => p.owner().is_alive(),
            Err(_) => true,
        };
        alive.then_some(provider)
    }

    fn strength(&self) -> f32 {
        self.provider
            .upgrade()
            .and_then(|p| p.try_borrow().ok().map(|p| sanitize_unit(p.strength())))
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            priority: self.priority,
            blend: self.blend,
            blend_rate: self.blend_rate,
            strength: self.strength(),
            active: self.active,
        }
    }
}

impl fmt::Debug for ConstraintEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintEntry")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("blend", &self.blend)
            .field("blend_rate", &self.blend_rate)
            .field("active", &self.active)
            .finish()
    }
}

/// Read-only view of an entry, ordered like the stack (lowest priority first).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub id: EntryId,
    pub priority: i32,
    pub blend: f32,
    pub blend_rate: f32,
    pub strength: f32,
    pub active: bool,
}

/// Fade rate for a requested duration, or `None` for an instant change.
/// Negative, NaN, infinite and sub-epsilon durations are all instant.
pub(crate) fn fade_rate(blend_duration: f32, epsilon: f32) -> Option<f32> {
    if !blend_duration.is_finite() || blend_duration < 0.0 {
        warn!("degenerate blend duration {blend_duration}; applying instantly");
        return None;
    }
    if blend_duration < epsilon {
        None
    } else {
        Some(blend_duration.recip())
    }
}

pub struct BlendStack<A: StackAxis> {
    /// Sorted ascending by priority; ties keep insertion order.
    entries: Vec<ConstraintEntry>,
    ids: IdAllocator,
    epsilon: f32,
    cutoff: usize,
    previous: A::Value,
    current: A::Value,
    _axis: PhantomData<A>,
}

pub type PositionStack = BlendStack<PositionAxis>;
pub type RotationStack = BlendStack<RotationAxis>;

impl<A: StackAxis> Default for BlendStack<A> {
    fn default() -> Self {
        Self::new(DEFAULT_BLEND_EPSILON)
    }
}

impl<A: StackAxis> fmt::Debug for BlendStack<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlendStack")
            .field("axis", &A::AXIS)
            .field("entries", &self.entries)
            .field("cutoff", &self.cutoff)
            .field("previous", &self.previous)
            .field("current", &self.current)
            .finish()
    }
}

impl<A: StackAxis> BlendStack<A> {
    pub fn new(epsilon: f32) -> Self {
        Self {
            entries: Vec::new(),
            ids: IdAllocator::new(),
            epsilon: sanitize_epsilon(epsilon),
            cutoff: 0,
            previous: A::identity(),
            current: A::identity(),
            _axis: PhantomData,
        }
    }

    /// Register `provider` at `priority`, fading in over `blend_duration` seconds.
    pub fn add(&mut self, provider: &SharedProvider, priority: i32, blend_duration: f32) -> EntryId {
        let (blend, blend_rate) = match fade_rate(blend_duration, self.epsilon) {
            None => (1.0, 0.0),
            Some(rate) => (0.0, rate),
        };
        let id = self.ids.alloc_entry();
        let at = self.entries.partition_point(|e| e.priority <= priority);
        self.entries.insert(
            at,
            ConstraintEntry {
                id,
                provider: Rc::downgrade(provider),
                blend,
                blend_rate,
                priority,
                active: false,
            },
        );
        debug!(
            "{:?} stack: added entry {:?} at priority {priority} (blend {blend}, rate {blend_rate})",
            A::AXIS,
            id
        );
        id
    }

    /// Fade out (or drop, for an instant duration) one registration of `provider`.
    /// Returns false when the provider is not registered.
    pub fn remove(&mut self, provider: &SharedProvider, blend_duration: f32) -> bool {
        let Some(idx) = self.find_for_removal(provider) else {
            return false;
        };
        match fade_rate(blend_duration, self.epsilon) {
            None => {
                let entry = self.entries.remove(idx);
                deactivate::<A>(&entry);
                debug!("{:?} stack: removed entry {:?}", A::AXIS, entry.id);
            }
            Some(rate) => {
                let entry = &mut self.entries[idx];
                entry.blend_rate = -rate;
                debug!(
                    "{:?} stack: fading out entry {:?} over {blend_duration}s",
                    A::AXIS,
                    entry.id
                );
            }
        }
        true
    }

    /// Highest-priority match, whatever its fade state.
    fn find_for_removal(&self, provider: &SharedProvider) -> Option<usize> {
        self.entries.iter().rposition(|e| e.matches(provider))
    }

    /// Run one fixed tick and return the newly composed value.
    pub fn tick(&mut self, delta_time: f32, query: &ConstraintQuery<'_>) -> A::Value {
        self.previous = self.current;
        self.advance_and_prune(delta_time);
        self.cutoff = self.find_cutoff();
        self.apply_activity();
        self.current = self.compose(query);
        self.current
    }

    fn advance_and_prune(&mut self, delta_time: f32) {
        let dt = if delta_time.is_finite() && delta_time > 0.0 {
            delta_time
        } else {
            0.0
        };
        let mut idx = self.entries.len();
        while idx > 0 {
            idx -= 1;
            if self.entries[idx].live_provider().is_none() {
                self.entries.remove(idx);
                continue;
            }
            let entry = &mut self.entries[idx];
            if entry.blend_rate == 0.0 {
                continue;
            }
            entry.blend += dt * entry.blend_rate;
            if entry.blend_rate < 0.0 {
                if entry.blend <= 0.0 {
                    let entry = self.entries.remove(idx);
                    deactivate::<A>(&entry);
                }
            } else if entry.blend >= 1.0 {
                entry.blend = 1.0;
                entry.blend_rate = 0.0;
            }
        }
    }

    fn find_cutoff(&self) -> usize {
        self.entries
            .iter()
            .rposition(|e| sanitize_unit(e.blend) * e.strength() >= 1.0)
            .unwrap_or(0)
    }

    fn apply_activity(&mut self) {
        // Low to high, so a provider registered twice ends up with the flag of its higher entry.
        for (idx, entry) in self.entries.iter_mut().enumerate() {
            let active = idx >= self.cutoff;
            entry.active = active;
            if let Some(provider) = entry.provider.upgrade() {
                if let Ok(mut p) = provider.try_borrow_mut() {
                    p.set_active(A::AXIS, active);
                }
            }
        }
    }

    fn compose(&self, query: &ConstraintQuery<'_>) -> A::Value {
        let mut running = A::identity();
        for entry in self.entries.iter().skip(self.cutoff) {
            let Some(provider) = entry.provider.upgrade() else {
                continue;
            };
            let Ok(mut p) = provider.try_borrow_mut() else {
                warn!(
                    "{:?} stack: provider for entry {:?} is busy (re-entrant query); skipping",
                    A::AXIS,
                    entry.id
                );
                continue;
            };
            let weight = sanitize_unit(p.strength()) * smoothstep(entry.blend);
            if weight <= 0.0 {
                continue;
            }
            let target = A::query(&mut *p, query);
            if !A::is_finite(&target) {
                warn!(
                    "{:?} stack: provider for entry {:?} returned a non-finite target; skipping",
                    A::AXIS,
                    entry.id
                );
                continue;
            }
            running = if weight >= 1.0 {
                target
            } else {
                A::blend(running, target, weight)
            };
        }
        running
    }

    /// Composed value from the tick before the latest one.
    pub fn previous(&self) -> A::Value {
        self.previous
    }

    /// Composed value from the latest tick.
    pub fn current(&self) -> A::Value {
        self.current
    }

    /// Lowest index that took part in the latest composition.
    pub fn cutoff_index(&self) -> usize {
        self.cutoff
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, provider: &SharedProvider) -> bool {
        self.entries.iter().any(|e| e.matches(provider))
    }

    pub fn entries(&self) -> &[ConstraintEntry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.entries.iter().map(ConstraintEntry::snapshot).collect()
    }

    /// Drop every entry immediately. Composed values are kept until the next tick.
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            deactivate::<A>(&entry);
        }
        self.cutoff = 0;
    }
}

fn sanitize_epsilon(epsilon: f32) -> f32 {
    if epsilon.is_finite() && epsilon >= 0.0 {
        epsilon
    } else {
        DEFAULT_BLEND_EPSILON
    }
}

fn deactivate<A: StackAxis>(entry: &ConstraintEntry) {
    if let Some(provider) = entry.provider.upgrade() {
        if let Ok(mut p) = provider.try_borrow_mut() {
            p.set_active(A::AXIS, false);
        }
    }
}
