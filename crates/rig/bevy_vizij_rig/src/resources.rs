use bevy::prelude::*;
use hashbrown::HashMap;
use vizij_rig_core::{Compositor, CompositorConfig, ReferenceTarget, RigTransform};

/// Configuration for rigs registered without a [`crate::RigConfigOverride`].
#[derive(Resource, Debug, Clone, Default)]
pub struct RigDefaults(pub CompositorConfig);

/// Compositor plus the reference cell mirrored from its `RigReferenceTarget`.
#[derive(Debug)]
pub(crate) struct RigState {
    pub(crate) compositor: Compositor,
    reference: Option<ReferenceTarget>,
}

impl RigState {
    pub(crate) fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            reference: None,
        }
    }

    /// Mirror the reference entity's world pose into the fallback target,
    /// designating or clearing the target when the pose appears or goes away.
    pub(crate) fn sync_reference(&mut self, pose: Option<RigTransform>) {
        match (&self.reference, pose) {
            (Some(target), Some(pose)) => target.set(pose),
            (None, Some(pose)) => {
                let target = ReferenceTarget::new(pose);
                // Kept even when refused, so a rig that already has constraints
                // is not asked again every tick.
                self.compositor.set_reference_target(Some(target.clone()));
                self.reference = Some(target);
            }
            (Some(_), None) => {
                self.compositor.set_reference_target(None);
                self.reference = None;
            }
            (None, None) => {}
        }
    }
}

/// One compositor per `RigNode` entity.
///
/// Inserted as a non-send resource: providers are `Rc`-shared, so every
/// system touching the map runs on the main thread.
#[derive(Debug, Default)]
pub struct RigCompositors {
    rigs: HashMap<Entity, RigState>,
}

impl RigCompositors {
    pub fn get(&self, entity: Entity) -> Option<&Compositor> {
        self.rigs.get(&entity).map(|rig| &rig.compositor)
    }

    /// Gameplay systems add and remove constraints through this.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut Compositor> {
        self.rigs.get_mut(&entity).map(|rig| &mut rig.compositor)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.rigs.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.rigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rigs.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.rigs.keys().copied()
    }

    pub(crate) fn insert_if_absent(&mut self, entity: Entity, make: impl FnOnce() -> Compositor) -> bool {
        if self.rigs.contains_key(&entity) {
            return false;
        }
        self.rigs.insert(entity, RigState::new(make()));
        true
    }

    pub(crate) fn remove(&mut self, entity: Entity) -> bool {
        self.rigs.remove(&entity).is_some()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut RigState)> + '_ {
        self.rigs.iter_mut().map(|(e, rig)| (*e, rig))
    }
}
