use bevy::prelude::*;
use vizij_rig_core::CompositorConfig;

/// Marks an entity whose local `Transform` (translation and rotation) is owned
/// by a rig compositor. The parent's `GlobalTransform` is the reference frame.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct RigNode;

/// Per-rig configuration used instead of [`crate::RigDefaults`] at registration.
#[derive(Component, Debug, Clone)]
pub struct RigConfigOverride(pub CompositorConfig);

/// Entity whose world pose the rig's fallback provider damps toward.
#[derive(Component, Debug, Clone, Copy)]
pub struct RigReferenceTarget(pub Entity);
