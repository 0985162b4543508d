//! Bevy adapter for `vizij-rig-core`.
//!
//! Every entity tagged [`RigNode`] gets a [`vizij_rig_core::Compositor`]
//! stored in the non-send [`RigCompositors`] resource. `FixedUpdate`
//! recomposes the stacks; `Update` interpolates and writes `Transform`.

use bevy::prelude::*;
use vizij_rig_core::CompositorConfig;

pub mod components;
pub mod resources;
pub mod systems;

pub use components::{RigConfigOverride, RigNode, RigReferenceTarget};
pub use resources::{RigCompositors, RigDefaults};
pub use systems::{
    fixed_tick_rigs_system, interpolate_rigs_system, register_rigs_system,
    sync_rig_frames_system, unregister_rigs_system,
};

#[derive(Default)]
pub struct VizijRigPlugin {
    /// Used for rigs without a `RigConfigOverride`.
    pub defaults: CompositorConfig,
}

impl Plugin for VizijRigPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(RigDefaults(self.defaults.clone()))
            .insert_non_send_resource(RigCompositors::default())
            .add_systems(
                FixedUpdate,
                (
                    register_rigs_system,
                    unregister_rigs_system,
                    sync_rig_frames_system,
                    fixed_tick_rigs_system,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    register_rigs_system,
                    unregister_rigs_system,
                    interpolate_rigs_system,
                )
                    .chain(),
            );
    }
}
