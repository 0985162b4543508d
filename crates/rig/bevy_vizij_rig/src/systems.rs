use bevy::log::{debug, warn};
use bevy::prelude::*;
use bevy::time::Fixed;
use vizij_rig_core::{Compositor, ReferenceFrame, RigTransform};

use crate::components::{RigConfigOverride, RigNode, RigReferenceTarget};
use crate::resources::{RigCompositors, RigDefaults};

fn reference_frame_from(global: &GlobalTransform) -> ReferenceFrame {
    let (_scale, rotation, translation) = global.to_scale_rotation_translation();
    ReferenceFrame::new(translation.to_array(), rotation.to_array())
}

fn rig_transform_from(global: &GlobalTransform) -> RigTransform {
    let (_scale, rotation, translation) = global.to_scale_rotation_translation();
    RigTransform::new(translation.to_array(), rotation.to_array())
}

/// Create a compositor for every newly added `RigNode`.
pub fn register_rigs_system(
    added: Query<(Entity, Option<&RigConfigOverride>), Added<RigNode>>,
    defaults: Res<RigDefaults>,
    mut rigs: NonSendMut<RigCompositors>,
) {
    for (entity, config_override) in added.iter() {
        let config = match config_override {
            Some(RigConfigOverride(config)) => match config.validate() {
                Ok(()) => config.clone(),
                Err(err) => {
                    warn!("rig {entity:?}: ignoring invalid config override: {err}");
                    defaults.0.clone()
                }
            },
            None => defaults.0.clone(),
        };
        if rigs.insert_if_absent(entity, || Compositor::new(config)) {
            debug!("registered rig compositor for {entity:?}");
        }
    }
}

/// Drop the compositor of every entity that lost its `RigNode` (or was despawned).
pub fn unregister_rigs_system(
    mut removed: RemovedComponents<RigNode>,
    mut rigs: NonSendMut<RigCompositors>,
) {
    for entity in removed.read() {
        if rigs.remove(entity) {
            debug!("unregistered rig compositor for {entity:?}");
        }
    }
}

/// Feed each compositor its parent's world placement and its reference target's pose.
pub fn sync_rig_frames_system(
    nodes: Query<(Option<&Parent>, Option<&RigReferenceTarget>), With<RigNode>>,
    globals: Query<&GlobalTransform>,
    mut rigs: NonSendMut<RigCompositors>,
) {
    for (entity, rig) in rigs.iter_mut() {
        let Ok((parent, reference)) = nodes.get(entity) else {
            continue;
        };
        let frame = parent
            .and_then(|p| globals.get(p.get()).ok())
            .map(reference_frame_from)
            .unwrap_or(ReferenceFrame::IDENTITY);
        rig.compositor.set_reference_frame(frame);

        let pose = reference
            .and_then(|r| globals.get(r.0).ok())
            .map(rig_transform_from);
        rig.sync_reference(pose);
    }
}

/// Fixed timestep pass: apply queued constraint changes and recompose every rig.
pub fn fixed_tick_rigs_system(time: Res<Time<Fixed>>, mut rigs: NonSendMut<RigCompositors>) {
    let dt = time.timestep().as_secs_f32();
    for (_entity, rig) in rigs.iter_mut() {
        rig.compositor.fixed_update(dt);
    }
}

/// Frame pass: interpolate between the last two fixed results and write the local
/// `Transform`. An axis is only written while its stack holds entries and after
/// the first fixed tick; scale is left to the rest of the app.
pub fn interpolate_rigs_system(
    time: Res<Time>,
    mut rigs: NonSendMut<RigCompositors>,
    mut transforms: Query<&mut Transform, With<RigNode>>,
) {
    let dt = time.delta_seconds();
    for (entity, rig) in rigs.iter_mut() {
        let Ok(mut tf) = transforms.get_mut(entity) else {
            continue;
        };
        let compositor = &mut rig.compositor;
        let pose = compositor.frame_update(dt);
        if compositor.tick() == 0 {
            continue;
        }
        if !compositor.position_stack().is_empty() {
            tf.translation = Vec3::from_array(pose.translation);
        }
        if !compositor.rotation_stack().is_empty() {
            tf.rotation = Quat::from_array(pose.rotation).normalize();
        }
    }
}
