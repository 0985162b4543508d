use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use bevy::prelude::*;
use bevy_vizij_rig::{
    RigCompositors, RigConfigOverride, RigNode, RigReferenceTarget, VizijRigPlugin,
};
use vizij_rig_core::{as_shared, CompositorConfig, RigTransform, WorldTargetProvider};

fn app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(VizijRigPlugin::default());
    app
}

/// Run one frame pass long enough to show the latest fixed result in full.
fn render_frame(app: &mut App) {
    app.world_mut()
        .resource_mut::<Time>()
        .advance_by(Duration::from_millis(500));
    app.world_mut().run_schedule(Update);
}

/// it should express a world-space constraint in the parent's frame and write it to Transform
#[test]
fn constraint_writes_local_transform_under_parent() {
    let mut app = app();
    let parent = app
        .world_mut()
        .spawn((
            Transform::from_xyz(0.0, 0.0, 5.0),
            GlobalTransform::from_translation(Vec3::new(0.0, 0.0, 5.0)),
        ))
        .id();
    let node = app
        .world_mut()
        .spawn((
            RigNode,
            Transform::from_scale(Vec3::splat(2.0)),
            GlobalTransform::default(),
        ))
        .id();
    app.world_mut().entity_mut(parent).add_child(node);
    app.world_mut().run_schedule(FixedUpdate);

    let target = Rc::new(RefCell::new(WorldTargetProvider::new(
        RigTransform::from_translation([1.0, 0.0, 5.0]),
    )));
    app.world_mut()
        .non_send_resource_mut::<RigCompositors>()
        .get_mut(node)
        .expect("rig registered")
        .add_position_constraint(&as_shared(&target), 10, 0.0);

    app.world_mut().run_schedule(FixedUpdate);
    render_frame(&mut app);

    let tf = app.world().get::<Transform>(node).expect("Transform exists");
    let expected = Vec3::new(1.0, 0.0, 0.0);
    assert!(
        (tf.translation - expected).length() <= 1e-5,
        "expected translation {:?}, got {:?}",
        expected,
        tf.translation
    );
    assert_eq!(tf.scale, Vec3::splat(2.0));
}

/// it should snap the fallback onto the reference target on the first tick
#[test]
fn fallback_follows_reference_entity() {
    let mut app = app();
    let reference = app
        .world_mut()
        .spawn(GlobalTransform::from_translation(Vec3::new(0.0, 2.0, 0.0)))
        .id();
    let node = app
        .world_mut()
        .spawn((
            RigNode,
            RigReferenceTarget(reference),
            Transform::default(),
            GlobalTransform::default(),
        ))
        .id();

    app.world_mut().run_schedule(FixedUpdate);
    render_frame(&mut app);

    let tf = app.world().get::<Transform>(node).unwrap();
    assert!((tf.translation - Vec3::new(0.0, 2.0, 0.0)).length() <= 1e-5);
}

/// it should build the compositor from a RigConfigOverride loaded from fixtures
#[test]
fn config_override_from_fixture() {
    let json = vizij_test_fixtures::rigs::json("no-fallback").expect("load rig fixture");
    let config = CompositorConfig::from_json_str(&json).expect("valid rig config");

    let mut app = app();
    let pose = Transform::from_xyz(3.0, 4.0, 5.0).with_rotation(Quat::from_rotation_y(0.7));
    let node = app
        .world_mut()
        .spawn((RigNode, RigConfigOverride(config), pose))
        .id();
    app.world_mut().run_schedule(FixedUpdate);
    render_frame(&mut app);

    {
        let rigs = app.world().non_send_resource::<RigCompositors>();
        let compositor = rigs.get(node).unwrap();
        assert!(compositor.config().fallback.is_none());
        assert!(compositor.position_entries().is_empty());
    }
    // empty stacks leave the pose to whoever else drives it
    assert_eq!(*app.world().get::<Transform>(node).unwrap(), pose);
}

/// it should keep a late reference target from slipping a fallback under gameplay constraints
#[test]
fn late_reference_target_keeps_constraints_alone() {
    let json = vizij_test_fixtures::rigs::json("no-fallback").expect("load rig fixture");
    let config = CompositorConfig::from_json_str(&json).expect("valid rig config");

    let mut app = app();
    let node = app
        .world_mut()
        .spawn((RigNode, RigConfigOverride(config), Transform::default()))
        .id();
    app.world_mut().run_schedule(FixedUpdate);

    let aim = Rc::new(RefCell::new(WorldTargetProvider::new(
        RigTransform::from_translation([1.0, 0.0, 0.0]),
    )));
    app.world_mut()
        .non_send_resource_mut::<RigCompositors>()
        .get_mut(node)
        .expect("rig registered")
        .add_position_constraint(&as_shared(&aim), 5, 0.0);

    let reference = app
        .world_mut()
        .spawn(GlobalTransform::from_translation(Vec3::new(0.0, 9.0, 0.0)))
        .id();
    app.world_mut()
        .entity_mut(node)
        .insert(RigReferenceTarget(reference));
    app.world_mut().run_schedule(FixedUpdate);
    render_frame(&mut app);

    {
        let rigs = app.world().non_send_resource::<RigCompositors>();
        let compositor = rigs.get(node).unwrap();
        assert!(compositor.fallback().is_none());
        assert_eq!(compositor.position_entries().len(), 1);
    }
    let tf = app.world().get::<Transform>(node).unwrap();
    assert!((tf.translation - Vec3::new(1.0, 0.0, 0.0)).length() <= 1e-5);
}

/// it should fall back to the plugin defaults when an override fails validation
#[test]
fn invalid_override_uses_defaults() {
    let mut app = app();
    let node = app
        .world_mut()
        .spawn((
            RigNode,
            RigConfigOverride(CompositorConfig::default().with_fixed_timestep(-1.0)),
            Transform::default(),
        ))
        .id();
    app.world_mut().run_schedule(Update);

    let rigs = app.world().non_send_resource::<RigCompositors>();
    assert_eq!(
        rigs.get(node).unwrap().config(),
        &CompositorConfig::default()
    );
}
