//! Vizij Rig Core (engine-agnostic)
//!
//! Priority-ordered, time-blended constraint compositor for a single
//! controlled node (typically a first-person camera rig). Gameplay systems
//! register providers on a position and a rotation [`BlendStack`]; a fixed
//! tick advances blend weights and recomposes both stacks, and a per-frame
//! pass interpolates the node between the last two fixed results.

pub mod commands;
pub mod compositor;
pub mod config;
pub mod error;
pub mod fallback;
pub mod frame;
pub mod ids;
pub mod math;
pub mod owner;
pub mod provider;
pub mod stack;

// Re-exports for consumers (adapters)
pub use commands::{CommandQueue, ConstraintCommand};
pub use compositor::{Compositor, FALLBACK_PRIORITY};
pub use config::CompositorConfig;
pub use error::{Result, RigError};
pub use fallback::{FallbackConfig, FallbackProvider, ReferenceTarget};
pub use frame::{ReferenceFrame, RigTransform};
pub use ids::EntryId;
pub use math::{Quat, Vec3, QUAT_IDENTITY, VEC3_ZERO};
pub use owner::{OwnerHandle, OwnerToken};
pub use provider::{
    as_shared, share, ActivityFlags, ConstraintAxis, ConstraintProvider, ConstraintQuery,
    FixedProvider, SharedProvider, WorldTargetProvider,
};
pub use stack::{
    BlendStack, ConstraintEntry, EntrySnapshot, PositionAxis, PositionStack, RotationAxis,
    RotationStack, StackAxis, DEFAULT_BLEND_EPSILON,
};
