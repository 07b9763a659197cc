//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (registration order)
//! - No rendering or platform dependencies

pub mod actions;
pub mod automation;
pub mod collision;
pub mod entities;
pub mod physics;
pub mod state;
pub mod tick;
pub mod timeline;
pub mod timer;

pub use actions::{Action, ActionKind};
pub use automation::{
    AutomatedAction, AutomationError, EntryId, MAX_CHAIN_ITERATIONS, add_parallel_action,
    enqueue_action, insert_action, longest_pending_parallel, update_automations,
};
pub use collision::{CollisionResult, circle_line_collision, circle_segment_contact};
pub use entities::{
    AnimatedParticle, ArmSegment, BallId, Edge, FlashingArrow, FlowerRoof, FlowerSensor, Handle,
    PachinkoBall, Pin, Spinner,
};
pub use physics::{
    Arm, ArmId, Body, BodyHandle, DebugFrame, Physics, PhysicsParams, Point, PointId, Slope,
    SlopeId,
};
pub use state::{GameOutcome, PRIMARY_ROOF, State};
pub use tick::{TickInput, present, release_shot, update};
pub use timeline::Timeline;
pub use timer::Timer;
