//! Actor implementation

pub mod engine;

pub use engine::{EngineActor, EngineActorArgs, EngineHostFactory};
