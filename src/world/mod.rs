//! World capability surface and the in-memory sandbox

pub mod gateway;
pub mod sandbox;

pub use gateway::{
    Block, DigStatus, EntityKind, EntitySnapshot, ItemStack, TravelStatus, WorldGateway,
};
pub use sandbox::{SandboxWorld, WorldAction, WorldEvent};
