//! Steward - an autonomous voxel-world agent driven by natural language

pub mod capability;
pub mod command;
pub mod controller;
pub mod core;
pub mod dispatch;
pub mod llm;
pub mod world;
