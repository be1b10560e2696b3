//! Netradar Core - Core types, device registry, and classification
//!
//! This crate provides the foundational pieces of the netradar system:
//! - Device types for tracking discovered network endpoints
//! - The in-memory device registry keyed by hardware address
//! - The heuristic device-type classifier

pub mod classify;
pub mod device;
pub mod registry;

pub use classify::classify;
pub use device::{Device, DeviceId, DeviceStatus, DeviceType, Port};
pub use registry::DeviceRegistry;
