//! Capability registry and the typed capability trait.

mod capability;
mod registry;
pub mod transit;

pub use capability::{Capability, CapabilityError, ErasedCapability};
pub use registry::{CapabilityRegistry, transit_registry};
