//! Application layer: the memory façade, its store contracts and DTOs.

pub mod dtos;
pub mod services;

pub use dtos::{ContextBundle, ConversationDefaults, ConversationInput, HealthStatusResponse};
pub use services::MemoryManager;
