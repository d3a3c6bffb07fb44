// Adapters layer: concrete repository implementations.

pub mod memory;
