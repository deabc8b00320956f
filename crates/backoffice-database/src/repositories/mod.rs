//! Concrete repository implementations.

pub mod extension;
