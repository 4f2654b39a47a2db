//! Home Assistant Built-in Components
//!
//! This crate contains implementations of Home Assistant's built-in components
//! (integrations) that don't require Python.

pub mod simplisafe;
