// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Failure-windowed gate for external dependencies.
//!
//! A breaker opens for a fixed window after any recorded failure and closes
//! lazily the first time it is checked after the window lapses.

mod breaker;
mod error;
mod registry;

pub use breaker::{BreakerHealth, BreakerPolicy, BreakerStatus, CircuitBreaker};
pub use error::CircuitError;
pub use registry::BreakerRegistry;
