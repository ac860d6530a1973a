//! Core engine data structures and routines. The most common entry point
//! is [run::run()](loadsim_core::run::run), which turns a
//! [scenario](loadsim_core::scenario::Scenario) into a
//! [`Simulation`](loadsim_core::engine::Simulation).

pub use loadsim_core::*;
