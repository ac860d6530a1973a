//! Wall-clock hosting for the engine: a state-owning worker thread plus a
//! cloneable command handle.

pub use loadsim_driver::*;
