//! Scaffold construction and the detach/regenerate Metropolis-Hastings
//! protocol (spec §4.4/§4.5).
//!
//! A [`scaffold::Scaffold`] names the nodes one MH/Gibbs/particle-Gibbs
//! proposal touches; [`detach_regen::detach`]/[`detach_regen::regen`] walk
//! it to tear down and rebuild the corresponding slice of a
//! `venture_trace::Trace`.

pub mod detach_regen;
pub mod scaffold;

pub use detach_regen::{detach, regen, regen_node, RollbackDb};
pub use scaffold::{NodeRole, Scaffold};
