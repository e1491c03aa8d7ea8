//! Node arena, environments and the directive-level trace graph.
//!
//! `venture-trace` builds on `venture-core`'s value/PSP vocabulary to give a
//! concrete, mutable trace: a [`arena::NodeArena`] of constant/lookup/
//! request/output nodes, a chain of [`env::EnvArena`] frames, and a
//! [`trace::Trace`] tying both together behind the host-facing directive
//! operations (`eval`, `extract_value`, `bind_in_global_env`, `observe`).
//!
//! The scaffold/detach-regen protocol (`venture-scaffold`) operates directly
//! on the `NodeArena`/`EnvArena` exposed here rather than duplicating them.

pub mod arena;
pub mod compound;
pub mod env;
pub mod trace;

pub use arena::{NodeArena, NodeKind, NodeRecord};
pub use compound::{request_application, CompoundOutputPsp, CompoundRequestPsp};
pub use env::EnvArena;
pub use trace::Trace;
