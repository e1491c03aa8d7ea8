//! Core value model, identifiers, RNG and error types shared by every
//! venture crate.
//!
//! This crate has no notion of a trace graph or an inference kernel; it
//! only defines the vocabulary (`Value`, `Expression`, `Args`, the PSP
//! traits, identifiers, errors, RNG) that `venture-trace`, `venture-scaffold`
//! and `venture-infer` build on.

pub mod env;
pub mod errors;
pub mod expr;
pub mod ids;
pub mod rng;
pub mod sp;
pub mod value;

pub use env::EnvArena;
pub use errors::{ErrorInfo, VentureError};
pub use expr::{Expression, Literal};
pub use ids::{DirectiveId, EnvId, FamilyId, NodeId, RequestId, SpId};
pub use rng::{derive_substream_seed, RngHandle};
pub use sp::{Args, LatentDb, LatentDbHandle, OutputPsp, RequestPsp, SpAux, SpRegistry};
pub use value::{Value, ValueKey};
