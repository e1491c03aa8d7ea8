//! Re-exports [`venture_core::EnvArena`]. The arena moved down into
//! `venture-core` so that `Args` can hand SPs a mutable handle to it
//! (`extend_environment` needs to create new frames at runtime); this
//! module stays so existing `crate::env::EnvArena` paths keep resolving.

pub use venture_core::EnvArena;
