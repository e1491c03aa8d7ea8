//! Lightweight integer identifiers used throughout the trace engine.
//!
//! Every identifier is a newtype over `u64` (mirrors `NodeId`/`EdgeId` in the
//! teacher's hypergraph crate) so that node arenas, environment arenas and
//! SP-family tables can each use plain `Vec`-indexed storage without risking
//! accidental cross-kind mixing at the type level.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from its raw integer representation.
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw integer representation of the identifier.
            pub fn as_raw(&self) -> u64 {
                self.0
            }
        }
    };
}

id_type!(NodeId, "Identifier for a node within the trace's node arena.");
id_type!(EnvId, "Identifier for a lexical environment frame.");
id_type!(SpId, "Identifier for a stochastic procedure instance.");
id_type!(
    RequestId,
    "Identifier minted by a request-PSP for one `Request` value."
);
id_type!(
    DirectiveId,
    "Host-assigned identifier for a top-level directive (`eval`/`observe`/...)."
);

/// Content-addressed key used by an SP's family table (spec §3 "SP-family
/// table"). Two requests from the same operator with the same `FamilyId`
/// must resolve to the same family root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FamilyId(pub u64);

impl FamilyId {
    /// Wraps a raw integer as a family identifier.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}
