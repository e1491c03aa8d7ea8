//! Lexical environment frames.
//!
//! An environment is a chain of frames, each binding symbols to the node
//! whose value the symbol currently resolves to. Frames are arena-allocated
//! like nodes (by [`EnvId`]) rather than `Rc<RefCell<..>>`-linked, so a
//! scaffold can refer to an `EnvId` across a detach/regen cycle without
//! worrying about frame lifetime.
//!
//! Lives in `venture-core` (rather than alongside `NodeArena` in
//! `venture-trace`) because [`Args`](crate::sp::Args) needs to hand a
//! mutable `EnvArena` handle to SPs that create new lexical scope at
//! runtime (`extend_environment`) — and `Args` is part of this crate's
//! vocabulary.

use std::collections::HashMap;

use crate::ids::{EnvId, NodeId};
use crate::errors::VentureError;

#[derive(Debug, Clone)]
struct Frame {
    parent: Option<EnvId>,
    bindings: HashMap<String, NodeId>,
}

/// Arena of lexical environment frames.
#[derive(Debug, Clone, Default)]
pub struct EnvArena {
    frames: Vec<Frame>,
}

impl EnvArena {
    /// Creates an arena containing a single empty global frame and returns
    /// its id.
    pub fn new() -> (Self, EnvId) {
        let mut arena = Self { frames: Vec::new() };
        let global = arena.push(Frame {
            parent: None,
            bindings: HashMap::new(),
        });
        (arena, global)
    }

    fn push(&mut self, frame: Frame) -> EnvId {
        let id = EnvId::from_raw(self.frames.len() as u64);
        self.frames.push(frame);
        id
    }

    /// Extends `parent` with a fresh, empty frame.
    pub fn extend(&mut self, parent: EnvId) -> EnvId {
        self.push(Frame {
            parent: Some(parent),
            bindings: HashMap::new(),
        })
    }

    /// Allocates a fresh frame with no parent and no bindings, used for
    /// `get_empty_environment` — distinct from the global environment, which
    /// accumulates `assume` bindings over a trace's lifetime.
    pub fn new_root(&mut self) -> EnvId {
        self.push(Frame {
            parent: None,
            bindings: HashMap::new(),
        })
    }

    fn frame(&self, id: EnvId) -> Result<&Frame, VentureError> {
        self.frames.get(id.as_raw() as usize).ok_or_else(|| {
            VentureError::invariant("unknown-env", format!("no such environment: {}", id.as_raw()))
        })
    }

    fn frame_mut(&mut self, id: EnvId) -> Result<&mut Frame, VentureError> {
        self.frames.get_mut(id.as_raw() as usize).ok_or_else(|| {
            VentureError::invariant("unknown-env", format!("no such environment: {}", id.as_raw()))
        })
    }

    /// Binds `symbol` to `node` in the frame `env`, shadowing any outer
    /// binding.
    pub fn bind(&mut self, env: EnvId, symbol: impl Into<String>, node: NodeId) -> Result<(), VentureError> {
        self.frame_mut(env)?.bindings.insert(symbol.into(), node);
        Ok(())
    }

    /// Resolves `symbol` starting at `env` and walking outward through
    /// parent frames.
    pub fn lookup(&self, env: EnvId, symbol: &str) -> Result<NodeId, VentureError> {
        let mut cursor = Some(env);
        while let Some(id) = cursor {
            let frame = self.frame(id)?;
            if let Some(node) = frame.bindings.get(symbol) {
                return Ok(*node);
            }
            cursor = frame.parent;
        }
        Err(VentureError::domain_error(
            "lookup",
            format!("unbound symbol: {symbol}"),
        ))
    }

    /// The parent of a frame, if any.
    pub fn parent(&self, env: EnvId) -> Result<Option<EnvId>, VentureError> {
        Ok(self.frame(env)?.parent)
    }

    /// Extends `parent` with a fresh frame binding every `(symbol, node)`
    /// pair at once, returning the new frame's id. Used by `extend_environment`
    /// and by compound-procedure application, both of which need a single
    /// atomic new scope rather than one frame per binding.
    pub fn extend_with(&mut self, parent: EnvId, bindings: &[(String, NodeId)]) -> EnvId {
        let child = self.extend(parent);
        for (symbol, node) in bindings {
            self.frame_mut(child)
                .expect("frame just created")
                .bindings
                .insert(symbol.clone(), *node);
        }
        child
    }
}
