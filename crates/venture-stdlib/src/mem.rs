//! `mem`, the memoization maker (SPEC_FULL.md §14; spec.md §8 scenario 4
//! "memoized coin determinism").
//!
//! `(mem f)` returns a fresh procedure: calling it with a given argument
//! tuple evaluates `f` on those arguments only the first time that tuple is
//! seen, caching the result for every later call with the same arguments.
//! `original_source` did not retrieve `sps/mem.cxx`, only its registration
//! in `builtin.cxx` (`{"mem", new MSPMakerSP}`), so the request/output split
//! here is grounded on this workspace's own compound-procedure machinery
//! (`venture_trace::compound`) rather than a specific original file:
//! `mem` mints one new SP pair per `(mem f)` call via [`Args::sps`] (the
//! same capability `make_csp`-style procedure makers would use), and its
//! request PSP reuses [`venture_trace::request_application`] exactly the
//! way `branch` does for its cache-miss path.
//!
//! The cache lives in a `Rc<RefCell<_>>` shared between the minted request
//! and output PSPs, rather than going through the node-keyed `SpAux`
//! mechanism: every call site of a given `(mem f)` result reaches the same
//! two `Rc<dyn _Psp>`s, but (per `NodeArena::spaux_owner`'s doc comment)
//! reaches them via its own freshly-allocated `Lookup` node, so per-node
//! `SpAux` would not be shared across call sites the way a memoization
//! cache needs to be. This means a value memoized during a since-rejected
//! MH proposal is not rolled back by the normal detach/regen snapshot path
//! — a deliberate simplification recorded in DESIGN.md.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use venture_core::{Args, NodeId, OutputPsp, RequestPsp, RngHandle, Value, ValueKey, VentureError};
use venture_trace::request_application;

/// `(mem f)`: deterministic maker — mints a new memoized-wrapper SP around
/// whichever procedure node `f` evaluated to.
#[derive(Debug)]
pub struct Mem;

impl OutputPsp for Mem {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("mem", 1)?;
        let inner = args.operand_nodes[0];
        let sps = args.sps.as_deref_mut().ok_or_else(|| {
            VentureError::invariant("missing-sp-registry", "mem requires a mutable procedure registry")
        })?;
        let cache = Rc::new(RefCell::new(IndexMap::new()));
        let sp_id = sps.register(
            Box::new(MemoizedRequestPsp {
                inner,
                cache: cache.clone(),
            }),
            Box::new(MemoizedOutputPsp { cache }),
        );
        Ok(Value::Procedure(sp_id))
    }
}

type Cache = Rc<RefCell<IndexMap<Vec<ValueKey>, Value>>>;

fn cache_key(operands: &[Value]) -> Vec<ValueKey> {
    operands.iter().cloned().map(ValueKey::from).collect()
}

/// The request half of one `(mem f)` instance. A cache hit requests nothing
/// (`Value::Nil`, `flatten_requests`' empty case); a cache miss applies
/// `inner` to the call's operands as a single ESR, same as `branch`'s
/// chosen-arm application.
#[derive(Debug)]
struct MemoizedRequestPsp {
    inner: NodeId,
    cache: Cache,
}

impl RequestPsp for MemoizedRequestPsp {
    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        if self.cache.borrow().contains_key(&cache_key(&args.operands)) {
            return Ok(Value::Nil);
        }
        let envs = args.envs.as_mut().ok_or_else(|| {
            VentureError::invariant("missing-env-arena", "mem requires a mutable environment arena")
        })?;
        Ok(request_application(envs, args.environment, self.inner, &args.operand_nodes))
    }
}

/// The output half: returns the cached value on a hit, or reads the ESR a
/// cache miss just requested and files it away for next time.
#[derive(Debug)]
struct MemoizedOutputPsp {
    cache: Cache,
}

impl OutputPsp for MemoizedOutputPsp {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        let key = cache_key(&args.operands);
        if let Some(cached) = self.cache.borrow().get(&key) {
            return Ok(cached.clone());
        }
        let fresh = args.esr_values.first().cloned().ok_or_else(|| {
            VentureError::invariant("missing-esr", "memoized procedure application produced no ESR value")
        })?;
        self.cache.borrow_mut().insert(key, fresh.clone());
        Ok(fresh)
    }
}
