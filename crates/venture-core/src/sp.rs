//! Stochastic procedure interface: the `Args` bundle and the request/output
//! PSP traits that every built-in and compound procedure implements.
//!
//! Grounded on the original implementation's `Args` struct (bundling
//! operands, the request/output node pair, ESR results and the SP's own
//! auxiliary state into one value passed to every PSP method) and on the
//! teacher's object-safe trait style (`Hypergraph`, `ConstraintProjector`):
//! `RequestPsp`/`OutputPsp` are `dyn`-safe so a `Procedure` can hold a
//! `Box<dyn OutputPsp>` without the trace crate needing to be generic over
//! concrete SP types.

use std::any::Any;
use std::fmt;

use crate::env::EnvArena;
use crate::errors::VentureError;
use crate::ids::{EnvId, NodeId, SpId};
use crate::rng::RngHandle;
use crate::value::Value;

/// Mutable sufficient-statistic state privately owned by one SP instance
/// (spec §3 "SPAux"). Downcast via [`SpAux::as_any`]/[`SpAux::as_any_mut`]
/// by the owning SP's own incorporate/unincorporate/simulate methods only;
/// scaffold and kernel code never downcasts an `SpAux` directly, it only
/// moves the `Box` around.
pub trait SpAux: fmt::Debug {
    /// Produces a deep copy of this auxiliary state, used when cloning a
    /// trace (e.g. to seed a new particle in particle Gibbs).
    fn clone_box(&self) -> Box<dyn SpAux>;

    /// Exposes the concrete type for downcasting within the owning SP.
    fn as_any(&self) -> &dyn Any;

    /// Exposes the concrete type for downcasting within the owning SP.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn SpAux> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Per-family latent state saved across a detach/regen cycle, for the rare
/// SP with hidden state beyond its own `SpAux` sufficient statistics (spec
/// §4.3's optional `simulateLatents`/`detachLatents`; `make_lazy_hmm`'s
/// sampled state sequence is the one stdlib example). Downcast only within
/// the owning SP's own methods, same discipline as [`SpAux`].
pub trait LatentDb: fmt::Debug {
    /// Produces a deep copy, used when cloning a trace.
    fn clone_box(&self) -> Box<dyn LatentDb>;

    /// Exposes the concrete type for downcasting within the owning SP.
    fn as_any(&self) -> &dyn Any;

    /// Exposes the concrete type for downcasting within the owning SP.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn LatentDb> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Opaque handle to one family's saved latent state (spec §9 "`DB::getLatentDB`
/// return type" — resolved to return the stored handle directly rather than
/// the original's bug-for-bug `void`).
pub type LatentDbHandle = Box<dyn LatentDb>;

/// Capability for a PSP to register a brand-new stochastic procedure at
/// runtime, exposed through [`Args::sps`] rather than a `&mut Trace` handle
/// (the same reason [`Args::envs`] exposes an `EnvArena` rather than a
/// trace). `mem` is the stdlib procedure that needs this: applying it mints
/// a fresh memoizing wrapper around its argument procedure, one new SP
/// instance per `mem` call site.
pub trait SpRegistry {
    /// Registers `request`/`output` as a new procedure and returns its id.
    fn register(&mut self, request: Box<dyn RequestPsp>, output: Box<dyn OutputPsp>) -> SpId;
}

/// The bundle of context passed to every PSP method: the operand values (at
/// the application node's operand nodes), the nodes themselves for callers
/// that need node identity, the results of any existing-simulation-request
/// (ESR) edges, and a handle to the SP's own auxiliary state.
pub struct Args<'a> {
    /// Operand values, in argument order.
    pub operands: Vec<Value>,
    /// Node ids backing each operand, same order as `operands`.
    pub operand_nodes: Vec<NodeId>,
    /// The request node, for request-PSP methods. `None` for a bare
    /// (non-requesting) output-PSP application.
    pub request_node: Option<NodeId>,
    /// The output node this application will produce a value for.
    pub output_node: NodeId,
    /// Values of any existing-simulation-request edges this application's
    /// request spawned, in request order.
    pub esr_values: Vec<Value>,
    /// Node ids of the ESR-parent nodes, same order as `esr_values`.
    pub esr_nodes: Vec<NodeId>,
    /// The lexical environment this application was evaluated in; request
    /// PSPs that construct fresh expressions (`branch`, `mem`, `eval`) close
    /// over this to build the new family's evaluation environment.
    pub environment: EnvId,
    /// Mutable handle to the operator SP's own auxiliary state, if it has
    /// one.
    pub spaux: Option<&'a mut dyn SpAux>,
    /// Mutable handle to the environment arena, for the rare SPs that build
    /// new lexical scope at runtime (`extend_environment`, compound
    /// procedure application). `None` at call sites that never construct
    /// one of those SPs' arguments; those SPs error if it is missing rather
    /// than panicking.
    pub envs: Option<&'a mut EnvArena>,
    /// Mutable handle to the procedure registry, for the rare SPs that mint
    /// a brand-new stochastic procedure at runtime (`mem`). `None` at call
    /// sites that never construct one of those SPs' arguments.
    pub sps: Option<&'a mut dyn SpRegistry>,
}

impl<'a> Args<'a> {
    /// Returns the `n`th operand, or an arity error naming `operator`.
    pub fn operand(&self, operator: &str, n: usize) -> Result<&Value, VentureError> {
        self.operands
            .get(n)
            .ok_or_else(|| VentureError::arity_error(operator, n + 1, self.operands.len()))
    }

    /// Asserts the operand count equals `expected`, naming `operator`.
    pub fn require_arity(&self, operator: &str, expected: usize) -> Result<(), VentureError> {
        if self.operands.len() != expected {
            return Err(VentureError::arity_error(
                operator,
                expected,
                self.operands.len(),
            ));
        }
        Ok(())
    }
}

/// The request half of a stochastic procedure (spec §4.3). Simulating a
/// request either yields no ESRs (the common case for primitive
/// procedures) or yields one or more `(FamilyId, Expression, EnvId)` triples
/// that the trace must regenerate as brush, e.g. `branch`'s chosen arm or
/// `mem`'s memoized call.
pub trait RequestPsp: fmt::Debug {
    /// Simulates the request, returning the family requests to regenerate.
    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError>;

    /// Whether this request PSP is random (most are not; ERPs that
    /// themselves make requests are the exception).
    fn is_random(&self) -> bool {
        false
    }
}

/// The output half of a stochastic procedure (spec §4.3): simulates a value
/// given operands (and ESR results, for requesting SPs), scores a fixed
/// value under the implied density, and optionally incorporates/
/// unincorporates sufficient statistics into its `SpAux`.
pub trait OutputPsp: fmt::Debug {
    /// Whether this output PSP is itself stochastic. Deterministic PSPs
    /// (`plus`, `first`, ...) are always absorbing at applications; they
    /// never need resimulation.
    fn is_random(&self) -> bool;

    /// Draws a value from the procedure's output distribution.
    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError>;

    /// Computes `log p(value | operands, esr_values)`. Required for any PSP
    /// with `is_random() == true`; deterministic PSPs never have their
    /// density queried.
    fn log_density(&self, _value: &Value, _args: &Args<'_>) -> Result<f64, VentureError> {
        Err(VentureError::invariant(
            "no-log-density",
            "log_density called on a PSP that does not define one",
        ))
    }

    /// Whether this specific application can be absorbed (rescored in
    /// place under `log_density` rather than resimulated) instead of being
    /// treated as a DRG candidate for fresh resampling (spec §4.3
    /// `canAbsorb`). Most PSPs decide this once for every application
    /// (`is_random()`'s negation already rules out deterministic PSPs, and
    /// any random PSP with a `log_density` is absorbable by default), but
    /// the per-application `args` is exposed for the rare PSP whose
    /// assessability depends on its operands (e.g. a PSP that is only
    /// defined, and so only absorbable, for a subset of its operand
    /// domain). Returning `false` here is what makes `classify` put an
    /// application in the DRG instead of the Absorbing boundary.
    fn can_absorb(&self, args: &Args<'_>) -> bool {
        let _ = args;
        self.is_random()
    }

    /// Whether this PSP exposes a finite, enumerable output support (spec
    /// §4.6 "Gibbs-over-enumerable"). Returning `true` requires overriding
    /// [`OutputPsp::enumerate`].
    fn can_enumerate(&self) -> bool {
        false
    }

    /// Enumerates the full output support, paired with its log density
    /// under the current operands. Only called when `can_enumerate` is
    /// `true`.
    fn enumerate(&self, _args: &Args<'_>) -> Result<Vec<(Value, f64)>, VentureError> {
        Err(VentureError::invariant(
            "not-enumerable",
            "enumerate called on a PSP that is not enumerable",
        ))
    }

    /// Incorporates `value` into this PSP's sufficient statistics. Called
    /// once per application, after a value is accepted as the application's
    /// current output.
    fn incorporate(&self, _value: &Value, _args: &mut Args<'_>) {}

    /// Removes `value` from this PSP's sufficient statistics, the inverse
    /// of [`OutputPsp::incorporate`].
    fn unincorporate(&self, _value: &Value, _args: &mut Args<'_>) {}

    /// Whether the trace should treat applications of this PSP as always
    /// absorbing at applications (AAA, spec §4.4) rather than candidates
    /// for resimulation. Exchangeable-coupler SPs (CRP, Dirichlet-multinomial
    /// collapsed samplers) set this `true`.
    fn is_aaa(&self) -> bool {
        false
    }

    /// Whether this PSP carries per-family latent state beyond its own
    /// sufficient statistics (spec §4.3's optional latent-variable
    /// simulation). `make_lazy_hmm` is the only stdlib SP that sets this
    /// `true`.
    fn has_latents(&self) -> bool {
        false
    }

    /// Computes fresh auxiliary state to install on this application's own
    /// output node, given its already-evaluated operands. `Args::spaux`
    /// only ever hands out a mutable reference to state a node already
    /// carries — there is no way for a PSP to conjure a brand-new `SpAux`
    /// into existence from inside `simulate`/`incorporate`, since doing so
    /// would need a `&mut NodeArena` aliasing the very `spaux` reference
    /// `Args` already borrows. A maker SP whose output is itself a
    /// procedure with sufficient-statistic state (`make_sym_dir_mult`,
    /// `make_crp`) overrides this instead; the trace installs the result on
    /// the freshly-created output node before simulating it, so every later
    /// call site of the minted procedure (each reaching that node through
    /// its own `Lookup`, per `NodeArena::spaux_owner`) finds the state
    /// already in place. `None` (the default) for every other SP.
    fn initial_spaux(&self, _operands: &[Value]) -> Option<Box<dyn SpAux>> {
        None
    }

    /// Simulates this application's latent state (or, when `should_restore`
    /// is `true` and `latent_db` is `Some`, restores it from a previously
    /// detached snapshot), returning the log weight it contributes. Only
    /// called when [`OutputPsp::has_latents`] is `true`.
    fn simulate_latents(
        &self,
        _args: &mut Args<'_>,
        _should_restore: bool,
        _latent_db: Option<&LatentDbHandle>,
        _rng: &mut RngHandle,
    ) -> Result<f64, VentureError> {
        Ok(0.0)
    }

    /// Detaches this application's latent state, returning a handle the
    /// caller may later pass back to [`OutputPsp::simulate_latents`] to
    /// restore it exactly. Only called when [`OutputPsp::has_latents`] is
    /// `true`.
    fn detach_latents(&self, _args: &mut Args<'_>) -> Option<LatentDbHandle> {
        None
    }
}
