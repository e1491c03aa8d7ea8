//! Shared scaffolding for built-in procedures: most of this crate's SPs are
//! plain output procedures with no request half, so they all share one
//! `RequestPsp` that never produces ESRs.

use venture_core::{Args, RequestPsp, RngHandle, Value, VentureError};

/// The request half of every non-requesting built-in (everything but
/// `branch`, `mem`'s cache-miss path, `extend_environment`/`eval`, and
/// compound procedures, all of which supply their own).
#[derive(Debug)]
pub struct NoRequest;

impl RequestPsp for NoRequest {
    fn simulate(&self, _args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::Nil)
    }
}
