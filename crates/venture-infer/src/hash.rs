//! Canonical hashing of a trace's externally-visible state.
//!
//! Grounded on `asm_graph::hash::canonical_hash`: a `Sha256` hasher fed a
//! fixed, sorted encoding of structure rather than relying on `serde`
//! (`Value` does not derive `Serialize` — its `Env`/`Procedure` variants hold
//! process-local ids that are meaningless outside the process that produced
//! them, so hashing byte-encodes only the portable variants and tags the
//! rest by kind).

use sha2::{Digest, Sha256};
use venture_core::Value;
use venture_trace::Trace;

/// Hashes every directive's current value, in directive-registration order.
/// Two traces built from identical seeds and identical directive sequences
/// produce identical hashes; this is the basis for the run manifest's
/// terminal-state fingerprint.
pub fn trace_hash(trace: &Trace) -> String {
    let mut hasher = Sha256::new();
    let directives = trace.directives();
    hasher.update((directives.len() as u64).to_le_bytes());
    for (directive, root, _family) in directives {
        hasher.update(directive.as_raw().to_le_bytes());
        match trace.nodes().get(*root).ok().and_then(|r| r.value()) {
            Some(value) => encode_value(value, &mut hasher),
            None => hasher.update(b"unsimulated"),
        }
    }
    format!("{:x}", hasher.finalize())
}

fn encode_value(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Number(n) => {
            hasher.update(b"num");
            hasher.update(n.to_bits().to_le_bytes());
        }
        Value::Bool(b) => {
            hasher.update(b"bool");
            hasher.update([*b as u8]);
        }
        Value::Atom(a) => {
            hasher.update(b"atom");
            hasher.update(a.to_le_bytes());
        }
        Value::Symbol(s) => {
            hasher.update(b"sym");
            hasher.update(s.as_bytes());
        }
        Value::Nil => hasher.update(b"nil"),
        Value::Pair(car, cdr) => {
            hasher.update(b"pair");
            encode_value(car, hasher);
            encode_value(cdr, hasher);
        }
        Value::Array(items) => {
            hasher.update(b"arr");
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items.iter() {
                encode_value(item, hasher);
            }
        }
        Value::Map(entries) => {
            hasher.update(b"map");
            hasher.update((entries.len() as u64).to_le_bytes());
            for (key, val) in entries.iter() {
                encode_value(&key.0, hasher);
                encode_value(val, hasher);
            }
        }
        Value::Env(id) => {
            hasher.update(b"env");
            hasher.update(id.as_raw().to_le_bytes());
        }
        Value::Procedure(id) => {
            hasher.update(b"proc");
            hasher.update(id.as_raw().to_le_bytes());
        }
        Value::Request(id, _, env) => {
            hasher.update(b"req");
            hasher.update(id.as_raw().to_le_bytes());
            hasher.update(env.as_raw().to_le_bytes());
        }
    }
}
