//! `make_crp`: the Chinese Restaurant Process / Pitman-Yor maker
//! (SPEC_FULL.md §14; spec.md §8 scenario 4, the other AAA exchangeable
//! coupler).
//!
//! `original_source` names `make_crp` in `builtin.cxx`'s registration table
//! (`MakePitmanYorCRPSP`, `sps/pycrp.h`) but that header was not retrieved,
//! so the predictive-probability formula is grounded on the standard
//! Pitman-Yor urn scheme directly: seated table `k` holding `count_k`
//! customers gets weight `count_k - discount`; a fresh table gets weight
//! `alpha + discount * (number of occupied tables)`. `discount == 0.0`
//! reduces to the plain (non-Pitman-Yor) CRP.
//!
//! Table atoms are never renumbered once assigned: [`unincorporate`] leaves
//! an emptied table's slot in place (weight `0.0`, excluded from
//! enumeration) rather than compacting the index space, so a value drawn
//! earlier and cached elsewhere in the trace never silently starts naming a
//! different table. A later simulate reuses the lowest empty slot instead
//! of always growing the table list. Recorded as a deliberate simplification
//! in DESIGN.md (the alternative, renumbering tables on removal, would
//! require rewriting every already-regenerated customer node's value).

use std::any::Any;

use venture_core::{Args, OutputPsp, RngHandle, SpAux, Value, VentureError};

#[derive(Debug, Clone, Default)]
struct CrpAux {
    counts: Vec<u64>,
}

impl SpAux for CrpAux {
    fn clone_box(&self) -> Box<dyn SpAux> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn read_aux<'a>(args: &'a Args<'_>) -> Result<&'a CrpAux, VentureError> {
    args.spaux
        .as_deref()
        .and_then(|aux| aux.as_any().downcast_ref::<CrpAux>())
        .ok_or_else(|| VentureError::invariant("missing-spaux", "crp missing its auxiliary table counts"))
}

/// `(make_crp alpha)` or `(make_crp alpha discount)`, `discount` defaulting
/// to `0.0`.
#[derive(Debug)]
pub struct MakeCrp;

impl OutputPsp for MakeCrp {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        let (alpha, discount) = params(args)?;
        let sps = args
            .sps
            .as_deref_mut()
            .ok_or_else(|| VentureError::invariant("missing-sp-registry", "make_crp requires a mutable procedure registry"))?;
        let sp_id = sps.register(Box::new(crate::support::NoRequest), Box::new(CrpOutputPsp { alpha, discount }));
        Ok(Value::Procedure(sp_id))
    }

    fn initial_spaux(&self, _operands: &[Value]) -> Option<Box<dyn SpAux>> {
        Some(Box::new(CrpAux::default()))
    }
}

fn params(args: &Args<'_>) -> Result<(f64, f64), VentureError> {
    if args.operands.is_empty() || args.operands.len() > 2 {
        return Err(VentureError::arity_error("make_crp", 1, args.operands.len()));
    }
    let alpha = args.operand("make_crp", 0)?.as_number("make_crp")?;
    let discount = match args.operands.get(1) {
        Some(value) => value.as_number("make_crp")?,
        None => 0.0,
    };
    if !(0.0..1.0).contains(&discount) {
        return Err(VentureError::domain_error("make_crp", "discount must lie in [0, 1)"));
    }
    if alpha <= -discount {
        return Err(VentureError::domain_error("make_crp", "alpha must be greater than -discount"));
    }
    Ok((alpha, discount))
}

#[derive(Debug)]
struct CrpOutputPsp {
    alpha: f64,
    discount: f64,
}

impl CrpOutputPsp {
    fn active_weight(&self, count: u64) -> f64 {
        if count == 0 {
            0.0
        } else {
            count as f64 - self.discount
        }
    }

    fn new_table_index(counts: &[u64]) -> usize {
        counts.iter().position(|&c| c == 0).unwrap_or(counts.len())
    }

    fn new_table_weight(&self, counts: &[u64]) -> f64 {
        let occupied = counts.iter().filter(|&&c| c > 0).count() as f64;
        self.alpha + self.discount * occupied
    }
}

impl OutputPsp for CrpOutputPsp {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let counts = read_aux(args)?.counts.clone();
        let new_weight = self.new_table_weight(&counts);
        let total: f64 = counts.iter().map(|&c| self.active_weight(c)).sum::<f64>() + new_weight;
        let u = rng.uniform() * total;
        let mut acc = 0.0;
        for (i, &count) in counts.iter().enumerate() {
            acc += self.active_weight(count);
            if u < acc {
                return Ok(Value::Atom(i as u32));
            }
        }
        Ok(Value::Atom(Self::new_table_index(&counts) as u32))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let i = value.as_atom("crp")? as usize;
        let counts = &read_aux(args)?.counts;
        let new_weight = self.new_table_weight(counts);
        let total: f64 = counts.iter().map(|&c| self.active_weight(c)).sum::<f64>() + new_weight;
        let weight = if i < counts.len() && counts[i] > 0 {
            self.active_weight(counts[i])
        } else if i == Self::new_table_index(counts) {
            new_weight
        } else {
            return Ok(f64::NEG_INFINITY);
        };
        Ok((weight / total).ln())
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn enumerate(&self, args: &Args<'_>) -> Result<Vec<(Value, f64)>, VentureError> {
        let counts = read_aux(args)?.counts.clone();
        let new_weight = self.new_table_weight(&counts);
        let total: f64 = counts.iter().map(|&c| self.active_weight(c)).sum::<f64>() + new_weight;
        let mut out: Vec<(Value, f64)> = counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(i, &c)| (Value::Atom(i as u32), (self.active_weight(c) / total).ln()))
            .collect();
        out.push((Value::Atom(Self::new_table_index(&counts) as u32), (new_weight / total).ln()));
        Ok(out)
    }

    fn incorporate(&self, value: &Value, args: &mut Args<'_>) {
        let Ok(i) = value.as_atom("crp") else { return };
        let Some(aux) = args.spaux.as_deref_mut().and_then(|a| a.as_any_mut().downcast_mut::<CrpAux>()) else {
            return;
        };
        let i = i as usize;
        if i >= aux.counts.len() {
            aux.counts.resize(i + 1, 0);
        }
        aux.counts[i] += 1;
    }

    fn unincorporate(&self, value: &Value, args: &mut Args<'_>) {
        let Ok(i) = value.as_atom("crp") else { return };
        let Some(aux) = args.spaux.as_deref_mut().and_then(|a| a.as_any_mut().downcast_mut::<CrpAux>()) else {
            return;
        };
        if let Some(count) = aux.counts.get_mut(i as usize) {
            *count = count.saturating_sub(1);
        }
    }

    fn is_aaa(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with(spaux: &mut CrpAux) -> Args<'_> {
        Args {
            operands: vec![],
            operand_nodes: vec![],
            request_node: None,
            output_node: venture_core::NodeId::from_raw(0),
            esr_values: vec![],
            esr_nodes: vec![],
            environment: venture_core::EnvId::from_raw(0),
            spaux: Some(spaux),
            envs: None,
            sps: None,
        }
    }

    #[test]
    fn first_customer_always_opens_a_new_table() {
        let psp = CrpOutputPsp { alpha: 1.0, discount: 0.0 };
        let mut aux = CrpAux::default();
        let args = args_with(&mut aux);
        let enumerated = psp.enumerate(&args).unwrap();
        assert_eq!(enumerated, vec![(Value::Atom(0), 0.0_f64.ln())]);
    }

    #[test]
    fn occupied_table_gets_more_weight_than_a_fresh_one() {
        let psp = CrpOutputPsp { alpha: 1.0, discount: 0.0 };
        let mut aux = CrpAux { counts: vec![5] };
        let args = args_with(&mut aux);
        let enumerated = psp.enumerate(&args).unwrap();
        let existing = enumerated.iter().find(|(v, _)| *v == Value::Atom(0)).unwrap().1;
        let fresh = enumerated.iter().find(|(v, _)| *v == Value::Atom(1)).unwrap().1;
        assert!(existing > fresh);
    }

    #[test]
    fn emptied_table_slot_is_reused_rather_than_renumbered() {
        let psp = CrpOutputPsp { alpha: 1.0, discount: 0.0 };
        let mut aux = CrpAux { counts: vec![1, 3] };
        let mut args = args_with(&mut aux);
        psp.unincorporate(&Value::Atom(0), &mut args);
        drop(args);
        assert_eq!(aux.counts[0], 0);
        assert_eq!(CrpOutputPsp::new_table_index(&aux.counts), 0);
    }
}
