//! List, vector and map built-ins (SPEC_FULL.md §14), grounded on
//! `original_source`'s `sps/list.cxx`/`sps/vector.cxx`/`sps/map.cxx` (named in
//! `builtin.cxx`'s registration table, not themselves retrieved into
//! `original_source/`), reimplemented against this workspace's `Value::Pair`/
//! `Value::Array`/`Value::Map`.

use std::rc::Rc;

use indexmap::IndexMap;
use venture_core::{Args, OutputPsp, RngHandle, Value, ValueKey, VentureError};

#[derive(Debug)]
pub struct Pair;

impl OutputPsp for Pair {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("pair", 2)?;
        let head = args.operand("pair", 0)?.clone();
        let tail = args.operand("pair", 1)?.clone();
        Ok(Value::Pair(Rc::new(head), Rc::new(tail)))
    }
}

#[derive(Debug)]
pub struct First;

impl OutputPsp for First {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("first", 1)?;
        match args.operand("first", 0)? {
            Value::Pair(head, _) => Ok((**head).clone()),
            other => Err(VentureError::type_error("first", "pair", other.kind_name())),
        }
    }
}

#[derive(Debug)]
pub struct Rest;

impl OutputPsp for Rest {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("rest", 1)?;
        match args.operand("rest", 0)? {
            Value::Pair(_, tail) => Ok((**tail).clone()),
            other => Err(VentureError::type_error("rest", "pair", other.kind_name())),
        }
    }
}

#[derive(Debug)]
pub struct ListSp;

impl OutputPsp for ListSp {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::list_from(&args.operands))
    }
}

#[derive(Debug)]
pub struct IsPair;

impl OutputPsp for IsPair {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("is_pair", 1)?;
        Ok(Value::Bool(matches!(args.operand("is_pair", 0)?, Value::Pair(..))))
    }
}

#[derive(Debug)]
pub struct ListRef;

impl OutputPsp for ListRef {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("list_ref", 2)?;
        let list = args.operand("list_ref", 0)?.clone();
        let index = args.operand("list_ref", 1)?.as_number("list_ref")? as usize;
        let items = list.list_to_vec("list_ref")?;
        items
            .get(index)
            .cloned()
            .ok_or_else(|| VentureError::domain_error("list_ref", format!("index {index} out of range")))
    }
}

#[derive(Debug)]
pub struct MakeVector;

impl OutputPsp for MakeVector {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::Array(Rc::from(args.operands.clone())))
    }
}

#[derive(Debug)]
pub struct VectorLookup;

impl OutputPsp for VectorLookup {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("vector_lookup", 2)?;
        let array = args.operand("vector_lookup", 0)?.as_array("vector_lookup")?;
        let index = args.operand("vector_lookup", 1)?.as_number("vector_lookup")? as usize;
        array
            .get(index)
            .cloned()
            .ok_or_else(|| VentureError::domain_error("vector_lookup", format!("index {index} out of range")))
    }
}

/// `(make_map keys values)`: zips two equal-length vectors into a `Value::Map`.
#[derive(Debug)]
pub struct MakeMap;

impl OutputPsp for MakeMap {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("make_map", 2)?;
        let keys = args.operand("make_map", 0)?.as_array("make_map")?;
        let values = args.operand("make_map", 1)?.as_array("make_map")?;
        if keys.len() != values.len() {
            return Err(VentureError::arity_error("make_map", keys.len(), values.len()));
        }
        let mut map = IndexMap::new();
        for (key, value) in keys.iter().zip(values.iter()) {
            map.insert(ValueKey(key.clone()), value.clone());
        }
        Ok(Value::Map(Rc::new(map)))
    }
}

#[derive(Debug)]
pub struct MapLookup;

impl OutputPsp for MapLookup {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("map_lookup", 2)?;
        let map = match args.operand("map_lookup", 0)? {
            Value::Map(map) => map.clone(),
            other => return Err(VentureError::type_error("map_lookup", "map", other.kind_name())),
        };
        let key = args.operand("map_lookup", 1)?.clone();
        map.get(&ValueKey(key))
            .cloned()
            .ok_or_else(|| VentureError::domain_error("map_lookup", "key not present in map"))
    }
}
