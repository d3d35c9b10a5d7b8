//! Repeated-structure operators.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::module::ModuleValue;
use crate::schema::{encoded_len, FieldSlot, FieldTy, StructValue, Value};
use crate::Result;

/// Elements are interchangeable only between repeats of the same shape.
pub(crate) fn same_elem_shape(a: &FieldTy, b: &FieldTy) -> bool {
    match (a, b) {
        (FieldTy::Struct(x), FieldTy::Struct(y)) => x == y,
        (FieldTy::VarU(x), FieldTy::VarU(y)) => x == y,
        (FieldTy::VarS(x), FieldTy::VarS(y)) => x == y,
        (FieldTy::UIntN(x), FieldTy::UIntN(y)) => x == y,
        _ => false,
    }
}

/// Clone a randomly chosen element and append it. Returns the length delta.
pub(crate) fn clone_element(slot: &mut FieldSlot, rng: &mut SmallRng) -> Result<isize> {
    let FieldTy::Repeat { elem, .. } = slot.prod else {
        return Ok(0);
    };
    let Value::List(items) = &mut slot.value else {
        return Ok(0);
    };
    if items.is_empty() {
        return Ok(0);
    }
    let index = rng.random_range(0..items.len());
    let cloned = items[index].clone();
    let delta = encoded_len(elem, &cloned)? as isize;
    items.push(cloned);
    Ok(delta)
}

/// Delete a randomly chosen element, but never below four so arrays do not
/// degenerate. Returns the length delta.
pub(crate) fn delete_element(slot: &mut FieldSlot, rng: &mut SmallRng) -> Result<isize> {
    let FieldTy::Repeat { elem, .. } = slot.prod else {
        return Ok(0);
    };
    let Value::List(items) = &mut slot.value else {
        return Ok(0);
    };
    if items.len() < 4 {
        return Ok(0);
    }
    let index = rng.random_range(0..items.len());
    let removed = items.remove(index);
    Ok(-(encoded_len(elem, &removed)? as isize))
}

/// Append an element spliced from a compatible repeated field of another
/// decoded module (the auxiliary corpus sample). Returns the length delta.
pub(crate) fn splice_element(slot: &mut FieldSlot, donor: &Value) -> Result<isize> {
    let FieldTy::Repeat { elem, .. } = slot.prod else {
        return Ok(0);
    };
    let Value::List(items) = &mut slot.value else {
        return Ok(0);
    };
    let delta = encoded_len(elem, donor)? as isize;
    items.push(donor.clone());
    Ok(delta)
}

/// Gather every element of every repeated field in `module` whose element
/// shape matches `elem`; these are the candidate donors for a splice.
pub(crate) fn collect_compatible_elements<'a>(
    module: &'a ModuleValue,
    elem: &FieldTy,
) -> Vec<&'a Value> {
    let mut donors = Vec::new();
    for section in &module.sections {
        collect_from_struct(section, elem, &mut donors);
    }
    donors
}

fn collect_from_struct<'a>(value: &'a StructValue, elem: &FieldTy, donors: &mut Vec<&'a Value>) {
    for slot in &value.slots {
        match &slot.value {
            Value::Struct(inner) => collect_from_struct(inner, elem, donors),
            Value::List(items) => {
                if let FieldTy::Repeat { elem: have, .. } = slot.prod {
                    if same_elem_shape(have, elem) {
                        donors.extend(items.iter());
                    }
                }
                for item in items {
                    if let Value::Struct(inner) = item {
                        collect_from_struct(inner, elem, donors);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleValue, StructKind};
    use crate::tree::{propagate_fix, resolve_slot_mut, Step};
    use rand::SeedableRng;

    /// Header plus a type section holding three nullary function types.
    fn three_types() -> Vec<u8> {
        let mut buf = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        buf.extend_from_slice(&[
            0x01, 0x0c, 0x03, // type section, payload_len 12, count 3
            0x60, 0x00, 0x00, // (func)
            0x60, 0x01, 0x7f, 0x00, // (func (param i32))
            0x60, 0x00, 0x01, 0x7f, // (func (result i32))
        ]);
        buf
    }

    #[test]
    fn clone_appends_a_content_equal_duplicate() {
        let mut rng = SmallRng::seed_from_u64(0);
        let module = ModuleValue::decode(&three_types()).unwrap();
        let mut section = module.sections[0].clone();
        let steps = vec![Step::Field(4), Step::Field(1)];

        let delta = {
            let slot = resolve_slot_mut(&mut section, &steps).unwrap();
            clone_element(slot, &mut rng).unwrap()
        };
        assert!(delta > 0);
        propagate_fix(&mut section, &steps, delta).unwrap();

        let Some(Value::Struct(payload)) = section.value("payload") else {
            panic!("expected a type section payload");
        };
        assert_eq!(payload.u64("count"), 4);
        let Some(Value::List(entries)) = payload.value("entries") else {
            panic!("expected type entries");
        };
        assert_eq!(entries.len(), 4);
        let original: Vec<_> = entries[..3].to_vec();
        assert!(original.contains(&entries[3]), "clone must duplicate an existing entry");

        // The re-encoded section re-decodes with the new shape intact.
        let mut bytes = Vec::new();
        section.encode(&mut bytes).unwrap();
        let (_, reparsed) = StructValue::decode(StructKind::Section, &bytes).unwrap();
        let Some(Value::Struct(reparsed_payload)) = reparsed.value("payload") else {
            panic!("expected a type section payload");
        };
        assert_eq!(reparsed_payload.cardinality("entries"), 4);
    }

    #[test]
    fn delete_respects_the_cardinality_floor() {
        let mut rng = SmallRng::seed_from_u64(0);
        let module = ModuleValue::decode(&three_types()).unwrap();
        let mut section = module.sections[0].clone();
        let steps = vec![Step::Field(4), Step::Field(1)];
        let slot = resolve_slot_mut(&mut section, &steps).unwrap();

        // Three elements: below the floor, nothing happens.
        assert_eq!(delete_element(slot, &mut rng).unwrap(), 0);
        assert_eq!(
            match &slot.value {
                Value::List(items) => items.len(),
                _ => 0,
            },
            3
        );

        // At four elements deletion is allowed again.
        clone_element(slot, &mut rng).unwrap();
        let delta = delete_element(slot, &mut rng).unwrap();
        assert!(delta < 0);
    }

    #[test]
    fn splice_donors_only_match_compatible_shapes() {
        let module = ModuleValue::decode(&three_types()).unwrap();
        let functype = FieldTy::Struct(StructKind::FuncType);
        let donors = collect_compatible_elements(&module, &functype);
        assert_eq!(donors.len(), 3);

        let importentry = FieldTy::Struct(StructKind::ImportEntry);
        assert!(collect_compatible_elements(&module, &importentry).is_empty());
    }
}
