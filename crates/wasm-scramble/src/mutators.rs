//! Mutation operator catalog and dispatch.
//!
//! Operators come in four groups: byte-buffer operators over raw byte runs,
//! structural operators over repeated structure fields, scalar operators
//! over integer fields and integer lists, and instruction-stream operators
//! over code byte runs. Dispatch picks the group from the selected node's
//! producing descriptor and its path, applies one operator, and propagates
//! the resulting length delta up to the owning section.

pub mod bytes;
pub mod insn;
pub mod scalar;
pub mod structure;

use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::module::ModuleValue;
use crate::schema::{describe, FieldSlot, FieldTy, Value};
use crate::tree::{propagate_fix, resolve_slot_mut, Node};
use crate::Result;

/// Apply one randomly chosen, kind-appropriate operator to `node`, then fix
/// up every dependent length and count on the path back to the section root.
pub(crate) fn mutate_node(
    module: &mut ModuleValue,
    node: &Node,
    rng: &mut SmallRng,
    aux: Option<&ModuleValue>,
) -> Result<()> {
    let section = &mut module.sections[node.section];
    let delta = {
        let slot = resolve_slot_mut(section, &node.steps)?;
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{} = {}", node.path, describe(slot.prod, &slot.value));
        }
        dispatch(slot, node, rng, aux)?
    };
    propagate_fix(section, &node.steps, delta)
}

/// Later siblings' presence or shape hangs off these fields; replacing one
/// would desynchronize conditional and union fields from the flag they were
/// decoded against.
const DISCRIMINANT_FIELDS: &[&str] = &["id", "kind", "flags", "return_count", "name_type"];

fn dispatch(
    slot: &mut FieldSlot,
    node: &Node,
    rng: &mut SmallRng,
    aux: Option<&ModuleValue>,
) -> Result<isize> {
    match slot.prod {
        FieldTy::VarU(_) | FieldTy::VarS(_) | FieldTy::UIntN(_) => {
            if DISCRIMINANT_FIELDS.contains(&node.name) {
                return Ok(0);
            }
            log::trace!("replacing scalar at {}", node.path);
            scalar::replace_scalar(slot, rng)
        }
        FieldTy::Bytes { .. } => mutate_byte_run(slot, node, rng),
        FieldTy::Repeat { elem, .. } => {
            if matches!(elem, FieldTy::Struct(_)) {
                mutate_structure_list(slot, node, rng, aux)
            } else {
                mutate_int_list(slot, node, rng)
            }
        }
        // Absent conditionals, constants, and anything else without a
        // byte-level identity: leave the iteration as a no-op.
        _ => Ok(0),
    }
}

fn mutate_byte_run(slot: &mut FieldSlot, node: &Node, rng: &mut SmallRng) -> Result<isize> {
    // The overhang run pads a section out to its declared payload length;
    // scrambling it would only shift bytes the schema never interprets.
    if node.name == "overhang" {
        return Ok(0);
    }
    let Value::Bytes(buf) = &mut slot.value else {
        return Ok(0);
    };
    if buf.is_empty() {
        return Ok(0);
    }
    if node.in_code_or_data && rng.random_bool(0.5) {
        log::trace!("mutating instruction stream at {}", node.path);
        return Ok(insn::mutate_instruction_stream(buf, rng));
    }
    let op = bytes::BYTE_OPS.choose(rng).unwrap();
    log::trace!("mutating byte run at {} ({} bytes)", node.path, buf.len());
    Ok(op(buf, rng))
}

fn mutate_structure_list(
    slot: &mut FieldSlot,
    node: &Node,
    rng: &mut SmallRng,
    aux: Option<&ModuleValue>,
) -> Result<isize> {
    let Value::List(items) = &slot.value else {
        return Ok(0);
    };
    if items.is_empty() {
        return Ok(0);
    }

    // A donor from the auxiliary corpus sample enables the cross-buffer
    // splice; without one the choice is clone-or-delete.
    let donors = match (aux, slot.prod) {
        (Some(aux), FieldTy::Repeat { elem, .. }) => {
            structure::collect_compatible_elements(aux, elem)
        }
        _ => Vec::new(),
    };
    let choices = if donors.is_empty() { 2 } else { 3 };
    match rng.random_range(0..choices) {
        0 => {
            log::trace!("cloning element of {}", node.path);
            structure::clone_element(slot, rng)
        }
        1 => {
            log::trace!("deleting element of {}", node.path);
            structure::delete_element(slot, rng)
        }
        _ => {
            let donor = donors.choose(rng).unwrap();
            log::trace!("splicing foreign element into {}", node.path);
            structure::splice_element(slot, donor)
        }
    }
}

fn mutate_int_list(slot: &mut FieldSlot, node: &Node, rng: &mut SmallRng) -> Result<isize> {
    let Value::List(items) = &slot.value else {
        return Ok(0);
    };
    if items.is_empty() {
        return Ok(0);
    }
    if rng.random_range(1..=10) >= 5 {
        type ListOp = fn(&mut FieldSlot, &mut SmallRng) -> Result<isize>;
        const LIST_OPS: &[ListOp] = &[
            scalar::insert_random_ints,
            scalar::clone_int,
            scalar::remove_int,
        ];
        let op = LIST_OPS.choose(rng).unwrap();
        log::trace!("resizing integer list {}", node.path);
        op(slot, rng)
    } else {
        log::trace!("replacing element of integer list {}", node.path);
        scalar::replace_int(slot, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleValue;
    use crate::tree::{ParseTree, Tier};
    use rand::SeedableRng;

    fn module_with_code() -> Vec<u8> {
        let mut buf = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        buf.extend_from_slice(&[
            0x0a, 0x0b, 0x01, // code section, payload_len 11, one body
            0x09, 0x00, // body_size 9, no locals
            0x20, 0x00, 0x41, 0x2a, 0x6a, 0x21, 0x00, 0x0b, // code
        ]);
        buf
    }

    #[test]
    fn every_candidate_node_survives_mutation_and_fixup() {
        let buf = module_with_code();
        let reference = ModuleValue::decode(&buf).unwrap();
        let tree = ParseTree::build(&reference);
        let mut rng = SmallRng::seed_from_u64(1234);

        for tier in Tier::ALL {
            for &index in tree.bucket(tier) {
                let node = tree.node(index);
                for _ in 0..10 {
                    let mut module = ModuleValue::decode(&buf).unwrap();
                    mutate_node(&mut module, node, &mut rng, None).unwrap();
                    let encoded = module.encode().unwrap();
                    // Whatever the operator did, the container stays
                    // self-consistent: the output re-decodes completely.
                    let reparsed = ModuleValue::decode(&encoded).unwrap_or_else(|e| {
                        panic!("{} broke the container: {e}", node.path)
                    });
                    assert_eq!(reparsed.encode().unwrap(), encoded);
                }
            }
        }
    }

    #[test]
    fn overhang_nodes_are_never_mutated() {
        let mut buf = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        // Type section with one byte of overhang after its content.
        buf.extend_from_slice(&[0x01, 0x02, 0x00, 0xee]);
        let reference = ModuleValue::decode(&buf).unwrap();
        let tree = ParseTree::build(&reference);
        let overhang = tree
            .nodes()
            .iter()
            .find(|n| n.name == "overhang")
            .expect("an overhang node");
        let mut rng = SmallRng::seed_from_u64(5);

        let mut module = ModuleValue::decode(&buf).unwrap();
        mutate_node(&mut module, overhang, &mut rng, None).unwrap();
        assert_eq!(module.encode().unwrap(), buf);
    }
}
