//! Parse-tree construction, leveling, and fix-up propagation.
//!
//! A decoded [`ModuleValue`] is expanded into a flat arena of addressable
//! nodes. Instead of parent back-pointers into the mutable value tree, each
//! node records the step path from its section root; fix-up re-walks that
//! path, which keeps bottom-up length propagation free of aliasing.

use crate::module::ModuleValue;
use crate::schema::{FieldSlot, FieldTy, StructValue, Value};
use crate::{Error, Result};

/// One link in a node's path from its section root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Index into a structure's slot table.
    Field(usize),
    /// Index into a repeated field's element list.
    Elem(usize),
}

/// Fuzz granularity tiers, bucketed by path-segment count. Shallow tiers
/// edit whole subsections or arrays; deep tiers edit single scalars or byte
/// runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Two path segments: top-level section fields.
    First,
    /// Three segments: section payload fields.
    Second,
    /// Four segments.
    Third,
    /// Five segments.
    Fourth,
    /// Anything deeper.
    Deeper,
}

impl Tier {
    /// All tiers, in depth order. Each tier is one selection-policy arm.
    pub const ALL: [Tier; 5] = [
        Tier::First,
        Tier::Second,
        Tier::Third,
        Tier::Fourth,
        Tier::Deeper,
    ];

    /// Arm index of this tier.
    pub fn index(self) -> usize {
        match self {
            Tier::First => 0,
            Tier::Second => 1,
            Tier::Third => 2,
            Tier::Fourth => 3,
            Tier::Deeper => 4,
        }
    }

    fn of_segments(segments: usize) -> Tier {
        match segments {
            0..=2 => Tier::First,
            3 => Tier::Second,
            4 => Tier::Third,
            5 => Tier::Fourth,
            _ => Tier::Deeper,
        }
    }
}

/// One addressable node of the mutation-time tree view.
#[derive(Debug)]
pub struct Node {
    /// Index of the owning section in [`ModuleValue::sections`].
    pub section: usize,
    /// Path from the section root to this node's slot.
    pub steps: Vec<Step>,
    /// Dot/bracket-joined path, e.g. `section.payload.entries[2].field_str`.
    pub path: String,
    /// The field name of this node.
    pub name: &'static str,
    /// Number of path segments.
    pub segments: usize,
    /// The descriptor that produced this node's value; `None` for structure
    /// nodes, which are never mutated directly.
    pub prod: Option<&'static FieldTy>,
    /// Whether the node sits inside a code or data region.
    pub in_code_or_data: bool,
}

/// The flat, leveled node arena for one decoded module.
#[derive(Debug, Default)]
pub struct ParseTree {
    nodes: Vec<Node>,
    buckets: [Vec<usize>; 5],
}

impl ParseTree {
    /// Expand a decoded module into its node arena.
    pub fn build(module: &ModuleValue) -> ParseTree {
        let mut tree = ParseTree::default();
        for (index, section) in module.sections.iter().enumerate() {
            tree.walk_struct(section, index, &[], "section", 1, false);
        }
        tree
    }

    /// All nodes, in discovery order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Mutation candidates in the given tier.
    pub fn bucket(&self, tier: Tier) -> &[usize] {
        &self.buckets[tier.index()]
    }

    /// The node with the given arena index.
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    fn push(&mut self, node: Node) {
        // Structure and instruction-expression nodes are addressable for
        // path purposes but never picked for mutation.
        let mutable = node.prod.is_some_and(|p| !matches!(p, FieldTy::Expr));
        if mutable {
            let tier = Tier::of_segments(node.segments);
            self.buckets[tier.index()].push(self.nodes.len());
        }
        self.nodes.push(node);
    }

    fn walk_struct(
        &mut self,
        value: &StructValue,
        section: usize,
        steps: &[Step],
        path: &str,
        segments: usize,
        in_code_or_data: bool,
    ) {
        self.push(Node {
            section,
            steps: steps.to_vec(),
            path: path.to_string(),
            name: "",
            segments,
            prod: None,
            in_code_or_data,
        });
        let fields = value.kind.fields();
        for (index, (field, slot)) in fields.iter().zip(&value.slots).enumerate() {
            let mut child_steps = steps.to_vec();
            child_steps.push(Step::Field(index));
            let child_path = format!("{path}.{}", field.name);
            let child_segments = segments + 1;
            let in_region =
                in_code_or_data || field.name == "code" || field.name == "data";
            match &slot.value {
                Value::Struct(inner) => {
                    self.walk_struct(
                        inner,
                        section,
                        &child_steps,
                        &child_path,
                        child_segments,
                        in_region,
                    );
                }
                Value::List(items) => {
                    self.push(Node {
                        section,
                        steps: child_steps.clone(),
                        path: child_path.clone(),
                        name: field.name,
                        segments: child_segments,
                        prod: Some(slot.prod),
                        in_code_or_data: in_region,
                    });
                    for (elem, item) in items.iter().enumerate() {
                        if let Value::Struct(inner) = item {
                            let mut elem_steps = child_steps.clone();
                            elem_steps.push(Step::Elem(elem));
                            let elem_path = format!("{path}.{}[{elem}]", field.name);
                            self.walk_struct(
                                inner,
                                section,
                                &elem_steps,
                                &elem_path,
                                child_segments,
                                in_region,
                            );
                        }
                    }
                }
                _ => {
                    self.push(Node {
                        section,
                        steps: child_steps,
                        path: child_path,
                        name: field.name,
                        segments: child_segments,
                        prod: Some(slot.prod),
                        in_code_or_data: in_region,
                    });
                }
            }
        }
    }
}

/// Resolve a node's step path to its field slot within a section.
pub fn resolve_slot_mut<'a>(
    section: &'a mut StructValue,
    steps: &[Step],
) -> Result<&'a mut FieldSlot> {
    let Some((Step::Field(first), rest)) = steps.split_first() else {
        return Err(Error::invariant("node path must start at a field"));
    };
    let slot = section
        .slots
        .get_mut(*first)
        .ok_or_else(|| Error::invariant("node path escapes its structure"))?;
    if rest.is_empty() {
        return Ok(slot);
    }
    match rest.split_first() {
        Some((Step::Elem(elem), deeper)) => {
            let Value::List(items) = &mut slot.value else {
                return Err(Error::invariant("element step into a non-list value"));
            };
            let Some(Value::Struct(inner)) = items.get_mut(*elem) else {
                return Err(Error::invariant("element step to a non-structure item"));
            };
            resolve_slot_mut(inner, deeper)
        }
        _ => {
            let Value::Struct(inner) = &mut slot.value else {
                return Err(Error::invariant("field step into a non-structure value"));
            };
            resolve_slot_mut(inner, rest)
        }
    }
}

/// Propagate a mutation's length delta from the mutated slot up to the
/// section root.
///
/// Bottom-up: the mutated slot's recorded length absorbs the delta first,
/// then every ancestor structure adds the running delta to its child slot
/// and re-runs its `fix` hook. A `fix` hook that grows or shrinks a derived
/// scalar feeds that extra delta into the ancestors above it. Invoking this
/// twice on an already-consistent tree is a no-op.
pub fn propagate_fix(section: &mut StructValue, steps: &[Step], delta: isize) -> Result<()> {
    fix_walk(section, steps, delta)?;
    Ok(())
}

fn fix_walk(value: &mut StructValue, steps: &[Step], mut delta: isize) -> Result<isize> {
    match steps.split_first() {
        None => {
            let kind = value.kind;
            delta += kind.fix(value)?;
            Ok(delta)
        }
        Some((Step::Field(index), rest)) => {
            if !rest.is_empty() {
                delta = match rest.split_first() {
                    Some((Step::Elem(elem), deeper)) => {
                        let slot = value
                            .slots
                            .get_mut(*index)
                            .ok_or_else(|| Error::invariant("fix-up path escapes its structure"))?;
                        let Value::List(items) = &mut slot.value else {
                            return Err(Error::invariant("element step into a non-list value"));
                        };
                        let Some(Value::Struct(inner)) = items.get_mut(*elem) else {
                            return Err(Error::invariant("element step to a non-structure item"));
                        };
                        fix_walk(inner, deeper, delta)?
                    }
                    _ => {
                        let slot = value
                            .slots
                            .get_mut(*index)
                            .ok_or_else(|| Error::invariant("fix-up path escapes its structure"))?;
                        let Value::Struct(inner) = &mut slot.value else {
                            return Err(Error::invariant("field step into a non-structure value"));
                        };
                        fix_walk(inner, rest, delta)?
                    }
                };
            }
            let slot = value
                .slots
                .get_mut(*index)
                .ok_or_else(|| Error::invariant("fix-up path escapes its structure"))?;
            let new_len = slot.len as isize + delta;
            if new_len < 0 {
                return Err(Error::invariant(format!(
                    "fix-up would make a recorded length negative ({} {delta:+})",
                    slot.len
                )));
            }
            slot.len = new_len as usize;
            let kind = value.kind;
            delta += kind.fix(value)?;
            Ok(delta)
        }
        Some((Step::Elem(_), _)) => Err(Error::invariant("node path cannot start at an element")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleValue;
    use crate::schema::encoded_len;

    /// Header plus a function section with three entries.
    fn three_functions() -> Vec<u8> {
        let mut buf = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        buf.extend_from_slice(&[0x03, 0x04, 0x03, 0x00, 0x01, 0x02]);
        buf
    }

    #[test]
    fn nodes_are_bucketed_by_path_depth() {
        let module = ModuleValue::decode(&three_functions()).unwrap();
        let tree = ParseTree::build(&module);

        let paths: Vec<&str> = tree.nodes().iter().map(|n| n.path.as_str()).collect();
        assert!(paths.contains(&"section.id"));
        assert!(paths.contains(&"section.payload.types"));

        // Section-level scalar fields land in the shallowest tier.
        let first: Vec<&str> = tree
            .bucket(Tier::First)
            .iter()
            .map(|&i| tree.node(i).path.as_str())
            .collect();
        assert!(first.contains(&"section.id"));
        assert!(first.contains(&"section.payload_len"));

        // Payload fields one segment deeper.
        let second: Vec<&str> = tree
            .bucket(Tier::Second)
            .iter()
            .map(|&i| tree.node(i).path.as_str())
            .collect();
        assert_eq!(second, ["section.payload.count", "section.payload.types"]);

        // Structure nodes exist for path purposes but are never candidates.
        assert!(tree.nodes().iter().any(|n| n.prod.is_none()));
        for tier in Tier::ALL {
            for &index in tree.bucket(tier) {
                assert!(tree.node(index).prod.is_some());
            }
        }
    }

    #[test]
    fn code_paths_are_flagged() {
        let mut buf = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        buf.extend_from_slice(&[
            0x0a, 0x06, 0x01, // code section, one body
            0x04, 0x00, 0x01, 0x01, 0x0b, // body_size 4, no locals, nop nop end
        ]);
        let module = ModuleValue::decode(&buf).unwrap();
        let tree = ParseTree::build(&module);
        let code = tree
            .nodes()
            .iter()
            .find(|n| n.path == "section.payload.bodies[0].code")
            .unwrap();
        assert!(code.in_code_or_data);
        let count = tree
            .nodes()
            .iter()
            .find(|n| n.path == "section.payload.count")
            .unwrap();
        assert!(!count.in_code_or_data);
    }

    #[test]
    fn appended_element_propagates_into_count_and_payload_len() {
        let module = ModuleValue::decode(&three_functions()).unwrap();
        let mut section = module.sections[0].clone();

        // Append a fourth element to `types` by hand, then fix up.
        let steps = vec![Step::Field(4), Step::Field(1)];
        let slot = resolve_slot_mut(&mut section, &steps).unwrap();
        let delta = {
            let Value::List(items) = &mut slot.value else {
                panic!("expected the types list");
            };
            let cloned = items[0].clone();
            let FieldTy::Repeat { elem, .. } = slot.prod else {
                panic!("expected a repeat descriptor");
            };
            let delta = encoded_len(elem, &cloned).unwrap() as isize;
            items.push(cloned);
            delta
        };
        propagate_fix(&mut section, &steps, delta).unwrap();

        // The count field, the section payload length, and the re-decoded
        // shape all agree with the new cardinality.
        let Some(Value::Struct(payload)) = section.value("payload") else {
            panic!("expected a function section payload");
        };
        assert_eq!(payload.u64("count"), 4);
        assert_eq!(section.u64("payload_len"), 5);

        let mut bytes = Vec::new();
        section.encode(&mut bytes).unwrap();
        let (len, reparsed) =
            StructValue::decode(crate::module::StructKind::Section, &bytes).unwrap();
        assert_eq!(len, bytes.len());
        let Some(Value::Struct(reparsed_payload)) = reparsed.value("payload") else {
            panic!("expected a function section payload");
        };
        assert_eq!(reparsed_payload.cardinality("types"), 4);
    }

    #[test]
    fn propagation_is_idempotent() {
        let module = ModuleValue::decode(&three_functions()).unwrap();
        let mut section = module.sections[0].clone();
        let steps = vec![Step::Field(4), Step::Field(1)];
        propagate_fix(&mut section, &steps, 0).unwrap();
        propagate_fix(&mut section, &steps, 0).unwrap();
        assert_eq!(section, module.sections[0]);
    }

    #[test]
    fn negative_length_is_an_invariant_violation() {
        let module = ModuleValue::decode(&three_functions()).unwrap();
        let mut section = module.sections[0].clone();
        let err = propagate_fix(&mut section, &[Step::Field(0)], -100).unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::ErrorKind::InvariantViolation(_)
        ));
    }
}
