//! Instruction-stream operators.
//!
//! The code byte run is decoded into a sequence of `(opcode, operand,
//! offset)` records using static opcode category tables, edited at record
//! granularity, and re-encoded. Working on the structured sequence instead
//! of a textual rendering keeps offsets exact by construction.
//!
//! The categories model the target instruction set's operand shapes:
//! variable, memory, and const instructions carry a one-byte operand;
//! numeric instructions carry none. Opcodes outside all categories pass
//! through as operand-free records.

use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::Rng;

/// Variable-access opcodes, one-byte operand.
const VARIABLE_OPCODES: &[u8] = &[0x20, 0x21, 0x22, 0x23, 0x24];

/// Memory-access opcodes, one-byte operand.
const MEMORY_OPCODES: &[u8] = &[
    0x28, 0x29, 0x2a, 0x2b, 0x2c, 0x2d, 0x2e, 0x2f, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37,
    0x38, 0x39, 0x3a, 0x3b, 0x3c, 0x3d, 0x3e,
];

/// Constant-materializing opcodes, one-byte operand.
const CONST_OPCODES: &[u8] = &[0x41, 0x42, 0x43, 0x44];

/// Operand-free numeric opcode range.
const NUMERIC_RANGE: std::ops::RangeInclusive<u8> = 0x45..=0xbf;

/// Operand-shape categories of the instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsnClass {
    Variable,
    Memory,
    Const,
    Numeric,
}

const ALL_CLASSES: [InsnClass; 4] = [
    InsnClass::Variable,
    InsnClass::Memory,
    InsnClass::Const,
    InsnClass::Numeric,
];

impl InsnClass {
    fn contains(self, opcode: u8) -> bool {
        match self {
            InsnClass::Variable => VARIABLE_OPCODES.contains(&opcode),
            InsnClass::Memory => MEMORY_OPCODES.contains(&opcode),
            InsnClass::Const => CONST_OPCODES.contains(&opcode),
            InsnClass::Numeric => NUMERIC_RANGE.contains(&opcode),
        }
    }

    fn has_operand(self) -> bool {
        !matches!(self, InsnClass::Numeric)
    }

    fn random_opcode(self, rng: &mut SmallRng) -> u8 {
        match self {
            InsnClass::Variable => *VARIABLE_OPCODES.choose(rng).unwrap(),
            InsnClass::Memory => *MEMORY_OPCODES.choose(rng).unwrap(),
            InsnClass::Const => *CONST_OPCODES.choose(rng).unwrap(),
            InsnClass::Numeric => rng.random_range(NUMERIC_RANGE),
        }
    }
}

fn takes_operand(opcode: u8) -> bool {
    VARIABLE_OPCODES.contains(&opcode)
        || MEMORY_OPCODES.contains(&opcode)
        || CONST_OPCODES.contains(&opcode)
}

/// One decoded instruction record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    /// The opcode byte.
    pub opcode: u8,
    /// The one-byte operand, for categories that carry one.
    pub operand: Option<u8>,
    /// Byte offset of the opcode within the stream it was decoded from.
    pub offset: usize,
}

/// Partition a byte run into instruction records.
pub fn decode_stream(bytes: &[u8]) -> Vec<Insn> {
    let mut insns = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let opcode = bytes[offset];
        let mut len = 1;
        let operand = if takes_operand(opcode) && offset + 1 < bytes.len() {
            len = 2;
            Some(bytes[offset + 1])
        } else {
            None
        };
        insns.push(Insn {
            opcode,
            operand,
            offset,
        });
        offset += len;
    }
    insns
}

/// Re-serialize instruction records back into a byte run.
pub fn encode_stream(insns: &[Insn]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(insns.len() * 2);
    for insn in insns {
        bytes.push(insn.opcode);
        if let Some(operand) = insn.operand {
            bytes.push(operand);
        }
    }
    bytes
}

fn random_insn(rng: &mut SmallRng) -> Insn {
    let class = *ALL_CLASSES.choose(rng).unwrap();
    Insn {
        opcode: class.random_opcode(rng),
        operand: class.has_operand().then(|| rng.random()),
        offset: 0,
    }
}

fn first_of_class(insns: &[Insn], class: InsnClass) -> Option<usize> {
    insns.iter().position(|i| class.contains(i.opcode))
}

/// Insert a random instruction of a random category at a random record
/// boundary.
fn insert_instruction(insns: &mut Vec<Insn>, rng: &mut SmallRng) {
    let insn = random_insn(rng);
    let at = rng.random_range(0..=insns.len());
    insns.insert(at, insn);
}

/// Erase the first instruction of a random category, if any.
fn erase_instruction(insns: &mut Vec<Insn>, rng: &mut SmallRng) {
    let class = *ALL_CLASSES.choose(rng).unwrap();
    if let Some(index) = first_of_class(insns, class) {
        insns.remove(index);
    }
}

/// Move the first instruction of a random category to a random record
/// boundary.
fn move_instruction(insns: &mut Vec<Insn>, rng: &mut SmallRng) {
    let class = *ALL_CLASSES.choose(rng).unwrap();
    if let Some(index) = first_of_class(insns, class) {
        let insn = insns.remove(index);
        let at = rng.random_range(0..=insns.len());
        insns.insert(at, insn);
    }
}

/// Apply one random instruction-stream operator to a code byte run.
/// Returns the length delta.
pub(crate) fn mutate_instruction_stream(bytes: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if bytes.len() < 4 {
        return 0;
    }
    let mut insns = decode_stream(bytes);
    match rng.random_range(0..3u32) {
        0 => insert_instruction(&mut insns, rng),
        1 => erase_instruction(&mut insns, rng),
        _ => move_instruction(&mut insns, rng),
    }
    let encoded = encode_stream(&insns);
    let delta = encoded.len() as isize - bytes.len() as isize;
    *bytes = encoded;
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn decode_tracks_offsets_and_operands() {
        // local.get 0, i32.const 1, i32.add, end
        let bytes = [0x20, 0x00, 0x41, 0x01, 0x6a, 0x0b];
        let insns = decode_stream(&bytes);
        assert_eq!(insns.len(), 4);
        assert_eq!(
            insns[0],
            Insn {
                opcode: 0x20,
                operand: Some(0x00),
                offset: 0
            }
        );
        assert_eq!(insns[1].offset, 2);
        assert_eq!(insns[2], Insn { opcode: 0x6a, operand: None, offset: 4 });
        assert_eq!(encode_stream(&insns), bytes);
    }

    #[test]
    fn truncated_operand_still_decodes() {
        // A lone operand-taking opcode at the end of the stream.
        let insns = decode_stream(&[0x6a, 0x20]);
        assert_eq!(insns.len(), 2);
        assert_eq!(insns[1].operand, None);
        assert_eq!(encode_stream(&insns), [0x6a, 0x20]);
    }

    #[test]
    fn erase_removes_the_first_category_match() {
        let mut insns = decode_stream(&[0x41, 0x01, 0x42, 0x02, 0x0b]);
        if let Some(index) = first_of_class(&insns, InsnClass::Const) {
            insns.remove(index);
        }
        assert_eq!(encode_stream(&insns), [0x42, 0x02, 0x0b]);
    }

    #[test]
    fn mutation_keeps_record_alignment() {
        let mut rng = SmallRng::seed_from_u64(17);
        for _ in 0..200 {
            let mut bytes = vec![0x20, 0x00, 0x41, 0x2a, 0x6a, 0x21, 0x01, 0x0b];
            let before = bytes.len() as isize;
            let delta = mutate_instruction_stream(&mut bytes, &mut rng);
            assert_eq!(bytes.len() as isize - before, delta);
            // Re-decoding and re-encoding the mutated stream is stable:
            // every edit happened at a record boundary.
            assert_eq!(encode_stream(&decode_stream(&bytes)), bytes);
        }
    }

    #[test]
    fn short_streams_are_left_alone() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut bytes = vec![0x41, 0x0b];
        assert_eq!(mutate_instruction_stream(&mut bytes, &mut rng), 0);
        assert_eq!(bytes, [0x41, 0x0b]);
    }
}
