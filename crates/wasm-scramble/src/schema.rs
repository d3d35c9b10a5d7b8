//! A declarative binary schema framework.
//!
//! Field descriptors are purely a (de)serialization mechanism: they describe
//! how to turn raw bytes into typed values and back, but never hold decoded
//! state themselves. All descriptors are statically constructed (`const`
//! tables in [`crate::module`]) and may be shared freely between decode
//! operations; per-decode state lives exclusively in the [`StructValue`]
//! produced by each decode call.
//!
//! Decoding a field yields a triple of consumed length, value, and the
//! *producing* descriptor: for conditional and tagged-union fields the
//! producer is the concrete alternative that was actually selected, and
//! re-encoding a value always goes through its producer. This is what makes
//! encoding order-preserving and byte-exact without re-deriving lengths.

use crate::module::{self, StructKind};
use crate::{Error, Result};

/// A length or count function evaluated against already-decoded siblings.
pub type DependentFn = fn(&StructValue) -> u64;

/// A presence predicate evaluated against already-decoded siblings.
pub type PredicateFn = fn(&StructValue) -> bool;

/// A named field within a structure's declaration-order field table.
#[derive(Debug)]
pub struct FieldDef {
    /// Field name, unique within its structure.
    pub name: &'static str,
    /// How the field is decoded and encoded.
    pub ty: FieldTy,
}

/// How to decode and encode one value.
#[derive(Debug, PartialEq)]
pub enum FieldTy {
    /// Fixed-width little-endian unsigned integer of 8, 16, 32 or 64 bits.
    UIntN(u32),
    /// Unsigned LEB128 holding at most the given number of significant bits.
    VarU(u32),
    /// Signed LEB128 holding at most the given number of significant bits.
    VarS(u32),
    /// Consumes and produces no bytes; always yields [`Value::Absent`].
    ///
    /// Also serves as the shared producer for absent conditional fields.
    Const,
    /// A run of raw bytes whose length depends on sibling fields.
    Bytes {
        /// Byte length, computed from previously decoded siblings.
        len: DependentFn,
        /// Whether to render the run as text in diagnostics.
        utf8: bool,
    },
    /// A field repeated a sibling-dependent number of times.
    ///
    /// An 8-bit element type short-circuits to a bulk byte copy.
    Repeat {
        /// Element descriptor.
        elem: &'static FieldTy,
        /// Repetition count, computed from previously decoded siblings.
        count: DependentFn,
    },
    /// A nested structure.
    Struct(StructKind),
    /// A field that is only present when the predicate holds.
    Cond {
        /// The field decoded when present.
        inner: &'static FieldTy,
        /// Presence predicate over previously decoded siblings.
        present: PredicateFn,
    },
    /// A tagged union: the selector picks one of several alternatives.
    Choice {
        /// Selector, computed from previously decoded siblings.
        tag: DependentFn,
        /// Alternatives, keyed by selector value.
        arms: &'static [(u64, FieldTy)],
        /// Fallback when no alternative matches; `None` makes an
        /// unmatched selector a hard decode error.
        default: Option<&'static FieldTy>,
    },
    /// An instruction run scanned up to and including the terminator opcode.
    Expr,
}

/// Shared producer for absent conditional and union fields.
pub static ABSENT: FieldTy = FieldTy::Const;

/// A decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unsigned scalar (fixed-width or unsigned varint).
    U64(u64),
    /// Signed varint scalar.
    S64(i64),
    /// Raw byte run.
    Bytes(Vec<u8>),
    /// Repeated non-byte elements.
    List(Vec<Value>),
    /// Nested structure instance.
    Struct(StructValue),
    /// Missing conditional or constant placeholder.
    Absent,
}

/// One decoded field slot: the value plus its mandatory decode metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    /// The decoded value.
    pub value: Value,
    /// Number of bytes the field consumed at decode time. Kept accurate by
    /// fix-up after mutations so re-encoding stays length-consistent.
    pub len: usize,
    /// The descriptor that actually produced the value.
    pub prod: &'static FieldTy,
}

/// One decoded structure instance: a slot per schema field, in declaration
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    /// Which structure this is an instance of.
    pub kind: StructKind,
    /// Decoded slots, parallel to `kind.fields()`.
    pub slots: Vec<FieldSlot>,
}

impl StructValue {
    /// Decode one structure instance from the start of `buf`.
    pub fn decode(kind: StructKind, buf: &[u8]) -> Result<(usize, StructValue)> {
        Self::decode_at(kind, buf, 0)
    }

    /// Decode one structure instance; `pos` is the absolute offset of
    /// `buf[0]`, used only for error reporting.
    pub fn decode_at(kind: StructKind, buf: &[u8], pos: usize) -> Result<(usize, StructValue)> {
        let fields = kind.fields();
        let mut value = StructValue {
            kind,
            slots: Vec::with_capacity(fields.len()),
        };
        let mut offset = 0;
        for field in fields {
            let (len, val, prod) = decode_field(&value, &field.ty, &buf[offset..], pos + offset)?;
            value.slots.push(FieldSlot {
                value: val,
                len,
                prod,
            });
            offset += len;
        }
        Ok((offset, value))
    }

    /// Re-encode this structure, field by field, through each slot's
    /// producing descriptor.
    pub fn encode(&self, sink: &mut Vec<u8>) -> Result<()> {
        for slot in &self.slots {
            encode_field(slot.prod, &slot.value, sink)?;
        }
        Ok(())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.kind.fields().iter().position(|f| f.name == name)
    }

    /// The slot for the named field, if it has been decoded.
    pub fn slot(&self, name: &str) -> Option<&FieldSlot> {
        self.slots.get(self.index_of(name)?)
    }

    /// The value of the named field, if it has been decoded.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.slot(name).map(|s| &s.value)
    }

    /// The named field as an unsigned scalar; 0 for anything else.
    ///
    /// Dependent-length functions only ever reference scalar siblings that
    /// decode before them, so the lossy fallback is unreachable on the
    /// schemas in this crate.
    pub fn u64(&self, name: &str) -> u64 {
        match self.value(name) {
            Some(Value::U64(v)) => *v,
            Some(Value::S64(v)) => *v as u64,
            _ => 0,
        }
    }

    /// Recorded byte length of the named field; 0 if not decoded.
    pub fn len_of(&self, name: &str) -> usize {
        self.slot(name).map_or(0, |s| s.len)
    }

    /// Element count of a repeated field, or byte count of a byte run.
    pub fn cardinality(&self, name: &str) -> usize {
        match self.value(name) {
            Some(Value::List(items)) => items.len(),
            Some(Value::Bytes(bytes)) => bytes.len(),
            _ => 0,
        }
    }

    /// Sum of all recorded slot lengths: the byte length this structure
    /// occupies when re-encoded.
    pub fn byte_len(&self) -> usize {
        self.slots.iter().map(|s| s.len).sum()
    }

    /// Overwrite a scalar field with `val`, re-encoding it through its
    /// producer to refresh the recorded length. Returns the length delta
    /// that the overwrite introduced.
    pub fn set_scalar(&mut self, name: &str, val: u64) -> Result<isize> {
        let index = self
            .index_of(name)
            .ok_or_else(|| Error::invariant(format!("no field `{name}` on {:?}", self.kind)))?;
        let slot = &mut self.slots[index];
        let mut tmp = Vec::new();
        encode_field(slot.prod, &Value::U64(val), &mut tmp)?;
        let delta = tmp.len() as isize - slot.len as isize;
        slot.value = Value::U64(val);
        slot.len = tmp.len();
        Ok(delta)
    }
}

/// Decode one field against the remaining buffer.
///
/// `ctx` is the partially decoded structure the field belongs to; dependent
/// functions see every sibling that decoded before this field. Returns
/// `(consumed, value, producer)`.
pub fn decode_field(
    ctx: &StructValue,
    ty: &'static FieldTy,
    buf: &[u8],
    pos: usize,
) -> Result<(usize, Value, &'static FieldTy)> {
    match ty {
        FieldTy::UIntN(bits) => {
            let n = (*bits / 8) as usize;
            let bytes = buf.get(..n).ok_or_else(|| Error::truncated(pos + buf.len()))?;
            let mut v = 0u64;
            for (i, b) in bytes.iter().enumerate() {
                v |= u64::from(*b) << (i * 8);
            }
            Ok((n, Value::U64(v), ty))
        }
        FieldTy::VarU(bits) => {
            let (n, v) = read_var_u(buf, *bits, pos)?;
            Ok((n, Value::U64(v), ty))
        }
        FieldTy::VarS(bits) => {
            let (n, v) = read_var_s(buf, *bits, pos)?;
            Ok((n, Value::S64(v), ty))
        }
        FieldTy::Const => Ok((0, Value::Absent, ty)),
        FieldTy::Bytes { len, .. } => {
            let n = len(ctx) as usize;
            let bytes = buf.get(..n).ok_or_else(|| Error::truncated(pos + buf.len()))?;
            Ok((n, Value::Bytes(bytes.to_vec()), ty))
        }
        FieldTy::Repeat { elem, count } => {
            let n = count(ctx) as usize;
            // Bulk copy for byte arrays.
            if matches!(elem, FieldTy::UIntN(8)) {
                let bytes = buf.get(..n).ok_or_else(|| Error::truncated(pos + buf.len()))?;
                return Ok((n, Value::Bytes(bytes.to_vec()), ty));
            }
            let mut offset = 0;
            let mut items = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                let (len, item, _) = decode_field(ctx, elem, &buf[offset..], pos + offset)?;
                offset += len;
                items.push(item);
            }
            Ok((offset, Value::List(items), ty))
        }
        FieldTy::Struct(kind) => {
            let (len, value) = StructValue::decode_at(*kind, buf, pos)?;
            Ok((len, Value::Struct(value), ty))
        }
        FieldTy::Cond { inner, present } => {
            if present(ctx) {
                decode_field(ctx, inner, buf, pos)
            } else {
                Ok((0, Value::Absent, &ABSENT))
            }
        }
        FieldTy::Choice { tag, arms, default } => {
            let t = tag(ctx);
            if let Some((_, arm)) = arms.iter().find(|(k, _)| *k == t) {
                decode_field(ctx, arm, buf, pos)
            } else if let Some(fallback) = default {
                decode_field(ctx, fallback, buf, pos)
            } else {
                Err(Error::unknown_tag(t, pos))
            }
        }
        FieldTy::Expr => {
            let n = module::scan_expr(buf, pos)?;
            Ok((n, Value::Bytes(buf[..n].to_vec()), ty))
        }
    }
}

/// Encode `value` through the descriptor that produced it, appending to
/// `sink`. The inverse of [`decode_field`]: byte-exact for unmutated values.
pub fn encode_field(ty: &FieldTy, value: &Value, sink: &mut Vec<u8>) -> Result<()> {
    match (ty, value) {
        (FieldTy::UIntN(bits), Value::U64(v)) => {
            let n = (*bits / 8) as usize;
            sink.extend_from_slice(&v.to_le_bytes()[..n]);
            Ok(())
        }
        (FieldTy::VarU(_), Value::U64(v)) => {
            leb128::write::unsigned(sink, *v).unwrap();
            Ok(())
        }
        (FieldTy::VarS(_), Value::S64(v)) => {
            leb128::write::signed(sink, *v).unwrap();
            Ok(())
        }
        (FieldTy::Const, _) | (_, Value::Absent) => Ok(()),
        (FieldTy::Bytes { .. }, Value::Bytes(bytes))
        | (FieldTy::Repeat { .. }, Value::Bytes(bytes))
        | (FieldTy::Expr, Value::Bytes(bytes)) => {
            sink.extend_from_slice(bytes);
            Ok(())
        }
        (FieldTy::Repeat { elem, .. }, Value::List(items)) => {
            for item in items {
                encode_field(elem, item, sink)?;
            }
            Ok(())
        }
        (FieldTy::Struct(_), Value::Struct(sv)) => sv.encode(sink),
        _ => Err(Error::invariant(format!(
            "cannot encode {value:?} through {ty:?}"
        ))),
    }
}

/// Byte length `value` occupies when encoded through `ty`.
pub fn encoded_len(ty: &FieldTy, value: &Value) -> Result<usize> {
    let mut tmp = Vec::new();
    encode_field(ty, value, &mut tmp)?;
    Ok(tmp.len())
}

/// Render a value for diagnostics.
pub fn describe(ty: &FieldTy, value: &Value) -> String {
    match (ty, value) {
        (FieldTy::UIntN(_), Value::U64(v)) => format!("{v:#x}"),
        (_, Value::U64(v)) if *v > 1000 => format!("{v:#x}"),
        (_, Value::U64(v)) => v.to_string(),
        (_, Value::S64(v)) => v.to_string(),
        (FieldTy::Bytes { utf8: true, .. }, Value::Bytes(b)) => match std::str::from_utf8(b) {
            Ok(s) => format!("{s:?}"),
            Err(_) => "<bad utf8>".to_string(),
        },
        (_, Value::Bytes(b)) if b.len() > 100 => "<too long>".to_string(),
        (_, Value::Bytes(b)) => format!("{b:02x?}"),
        (_, Value::List(items)) if items.len() > 100 => "<too long>".to_string(),
        (_, Value::List(items)) => format!("[{} items]", items.len()),
        (_, Value::Struct(sv)) => format!("{:?}", sv.kind),
        (_, Value::Absent) => "None".to_string(),
    }
}

/// Decode an unsigned LEB128 of at most `bits` significant bits.
///
/// Unlike a naive accumulate-until-clear-bit loop, this bounds the read at
/// `ceil(bits / 7)` groups and rejects set bits beyond the target width, so
/// a crafted unterminated continuation run cannot walk off the buffer.
pub(crate) fn read_var_u(buf: &[u8], bits: u32, pos: usize) -> Result<(usize, u64)> {
    let mut result = 0u64;
    let mut shift = 0u32;
    let mut consumed = 0usize;
    loop {
        if shift >= bits {
            // The continuation ran past the maximum group count.
            return Err(Error::malformed_varint(pos));
        }
        let byte = *buf
            .get(consumed)
            .ok_or_else(|| Error::truncated(pos + consumed))?;
        consumed += 1;
        let low = u64::from(byte & 0x7f);
        if shift + 7 > bits && (low >> (bits - shift)) != 0 {
            // Set bits beyond the target width.
            return Err(Error::malformed_varint(pos));
        }
        result |= low << shift;
        if byte & 0x80 == 0 {
            return Ok((consumed, result));
        }
        shift += 7;
    }
}

/// Decode a signed LEB128 of at most `bits` significant bits, sign-extended
/// from the final group's sign bit.
pub(crate) fn read_var_s(buf: &[u8], bits: u32, pos: usize) -> Result<(usize, i64)> {
    let max_groups = bits.div_ceil(7);
    let mut result = 0i64;
    let mut shift = 0u32;
    let mut consumed = 0usize;
    loop {
        let byte = *buf
            .get(consumed)
            .ok_or_else(|| Error::truncated(pos + consumed))?;
        consumed += 1;
        result |= i64::from(byte & 0x7f) << shift.min(63);
        if byte & 0x80 == 0 {
            let end = shift + 7;
            if end < 64 && byte & 0x40 != 0 {
                result |= -1i64 << end;
            }
            if bits < 64 {
                let min = -1i64 << (bits - 1);
                let max = (1i64 << (bits - 1)) - 1;
                if result < min || result > max {
                    return Err(Error::malformed_varint(pos));
                }
            }
            return Ok((consumed, result));
        }
        if consumed as u32 == max_groups {
            return Err(Error::malformed_varint(pos));
        }
        shift += 7;
    }
}
