//! Scalar and integer-list operators.
//!
//! Replacement values are always drawn from the target field's legal range:
//! unsigned fields get a small non-negative value, signed fields may also
//! get -1, and fixed-width fields get a full-width value masked to the
//! field. Length deltas are computed from the re-encoded sizes, so varint
//! growth and shrinkage propagate correctly.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::schema::{encoded_len, FieldSlot, FieldTy, Value};
use crate::Result;

fn width_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// A small unsigned value within the field width.
fn small_unsigned(bits: u32, rng: &mut SmallRng) -> u64 {
    let upper = width_mask(bits).min(127);
    rng.random_range(0..=upper)
}

/// A small signed value (including -1) within the field width.
fn small_signed(bits: u32, rng: &mut SmallRng) -> i64 {
    let upper = if bits >= 8 {
        127
    } else {
        (1i64 << (bits - 1)) - 1
    };
    rng.random_range(-1..=upper)
}

fn random_element(elem: &FieldTy, rng: &mut SmallRng, small: bool) -> Option<Value> {
    match elem {
        FieldTy::VarU(bits) => Some(Value::U64(small_unsigned(*bits, rng))),
        FieldTy::VarS(bits) => Some(Value::S64(small_signed(*bits, rng))),
        FieldTy::UIntN(bits) if small => Some(Value::U64(small_unsigned(*bits, rng))),
        FieldTy::UIntN(bits) => Some(Value::U64(rng.random::<u64>() & width_mask(*bits))),
        _ => None,
    }
}

/// Replace a standalone scalar field with a random in-range value.
/// Returns the length delta.
pub(crate) fn replace_scalar(slot: &mut FieldSlot, rng: &mut SmallRng) -> Result<isize> {
    let new = match slot.prod {
        FieldTy::VarU(bits) => Value::U64(small_unsigned(*bits, rng)),
        FieldTy::VarS(bits) => Value::S64(small_signed(*bits, rng)),
        FieldTy::UIntN(bits) => Value::U64(rng.random::<u64>() & width_mask(*bits)),
        _ => return Ok(0),
    };
    let delta = encoded_len(slot.prod, &new)? as isize - slot.len as isize;
    slot.value = new;
    Ok(delta)
}

/// Insert 1..=10 small random values at random positions of an integer
/// list. Returns the length delta.
pub(crate) fn insert_random_ints(slot: &mut FieldSlot, rng: &mut SmallRng) -> Result<isize> {
    let FieldTy::Repeat { elem, .. } = slot.prod else {
        return Ok(0);
    };
    let Value::List(items) = &mut slot.value else {
        return Ok(0);
    };
    let additions = rng.random_range(1..=10);
    let mut delta = 0isize;
    for _ in 0..additions {
        let Some(value) = random_element(elem, rng, true) else {
            return Ok(delta);
        };
        delta += encoded_len(elem, &value)? as isize;
        let index = rng.random_range(0..=items.len());
        items.insert(index, value);
    }
    Ok(delta)
}

/// Clone a random element of an integer list and insert the copy at a
/// random position. Returns the length delta.
pub(crate) fn clone_int(slot: &mut FieldSlot, rng: &mut SmallRng) -> Result<isize> {
    let FieldTy::Repeat { elem, .. } = slot.prod else {
        return Ok(0);
    };
    let Value::List(items) = &mut slot.value else {
        return Ok(0);
    };
    if items.is_empty() {
        return Ok(0);
    }
    let source = rng.random_range(0..items.len());
    let value = items[source].clone();
    let delta = encoded_len(elem, &value)? as isize;
    let index = rng.random_range(0..=items.len());
    items.insert(index, value);
    Ok(delta)
}

/// Remove a random element of an integer list, but never below four
/// elements. Returns the length delta.
pub(crate) fn remove_int(slot: &mut FieldSlot, rng: &mut SmallRng) -> Result<isize> {
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

/// Replace a random element of an integer list with a fresh in-range
/// value. Returns the length delta.
pub(crate) fn replace_int(slot: &mut FieldSlot, rng: &mut SmallRng) -> Result<isize> {
    let FieldTy::Repeat { elem, .. } = slot.prod else {
        return Ok(0);
    };
    let Value::List(items) = &mut slot.value else {
        return Ok(0);
    };
    if items.is_empty() {
        return Ok(0);
    }
    let Some(value) = random_element(elem, rng, false) else {
        return Ok(0);
    };
    let index = rng.random_range(0..items.len());
    let delta = encoded_len(elem, &value)? as isize - encoded_len(elem, &items[index])? as isize;
    items[index] = value;
    Ok(delta)
}
