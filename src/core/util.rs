//! Bit-manipulation helpers shared by the metadata model and its tests.

/// Sign-extend the low `bits` bits of `value`.
///
/// # Panics
/// Panics unless `1 <= bits <= 64`.
pub fn sign_extend(value: i64, bits: u32) -> i64 {
    assert!((1..=64).contains(&bits), "bad bit width {bits}");
    if bits == 64 {
        return value;
    }
    let shift = 64 - bits;
    (value << shift) >> shift
}

/// Zero-extend the low `bits` bits of `value`.
///
/// The mask is computed in unsigned math so the full `1..=64` width range
/// is safe, 63 and 64 included.
///
/// # Panics
/// Panics unless `1 <= bits <= 64`.
pub fn zero_extend(value: i64, bits: u32) -> i64 {
    assert!((1..=64).contains(&bits), "bad bit width {bits}");
    (value as u64 & (u64::MAX >> (64 - bits))) as i64
}

/// Minimum signed value representable in `bits` bits.
pub fn min_value(bits: u32) -> i64 {
    assert!((1..=64).contains(&bits), "bad bit width {bits}");
    if bits == 64 {
        i64::MIN
    } else {
        -(1i64 << (bits - 1))
    }
}

/// Maximum signed value representable in `bits` bits.
pub fn max_value(bits: u32) -> i64 {
    assert!((1..=64).contains(&bits), "bad bit width {bits}");
    if bits == 64 {
        i64::MAX
    } else {
        (1i64 << (bits - 1)) - 1
    }
}

pub fn is_power_of_2(value: i64) -> bool {
    value > 0 && (value & (value - 1)) == 0
}

/// Base-2 logarithm of a power of two.
///
/// # Panics
/// Panics when `value` is not a positive power of two.
pub fn log2(value: i64) -> u32 {
    assert!(is_power_of_2(value), "log2 of non-power-of-2 {value}");
    63 - value.leading_zeros()
}

/// Round `value` up to a multiple of `alignment` (a power of two).
pub fn align_up(value: i64, alignment: i64) -> i64 {
    assert!(is_power_of_2(alignment), "bad alignment {alignment}");
    (value + alignment - 1) & !(alignment - 1)
}

pub fn is_aligned(value: i64, alignment: i64) -> bool {
    assert!(is_power_of_2(alignment), "bad alignment {alignment}");
    value & (alignment - 1) == 0
}
