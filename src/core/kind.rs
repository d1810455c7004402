//! Value kinds: the width and reference-ness of stored values.
//!
//! A [`ValueKind`] tags every location and every metadata slot with how wide
//! the stored value is and whether the garbage collector must treat it as a
//! root. `Illegal` is the explicit placeholder used for the upper half of
//! two-slot values in frame kind arrays and for padding runs in coalesced
//! byte-array writes.

use std::fmt;

/// Kind of a value held in a register, stack slot or metadata slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Float,
    Long,
    Double,
    /// A heap reference; locations of this kind are GC roots.
    Object,
    /// Placeholder occupying the second logical slot of a two-slot value,
    /// or a padding slot in a coalesced byte-array run.
    Illegal,
}

impl ValueKind {
    /// Size of the value in bytes. `Illegal` occupies no storage of its own.
    pub fn size_in_bytes(self) -> usize {
        match self {
            ValueKind::Boolean | ValueKind::Byte => 1,
            ValueKind::Short | ValueKind::Char => 2,
            ValueKind::Int | ValueKind::Float => 4,
            ValueKind::Long | ValueKind::Double | ValueKind::Object => 8,
            ValueKind::Illegal => 0,
        }
    }

    /// Number of logical interpreter slots this kind occupies.
    ///
    /// Two-slot kinds must be followed by an explicit [`ValueKind::Illegal`]
    /// in frame kind arrays; see the frame format validation.
    pub fn slot_count(self) -> usize {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            ValueKind::Illegal => 0,
            _ => 1,
        }
    }

    /// Whether locations of this kind hold GC roots.
    pub fn is_reference(self) -> bool {
        self == ValueKind::Object
    }

    /// Whether this is a concrete primitive kind (not a reference, not the
    /// illegal placeholder).
    pub fn is_primitive(self) -> bool {
        !matches!(self, ValueKind::Object | ValueKind::Illegal)
    }

    /// The primitive kind describing a native machine word of `size` bytes.
    ///
    /// # Panics
    /// Panics for word sizes other than 4 or 8.
    pub fn from_word_size(size: usize) -> Self {
        match size {
            4 => ValueKind::Int,
            8 => ValueKind::Long,
            _ => panic!("unsupported machine word size: {size}"),
        }
    }

    /// Single-character tag used in frame diagnostics.
    pub fn type_char(self) -> char {
        match self {
            ValueKind::Boolean => 'z',
            ValueKind::Byte => 'b',
            ValueKind::Short => 's',
            ValueKind::Char => 'c',
            ValueKind::Int => 'i',
            ValueKind::Float => 'f',
            ValueKind::Long => 'j',
            ValueKind::Double => 'd',
            ValueKind::Object => 'a',
            ValueKind::Illegal => '-',
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_slot_kinds() {
        assert_eq!(ValueKind::Long.slot_count(), 2);
        assert_eq!(ValueKind::Double.slot_count(), 2);
        assert_eq!(ValueKind::Int.slot_count(), 1);
        assert_eq!(ValueKind::Object.slot_count(), 1);
        assert_eq!(ValueKind::Illegal.slot_count(), 0);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(ValueKind::Byte.size_in_bytes(), 1);
        assert_eq!(ValueKind::Char.size_in_bytes(), 2);
        assert_eq!(ValueKind::Float.size_in_bytes(), 4);
        assert_eq!(ValueKind::Double.size_in_bytes(), 8);
    }

    #[test]
    fn test_word_kind_round_trip() {
        let kind = ValueKind::from_word_size(8);
        assert_eq!(kind.size_in_bytes(), 8);
        let kind = ValueKind::from_word_size(4);
        assert_eq!(kind.size_in_bytes(), 4);
    }

    #[test]
    fn test_reference_classification() {
        assert!(ValueKind::Object.is_reference());
        assert!(!ValueKind::Long.is_reference());
        assert!(ValueKind::Int.is_primitive());
        assert!(!ValueKind::Object.is_primitive());
        assert!(!ValueKind::Illegal.is_primitive());
    }
}
