// This module implements the unified addressable-location abstraction: StackSlot
// (a byte offset that is either already caller-frame-relative or still needs the
// total frame size of the current method added once that size is fixed),
// RegisterValue (a register bound to a value kind), AllocatableValue (the subset
// of locations a computed value may be assigned to), Location (the register-or-
// stack shape used by reference maps, with an optional sub-register byte offset
// for narrow values packed into wide vector registers), and DebugValue (the slot
// contents of deoptimization metadata: location, primitive constant, virtual
// object reference or the illegal placeholder). All of these are pure values;
// transformations like the caller/callee stack-slot views return new values and
// never mutate in place.

//! Value locations: registers, stack slots and metadata slot contents.

use std::fmt;

use super::arch::Register;
use super::kind::ValueKind;

/// A stack location.
///
/// `raw_offset` is relative to the caller's frame base when `add_frame_size`
/// is false, and relative to the stack pointer, pending addition of the total
/// frame size, when `add_frame_size` is true. The same physical slot is
/// addressed differently depending on whether the current method's frame size
/// has been fixed yet; [`StackSlot::as_out_arg`] and [`StackSlot::as_in_arg`]
/// convert between the two views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackSlot {
    pub kind: ValueKind,
    raw_offset: i32,
    add_frame_size: bool,
}

impl StackSlot {
    /// # Panics
    /// Panics when `raw_offset` is negative and `add_frame_size` is false:
    /// a resolved slot below the frame base is a programming error.
    pub fn new(kind: ValueKind, raw_offset: i32, add_frame_size: bool) -> Self {
        assert!(
            add_frame_size || raw_offset >= 0,
            "stack slot with negative caller-relative offset {raw_offset}"
        );
        Self {
            kind,
            raw_offset,
            add_frame_size,
        }
    }

    pub fn raw_offset(&self) -> i32 {
        self.raw_offset
    }

    /// Whether the total frame size must still be added to the raw offset.
    pub fn add_frame_size(&self) -> bool {
        self.add_frame_size
    }

    /// Resolved byte offset relative to the stack pointer once the frame
    /// size of the current method is known.
    ///
    /// # Panics
    /// Panics when the effective offset is negative.
    pub fn offset(&self, total_frame_size: i32) -> i32 {
        let offset = if self.add_frame_size {
            self.raw_offset + total_frame_size
        } else {
            self.raw_offset
        };
        assert!(
            offset >= 0,
            "stack slot {self} resolves to negative offset {offset} in frame of size {total_frame_size}"
        );
        offset
    }

    /// This slot as seen by the caller of the current method (an outgoing
    /// argument slot). No-op if already in that view.
    pub fn as_out_arg(&self) -> StackSlot {
        if self.add_frame_size {
            StackSlot::new(self.kind, self.raw_offset, false)
        } else {
            *self
        }
    }

    /// This slot as seen by the current method itself (an incoming argument
    /// slot, addressed past its own frame). No-op if already in that view.
    pub fn as_in_arg(&self) -> StackSlot {
        if self.add_frame_size {
            *self
        } else {
            StackSlot::new(self.kind, self.raw_offset, true)
        }
    }
}

impl fmt::Display for StackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.add_frame_size {
            if self.raw_offset >= 0 {
                write!(f, "stack:sp+{}", self.raw_offset)
            } else {
                write!(f, "stack:in{}", self.raw_offset)
            }
        } else {
            write!(f, "stack:out{}", self.raw_offset)
        }
    }
}

/// A register bound to a value kind.
///
/// Equality requires the same register and the same kind: the same physical
/// register holding a 32-bit integer and a reference are different values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterValue {
    pub register: Register,
    pub kind: ValueKind,
}

impl RegisterValue {
    pub fn new(register: Register, kind: ValueKind) -> Self {
        assert!(register.is_valid(), "cannot bind a value to noreg");
        Self { register, kind }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.register, self.kind.type_char())
    }
}

/// A location a computed value may be allocated to: a register or a stack
/// slot. Arbitrary constants are not allocatable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatableValue {
    Register(RegisterValue),
    Stack(StackSlot),
}

impl AllocatableValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            AllocatableValue::Register(r) => r.kind,
            AllocatableValue::Stack(s) => s.kind,
        }
    }
}

impl fmt::Display for AllocatableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocatableValue::Register(r) => r.fmt(f),
            AllocatableValue::Stack(s) => s.fmt(f),
        }
    }
}

/// A reference-map location: where a GC root lives at a program point.
///
/// The register form carries a sub-register byte offset so a narrow
/// reference packed into a wide vector register can still be described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Register {
        register: Register,
        /// Byte offset of the value within the register.
        offset: u16,
    },
    Stack {
        /// Frame-relative byte offset of the slot.
        offset: i32,
    },
}

impl Location {
    pub fn register(register: Register) -> Self {
        Location::Register {
            register,
            offset: 0,
        }
    }

    pub fn subregister(register: Register, offset: u16) -> Self {
        Location::Register { register, offset }
    }

    pub fn stack(offset: i32) -> Self {
        Location::Stack { offset }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Register {
                register,
                offset: 0,
            } => write!(f, "{register}"),
            Location::Register { register, offset } => write!(f, "{register}:{offset}"),
            Location::Stack { offset } => write!(f, "stack:{offset}"),
        }
    }
}

/// A boxed-free primitive constant: the kind plus the value bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveConstant {
    pub kind: ValueKind,
    /// Raw bits, sign-extended to 64 bits for integral kinds; IEEE-754 bits
    /// for `Float`/`Double`.
    pub bits: i64,
}

impl PrimitiveConstant {
    pub fn int(value: i32) -> Self {
        Self {
            kind: ValueKind::Int,
            bits: value as i64,
        }
    }

    pub fn long(value: i64) -> Self {
        Self {
            kind: ValueKind::Long,
            bits: value,
        }
    }

    pub fn double(value: f64) -> Self {
        Self {
            kind: ValueKind::Double,
            bits: value.to_bits() as i64,
        }
    }
}

impl fmt::Display for PrimitiveConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.bits, self.kind.type_char())
    }
}

/// Identifier of a virtual object within one `DebugInfo`'s pool.
///
/// Cyclic object graphs are expressed as id references into the pool, so
/// identity comparison is id equality and traversals terminate without a
/// visited set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualObjectId(pub u32);

impl fmt::Display for VirtualObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vobj#{}", self.0)
    }
}

/// Contents of one deoptimization-metadata slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugValue {
    /// The value lives in a register at this point.
    Register(RegisterValue),
    /// The value lives in a stack slot at this point.
    Stack(StackSlot),
    /// The value is a compile-time primitive constant.
    Constant(PrimitiveConstant),
    /// The value is the null reference.
    NullConstant,
    /// The value is an escaped object described by the containing
    /// `DebugInfo`'s virtual-object pool.
    Virtual(VirtualObjectId),
    /// Placeholder: second slot of a two-slot value, or a dead slot.
    Illegal,
}

impl DebugValue {
    /// Kind of the stored value where one is known locally. Virtual objects
    /// are references; illegal slots have the illegal kind.
    pub fn kind(&self) -> ValueKind {
        match self {
            DebugValue::Register(r) => r.kind,
            DebugValue::Stack(s) => s.kind,
            DebugValue::Constant(c) => c.kind,
            DebugValue::NullConstant | DebugValue::Virtual(_) => ValueKind::Object,
            DebugValue::Illegal => ValueKind::Illegal,
        }
    }
}

impl fmt::Display for DebugValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugValue::Register(r) => r.fmt(f),
            DebugValue::Stack(s) => s.fmt(f),
            DebugValue::Constant(c) => c.fmt(f),
            DebugValue::NullConstant => f.write_str("null"),
            DebugValue::Virtual(id) => id.fmt(f),
            DebugValue::Illegal => f.write_str("-"),
        }
    }
}
