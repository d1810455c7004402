// This module implements the immutable machine description consumed by the rest of
// the crate: Register (a value type identified by a dense number, with a separate
// machine encoding and a capability category), RegisterCategory (capability tag
// carrying the may-contain-reference flag used by GC root tracking), the memory
// barrier bit constants, and Architecture itself (ordered register table, native
// word kind, byte order, unaligned-access support, implicit barrier mask, call
// displacement offset and return-address size). The register table invariant is
// that register number equals table index, so register numbers can be used as
// direct array indices by the attribute tables and save layouts built elsewhere.
// One Architecture instance exists per target CPU family and lives for the
// process lifetime; nothing here is mutated after construction.

//! Target architecture description: registers, categories, barriers.

use std::fmt;

use super::kind::ValueKind;
use super::location::RegisterValue;

/// Memory barrier bit constants.
///
/// A barrier requirement is a bitmask over these; an architecture's implicit
/// barrier mask removes the bits its memory model already guarantees.
pub mod barriers {
    /// Loads are not reordered with subsequent loads.
    pub const LOAD_LOAD: u32 = 0x1;
    /// Loads are not reordered with subsequent stores.
    pub const LOAD_STORE: u32 = 0x2;
    /// Stores are not reordered with subsequent loads.
    pub const STORE_LOAD: u32 = 0x4;
    /// Stores are not reordered with subsequent stores.
    pub const STORE_STORE: u32 = 0x8;
}

/// Byte ordering of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Capability tag for a register: which class of values it can hold.
///
/// Equality is by name; categories are interned as `'static` data in the
/// back-end register tables.
#[derive(Debug, Clone, Copy, Eq)]
pub struct RegisterCategory {
    /// Category name, e.g. `"CPU"` or `"XMM"`.
    pub name: &'static str,
    /// Registers of this category may hold heap references and therefore
    /// participate in reference maps.
    pub may_contain_reference: bool,
}

impl PartialEq for RegisterCategory {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl std::hash::Hash for RegisterCategory {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for RegisterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A machine register.
///
/// A value type: equality and hashing use only `number`, which is unique and
/// dense within one [`Architecture`]. `encoding` is the bit pattern used in
/// machine instructions and may differ from `number`.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Register {
    /// Unique identifier; index into the architecture's register table.
    pub number: i16,
    /// Target-specific encoding in machine instructions.
    pub encoding: i16,
    /// Mnemonic, e.g. `"rax"`.
    pub name: &'static str,
    /// Capability category.
    pub category: RegisterCategory,
}

impl Register {
    /// Sentinel representing the absence of a register. Never appears in an
    /// architecture's register table.
    pub const NONE: Register = Register {
        number: -1,
        encoding: -1,
        name: "noreg",
        category: RegisterCategory {
            name: "NONE",
            may_contain_reference: false,
        },
    };

    pub const fn new(
        number: i16,
        encoding: i16,
        name: &'static str,
        category: RegisterCategory,
    ) -> Self {
        Self {
            number,
            encoding,
            name,
            category,
        }
    }

    /// Whether this is a real register rather than [`Register::NONE`].
    pub fn is_valid(&self) -> bool {
        self.number >= 0
    }

    /// Bind this register to a value kind.
    pub fn as_value(&self, kind: ValueKind) -> RegisterValue {
        RegisterValue::new(*self, kind)
    }
}

impl PartialEq for Register {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl std::hash::Hash for Register {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.number.hash(state);
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Immutable description of a CPU family.
///
/// One instance per target, built at startup and shared for the process
/// lifetime. The register table is dense: `registers[i].number == i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Architecture {
    /// Family name, e.g. `"AMD64"`.
    pub name: &'static str,
    /// Kind of a native machine word.
    pub word_kind: ValueKind,
    pub byte_order: ByteOrder,
    /// The target supports unaligned scalar memory accesses.
    pub unaligned_memory_access: bool,
    /// Ordered register table; index equals register number.
    pub registers: &'static [Register],
    /// Barrier bits the memory model already enforces; see [`barriers`].
    pub implicit_memory_barriers: u32,
    /// Offset of the displacement operand within a machine call instruction,
    /// used when patching call sites.
    pub machine_code_call_displacement_offset: i32,
    /// Size in bytes of the return address pushed by a call (0 on targets
    /// that use a link register).
    pub return_address_size: i32,
}

impl Architecture {
    /// # Panics
    /// Panics if the register table is not dense (some `registers[i].number != i`),
    /// since register numbers are used as direct array indices elsewhere.
    pub fn new(
        name: &'static str,
        word_kind: ValueKind,
        byte_order: ByteOrder,
        unaligned_memory_access: bool,
        registers: &'static [Register],
        implicit_memory_barriers: u32,
        machine_code_call_displacement_offset: i32,
        return_address_size: i32,
    ) -> Self {
        for (i, reg) in registers.iter().enumerate() {
            assert!(
                reg.number as usize == i,
                "register table not dense: {} has number {} at index {}",
                reg.name,
                reg.number,
                i
            );
        }
        Self {
            name,
            word_kind,
            byte_order,
            unaligned_memory_access,
            registers,
            implicit_memory_barriers,
            machine_code_call_displacement_offset,
            return_address_size,
        }
    }

    /// Size of a native machine word in bytes.
    pub fn word_size(&self) -> usize {
        self.word_kind.size_in_bytes()
    }

    /// Look up a register by number. Round-trips with [`Register::number`].
    pub fn register(&self, number: i16) -> Option<&Register> {
        if number < 0 {
            return None;
        }
        self.registers.get(number as usize)
    }

    /// The barriers that must actually be emitted for `required`, after
    /// removing what the memory model provides implicitly.
    pub fn required_barriers(&self, required: u32) -> u32 {
        required & !self.implicit_memory_barriers
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CPU: RegisterCategory = RegisterCategory {
        name: "CPU",
        may_contain_reference: true,
    };

    static TEST_REGS: [Register; 3] = [
        Register::new(0, 0, "r0", TEST_CPU),
        Register::new(1, 1, "r1", TEST_CPU),
        Register::new(2, 2, "r2", TEST_CPU),
    ];

    fn test_arch() -> Architecture {
        Architecture::new(
            "TEST",
            ValueKind::Long,
            ByteOrder::LittleEndian,
            true,
            &TEST_REGS,
            barriers::LOAD_LOAD | barriers::STORE_STORE,
            1,
            8,
        )
    }

    #[test]
    fn test_word_size_matches_word_kind() {
        let arch = test_arch();
        assert_eq!(arch.word_size(), arch.word_kind.size_in_bytes());
    }

    #[test]
    fn test_register_round_trip_by_number() {
        let arch = test_arch();
        for reg in arch.registers {
            assert_eq!(arch.register(reg.number), Some(reg));
        }
        assert_eq!(arch.register(-1), None);
        assert_eq!(arch.register(99), None);
    }

    #[test]
    fn test_required_barriers_masks_implicit() {
        let arch = test_arch();
        let all = barriers::LOAD_LOAD
            | barriers::LOAD_STORE
            | barriers::STORE_LOAD
            | barriers::STORE_STORE;
        assert_eq!(
            arch.required_barriers(all),
            barriers::LOAD_STORE | barriers::STORE_LOAD
        );
        assert_eq!(arch.required_barriers(barriers::LOAD_LOAD), 0);
    }

    #[test]
    #[should_panic(expected = "register table not dense")]
    fn test_sparse_register_table_rejected() {
        static SPARSE: [Register; 2] = [
            Register::new(0, 0, "r0", TEST_CPU),
            Register::new(5, 5, "r5", TEST_CPU),
        ];
        let _ = Architecture::new(
            "BAD",
            ValueKind::Long,
            ByteOrder::LittleEndian,
            true,
            &SPARSE,
            0,
            1,
            8,
        );
    }

    #[test]
    fn test_register_equality_is_by_number() {
        let a = Register::new(1, 7, "alias", TEST_CPU);
        let b = TEST_REGS[1];
        assert_eq!(a, b);
        assert!(!Register::NONE.is_valid());
        assert!(b.is_valid());
    }
}
