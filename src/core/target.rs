//! Target description: architecture plus platform policy.

use std::fmt;

use super::arch::Architecture;
use super::kind::ValueKind;

/// Everything the rest of the system needs to know about the compilation
/// target: the CPU family plus the platform policy knobs that are not
/// properties of the instruction set.
///
/// One instance per compilation session; immutable; equality compares all
/// fields including the nested architecture.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDescription {
    pub arch: Architecture,
    /// The VM runs on a multiprocessor, so emitted barriers matter.
    pub is_mp: bool,
    /// Objects may be encoded inline in compressed form.
    pub inline_objects: bool,
    /// Derived from the architecture's word kind.
    pub word_size: usize,
    /// Kind of a native machine word.
    pub word_kind: ValueKind,
    /// Required stack alignment in bytes at call sites.
    pub stack_alignment: i32,
    /// Maximum displacement for which a memory access can rely on an
    /// implicit null check (trap on access) instead of an explicit test.
    pub implicit_null_check_limit: i32,
}

impl TargetDescription {
    pub fn new(
        arch: Architecture,
        is_mp: bool,
        inline_objects: bool,
        stack_alignment: i32,
        implicit_null_check_limit: i32,
    ) -> Self {
        let word_kind = arch.word_kind;
        let word_size = arch.word_size();
        Self {
            arch,
            is_mp,
            inline_objects,
            word_size,
            word_kind,
            stack_alignment,
            implicit_null_check_limit,
        }
    }
}

impl fmt::Display for TargetDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (word={}B, align={}, mp={})",
            self.arch, self.word_size, self.stack_alignment, self.is_mp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arch::{ByteOrder, Register, RegisterCategory};

    const CPU: RegisterCategory = RegisterCategory {
        name: "CPU",
        may_contain_reference: true,
    };

    static REGS: [Register; 1] = [Register::new(0, 0, "r0", CPU)];

    fn arch() -> Architecture {
        Architecture::new(
            "TEST",
            ValueKind::Long,
            ByteOrder::LittleEndian,
            true,
            &REGS,
            0,
            1,
            8,
        )
    }

    #[test]
    fn test_word_fields_derived_from_architecture() {
        let target = TargetDescription::new(arch(), true, false, 16, 4096);
        assert_eq!(target.word_size, 8);
        assert_eq!(target.word_kind, ValueKind::Long);
    }

    #[test]
    fn test_equality_includes_all_fields() {
        let a = TargetDescription::new(arch(), true, false, 16, 4096);
        let b = TargetDescription::new(arch(), true, false, 16, 4096);
        assert_eq!(a, b);
        let c = TargetDescription::new(arch(), false, false, 16, 4096);
        assert_ne!(a, c);
        let d = TargetDescription::new(arch(), true, false, 16, 2048);
        assert_ne!(a, d);
    }
}
