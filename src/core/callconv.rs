// This module fixes the shape of calling-convention derivation without fixing any
// architecture's assignment policy. RegisterConfig is the capability trait a back
// end implements: it answers which registers are eligible for parameter passing
// per call type and value kind, which register returns a value of a given kind,
// which registers are allocatable/caller-saved/callee-saved, and it derives a
// CallingConvention for a full parameter list by consuming its per-kind parameter
// register lists left to right and overflowing to stack slots. CallingConvention
// is the result shape: one ordered location per actual parameter (receiver
// already prepended by the caller for instance methods), an optional return
// location (None marks void), and the outgoing stack space the call site needs.
// RegisterAttributes is the dense per-register-number classification table
// derived from a configuration; unclassified registers get the neutral NONE
// attribute.

//! Calling-convention derivation and register-role classification.

use std::fmt;

use super::arch::{Architecture, Register};
use super::kind::ValueKind;
use super::location::AllocatableValue;
use super::meta::MethodHandle;

/// The kind of call a convention is derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// A call between compiled methods, seen from the caller: outgoing
    /// argument slots are addressed within the caller's frame.
    Standard,
    /// The same convention seen from the callee: incoming argument slots
    /// are addressed past the callee's own frame.
    StandardCallee,
    /// A call into the platform's native ABI.
    Native,
}

impl CallType {
    /// Whether stack arguments are addressed as incoming (callee view,
    /// frame size still to be added) rather than outgoing slots.
    pub fn is_callee_view(self) -> bool {
        matches!(self, CallType::StandardCallee)
    }
}

/// The result of calling-convention derivation for one call site.
///
/// Every argument location is a register or a stack slot by construction;
/// arbitrary constants are not representable here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallingConvention {
    /// One location per actual parameter, in consumption order. Includes the
    /// implicit receiver for instance-method conventions.
    pub arguments: Vec<AllocatableValue>,
    /// Location of the return value; `None` for void.
    pub return_location: Option<AllocatableValue>,
    /// Outgoing stack space in bytes the call site must reserve.
    pub stack_size: i32,
}

impl CallingConvention {
    pub fn new(
        arguments: Vec<AllocatableValue>,
        return_location: Option<AllocatableValue>,
        stack_size: i32,
    ) -> Self {
        assert!(stack_size >= 0, "negative outgoing stack size {stack_size}");
        Self {
            arguments,
            return_location,
            stack_size,
        }
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallingConvention[")?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            arg.fmt(f)?;
        }
        f.write_str("]")?;
        match &self.return_location {
            Some(ret) => write!(f, " -> {ret}"),
            None => f.write_str(" -> void"),
        }
    }
}

/// Classification of one register by a [`RegisterConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterAttributes {
    /// Available to the register allocator.
    pub allocatable: bool,
    /// Clobbered across calls; the caller must save it if live.
    pub caller_saved: bool,
    /// Preserved across calls; a callee using it must spill and restore it.
    pub callee_saved: bool,
}

impl RegisterAttributes {
    /// The neutral attribute for registers a configuration does not
    /// classify (e.g. the stack pointer).
    pub const NONE: RegisterAttributes = RegisterAttributes {
        allocatable: false,
        caller_saved: false,
        callee_saved: false,
    };

    /// Build the dense attribute table for `arch`, indexed by register
    /// number. Unclassified registers get [`RegisterAttributes::NONE`].
    pub fn build(config: &dyn RegisterConfig, arch: &Architecture) -> Vec<RegisterAttributes> {
        let mut map = vec![RegisterAttributes::NONE; arch.registers.len()];
        for reg in config.allocatable_registers() {
            map[reg.number as usize].allocatable = true;
        }
        for reg in config.caller_saved_registers() {
            map[reg.number as usize].caller_saved = true;
        }
        for reg in config.callee_saved_registers() {
            map[reg.number as usize].callee_saved = true;
        }
        map
    }
}

/// Capability set describing how a back end uses its registers.
///
/// The exact register-assignment policy (which kinds use which registers,
/// padding rules) belongs to the implementing back end. This trait fixes
/// only the shape of the result and the left-to-right consumption order
/// over the possibly-receiver-prefixed parameter list.
pub trait RegisterConfig {
    /// Derive the convention for a call with the given return kind and
    /// parameter kinds. The receiver, when any, is already the first
    /// parameter kind. `return_kind == None` marks a void call.
    fn call_parameters(
        &self,
        call_type: CallType,
        return_kind: Option<ValueKind>,
        parameter_kinds: &[ValueKind],
    ) -> CallingConvention;

    /// Ordered registers eligible for passing parameters of `kind`.
    fn parameter_registers(&self, call_type: CallType, kind: ValueKind) -> &[Register];

    /// The register a value of `kind` is returned in.
    fn return_register(&self, kind: ValueKind) -> Register;

    /// The register holding the frame pointer.
    fn frame_pointer(&self) -> Register;

    /// All registers the allocator may use.
    fn allocatable_registers(&self) -> &[Register];

    /// The allocatable registers able to store values of `kind`.
    fn filter_allocatable(&self, kind: ValueKind) -> Vec<Register> {
        self.allocatable_registers()
            .iter()
            .filter(|r| self.can_store_kind(r, kind))
            .copied()
            .collect()
    }

    /// Whether `reg` can hold a value of `kind`. Back-end policy; the
    /// default accepts references only in reference-capable categories.
    fn can_store_kind(&self, reg: &Register, kind: ValueKind) -> bool {
        !kind.is_reference() || reg.category.may_contain_reference
    }

    fn caller_saved_registers(&self) -> &[Register];

    fn callee_saved_registers(&self) -> &[Register];

    /// Dense per-register-number attribute table for `arch`.
    fn attributes_map(&self, arch: &Architecture) -> Vec<RegisterAttributes>
    where
        Self: Sized,
    {
        RegisterAttributes::build(self, arch)
    }

    /// Derive the convention for calling `method`, prepending the implicit
    /// receiver when the method is an instance method.
    fn method_call_parameters(
        &self,
        call_type: CallType,
        method: &MethodHandle,
    ) -> CallingConvention {
        let signature = method.signature();
        let kinds = signature.parameter_kinds_with_receiver(!method.is_static());
        self.call_parameters(call_type, signature.return_kind, &kinds)
    }
}
