// This module implements the System V flavored register configuration for
// AMD64. Parameter assignment consumes the integer table (rdi, rsi, rdx,
// rcx, r8, r9) and the float table (xmm0-xmm7) independently, left to right
// over the possibly-receiver-prefixed parameter list; whatever does not fit
// overflows to word-sized stack slots whose addressing view depends on the
// call type (outgoing slots for a caller deriving a call site, incoming
// frame-relative slots for a callee deriving its own entry convention).
// Native calls share the tables since the runtime convention here is the
// platform ABI. rsp and rbp are excluded from allocation; rbx, rbp and
// r12-r15 are preserved across calls.

//! System V flavored AMD64 register configuration.

use crate::core::arch::Register;
use crate::core::callconv::{CallType, CallingConvention, RegisterConfig};
use crate::core::kind::ValueKind;
use crate::core::location::{AllocatableValue, StackSlot};

use super::registers::*;

static GP_PARAMETERS: [Register; 6] = [RDI, RSI, RDX, RCX, R8, R9];
static XMM_PARAMETERS: [Register; 8] = [XMM0, XMM1, XMM2, XMM3, XMM4, XMM5, XMM6, XMM7];

static CALLEE_SAVED: [Register; 6] = [RBX, RBP, R12, R13, R14, R15];
static CALLER_SAVED: [Register; 25] = [
    RAX, RCX, RDX, RSI, RDI, R8, R9, R10, R11, XMM0, XMM1, XMM2, XMM3, XMM4, XMM5, XMM6, XMM7,
    XMM8, XMM9, XMM10, XMM11, XMM12, XMM13, XMM14, XMM15,
];

// Everything except rsp (stack pointer) and rbp (frame pointer).
static ALLOCATABLE: [Register; 30] = [
    RAX, RCX, RDX, RBX, RSI, RDI, R8, R9, R10, R11, R12, R13, R14, R15, XMM0, XMM1, XMM2, XMM3,
    XMM4, XMM5, XMM6, XMM7, XMM8, XMM9, XMM10, XMM11, XMM12, XMM13, XMM14, XMM15,
];

/// Stack-overflow slots are one machine word regardless of value kind.
const SLOT_SIZE: i32 = 8;

#[derive(Debug, Default, Clone, Copy)]
pub struct X64RegisterConfig;

impl X64RegisterConfig {
    pub fn new() -> Self {
        Self
    }

    fn uses_xmm(kind: ValueKind) -> bool {
        matches!(kind, ValueKind::Float | ValueKind::Double)
    }
}

impl RegisterConfig for X64RegisterConfig {
    fn call_parameters(
        &self,
        call_type: CallType,
        return_kind: Option<ValueKind>,
        parameter_kinds: &[ValueKind],
    ) -> CallingConvention {
        let mut arguments = Vec::with_capacity(parameter_kinds.len());
        let mut next_gp = 0;
        let mut next_xmm = 0;
        let mut stack_offset = 0;
        for &kind in parameter_kinds {
            let table = self.parameter_registers(call_type, kind);
            let next = if Self::uses_xmm(kind) {
                &mut next_xmm
            } else {
                &mut next_gp
            };
            if let Some(reg) = table.get(*next) {
                *next += 1;
                arguments.push(AllocatableValue::Register(reg.as_value(kind)));
            } else {
                arguments.push(AllocatableValue::Stack(StackSlot::new(
                    kind,
                    stack_offset,
                    call_type.is_callee_view(),
                )));
                stack_offset += SLOT_SIZE;
            }
        }
        let return_location = return_kind
            .map(|kind| AllocatableValue::Register(self.return_register(kind).as_value(kind)));
        CallingConvention::new(arguments, return_location, stack_offset)
    }

    fn parameter_registers(&self, _call_type: CallType, kind: ValueKind) -> &[Register] {
        if Self::uses_xmm(kind) {
            &XMM_PARAMETERS
        } else {
            &GP_PARAMETERS
        }
    }

    fn return_register(&self, kind: ValueKind) -> Register {
        if Self::uses_xmm(kind) {
            XMM0
        } else {
            RAX
        }
    }

    fn frame_pointer(&self) -> Register {
        RBP
    }

    fn allocatable_registers(&self) -> &[Register] {
        &ALLOCATABLE
    }

    fn caller_saved_registers(&self) -> &[Register] {
        &CALLER_SAVED
    }

    fn callee_saved_registers(&self) -> &[Register] {
        &CALLEE_SAVED
    }
}
