// This module holds the static AMD64 machine description. Register numbers
// are dense table indices (general-purpose 0..16, XMM 16..32) while
// encodings carry the hardware bit patterns, which coincide for the GP set
// and restart at zero for XMM. The architecture constructor records the
// x86-TSO memory model: only STORE_LOAD needs an explicit fence, the other
// three orderings are implicit.

//! AMD64 register table and architecture description.

use crate::core::arch::{barriers, Architecture, ByteOrder, Register, RegisterCategory};
use crate::core::kind::ValueKind;

/// General-purpose registers; may hold heap references.
pub const CPU: RegisterCategory = RegisterCategory {
    name: "CPU",
    may_contain_reference: true,
};

/// SSE/AVX vector registers; never hold references.
pub const XMM: RegisterCategory = RegisterCategory {
    name: "XMM",
    may_contain_reference: false,
};

pub const RAX: Register = Register::new(0, 0, "rax", CPU);
pub const RCX: Register = Register::new(1, 1, "rcx", CPU);
pub const RDX: Register = Register::new(2, 2, "rdx", CPU);
pub const RBX: Register = Register::new(3, 3, "rbx", CPU);
pub const RSP: Register = Register::new(4, 4, "rsp", CPU);
pub const RBP: Register = Register::new(5, 5, "rbp", CPU);
pub const RSI: Register = Register::new(6, 6, "rsi", CPU);
pub const RDI: Register = Register::new(7, 7, "rdi", CPU);
pub const R8: Register = Register::new(8, 8, "r8", CPU);
pub const R9: Register = Register::new(9, 9, "r9", CPU);
pub const R10: Register = Register::new(10, 10, "r10", CPU);
pub const R11: Register = Register::new(11, 11, "r11", CPU);
pub const R12: Register = Register::new(12, 12, "r12", CPU);
pub const R13: Register = Register::new(13, 13, "r13", CPU);
pub const R14: Register = Register::new(14, 14, "r14", CPU);
pub const R15: Register = Register::new(15, 15, "r15", CPU);

pub const XMM0: Register = Register::new(16, 0, "xmm0", XMM);
pub const XMM1: Register = Register::new(17, 1, "xmm1", XMM);
pub const XMM2: Register = Register::new(18, 2, "xmm2", XMM);
pub const XMM3: Register = Register::new(19, 3, "xmm3", XMM);
pub const XMM4: Register = Register::new(20, 4, "xmm4", XMM);
pub const XMM5: Register = Register::new(21, 5, "xmm5", XMM);
pub const XMM6: Register = Register::new(22, 6, "xmm6", XMM);
pub const XMM7: Register = Register::new(23, 7, "xmm7", XMM);
pub const XMM8: Register = Register::new(24, 8, "xmm8", XMM);
pub const XMM9: Register = Register::new(25, 9, "xmm9", XMM);
pub const XMM10: Register = Register::new(26, 10, "xmm10", XMM);
pub const XMM11: Register = Register::new(27, 11, "xmm11", XMM);
pub const XMM12: Register = Register::new(28, 12, "xmm12", XMM);
pub const XMM13: Register = Register::new(29, 13, "xmm13", XMM);
pub const XMM14: Register = Register::new(30, 14, "xmm14", XMM);
pub const XMM15: Register = Register::new(31, 15, "xmm15", XMM);

/// Dense register table; index equals register number.
pub static REGISTERS: [Register; 32] = [
    RAX, RCX, RDX, RBX, RSP, RBP, RSI, RDI, R8, R9, R10, R11, R12, R13, R14, R15, XMM0, XMM1,
    XMM2, XMM3, XMM4, XMM5, XMM6, XMM7, XMM8, XMM9, XMM10, XMM11, XMM12, XMM13, XMM14, XMM15,
];

/// The AMD64 architecture description.
pub fn amd64() -> Architecture {
    Architecture::new(
        "AMD64",
        ValueKind::Long,
        ByteOrder::LittleEndian,
        true,
        &REGISTERS,
        // x86-TSO: everything but STORE_LOAD is ordered by the hardware.
        barriers::LOAD_LOAD | barriers::LOAD_STORE | barriers::STORE_STORE,
        // rel32 displacement starts one byte past the E8 opcode.
        1,
        8,
    )
}
