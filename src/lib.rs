//! jitmeta - Compiler/runtime code-metadata contract.
//!
//! jitmeta is the data model a just-in-time compiler uses to talk to the
//! virtual machine that runs its output: what the target machine looks like
//! (registers, word size, calling conventions), where a computed value lives
//! at a given program point (register, stack slot, or escaped object), and
//! how to rebuild full interpreter state (locals, operand stack, locks and
//! the inlined call chain) at any compiled-code position for deoptimization
//! or stack traces.
//!
//! # Primary Usage
//!
//! ```ignore
//! use jitmeta::core::{CallType, RegisterConfig, ValueKind};
//! use jitmeta::x64::{amd64, X64RegisterConfig};
//!
//! // Describe the target once per compilation session.
//! let arch = amd64();
//! let config = X64RegisterConfig::new();
//!
//! // Derive a calling convention per call site.
//! let cc = config.call_parameters(
//!     CallType::Standard,
//!     Some(ValueKind::Int),
//!     &[ValueKind::Object, ValueKind::Long],
//! );
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Architecture, registers, locations, calling conventions
//! - [`deopt`] - Deoptimization metadata (frames, virtual objects, debug info)
//! - [`install`] - Code installation protocol and installed-code handles
//! - [`x64`] - x86-64 target description and register configuration
//!
//! All metadata is an immutable value graph built once per compilation and
//! then shared read-only; the only mutable pieces are the value buffers a
//! register-allocation pass rewrites in place before installation, and the
//! code-cache-owned fields of [`install::InstalledCode`].

pub mod core;
pub mod deopt;
pub mod install;
pub mod x64;

// Re-export common types from organized modules
pub use crate::core::{
    // Machine description
    Architecture, ByteOrder, Register, RegisterCategory,
    // Value model
    AllocatableValue, DebugValue, PrimitiveConstant, RegisterValue, StackSlot, ValueKind,
    // Calling conventions
    CallType, CallingConvention, RegisterAttributes, RegisterConfig,
    // Target
    TargetDescription,
    // Errors
    Bailout, CodeError, CodeResult,
};
pub use deopt::{
    BytecodeFrame, BytecodePosition, DebugInfo, ReferenceMap, RegisterSaveLayout, VirtualObject,
    VirtualObjectId,
};
pub use install::{CodeCacheProvider, CompiledCode, InstalledCode, SpeculationLog};
