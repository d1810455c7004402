// This module is the deoptimization metadata model: everything compiled code
// must record so that, at any safepoint or call site, the VM can abandon the
// optimized frame and rebuild exact interpreter state. BytecodePosition is the
// immutable cons-list describing the inlined call chain at a program point;
// BytecodeFrame extends one link of that chain with the locals/stack/locks
// value zones and their kinds; VirtualObject describes a heap object whose
// allocation escape analysis eliminated, as an id-indexed pool entry so cyclic
// object graphs stay finite; DebugInfo ties a position to its reference map,
// virtual objects and callee-save layout; and reconstruct walks the whole
// graph, materializing virtual objects and producing one interpreter frame per
// inlined method. This is the richest and most error-prone part of the
// contract: wrong offsets or kinds here corrupt program state silently, which
// is why the model validates aggressively and treats every inconsistency as a
// compiler bug.

//! Deoptimization metadata: frame chains, virtual objects, debug info.

pub mod debug_info;
pub mod frame;
pub mod position;
pub mod reconstruct;
pub mod virtual_object;

pub use crate::core::location::VirtualObjectId;
pub use debug_info::{DebugInfo, FrameOrPosition, ReferenceMap, RegisterSaveLayout};
pub use frame::BytecodeFrame;
pub use position::{
    BytecodePosition, AFTER_BCI, AFTER_EXCEPTION_BCI, BEFORE_BCI, INVALID_FRAMESTATE_BCI,
    UNKNOWN_BCI, UNWIND_BCI,
};
pub use reconstruct::{
    reconstruct_frames, FrameReader, InterpreterFrame, ObjToken, ObjectBuilder, RuntimeWord,
};
pub use virtual_object::VirtualObject;
