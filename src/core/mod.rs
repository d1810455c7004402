// This module serves as the central hub for jitmeta's machine and value model,
// providing the building blocks everything else in the crate is written against.
// It exports and organizes key subsystems: the architecture description (registers,
// categories, memory-barrier semantics, word size), the value-kind lattice (slot
// widths and reference-ness), the unified location model (registers with optional
// sub-register offsets, caller- and callee-relative stack slots), calling-convention
// derivation (the RegisterConfig capability trait and its CallingConvention result
// shape), the aggregated target description, the provider traits through which an
// external VM supplies method signatures and field layouts, the error taxonomy, and
// the bit-manipulation helpers shared by tests and diagnostics. Every type here is
// an immutable value built once per compilation and shared read-only afterwards.

//! Core machine and value model.
//!
//! # Key Components
//!
//! ## Architecture Description (`arch`)
//! - [`Architecture`] with a dense, index-stable register table
//! - [`Register`] / [`RegisterCategory`] identity and capability tags
//! - Memory-barrier bit constants in [`barriers`]
//!
//! ## Value Kinds (`kind`)
//! - [`ValueKind`] covering primitive widths, references and the illegal
//!   placeholder used for the upper half of two-slot values
//!
//! ## Locations (`location`)
//! - [`StackSlot`] with the caller/callee frame-view distinction
//! - [`RegisterValue`] binding a register to a kind
//! - [`AllocatableValue`] and [`DebugValue`] sum types
//!
//! ## Calling Conventions (`callconv`)
//! - [`RegisterConfig`] capability trait (policy lives in the back end)
//! - [`CallingConvention`] result shape and [`RegisterAttributes`] table
//!
//! ## Target Description (`target`)
//! - [`TargetDescription`] aggregating architecture and platform policy
//!
//! ## Provider Seam (`meta`)
//! - [`ResolvedMethod`] / [`ResolvedType`] traits the VM implements
//!
//! ## Errors (`error`)
//! - [`Bailout`] and the [`CodeError`] consistency taxonomy

pub mod arch;
pub mod callconv;
pub mod error;
pub mod kind;
pub mod location;
pub mod meta;
pub mod target;
pub mod util;

pub use arch::{barriers, Architecture, ByteOrder, Register, RegisterCategory};
pub use callconv::{CallType, CallingConvention, RegisterAttributes, RegisterConfig};
pub use error::{Bailout, CodeError, CodeResult};
pub use kind::ValueKind;
pub use location::{
    AllocatableValue, DebugValue, Location, PrimitiveConstant, RegisterValue, StackSlot,
    VirtualObjectId,
};
pub use meta::{FieldLayout, MethodHandle, MethodSignature, ResolvedMethod, ResolvedType, TypeHandle};
pub use target::TargetDescription;
