// This module implements VirtualObject: the description of a heap object whose
// allocation was eliminated by escape analysis, recorded so deoptimization can
// undo the elision. Objects live in a pool scoped to one DebugInfo and refer to
// each other (including cyclically) by VirtualObjectId, so equality, printing
// and traversal are id-based at the cyclic edge and terminate by construction.
// verify_layout cross-checks the flat value/kind arrays against the type's
// declared layout supplied by the resolved-type provider, including the two
// narrow accommodations the compiler legitimately produces: a single 64-bit
// value covering two adjacent 32-bit fields (first field 8-byte aligned, fields
// contiguous), and byte arrays where several byte writes were coalesced into
// one wider value followed by illegal-padded slots whose run length must be a
// power of two, consistent with the access width, and never above 8. Any other
// mismatch is a compiler bug and aborts the consuming deoptimization.

//! Escaped-object descriptions for deoptimization.

use std::fmt;

use crate::core::error::{CodeError, CodeResult};
use crate::core::kind::ValueKind;
use crate::core::location::{DebugValue, VirtualObjectId};
use crate::core::meta::TypeHandle;
use crate::core::util;

/// One heap object eliminated by escape analysis.
///
/// Structural equality is the same type handle, the same id, and pointwise
/// value equality where `Virtual` entries compare by id, never recursively.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualObject {
    id: VirtualObjectId,
    ty: TypeHandle,
    /// Field values (declaration order) or array elements.
    values: Vec<DebugValue>,
    /// Parallel kind array; `Illegal` entries pad coalesced wide writes.
    slot_kinds: Vec<ValueKind>,
    /// The object may be a boxed primitive: reconstruction should consult
    /// the runtime's canonical box cache before allocating a fresh instance.
    pub is_auto_box: bool,
}

impl VirtualObject {
    /// Construction consumes the buffers; the object is their single owner.
    ///
    /// # Panics
    /// Panics when the arrays differ in length.
    pub fn new(
        id: VirtualObjectId,
        ty: TypeHandle,
        values: Vec<DebugValue>,
        slot_kinds: Vec<ValueKind>,
        is_auto_box: bool,
    ) -> Self {
        assert!(
            values.len() == slot_kinds.len(),
            "virtual object {}: {} values but {} kinds",
            id,
            values.len(),
            slot_kinds.len()
        );
        Self {
            id,
            ty,
            values,
            slot_kinds,
            is_auto_box,
        }
    }

    pub fn id(&self) -> VirtualObjectId {
        self.id
    }

    pub fn ty(&self) -> &TypeHandle {
        &self.ty
    }

    pub fn values(&self) -> &[DebugValue] {
        &self.values
    }

    /// Mutable view for the in-place location rewrite before installation.
    pub fn values_mut(&mut self) -> &mut [DebugValue] {
        &mut self.values
    }

    pub fn slot_kinds(&self) -> &[ValueKind] {
        &self.slot_kinds
    }

    fn layout_error(&self, reason: String) -> CodeError {
        CodeError::VirtualObjectLayout {
            id: self.id.0,
            reason,
        }
    }

    /// Cross-check the value/kind arrays against the type's declared layout.
    ///
    /// Violations are compiler bugs: the metadata cannot be used to undo the
    /// allocation elision and the consuming deoptimization must abort.
    pub fn verify_layout(&self) -> CodeResult<()> {
        if self.ty.is_array() {
            self.verify_array_layout()
        } else {
            self.verify_instance_layout()
        }
    }

    fn verify_array_layout(&self) -> CodeResult<()> {
        let component = self.ty.component_kind().ok_or_else(|| {
            self.layout_error(format!("array type {} reports no component kind", self.ty))
        })?;
        if component == ValueKind::Byte {
            return self.verify_byte_array_runs();
        }
        for (i, kind) in self.slot_kinds.iter().enumerate() {
            if *kind != component && *kind != ValueKind::Illegal {
                return Err(self.layout_error(format!(
                    "element {} of {}[] has kind {}",
                    i, component, kind
                )));
            }
        }
        Ok(())
    }

    /// Byte arrays may carry coalesced wider writes: a value of size n is
    /// followed by n-1 illegal-padded slots.
    fn verify_byte_array_runs(&self) -> CodeResult<()> {
        let mut i = 0;
        while i < self.slot_kinds.len() {
            let kind = self.slot_kinds[i];
            if kind == ValueKind::Illegal {
                return Err(self.layout_error(format!(
                    "byte array has padding at {} with no preceding write",
                    i
                )));
            }
            if kind.is_reference() {
                return Err(self.layout_error(format!("reference stored in byte array at {i}")));
            }
            let width = kind.size_in_bytes();
            let mut run = 1usize;
            while i + run < self.slot_kinds.len() && self.slot_kinds[i + run] == ValueKind::Illegal
            {
                run += 1;
            }
            if !util::is_power_of_2(run as i64) || run > 8 {
                return Err(self.layout_error(format!(
                    "coalesced byte run of length {} at {}",
                    run, i
                )));
            }
            if run != width {
                return Err(self.layout_error(format!(
                    "byte run of length {} at {} inconsistent with {}-byte write",
                    run, i, width
                )));
            }
            i += run;
        }
        Ok(())
    }

    fn verify_instance_layout(&self) -> CodeResult<()> {
        let fields = self.ty.instance_fields();
        let mut f = 0;
        let mut v = 0;
        while v < self.values.len() {
            let Some(field) = fields.get(f) else {
                return Err(self.layout_error(format!(
                    "{} values but only {} declared fields in {}",
                    self.values.len(),
                    fields.len(),
                    self.ty
                )));
            };
            let kind = self.slot_kinds[v];
            let value_size = kind.size_in_bytes();
            let field_size = field.kind.size_in_bytes();
            if value_size == field_size {
                f += 1;
                v += 1;
                continue;
            }
            // One 64-bit value may legitimately cover two adjacent 32-bit
            // fields, 8-byte aligned and contiguous.
            if value_size == 8 && field_size == 4 {
                let next = fields.get(f + 1).ok_or_else(|| {
                    self.layout_error(format!(
                        "64-bit value at {} covers field {} with no successor",
                        v, field.name
                    ))
                })?;
                if field.offset % 8 != 0 {
                    return Err(self.layout_error(format!(
                        "64-bit value split across misaligned field {} at offset {}",
                        field.name, field.offset
                    )));
                }
                if next.offset != field.offset + 4 || next.kind.size_in_bytes() != 4 {
                    return Err(self.layout_error(format!(
                        "64-bit value at {} needs two contiguous 32-bit fields, found {} then {}",
                        v, field.name, next.name
                    )));
                }
                f += 2;
                v += 1;
                continue;
            }
            return Err(self.layout_error(format!(
                "value {} of kind {} does not fit field {} of kind {}",
                v, kind, field.name, field.kind
            )));
        }
        if f != fields.len() {
            return Err(self.layout_error(format!(
                "{} of {} declared fields of {} covered",
                f,
                fields.len(),
                self.ty
            )));
        }
        Ok(())
    }
}

impl fmt::Display for VirtualObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}[", self.id, self.ty)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            // Virtual entries print as ids; no recursion through the pool,
            // so cyclic graphs print in finite space.
            value.fmt(f)?;
        }
        f.write_str("]")
    }
}
