// This module implements the deoptimization walk: given the DebugInfo recorded
// at a trapped program point, rebuild interpreter state. It is written against
// two collaborator traits so the core stays free of any concrete runtime: a
// FrameReader supplies the live bits for register and stack entries of the
// trapped frame, and an ObjectBuilder allocates and fills the heap objects that
// escape analysis had eliminated. Materialization runs in two phases - allocate
// every virtual object first, then fill fields and elements - so cyclic object
// graphs resolve through the id-to-token map without recursion. Objects flagged
// as possible auto-boxes consult the runtime's canonical box cache before a
// fresh allocation; byte arrays decode coalesced power-of-two write runs back
// into individual byte stores. The frame chain is then walked outermost-first,
// producing one InterpreterFrame per inlined method with values read
// positionally from the locals/stack/locks zones. Every inconsistency found on
// the way is a compiler bug and aborts the walk with a diagnostic naming the
// offending structure.

//! Interpreter-state reconstruction for deoptimization.

use log::{debug, trace};

use crate::core::error::{CodeError, CodeResult};
use crate::core::kind::ValueKind;
use crate::core::location::DebugValue;
use crate::core::meta::{MethodHandle, TypeHandle};
use crate::core::util;

use super::debug_info::DebugInfo;
use super::frame::BytecodeFrame;
use super::virtual_object::VirtualObject;

/// Opaque handle to a runtime object produced by an [`ObjectBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjToken(pub u64);

/// A reconstructed runtime scalar or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeWord {
    Primitive { kind: ValueKind, bits: i64 },
    Reference(Option<ObjToken>),
    /// A dead or padding slot with no defined value.
    Undefined,
}

/// Supplies the live contents of register and stack locations at the
/// trapped program point.
pub trait FrameReader {
    fn read(&self, value: &DebugValue) -> CodeResult<RuntimeWord>;
}

/// Allocates and fills runtime objects during rematerialization.
///
/// `set_field` indices follow the type's declared instance-field order;
/// `set_element` indices are array indices.
pub trait ObjectBuilder {
    fn allocate_instance(&mut self, ty: &TypeHandle) -> CodeResult<ObjToken>;
    fn allocate_array(
        &mut self,
        ty: &TypeHandle,
        length: usize,
    ) -> CodeResult<ObjToken>;
    /// Canonical boxed instance for a primitive, if the runtime caches one.
    fn lookup_box(&mut self, kind: ValueKind, bits: i64) -> Option<ObjToken>;
    fn set_field(&mut self, obj: ObjToken, field_index: usize, value: RuntimeWord)
        -> CodeResult<()>;
    fn set_element(&mut self, obj: ObjToken, index: usize, value: RuntimeWord) -> CodeResult<()>;
}

/// One rebuilt interpreter frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterFrame {
    pub method: MethodHandle,
    pub bci: i32,
    pub locals: Vec<RuntimeWord>,
    pub stack: Vec<RuntimeWord>,
    pub locks: Vec<RuntimeWord>,
    /// Re-throw `stack[0]` instead of re-executing the bytecode at `bci`.
    pub rethrow_exception: bool,
    /// The call at `bci` already completed; resume after it, never retry it.
    pub during_call: bool,
}

/// Rebuild the interpreter frames for `info`, outermost caller first.
///
/// Fails when `info` carries no frame state, when any format or layout check
/// fails, or when a collaborator reports an error.
pub fn reconstruct_frames(
    info: &DebugInfo,
    reader: &dyn FrameReader,
    builder: &mut dyn ObjectBuilder,
) -> CodeResult<Vec<InterpreterFrame>> {
    info.verify()?;
    let frame = info.frame().ok_or_else(|| CodeError::FrameFormat {
        reason: format!("no frame state recorded at {}", info.position()),
    })?;
    debug!(
        "reconstructing {} frame(s), {} virtual object(s) at {}",
        frame.depth(),
        info.virtual_objects().len(),
        info.position()
    );

    let tokens = materialize_objects(info, reader, builder)?;

    // Innermost-out via caller(), emitted outermost-first.
    let mut chain = Vec::with_capacity(frame.depth());
    let mut link = Some(frame);
    while let Some(frame) = link {
        chain.push(frame);
        link = frame.caller();
    }
    chain.reverse();

    chain
        .into_iter()
        .map(|frame| build_frame(frame, &tokens, reader))
        .collect()
}

fn build_frame(
    frame: &BytecodeFrame,
    tokens: &[ObjToken],
    reader: &dyn FrameReader,
) -> CodeResult<InterpreterFrame> {
    trace!("rebuilding frame {} @ {}", frame.method(), frame.bci());
    let mut locals = Vec::with_capacity(frame.num_locals());
    for i in 0..frame.num_locals() {
        locals.push(resolve(&frame.local_value(i), tokens, reader)?);
    }
    let mut stack = Vec::with_capacity(frame.num_stack());
    for i in 0..frame.num_stack() {
        stack.push(resolve(&frame.stack_value(i), tokens, reader)?);
    }
    let mut locks = Vec::with_capacity(frame.num_locks());
    for i in 0..frame.num_locks() {
        locks.push(resolve(&frame.lock_value(i), tokens, reader)?);
    }
    Ok(InterpreterFrame {
        method: frame.method().clone(),
        bci: frame.bci(),
        locals,
        stack,
        locks,
        rethrow_exception: frame.rethrow_exception,
        during_call: frame.during_call,
    })
}

/// Resolve one metadata slot to a runtime word. `tokens` maps virtual
/// object ids to their materialized instances.
fn resolve(
    value: &DebugValue,
    tokens: &[ObjToken],
    reader: &dyn FrameReader,
) -> CodeResult<RuntimeWord> {
    match value {
        DebugValue::Register(_) | DebugValue::Stack(_) => reader.read(value),
        DebugValue::Constant(c) => Ok(RuntimeWord::Primitive {
            kind: c.kind,
            bits: c.bits,
        }),
        DebugValue::NullConstant => Ok(RuntimeWord::Reference(None)),
        DebugValue::Virtual(id) => {
            let token = tokens.get(id.0 as usize).ok_or(CodeError::FrameFormat {
                reason: format!("{id} has no materialized instance"),
            })?;
            Ok(RuntimeWord::Reference(Some(*token)))
        }
        DebugValue::Illegal => Ok(RuntimeWord::Undefined),
    }
}

/// Two-phase materialization: allocate every object, then fill contents, so
/// cyclic references resolve through the id-to-token table.
fn materialize_objects(
    info: &DebugInfo,
    reader: &dyn FrameReader,
    builder: &mut dyn ObjectBuilder,
) -> CodeResult<Vec<ObjToken>> {
    let pool = info.virtual_objects();
    let mut tokens = Vec::with_capacity(pool.len());
    // True when the token is a canonical box that must not be refilled.
    let mut canonical = vec![false; pool.len()];

    for (i, obj) in pool.iter().enumerate() {
        let token = if obj.ty().is_array() {
            builder.allocate_array(obj.ty(), obj.values().len())?
        } else if obj.is_auto_box {
            match boxed_primitive(obj, reader)? {
                Some((kind, bits)) => match builder.lookup_box(kind, bits) {
                    Some(token) => {
                        canonical[i] = true;
                        token
                    }
                    None => builder.allocate_instance(obj.ty())?,
                },
                None => builder.allocate_instance(obj.ty())?,
            }
        } else {
            builder.allocate_instance(obj.ty())?
        };
        trace!("materialized {} as {:?}", obj.id(), token);
        tokens.push(token);
    }

    for (i, obj) in pool.iter().enumerate() {
        if canonical[i] {
            continue;
        }
        if obj.ty().is_array() {
            fill_array(obj, tokens[i], &tokens, reader, builder)?;
        } else {
            fill_instance(obj, tokens[i], &tokens, reader, builder)?;
        }
    }
    Ok(tokens)
}

/// The single primitive payload of a box candidate, if it has one.
fn boxed_primitive(
    obj: &VirtualObject,
    reader: &dyn FrameReader,
) -> CodeResult<Option<(ValueKind, i64)>> {
    let payload: Vec<&DebugValue> = obj
        .values()
        .iter()
        .filter(|v| !matches!(v, DebugValue::Illegal))
        .collect();
    let &[value] = payload.as_slice() else {
        return Ok(None);
    };
    match resolve(value, &[], reader)? {
        RuntimeWord::Primitive { kind, bits } => Ok(Some((kind, bits))),
        _ => Ok(None),
    }
}

fn fill_instance(
    obj: &VirtualObject,
    token: ObjToken,
    tokens: &[ObjToken],
    reader: &dyn FrameReader,
    builder: &mut dyn ObjectBuilder,
) -> CodeResult<()> {
    let fields = obj.ty().instance_fields();
    let mut f = 0;
    let mut v = 0;
    while v < obj.values().len() {
        let kind = obj.slot_kinds()[v];
        let word = resolve(&obj.values()[v], tokens, reader)?;
        let field_size = fields[f].kind.size_in_bytes();
        if kind.size_in_bytes() == 8 && field_size == 4 {
            // One 64-bit value over two adjacent 32-bit fields; layout
            // verification has already vetted alignment and contiguity.
            let RuntimeWord::Primitive { bits, .. } = word else {
                return Err(CodeError::VirtualObjectLayout {
                    id: obj.id().0,
                    reason: format!("split 64-bit value at {v} is not a primitive"),
                });
            };
            builder.set_field(
                token,
                f,
                RuntimeWord::Primitive {
                    kind: ValueKind::Int,
                    bits: util::sign_extend(bits, 32),
                },
            )?;
            builder.set_field(
                token,
                f + 1,
                RuntimeWord::Primitive {
                    kind: ValueKind::Int,
                    bits: util::sign_extend(bits >> 32, 32),
                },
            )?;
            f += 2;
        } else {
            builder.set_field(token, f, word)?;
            f += 1;
        }
        v += 1;
    }
    Ok(())
}

fn fill_array(
    obj: &VirtualObject,
    token: ObjToken,
    tokens: &[ObjToken],
    reader: &dyn FrameReader,
    builder: &mut dyn ObjectBuilder,
) -> CodeResult<()> {
    let component = obj.ty().component_kind().unwrap_or(ValueKind::Object);
    if component == ValueKind::Byte {
        return fill_byte_array(obj, token, reader, builder);
    }
    for (i, value) in obj.values().iter().enumerate() {
        if matches!(value, DebugValue::Illegal) {
            continue; // default-initialized element
        }
        let word = resolve(value, tokens, reader)?;
        builder.set_element(token, i, word)?;
    }
    Ok(())
}

/// Decode coalesced write runs back into individual byte stores. Run shape
/// was vetted by layout verification; bytes are emitted low-order first.
fn fill_byte_array(
    obj: &VirtualObject,
    token: ObjToken,
    reader: &dyn FrameReader,
    builder: &mut dyn ObjectBuilder,
) -> CodeResult<()> {
    let mut i = 0;
    while i < obj.values().len() {
        let kind = obj.slot_kinds()[i];
        let width = kind.size_in_bytes();
        let word = resolve(&obj.values()[i], &[], reader)?;
        let RuntimeWord::Primitive { bits, .. } = word else {
            return Err(CodeError::VirtualObjectLayout {
                id: obj.id().0,
                reason: format!("non-primitive write at byte index {i}"),
            });
        };
        for b in 0..width {
            let byte = util::sign_extend(bits >> (8 * b), 8);
            builder.set_element(
                token,
                i + b,
                RuntimeWord::Primitive {
                    kind: ValueKind::Byte,
                    bits: byte,
                },
            )?;
        }
        i += width;
    }
    Ok(())
}
