//! End-to-end deoptimization metadata tests.
//!
//! Builds full DebugInfo graphs - inlined frame chains, reference maps and
//! virtual-object pools - against mock method/type providers, then drives
//! the reconstruction walk with a mock frame reader and object builder the
//! way a deoptimization handler would.

use std::sync::Arc;

use hashbrown::HashMap;

use jitmeta::core::meta::{
    FieldLayout, MethodHandle, MethodSignature, ResolvedMethod, ResolvedType, TypeHandle,
};
use jitmeta::core::{CodeResult, DebugValue, Location, PrimitiveConstant, ValueKind, VirtualObjectId};
use jitmeta::deopt::reconstruct::{
    reconstruct_frames, FrameReader, ObjToken, ObjectBuilder, RuntimeWord,
};
use jitmeta::deopt::{BytecodeFrame, DebugInfo, FrameOrPosition, ReferenceMap, VirtualObject};
use jitmeta::x64::registers::{RDI, RSI};
use jitmeta::{CodeError, StackSlot};

struct MockMethod {
    name: String,
    code_size: usize,
    is_static: bool,
    signature: MethodSignature,
}

impl ResolvedMethod for MockMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn code_size(&self) -> usize {
        self.code_size
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn signature(&self) -> &MethodSignature {
        &self.signature
    }
}

fn method(name: &str) -> MethodHandle {
    MethodHandle::new(Arc::new(MockMethod {
        name: name.to_string(),
        code_size: 1000,
        is_static: true,
        signature: MethodSignature::new(vec![], None),
    }))
}

struct MockType {
    name: String,
    component: Option<ValueKind>,
    fields: Vec<FieldLayout>,
}

impl ResolvedType for MockType {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_array(&self) -> bool {
        self.component.is_some()
    }

    fn component_kind(&self) -> Option<ValueKind> {
        self.component
    }

    fn instance_fields(&self) -> &[FieldLayout] {
        &self.fields
    }
}

fn instance_type(name: &str, fields: Vec<FieldLayout>) -> TypeHandle {
    TypeHandle::new(Arc::new(MockType {
        name: name.to_string(),
        component: None,
        fields,
    }))
}

fn array_type(name: &str, component: ValueKind) -> TypeHandle {
    TypeHandle::new(Arc::new(MockType {
        name: name.to_string(),
        component: Some(component),
        fields: vec![],
    }))
}

fn field(name: &str, offset: i32, kind: ValueKind) -> FieldLayout {
    FieldLayout {
        name: name.to_string(),
        offset,
        kind,
    }
}

fn int_const(v: i32) -> DebugValue {
    DebugValue::Constant(PrimitiveConstant::int(v))
}

/// Simulated live machine state: register contents keyed by register
/// number, spilled values keyed by raw stack offset.
#[derive(Default)]
struct MachineState {
    registers: HashMap<i16, RuntimeWord>,
    stack: HashMap<i32, RuntimeWord>,
}

impl FrameReader for MachineState {
    fn read(&self, value: &DebugValue) -> CodeResult<RuntimeWord> {
        match value {
            DebugValue::Register(r) => {
                self.registers
                    .get(&r.register.number)
                    .copied()
                    .ok_or(CodeError::FrameFormat {
                        reason: format!("no live value in {}", r.register),
                    })
            }
            DebugValue::Stack(s) => {
                self.stack
                    .get(&s.raw_offset())
                    .copied()
                    .ok_or(CodeError::FrameFormat {
                        reason: format!("no live value in {s}"),
                    })
            }
            other => Err(CodeError::FrameFormat {
                reason: format!("{other} is not a machine location"),
            }),
        }
    }
}

/// Simulated heap: allocations hand out sequential tokens and remember
/// every store for assertions.
#[derive(Default)]
struct Heap {
    next: u64,
    boxes: HashMap<(ValueKind, i64), ObjToken>,
    fields: HashMap<(ObjToken, usize), RuntimeWord>,
    elements: HashMap<(ObjToken, usize), RuntimeWord>,
    allocations: usize,
}

impl ObjectBuilder for Heap {
    fn allocate_instance(&mut self, _ty: &TypeHandle) -> CodeResult<ObjToken> {
        self.next += 1;
        self.allocations += 1;
        Ok(ObjToken(self.next))
    }

    fn allocate_array(&mut self, _ty: &TypeHandle, _length: usize) -> CodeResult<ObjToken> {
        self.next += 1;
        self.allocations += 1;
        Ok(ObjToken(self.next))
    }

    fn lookup_box(&mut self, kind: ValueKind, bits: i64) -> Option<ObjToken> {
        self.boxes.get(&(kind, bits)).copied()
    }

    fn set_field(&mut self, obj: ObjToken, field_index: usize, value: RuntimeWord) -> CodeResult<()> {
        self.fields.insert((obj, field_index), value);
        Ok(())
    }

    fn set_element(&mut self, obj: ObjToken, index: usize, value: RuntimeWord) -> CodeResult<()> {
        self.elements.insert((obj, index), value);
        Ok(())
    }
}

fn frame_info(frame: BytecodeFrame, objects: Vec<VirtualObject>) -> DebugInfo {
    DebugInfo::new(FrameOrPosition::Frame(frame), None, objects, None)
}

#[test]
fn test_inlined_chain_rebuilds_one_frame_per_link() {
    let _ = env_logger::builder().is_test(true).try_init();

    // outer() inlined callee(), which trapped during a completed call.
    let outer = BytecodeFrame::new(
        None,
        method("outer"),
        40,
        vec![
            DebugValue::Constant(PrimitiveConstant::long(1 << 40)),
            DebugValue::Illegal,
        ],
        vec![ValueKind::Long, ValueKind::Illegal],
        2,
        0,
        false,
        false,
    );
    let inner = BytecodeFrame::new(
        Some(Arc::new(outer)),
        method("callee"),
        7,
        vec![
            DebugValue::Register(RDI.as_value(ValueKind::Int)),
            DebugValue::Stack(StackSlot::new(ValueKind::Object, 16, true)),
            int_const(5),
        ],
        vec![ValueKind::Int, ValueKind::Object, ValueKind::Int],
        2,
        1,
        false,
        true,
    );
    let info = frame_info(inner, vec![]);

    let mut machine = MachineState::default();
    machine
        .registers
        .insert(RDI.number, RuntimeWord::Primitive {
            kind: ValueKind::Int,
            bits: 123,
        });
    machine
        .stack
        .insert(16, RuntimeWord::Reference(Some(ObjToken(9))));

    let mut heap = Heap::default();
    let frames = reconstruct_frames(&info, &machine, &mut heap).unwrap();

    assert_eq!(frames.len(), 2);
    // Outermost first.
    assert_eq!(frames[0].method.name(), "outer");
    assert_eq!(frames[0].bci, 40);
    assert_eq!(
        frames[0].locals[0],
        RuntimeWord::Primitive {
            kind: ValueKind::Long,
            bits: 1 << 40,
        }
    );
    assert_eq!(frames[0].locals[1], RuntimeWord::Undefined);

    assert_eq!(frames[1].method.name(), "callee");
    assert!(frames[1].during_call);
    assert_eq!(
        frames[1].locals[0],
        RuntimeWord::Primitive {
            kind: ValueKind::Int,
            bits: 123,
        }
    );
    assert_eq!(frames[1].locals[1], RuntimeWord::Reference(Some(ObjToken(9))));
    assert_eq!(
        frames[1].stack[0],
        RuntimeWord::Primitive {
            kind: ValueKind::Int,
            bits: 5,
        }
    );
    assert_eq!(heap.allocations, 0);
}

#[test]
fn test_cyclic_escape_graph_rematerializes_by_identity() {
    let _ = env_logger::builder().is_test(true).try_init();

    let node = instance_type("Node", vec![field("next", 8, ValueKind::Object)]);
    let a = VirtualObject::new(
        VirtualObjectId(0),
        node.clone(),
        vec![DebugValue::Virtual(VirtualObjectId(1))],
        vec![ValueKind::Object],
        false,
    );
    let b = VirtualObject::new(
        VirtualObjectId(1),
        node,
        vec![DebugValue::Virtual(VirtualObjectId(0))],
        vec![ValueKind::Object],
        false,
    );
    let frame = BytecodeFrame::new(
        None,
        method("m"),
        1,
        vec![
            DebugValue::Virtual(VirtualObjectId(0)),
            DebugValue::Virtual(VirtualObjectId(1)),
        ],
        vec![ValueKind::Object, ValueKind::Object],
        2,
        0,
        false,
        false,
    );
    let info = frame_info(frame, vec![a, b]);

    let mut heap = Heap::default();
    let frames = reconstruct_frames(&info, &MachineState::default(), &mut heap).unwrap();

    let RuntimeWord::Reference(Some(a_token)) = frames[0].locals[0] else {
        panic!("local 0 should reference the first node");
    };
    let RuntimeWord::Reference(Some(b_token)) = frames[0].locals[1] else {
        panic!("local 1 should reference the second node");
    };
    assert_ne!(a_token, b_token);
    assert_eq!(heap.fields[&(a_token, 0)], RuntimeWord::Reference(Some(b_token)));
    assert_eq!(heap.fields[&(b_token, 0)], RuntimeWord::Reference(Some(a_token)));
    assert_eq!(heap.allocations, 2);
}

#[test]
fn test_auto_box_prefers_canonical_cache() {
    let integer = instance_type("Integer", vec![field("value", 12, ValueKind::Int)]);
    let boxed = VirtualObject::new(
        VirtualObjectId(0),
        integer,
        vec![int_const(100)],
        vec![ValueKind::Int],
        true,
    );
    let frame = BytecodeFrame::new(
        None,
        method("m"),
        1,
        vec![DebugValue::Virtual(VirtualObjectId(0))],
        vec![ValueKind::Object],
        1,
        0,
        false,
        false,
    );
    let info = frame_info(frame, vec![boxed]);

    let mut heap = Heap::default();
    let canonical = ObjToken(4242);
    heap.boxes.insert((ValueKind::Int, 100), canonical);

    let frames = reconstruct_frames(&info, &MachineState::default(), &mut heap).unwrap();
    assert_eq!(frames[0].locals[0], RuntimeWord::Reference(Some(canonical)));
    assert_eq!(heap.allocations, 0);
    assert!(heap.fields.is_empty());
}

#[test]
fn test_byte_array_runs_decode_little_endian() {
    let bytes = array_type("byte[]", ValueKind::Byte);
    // One coalesced int write covering elements 0..4.
    let obj = VirtualObject::new(
        VirtualObjectId(0),
        bytes,
        vec![
            DebugValue::Constant(PrimitiveConstant::int(0x0403_0201)),
            DebugValue::Illegal,
            DebugValue::Illegal,
            DebugValue::Illegal,
        ],
        vec![
            ValueKind::Int,
            ValueKind::Illegal,
            ValueKind::Illegal,
            ValueKind::Illegal,
        ],
        false,
    );
    let frame = BytecodeFrame::new(
        None,
        method("m"),
        1,
        vec![DebugValue::Virtual(VirtualObjectId(0))],
        vec![ValueKind::Object],
        1,
        0,
        false,
        false,
    );
    let info = frame_info(frame, vec![obj]);

    let mut heap = Heap::default();
    reconstruct_frames(&info, &MachineState::default(), &mut heap).unwrap();
    let token = ObjToken(1);
    for (index, expected) in [(0usize, 1i64), (1, 2), (2, 3), (3, 4)] {
        assert_eq!(
            heap.elements[&(token, index)],
            RuntimeWord::Primitive {
                kind: ValueKind::Byte,
                bits: expected,
            }
        );
    }
}

#[test]
fn test_malformed_byte_run_aborts_the_walk() {
    let bytes = array_type("byte[]", ValueKind::Byte);
    // A 3-byte run is not a power of two.
    let obj = VirtualObject::new(
        VirtualObjectId(0),
        bytes,
        vec![
            DebugValue::Constant(PrimitiveConstant::int(7)),
            DebugValue::Illegal,
            DebugValue::Illegal,
        ],
        vec![ValueKind::Int, ValueKind::Illegal, ValueKind::Illegal],
        false,
    );
    let frame = BytecodeFrame::new(
        None,
        method("m"),
        1,
        vec![DebugValue::Virtual(VirtualObjectId(0))],
        vec![ValueKind::Object],
        1,
        0,
        false,
        false,
    );
    let info = frame_info(frame, vec![obj]);

    let mut heap = Heap::default();
    let err = reconstruct_frames(&info, &MachineState::default(), &mut heap).unwrap_err();
    assert!(matches!(err, CodeError::VirtualObjectLayout { id: 0, .. }));
    assert_eq!(heap.allocations, 0);
}

#[test]
fn test_rethrow_frame_carries_pending_exception() {
    let throwable = instance_type("Throwable", vec![]);
    let pending = VirtualObject::new(VirtualObjectId(0), throwable, vec![], vec![], false);
    let frame = BytecodeFrame::new(
        None,
        method("handler"),
        12,
        vec![DebugValue::Virtual(VirtualObjectId(0))],
        vec![ValueKind::Object],
        0,
        1,
        true,
        false,
    );
    let info = frame_info(frame, vec![pending]);

    let mut heap = Heap::default();
    let frames = reconstruct_frames(&info, &MachineState::default(), &mut heap).unwrap();
    assert!(frames[0].rethrow_exception);
    assert_eq!(frames[0].stack.len(), 1);
    assert!(matches!(frames[0].stack[0], RuntimeWord::Reference(Some(_))));
}

#[test]
fn test_reference_map_travels_with_the_info() {
    let frame = BytecodeFrame::new(None, method("m"), 3, vec![], vec![], 0, 0, false, false);
    let map = ReferenceMap::new(vec![Location::register(RSI), Location::stack(24)]);
    let info = DebugInfo::new(FrameOrPosition::Frame(frame), Some(map), vec![], None);
    info.verify().unwrap();
    assert_eq!(info.reference_map().unwrap().locations().len(), 2);
}

#[test]
fn test_frame_rendering_names_all_zones() {
    let frame = BytecodeFrame::new(
        Some(Arc::new(BytecodeFrame::new(
            None,
            method("outer"),
            9,
            vec![],
            vec![],
            0,
            0,
            false,
            false,
        ))),
        method("inner"),
        2,
        vec![int_const(1), int_const(2), DebugValue::NullConstant],
        vec![ValueKind::Int, ValueKind::Int],
        1,
        1,
        false,
        false,
    );
    let rendered = frame.to_string();
    assert!(rendered.contains("inner"));
    assert!(rendered.contains("outer"));
    assert!(rendered.contains("local[0]"));
    assert!(rendered.contains("stack[0]"));
    assert!(rendered.contains("lock[0]"));
}
