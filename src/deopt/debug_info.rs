// This module ties the per-program-point metadata together. ReferenceMap is the
// shape of GC-root information: the locations (registers, possibly at a
// sub-register offset, and stack slots) holding references at the point.
// RegisterSaveLayout is the bijection between registers a callee spilled and
// the frame offsets it spilled them to, which is how a caller's registers are
// recovered when unwinding through the callee; both sides of the bijection are
// checked for uniqueness at construction. DebugInfo aggregates one bytecode
// position (possibly a full frame chain), the optional reference map, the pool
// of virtual objects materialized at the point, and the optional callee-save
// layout; verify() runs the frame-format and object-layout validation passes
// plus pool-reference sanity in one sweep.

//! Debug info: reference maps, callee-save layouts and their aggregation.

use std::fmt;

use crate::core::arch::Register;
use crate::core::error::{CodeError, CodeResult};
use crate::core::location::{DebugValue, Location, VirtualObjectId};

use super::frame::BytecodeFrame;
use super::position::BytecodePosition;
use super::virtual_object::VirtualObject;

/// Which registers and stack slots hold GC roots at a program point.
///
/// Shape only: interpretation belongs to the collector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceMap {
    locations: Vec<Location>,
}

impl ReferenceMap {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl fmt::Display for ReferenceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("refmap{")?;
        for (i, loc) in self.locations.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            loc.fmt(f)?;
        }
        f.write_str("}")
    }
}

/// Bijective map from registers to the frame offsets where a callee spilled
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSaveLayout {
    registers: Vec<Register>,
    slots: Vec<i32>,
}

impl RegisterSaveLayout {
    /// # Panics
    /// Panics when the arrays differ in length or either side contains a
    /// duplicate: the map must be a bijection for unwinding to recover a
    /// unique value per register.
    pub fn new(registers: Vec<Register>, slots: Vec<i32>) -> Self {
        assert!(
            registers.len() == slots.len(),
            "save layout maps {} registers to {} slots",
            registers.len(),
            slots.len()
        );
        for (i, reg) in registers.iter().enumerate() {
            assert!(
                !registers[..i].contains(reg),
                "register {} saved twice",
                reg
            );
        }
        for (i, slot) in slots.iter().enumerate() {
            assert!(
                !slots[..i].contains(slot),
                "slot {} holds two saved registers",
                slot
            );
        }
        Self { registers, slots }
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn register_to_slot(&self, reg: Register) -> Option<i32> {
        self.registers
            .iter()
            .position(|r| *r == reg)
            .map(|i| self.slots[i])
    }

    pub fn slot_to_register(&self, slot: i32) -> Option<Register> {
        self.slots
            .iter()
            .position(|s| *s == slot)
            .map(|i| self.registers[i])
    }

    /// Pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, i32)> + '_ {
        self.registers.iter().copied().zip(self.slots.iter().copied())
    }
}

impl fmt::Display for RegisterSaveLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("saved{")?;
        for (i, (reg, slot)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{reg}->{slot}")?;
        }
        f.write_str("}")
    }
}

/// A program point's position: either a full frame chain usable for
/// deoptimization, or a bare position good only for stack traces.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOrPosition {
    Frame(BytecodeFrame),
    Position(BytecodePosition),
}

/// All metadata recorded for one program point in compiled code.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugInfo {
    position: FrameOrPosition,
    reference_map: Option<ReferenceMap>,
    /// Pool of escaped objects at this point, indexed by [`VirtualObjectId`].
    virtual_objects: Vec<VirtualObject>,
    callee_save_info: Option<RegisterSaveLayout>,
}

impl DebugInfo {
    /// # Panics
    /// Panics when the pool is not dense (object ids must equal pool
    /// indices, since debug values refer to objects by id).
    pub fn new(
        position: FrameOrPosition,
        reference_map: Option<ReferenceMap>,
        virtual_objects: Vec<VirtualObject>,
        callee_save_info: Option<RegisterSaveLayout>,
    ) -> Self {
        for (i, obj) in virtual_objects.iter().enumerate() {
            assert!(
                obj.id() == VirtualObjectId(i as u32),
                "virtual object pool not dense: {} at index {}",
                obj.id(),
                i
            );
        }
        Self {
            position,
            reference_map,
            virtual_objects,
            callee_save_info,
        }
    }

    /// Info carrying only a position, for program points that are never
    /// deoptimization targets.
    pub fn position_only(position: BytecodePosition) -> Self {
        Self::new(FrameOrPosition::Position(position), None, Vec::new(), None)
    }

    /// Whether full interpreter state can be rebuilt at this point.
    pub fn has_frame(&self) -> bool {
        matches!(self.position, FrameOrPosition::Frame(_))
    }

    pub fn frame(&self) -> Option<&BytecodeFrame> {
        match &self.position {
            FrameOrPosition::Frame(frame) => Some(frame),
            FrameOrPosition::Position(_) => None,
        }
    }

    /// The bare position chain at this point. Synthesized from the frame
    /// chain when full frame state is present.
    pub fn position(&self) -> BytecodePosition {
        match &self.position {
            FrameOrPosition::Frame(frame) => frame.position(),
            FrameOrPosition::Position(position) => position.clone(),
        }
    }

    pub fn reference_map(&self) -> Option<&ReferenceMap> {
        self.reference_map.as_ref()
    }

    pub fn virtual_objects(&self) -> &[VirtualObject] {
        &self.virtual_objects
    }

    pub fn virtual_object(&self, id: VirtualObjectId) -> Option<&VirtualObject> {
        self.virtual_objects.get(id.0 as usize)
    }

    pub fn callee_save_info(&self) -> Option<&RegisterSaveLayout> {
        self.callee_save_info.as_ref()
    }

    /// Run the whole-graph consistency checks: frame-chain format, virtual
    /// object layouts, and pool-reference sanity.
    pub fn verify(&self) -> CodeResult<()> {
        if let Some(frame) = self.frame() {
            frame.validate_format()?;
            let mut link = Some(frame);
            while let Some(frame) = link {
                self.check_pool_refs(frame.values())?;
                link = frame.caller();
            }
        }
        for obj in &self.virtual_objects {
            obj.verify_layout()?;
            self.check_pool_refs(obj.values())?;
        }
        Ok(())
    }

    fn check_pool_refs(&self, values: &[DebugValue]) -> CodeResult<()> {
        for value in values {
            if let DebugValue::Virtual(id) = value {
                if self.virtual_object(*id).is_none() {
                    return Err(CodeError::FrameFormat {
                        reason: format!(
                            "{} referenced but pool holds {} objects",
                            id,
                            self.virtual_objects.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            FrameOrPosition::Frame(frame) => write!(f, "{frame}")?,
            FrameOrPosition::Position(position) => writeln!(f, "{position}")?,
        }
        if let Some(map) = &self.reference_map {
            writeln!(f, "  {map}")?;
        }
        for obj in &self.virtual_objects {
            writeln!(f, "  {obj}")?;
        }
        if let Some(saved) = &self.callee_save_info {
            writeln!(f, "  {saved}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arch::RegisterCategory;
    use crate::core::kind::ValueKind;
    use crate::core::meta::test_support::{TestMethod, TestType};
    use crate::core::meta::MethodSignature;

    const CPU: RegisterCategory = RegisterCategory {
        name: "CPU",
        may_contain_reference: true,
    };

    fn reg(n: i16, name: &'static str) -> Register {
        Register::new(n, n, name, CPU)
    }

    #[test]
    fn test_save_layout_lookup() {
        let r1 = reg(1, "r1");
        let r2 = reg(2, "r2");
        let layout = RegisterSaveLayout::new(vec![r1, r2], vec![0, 8]);
        assert_eq!(layout.register_to_slot(r2), Some(8));
        assert_eq!(layout.register_to_slot(r1), Some(0));
        assert_eq!(layout.slot_to_register(8), Some(r2));
        assert_eq!(layout.register_to_slot(reg(3, "r3")), None);
        assert_eq!(layout.len(), 2);
    }

    #[test]
    #[should_panic(expected = "saved twice")]
    fn test_save_layout_duplicate_register_rejected() {
        let r1 = reg(1, "r1");
        let _ = RegisterSaveLayout::new(vec![r1, r1], vec![0, 8]);
    }

    #[test]
    #[should_panic(expected = "holds two saved registers")]
    fn test_save_layout_duplicate_slot_rejected() {
        let _ = RegisterSaveLayout::new(vec![reg(1, "r1"), reg(2, "r2")], vec![8, 8]);
    }

    fn position() -> BytecodePosition {
        let m = TestMethod::handle("m", 10, true, MethodSignature::new(vec![], None));
        BytecodePosition::root(m, 3)
    }

    fn test_method() -> crate::core::meta::MethodHandle {
        TestMethod::handle("m", 10, true, MethodSignature::new(vec![], None))
    }

    #[test]
    fn test_has_frame_distinguishes_positions() {
        let info = DebugInfo::position_only(position());
        assert!(!info.has_frame());
        assert!(info.frame().is_none());

        let frame =
            BytecodeFrame::new(None, test_method(), 3, vec![], vec![], 0, 0, false, false);
        let info = DebugInfo::new(FrameOrPosition::Frame(frame), None, Vec::new(), None);
        assert!(info.has_frame());
        assert_eq!(info.position().bci(), 3);
    }

    #[test]
    fn test_verify_rejects_dangling_pool_reference() {
        let frame = BytecodeFrame::new(
            None,
            test_method(),
            3,
            vec![DebugValue::Virtual(VirtualObjectId(0))],
            vec![ValueKind::Object],
            1,
            0,
            false,
            false,
        );
        let info = DebugInfo::new(FrameOrPosition::Frame(frame), None, Vec::new(), None);
        assert!(info.verify().is_err());
    }

    #[test]
    fn test_verify_rejects_dangling_reference_in_caller_frame() {
        let caller = BytecodeFrame::new(
            None,
            test_method(),
            3,
            vec![DebugValue::Virtual(VirtualObjectId(0))],
            vec![ValueKind::Object],
            1,
            0,
            false,
            false,
        );
        let inner = BytecodeFrame::new(
            Some(std::sync::Arc::new(caller)),
            test_method(),
            0,
            vec![],
            vec![],
            0,
            0,
            false,
            false,
        );
        let info = DebugInfo::new(FrameOrPosition::Frame(inner), None, Vec::new(), None);
        assert!(info.verify().is_err());
    }

    #[test]
    #[should_panic(expected = "pool not dense")]
    fn test_pool_must_be_dense() {
        let ty = TestType::instance("T", vec![]);
        let stray = VirtualObject::new(VirtualObjectId(5), ty, vec![], vec![], false);
        let _ = DebugInfo::new(
            FrameOrPosition::Position(position()),
            None,
            vec![stray],
            None,
        );
    }
}
