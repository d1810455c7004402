// This module implements BytecodeFrame: one link of an inlined call chain
// enriched with the values needed to rebuild that method's interpreter frame.
// Frames chain outward through caller(), so a deoptimization produces one
// interpreter frame per link; the bare BytecodePosition chain can be derived
// from a frame chain for stack-trace purposes. The value array is flat,
// partitioned into three contiguous zones - locals [0, num_locals), operand
// stack [num_locals, num_locals+num_stack) and locked objects
// [num_locals+num_stack, end) - with a parallel kind array covering locals and
// stack only. Construction consumes the buffers (single-owner mutation model:
// a later register-allocation pass may rewrite locations in place through
// values_mut, and no other alias may exist). Constructor invariants are
// asserted; whole-chain format validation walks caller-first and reports
// violations as fatal FrameFormat errors: a two-slot kind must be followed by
// the explicit illegal placeholder, rethrow_exception requires the single
// pending exception as the only stack entry, and INVALID_FRAMESTATE positions
// must never be used as deoptimization targets.

//! Per-position interpreter frame state for deoptimization.

use std::fmt;
use std::sync::Arc;

use crate::core::error::{CodeError, CodeResult};
use crate::core::kind::ValueKind;
use crate::core::location::DebugValue;
use crate::core::meta::MethodHandle;

use super::position::{assert_valid_bci, BytecodePosition, INVALID_FRAMESTATE_BCI};

/// Interpreter frame state at one link of an inlined call chain.
///
/// The chain runs innermost-out: `self` is the position itself, `caller()`
/// the method it was inlined into, and so on to the compilation root.
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodeFrame {
    caller: Option<Arc<BytecodeFrame>>,
    method: MethodHandle,
    bci: i32,
    /// Flat value array: locals, then operand stack, then lock slots.
    values: Vec<DebugValue>,
    /// Kinds for the locals and stack zones; lock slots carry no kind.
    slot_kinds: Vec<ValueKind>,
    num_locals: usize,
    num_stack: usize,
    num_locks: usize,
    /// The single stack value is a pending exception that must be re-thrown
    /// instead of re-executing the bytecode at this position.
    pub rethrow_exception: bool,
    /// The call at this position already completed: arguments are popped and
    /// the return value (for non-void calls) is not yet pushed. The
    /// interpreter must resume after the call, not retry it.
    pub during_call: bool,
}

impl BytecodeFrame {
    /// Construction consumes `values` and `slot_kinds`; the frame is their
    /// single owner from here on.
    ///
    /// # Panics
    /// Panics when `bci` is neither a reserved marker nor within the method's
    /// code, when the zone sizes do not sum to `values.len()`, when
    /// `slot_kinds` does not cover exactly locals+stack, or when
    /// `rethrow_exception` is set with `num_stack != 1`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        caller: Option<Arc<BytecodeFrame>>,
        method: MethodHandle,
        bci: i32,
        values: Vec<DebugValue>,
        slot_kinds: Vec<ValueKind>,
        num_locals: usize,
        num_stack: usize,
        rethrow_exception: bool,
        during_call: bool,
    ) -> Self {
        assert_valid_bci(&method, bci);
        assert!(
            values.len() >= num_locals + num_stack,
            "value array of {} too small for {} locals + {} stack",
            values.len(),
            num_locals,
            num_stack
        );
        let num_locks = values.len() - num_locals - num_stack;
        assert!(
            slot_kinds.len() == num_locals + num_stack,
            "kind array covers {} slots, expected {}",
            slot_kinds.len(),
            num_locals + num_stack
        );
        assert!(
            !rethrow_exception || num_stack == 1,
            "rethrow_exception requires exactly the pending exception on the stack, found {num_stack} entries"
        );
        Self {
            caller,
            method,
            bci,
            values,
            slot_kinds,
            num_locals,
            num_stack,
            num_locks,
            rethrow_exception,
            during_call,
        }
    }

    pub fn method(&self) -> &MethodHandle {
        &self.method
    }

    pub fn bci(&self) -> i32 {
        self.bci
    }

    pub fn caller(&self) -> Option<&BytecodeFrame> {
        self.caller.as_deref()
    }

    pub fn caller_arc(&self) -> Option<&Arc<BytecodeFrame>> {
        self.caller.as_ref()
    }

    /// The bare position chain for this frame chain, for stack-trace use.
    pub fn position(&self) -> BytecodePosition {
        let caller = self
            .caller()
            .map(|frame| Arc::new(frame.position()));
        BytecodePosition::new(caller, self.method.clone(), self.bci)
    }

    /// Number of frames in the chain, this one included.
    pub fn depth(&self) -> usize {
        1 + self.caller().map_or(0, BytecodeFrame::depth)
    }

    pub fn num_locals(&self) -> usize {
        self.num_locals
    }

    pub fn num_stack(&self) -> usize {
        self.num_stack
    }

    pub fn num_locks(&self) -> usize {
        self.num_locks
    }

    pub fn values(&self) -> &[DebugValue] {
        &self.values
    }

    /// Mutable view of the value buffer for the in-place rewrite a
    /// register-allocation pass performs before installation. The frame is
    /// the buffer's single owner; callers must not retain the reference.
    pub fn values_mut(&mut self) -> &mut [DebugValue] {
        &mut self.values
    }

    pub fn slot_kinds(&self) -> &[ValueKind] {
        &self.slot_kinds
    }

    /// Value of local variable `i`.
    ///
    /// # Panics
    /// Panics when `i >= num_locals`.
    pub fn local_value(&self, i: usize) -> DebugValue {
        assert!(i < self.num_locals, "local index {i} out of {}", self.num_locals);
        self.values[i]
    }

    /// Value of operand-stack slot `i`.
    ///
    /// # Panics
    /// Panics when `i >= num_stack`.
    pub fn stack_value(&self, i: usize) -> DebugValue {
        assert!(i < self.num_stack, "stack index {i} out of {}", self.num_stack);
        self.values[self.num_locals + i]
    }

    /// Object locked by monitor `i`.
    ///
    /// # Panics
    /// Panics when `i >= num_locks`.
    pub fn lock_value(&self, i: usize) -> DebugValue {
        assert!(i < self.num_locks, "lock index {i} out of {}", self.num_locks);
        self.values[self.num_locals + self.num_stack + i]
    }

    /// Kind of local slot `i`.
    pub fn local_kind(&self, i: usize) -> ValueKind {
        assert!(i < self.num_locals, "local index {i} out of {}", self.num_locals);
        self.slot_kinds[i]
    }

    /// Kind of stack slot `i`.
    pub fn stack_kind(&self, i: usize) -> ValueKind {
        assert!(i < self.num_stack, "stack index {i} out of {}", self.num_stack);
        self.slot_kinds[self.num_locals + i]
    }

    /// Validate the format of this frame and, recursively, of the caller
    /// chain (caller first, so the outermost violation is reported first).
    ///
    /// Checked here rather than at construction because slot kinds may only
    /// become final after the in-place location rewrite.
    pub fn validate_format(&self) -> CodeResult<()> {
        if let Some(caller) = self.caller() {
            caller.validate_format()?;
        }
        if self.bci == INVALID_FRAMESTATE_BCI {
            return Err(CodeError::FrameFormat {
                reason: format!(
                    "frame for {} has no recorded frame state and cannot be a deopt target",
                    self.method
                ),
            });
        }
        let mut i = 0;
        while i < self.slot_kinds.len() {
            let kind = self.slot_kinds[i];
            if kind.slot_count() == 2 {
                if self.slot_kinds.get(i + 1) != Some(&ValueKind::Illegal) {
                    return Err(CodeError::FrameFormat {
                        reason: format!(
                            "two-slot {} at slot {} of {} not followed by illegal placeholder",
                            kind, i, self.method
                        ),
                    });
                }
                i += 2;
            } else {
                i += 1;
            }
        }
        if self.rethrow_exception && self.stack_kind(0) != ValueKind::Object {
            return Err(CodeError::FrameFormat {
                reason: format!(
                    "rethrow frame for {} holds a non-reference on the stack",
                    self.method
                ),
            });
        }
        Ok(())
    }
}

impl fmt::Display for BytecodeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.position())?;
        if self.rethrow_exception {
            writeln!(f, "  rethrow pending exception")?;
        }
        if self.during_call {
            writeln!(f, "  during call, resume after")?;
        }
        for i in 0..self.num_locals {
            writeln!(
                f,
                "  local[{}] = {} ({})",
                i,
                self.local_value(i),
                self.local_kind(i).type_char()
            )?;
        }
        for i in 0..self.num_stack {
            writeln!(
                f,
                "  stack[{}] = {} ({})",
                i,
                self.stack_value(i),
                self.stack_kind(i).type_char()
            )?;
        }
        for i in 0..self.num_locks {
            writeln!(f, "  lock[{}] = {}", i, self.lock_value(i))?;
        }
        Ok(())
    }
}
