//! Bytecode positions: the inlined call chain at a program point.
//!
//! A [`BytecodePosition`] is a cons-list from the innermost inlined method
//! out to the root compilation method. Links are shared immutably via `Arc`:
//! prepending a caller builds a new chain, the original is never touched.
//!
//! Six reserved negative BCIs mark synthetic positions with no literal
//! bytecode index. They are mutually exclusive markers, never real indices,
//! and each implies a specific monitor state documented on the constant.

use std::fmt;
use std::sync::Arc;

use crate::core::meta::MethodHandle;

/// The method is at its entry point: no bytecode executed yet, no monitors
/// acquired.
pub const BEFORE_BCI: i32 = -1;
/// The method has completed a normal return; monitors it acquired have been
/// released.
pub const AFTER_BCI: i32 = -2;
/// The method is unwinding on an exception and still holds its monitors;
/// the deopt target must release them.
pub const UNWIND_BCI: i32 = -3;
/// The method is unwinding on an exception and has already released its
/// monitors.
pub const AFTER_EXCEPTION_BCI: i32 = -4;
/// The position within the method is unknown; usable for stack traces only.
pub const UNKNOWN_BCI: i32 = -5;
/// The frame state at this position was deliberately not recorded. Using a
/// frame with this BCI as a deoptimization target is a contract violation.
pub const INVALID_FRAMESTATE_BCI: i32 = -6;

/// Whether `bci` is one of the reserved synthetic markers.
pub fn is_placeholder_bci(bci: i32) -> bool {
    (INVALID_FRAMESTATE_BCI..=BEFORE_BCI).contains(&bci)
}

/// Shared bound check for positions and frames.
///
/// # Panics
/// Panics when `bci` is neither a reserved marker nor within the method's
/// code. Methods with zero code size (synthetic methods) are exempt.
pub(crate) fn assert_valid_bci(method: &MethodHandle, bci: i32) {
    let code_size = method.code_size();
    assert!(
        is_placeholder_bci(bci) || code_size == 0 || (0..code_size as i32).contains(&bci),
        "bci {bci} out of range for {method} (code size {code_size})"
    );
}

/// One link of an inlined call chain: a method and a position in it.
///
/// Immutable; the `caller` chain is shared structurally.
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodePosition {
    caller: Option<Arc<BytecodePosition>>,
    method: MethodHandle,
    bci: i32,
}

impl BytecodePosition {
    /// # Panics
    /// Panics when `bci` is neither a reserved marker nor within the
    /// method's code. Methods with zero code size (synthetic methods) are
    /// exempt from the bound.
    pub fn new(caller: Option<Arc<BytecodePosition>>, method: MethodHandle, bci: i32) -> Self {
        assert_valid_bci(&method, bci);
        Self {
            caller,
            method,
            bci,
        }
    }

    /// Innermost position with no caller.
    pub fn root(method: MethodHandle, bci: i32) -> Self {
        Self::new(None, method, bci)
    }

    pub fn method(&self) -> &MethodHandle {
        &self.method
    }

    pub fn bci(&self) -> i32 {
        self.bci
    }

    pub fn caller(&self) -> Option<&BytecodePosition> {
        self.caller.as_deref()
    }

    pub fn caller_arc(&self) -> Option<&Arc<BytecodePosition>> {
        self.caller.as_ref()
    }

    /// A copy of this chain with `caller` appended at the outermost end.
    /// Structural: the receiver is never mutated.
    pub fn add_caller(&self, caller: Arc<BytecodePosition>) -> BytecodePosition {
        match &self.caller {
            None => BytecodePosition::new(Some(caller), self.method.clone(), self.bci),
            Some(existing) => BytecodePosition::new(
                Some(Arc::new(existing.add_caller(caller))),
                self.method.clone(),
                self.bci,
            ),
        }
    }

    /// Number of links in the chain, this position included.
    pub fn depth(&self) -> usize {
        1 + self.caller().map_or(0, BytecodePosition::depth)
    }
}

impl fmt::Display for BytecodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ ", self.method)?;
        match self.bci {
            BEFORE_BCI => f.write_str("<before>"),
            AFTER_BCI => f.write_str("<after>"),
            UNWIND_BCI => f.write_str("<unwind>"),
            AFTER_EXCEPTION_BCI => f.write_str("<after-exception>"),
            UNKNOWN_BCI => f.write_str("<unknown>"),
            INVALID_FRAMESTATE_BCI => f.write_str("<invalid>"),
            bci => write!(f, "{bci}"),
        }?;
        if let Some(caller) = self.caller() {
            write!(f, "\n  inlined into {caller}")?;
        }
        Ok(())
    }
}
