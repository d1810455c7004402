// This module defines error types for the jitmeta metadata contract using the
// thiserror crate for idiomatic Rust error handling. Bailout is the recoverable
// class: a compilation or code installation that cannot proceed, carrying a flag
// distinguishing permanent failures (retrying is pointless, e.g. a blob over the
// cache's size limit) from transient ones (retry may succeed, e.g. a full code
// cache). CodeError is the crate-wide taxonomy covering bailouts, frame-format
// violations, virtual-object layout mismatches, unsupported operations and
// execution attempts against invalidated code. Format and layout variants are
// compiler-bug class: they indicate the compiler emitted inconsistent metadata
// and the consuming deoptimization must abort with the carried diagnostic.
// CodeResult<T> is the convenience alias used throughout the crate.

//! Error types for the metadata contract.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

/// A compilation or installation that cannot proceed.
///
/// Bailouts are recoverable at the granularity of one compilation unit. The
/// `permanent` flag tells the compiler driver whether retrying the same
/// request can ever succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct Bailout {
    /// Retrying is pointless when set.
    pub permanent: bool,
    /// Human-readable cause, surfaced to the compiler driver.
    pub reason: String,
}

impl Bailout {
    /// A bailout that a retry may clear (e.g. code cache momentarily full).
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            permanent: false,
            reason: reason.into(),
        }
    }

    /// A bailout no retry can clear (e.g. blob exceeds the cache size limit).
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            permanent: true,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Bailout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let class = if self.permanent { "permanent" } else { "transient" };
        write!(f, "{} bailout: {}", class, self.reason)
    }
}

/// Main error type for metadata construction, validation and installation.
#[derive(Error, Debug)]
pub enum CodeError {
    #[error(transparent)]
    Bailout(#[from] Bailout),

    /// The frame chain violates the documented format. Compiler-bug class.
    #[error("invalid frame format: {reason}")]
    FrameFormat { reason: String },

    /// A virtual object does not match its type's declared layout.
    /// Compiler-bug class; aborts the deoptimization that consumes it.
    #[error("virtual object {id} layout mismatch: {reason}")]
    VirtualObjectLayout { id: u32, reason: String },

    /// Operation not available on this handle (e.g. rebinding a foreign
    /// installed-code handle). Distinct from a bailout.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// Execution or metadata access attempted against invalidated code.
    #[error("installed code '{name}' is no longer valid")]
    InvalidInstalledCode { name: String },
}

/// Result type alias for metadata operations.
pub type CodeResult<T> = Result<T, CodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bailout_display_carries_permanence() {
        let t = Bailout::transient("code cache full");
        let p = Bailout::permanent("blob exceeds size limit");
        assert_eq!(t.to_string(), "transient bailout: code cache full");
        assert_eq!(p.to_string(), "permanent bailout: blob exceeds size limit");
    }

    #[test]
    fn test_bailout_converts_into_code_error() {
        let err: CodeError = Bailout::transient("cache full").into();
        assert!(matches!(err, CodeError::Bailout(ref b) if !b.permanent));
    }
}
