// This module defines the seam to the external resolved-method/type provider:
// the VM side that owns class metadata. jitmeta never caches or mutates what
// these traits return; it queries on demand to validate bytecode positions
// (code-size bounds), derive calling conventions (signatures) and verify
// virtual-object layouts (declared instance-field order). MethodHandle and
// TypeHandle wrap the trait objects with pointer-identity equality, which is
// the identity model the deoptimization metadata needs: two positions are in
// the same method iff they hold the same provider object, regardless of what
// structural data the provider exposes.

//! Provider traits for method and type metadata supplied by the VM.

use std::fmt;
use std::sync::Arc;

use super::kind::ValueKind;

/// Signature of a method: parameter kinds in declaration order plus the
/// return kind (`ValueKind::Illegal` is not a valid return kind; void returns
/// are expressed by the calling convention having no return location).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub parameter_kinds: Vec<ValueKind>,
    pub return_kind: Option<ValueKind>,
}

impl MethodSignature {
    pub fn new(parameter_kinds: Vec<ValueKind>, return_kind: Option<ValueKind>) -> Self {
        Self {
            parameter_kinds,
            return_kind,
        }
    }

    /// The parameter kinds as passed at a call site, prepending the implicit
    /// `Object` receiver for instance methods.
    pub fn parameter_kinds_with_receiver(&self, include_receiver: bool) -> Vec<ValueKind> {
        let mut kinds = Vec::with_capacity(self.parameter_kinds.len() + 1);
        if include_receiver {
            kinds.push(ValueKind::Object);
        }
        kinds.extend_from_slice(&self.parameter_kinds);
        kinds
    }
}

/// A method resolved by the VM. Supplies the bounds and signature data the
/// metadata model validates against.
pub trait ResolvedMethod: Send + Sync {
    fn name(&self) -> &str;
    /// Size of the method's code in bytecodes. Zero for synthetic methods,
    /// which exempts positions in them from BCI bounds checks.
    fn code_size(&self) -> usize;
    fn is_static(&self) -> bool;
    fn signature(&self) -> &MethodSignature;
}

/// Layout of one declared instance field, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    /// Byte offset of the field within an instance.
    pub offset: i32,
    pub kind: ValueKind,
}

/// A type resolved by the VM. Supplies the declared layout virtual objects
/// are verified against.
pub trait ResolvedType: Send + Sync {
    fn name(&self) -> &str;
    fn is_array(&self) -> bool;
    /// Element kind for array types, `None` otherwise.
    fn component_kind(&self) -> Option<ValueKind>;
    /// Declared instance fields, superclass fields first. Empty for arrays.
    fn instance_fields(&self) -> &[FieldLayout];
}

/// Shared handle to a resolved method with pointer-identity equality.
#[derive(Clone)]
pub struct MethodHandle(pub Arc<dyn ResolvedMethod>);

impl MethodHandle {
    pub fn new(method: Arc<dyn ResolvedMethod>) -> Self {
        Self(method)
    }
}

impl std::ops::Deref for MethodHandle {
    type Target = dyn ResolvedMethod;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl PartialEq for MethodHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MethodHandle {}

impl std::hash::Hash for MethodHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodHandle({})", self.0.name())
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}

/// Shared handle to a resolved type with pointer-identity equality.
#[derive(Clone)]
pub struct TypeHandle(pub Arc<dyn ResolvedType>);

impl TypeHandle {
    pub fn new(ty: Arc<dyn ResolvedType>) -> Self {
        Self(ty)
    }
}

impl std::ops::Deref for TypeHandle {
    type Target = dyn ResolvedType;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TypeHandle {}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({})", self.0.name())
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use test_support::TestMethod;

    #[test]
    fn test_receiver_prepended_for_instance_methods() {
        let sig = MethodSignature::new(vec![ValueKind::Int], Some(ValueKind::Int));
        assert_eq!(
            sig.parameter_kinds_with_receiver(true),
            vec![ValueKind::Object, ValueKind::Int]
        );
        assert_eq!(
            sig.parameter_kinds_with_receiver(false),
            vec![ValueKind::Int]
        );
    }

    #[test]
    fn test_method_handle_identity_equality() {
        let sig = MethodSignature::new(vec![], None);
        let a = TestMethod::handle("m", 10, true, sig.clone());
        let b = a.clone();
        let c = TestMethod::handle("m", 10, true, sig);
        assert_eq!(a, b);
        assert_ne!(a, c); // same structure, different provider object

        let via_arc = MethodHandle::new(Arc::clone(&a.0));
        assert_eq!(a, via_arc);
    }
}
