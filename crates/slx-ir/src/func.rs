//! Functions, parameters, and local variables.

use crate::arena::{Arena, Handle};
use crate::expr::Expression;
use crate::stmt::Block;
use crate::types::Type;

/// Symbol visibility of a function or global.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Linkage {
    /// Visible to other libraries; the name is the authored name.
    External,
    /// Private to the defining library. Renamed on library ingest so names
    /// stay unique across libraries.
    Internal,
}

/// Bitflags for function attributes.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct FnAttrs(u32);

impl FnAttrs {
    /// No attributes.
    pub const EMPTY: Self = Self(0);
    /// Must be inlined into its callers before code generation.
    pub const ALWAYS_INLINE: Self = Self(1);
    /// Reads no memory; result depends on arguments alone.
    pub const READ_NONE: Self = Self(2);
    /// Reads but never writes memory.
    pub const READ_ONLY: Self = Self(4);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flags are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Removes the flags in `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for FnAttrs {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FnAttrs {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A formal parameter declaration.
#[derive(Clone, Debug)]
pub struct FunctionParam {
    /// Optional parameter name.
    pub name: Option<String>,
    /// The type of this parameter.
    pub ty: Handle<Type>,
}

/// A function-local variable.
#[derive(Clone, Debug)]
pub struct LocalVariable {
    /// Optional variable name.
    pub name: Option<String>,
    /// The type of this variable.
    pub ty: Handle<Type>,
    /// Optional initializer expression.
    pub init: Option<Handle<Expression>>,
}

/// An IR function: a definition when `body` is present, otherwise a
/// declaration resolved by name at link time.
#[derive(Clone, Debug)]
pub struct Function {
    /// Symbol name. Unique within a module.
    pub name: String,
    /// Symbol visibility.
    pub linkage: Linkage,
    /// Function attributes.
    pub attributes: FnAttrs,
    /// Formal parameters.
    pub params: Vec<FunctionParam>,
    /// Return type; `None` means void.
    pub result: Option<Handle<Type>>,
    /// Function-local variable declarations.
    pub local_variables: Arena<LocalVariable>,
    /// Expression arena for this function.
    pub expressions: Arena<Expression>,
    /// The body; `None` for declarations.
    pub body: Option<Block>,
}

impl Function {
    /// Creates an empty externally visible definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            linkage: Linkage::External,
            attributes: FnAttrs::EMPTY,
            params: Vec::new(),
            result: None,
            local_variables: Arena::new(),
            expressions: Arena::new(),
            body: Some(Block::new()),
        }
    }

    /// Creates a bodyless declaration.
    pub fn declaration(name: impl Into<String>) -> Self {
        Self {
            body: None,
            ..Self::new(name)
        }
    }

    /// Returns `true` if this function has no body.
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_definition() {
        let f = Function::new("main");
        assert_eq!(f.name, "main");
        assert!(!f.is_declaration());
        assert_eq!(f.linkage, Linkage::External);
    }

    #[test]
    fn declaration_has_no_body() {
        let f = Function::declaration("op.sin.f32");
        assert!(f.is_declaration());
    }

    #[test]
    fn attr_flags() {
        let mut attrs = FnAttrs::ALWAYS_INLINE | FnAttrs::READ_NONE;
        assert!(attrs.contains(FnAttrs::ALWAYS_INLINE));
        attrs.remove(FnAttrs::ALWAYS_INLINE);
        assert!(!attrs.contains(FnAttrs::ALWAYS_INLINE));
        assert!(attrs.contains(FnAttrs::READ_NONE));
    }
}
