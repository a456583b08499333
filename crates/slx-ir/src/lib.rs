//! slx intermediate representation.
//!
//! An arena-based IR for compiled shader libraries, built for linking:
//! entities reference each other through typed handles, cross-module
//! references are resolved by symbol name, and cloning a function between
//! modules is an explicit handle remap through a [`ValueMap`].
//!
//! The crate also carries the shader metadata that travels with a module
//! ([`ShaderInfo`]) and the intrinsic operation tables ([`ops`]).

pub mod arena;
mod clone;
mod display;
mod expr;
mod func;
mod global;
mod meta;
mod module;
pub mod ops;
mod shader;
mod stmt;
mod types;

pub use arena::{Arena, Handle, UniqueArena};
pub use clone::{
    ValueMap, clone_const_expr, clone_function_into, clone_global_into,
    declare_matching_function, map_type,
};
pub use display::{dump_module, format_type};
pub use expr::{BinaryOp, Expression, Literal, UnaryOp};
pub use func::{FnAttrs, Function, FunctionParam, Linkage, LocalVariable};
pub use global::{AddressSpace, GlobalVariable, StorageAccess};
pub use meta::{
    EntrySignature, FunctionProps, HullProps, Reflection, ReflectionBinding, Resource,
    ResourceClass, ResourceKind, ShaderInfo, SignatureElement,
};
pub use module::{CtorEntry, Module};
pub use shader::{SHADER_MODELS, ShaderKind, ShaderModel};
pub use stmt::{Block, Statement};
pub use types::{ArraySize, Bytes, Scalar, ScalarKind, StructMember, Type, TypeInner, VectorSize};
