//! Intrinsic operations and the per-module op-function registry.
//!
//! An intrinsic call is an ordinary [`Statement::Call`] whose callee is a
//! specially named declaration (`op.<class>[.<overload>]`) and whose first
//! argument is the op code as an `i32` literal. Intrinsic functions are
//! shared by name across modules; the linker re-declares them in its output
//! instead of cloning them.

use std::collections::HashMap;

use crate::arena::{Handle, UniqueArena};
use crate::expr::Expression;
use crate::func::{FnAttrs, Function, FunctionParam};
use crate::module::Module;
use crate::stmt::Statement;
use crate::types::{Scalar, ScalarKind, Type, TypeInner};

/// Name prefix shared by every intrinsic op function.
pub const OP_PREFIX: &str = "op.";

/// Number of overload type slots.
pub const NUM_OVERLOADS: usize = 9;

/// Overload suffix per slot: void, f16, f32, f64, i1, i8, i16, i32, i64.
/// The void slot has no suffix.
pub const OVERLOAD_TYPE_NAMES: [&str; NUM_OVERLOADS] =
    ["void", "f16", "f32", "f64", "i1", "i8", "i16", "i32", "i64"];

// Overload legality masks, bit i = slot i.
const VOID: u16 = 1 << 0;
const F16: u16 = 1 << 1;
const F32: u16 = 1 << 2;
const F64: u16 = 1 << 3;
const I16: u16 = 1 << 6;
const I32: u16 = 1 << 7;
const I64: u16 = 1 << 8;

const FLT_HF: u16 = F16 | F32;
const FLT_ALL: u16 = F16 | F32 | F64;
const INT_STD: u16 = I16 | I32 | I64;
const LOADABLE: u16 = F16 | F32 | I16 | I32;

/// The shape class of an intrinsic. Ops in the same class share one
/// function signature scheme and one name stem. Discriminants index the
/// registry cache.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[repr(usize)]
pub enum OpCodeClass {
    Unary = 0,
    Binary = 1,
    Tertiary = 2,
    UnaryBits = 3,
    Dot2 = 4,
    Dot3 = 5,
    Dot4 = 6,
    IsSpecialFloat = 7,
    CreateHandle = 8,
    CBufferLoad = 9,
    Sample = 10,
    SampleLevel = 11,
    BufferLoad = 12,
    BufferStore = 13,
    LoadInput = 14,
    StoreOutput = 15,
    ThreadId = 16,
    GroupId = 17,
    ThreadIdInGroup = 18,
    FlattenedThreadIdInGroup = 19,
    OutputControlPointId = 20,
    ViewId = 21,
    Barrier = 22,
    AtomicBinOp = 23,
}

/// All op-code classes, in cache order.
pub const OP_CODE_CLASSES: [OpCodeClass; 24] = [
    OpCodeClass::Unary,
    OpCodeClass::Binary,
    OpCodeClass::Tertiary,
    OpCodeClass::UnaryBits,
    OpCodeClass::Dot2,
    OpCodeClass::Dot3,
    OpCodeClass::Dot4,
    OpCodeClass::IsSpecialFloat,
    OpCodeClass::CreateHandle,
    OpCodeClass::CBufferLoad,
    OpCodeClass::Sample,
    OpCodeClass::SampleLevel,
    OpCodeClass::BufferLoad,
    OpCodeClass::BufferStore,
    OpCodeClass::LoadInput,
    OpCodeClass::StoreOutput,
    OpCodeClass::ThreadId,
    OpCodeClass::GroupId,
    OpCodeClass::ThreadIdInGroup,
    OpCodeClass::FlattenedThreadIdInGroup,
    OpCodeClass::OutputControlPointId,
    OpCodeClass::ViewId,
    OpCodeClass::Barrier,
    OpCodeClass::AtomicBinOp,
];

/// Number of op-code classes.
pub const NUM_OP_CLASSES: usize = OP_CODE_CLASSES.len();

impl OpCodeClass {
    /// The name stem used in op function names.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::Binary => "binary",
            Self::Tertiary => "tertiary",
            Self::UnaryBits => "unaryBits",
            Self::Dot2 => "dot2",
            Self::Dot3 => "dot3",
            Self::Dot4 => "dot4",
            Self::IsSpecialFloat => "isSpecialFloat",
            Self::CreateHandle => "createHandle",
            Self::CBufferLoad => "cbufferLoad",
            Self::Sample => "sample",
            Self::SampleLevel => "sampleLevel",
            Self::BufferLoad => "bufferLoad",
            Self::BufferStore => "bufferStore",
            Self::LoadInput => "loadInput",
            Self::StoreOutput => "storeOutput",
            Self::ThreadId => "threadId",
            Self::GroupId => "groupId",
            Self::ThreadIdInGroup => "threadIdInGroup",
            Self::FlattenedThreadIdInGroup => "flattenedThreadIdInGroup",
            Self::OutputControlPointId => "outputControlPointId",
            Self::ViewId => "viewId",
            Self::Barrier => "barrier",
            Self::AtomicBinOp => "atomicBinOp",
        }
    }

    /// Index of this class in cache order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Looks up a class by its name stem.
    pub fn from_name(name: &str) -> Option<Self> {
        OP_CODE_CLASSES.iter().copied().find(|c| c.name() == name)
    }
}

macro_rules! op_codes {
    ($($op:ident = $value:literal => $class:ident, $mask:expr, $attr:expr;)*) => {
        /// An intrinsic operation code, passed as the first argument of
        /// every intrinsic call.
        #[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
        #[repr(u32)]
        pub enum OpCode {
            $($op = $value,)*
        }

        /// Static properties of every op code, indexed by op-code value.
        pub const OP_CODE_PROPS: &[OpCodeProps] = &[
            $(OpCodeProps {
                op: OpCode::$op,
                name: stringify!($op),
                class: OpCodeClass::$class,
                class_name: OpCodeClass::$class.name(),
                overloads: $mask,
                attr: $attr,
            },)*
        ];
    };
}

op_codes! {
    Sin = 0 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Cos = 1 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Tan = 2 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Exp = 3 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Log = 4 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Sqrt = 5 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Rsqrt = 6 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Frc = 7 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Round = 8 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Floor = 9 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Ceil = 10 => Unary, FLT_HF, FnAttrs::READ_NONE;
    Saturate = 11 => Unary, FLT_HF, FnAttrs::READ_NONE;
    FAbs = 12 => Unary, FLT_ALL, FnAttrs::READ_NONE;
    FMin = 13 => Binary, FLT_ALL, FnAttrs::READ_NONE;
    FMax = 14 => Binary, FLT_ALL, FnAttrs::READ_NONE;
    IMin = 15 => Binary, INT_STD, FnAttrs::READ_NONE;
    IMax = 16 => Binary, INT_STD, FnAttrs::READ_NONE;
    FMad = 17 => Tertiary, FLT_ALL, FnAttrs::READ_NONE;
    IMad = 18 => Tertiary, INT_STD, FnAttrs::READ_NONE;
    Bfrev = 19 => UnaryBits, INT_STD, FnAttrs::READ_NONE;
    Countbits = 20 => UnaryBits, INT_STD, FnAttrs::READ_NONE;
    FirstbitLo = 21 => UnaryBits, INT_STD, FnAttrs::READ_NONE;
    FirstbitHi = 22 => UnaryBits, INT_STD, FnAttrs::READ_NONE;
    Dot2 = 23 => Dot2, FLT_HF, FnAttrs::READ_NONE;
    Dot3 = 24 => Dot3, FLT_HF, FnAttrs::READ_NONE;
    Dot4 = 25 => Dot4, FLT_HF, FnAttrs::READ_NONE;
    IsNaN = 26 => IsSpecialFloat, FLT_HF, FnAttrs::READ_NONE;
    IsInf = 27 => IsSpecialFloat, FLT_HF, FnAttrs::READ_NONE;
    IsFinite = 28 => IsSpecialFloat, FLT_HF, FnAttrs::READ_NONE;
    CreateHandle = 29 => CreateHandle, VOID, FnAttrs::READ_ONLY;
    CBufferLoad = 30 => CBufferLoad, F16 | F32 | F64 | I16 | I32 | I64, FnAttrs::READ_ONLY;
    Sample = 31 => Sample, FLT_HF, FnAttrs::READ_ONLY;
    SampleLevel = 32 => SampleLevel, FLT_HF, FnAttrs::READ_ONLY;
    BufferLoad = 33 => BufferLoad, LOADABLE, FnAttrs::READ_ONLY;
    BufferStore = 34 => BufferStore, LOADABLE, FnAttrs::EMPTY;
    LoadInput = 35 => LoadInput, LOADABLE, FnAttrs::READ_NONE;
    StoreOutput = 36 => StoreOutput, LOADABLE, FnAttrs::EMPTY;
    ThreadId = 37 => ThreadId, I32, FnAttrs::READ_NONE;
    GroupId = 38 => GroupId, I32, FnAttrs::READ_NONE;
    ThreadIdInGroup = 39 => ThreadIdInGroup, I32, FnAttrs::READ_NONE;
    FlattenedThreadIdInGroup = 40 => FlattenedThreadIdInGroup, VOID, FnAttrs::READ_NONE;
    OutputControlPointId = 41 => OutputControlPointId, VOID, FnAttrs::READ_NONE;
    ViewId = 42 => ViewId, VOID, FnAttrs::READ_NONE;
    Barrier = 43 => Barrier, VOID, FnAttrs::EMPTY;
    AtomicBinOp = 44 => AtomicBinOp, I32, FnAttrs::EMPTY;
}

/// Static properties of one op code.
#[derive(Clone, Copy, Debug)]
pub struct OpCodeProps {
    /// The op code. Always equals the table index.
    pub op: OpCode,
    /// Human-readable op name.
    pub name: &'static str,
    /// Shape class.
    pub class: OpCodeClass,
    /// Name stem of the class.
    pub class_name: &'static str,
    /// Overload legality bitmap, bit i = slot i.
    pub overloads: u16,
    /// Attributes stamped on the op function.
    pub attr: FnAttrs,
}

impl OpCode {
    /// Properties of this op code.
    pub fn props(self) -> &'static OpCodeProps {
        &OP_CODE_PROPS[self as usize]
    }

    /// The op code with the given value, if any.
    pub fn from_u32(value: u32) -> Option<Self> {
        OP_CODE_PROPS.get(value as usize).map(|p| p.op)
    }
}

/// Verifies that the op-code table index equals each entry's op-code value.
/// Guards against table drift when ops are added.
pub fn check_op_code_table() -> bool {
    OP_CODE_PROPS
        .iter()
        .enumerate()
        .all(|(i, p)| p.op as usize == i)
}

/// Errors from op-function resolution.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OpError {
    /// The requested overload slot is not legal for the op.
    #[error("overload {overload} is not legal for op {op}")]
    OverloadIllegal {
        /// Human-readable op name.
        op: &'static str,
        /// Overload type name of the rejected slot.
        overload: &'static str,
    },
}

/// Maps a type to its overload slot, if it has one.
pub fn type_slot(types: &UniqueArena<Type>, ty: Handle<Type>) -> Option<usize> {
    match types[ty].inner {
        TypeInner::Void => Some(0),
        TypeInner::Scalar(s) => match (s.kind, s.width) {
            (ScalarKind::Float, 2) => Some(1),
            (ScalarKind::Float, 4) => Some(2),
            (ScalarKind::Float, 8) => Some(3),
            (ScalarKind::Bool, _) => Some(4),
            (ScalarKind::Sint | ScalarKind::Uint, 1) => Some(5),
            (ScalarKind::Sint | ScalarKind::Uint, 2) => Some(6),
            (ScalarKind::Sint | ScalarKind::Uint, 4) => Some(7),
            (ScalarKind::Sint | ScalarKind::Uint, 8) => Some(8),
            _ => None,
        },
        _ => None,
    }
}

/// The canonical type of an overload slot.
pub fn slot_type(slot: usize) -> TypeInner {
    match slot {
        0 => TypeInner::Void,
        1 => TypeInner::Scalar(Scalar::F16),
        2 => TypeInner::Scalar(Scalar::F32),
        3 => TypeInner::Scalar(Scalar::F64),
        4 => TypeInner::Scalar(Scalar::BOOL),
        5 => TypeInner::Scalar(Scalar::I8),
        6 => TypeInner::Scalar(Scalar::I16),
        7 => TypeInner::Scalar(Scalar::I32),
        8 => TypeInner::Scalar(Scalar::I64),
        _ => panic!("overload slot {slot} out of range"),
    }
}

/// The function name for `op` specialized to `slot`. The void slot omits
/// the suffix: `op.barrier`, but `op.sin.f32`.
pub fn op_func_name(op: OpCode, slot: usize) -> String {
    if slot == 0 {
        format!("{}{}", OP_PREFIX, op.props().class_name)
    } else {
        format!(
            "{}{}.{}",
            OP_PREFIX,
            op.props().class_name,
            OVERLOAD_TYPE_NAMES[slot]
        )
    }
}

/// Splits an op function name into its class and overload slot.
pub fn parse_op_func_name(name: &str) -> Option<(OpCodeClass, usize)> {
    let rest = name.strip_prefix(OP_PREFIX)?;
    match rest.split_once('.') {
        None => Some((OpCodeClass::from_name(rest)?, 0)),
        Some((class, suffix)) => {
            let slot = OVERLOAD_TYPE_NAMES[1..]
                .iter()
                .position(|&n| n == suffix)?
                + 1;
            Some((OpCodeClass::from_name(class)?, slot))
        }
    }
}

/// Tests whether `name` is shaped like an op function name.
pub fn is_op_func_name(name: &str) -> bool {
    name.starts_with(OP_PREFIX)
}

/// Tests whether `f` is an op function: op-shaped name plus an `i32` op
/// code as the first parameter.
pub fn is_op_func(module: &Module, f: Handle<Function>) -> bool {
    let func = &module.functions[f];
    if parse_op_func_name(&func.name).is_none() {
        return false;
    }
    match func.params.first() {
        Some(p) => matches!(
            module.types[p.ty].inner,
            TypeInner::Scalar(Scalar::I32)
        ),
        None => false,
    }
}

/// If `stmt` is a call to an op function, returns the op code from its
/// first argument.
pub fn op_call_code(module: &Module, func: &Function, stmt: &Statement) -> Option<OpCode> {
    let Statement::Call {
        function,
        arguments,
        ..
    } = stmt
    else {
        return None;
    };
    if !is_op_func(module, *function) {
        return None;
    }
    let first = *arguments.first()?;
    match func.expressions[first] {
        Expression::Literal(lit) => OpCode::from_u32(lit.as_u32()?),
        _ => None,
    }
}

/// Tests whether `stmt` calls the given op (or any op when `op` is `None`).
pub fn is_op_call(module: &Module, func: &Function, stmt: &Statement, op: Option<OpCode>) -> bool {
    match (op_call_code(module, func, stmt), op) {
        (Some(_), None) => true,
        (Some(found), Some(want)) => found == want,
        (None, _) => false,
    }
}

/// Inserts the void type into a module's type arena.
pub fn void_type(module: &mut Module) -> Handle<Type> {
    module.types.insert(Type::unnamed(TypeInner::Void))
}

fn scalar_param(module: &mut Module, scalar: Scalar) -> FunctionParam {
    FunctionParam {
        name: None,
        ty: module
            .types
            .insert(Type::unnamed(TypeInner::Scalar(scalar))),
    }
}

fn handle_param(module: &mut Module) -> FunctionParam {
    FunctionParam {
        name: None,
        ty: module.types.insert(Type::unnamed(TypeInner::ResourceHandle)),
    }
}

/// Builds the parameter list and result type for `op` specialized to
/// `slot`. The first parameter is always the `i32` op code.
fn op_func_signature(
    module: &mut Module,
    op: OpCode,
    slot: usize,
) -> (Vec<FunctionParam>, Option<Handle<Type>>) {
    let overload = module.types.insert(Type::unnamed(slot_type(slot)));
    let t = || FunctionParam {
        name: None,
        ty: overload,
    };
    let i32p = |m: &mut Module| scalar_param(m, Scalar::I32);
    let opcode = i32p(module);

    let i32_ty = module
        .types
        .insert(Type::unnamed(TypeInner::Scalar(Scalar::I32)));
    let i1_ty = module
        .types
        .insert(Type::unnamed(TypeInner::Scalar(Scalar::BOOL)));
    let handle_ty = module.types.insert(Type::unnamed(TypeInner::ResourceHandle));

    let mut params = vec![opcode];
    let result;
    match op.props().class {
        OpCodeClass::Unary => {
            params.push(t());
            result = Some(overload);
        }
        OpCodeClass::Binary => {
            params.extend([t(), t()]);
            result = Some(overload);
        }
        OpCodeClass::Tertiary => {
            params.extend([t(), t(), t()]);
            result = Some(overload);
        }
        OpCodeClass::UnaryBits => {
            params.push(t());
            result = Some(i32_ty);
        }
        OpCodeClass::Dot2 => {
            params.extend(std::iter::repeat_with(t).take(4));
            result = Some(overload);
        }
        OpCodeClass::Dot3 => {
            params.extend(std::iter::repeat_with(t).take(6));
            result = Some(overload);
        }
        OpCodeClass::Dot4 => {
            params.extend(std::iter::repeat_with(t).take(8));
            result = Some(overload);
        }
        OpCodeClass::IsSpecialFloat => {
            params.push(t());
            result = Some(i1_ty);
        }
        OpCodeClass::CreateHandle => {
            params.push(scalar_param(module, Scalar::I8));
            params.extend([
                i32p(module),
                i32p(module),
                scalar_param(module, Scalar::BOOL),
            ]);
            result = Some(handle_ty);
        }
        OpCodeClass::CBufferLoad => {
            params.push(handle_param(module));
            params.push(i32p(module));
            result = Some(overload);
        }
        OpCodeClass::Sample | OpCodeClass::SampleLevel => {
            params.push(handle_param(module));
            params.push(handle_param(module));
            let coords = if op.props().class == OpCodeClass::Sample {
                4
            } else {
                5
            };
            for _ in 0..coords {
                params.push(scalar_param(module, Scalar::F32));
            }
            result = Some(overload);
        }
        OpCodeClass::BufferLoad => {
            params.push(handle_param(module));
            params.extend([i32p(module), i32p(module)]);
            result = Some(overload);
        }
        OpCodeClass::BufferStore => {
            params.push(handle_param(module));
            params.extend([i32p(module), i32p(module), t()]);
            result = None;
        }
        OpCodeClass::LoadInput => {
            params.extend([i32p(module), i32p(module)]);
            params.push(scalar_param(module, Scalar::I8));
            result = Some(overload);
        }
        OpCodeClass::StoreOutput => {
            params.extend([i32p(module), i32p(module)]);
            params.push(scalar_param(module, Scalar::I8));
            params.push(t());
            result = None;
        }
        OpCodeClass::ThreadId | OpCodeClass::GroupId | OpCodeClass::ThreadIdInGroup => {
            params.push(i32p(module));
            result = Some(i32_ty);
        }
        OpCodeClass::FlattenedThreadIdInGroup
        | OpCodeClass::OutputControlPointId
        | OpCodeClass::ViewId => {
            result = Some(i32_ty);
        }
        OpCodeClass::Barrier => {
            params.push(i32p(module));
            result = None;
        }
        OpCodeClass::AtomicBinOp => {
            params.push(handle_param(module));
            params.extend([i32p(module), i32p(module), i32p(module), i32p(module), t()]);
            result = Some(overload);
        }
    }
    (params, result)
}

/// Per-module cache of op functions, bucketed by (class, overload slot).
///
/// The cache is rebuilt from the module's function list by
/// [`refresh_cache`](Self::refresh_cache); the linker does so once after
/// assembling an output module.
#[derive(Debug, Default)]
pub struct OpRegistry {
    cache: Vec<[Option<Handle<Function>>; NUM_OVERLOADS]>,
    by_func: HashMap<Handle<Function>, OpCodeClass>,
}

impl OpRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            cache: vec![[None; NUM_OVERLOADS]; NUM_OP_CLASSES],
            by_func: HashMap::new(),
        }
    }

    /// A registry pre-populated from `module`'s functions.
    pub fn for_module(module: &Module) -> Self {
        let mut registry = Self::new();
        registry.refresh_cache(module);
        registry
    }

    /// Rebuilds the cache by scanning `module`'s functions.
    pub fn refresh_cache(&mut self, module: &Module) {
        self.cache = vec![[None; NUM_OVERLOADS]; NUM_OP_CLASSES];
        self.by_func.clear();
        for (h, func) in module.functions.iter() {
            if !is_op_func(module, h) {
                continue;
            }
            if let Some((class, slot)) = parse_op_func_name(&func.name) {
                self.update(class, slot, h);
            }
        }
    }

    fn update(&mut self, class: OpCodeClass, slot: usize, f: Handle<Function>) {
        self.cache[class.index()][slot] = Some(f);
        self.by_func.insert(f, class);
    }

    /// Returns the function implementing `op` specialized to `overload`,
    /// declaring it in `module` if absent.
    pub fn get_op_func(
        &mut self,
        module: &mut Module,
        op: OpCode,
        overload: Handle<Type>,
    ) -> Result<Handle<Function>, OpError> {
        let props = op.props();
        let slot = match type_slot(&module.types, overload) {
            Some(slot) if props.overloads & (1 << slot) != 0 => slot,
            other => {
                return Err(OpError::OverloadIllegal {
                    op: props.name,
                    overload: other.map(|s| OVERLOAD_TYPE_NAMES[s]).unwrap_or("<non-scalar>"),
                });
            }
        };
        if let Some(f) = self.cache[props.class.index()][slot] {
            return Ok(f);
        }

        let name = op_func_name(op, slot);
        let f = match module.find_function(&name) {
            Some(f) => f,
            None => {
                let (params, result) = op_func_signature(module, op, slot);
                let mut decl = Function::declaration(name);
                decl.attributes = props.attr;
                decl.params = params;
                decl.result = result;
                module.functions.append(decl)
            }
        };
        self.update(props.class, slot, f);
        Ok(f)
    }

    /// Every overload instantiation of `op` currently cached.
    pub fn get_op_func_list(&self, op: OpCode) -> Vec<Handle<Function>> {
        self.cache[op.props().class.index()]
            .iter()
            .flatten()
            .copied()
            .collect()
    }

    /// Drops `f` from the caches.
    pub fn remove_function(&mut self, f: Handle<Function>) {
        if self.by_func.remove(&f).is_some() {
            for row in &mut self.cache {
                for slot in row.iter_mut() {
                    if *slot == Some(f) {
                        *slot = None;
                    }
                }
            }
        }
    }

    /// The op-code class of `f`, or `None` if `f` is not a cached op
    /// function.
    pub fn get_op_code_class(&self, f: Handle<Function>) -> Option<OpCodeClass> {
        self.by_func.get(&f).copied()
    }

    /// Number of op functions currently cached.
    pub fn len(&self) -> usize {
        self.by_func.len()
    }

    /// Whether the cache holds no op functions.
    pub fn is_empty(&self) -> bool {
        self.by_func.is_empty()
    }

    /// The overload type `f` implements for `op`, inverted from the name
    /// mangling. `None` if `f`'s name does not match `op`'s class.
    pub fn overload_type(
        &self,
        module: &mut Module,
        op: OpCode,
        f: Handle<Function>,
    ) -> Option<Handle<Type>> {
        let (class, slot) = parse_op_func_name(&module.functions[f].name)?;
        if class != op.props().class {
            return None;
        }
        Some(module.types.insert(Type::unnamed(slot_type(slot))))
    }
}
