//! Builders for the shader-library modules the e2e tests link.

use slx_ir::ops::{OpCode, OpRegistry};
use slx_ir::{
    AddressSpace, Expression, Function, FunctionProps, GlobalVariable, Handle, Linkage, Literal,
    Module, Resource, ResourceClass, ResourceKind, Scalar, ShaderKind, Statement, Type, TypeInner,
};

/// A fresh library module with the conventional test target.
#[allow(dead_code)]
pub fn new_lib(id: &str) -> Module {
    Module::new(id, "slx-test")
}

#[allow(dead_code)]
pub fn scalar_ty(module: &mut Module, scalar: Scalar) -> Handle<Type> {
    module
        .types
        .insert(Type::unnamed(TypeInner::Scalar(scalar)))
}

/// The op function for `op` specialized to `scalar` (or the void slot).
#[allow(dead_code)]
pub fn op_func(module: &mut Module, op: OpCode, scalar: Option<Scalar>) -> Handle<Function> {
    let overload = match scalar {
        Some(s) => scalar_ty(module, s),
        None => module.types.insert(Type::unnamed(TypeInner::Void)),
    };
    OpRegistry::for_module(module)
        .get_op_func(module, op, overload)
        .expect("legal overload")
}

/// Appends a call to an op function, prepending the op-code literal.
/// Returns the result expression when the op produces one.
#[allow(dead_code)]
pub fn push_op_call(
    func: &mut Function,
    callee: Handle<Function>,
    op: OpCode,
    args: Vec<Handle<Expression>>,
    with_result: bool,
) -> Option<Handle<Expression>> {
    let code = func
        .expressions
        .append(Expression::Literal(Literal::I32(op as i32)));
    let mut arguments = vec![code];
    arguments.extend(args);
    let result = with_result.then(|| func.expressions.append(Expression::CallResult(callee)));
    func.body.as_mut().expect("definition").push(Statement::Call {
        function: callee,
        arguments,
        result,
    });
    result
}

/// Appends a plain call statement.
#[allow(dead_code)]
pub fn push_call(
    func: &mut Function,
    callee: Handle<Function>,
    args: Vec<Handle<Expression>>,
    with_result: bool,
) -> Option<Handle<Expression>> {
    let result = with_result.then(|| func.expressions.append(Expression::CallResult(callee)));
    func.body.as_mut().expect("definition").push(Statement::Call {
        function: callee,
        arguments: args,
        result,
    });
    result
}

/// Marks `func` as an entry of the given kind.
#[allow(dead_code)]
pub fn mark_entry(module: &mut Module, func: Handle<Function>, kind: ShaderKind) {
    module.info.set_props(func, FunctionProps::for_kind(kind));
}

/// Declares a resource: a named handle global plus its descriptor row.
/// The type name carries the element type so same-named resources with
/// different element types collide.
#[allow(dead_code)]
pub fn add_resource(
    module: &mut Module,
    class: ResourceClass,
    kind: ResourceKind,
    name: &str,
    element: Scalar,
) -> Handle<GlobalVariable> {
    let ty = module.types.insert(Type {
        name: Some(format!("{kind:?}<{:?}{}>", element.kind, u32::from(element.width) * 8)),
        inner: TypeInner::ResourceHandle,
    });
    let global = module.global_variables.append(GlobalVariable {
        name: name.to_string(),
        linkage: Linkage::External,
        ty,
        space: AddressSpace::ResourceBinding,
        is_constant: true,
        init: None,
        external_init: true,
    });
    module.info.add_resource(Resource {
        class,
        kind,
        name: name.to_string(),
        global,
        id: 0,
        space: 0,
        lower_bound: 0,
        range_size: 1,
    });
    global
}

/// Appends the canonical resource access sequence: load the range ID from
/// the resource global and pass it to `createHandle`. Returns the handle
/// expression.
#[allow(dead_code)]
pub fn push_create_handle(
    module: &mut Module,
    func: &mut Function,
    global: Handle<GlobalVariable>,
    class: ResourceClass,
) -> Handle<Expression> {
    let create = op_func(module, OpCode::CreateHandle, None);
    let ptr = func.expressions.append(Expression::GlobalVariable(global));
    let range_id = func.expressions.append(Expression::Load { pointer: ptr });
    let cls = func
        .expressions
        .append(Expression::Literal(Literal::U32(class.index())));
    let index = func.expressions.append(Expression::Literal(Literal::U32(0)));
    let nonuniform = func
        .expressions
        .append(Expression::Literal(Literal::Bool(false)));
    let code = func.expressions.append(Expression::Literal(Literal::I32(
        OpCode::CreateHandle as i32,
    )));
    let result = func.expressions.append(Expression::CallResult(create));
    func.body.as_mut().expect("definition").push(Statement::Call {
        function: create,
        arguments: vec![code, cls, range_id, index, nonuniform],
        result: Some(result),
    });
    result
}

/// Counts the statements in `func` for which `pred` holds.
#[allow(dead_code)]
pub fn count_statements(func: &Function, mut pred: impl FnMut(&Statement) -> bool) -> usize {
    let mut count = 0;
    if let Some(body) = &func.body {
        Statement::walk(body, &mut |stmt| {
            if pred(stmt) {
                count += 1;
            }
        });
    }
    count
}

/// Names of every function in `module`, sorted.
#[allow(dead_code)]
pub fn function_names(module: &Module) -> Vec<String> {
    let mut names: Vec<_> = module.functions.iter().map(|(_, f)| f.name.clone()).collect();
    names.sort();
    names
}
