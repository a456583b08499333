//! Always-inline pass.
//!
//! Replaces calls to `ALWAYS_INLINE` definitions with their bodies. The
//! inlined body is wrapped in a single-iteration loop so `Return` lowers to
//! `Break`; returns trapped under the callee's own loops propagate out
//! through a `done` flag checked after each nested loop. [`SimplifyCfg`]
//! unwraps the wrapper loops afterwards.
//!
//! [`SimplifyCfg`]: crate::SimplifyCfg

use slx_ir::{
    Block, Expression, FnAttrs, Function, Handle, Literal, LocalVariable, Module, Scalar,
    Statement, Type, TypeInner,
};

use crate::Pass;

/// Upper bound on call sites inlined per caller, against runaway
/// mutual-inline chains.
const MAX_INLINE_SITES: usize = 1000;

/// Inlines calls to `ALWAYS_INLINE` functions into their callers.
#[derive(Debug)]
pub struct InlineAlways;

impl Pass for InlineAlways {
    fn name(&self) -> &str {
        "inline-always"
    }

    fn run(&self, module: &mut Module) -> bool {
        let mut changed = false;
        let callers: Vec<_> = module
            .functions
            .iter()
            .filter(|(_, f)| !f.is_declaration())
            .map(|(h, _)| h)
            .collect();
        for caller in callers {
            changed |= inline_into(module, caller);
        }
        changed
    }
}

fn inline_into(module: &mut Module, caller: Handle<Function>) -> bool {
    let bool_ty = module
        .types
        .insert(Type::unnamed(TypeInner::Scalar(Scalar::BOOL)));
    let mut changed = false;
    for _ in 0..MAX_INLINE_SITES {
        let Some(callee) = find_inlinable_call(module, caller) else {
            return changed;
        };
        let callee_fn = module.functions[callee].clone();
        inline_first_call(&mut module.functions[caller], callee, &callee_fn, bool_ty);
        changed = true;
    }
    log::warn!(
        "inline limit reached in function {}",
        module.functions[caller].name
    );
    changed
}

/// Finds the callee of the first call site in `caller` that should be
/// inlined: an `ALWAYS_INLINE` definition other than `caller` itself.
fn find_inlinable_call(module: &Module, caller: Handle<Function>) -> Option<Handle<Function>> {
    let func = &module.functions[caller];
    let mut found = None;
    if let Some(body) = &func.body {
        Statement::walk(body, &mut |stmt| {
            if found.is_some() {
                return;
            }
            if let Statement::Call { function, .. } = stmt
                && *function != caller
            {
                let callee = &module.functions[*function];
                if callee.attributes.contains(FnAttrs::ALWAYS_INLINE) && !callee.is_declaration() {
                    found = Some(*function);
                }
            }
        });
    }
    found
}

fn inline_first_call(
    func: &mut Function,
    callee: Handle<Function>,
    callee_fn: &Function,
    bool_ty: Handle<Type>,
) {
    let mut body = func.body.take().unwrap_or_default();
    inline_in_block(&mut body, func, callee, callee_fn, bool_ty);
    func.body = Some(body);
}

fn inline_in_block(
    block: &mut Block,
    func: &mut Function,
    callee: Handle<Function>,
    callee_fn: &Function,
    bool_ty: Handle<Type>,
) -> bool {
    for i in 0..block.len() {
        let is_target =
            matches!(&block[i], Statement::Call { function, .. } if *function == callee);
        if is_target {
            let Statement::Call {
                arguments, result, ..
            } = block[i].clone()
            else {
                unreachable!()
            };
            block[i] = build_inline_body(func, callee_fn, &arguments, result, bool_ty);
            return true;
        }
        let found = match &mut block[i] {
            Statement::If { accept, reject, .. } => {
                inline_in_block(accept, func, callee, callee_fn, bool_ty)
                    || inline_in_block(reject, func, callee, callee_fn, bool_ty)
            }
            Statement::Loop { body, .. } => {
                inline_in_block(body, func, callee, callee_fn, bool_ty)
            }
            _ => false,
        };
        if found {
            return true;
        }
    }
    false
}

/// Materializes one inlined call as a single-iteration loop.
fn build_inline_body(
    func: &mut Function,
    callee_fn: &Function,
    arguments: &[Handle<Expression>],
    result: Option<Handle<Expression>>,
    bool_ty: Handle<Type>,
) -> Statement {
    let empty = Block::new();
    let callee_body = callee_fn.body.as_ref().unwrap_or(&empty);

    // Storage for the callee's return value, when the caller consumes it.
    let result_ptr = match (callee_fn.result, result) {
        (Some(ty), Some(_)) => {
            let local = func.local_variables.append(LocalVariable {
                name: None,
                ty,
                init: None,
            });
            Some(func.expressions.append(Expression::LocalVariable(local)))
        }
        _ => None,
    };

    // A `done` flag is only needed when a return must escape a nested loop.
    let done_ptr = if has_return_under_loop(callee_body, 0) {
        let local = func.local_variables.append(LocalVariable {
            name: None,
            ty: bool_ty,
            init: None,
        });
        Some(func.expressions.append(Expression::LocalVariable(local)))
    } else {
        None
    };

    // Import the callee's locals and expressions. Arguments are positional:
    // the i-th `FunctionArgument` aliases the call's i-th argument.
    let mut local_map = Vec::with_capacity(callee_fn.local_variables.len());
    for (_, local) in callee_fn.local_variables.iter() {
        local_map.push(func.local_variables.append(LocalVariable {
            name: local.name.clone(),
            ty: local.ty,
            init: local.init,
        }));
    }

    let mut expr_map = Vec::with_capacity(callee_fn.expressions.len());
    for (_, expr) in callee_fn.expressions.iter() {
        let mapped = match *expr {
            Expression::FunctionArgument(i) => arguments[i as usize],
            ref e => {
                let rewritten = import_expr(e, &expr_map, &local_map);
                func.expressions.append(rewritten)
            }
        };
        expr_map.push(mapped);
    }

    for (i, (_, local)) in callee_fn.local_variables.iter().enumerate() {
        if let Some(init) = local.init {
            func.local_variables[local_map[i]].init = Some(expr_map[init.index()]);
        }
    }

    let mut wrapper = Block::new();
    if let Some(done) = done_ptr {
        // Reset the flag on every execution of the inlined site.
        let f = func.expressions.append(Expression::Literal(Literal::Bool(false)));
        wrapper.push(Statement::Store {
            pointer: done,
            value: f,
        });
    }
    wrapper.extend(lower_block(
        callee_body,
        func,
        &expr_map,
        result_ptr,
        done_ptr,
        0,
    ));
    if !matches!(wrapper.last(), Some(Statement::Break)) {
        wrapper.push(Statement::Break);
    }

    // The call's result slot becomes a load of the result local.
    if let Some(result_expr) = result {
        func.expressions[result_expr] = match result_ptr {
            Some(ptr) => Expression::Load { pointer: ptr },
            // Void callee whose result is unconsumed anyway; leave an inert
            // literal so nothing dangles once the callee is dropped.
            None => Expression::Literal(Literal::U32(0)),
        };
    }

    Statement::Loop {
        body: wrapper,
        break_if: None,
    }
}

fn has_return_under_loop(block: &Block, depth: usize) -> bool {
    block.iter().any(|stmt| match stmt {
        Statement::Return { .. } => depth > 0,
        Statement::If { accept, reject, .. } => {
            has_return_under_loop(accept, depth) || has_return_under_loop(reject, depth)
        }
        Statement::Loop { body, .. } => has_return_under_loop(body, depth + 1),
        _ => false,
    })
}

/// Rewrites one callee expression against the caller's arenas.
fn import_expr(
    expr: &Expression,
    expr_map: &[Handle<Expression>],
    local_map: &[Handle<LocalVariable>],
) -> Expression {
    let m = |h: Handle<Expression>| expr_map[h.index()];
    match *expr {
        Expression::Literal(lit) => Expression::Literal(lit),
        Expression::ZeroValue(ty) => Expression::ZeroValue(ty),
        Expression::FunctionArgument(_) => unreachable!("handled by caller"),
        Expression::GlobalVariable(g) => Expression::GlobalVariable(g),
        Expression::LocalVariable(l) => Expression::LocalVariable(local_map[l.index()]),
        Expression::Load { pointer } => Expression::Load { pointer: m(pointer) },
        Expression::Unary { op, expr } => Expression::Unary { op, expr: m(expr) },
        Expression::Binary { op, left, right } => Expression::Binary {
            op,
            left: m(left),
            right: m(right),
        },
        Expression::Select {
            condition,
            accept,
            reject,
        } => Expression::Select {
            condition: m(condition),
            accept: m(accept),
            reject: m(reject),
        },
        Expression::AccessIndex { base, index } => Expression::AccessIndex {
            base: m(base),
            index,
        },
        Expression::Compose { ty, ref components } => Expression::Compose {
            ty,
            components: components.iter().map(|&c| m(c)).collect(),
        },
        Expression::CallResult(f) => Expression::CallResult(f),
    }
}

fn lower_block(
    block: &Block,
    func: &mut Function,
    expr_map: &[Handle<Expression>],
    result_ptr: Option<Handle<Expression>>,
    done_ptr: Option<Handle<Expression>>,
    depth: usize,
) -> Block {
    let m = |h: Handle<Expression>| expr_map[h.index()];
    let mut out = Block::new();
    for stmt in block {
        match stmt {
            Statement::Return { value } => {
                if let (Some(v), Some(ptr)) = (value, result_ptr) {
                    out.push(Statement::Store {
                        pointer: ptr,
                        value: m(*v),
                    });
                }
                if depth > 0
                    && let Some(done) = done_ptr
                {
                    let t = func.expressions.append(Expression::Literal(Literal::Bool(true)));
                    out.push(Statement::Store {
                        pointer: done,
                        value: t,
                    });
                }
                out.push(Statement::Break);
            }
            Statement::Loop { body, break_if } => {
                out.push(Statement::Loop {
                    body: lower_block(body, func, expr_map, result_ptr, done_ptr, depth + 1),
                    break_if: break_if.map(m),
                });
                if let Some(done) = done_ptr {
                    let cond = func.expressions.append(Expression::Load { pointer: done });
                    out.push(Statement::If {
                        condition: cond,
                        accept: vec![Statement::Break],
                        reject: Block::new(),
                    });
                }
            }
            Statement::If {
                condition,
                accept,
                reject,
            } => out.push(Statement::If {
                condition: m(*condition),
                accept: lower_block(accept, func, expr_map, result_ptr, done_ptr, depth),
                reject: lower_block(reject, func, expr_map, result_ptr, done_ptr, depth),
            }),
            Statement::Store { pointer, value } => out.push(Statement::Store {
                pointer: m(*pointer),
                value: m(*value),
            }),
            Statement::Call {
                function,
                arguments,
                result,
            } => out.push(Statement::Call {
                function: *function,
                arguments: arguments.iter().copied().map(m).collect(),
                result: result.map(m),
            }),
            Statement::Break => out.push(Statement::Break),
            Statement::Continue => out.push(Statement::Continue),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_ty(module: &mut Module) -> Handle<Type> {
        module
            .types
            .insert(Type::unnamed(TypeInner::Scalar(Scalar::F32)))
    }

    /// callee(x) { return x + x; } caller() { v = callee(3.0); return v; }
    fn build_module() -> (Module, Handle<Function>, Handle<Function>) {
        let mut module = Module::new("m", "slx");
        let ty = f32_ty(&mut module);

        let mut callee = Function::new("callee");
        callee.attributes |= FnAttrs::ALWAYS_INLINE;
        callee.params = vec![slx_ir::FunctionParam { name: None, ty }];
        callee.result = Some(ty);
        let x = callee.expressions.append(Expression::FunctionArgument(0));
        let sum = callee.expressions.append(Expression::Binary {
            op: slx_ir::BinaryOp::Add,
            left: x,
            right: x,
        });
        callee.body = Some(vec![Statement::Return { value: Some(sum) }]);
        let callee = module.functions.append(callee);

        let mut caller = Function::new("caller");
        caller.result = Some(ty);
        let three = caller
            .expressions
            .append(Expression::Literal(Literal::F32(3.0)));
        let v = caller.expressions.append(Expression::CallResult(callee));
        caller.body = Some(vec![
            Statement::Call {
                function: callee,
                arguments: vec![three],
                result: Some(v),
            },
            Statement::Return { value: Some(v) },
        ]);
        let caller = module.functions.append(caller);
        (module, caller, callee)
    }

    fn count_calls(func: &Function) -> usize {
        let mut calls = 0;
        if let Some(body) = &func.body {
            Statement::walk(body, &mut |stmt| {
                if matches!(stmt, Statement::Call { .. }) {
                    calls += 1;
                }
            });
        }
        calls
    }

    #[test]
    fn inlines_single_call() {
        let (mut module, caller, _) = build_module();
        assert!(InlineAlways.run(&mut module));
        let func = &module.functions[caller];
        assert_eq!(count_calls(func), 0);
        // The call result became a load of the result local.
        let loads = func
            .expressions
            .iter()
            .filter(|(_, e)| matches!(e, Expression::Load { .. }))
            .count();
        assert!(loads >= 1);
        // Wrapper loop present until SimplifyCfg runs.
        assert!(
            func.body
                .as_ref()
                .unwrap()
                .iter()
                .any(|s| matches!(s, Statement::Loop { .. }))
        );
    }

    #[test]
    fn skips_plain_functions() {
        let (mut module, caller, callee) = build_module();
        module.functions[callee].attributes.remove(FnAttrs::ALWAYS_INLINE);
        assert!(!InlineAlways.run(&mut module));
        assert_eq!(count_calls(&module.functions[caller]), 1);
    }

    #[test]
    fn return_under_loop_uses_done_flag() {
        let mut module = Module::new("m", "slx");
        let ty = f32_ty(&mut module);

        // callee() { loop { return 1.0; } return 0.0; }
        let mut callee = Function::new("callee");
        callee.attributes |= FnAttrs::ALWAYS_INLINE;
        callee.result = Some(ty);
        let one = callee
            .expressions
            .append(Expression::Literal(Literal::F32(1.0)));
        let zero = callee
            .expressions
            .append(Expression::Literal(Literal::F32(0.0)));
        callee.body = Some(vec![
            Statement::Loop {
                body: vec![Statement::Return { value: Some(one) }],
                break_if: None,
            },
            Statement::Return { value: Some(zero) },
        ]);
        let callee = module.functions.append(callee);

        let mut caller = Function::new("caller");
        caller.result = Some(ty);
        let v = caller.expressions.append(Expression::CallResult(callee));
        caller.body = Some(vec![
            Statement::Call {
                function: callee,
                arguments: vec![],
                result: Some(v),
            },
            Statement::Return { value: Some(v) },
        ]);
        let caller = module.functions.append(caller);

        assert!(InlineAlways.run(&mut module));
        let func = &module.functions[caller];
        assert_eq!(count_calls(func), 0);
        // done flag + result local were created.
        assert_eq!(func.local_variables.len(), 2);
    }
}
