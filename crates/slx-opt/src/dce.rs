//! Dead code elimination pass.
//!
//! Removes statements whose effects cannot be observed: stores to locals
//! that are never read, calls to side-effect-free functions whose results
//! are unused, and statements following a terminator.

use std::collections::HashSet;

use slx_ir::{Block, Expression, FnAttrs, Function, Handle, Module, Statement};

use crate::Pass;

/// Removes dead stores, dead pure calls, and unreachable trailing
/// statements from function bodies.
#[derive(Debug)]
pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dce"
    }

    fn run(&self, module: &mut Module) -> bool {
        let mut changed = false;
        let pure: HashSet<Handle<Function>> = module
            .functions
            .iter()
            .filter(|(_, f)| {
                f.attributes.contains(FnAttrs::READ_NONE)
                    || f.attributes.contains(FnAttrs::READ_ONLY)
            })
            .map(|(h, _)| h)
            .collect();
        for (_, func) in module.functions.iter_mut() {
            changed |= run_on_function(func, &pure);
        }
        changed
    }
}

fn run_on_function(func: &mut Function, pure: &HashSet<Handle<Function>>) -> bool {
    let Some(mut body) = func.body.take() else {
        return false;
    };

    let loaded_locals = collect_loaded_locals(func);
    let dead_store_ptrs: HashSet<Handle<Expression>> = func
        .expressions
        .iter()
        .filter_map(|(h, expr)| {
            if let Expression::LocalVariable(lv) = expr
                && !loaded_locals.contains(lv)
            {
                return Some(h);
            }
            None
        })
        .collect();

    // Root expressions referenced by statements that will survive.
    let mut used: HashSet<Handle<Expression>> = HashSet::new();
    collect_used_from_block(&body, &mut used, &dead_store_ptrs);
    for (_, local) in func.local_variables.iter() {
        if let Some(init) = local.init {
            used.insert(init);
        }
    }

    // Transitively mark operands.
    let mut worklist: Vec<_> = used.iter().copied().collect();
    while let Some(handle) = worklist.pop() {
        for operand in func.expressions[handle].operands() {
            if used.insert(operand) {
                worklist.push(operand);
            }
        }
    }

    let changed = filter_block(&mut body, &used, &dead_store_ptrs, pure);
    func.body = Some(body);
    changed
}

fn collect_loaded_locals(func: &Function) -> HashSet<Handle<slx_ir::LocalVariable>> {
    let mut loaded = HashSet::new();
    for (_, expr) in func.expressions.iter() {
        if let Expression::Load { pointer } = expr
            && let Expression::LocalVariable(lv) = &func.expressions[*pointer]
        {
            loaded.insert(*lv);
        }
    }
    loaded
}

fn collect_used_from_block(
    block: &Block,
    used: &mut HashSet<Handle<Expression>>,
    dead_store_ptrs: &HashSet<Handle<Expression>>,
) {
    for stmt in block {
        match stmt {
            Statement::Store { pointer, value } => {
                if !dead_store_ptrs.contains(pointer) {
                    used.insert(*pointer);
                    used.insert(*value);
                }
            }
            Statement::Call { arguments, .. } => {
                used.extend(arguments.iter().copied());
            }
            Statement::If {
                condition,
                accept,
                reject,
            } => {
                used.insert(*condition);
                collect_used_from_block(accept, used, dead_store_ptrs);
                collect_used_from_block(reject, used, dead_store_ptrs);
            }
            Statement::Loop { body, break_if } => {
                if let Some(brk) = break_if {
                    used.insert(*brk);
                }
                collect_used_from_block(body, used, dead_store_ptrs);
            }
            Statement::Return { value } => {
                if let Some(v) = value {
                    used.insert(*v);
                }
            }
            Statement::Break | Statement::Continue => {}
        }
    }
}

fn filter_block(
    block: &mut Block,
    used: &HashSet<Handle<Expression>>,
    dead_store_ptrs: &HashSet<Handle<Expression>>,
    pure: &HashSet<Handle<Function>>,
) -> bool {
    let mut changed = false;

    // Statements after a terminator never execute.
    if let Some(pos) = block.iter().position(|s| {
        matches!(
            s,
            Statement::Return { .. } | Statement::Break | Statement::Continue
        )
    }) && pos + 1 < block.len()
    {
        block.truncate(pos + 1);
        changed = true;
    }

    block.retain_mut(|stmt| match stmt {
        Statement::Store { pointer, .. } => {
            if dead_store_ptrs.contains(pointer) {
                changed = true;
                return false;
            }
            true
        }
        Statement::Call {
            function, result, ..
        } => {
            let result_used = result.map(|r| used.contains(&r)).unwrap_or(false);
            if pure.contains(function) && !result_used {
                changed = true;
                return false;
            }
            true
        }
        Statement::If { accept, reject, .. } => {
            changed |= filter_block(accept, used, dead_store_ptrs, pure);
            changed |= filter_block(reject, used, dead_store_ptrs, pure);
            true
        }
        Statement::Loop { body, .. } => {
            changed |= filter_block(body, used, dead_store_ptrs, pure);
            true
        }
        _ => true,
    });
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use slx_ir::{Literal, LocalVariable, Scalar, Type, TypeInner};

    fn f32_ty(module: &mut Module) -> Handle<Type> {
        module
            .types
            .insert(Type::unnamed(TypeInner::Scalar(Scalar::F32)))
    }

    #[test]
    fn removes_store_to_unread_local() {
        let mut module = Module::new("m", "slx");
        let ty = f32_ty(&mut module);
        let mut func = Function::new("f");
        let lv = func.local_variables.append(LocalVariable {
            name: Some("temp".into()),
            ty,
            init: None,
        });
        let ptr = func.expressions.append(Expression::LocalVariable(lv));
        let val = func
            .expressions
            .append(Expression::Literal(Literal::F32(42.0)));
        func.body = Some(vec![
            Statement::Store {
                pointer: ptr,
                value: val,
            },
            Statement::Return { value: None },
        ]);
        module.functions.append(func);

        assert!(DeadCodeElimination.run(&mut module));
        let func = &module.functions[module.find_function("f").unwrap()];
        assert_eq!(func.body.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn removes_unused_pure_call() {
        let mut module = Module::new("m", "slx");
        let mut decl = Function::declaration("op.unary.f32");
        decl.attributes |= FnAttrs::READ_NONE;
        let sin = module.functions.append(decl);

        let mut func = Function::new("f");
        let arg = func
            .expressions
            .append(Expression::Literal(Literal::F32(1.0)));
        let res = func.expressions.append(Expression::CallResult(sin));
        func.body = Some(vec![
            Statement::Call {
                function: sin,
                arguments: vec![arg],
                result: Some(res),
            },
            Statement::Return { value: None },
        ]);
        module.functions.append(func);

        assert!(DeadCodeElimination.run(&mut module));
        let func = &module.functions[module.find_function("f").unwrap()];
        assert_eq!(func.body.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn keeps_pure_call_with_used_result() {
        let mut module = Module::new("m", "slx");
        let mut decl = Function::declaration("op.unary.f32");
        decl.attributes |= FnAttrs::READ_NONE;
        let sin = module.functions.append(decl);

        let mut func = Function::new("f");
        let arg = func
            .expressions
            .append(Expression::Literal(Literal::F32(1.0)));
        let res = func.expressions.append(Expression::CallResult(sin));
        func.body = Some(vec![
            Statement::Call {
                function: sin,
                arguments: vec![arg],
                result: Some(res),
            },
            Statement::Return { value: Some(res) },
        ]);
        module.functions.append(func);

        assert!(!DeadCodeElimination.run(&mut module));
        let func = &module.functions[module.find_function("f").unwrap()];
        assert_eq!(func.body.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn truncates_after_return() {
        let mut module = Module::new("m", "slx");
        let mut func = Function::new("f");
        let val = func
            .expressions
            .append(Expression::Literal(Literal::F32(0.0)));
        func.result = Some(f32_ty(&mut module));
        func.body = Some(vec![
            Statement::Return { value: Some(val) },
            Statement::Return { value: Some(val) },
        ]);
        module.functions.append(func);

        assert!(DeadCodeElimination.run(&mut module));
        let func = &module.functions[module.find_function("f").unwrap()];
        assert_eq!(func.body.as_ref().unwrap().len(), 1);
    }
}
