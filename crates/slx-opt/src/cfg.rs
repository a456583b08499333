//! Control-flow simplification pass.
//!
//! Unwraps the single-iteration loops the inliner leaves behind, folds
//! branches on literal conditions, and drops empty conditionals.

use slx_ir::{Block, Expression, Function, Literal, Module, Statement};

use crate::Pass;

/// Structurally simplifies function bodies.
#[derive(Debug)]
pub struct SimplifyCfg;

impl Pass for SimplifyCfg {
    fn name(&self) -> &str {
        "simplify-cfg"
    }

    fn run(&self, module: &mut Module) -> bool {
        let mut changed = false;
        for (_, func) in module.functions.iter_mut() {
            let Some(mut body) = func.body.take() else {
                continue;
            };
            changed |= simplify_block(&mut body, func);
            func.body = Some(body);
        }
        changed
    }
}

fn simplify_block(block: &mut Block, func: &Function) -> bool {
    let mut changed = false;

    // Recurse first so unwrapping sees already-simplified children.
    for stmt in block.iter_mut() {
        match stmt {
            Statement::If { accept, reject, .. } => {
                changed |= simplify_block(accept, func);
                changed |= simplify_block(reject, func);
            }
            Statement::Loop { body, .. } => changed |= simplify_block(body, func),
            _ => {}
        }
    }

    let mut i = 0;
    while i < block.len() {
        let replacement = match &block[i] {
            Statement::Loop { body, break_if: None } if is_single_iteration(body) => {
                let mut inner = body.clone();
                inner.pop(); // trailing Break
                Some(inner)
            }
            Statement::If {
                condition,
                accept,
                reject,
            } => match func.expressions[*condition] {
                Expression::Literal(Literal::Bool(c)) => {
                    Some(if c { accept.clone() } else { reject.clone() })
                }
                _ if accept.is_empty() && reject.is_empty() => Some(Vec::new()),
                _ => None,
            },
            _ => None,
        };
        match replacement {
            Some(stmts) => {
                let advance = stmts.len();
                block.splice(i..=i, stmts);
                i += advance;
                changed = true;
            }
            None => i += 1,
        }
    }
    changed
}

/// A loop body that always breaks on its first pass: ends with a top-level
/// `Break` and contains no other top-level `Break` or any `Continue`
/// targeting this loop.
fn is_single_iteration(body: &Block) -> bool {
    if !matches!(body.last(), Some(Statement::Break)) {
        return false;
    }
    let top = &body[..body.len() - 1];
    !has_own_break_or_continue(top)
}

fn has_own_break_or_continue(block: &[Statement]) -> bool {
    block.iter().any(|stmt| match stmt {
        Statement::Break | Statement::Continue => true,
        Statement::If { accept, reject, .. } => {
            has_own_break_or_continue(accept) || has_own_break_or_continue(reject)
        }
        // A nested loop captures its own break/continue.
        Statement::Loop { .. } => false,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_single_iteration_loop() {
        let mut module = Module::new("m", "slx");
        let mut func = Function::new("f");
        let v = func
            .expressions
            .append(Expression::Literal(Literal::F32(1.0)));
        func.body = Some(vec![
            Statement::Loop {
                body: vec![
                    Statement::Store {
                        pointer: v,
                        value: v,
                    },
                    Statement::Break,
                ],
                break_if: None,
            },
            Statement::Return { value: None },
        ]);
        module.functions.append(func);

        assert!(SimplifyCfg.run(&mut module));
        let func = &module.functions[module.find_function("f").unwrap()];
        let body = func.body.as_ref().unwrap();
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0], Statement::Store { .. }));
    }

    #[test]
    fn keeps_real_loop() {
        let mut module = Module::new("m", "slx");
        let mut func = Function::new("f");
        let c = func
            .expressions
            .append(Expression::Literal(Literal::Bool(true)));
        func.body = Some(vec![
            Statement::Loop {
                body: vec![
                    Statement::If {
                        condition: c,
                        accept: vec![Statement::Break],
                        reject: vec![],
                    },
                    Statement::Break,
                ],
                break_if: None,
            },
            Statement::Return { value: None },
        ]);
        module.functions.append(func);

        // The literal-true If folds to a Break first; the loop then has two
        // top-level breaks and stays a loop until the next sweep.
        SimplifyCfg.run(&mut module);
        let func = &module.functions[module.find_function("f").unwrap()];
        assert!(func.body.as_ref().unwrap().len() >= 2);
    }

    #[test]
    fn folds_literal_condition() {
        let mut module = Module::new("m", "slx");
        let mut func = Function::new("f");
        let c = func
            .expressions
            .append(Expression::Literal(Literal::Bool(false)));
        let v = func
            .expressions
            .append(Expression::Literal(Literal::F32(0.0)));
        func.body = Some(vec![
            Statement::If {
                condition: c,
                accept: vec![Statement::Store {
                    pointer: v,
                    value: v,
                }],
                reject: vec![Statement::Return { value: None }],
            },
        ]);
        module.functions.append(func);

        assert!(SimplifyCfg.run(&mut module));
        let func = &module.functions[module.find_function("f").unwrap()];
        let body = func.body.as_ref().unwrap();
        assert_eq!(body.len(), 1);
        assert!(matches!(body[0], Statement::Return { .. }));
    }

    #[test]
    fn drops_empty_if() {
        let mut module = Module::new("m", "slx");
        let mut func = Function::new("f");
        let c = func.expressions.append(Expression::FunctionArgument(0));
        func.body = Some(vec![
            Statement::If {
                condition: c,
                accept: vec![],
                reject: vec![],
            },
            Statement::Return { value: None },
        ]);
        module.functions.append(func);

        assert!(SimplifyCfg.run(&mut module));
        let func = &module.functions[module.find_function("f").unwrap()];
        assert_eq!(func.body.as_ref().unwrap().len(), 1);
    }
}
