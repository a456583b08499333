//! Instruction simplification pass.
//!
//! Folds unary, binary, and select expressions over literal operands,
//! replacing them in place in the expression arena.

use slx_ir::{BinaryOp, Expression, Function, Handle, Literal, Module, UnaryOp};

use crate::Pass;

/// Folds expressions with literal operands.
#[derive(Debug)]
pub struct SimplifyInstructions;

impl Pass for SimplifyInstructions {
    fn name(&self) -> &str {
        "simplify-inst"
    }

    fn run(&self, module: &mut Module) -> bool {
        let mut changed = false;
        for (_, func) in module.functions.iter_mut() {
            changed |= run_on_function(func);
        }
        changed
    }
}

fn run_on_function(func: &mut Function) -> bool {
    let mut changed = false;
    let handles: Vec<Handle<Expression>> = func.expressions.iter().map(|(h, _)| h).collect();

    for handle in handles {
        let replacement = match func.expressions[handle] {
            Expression::Binary { op, left, right } => {
                match (&func.expressions[left], &func.expressions[right]) {
                    (Expression::Literal(l), Expression::Literal(r)) => {
                        fold_binary(op, *l, *r).map(Expression::Literal)
                    }
                    _ => None,
                }
            }
            Expression::Unary { op, expr } => match &func.expressions[expr] {
                Expression::Literal(lit) => fold_unary(op, *lit).map(Expression::Literal),
                _ => None,
            },
            Expression::Select {
                condition,
                accept,
                reject,
            } => match &func.expressions[condition] {
                Expression::Literal(Literal::Bool(c)) => {
                    let chosen = if *c { accept } else { reject };
                    match &func.expressions[chosen] {
                        Expression::Literal(lit) => Some(Expression::Literal(*lit)),
                        _ => None,
                    }
                }
                _ => None,
            },
            _ => None,
        };

        if let Some(new_expr) = replacement {
            func.expressions[handle] = new_expr;
            changed = true;
        }
    }
    changed
}

fn fold_unary(op: UnaryOp, lit: Literal) -> Option<Literal> {
    match (op, lit) {
        (UnaryOp::Negate, Literal::F32(v)) => Some(Literal::F32(-v)),
        (UnaryOp::Negate, Literal::F64(v)) => Some(Literal::F64(-v)),
        (UnaryOp::Negate, Literal::I32(v)) => Some(Literal::I32(v.wrapping_neg())),
        (UnaryOp::Negate, Literal::I64(v)) => Some(Literal::I64(v.wrapping_neg())),
        (UnaryOp::LogicalNot, Literal::Bool(v)) => Some(Literal::Bool(!v)),
        (UnaryOp::BitwiseNot, Literal::I32(v)) => Some(Literal::I32(!v)),
        (UnaryOp::BitwiseNot, Literal::U32(v)) => Some(Literal::U32(!v)),
        (UnaryOp::BitwiseNot, Literal::I64(v)) => Some(Literal::I64(!v)),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, left: Literal, right: Literal) -> Option<Literal> {
    match (left, right) {
        (Literal::F32(l), Literal::F32(r)) => fold_f32(op, l, r),
        (Literal::I32(l), Literal::I32(r)) => fold_i32(op, l, r),
        (Literal::U32(l), Literal::U32(r)) => fold_u32(op, l, r),
        (Literal::Bool(l), Literal::Bool(r)) => match op {
            BinaryOp::Equal => Some(Literal::Bool(l == r)),
            BinaryOp::NotEqual => Some(Literal::Bool(l != r)),
            BinaryOp::BitwiseAnd => Some(Literal::Bool(l & r)),
            BinaryOp::BitwiseOr => Some(Literal::Bool(l | r)),
            _ => None,
        },
        _ => None,
    }
}

fn fold_f32(op: BinaryOp, l: f32, r: f32) -> Option<Literal> {
    match op {
        BinaryOp::Add => Some(Literal::F32(l + r)),
        BinaryOp::Subtract => Some(Literal::F32(l - r)),
        BinaryOp::Multiply => Some(Literal::F32(l * r)),
        BinaryOp::Divide => Some(Literal::F32(l / r)),
        BinaryOp::Modulo => Some(Literal::F32(l % r)),
        BinaryOp::Equal => Some(Literal::Bool(l == r)),
        BinaryOp::NotEqual => Some(Literal::Bool(l != r)),
        BinaryOp::Less => Some(Literal::Bool(l < r)),
        BinaryOp::LessEqual => Some(Literal::Bool(l <= r)),
        BinaryOp::Greater => Some(Literal::Bool(l > r)),
        BinaryOp::GreaterEqual => Some(Literal::Bool(l >= r)),
        _ => None,
    }
}

fn fold_i32(op: BinaryOp, l: i32, r: i32) -> Option<Literal> {
    match op {
        BinaryOp::Add => Some(Literal::I32(l.wrapping_add(r))),
        BinaryOp::Subtract => Some(Literal::I32(l.wrapping_sub(r))),
        BinaryOp::Multiply => Some(Literal::I32(l.wrapping_mul(r))),
        BinaryOp::Divide if r != 0 => Some(Literal::I32(l.wrapping_div(r))),
        BinaryOp::Modulo if r != 0 => Some(Literal::I32(l.wrapping_rem(r))),
        BinaryOp::Equal => Some(Literal::Bool(l == r)),
        BinaryOp::NotEqual => Some(Literal::Bool(l != r)),
        BinaryOp::Less => Some(Literal::Bool(l < r)),
        BinaryOp::LessEqual => Some(Literal::Bool(l <= r)),
        BinaryOp::Greater => Some(Literal::Bool(l > r)),
        BinaryOp::GreaterEqual => Some(Literal::Bool(l >= r)),
        BinaryOp::BitwiseAnd => Some(Literal::I32(l & r)),
        BinaryOp::BitwiseOr => Some(Literal::I32(l | r)),
        BinaryOp::BitwiseXor => Some(Literal::I32(l ^ r)),
        BinaryOp::ShiftLeft => Some(Literal::I32(l.wrapping_shl(r as u32))),
        BinaryOp::ShiftRight => Some(Literal::I32(l.wrapping_shr(r as u32))),
        _ => None,
    }
}

fn fold_u32(op: BinaryOp, l: u32, r: u32) -> Option<Literal> {
    match op {
        BinaryOp::Add => Some(Literal::U32(l.wrapping_add(r))),
        BinaryOp::Subtract => Some(Literal::U32(l.wrapping_sub(r))),
        BinaryOp::Multiply => Some(Literal::U32(l.wrapping_mul(r))),
        BinaryOp::Divide if r != 0 => Some(Literal::U32(l / r)),
        BinaryOp::Modulo if r != 0 => Some(Literal::U32(l % r)),
        BinaryOp::Equal => Some(Literal::Bool(l == r)),
        BinaryOp::NotEqual => Some(Literal::Bool(l != r)),
        BinaryOp::Less => Some(Literal::Bool(l < r)),
        BinaryOp::LessEqual => Some(Literal::Bool(l <= r)),
        BinaryOp::Greater => Some(Literal::Bool(l > r)),
        BinaryOp::GreaterEqual => Some(Literal::Bool(l >= r)),
        BinaryOp::BitwiseAnd => Some(Literal::U32(l & r)),
        BinaryOp::BitwiseOr => Some(Literal::U32(l | r)),
        BinaryOp::BitwiseXor => Some(Literal::U32(l ^ r)),
        BinaryOp::ShiftLeft => Some(Literal::U32(l.wrapping_shl(r))),
        BinaryOp::ShiftRight => Some(Literal::U32(l.wrapping_shr(r))),
        _ => None,
    }
}
