//! Statements — operations with side effects and structured control flow.

use crate::arena::Handle;
use crate::expr::Expression;

/// A block of statements.
pub type Block = Vec<Statement>;

/// A statement in a function body.
#[derive(Clone, Debug)]
pub enum Statement {
    /// Write a value through a pointer.
    Store {
        pointer: Handle<Expression>,
        value: Handle<Expression>,
    },
    /// Call a function in the same module.
    ///
    /// `result`, when present, is the [`Expression::CallResult`] slot the
    /// call's return value flows into.
    Call {
        function: Handle<crate::Function>,
        arguments: Vec<Handle<Expression>>,
        result: Option<Handle<Expression>>,
    },
    /// Conditional branch.
    If {
        condition: Handle<Expression>,
        accept: Block,
        reject: Block,
    },
    /// Structured loop. `break_if`, when present, is evaluated at the top of
    /// every iteration.
    Loop {
        body: Block,
        break_if: Option<Handle<Expression>>,
    },
    /// Break out of the innermost loop.
    Break,
    /// Continue with the next iteration of the innermost loop.
    Continue,
    /// Return from the function.
    Return { value: Option<Handle<Expression>> },
}

impl Statement {
    /// Visits every statement in `block`, depth first.
    pub fn walk(block: &Block, visit: &mut impl FnMut(&Statement)) {
        for stmt in block {
            visit(stmt);
            match stmt {
                Self::If { accept, reject, .. } => {
                    Self::walk(accept, visit);
                    Self::walk(reject, visit);
                }
                Self::Loop { body, .. } => Self::walk(body, visit),
                _ => {}
            }
        }
    }
}
