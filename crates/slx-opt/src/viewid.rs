//! View-ID state computation.
//!
//! Records in the module metadata whether the linked entry (or anything it
//! still calls) reads the view ID intrinsic. Downstream consumers use this
//! to decide whether per-view instancing is required.

use slx_ir::ops::{self, OpCode};
use slx_ir::{Module, Statement};

use crate::Pass;

/// Sets [`ShaderInfo::uses_view_id`](slx_ir::ShaderInfo) from the linked
/// code.
#[derive(Debug)]
pub struct ComputeViewIdState;

impl Pass for ComputeViewIdState {
    fn name(&self) -> &str {
        "viewid-state"
    }

    fn run(&self, module: &mut Module) -> bool {
        let mut uses = false;
        for (_, func) in module.functions.iter() {
            let Some(body) = &func.body else { continue };
            Statement::walk(body, &mut |stmt| {
                uses |= ops::is_op_call(module, func, stmt, Some(OpCode::ViewId));
            });
            if uses {
                break;
            }
        }
        let changed = module.info.uses_view_id != uses;
        module.info.uses_view_id = uses;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slx_ir::ops::OpRegistry;
    use slx_ir::{Expression, Function, Literal};

    #[test]
    fn detects_view_id_read() {
        let mut module = Module::new("m", "slx");
        let mut registry = OpRegistry::new();
        let void = ops::void_type(&mut module);
        let view_id = registry
            .get_op_func(&mut module, OpCode::ViewId, void)
            .unwrap();

        let mut main = Function::new("main");
        let code = main
            .expressions
            .append(Expression::Literal(Literal::U32(OpCode::ViewId as u32)));
        let result = main.expressions.append(Expression::CallResult(view_id));
        main.body = Some(vec![
            Statement::Call {
                function: view_id,
                arguments: vec![code],
                result: Some(result),
            },
            Statement::Return { value: Some(result) },
        ]);
        module.functions.append(main);

        assert!(ComputeViewIdState.run(&mut module));
        assert!(module.info.uses_view_id);
        // Idempotent on the second run.
        assert!(!ComputeViewIdState.run(&mut module));
    }

    #[test]
    fn clear_when_absent() {
        let mut module = Module::new("m", "slx");
        module.info.uses_view_id = true;
        assert!(ComputeViewIdState.run(&mut module));
        assert!(!module.info.uses_view_id);
    }
}
