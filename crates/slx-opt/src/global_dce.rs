//! Module-level dead code elimination.
//!
//! Drops functions unreachable from the entry (and from surviving ctor
//! calls) and globals nothing references, compacting the arenas. Runs
//! after inlining, which is what strands the inlined definitions.

use std::collections::HashSet;

use slx_ir::{Expression, Function, GlobalVariable, Handle, Module, Statement};

use crate::Pass;

/// Removes unreachable functions and unreferenced globals.
#[derive(Debug)]
pub struct GlobalDce;

impl Pass for GlobalDce {
    fn name(&self) -> &str {
        "global-dce"
    }

    fn run(&self, module: &mut Module) -> bool {
        let live_funcs = collect_live_functions(module);
        let mut changed = false;
        if live_funcs.len() != module.functions.len() {
            module.retain_functions(&live_funcs);
            changed = true;
        }

        let live_globals = collect_live_globals(module);
        if live_globals.len() != module.global_variables.len() {
            module.retain_globals(&live_globals);
            changed = true;
        }
        changed
    }
}

/// Functions reachable through calls from the roots: the designated entry
/// (plus its patch-constant companion) or, absent one, every definition.
fn collect_live_functions(module: &Module) -> HashSet<Handle<Function>> {
    let mut roots: Vec<Handle<Function>> = Vec::new();
    match module.info.entry {
        Some(entry) => {
            roots.push(entry);
            if let Some(props) = module.info.props(entry)
                && let Some(hull) = props.hull
            {
                roots.push(hull.patch_constant);
            }
        }
        // Not a linked executable; keep every definition.
        None => roots.extend(
            module
                .functions
                .iter()
                .filter(|(_, f)| !f.is_declaration())
                .map(|(h, _)| h),
        ),
    }

    let mut live: HashSet<Handle<Function>> = HashSet::new();
    let mut worklist = roots;
    while let Some(f) = worklist.pop() {
        if !live.insert(f) {
            continue;
        }
        let func = &module.functions[f];
        if let Some(body) = &func.body {
            Statement::walk(body, &mut |stmt| {
                if let Statement::Call { function, .. } = stmt {
                    worklist.push(*function);
                }
            });
        }
        // Result slots can outlive their call statements.
        for (_, expr) in func.expressions.iter() {
            if let Expression::CallResult(g) = expr {
                worklist.push(*g);
            }
        }
    }
    live
}

/// Globals referenced from live code, from resource tables, or from other
/// live globals' initializers.
fn collect_live_globals(module: &Module) -> HashSet<Handle<GlobalVariable>> {
    let mut live: HashSet<Handle<GlobalVariable>> = HashSet::new();
    let mut worklist: Vec<Handle<GlobalVariable>> = Vec::new();

    for (_, func) in module.functions.iter() {
        for (_, expr) in func.expressions.iter() {
            if let Expression::GlobalVariable(g) = expr {
                worklist.push(*g);
            }
        }
    }
    worklist.extend(module.info.all_resources().map(|res| res.global));

    while let Some(g) = worklist.pop() {
        if !live.insert(g) {
            continue;
        }
        if let Some(init) = module.global_variables[g].init {
            collect_globals_in_const(module, init, &mut worklist);
        }
    }
    live
}

fn collect_globals_in_const(
    module: &Module,
    expr: Handle<Expression>,
    out: &mut Vec<Handle<GlobalVariable>>,
) {
    if let Expression::GlobalVariable(g) = module.global_expressions[expr] {
        out.push(g);
    }
    for operand in module.global_expressions[expr].operands() {
        collect_globals_in_const(module, operand, out);
    }
}
