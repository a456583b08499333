//! Resource condensing pass.
//!
//! After linking, per-class resource IDs may be sparse: merged libraries
//! contribute resources the final entry never touches. This pass finds the
//! IDs actually reaching `createHandle` call sites, renumbers each class
//! densely in old-ID order, rewrites the range-ID literal arguments, and
//! drops dead table entries.

use std::collections::{BTreeSet, HashMap};

use slx_ir::ops::{self, OpCode};
use slx_ir::{Expression, Literal, Module, ResourceClass, Statement};

use crate::Pass;

/// Renumbers per-class resource IDs densely from live `createHandle` sites.
#[derive(Debug)]
pub struct CondenseResources;

impl Pass for CondenseResources {
    fn name(&self) -> &str {
        "condense-resources"
    }

    fn run(&self, module: &mut Module) -> bool {
        let live = collect_live_ids(module);

        // Dense renumbering per class, in old-ID order.
        let mut renumber: HashMap<(ResourceClass, u32), u32> = HashMap::new();
        for &(class, old_id) in &live {
            let next = renumber.keys().filter(|(c, _)| *c == class).count() as u32;
            renumber.insert((class, old_id), next);
        }

        let mut changed = false;
        for res in module.info.all_resources() {
            if renumber.get(&(res.class, res.id)) != Some(&res.id) {
                changed = true;
                break;
            }
        }
        if !changed && module.info.all_resources().count() == live.len() {
            return false;
        }

        log::debug!(
            "condensing {} resource tables down to {} live bindings",
            module.info.all_resources().count(),
            live.len()
        );

        rewrite_handle_sites(module, &renumber);

        for table in [
            &mut module.info.srvs,
            &mut module.info.uavs,
            &mut module.info.cbuffers,
            &mut module.info.samplers,
        ] {
            table.retain(|res| renumber.contains_key(&(res.class, res.id)));
            for res in table.iter_mut() {
                res.id = renumber[&(res.class, res.id)];
            }
            table.sort_by_key(|res| res.id);
        }
        true
    }
}

/// `(class, id)` pairs reaching a `createHandle` call, ordered.
fn collect_live_ids(module: &Module) -> BTreeSet<(ResourceClass, u32)> {
    let mut live = BTreeSet::new();
    for (_, func) in module.functions.iter() {
        let Some(body) = &func.body else { continue };
        Statement::walk(body, &mut |stmt| {
            if let Some((class, id, _)) = handle_site(module, func, stmt) {
                live.insert((class, id));
            }
        });
    }
    live
}

/// Decodes a `createHandle` call site into `(class, range ID, id argument)`.
fn handle_site(
    module: &Module,
    func: &slx_ir::Function,
    stmt: &Statement,
) -> Option<(ResourceClass, u32, slx_ir::Handle<Expression>)> {
    if ops::op_call_code(module, func, stmt) != Some(OpCode::CreateHandle) {
        return None;
    }
    let Statement::Call { arguments, .. } = stmt else {
        return None;
    };
    let class_arg = *arguments.get(1)?;
    let id_arg = *arguments.get(2)?;
    let class = match func.expressions[class_arg] {
        Expression::Literal(lit) => ResourceClass::from_index(lit.as_u32()?)?,
        _ => return None,
    };
    let id = match func.expressions[id_arg] {
        Expression::Literal(lit) => lit.as_u32()?,
        _ => return None,
    };
    Some((class, id, id_arg))
}

fn rewrite_handle_sites(module: &mut Module, renumber: &HashMap<(ResourceClass, u32), u32>) {
    let handles: Vec<_> = module
        .functions
        .iter()
        .filter(|(_, f)| f.body.is_some())
        .map(|(h, _)| h)
        .collect();
    for h in handles {
        // Collect first: rewriting appends literals to the same arena.
        let mut rewrites: Vec<(slx_ir::Handle<Expression>, u32)> = Vec::new();
        {
            let func = &module.functions[h];
            let body = func.body.clone().unwrap_or_default();
            Statement::walk(&body, &mut |stmt| {
                if let Some((class, old_id, id_arg)) = handle_site(module, func, stmt)
                    && let Some(&new_id) = renumber.get(&(class, old_id))
                    && new_id != old_id
                {
                    rewrites.push((id_arg, new_id));
                }
            });
        }
        let func = &mut module.functions[h];
        for (id_arg, new_id) in rewrites {
            func.expressions[id_arg] = Expression::Literal(Literal::U32(new_id));
        }
    }
}
