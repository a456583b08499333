//! The link job: turns a reachability result into a fresh executable
//! module.
//!
//! Function shells are created first so call cycles resolve naturally when
//! bodies are cloned; cross-library and intrinsic callees bind by name
//! before each body clone. Resource descriptors merge by global name with
//! type-compatibility checks, and static constructors become explicit
//! calls at the entry prologue.

use std::collections::BTreeMap;

use fxhash::FxHashSet;
use slx_ir::ops::OpRegistry;
use slx_ir::{
    Expression, FnAttrs, Function, GlobalVariable, Handle, Literal, Module, Resource, ShaderKind,
    ShaderModel, Statement, Type, ValueMap, clone_function_into, clone_global_into,
    declare_matching_function, map_type,
};
use slx_opt::PassManager;

use crate::error::{Diagnostic, LinkError};
use crate::library::{FunctionLinkInfo, Library};

/// A resource merged into the output, keyed by its global name.
struct MergedResource {
    desc: Resource,
    out_global: Handle<GlobalVariable>,
    out_ty: Handle<Type>,
}

/// Per-`link` assembly state gathered by the reachability walk.
pub(crate) struct LinkJob<'a> {
    /// User-code definitions to clone, in discovery order.
    function_defs: Vec<(usize, &'a FunctionLinkInfo)>,
    seen: FxHashSet<(usize, Handle<Function>)>,
    /// Intrinsic declarations, shared by name rather than cloned.
    op_functions: BTreeMap<String, (usize, Handle<Function>)>,
}

impl<'a> LinkJob<'a> {
    pub(crate) fn new() -> Self {
        Self {
            function_defs: Vec::new(),
            seen: FxHashSet::default(),
            op_functions: BTreeMap::new(),
        }
    }

    /// Records a user-code definition discovered by the walk.
    pub(crate) fn add_function(&mut self, slot: usize, info: &'a FunctionLinkInfo) {
        if self.seen.insert((slot, info.func)) {
            self.function_defs.push((slot, info));
        }
    }

    /// Records an intrinsic op function encountered by the walk.
    pub(crate) fn add_op_function(&mut self, slot: usize, module: &Module, f: Handle<Function>) {
        self.op_functions
            .entry(module.functions[f].name.clone())
            .or_insert((slot, f));
    }

    /// Clones everything the walk gathered into a fresh module, merges
    /// resources, schedules constructors, and runs the prepare pipeline.
    pub(crate) fn link(
        self,
        libs: &[Library],
        entry_slot: usize,
        entry_info: &FunctionLinkInfo,
        entry_name: &str,
        profile: &str,
    ) -> Result<Module, LinkError> {
        let entry_lib = &libs[entry_slot];
        let entry_func = entry_info.func;

        let Some(&props) = entry_lib.module().info.props(entry_func) else {
            return Err(Diagnostic::NoEntryProps(entry_name.to_string()).into());
        };
        if matches!(props.kind, ShaderKind::Library | ShaderKind::Invalid) {
            return Err(Diagnostic::InvalidProfile(profile.to_string()).into());
        }
        let Some(sm) = ShaderModel::get_by_name(profile) else {
            return Err(Diagnostic::InvalidProfile(profile.to_string()).into());
        };
        if sm.kind != props.kind {
            return Err(Diagnostic::ShaderKindMismatch {
                profile: profile.to_string(),
                entry_kind: props.kind,
            }
            .into());
        }

        let mut out = Module::new(entry_name, entry_lib.module().target.clone());
        out.info.shader_model = Some(sm);

        let mut vmaps: Vec<ValueMap> = (0..libs.len()).map(|_| ValueMap::new()).collect();
        let mut new_functions: BTreeMap<String, Handle<Function>> = BTreeMap::new();
        let mut new_globals: BTreeMap<String, Handle<GlobalVariable>> = BTreeMap::new();
        let mut resources: BTreeMap<String, MergedResource> = BTreeMap::new();

        // Intrinsics keep their declarations; one per name.
        for (name, &(slot, f)) in &self.op_functions {
            let decl = declare_matching_function(&mut vmaps[slot], &mut out, libs[slot].module(), f);
            let h = out.functions.append(decl);
            new_functions.insert(name.clone(), h);
            vmaps[slot].functions.insert(f, h);
        }

        // Shells for every user function, so bodies can reference each
        // other (including cycles) before any body is populated.
        for &(slot, info) in &self.function_defs {
            let mut shell =
                declare_matching_function(&mut vmaps[slot], &mut out, libs[slot].module(), info.func);
            shell.attributes |= FnAttrs::ALWAYS_INLINE;
            let name = shell.name.clone();
            let h = out.functions.append(shell);
            new_functions.insert(name, h);
            vmaps[slot].functions.insert(info.func, h);
        }

        // Designate the entry.
        let new_entry = new_functions[entry_name];
        out.info.entry = Some(new_entry);
        out.info.entry_name = Some(entry_name.to_string());
        out.functions[new_entry].attributes.remove(FnAttrs::ALWAYS_INLINE);

        let mut out_props = props;
        if let Some(hull) = &mut out_props.hull {
            let patch_name = entry_lib.module().functions[hull.patch_constant].name.clone();
            let Some(&new_patch) = new_functions.get(&patch_name) else {
                return Err(Diagnostic::UndefFunction(patch_name).into());
            };
            out.functions[new_patch].attributes.remove(FnAttrs::ALWAYS_INLINE);
            hull.patch_constant = new_patch;
        }
        out.info.set_props(new_entry, out_props);
        if let Some(sig) = entry_lib.module().info.signatures.get(&entry_func) {
            out.info.signatures.insert(new_entry, sig.clone());
        }

        // Globals, with the duplicate-resource recovery path: a resource
        // declared by several libraries folds onto one output global as
        // long as the types agree.
        let mut diags: Vec<Diagnostic> = Vec::new();
        for &(slot, info) in &self.function_defs {
            let lib = &libs[slot];
            for &g in &info.used_globals {
                let gname = lib.module().global_variables[g].name.clone();
                if let Some(&existing) = new_globals.get(&gname) {
                    if !vmaps[slot].globals.contains_key(&g) {
                        if let Some(res) = lib.get_resource(g) {
                            let out_ty = map_type(
                                &mut vmaps[slot],
                                &mut out.types,
                                &lib.module().types,
                                lib.module().global_variables[g].ty,
                            );
                            match add_resource(&mut resources, res, existing, out_ty) {
                                Ok(()) => {
                                    vmaps[slot].globals.insert(g, existing);
                                }
                                Err(diag) => diags.push(diag),
                            }
                        } else {
                            diags.push(Diagnostic::RedefineGlobal(gname));
                        }
                    }
                    continue;
                }

                let new_g = clone_global_into(&mut vmaps[slot], &mut out, lib.module(), g);
                // Initializer cloning may have pulled further globals in;
                // register them all by name.
                for (&src_g, &dst_g) in &vmaps[slot].globals {
                    let name = lib.module().global_variables[src_g].name.clone();
                    new_globals.entry(name).or_insert(dst_g);
                }
                if let Some(res) = lib.get_resource(g) {
                    let out_ty = out.global_variables[new_g].ty;
                    if let Err(diag) = add_resource(&mut resources, res, new_g, out_ty) {
                        diags.push(diag);
                    }
                }
            }
        }
        if !diags.is_empty() {
            return Err(LinkError::Diagnostics(diags));
        }

        // Clone bodies. Cross-library and intrinsic callees bind by name.
        for &(slot, info) in &self.function_defs {
            let lib = &libs[slot];
            for &callee in &info.used_functions {
                if !vmaps[slot].functions.contains_key(&callee) {
                    let cname = lib.module().functions[callee].name.clone();
                    let Some(&bound) = new_functions.get(&cname) else {
                        return Err(Diagnostic::UndefFunction(cname).into());
                    };
                    vmaps[slot].functions.insert(callee, bound);
                }
            }
            let new_f = vmaps[slot].functions[&info.func];
            clone_function_into(&mut vmaps[slot], &mut out, lib.module(), info.func, new_f);
        }

        // Static constructors run before the entry body.
        let init_calls: Vec<Statement> = self
            .function_defs
            .iter()
            .filter(|&&(slot, info)| libs[slot].is_init_func(info.func))
            .map(|&(slot, info)| Statement::Call {
                function: vmaps[slot].functions[&info.func],
                arguments: Vec::new(),
                result: None,
            })
            .collect();
        if !init_calls.is_empty()
            && let Some(body) = &mut out.functions[new_entry].body
        {
            body.splice(0..0, init_calls);
        }

        // Refresh the intrinsic cache over the assembled module.
        let registry = OpRegistry::for_module(&out);
        log::debug!(
            "linked {} functions, {} intrinsics, {} merged resources for {}",
            self.function_defs.len(),
            registry.len(),
            resources.len(),
            entry_name
        );

        add_resources_to_module(&mut out, resources);

        PassManager::prepare_pipeline().run_once(&mut out);

        Ok(out)
    }
}

/// Merges one resource descriptor, enforcing type compatibility for
/// same-named resources.
fn add_resource(
    resources: &mut BTreeMap<String, MergedResource>,
    res: &Resource,
    out_global: Handle<GlobalVariable>,
    out_ty: Handle<Type>,
) -> Result<(), Diagnostic> {
    match resources.get(&res.name) {
        Some(existing) => {
            if existing.out_ty == out_ty {
                Ok(())
            } else {
                Err(Diagnostic::RefineResource {
                    class: res.class,
                    name: res.name.clone(),
                })
            }
        }
        None => {
            resources.insert(
                res.name.clone(),
                MergedResource {
                    desc: res.clone(),
                    out_global,
                    out_ty,
                },
            );
            Ok(())
        }
    }
}

/// Copies merged descriptors into the output metadata, allocating
/// per-class IDs, and replaces loads of each resource global with its
/// range-ID constant.
fn add_resources_to_module(out: &mut Module, resources: BTreeMap<String, MergedResource>) {
    for (_, merged) in resources {
        let mut desc = merged.desc;
        desc.global = merged.out_global;
        let class = desc.class;
        let id = out.info.add_resource(desc);
        log::debug!("assigned {class} range ID {id}");
        replace_loads_with_id(out, merged.out_global, id);
    }
}

fn replace_loads_with_id(out: &mut Module, gv: Handle<GlobalVariable>, id: u32) {
    for (_, func) in out.functions.iter_mut() {
        let pointers: FxHashSet<Handle<Expression>> = func
            .expressions
            .iter()
            .filter(|(_, e)| matches!(e, Expression::GlobalVariable(g) if *g == gv))
            .map(|(h, _)| h)
            .collect();
        if pointers.is_empty() {
            continue;
        }
        let loads: Vec<Handle<Expression>> = func
            .expressions
            .iter()
            .filter(|(_, e)| matches!(e, Expression::Load { pointer } if pointers.contains(pointer)))
            .map(|(h, _)| h)
            .collect();
        for h in loads {
            func.expressions[h] = Expression::Literal(Literal::U32(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_order_is_preserved_and_deduplicated() {
        let mut module = Module::new("m", "slx");
        let mut a = Function::new("a");
        a.body = Some(vec![Statement::Return { value: None }]);
        let a = module.functions.append(a);
        let mut b = Function::new("b");
        b.body = Some(vec![Statement::Return { value: None }]);
        module.functions.append(b);
        let lib = Library::new(module);

        let info_a = lib.link_info("a").unwrap();
        let info_b = lib.link_info("b").unwrap();
        let mut job = LinkJob::new();
        job.add_function(0, info_a);
        job.add_function(0, info_b);
        job.add_function(0, info_a);
        assert_eq!(job.function_defs.len(), 2);
        assert_eq!(job.function_defs[0].1.func, a);
    }
}
