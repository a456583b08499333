//! Library ingestion.
//!
//! A [`Library`] owns one ingested module and the link metadata derived
//! from it: which functions it defines, what each of them pulls in, which
//! globals stand for resources, and which functions are static
//! constructors. Ingestion renames internal symbols so they stay unique
//! across libraries and inverts the use graph in a single pass.

use std::collections::{BTreeMap, BTreeSet};

use fxhash::{FxHashMap, FxHashSet};
use slx_ir::{
    Expression, Function, GlobalVariable, Handle, Linkage, Module, Resource, ResourceClass,
    ShaderKind, Statement,
};

/// Identity of a resource within its library: class plus table index.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ResourceRef {
    /// Resource class.
    pub class: ResourceClass,
    /// Index into the library module's per-class resource table.
    pub index: usize,
}

/// Link metadata for one defined function.
#[derive(Debug)]
pub struct FunctionLinkInfo {
    /// The function, owned by the library's module.
    pub func: Handle<Function>,
    /// Direct callees, plus implicit companions (patch-constant functions,
    /// required static constructors).
    pub used_functions: BTreeSet<Handle<Function>>,
    /// Globals referenced, transitively through constant initializers.
    pub used_globals: BTreeSet<Handle<GlobalVariable>>,
    /// Resources among `used_globals`.
    pub used_resources: BTreeSet<ResourceRef>,
}

impl FunctionLinkInfo {
    fn new(func: Handle<Function>) -> Self {
        Self {
            func,
            used_functions: BTreeSet::new(),
            used_globals: BTreeSet::new(),
            used_resources: BTreeSet::new(),
        }
    }
}

/// A registered library: an ingested module plus its link metadata.
#[derive(Debug)]
pub struct Library {
    module: Module,
    function_table: BTreeMap<String, FunctionLinkInfo>,
    resource_map: FxHashMap<Handle<GlobalVariable>, ResourceRef>,
    init_funcs: FxHashSet<Handle<Function>>,
}

impl Library {
    /// Ingests `module`, renaming internal symbols and building the link
    /// metadata tables.
    pub fn new(mut module: Module) -> Self {
        let module_id = module.name.clone();

        // Internal symbols get the module identifier as a prefix so names
        // are unique across libraries.
        for (_, func) in module.functions.iter_mut() {
            if !func.is_declaration() && func.linkage == Linkage::Internal {
                func.name = format!("{module_id}{}", func.name);
            }
        }
        for (_, gv) in module.global_variables.iter_mut() {
            if gv.linkage == Linkage::Internal {
                gv.name = format!("{module_id}{}", gv.name);
            }
        }

        let mut function_table: BTreeMap<String, FunctionLinkInfo> = BTreeMap::new();
        for (h, func) in module.functions.iter() {
            if !func.is_declaration() {
                function_table.insert(func.name.clone(), FunctionLinkInfo::new(h));
            }
        }

        // Invert the call graph: scanning each definition's call sites
        // covers every user a function has.
        for (_, func) in module.functions.iter() {
            let Some(body) = &func.body else { continue };
            let info = function_table
                .get_mut(&func.name)
                .unwrap_or_else(|| panic!("defined function {} missing from table", func.name));
            Statement::walk(body, &mut |stmt| {
                if let Statement::Call { function, .. } = stmt {
                    info.used_functions.insert(*function);
                }
            });
        }

        // A hull entry implicitly pulls in its patch-constant companion.
        for (h, props) in &module.info.func_props {
            if props.kind == ShaderKind::Hull
                && let Some(hull) = props.hull
            {
                let name = &module.functions[*h].name;
                if let Some(info) = function_table.get_mut(name) {
                    info.used_functions.insert(hull.patch_constant);
                }
            }
        }

        // Globals referenced from each function, expanded transitively
        // through constant initializers.
        for (_, func) in module.functions.iter() {
            if func.is_declaration() {
                continue;
            }
            let info = function_table
                .get_mut(&func.name)
                .unwrap_or_else(|| panic!("defined function {} missing from table", func.name));
            for (_, expr) in func.expressions.iter() {
                if let Expression::GlobalVariable(g) = expr {
                    info.used_globals.insert(*g);
                }
            }
            let mut worklist: Vec<_> = info.used_globals.iter().copied().collect();
            while let Some(g) = worklist.pop() {
                if let Some(init) = module.global_variables[g].init {
                    for referenced in globals_in_const(&module, init) {
                        if info.used_globals.insert(referenced) {
                            worklist.push(referenced);
                        }
                    }
                }
            }
        }

        // Resource map: global symbol -> descriptor identity.
        let mut resource_map = FxHashMap::default();
        for class in [
            ResourceClass::Srv,
            ResourceClass::Uav,
            ResourceClass::CBuffer,
            ResourceClass::Sampler,
        ] {
            for (index, res) in module.info.resources(class).iter().enumerate() {
                resource_map.insert(res.global, ResourceRef { class, index });
            }
        }
        for info in function_table.values_mut() {
            for g in &info.used_globals {
                if let Some(&res) = resource_map.get(g) {
                    info.used_resources.insert(res);
                }
            }
        }

        // Static constructors. Entries must be defined void() functions;
        // anything else is skipped the way null ctor slots are.
        let mut init_funcs = FxHashSet::default();
        for ctor in &module.ctors {
            let func = &module.functions[ctor.function];
            if func.is_declaration() || !func.params.is_empty() || func.result.is_some() {
                log::warn!("skipping malformed static constructor {}", func.name);
                continue;
            }
            init_funcs.insert(ctor.function);
        }

        // Any function reading a global a constructor touches must pull
        // the constructor in, so initialization precedes every consumer.
        let mut global_users: FxHashMap<Handle<GlobalVariable>, Vec<Handle<Function>>> =
            FxHashMap::default();
        for info in function_table.values() {
            for &g in &info.used_globals {
                global_users.entry(g).or_default().push(info.func);
            }
        }
        for &ctor in &init_funcs {
            let ctor_name = module.functions[ctor].name.clone();
            let ctor_globals: Vec<_> = match function_table.get(&ctor_name) {
                Some(info) => info.used_globals.iter().copied().collect(),
                None => continue,
            };
            for g in ctor_globals {
                let Some(users) = global_users.get(&g) else {
                    continue;
                };
                for &user in users {
                    if user == ctor {
                        continue;
                    }
                    let name = module.functions[user].name.clone();
                    if let Some(info) = function_table.get_mut(&name) {
                        info.used_functions.insert(ctor);
                    }
                }
            }
        }

        Self {
            module,
            function_table,
            resource_map,
            init_funcs,
        }
    }

    /// The ingested module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// The name-to-link-info table of defined functions.
    pub fn function_table(&self) -> &BTreeMap<String, FunctionLinkInfo> {
        &self.function_table
    }

    /// Link info for a defined function, by post-ingest name.
    pub fn link_info(&self, name: &str) -> Option<&FunctionLinkInfo> {
        self.function_table.get(name)
    }

    /// Whether this library defines `name`.
    pub fn has_function(&self, name: &str) -> bool {
        self.function_table.contains_key(name)
    }

    /// Whether `func` is a static constructor of this library.
    pub fn is_init_func(&self, func: Handle<Function>) -> bool {
        self.init_funcs.contains(&func)
    }

    /// Whether `gv` stands for a resource.
    pub fn is_resource_global(&self, gv: Handle<GlobalVariable>) -> bool {
        self.resource_map.contains_key(&gv)
    }

    /// The resource descriptor behind `gv`, if it stands for one.
    pub fn get_resource(&self, gv: Handle<GlobalVariable>) -> Option<&Resource> {
        let res = self.resource_map.get(&gv)?;
        self.module.info.resources(res.class).get(res.index)
    }
}

fn globals_in_const(module: &Module, expr: Handle<Expression>) -> Vec<Handle<GlobalVariable>> {
    let mut out = Vec::new();
    let mut stack = vec![expr];
    while let Some(e) = stack.pop() {
        if let Expression::GlobalVariable(g) = module.global_expressions[e] {
            out.push(g);
        }
        stack.extend(module.global_expressions[e].operands());
    }
    out
}
