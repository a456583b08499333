//! The IR container: functions, globals, types, and shader metadata.

use std::collections::{HashMap, HashSet};

use crate::arena::{Arena, Handle, UniqueArena};
use crate::expr::Expression;
use crate::func::Function;
use crate::global::GlobalVariable;
use crate::meta::ShaderInfo;
use crate::stmt::{Block, Statement};
use crate::types::Type;

/// One entry of the module's static-constructor list.
///
/// Constructors run before the entry function, lowest priority first.
/// Library links leave the list in place; executable links lower each entry
/// into a call at the entry prologue.
#[derive(Clone, Copy, Debug)]
pub struct CtorEntry {
    /// Scheduling priority. Lower runs earlier.
    pub priority: u16,
    /// The constructor. Must be a defined `void()` function.
    pub function: Handle<Function>,
}

/// A compiled IR module.
#[derive(Clone, Debug, Default)]
pub struct Module {
    /// Module identifier. The linker sets this to the registered library
    /// name, and it prefixes internal symbols after ingest.
    pub name: String,
    /// Target triple string.
    pub target: String,
    /// Deduplicated type arena.
    pub types: UniqueArena<Type>,
    /// Module-scope variables.
    pub global_variables: Arena<GlobalVariable>,
    /// Constant expressions for global initializers.
    pub global_expressions: Arena<Expression>,
    /// All functions, definitions and declarations alike.
    pub functions: Arena<Function>,
    /// Static constructors.
    pub ctors: Vec<CtorEntry>,
    /// Shader metadata.
    pub info: ShaderInfo,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    /// Finds a function by symbol name.
    pub fn find_function(&self, name: &str) -> Option<Handle<Function>> {
        self.functions
            .iter()
            .find(|(_, f)| f.name == name)
            .map(|(h, _)| h)
    }

    /// Finds a global by symbol name.
    pub fn find_global(&self, name: &str) -> Option<Handle<GlobalVariable>> {
        self.global_variables
            .iter()
            .find(|(_, gv)| gv.name == name)
            .map(|(h, _)| h)
    }

    /// Drops every function not in `keep`, compacting the arena and
    /// rewriting all function references. Returns the handle remap.
    ///
    /// The caller must ensure no kept function calls a dropped one.
    pub fn retain_functions(
        &mut self,
        keep: &HashSet<Handle<Function>>,
    ) -> HashMap<Handle<Function>, Handle<Function>> {
        let mut remap = HashMap::new();
        let mut kept = Arena::new();
        for (old, func) in self.functions.iter() {
            if keep.contains(&old) {
                remap.insert(old, kept.append(func.clone()));
            }
        }
        self.functions = kept;

        for (_, func) in self.functions.iter_mut() {
            for (_, expr) in func.expressions.iter_mut() {
                if let Expression::CallResult(f) = expr {
                    match remap.get(f) {
                        Some(new_f) => *f = *new_f,
                        // Orphaned result slot of a removed call; the
                        // expression is unused, it just must not dangle.
                        None => *expr = Expression::Literal(crate::expr::Literal::U32(0)),
                    }
                }
            }
            if let Some(body) = &mut func.body {
                remap_calls_in_block(body, &remap);
            }
        }

        self.ctors.retain(|ctor| remap.contains_key(&ctor.function));
        for ctor in &mut self.ctors {
            ctor.function = remap[&ctor.function];
        }

        self.info.entry = self.info.entry.and_then(|e| remap.get(&e).copied());
        let props = std::mem::take(&mut self.info.func_props);
        self.info.func_props = props
            .into_iter()
            .filter_map(|(f, mut p)| {
                let f = *remap.get(&f)?;
                if let Some(hull) = &mut p.hull {
                    hull.patch_constant = *remap.get(&hull.patch_constant)?;
                }
                Some((f, p))
            })
            .collect();
        let signatures = std::mem::take(&mut self.info.signatures);
        self.info.signatures = signatures
            .into_iter()
            .filter_map(|(f, sig)| Some((*remap.get(&f)?, sig)))
            .collect();

        remap
    }

    /// Drops every global not in `keep`, compacting the arena, rebuilding
    /// the constant-expression arena from surviving initializers, and
    /// rewriting all global references. Returns the handle remap.
    ///
    /// The caller must ensure no kept function or kept initializer
    /// references a dropped global.
    pub fn retain_globals(
        &mut self,
        keep: &HashSet<Handle<GlobalVariable>>,
    ) -> HashMap<Handle<GlobalVariable>, Handle<GlobalVariable>> {
        let mut remap = HashMap::new();
        let mut kept = Arena::new();
        for (old, gv) in self.global_variables.iter() {
            if keep.contains(&old) {
                remap.insert(old, kept.append(gv.clone()));
            }
        }
        self.global_variables = kept;

        // Rebuild global_expressions from the surviving initializers so no
        // dead constant expression can dangle.
        let old_exprs = std::mem::take(&mut self.global_expressions);
        for (_, gv) in self.global_variables.iter_mut() {
            if let Some(init) = gv.init {
                gv.init = Some(copy_const_expr(
                    &old_exprs,
                    init,
                    &mut self.global_expressions,
                    &remap,
                ));
            }
        }

        for (_, func) in self.functions.iter_mut() {
            for (_, expr) in func.expressions.iter_mut() {
                if let Expression::GlobalVariable(g) = expr {
                    *g = remap[g];
                }
            }
        }

        for table in [
            &mut self.info.srvs,
            &mut self.info.uavs,
            &mut self.info.cbuffers,
            &mut self.info.samplers,
        ] {
            table.retain(|res| remap.contains_key(&res.global));
            for res in table.iter_mut() {
                res.global = remap[&res.global];
            }
        }

        remap
    }
}

fn remap_calls_in_block(block: &mut Block, remap: &HashMap<Handle<Function>, Handle<Function>>) {
    for stmt in block {
        match stmt {
            Statement::Call { function, .. } => *function = remap[function],
            Statement::If { accept, reject, .. } => {
                remap_calls_in_block(accept, remap);
                remap_calls_in_block(reject, remap);
            }
            Statement::Loop { body, .. } => remap_calls_in_block(body, remap),
            _ => {}
        }
    }
}

fn copy_const_expr(
    src: &Arena<Expression>,
    handle: Handle<Expression>,
    dst: &mut Arena<Expression>,
    globals: &HashMap<Handle<GlobalVariable>, Handle<GlobalVariable>>,
) -> Handle<Expression> {
    let expr = match src[handle].clone() {
        Expression::GlobalVariable(g) => Expression::GlobalVariable(globals[&g]),
        Expression::Load { pointer } => Expression::Load {
            pointer: copy_const_expr(src, pointer, dst, globals),
        },
        Expression::Unary { op, expr } => Expression::Unary {
            op,
            expr: copy_const_expr(src, expr, dst, globals),
        },
        Expression::Binary { op, left, right } => Expression::Binary {
            op,
            left: copy_const_expr(src, left, dst, globals),
            right: copy_const_expr(src, right, dst, globals),
        },
        Expression::AccessIndex { base, index } => Expression::AccessIndex {
            base: copy_const_expr(src, base, dst, globals),
            index,
        },
        Expression::Compose { ty, components } => Expression::Compose {
            ty,
            components: components
                .into_iter()
                .map(|c| copy_const_expr(src, c, dst, globals))
                .collect(),
        },
        other => other,
    };
    dst.append(expr)
}
