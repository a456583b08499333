//! Cross-module cloning.
//!
//! Handles are arena-relative, so copying an entity between modules means
//! rewriting every reference it carries through a [`ValueMap`]. The map is
//! filled in two waves: callers pre-map the entities whose identity matters
//! (function shells, globals), then [`clone_function_into`] copies bodies,
//! resolving everything else as it goes. One map serves one source module.

use std::collections::HashMap;

use crate::arena::{Arena, Handle, UniqueArena};
use crate::expr::Expression;
use crate::func::{Function, FunctionParam, LocalVariable};
use crate::global::GlobalVariable;
use crate::module::Module;
use crate::stmt::{Block, Statement};
use crate::types::{Type, TypeInner};

/// Source-to-destination handle mappings for one source module.
#[derive(Debug, Default)]
pub struct ValueMap {
    /// Function mappings, pre-seeded by the caller.
    pub functions: HashMap<Handle<Function>, Handle<Function>>,
    /// Global mappings, pre-seeded or filled by [`clone_global_into`].
    pub globals: HashMap<Handle<GlobalVariable>, Handle<GlobalVariable>>,
    /// Type mappings, filled lazily.
    pub types: HashMap<Handle<Type>, Handle<Type>>,
}

impl ValueMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Maps a type handle from `src_types` into `dst_types`, structurally
/// re-inserting it (and any types it references) on first use.
pub fn map_type(
    map: &mut ValueMap,
    dst_types: &mut UniqueArena<Type>,
    src_types: &UniqueArena<Type>,
    handle: Handle<Type>,
) -> Handle<Type> {
    if let Some(&mapped) = map.types.get(&handle) {
        return mapped;
    }
    let ty = src_types[handle].clone();
    let inner = match ty.inner {
        TypeInner::Pointer { base, space } => TypeInner::Pointer {
            base: map_type(map, dst_types, src_types, base),
            space,
        },
        TypeInner::Array { base, size } => TypeInner::Array {
            base: map_type(map, dst_types, src_types, base),
            size,
        },
        TypeInner::Struct { members } => TypeInner::Struct {
            members: members
                .into_iter()
                .map(|mut m| {
                    m.ty = map_type(map, dst_types, src_types, m.ty);
                    m
                })
                .collect(),
        },
        other => other,
    };
    let mapped = dst_types.insert(Type {
        name: ty.name,
        inner,
    });
    map.types.insert(handle, mapped);
    mapped
}

/// Builds a declaration in `dst`'s type universe matching `src_fn`'s
/// signature, linkage, and attributes. The caller appends it.
pub fn declare_matching_function(
    map: &mut ValueMap,
    dst: &mut Module,
    src: &Module,
    src_fn: Handle<Function>,
) -> Function {
    let f = &src.functions[src_fn];
    let mut decl = Function::declaration(f.name.clone());
    decl.linkage = f.linkage;
    decl.attributes = f.attributes;
    decl.params = f
        .params
        .iter()
        .map(|p| FunctionParam {
            name: p.name.clone(),
            ty: map_type(map, &mut dst.types, &src.types, p.ty),
        })
        .collect();
    decl.result = f
        .result
        .map(|ty| map_type(map, &mut dst.types, &src.types, ty));
    decl
}

/// Clones the global `src_gv` (and, recursively, any global its initializer
/// references) into `dst`, memoizing through `map`.
pub fn clone_global_into(
    map: &mut ValueMap,
    dst: &mut Module,
    src: &Module,
    src_gv: Handle<GlobalVariable>,
) -> Handle<GlobalVariable> {
    if let Some(&mapped) = map.globals.get(&src_gv) {
        return mapped;
    }
    let gv = &src.global_variables[src_gv];
    let ty = map_type(map, &mut dst.types, &src.types, gv.ty);
    let new_gv = dst.global_variables.append(GlobalVariable {
        name: gv.name.clone(),
        linkage: gv.linkage,
        ty,
        space: gv.space,
        is_constant: gv.is_constant,
        init: None,
        external_init: gv.external_init,
    });
    // Map before cloning the initializer so self-references terminate.
    map.globals.insert(src_gv, new_gv);
    if let Some(init) = gv.init {
        let init = clone_const_expr(map, dst, src, init);
        dst.global_variables[new_gv].init = Some(init);
    }
    new_gv
}

/// Clones a constant expression tree from `src.global_expressions` into
/// `dst.global_expressions`, cloning referenced globals as needed.
pub fn clone_const_expr(
    map: &mut ValueMap,
    dst: &mut Module,
    src: &Module,
    handle: Handle<Expression>,
) -> Handle<Expression> {
    let expr = match src.global_expressions[handle].clone() {
        Expression::GlobalVariable(g) => {
            Expression::GlobalVariable(clone_global_into(map, dst, src, g))
        }
        Expression::ZeroValue(ty) => {
            Expression::ZeroValue(map_type(map, &mut dst.types, &src.types, ty))
        }
        Expression::Load { pointer } => Expression::Load {
            pointer: clone_const_expr(map, dst, src, pointer),
        },
        Expression::Unary { op, expr } => Expression::Unary {
            op,
            expr: clone_const_expr(map, dst, src, expr),
        },
        Expression::Binary { op, left, right } => Expression::Binary {
            op,
            left: clone_const_expr(map, dst, src, left),
            right: clone_const_expr(map, dst, src, right),
        },
        Expression::AccessIndex { base, index } => Expression::AccessIndex {
            base: clone_const_expr(map, dst, src, base),
            index,
        },
        Expression::Compose { ty, components } => Expression::Compose {
            ty: map_type(map, &mut dst.types, &src.types, ty),
            components: components
                .into_iter()
                .map(|c| clone_const_expr(map, dst, src, c))
                .collect(),
        },
        other => other,
    };
    dst.global_expressions.append(expr)
}

/// Populates the body of `dst_fn` (an empty shell in `dst`) from `src_fn`,
/// rewriting every reference through `map`.
///
/// Every function and global `src_fn` references must already be mapped;
/// an unmapped reference is a caller bug and panics. Parameters are
/// positional, so they need no mapping.
pub fn clone_function_into(
    map: &mut ValueMap,
    dst: &mut Module,
    src: &Module,
    src_fn: Handle<Function>,
    dst_fn: Handle<Function>,
) {
    // Wave 1: map every type the body mentions, while `dst.types` is free.
    let mut local_tys = Vec::new();
    {
        let f = &src.functions[src_fn];
        for (_, local) in f.local_variables.iter() {
            local_tys.push(map_type(map, &mut dst.types, &src.types, local.ty));
        }
        let expr_tys: Vec<_> = f
            .expressions
            .iter()
            .filter_map(|(_, e)| match *e {
                Expression::ZeroValue(ty) | Expression::Compose { ty, .. } => Some(ty),
                _ => None,
            })
            .collect();
        for ty in expr_tys {
            map_type(map, &mut dst.types, &src.types, ty);
        }
    }

    // Wave 2: rebuild locals, expressions, and body against the new arenas.
    let f = &src.functions[src_fn];
    let mut locals = Arena::new();
    let mut local_map = Vec::with_capacity(f.local_variables.len());
    for ((_, local), ty) in f.local_variables.iter().zip(local_tys) {
        local_map.push(locals.append(LocalVariable {
            name: local.name.clone(),
            ty,
            init: local.init,
        }));
    }

    let mut exprs = Arena::new();
    let mut expr_map = Vec::with_capacity(f.expressions.len());
    for (_, expr) in f.expressions.iter() {
        let rewritten = rewrite_expr(expr, map, &expr_map, &local_map);
        expr_map.push(exprs.append(rewritten));
    }

    for (_, local) in locals.iter_mut() {
        if let Some(init) = local.init {
            local.init = Some(expr_map[init.index()]);
        }
    }

    let body = f
        .body
        .as_ref()
        .map(|block| rewrite_block(block, map, &expr_map));

    let out = &mut dst.functions[dst_fn];
    out.local_variables = locals;
    out.expressions = exprs;
    out.body = body;
}

fn mapped_expr(expr_map: &[Handle<Expression>], h: Handle<Expression>) -> Handle<Expression> {
    expr_map[h.index()]
}

fn rewrite_expr(
    expr: &Expression,
    map: &ValueMap,
    expr_map: &[Handle<Expression>],
    local_map: &[Handle<LocalVariable>],
) -> Expression {
    match *expr {
        Expression::Literal(lit) => Expression::Literal(lit),
        Expression::ZeroValue(ty) => Expression::ZeroValue(map.types[&ty]),
        Expression::FunctionArgument(i) => Expression::FunctionArgument(i),
        Expression::GlobalVariable(g) => Expression::GlobalVariable(
            *map.globals
                .get(&g)
                .unwrap_or_else(|| panic!("unmapped global referenced during clone")),
        ),
        Expression::LocalVariable(l) => Expression::LocalVariable(local_map[l.index()]),
        Expression::Load { pointer } => Expression::Load {
            pointer: mapped_expr(expr_map, pointer),
        },
        Expression::Unary { op, expr } => Expression::Unary {
            op,
            expr: mapped_expr(expr_map, expr),
        },
        Expression::Binary { op, left, right } => Expression::Binary {
            op,
            left: mapped_expr(expr_map, left),
            right: mapped_expr(expr_map, right),
        },
        Expression::Select {
            condition,
            accept,
            reject,
        } => Expression::Select {
            condition: mapped_expr(expr_map, condition),
            accept: mapped_expr(expr_map, accept),
            reject: mapped_expr(expr_map, reject),
        },
        Expression::AccessIndex { base, index } => Expression::AccessIndex {
            base: mapped_expr(expr_map, base),
            index,
        },
        Expression::Compose {
            ty,
            ref components,
        } => Expression::Compose {
            ty: map.types[&ty],
            components: components.iter().map(|&c| mapped_expr(expr_map, c)).collect(),
        },
        Expression::CallResult(f) => Expression::CallResult(
            *map.functions
                .get(&f)
                .unwrap_or_else(|| panic!("unmapped function referenced during clone")),
        ),
    }
}

fn rewrite_block(block: &Block, map: &ValueMap, expr_map: &[Handle<Expression>]) -> Block {
    block
        .iter()
        .map(|stmt| match stmt {
            Statement::Store { pointer, value } => Statement::Store {
                pointer: mapped_expr(expr_map, *pointer),
                value: mapped_expr(expr_map, *value),
            },
            Statement::Call {
                function,
                arguments,
                result,
            } => Statement::Call {
                function: *map
                    .functions
                    .get(function)
                    .unwrap_or_else(|| panic!("unmapped callee during clone")),
                arguments: arguments.iter().map(|&a| mapped_expr(expr_map, a)).collect(),
                result: result.map(|r| mapped_expr(expr_map, r)),
            },
            Statement::If {
                condition,
                accept,
                reject,
            } => Statement::If {
                condition: mapped_expr(expr_map, *condition),
                accept: rewrite_block(accept, map, expr_map),
                reject: rewrite_block(reject, map, expr_map),
            },
            Statement::Loop { body, break_if } => Statement::Loop {
                body: rewrite_block(body, map, expr_map),
                break_if: break_if.map(|b| mapped_expr(expr_map, b)),
            },
            Statement::Break => Statement::Break,
            Statement::Continue => Statement::Continue,
            Statement::Return { value } => Statement::Return {
                value: value.map(|v| mapped_expr(expr_map, v)),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Literal;
    use crate::func::Linkage;
    use crate::global::AddressSpace;
    use crate::types::Scalar;

    fn scalar_ty(module: &mut Module, scalar: Scalar) -> Handle<Type> {
        module.types.insert(Type::unnamed(TypeInner::Scalar(scalar)))
    }

    #[test]
    fn map_type_is_structural() {
        let mut src = Module::new("src", "slx");
        let mut dst = Module::new("dst", "slx");
        let f32_src = scalar_ty(&mut src, Scalar::F32);
        let f32_dst = scalar_ty(&mut dst, Scalar::F32);

        let mut map = ValueMap::new();
        let mapped = map_type(&mut map, &mut dst.types, &src.types, f32_src);
        assert_eq!(mapped, f32_dst);
        // Memoized on second use.
        assert_eq!(map_type(&mut map, &mut dst.types, &src.types, f32_src), f32_dst);
    }

    #[test]
    fn clone_global_carries_initializer() {
        let mut src = Module::new("src", "slx");
        let ty = scalar_ty(&mut src, Scalar::F32);
        let init = src
            .global_expressions
            .append(Expression::Literal(Literal::F32(4.0)));
        let g = src.global_variables.append(GlobalVariable {
            name: "g".into(),
            linkage: Linkage::Internal,
            ty,
            space: AddressSpace::Private,
            is_constant: true,
            init: Some(init),
            external_init: false,
        });

        let mut dst = Module::new("dst", "slx");
        let mut map = ValueMap::new();
        let new_g = clone_global_into(&mut map, &mut dst, &src, g);
        let init = dst.global_variables[new_g].init.unwrap();
        match dst.global_expressions[init] {
            Expression::Literal(Literal::F32(v)) => assert_eq!(v, 4.0),
            ref other => panic!("expected literal, got {other:?}"),
        }
    }

    #[test]
    fn clone_function_rewrites_references() {
        let mut src = Module::new("src", "slx");
        let ty = scalar_ty(&mut src, Scalar::F32);
        let g = src.global_variables.append(GlobalVariable {
            name: "g".into(),
            linkage: Linkage::External,
            ty,
            space: AddressSpace::Private,
            is_constant: false,
            init: None,
            external_init: false,
        });
        let callee = src.functions.append(Function::declaration("helper"));
        let mut f = Function::new("main");
        let ptr = f.expressions.append(Expression::GlobalVariable(g));
        let loaded = f.expressions.append(Expression::Load { pointer: ptr });
        f.body = Some(vec![
            Statement::Call {
                function: callee,
                arguments: vec![loaded],
                result: None,
            },
            Statement::Return { value: None },
        ]);
        let f = src.functions.append(f);

        let mut dst = Module::new("dst", "slx");
        let mut map = ValueMap::new();
        let new_g = clone_global_into(&mut map, &mut dst, &src, g);
        let new_callee_decl = declare_matching_function(&mut map, &mut dst, &src, callee);
        let new_callee = dst.functions.append(new_callee_decl);
        map.functions.insert(callee, new_callee);
        let shell = declare_matching_function(&mut map, &mut dst, &src, f);
        let new_f = dst.functions.append(shell);
        map.functions.insert(f, new_f);

        clone_function_into(&mut map, &mut dst, &src, f, new_f);

        let cloned = &dst.functions[new_f];
        let body = cloned.body.as_ref().unwrap();
        match &body[0] {
            Statement::Call { function, .. } => assert_eq!(*function, new_callee),
            other => panic!("expected call, got {other:?}"),
        }
        let global_refs: Vec<_> = cloned
            .expressions
            .iter()
            .filter_map(|(_, e)| match e {
                Expression::GlobalVariable(g) => Some(*g),
                _ => None,
            })
            .collect();
        assert_eq!(global_refs, vec![new_g]);
    }
}
