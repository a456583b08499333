//! Human-readable module dumps for debugging and tests.

use std::fmt::Write;

use crate::func::Linkage;
use crate::module::Module;
use crate::types::{Type, TypeInner};

/// Renders `ty` as a short type string.
pub fn format_type(module: &Module, ty: &Type) -> String {
    if let Some(name) = &ty.name {
        return name.clone();
    }
    match &ty.inner {
        TypeInner::Void => "void".into(),
        TypeInner::Scalar(s) => format!("{:?}{}", s.kind, u32::from(s.width) * 8),
        TypeInner::Vector { size, scalar } => format!(
            "vec{}<{:?}{}>",
            *size as u32,
            scalar.kind,
            u32::from(scalar.width) * 8
        ),
        TypeInner::ResourceHandle => "handle".into(),
        TypeInner::Pointer { base, .. } => {
            format!("ptr<{}>", format_type(module, &module.types[*base]))
        }
        TypeInner::Array { base, .. } => {
            format!("array<{}>", format_type(module, &module.types[*base]))
        }
        TypeInner::Struct { members } => format!("struct({} members)", members.len()),
    }
}

/// Renders a summary of `module`: globals, resources, then functions with
/// their linkage, attributes, and declaration status.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "module {} [{}]", module.name, module.target);

    for (_, gv) in module.global_variables.iter() {
        let linkage = match gv.linkage {
            Linkage::External => "external",
            Linkage::Internal => "internal",
        };
        let _ = writeln!(
            out,
            "  global {} : {} ({linkage})",
            gv.name,
            format_type(module, &module.types[gv.ty]),
        );
    }

    for res in module.info.all_resources() {
        let _ = writeln!(
            out,
            "  resource {} {} id={} space={} bound={}",
            res.class, res.name, res.id, res.space, res.lower_bound,
        );
    }

    for (_, func) in module.functions.iter() {
        let kind = if func.is_declaration() {
            "declare"
        } else {
            "define"
        };
        let inline = if func.attributes.contains(crate::FnAttrs::ALWAYS_INLINE) {
            " alwaysinline"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  {kind} {}({} params){inline}",
            func.name,
            func.params.len()
        );
    }

    if let Some(entry) = &module.info.entry_name {
        let _ = writeln!(out, "  entry = {entry}");
    }
    out
}
