//! Metadata emission.
//!
//! The last prepare step: fold the module's shader metadata into the
//! [`Reflection`] summary consumers read off a linked module.

use slx_ir::{Module, Reflection, ReflectionBinding};

use crate::Pass;

/// Fills [`ShaderInfo::reflection`](slx_ir::ShaderInfo) from the final
/// metadata state.
#[derive(Debug)]
pub struct EmitMetadata;

impl Pass for EmitMetadata {
    fn name(&self) -> &str {
        "emit-metadata"
    }

    fn run(&self, module: &mut Module) -> bool {
        let mut bindings: Vec<ReflectionBinding> = module
            .info
            .all_resources()
            .map(|res| ReflectionBinding {
                class: res.class,
                name: res.name.clone(),
                id: res.id,
                space: res.space,
                lower_bound: res.lower_bound,
            })
            .collect();
        bindings.sort_by(|a, b| (a.class, a.id).cmp(&(b.class, b.id)));

        let reflection = Reflection {
            entry: module.info.entry_name.clone().unwrap_or_default(),
            profile: module
                .info
                .shader_model
                .map(|sm| sm.name.to_string())
                .unwrap_or_default(),
            bindings,
            uses_view_id: module.info.uses_view_id,
        };

        if module.info.reflection.as_ref() == Some(&reflection) {
            return false;
        }
        log::debug!(
            "emitting reflection for entry {:?} with {} bindings",
            reflection.entry,
            reflection.bindings.len()
        );
        module.info.reflection = Some(reflection);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slx_ir::{Handle, Resource, ResourceClass, ResourceKind};

    #[test]
    fn emits_sorted_bindings() {
        let mut module = Module::new("m", "slx");
        module.info.entry_name = Some("main".into());
        module.info.shader_model = slx_ir::ShaderModel::get_by_name("ps_6_0");
        module.info.uavs = vec![Resource {
            class: ResourceClass::Uav,
            kind: ResourceKind::TypedBuffer,
            name: "out".into(),
            global: Handle::from_index(0),
            id: 0,
            space: 0,
            lower_bound: 0,
            range_size: 1,
        }];
        module.info.srvs = vec![Resource {
            class: ResourceClass::Srv,
            kind: ResourceKind::Texture2D,
            name: "tex".into(),
            global: Handle::from_index(1),
            id: 0,
            space: 0,
            lower_bound: 0,
            range_size: 1,
        }];

        assert!(EmitMetadata.run(&mut module));
        let reflection = module.info.reflection.as_ref().unwrap();
        assert_eq!(reflection.entry, "main");
        assert_eq!(reflection.profile, "ps_6_0");
        assert_eq!(reflection.bindings.len(), 2);
        assert_eq!(reflection.bindings[0].class, ResourceClass::Srv);
        assert_eq!(reflection.bindings[1].class, ResourceClass::Uav);

        // Second run is a no-op.
        assert!(!EmitMetadata.run(&mut module));
    }
}
