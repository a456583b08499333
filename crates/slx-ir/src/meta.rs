//! Shader metadata carried alongside a module: per-function shader
//! properties, entry signatures, and the resource tables.

use std::collections::HashMap;
use std::fmt;

use crate::arena::Handle;
use crate::func::Function;
use crate::global::GlobalVariable;
use crate::shader::{ShaderKind, ShaderModel};
use crate::types::Scalar;

/// Hull-shader specific properties.
#[derive(Clone, Copy, Debug)]
pub struct HullProps {
    /// The companion function computing patch constants. Required for every
    /// hull entry and implicitly co-linked with it.
    pub patch_constant: Handle<Function>,
    /// Control points consumed per patch.
    pub input_control_points: u32,
    /// Control points produced per patch.
    pub output_control_points: u32,
}

/// Shader properties recorded for a function that can serve as an entry.
#[derive(Clone, Copy, Debug)]
pub struct FunctionProps {
    /// The stage this function was authored for.
    pub kind: ShaderKind,
    /// Workgroup dimensions, for compute entries.
    pub workgroup_size: Option<[u32; 3]>,
    /// Hull-shader properties, for hull entries.
    pub hull: Option<HullProps>,
}

impl FunctionProps {
    /// Properties for a plain entry of the given kind.
    pub fn for_kind(kind: ShaderKind) -> Self {
        Self {
            kind,
            workgroup_size: None,
            hull: None,
        }
    }
}

/// One element of an entry signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureElement {
    /// Semantic name, e.g. `SV_Position`.
    pub semantic: String,
    /// Component scalar type.
    pub scalar: Scalar,
    /// Number of rows occupied.
    pub rows: u8,
    /// Number of components per row.
    pub cols: u8,
}

/// The input/output signature of a shader entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntrySignature {
    pub input: Vec<SignatureElement>,
    pub output: Vec<SignatureElement>,
}

/// The class of a shader resource.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ResourceClass {
    /// Shader resource view (read-only texture or buffer).
    Srv,
    /// Unordered access view (read-write texture or buffer).
    Uav,
    /// Constant buffer.
    CBuffer,
    /// Sampler state.
    Sampler,
}

impl ResourceClass {
    /// Human-readable class name, as used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Srv => "SRV",
            Self::Uav => "UAV",
            Self::CBuffer => "CBuffer",
            Self::Sampler => "Sampler",
        }
    }

    /// The class encoding used in `createHandle` call arguments.
    pub fn index(self) -> u32 {
        match self {
            Self::Srv => 0,
            Self::Uav => 1,
            Self::CBuffer => 2,
            Self::Sampler => 3,
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::Srv),
            1 => Some(Self::Uav),
            2 => Some(Self::CBuffer),
            3 => Some(Self::Sampler),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The dimensional kind of a resource.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ResourceKind {
    Texture1D,
    Texture2D,
    Texture3D,
    TypedBuffer,
    RawBuffer,
    StructuredBuffer,
    CBuffer,
    Sampler,
}

/// A texture, buffer, constant buffer, or sampler declared at module scope.
#[derive(Clone, Debug)]
pub struct Resource {
    /// Resource class.
    pub class: ResourceClass,
    /// Dimensional kind.
    pub kind: ResourceKind,
    /// The authored global name.
    pub name: String,
    /// The module-scope variable standing for this resource. Loads of it
    /// are rewritten to the resource's range ID after merging.
    pub global: Handle<GlobalVariable>,
    /// Per-class ID, assigned by [`ShaderInfo::add_resource`].
    pub id: u32,
    /// Register space.
    pub space: u32,
    /// First register of the bound range.
    pub lower_bound: u32,
    /// Number of registers bound.
    pub range_size: u32,
}

/// One binding row of the post-link reflection summary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReflectionBinding {
    pub class: ResourceClass,
    pub name: String,
    pub id: u32,
    pub space: u32,
    pub lower_bound: u32,
}

/// Post-link reflection metadata, filled by the metadata-emit pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reflection {
    /// Name of the linked entry function.
    pub entry: String,
    /// Profile name the module was linked for.
    pub profile: String,
    /// All resource bindings, ordered by class then ID.
    pub bindings: Vec<ReflectionBinding>,
    /// Whether the entry reads the view ID.
    pub uses_view_id: bool,
}

/// Shader metadata for one module.
///
/// A freshly built module has empty metadata; the linker populates it while
/// assembling the output module, and the prepare pipeline finalizes it.
#[derive(Clone, Debug, Default)]
pub struct ShaderInfo {
    /// The targeted shader model, once known.
    pub shader_model: Option<&'static ShaderModel>,
    /// The designated entry function.
    pub entry: Option<Handle<Function>>,
    /// Name of the designated entry function.
    pub entry_name: Option<String>,
    /// Shader properties per entry-capable function.
    pub func_props: HashMap<Handle<Function>, FunctionProps>,
    /// Input/output signatures per entry-capable function.
    pub signatures: HashMap<Handle<Function>, EntrySignature>,
    /// Shader resource views.
    pub srvs: Vec<Resource>,
    /// Unordered access views.
    pub uavs: Vec<Resource>,
    /// Constant buffers.
    pub cbuffers: Vec<Resource>,
    /// Samplers.
    pub samplers: Vec<Resource>,
    /// Set by the view-ID pass when the entry reads the view ID.
    pub uses_view_id: bool,
    /// Reflection summary, present after the metadata-emit pass.
    pub reflection: Option<Reflection>,
}

impl ShaderInfo {
    /// Shader properties for `func`, if any were recorded.
    pub fn props(&self, func: Handle<Function>) -> Option<&FunctionProps> {
        self.func_props.get(&func)
    }

    /// Records shader properties for `func`.
    pub fn set_props(&mut self, func: Handle<Function>, props: FunctionProps) {
        self.func_props.insert(func, props);
    }

    /// The signature of the designated entry, if both are recorded.
    pub fn entry_signature(&self) -> Option<&EntrySignature> {
        self.signatures.get(&self.entry?)
    }

    /// The resource table for `class`.
    pub fn resources(&self, class: ResourceClass) -> &[Resource] {
        match class {
            ResourceClass::Srv => &self.srvs,
            ResourceClass::Uav => &self.uavs,
            ResourceClass::CBuffer => &self.cbuffers,
            ResourceClass::Sampler => &self.samplers,
        }
    }

    /// Adds `res` to the table of its class, assigning and returning the
    /// next per-class ID.
    pub fn add_resource(&mut self, mut res: Resource) -> u32 {
        let table = match res.class {
            ResourceClass::Srv => &mut self.srvs,
            ResourceClass::Uav => &mut self.uavs,
            ResourceClass::CBuffer => &mut self.cbuffers,
            ResourceClass::Sampler => &mut self.samplers,
        };
        let id = u32::try_from(table.len())
            .unwrap_or_else(|_| panic!("resource table overflow in {}", res.class));
        res.id = id;
        table.push(res);
        id
    }

    /// Iterates every resource across all classes.
    pub fn all_resources(&self) -> impl Iterator<Item = &Resource> {
        self.srvs
            .iter()
            .chain(&self.uavs)
            .chain(&self.cbuffers)
            .chain(&self.samplers)
    }

    /// Mutable iteration over every resource across all classes.
    pub fn all_resources_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.srvs
            .iter_mut()
            .chain(self.uavs.iter_mut())
            .chain(self.cbuffers.iter_mut())
            .chain(self.samplers.iter_mut())
    }
}
