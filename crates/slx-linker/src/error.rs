//! Link errors and diagnostics.

use slx_ir::{ResourceClass, ShaderKind};

/// A categorized link diagnostic. One failing operation can emit several.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    /// The reachability walk needed a name no attached library defines.
    #[error("Cannot find definition of function {0}")]
    UndefFunction(String),
    /// Two attached libraries define the same exported name.
    #[error("Definition already exists for function {0}")]
    RedefineFunction(String),
    /// Two libraries define same-named, non-resource globals.
    #[error("Definition already exists for global variable {0}")]
    RedefineGlobal(String),
    /// The profile cannot be linked: unknown, or the entry is declared as
    /// a library/invalid shader.
    #[error("{0} is invalid profile to link")]
    InvalidProfile(String),
    /// The profile's stage differs from the entry's declared stage.
    #[error(
        "Profile mismatch between entry function and target profile: {profile} and {entry_kind}"
    )]
    ShaderKindMismatch {
        /// The requested profile name.
        profile: String,
        /// The stage the entry was authored for.
        entry_kind: ShaderKind,
    },
    /// The entry has no recorded shader properties.
    #[error("Cannot find function property for entry function {0}")]
    NoEntryProps(String),
    /// Same-named resources with incompatible IR types.
    #[error("Resource already exists as {class} for {name}")]
    RefineResource {
        /// Class of the already-merged resource.
        class: ResourceClass,
        /// The shared global name.
        name: String,
    },
    /// An intrinsic was requested with a disallowed overload slot.
    #[error(transparent)]
    OverloadIllegal(#[from] slx_ir::ops::OpError),
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a linker operation failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// No library is registered under the name.
    #[error("no library registered as {0}")]
    UnknownLib(String),
    /// `register_lib` with a name already taken.
    #[error("a library is already registered as {0}")]
    AlreadyRegistered(String),
    /// `register_lib` without a module.
    #[error("no module provided for library {0}")]
    MissingModule(String),
    /// `attach_lib` on a library that is already attached.
    #[error("library {0} is already attached")]
    AlreadyAttached(String),
    /// `detach_lib` on a library that is not attached.
    #[error("library {0} is not attached")]
    NotAttached(String),
    /// The operation emitted link diagnostics.
    #[error("{}", join_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
}

impl From<Diagnostic> for LinkError {
    fn from(diag: Diagnostic) -> Self {
        Self::Diagnostics(vec![diag])
    }
}

impl LinkError {
    /// The diagnostics carried by this error, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Diagnostics(diags) => diags,
            _ => &[],
        }
    }
}
