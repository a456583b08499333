//! Module-scope variables and address spaces.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::func::Linkage;
use crate::types::Type;

/// Bitflags for storage buffer access modes.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct StorageAccess(u32);

impl StorageAccess {
    /// No access.
    pub const EMPTY: Self = Self(0);
    /// Read access.
    pub const LOAD: Self = Self(1);
    /// Write access.
    pub const STORE: Self = Self(2);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for StorageAccess {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Memory address space for module-scope variables.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AddressSpace {
    /// Module-private storage (static globals).
    Private,
    /// Group-shared storage.
    Workgroup,
    /// Constant buffer storage (read-only).
    Uniform,
    /// Storage buffer with the given access.
    Storage { access: StorageAccess },
    /// An opaque resource binding slot. Loads of such a global yield the
    /// resource's range ID once resources have been merged and numbered.
    ResourceBinding,
}

/// A module-scope variable.
#[derive(Clone, Debug)]
pub struct GlobalVariable {
    /// Symbol name. Unique within a module.
    pub name: String,
    /// Symbol visibility.
    pub linkage: Linkage,
    /// The type of the stored value.
    pub ty: Handle<Type>,
    /// Where the value lives.
    pub space: AddressSpace,
    /// Writes after initialization are forbidden.
    pub is_constant: bool,
    /// Initializer, into [`Module::global_expressions`](crate::Module::global_expressions).
    pub init: Option<Handle<Expression>>,
    /// Initialized externally (by the runtime), not by `init` or a ctor.
    pub external_init: bool,
}
