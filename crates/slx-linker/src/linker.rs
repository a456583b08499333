//! The link session: registered libraries, the attached set, and the
//! global function name table.

use fxhash::{FxHashMap, FxHashSet};
use slx_ir::{Module, ops};

use crate::error::{Diagnostic, LinkError};
use crate::job::LinkJob;
use crate::library::Library;

/// A shader-library link session.
///
/// Libraries are registered under names, a subset is attached, and
/// [`link`](Self::link) produces a self-contained executable module from
/// an entry function and a target profile.
///
/// ```
/// # use slx_linker::Linker;
/// # fn build_library() -> slx_ir::Module { slx_ir::Module::new("demo", "slx") }
/// let mut linker = Linker::new();
/// linker.register_lib("demo", Some(build_library()), None)?;
/// linker.attach_lib("demo")?;
/// # let _ = linker.link("main", "ps_6_0");
/// # Ok::<(), slx_linker::LinkError>(())
/// ```
#[derive(Debug, Default)]
pub struct Linker {
    /// Registered libraries; slots are stable for a session's lifetime.
    libs: Vec<Library>,
    /// Registered name to slot.
    lib_index: FxHashMap<String, usize>,
    /// Slots currently participating in linking.
    attached: FxHashSet<usize>,
    /// Function name to defining attached library slot. The sole
    /// mechanism for resolving call-graph edges across libraries.
    symbols: FxHashMap<String, usize>,
}

impl Linker {
    /// Creates a session with no libraries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a library under `name`, ingesting `debug_module` when
    /// both modules are given. The chosen module's identifier becomes
    /// `name`.
    pub fn register_lib(
        &mut self,
        name: &str,
        module: Option<Module>,
        debug_module: Option<Module>,
    ) -> Result<(), LinkError> {
        if self.lib_index.contains_key(name) {
            return Err(LinkError::AlreadyRegistered(name.to_string()));
        }
        let mut module = debug_module
            .or(module)
            .ok_or_else(|| LinkError::MissingModule(name.to_string()))?;
        module.name = name.to_string();

        let lib = Library::new(module);
        log::debug!(
            "registered library {name} defining {} functions",
            lib.function_table().len()
        );
        let slot = self.libs.len();
        self.libs.push(lib);
        self.lib_index.insert(name.to_string(), slot);
        Ok(())
    }

    /// Whether a library is registered under `name`.
    pub fn has_lib_registered(&self, name: &str) -> bool {
        self.lib_index.contains_key(name)
    }

    /// The registered library named `name`, if any.
    pub fn library(&self, name: &str) -> Option<&Library> {
        self.lib_index.get(name).map(|&slot| &self.libs[slot])
    }

    /// Attaches a registered library, publishing its defined functions
    /// into the name table.
    ///
    /// Collects every redefinition before failing; on failure the name
    /// table is exactly what it was before the call.
    pub fn attach_lib(&mut self, name: &str) -> Result<(), LinkError> {
        let Some(&slot) = self.lib_index.get(name) else {
            return Err(LinkError::UnknownLib(name.to_string()));
        };
        if self.attached.contains(&slot) {
            return Err(LinkError::AlreadyAttached(name.to_string()));
        }

        let mut conflicts = Vec::new();
        for func_name in self.libs[slot].function_table().keys() {
            if self.symbols.contains_key(func_name) {
                conflicts.push(Diagnostic::RedefineFunction(func_name.clone()));
                continue;
            }
            self.symbols.insert(func_name.clone(), slot);
        }

        if conflicts.is_empty() {
            self.attached.insert(slot);
            Ok(())
        } else {
            // Roll back everything this call published. The library was
            // not attached before, so every entry at this slot is ours.
            self.symbols.retain(|_, &mut s| s != slot);
            Err(LinkError::Diagnostics(conflicts))
        }
    }

    /// Detaches an attached library, withdrawing its functions from the
    /// name table.
    pub fn detach_lib(&mut self, name: &str) -> Result<(), LinkError> {
        let Some(&slot) = self.lib_index.get(name) else {
            return Err(LinkError::UnknownLib(name.to_string()));
        };
        if !self.attached.remove(&slot) {
            return Err(LinkError::NotAttached(name.to_string()));
        }
        for func_name in self.libs[slot].function_table().keys() {
            self.symbols.remove(func_name);
        }
        Ok(())
    }

    /// Detaches every attached library.
    pub fn detach_all(&mut self) {
        self.symbols.clear();
        self.attached.clear();
    }

    /// Links everything transitively reachable from `entry` into a fresh
    /// executable module for `profile`.
    pub fn link(&self, entry: &str, profile: &str) -> Result<Module, LinkError> {
        log::debug!("linking entry {entry} for profile {profile}");

        let mut job = LinkJob::new();
        let mut added: FxHashSet<String> = FxHashSet::default();
        let mut worklist = vec![entry.to_string()];

        while let Some(name) = worklist.pop() {
            if added.contains(&name) {
                continue;
            }
            let Some(&slot) = self.symbols.get(&name) else {
                return Err(Diagnostic::UndefFunction(name).into());
            };
            let lib = &self.libs[slot];
            let Some(info) = lib.link_info(&name) else {
                return Err(Diagnostic::UndefFunction(name).into());
            };
            job.add_function(slot, info);

            for &callee in &info.used_functions {
                if ops::is_op_func(lib.module(), callee) {
                    // Intrinsics are shared by name, never walked into.
                    job.add_op_function(slot, lib.module(), callee);
                } else {
                    worklist.push(lib.module().functions[callee].name.clone());
                }
            }
            added.insert(name);
        }

        let Some(&entry_slot) = self.symbols.get(entry) else {
            return Err(Diagnostic::UndefFunction(entry.to_string()).into());
        };
        let Some(entry_info) = self.libs[entry_slot].link_info(entry) else {
            return Err(Diagnostic::UndefFunction(entry.to_string()).into());
        };
        job.link(&self.libs, entry_slot, entry_info, entry, profile)
    }
}
