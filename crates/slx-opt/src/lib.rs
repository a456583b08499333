//! IR passes for slx.
//!
//! Provides a [`Pass`] trait, a [`PassManager`] with ordered and
//! fixed-point execution, and the post-link prepare pipeline the linker
//! runs over a freshly assembled module: inline, clean up, number
//! resources, finalize metadata.

mod cfg;
mod condense;
mod dce;
mod global_dce;
mod inline;
mod metadata;
mod simplify;
mod viewid;

pub use cfg::SimplifyCfg;
pub use condense::CondenseResources;
pub use dce::DeadCodeElimination;
pub use global_dce::GlobalDce;
pub use inline::InlineAlways;
pub use metadata::EmitMetadata;
pub use simplify::SimplifyInstructions;
pub use viewid::ComputeViewIdState;

use std::fmt::Debug;

use slx_ir::Module;

/// A pass that transforms an IR module.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Run the pass on a module. Returns `true` if anything was modified.
    fn run(&self, module: &mut Module) -> bool;
}

/// Maximum number of fixed-point iterations before giving up.
const MAX_ITERATIONS: usize = 10;

/// Runs passes in sequence.
#[derive(Debug, Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// The pipeline the linker runs on a freshly linked module, in order:
    /// inline always-inline functions, eliminate dead code and dead
    /// globals, simplify instructions and control flow, condense resource
    /// IDs, compute view-ID state, and emit reflection metadata.
    pub fn prepare_pipeline() -> Self {
        let mut pm = Self::new();
        pm.add_pass(Box::new(InlineAlways));
        pm.add_pass(Box::new(DeadCodeElimination));
        pm.add_pass(Box::new(GlobalDce));
        pm.add_pass(Box::new(SimplifyInstructions));
        pm.add_pass(Box::new(SimplifyCfg));
        pm.add_pass(Box::new(CondenseResources));
        pm.add_pass(Box::new(ComputeViewIdState));
        pm.add_pass(Box::new(EmitMetadata));
        pm
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Runs every pass once, in order. Returns `true` if any pass changed
    /// the module.
    pub fn run_once(&self, module: &mut Module) -> bool {
        let mut changed = false;
        for pass in &self.passes {
            let pass_changed = pass.run(module);
            log::debug!("pass {}: changed={}", pass.name(), pass_changed);
            changed |= pass_changed;
        }
        changed
    }

    /// Runs all passes until a fixed point is reached or the iteration
    /// limit.
    pub fn run(&self, module: &mut Module) {
        for _ in 0..MAX_ITERATIONS {
            if !self.run_once(module) {
                break;
            }
        }
    }
}
