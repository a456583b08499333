#![no_main]

use libfuzzer_sys::fuzz_target;
use slx_ir::{Function, FunctionProps, Module, ShaderKind, Statement};
use slx_linker::Linker;

/// Builds a tiny library whose exported names are derived from `seed`.
fn library(id: &str, seed: u8) -> Module {
    let mut module = Module::new(id, "slx");
    for i in 0..(seed % 4) {
        let mut f = Function::new(format!("f{}", (seed as u32 + i as u32) % 6));
        f.body = Some(vec![Statement::Return { value: None }]);
        let f = module.functions.append(f);
        module
            .info
            .set_props(f, FunctionProps::for_kind(ShaderKind::Pixel));
    }
    module
}

// Drive register/attach/detach/link with arbitrary operation sequences.
// No sequence may panic, and a failed attach must leave the session usable.
fuzz_target!(|data: &[u8]| {
    let mut linker = Linker::new();
    let mut registered = 0u32;
    for chunk in data.chunks(2) {
        let op = chunk[0] % 5;
        let arg = chunk.get(1).copied().unwrap_or(0);
        match op {
            0 => {
                let name = format!("lib{registered}");
                if linker.register_lib(&name, Some(library(&name, arg)), None).is_ok() {
                    registered += 1;
                }
            }
            1 => {
                let _ = linker.attach_lib(&format!("lib{}", arg as u32 % (registered + 1)));
            }
            2 => {
                let _ = linker.detach_lib(&format!("lib{}", arg as u32 % (registered + 1)));
            }
            3 => {
                let _ = linker.link(&format!("f{}", arg % 6), "ps_6_0");
            }
            _ => linker.detach_all(),
        }
    }
});
