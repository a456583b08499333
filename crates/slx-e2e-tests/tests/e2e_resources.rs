mod common;

use common::*;
use slx_ir::ops::{self, OpCode};
use slx_ir::{
    Expression, Function, Literal, Module, ResourceClass, ResourceKind, Scalar, ShaderKind,
    Statement,
};
use slx_linker::{Diagnostic, Linker};

/// Builds a function that loads from texture `tex_name` through the
/// canonical createHandle + bufferLoad sequence and stores the result out.
fn texture_reader(m: &mut Module, func_name: &str, element: Scalar) -> slx_ir::Handle<Function> {
    let tex = add_resource(m, ResourceClass::Srv, ResourceKind::Texture2D, "T", element);
    let load = op_func(m, OpCode::BufferLoad, Some(Scalar::F32));
    let store = op_func(m, OpCode::StoreOutput, Some(Scalar::F32));

    let mut f = Function::new(func_name);
    f.body = Some(Vec::new());
    let handle = push_create_handle(m, &mut f, tex, ResourceClass::Srv);
    let index = f.expressions.append(Expression::Literal(Literal::I32(0)));
    let offset = f.expressions.append(Expression::Literal(Literal::I32(0)));
    let texel = push_op_call(
        &mut f,
        load,
        OpCode::BufferLoad,
        vec![handle, index, offset],
        true,
    )
    .unwrap();
    let sig = f.expressions.append(Expression::Literal(Literal::I32(0)));
    let row = f.expressions.append(Expression::Literal(Literal::I32(0)));
    let col = f.expressions.append(Expression::Literal(Literal::I32(0)));
    push_op_call(
        &mut f,
        store,
        OpCode::StoreOutput,
        vec![sig, row, col, texel],
        false,
    );
    f.body
        .as_mut()
        .unwrap()
        .push(Statement::Return { value: None });
    m.functions.append(f)
}

fn reader_entry_lib(id: &str, element: Scalar) -> Module {
    let mut m = new_lib(id);
    let main = texture_reader(&mut m, "main", element);
    mark_entry(&mut m, main, ShaderKind::Pixel);
    m
}

fn reader_helper_lib(id: &str, element: Scalar) -> Module {
    let mut m = new_lib(id);
    texture_reader(&mut m, "helper", element);
    m
}

fn link_entry_calling_helper(a: Module, b: Module) -> Result<Module, slx_linker::LinkError> {
    let mut a = a;
    // main additionally calls the helper from the other library.
    let helper = a.functions.append(Function::declaration("helper"));
    let main = a.find_function("main").unwrap();
    {
        let f = &mut a.functions[main];
        let body = f.body.as_mut().unwrap();
        body.pop();
        body.push(Statement::Call {
            function: helper,
            arguments: vec![],
            result: None,
        });
        body.push(Statement::Return { value: None });
    }

    let mut linker = Linker::new();
    linker.register_lib("A", Some(a), None).unwrap();
    linker.register_lib("B", Some(b), None).unwrap();
    linker.attach_lib("A").unwrap();
    linker.attach_lib("B").unwrap();
    linker.link("main", "ps_6_0")
}

#[test]
fn same_named_resources_merge_onto_one_global() {
    let module = link_entry_calling_helper(
        reader_entry_lib("A", Scalar::F32),
        reader_helper_lib("B", Scalar::F32),
    )
    .unwrap();

    // Exactly one global named T.
    let t_globals = module
        .global_variables
        .iter()
        .filter(|(_, gv)| gv.name == "T")
        .count();
    assert_eq!(t_globals, 1);
    assert_eq!(module.info.srvs.len(), 1);
    assert_eq!(module.info.srvs[0].id, 0);
    assert_eq!(module.info.srvs[0].name, "T");

    // Every load of T was replaced with the single range-ID constant.
    let t = module.find_global("T").unwrap();
    let main = module.find_function("main").unwrap();
    let func = &module.functions[main];
    let live_loads = func
        .expressions
        .iter()
        .filter(|(_, e)| {
            matches!(e, Expression::Load { pointer }
                if matches!(func.expressions[*pointer], Expression::GlobalVariable(g) if g == t))
        })
        .count();
    assert_eq!(live_loads, 0);

    // Both inlined createHandle sites carry range ID 0.
    let mut range_ids = Vec::new();
    Statement::walk(func.body.as_ref().unwrap(), &mut |stmt| {
        if ops::is_op_call(&module, func, stmt, Some(OpCode::CreateHandle))
            && let Statement::Call { arguments, .. } = stmt
            && let Expression::Literal(lit) = func.expressions[arguments[2]]
        {
            range_ids.push(lit.as_u32().unwrap());
        }
    });
    assert_eq!(range_ids, vec![0, 0]);

    let reflection = module.info.reflection.as_ref().unwrap();
    assert_eq!(reflection.bindings.len(), 1);
    assert_eq!(reflection.bindings[0].class, ResourceClass::Srv);
    assert_eq!(reflection.bindings[0].name, "T");
}

#[test]
fn type_mismatched_resources_refuse_to_merge() {
    let err = link_entry_calling_helper(
        reader_entry_lib("A", Scalar::F32),
        reader_helper_lib("B", Scalar::I32),
    )
    .unwrap_err();

    assert_eq!(
        err.diagnostics(),
        &[Diagnostic::RefineResource {
            class: ResourceClass::Srv,
            name: "T".into(),
        }]
    );
}

#[test]
fn one_library_may_use_a_resource_from_many_functions() {
    let mut m = new_lib("A");
    let tex = add_resource(
        &mut m,
        ResourceClass::Srv,
        ResourceKind::Texture2D,
        "T",
        Scalar::F32,
    );
    let load = op_func(&mut m, OpCode::BufferLoad, Some(Scalar::F32));

    let mut helper = Function::new("helper");
    helper.body = Some(Vec::new());
    let h = push_create_handle(&mut m, &mut helper, tex, ResourceClass::Srv);
    let i = helper.expressions.append(Expression::Literal(Literal::I32(0)));
    let o = helper.expressions.append(Expression::Literal(Literal::I32(0)));
    let f32t = scalar_ty(&mut m, Scalar::F32);
    helper.result = Some(f32t);
    let texel = push_op_call(&mut helper, load, OpCode::BufferLoad, vec![h, i, o], true).unwrap();
    helper
        .body
        .as_mut()
        .unwrap()
        .push(Statement::Return { value: Some(texel) });
    let helper = m.functions.append(helper);

    let store = op_func(&mut m, OpCode::StoreOutput, Some(Scalar::F32));
    let mut main = Function::new("main");
    main.body = Some(Vec::new());
    let hm = push_create_handle(&mut m, &mut main, tex, ResourceClass::Srv);
    let i = main.expressions.append(Expression::Literal(Literal::I32(1)));
    let o = main.expressions.append(Expression::Literal(Literal::I32(0)));
    let own = push_op_call(&mut main, load, OpCode::BufferLoad, vec![hm, i, o], true).unwrap();
    let from_helper = push_call(&mut main, helper, vec![], true).unwrap();
    let sig = main.expressions.append(Expression::Literal(Literal::I32(0)));
    let row = main.expressions.append(Expression::Literal(Literal::I32(0)));
    let col = main.expressions.append(Expression::Literal(Literal::I32(0)));
    push_op_call(
        &mut main,
        store,
        OpCode::StoreOutput,
        vec![sig, row, col, own],
        false,
    );
    let col2 = main.expressions.append(Expression::Literal(Literal::I32(1)));
    push_op_call(
        &mut main,
        store,
        OpCode::StoreOutput,
        vec![sig, row, col2, from_helper],
        false,
    );
    main.body
        .as_mut()
        .unwrap()
        .push(Statement::Return { value: None });
    let main = m.functions.append(main);
    mark_entry(&mut m, main, ShaderKind::Pixel);

    let mut linker = Linker::new();
    linker.register_lib("A", Some(m), None).unwrap();
    linker.attach_lib("A").unwrap();
    let module = linker.link("main", "ps_6_0").unwrap();

    assert_eq!(module.info.srvs.len(), 1);
    assert_eq!(module.info.srvs[0].id, 0);
}

#[test]
fn per_class_ids_are_independent() {
    let mut m = new_lib("A");
    let tex = add_resource(
        &mut m,
        ResourceClass::Srv,
        ResourceKind::Texture2D,
        "Tex",
        Scalar::F32,
    );
    let cb = add_resource(
        &mut m,
        ResourceClass::CBuffer,
        ResourceKind::CBuffer,
        "Constants",
        Scalar::F32,
    );
    let samp = add_resource(
        &mut m,
        ResourceClass::Sampler,
        ResourceKind::Sampler,
        "Samp",
        Scalar::F32,
    );
    let sample = op_func(&mut m, OpCode::Sample, Some(Scalar::F32));
    let cbload = op_func(&mut m, OpCode::CBufferLoad, Some(Scalar::F32));
    let store = op_func(&mut m, OpCode::StoreOutput, Some(Scalar::F32));

    let mut main = Function::new("main");
    main.body = Some(Vec::new());
    let tex_handle = push_create_handle(&mut m, &mut main, tex, ResourceClass::Srv);
    let samp_handle = push_create_handle(&mut m, &mut main, samp, ResourceClass::Sampler);
    let cb_handle = push_create_handle(&mut m, &mut main, cb, ResourceClass::CBuffer);
    let offset = main.expressions.append(Expression::Literal(Literal::I32(0)));
    let scale = push_op_call(
        &mut main,
        cbload,
        OpCode::CBufferLoad,
        vec![cb_handle, offset],
        true,
    )
    .unwrap();
    let coord = main
        .expressions
        .append(Expression::Literal(Literal::F32(0.5)));
    let texel = push_op_call(
        &mut main,
        sample,
        OpCode::Sample,
        vec![tex_handle, samp_handle, coord, coord, scale, coord],
        true,
    )
    .unwrap();
    let sig = main.expressions.append(Expression::Literal(Literal::I32(0)));
    let row = main.expressions.append(Expression::Literal(Literal::I32(0)));
    let col = main.expressions.append(Expression::Literal(Literal::I32(0)));
    push_op_call(
        &mut main,
        store,
        OpCode::StoreOutput,
        vec![sig, row, col, texel],
        false,
    );
    main.body
        .as_mut()
        .unwrap()
        .push(Statement::Return { value: None });
    let main = m.functions.append(main);
    mark_entry(&mut m, main, ShaderKind::Pixel);

    let mut linker = Linker::new();
    linker.register_lib("A", Some(m), None).unwrap();
    linker.attach_lib("A").unwrap();
    let module = linker.link("main", "ps_6_0").unwrap();

    assert_eq!(module.info.srvs.len(), 1);
    assert_eq!(module.info.cbuffers.len(), 1);
    assert_eq!(module.info.samplers.len(), 1);
    assert_eq!(module.info.srvs[0].id, 0);
    assert_eq!(module.info.cbuffers[0].id, 0);
    assert_eq!(module.info.samplers[0].id, 0);

    let reflection = module.info.reflection.as_ref().unwrap();
    assert_eq!(reflection.bindings.len(), 3);
}
