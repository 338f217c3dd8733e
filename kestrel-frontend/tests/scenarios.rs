//! End-to-end scenarios driving construction, the optimizers and the
//! inliner through the public API.

use kestrel_frontend::{GraphBuilder, GraphBuilderContext, Variable};
use kestrel_ir::entity::EntityRef;
use kestrel_ir::ir::modes;
use kestrel_ir::ir::node::{SwitchEntry, SwitchTable, SymConstKind};
use kestrel_ir::ir::opcode::{pn, Opcode};
use kestrel_ir::ir::types::{CompoundKind, TypeStore};
use kestrel_ir::ir::{Graph, GraphRef, Node, Program, Tarval, TypeRef};
use kestrel_ir::settings::Flags;
use kestrel_ir::{inline_functions, inline_method, optimize_cf, verify_graph};

fn plain_graph() -> Graph {
    let mut store = TypeStore::new();
    let frame = store.new_compound(CompoundKind::Struct, "frame");
    Graph::new(Flags::default(), frame)
}

#[test]
fn constant_folding_add_through_builder() {
    let mut graph = plain_graph();
    let mut ctx = GraphBuilderContext::new();
    {
        let mut builder = GraphBuilder::new(&mut graph, &mut ctx);
        let block = builder.current_block();
        let c3 = builder.graph.new_const(Tarval::new_int(modes::IS32, 3));
        let c4 = builder.graph.new_const(Tarval::new_int(modes::IS32, 4));
        let sum = builder.graph.new_add(block, c3, c4, modes::IS32);
        // CSE pointer identity with a freshly built Const 7.
        let c7 = builder.graph.new_const(Tarval::new_int(modes::IS32, 7));
        assert_eq!(sum, c7);
        builder.ret(&[sum]);
        builder.finalize();
    }
    let types = TypeStore::new();
    verify_graph(&graph, &types).unwrap();
}

#[test]
fn cse_identical_loads() {
    let mut graph = plain_graph();
    let mut ctx = GraphBuilderContext::new();
    {
        let mut builder = GraphBuilder::new(&mut graph, &mut ctx);
        let block = builder.current_block();
        let mem = builder.get_store();
        let ptr = builder.graph.frame();
        let l1 = builder.graph.new_load(block, mem, ptr, modes::IS32);
        let l2 = builder.graph.new_load(block, mem, ptr, modes::IS32);
        assert_eq!(l1, l2);
        let value = builder.graph.new_proj(l1, modes::IS32, pn::load::RES);
        let mem_after = builder.graph.new_proj(l1, modes::M, pn::load::M);
        builder.set_store(mem_after);
        builder.ret(&[value]);
        builder.finalize();
    }
}

#[test]
fn diamond_phi_in_predecessor_order() {
    let mut graph = plain_graph();
    let mut ctx = GraphBuilderContext::new();
    {
        let mut builder = GraphBuilder::new(&mut graph, &mut ctx);
        let x = Variable::new(0);
        builder.declare_var(x, modes::IS32);

        let block0 = builder.current_block();
        let mem = builder.get_store();
        let ptr = builder.graph.frame();
        let load = builder.graph.new_load(block0, mem, ptr, modes::B);
        let sel = builder.graph.new_proj(load, modes::B, pn::load::RES);

        let b_true = builder.create_block();
        let b_false = builder.create_block();
        let b_join = builder.create_block();
        builder.cond_jump(sel, b_true, b_false);
        builder.mature_block(b_true);
        builder.mature_block(b_false);

        builder.switch_to_block(b_true);
        let c1 = builder.graph.new_const(Tarval::new_int(modes::IS32, 1));
        builder.set_value(x, c1);
        builder.jump(b_join);

        builder.switch_to_block(b_false);
        let c2 = builder.graph.new_const(Tarval::new_int(modes::IS32, 2));
        builder.set_value(x, c2);
        builder.jump(b_join);

        builder.mature_block(b_join);
        builder.switch_to_block(b_join);
        let merged = builder.get_value(x);
        assert_eq!(builder.graph.opcode(merged), Opcode::Phi);
        assert_eq!(builder.graph.arity(merged), 2);
        assert_eq!(builder.graph.get_in(merged, 0), c1);
        assert_eq!(builder.graph.get_in(merged, 1), c2);
        builder.ret(&[merged]);
        builder.finalize();
    }
    let types = TypeStore::new();
    verify_graph(&graph, &types).unwrap();
}

#[test]
fn empty_block_elimination_and_idempotence() {
    let mut graph = plain_graph();
    let mut ctx = GraphBuilderContext::new();
    let b1;
    {
        let mut builder = GraphBuilder::new(&mut graph, &mut ctx);
        b1 = builder.create_block();
        let b2 = builder.create_block();
        builder.jump(b1);
        builder.mature_block(b1);
        builder.switch_to_block(b1);
        builder.jump(b2);
        builder.mature_block(b2);
        builder.switch_to_block(b2);
        builder.ret(&[]);
        builder.finalize();
    }

    assert!(optimize_cf(&mut graph));
    // No live node sits in the removed block.
    for n in graph.nodes() {
        if graph.opcode(n) == Opcode::Id {
            continue;
        }
        assert_ne!(graph.block(n), Some(b1));
    }
    // Running again finds nothing left to do.
    assert!(!optimize_cf(&mut graph));

    let types = TypeStore::new();
    verify_graph(&graph, &types).unwrap();
}

#[test]
fn switch_with_only_default_proj() {
    let mut graph = plain_graph();
    let mut ctx = GraphBuilderContext::new();
    let switch;
    let target;
    {
        let mut builder = GraphBuilder::new(&mut graph, &mut ctx);
        let block0 = builder.current_block();
        let mem = builder.get_store();
        let ptr = builder.graph.frame();
        let load = builder.graph.new_load(block0, mem, ptr, modes::IS32);
        let sel = builder.graph.new_proj(load, modes::IS32, pn::load::RES);
        let table = SwitchTable {
            entries: vec![SwitchEntry {
                min: Tarval::new_int(modes::IS32, 1),
                max: Tarval::new_int(modes::IS32, 3),
                pn: 1,
            }],
            n_outs: 2,
        };
        switch = builder.graph.new_switch(block0, sel, table);
        let proj = builder
            .graph
            .new_proj(switch, modes::X, pn::switch::DEFAULT);
        target = builder.create_block();
        builder.add_pred(target, proj);
        builder.mature_block(target);
        builder.switch_to_block(target);
        builder.ret(&[]);
        builder.finalize();
    }

    assert!(optimize_cf(&mut graph));
    let pred = graph.get_in(target, 0);
    assert_eq!(graph.opcode(pred), Opcode::Jmp);
    assert!(graph.users(graph.skip_id(switch)).is_empty());
}

// ----------------------------------------------------------------------
// Inlining scenarios

/// Build `get_a(obj) { return obj->a; }` and return the graph reference
/// together with the field entity.
fn build_leaf_accessor(program: &mut Program) -> (GraphRef, TypeRef) {
    let i32t = program.types.new_primitive(modes::IS32);
    let s = program.types.new_compound(CompoundKind::Struct, "S");
    let field_a = program.types.new_entity(s, "a", i32t);
    program.types.default_layout_compound_type(s);
    let ptr_s = program.types.new_pointer(s);
    let ty = program.types.new_method(vec![ptr_s], vec![i32t]);
    let graph_ref = program.new_graph("get_a", ty);

    let g = &mut program.graphs[graph_ref];
    let block = g.new_block(&[g.initial_exec()]);
    let args = g.args();
    let obj = g.new_proj(args, modes::P, 0);
    let field = g.new_sel(block, obj, &[], field_a);
    let mem = g.initial_mem();
    let load = g.new_load(block, mem, field, modes::IS32);
    let mem_after = g.new_proj(load, modes::M, pn::load::M);
    let value = g.new_proj(load, modes::IS32, pn::load::RES);
    let ret = g.new_return(block, mem_after, &[value]);
    let end_block = g.end_block();
    g.add_block_pred(end_block, ret);
    g.mature_block(end_block);
    g.phase = kestrel_ir::ir::graph::Phase::High;
    (graph_ref, ty)
}

fn build_caller(program: &mut Program, callee: GraphRef, callee_ty: TypeRef) -> (GraphRef, Node) {
    let i32t = program.types.new_primitive(modes::IS32);
    let main_ty = program.types.new_method(vec![], vec![i32t]);
    let caller = program.new_graph("main", main_ty);
    let callee_ent = program.graph_entity(callee).unwrap();
    let n_params = program.types.n_params(callee_ty);

    let g = &mut program.graphs[caller];
    let block = g.new_block(&[g.initial_exec()]);
    let addr = g.new_symconst(SymConstKind::Address(callee_ent), modes::P);
    let obj = g.frame();
    let mem = g.initial_mem();
    let args: Vec<Node> = if n_params == 1 { vec![obj] } else { vec![] };
    let call = g.new_call(block, mem, addr, &args, callee_ty);
    let call_mem = g.new_proj(call, modes::M, pn::call::M);
    let results = g.new_proj(call, modes::T, pn::call::T_RESULT);
    let res0 = g.new_proj(results, modes::IS32, 0);
    let ret = g.new_return(block, call_mem, &[res0]);
    let end_block = g.end_block();
    g.add_block_pred(end_block, ret);
    g.mature_block(end_block);
    g.phase = kestrel_ir::ir::graph::Phase::High;
    (caller, call)
}

#[test]
fn inline_leaf_accessor() {
    let mut program = Program::new("test");
    let (callee, callee_ty) = build_leaf_accessor(&mut program);
    let (caller, call) = build_caller(&mut program, callee, callee_ty);

    inline_method(&mut program, caller, call, callee).unwrap();

    let g = &program.graphs[caller];
    let end_block = g.end_block();
    let ret = g.get_in(end_block, 0);
    assert_eq!(g.opcode(ret), Opcode::Return);

    // The result projection of the original call now reaches the Load's
    // value directly.
    let result = g.get_in(ret, 1);
    assert_eq!(g.opcode(result), Opcode::Proj);
    let load = g.get_in(result, 0);
    assert_eq!(g.opcode(load), Opcode::Load);

    // The memory chain includes the Load's memory.
    let mem = g.get_in(ret, 0);
    assert_eq!(g.opcode(mem), Opcode::Proj);
    assert_eq!(g.get_in(mem, 0), load);

    // The Load reads the field off the caller's pointer argument.
    let sel = g.get_in(load, 1);
    assert_eq!(g.opcode(sel), Opcode::Sel);
    assert_eq!(g.get_in(sel, 0), g.frame());

    verify_graph(g, &program.types).unwrap();
}

#[test]
fn inline_copies_frame_entities() {
    let mut program = Program::new("test");
    // A callee with an addressed local in its frame.
    let i32t = program.types.new_primitive(modes::IS32);
    let res_ty = modes_i32_ref(&mut program);
    let ty = program.types.new_method(vec![], vec![res_ty]);
    let callee = program.new_graph("local_user", ty);
    let local = {
        let frame_ty = program.graphs[callee].frame_type;
        program.types.new_entity(frame_ty, "tmp", i32t)
    };
    {
        let g = &mut program.graphs[callee];
        let block = g.new_block(&[g.initial_exec()]);
        let frame = g.frame();
        let slot = g.new_sel(block, frame, &[], local);
        let ret = {
            let mem = g.initial_mem();
            g.new_return(block, mem, &[slot])
        };
        let end_block = g.end_block();
        g.add_block_pred(end_block, ret);
        g.mature_block(end_block);
        g.phase = kestrel_ir::ir::graph::Phase::High;
    }

    let (caller, call) = {
        let main_ty = program.types.new_method(vec![], vec![]);
        let caller = program.new_graph("main", main_ty);
        let callee_ent = program.graph_entity(callee).unwrap();
        let g = &mut program.graphs[caller];
        let block = g.new_block(&[g.initial_exec()]);
        let addr = g.new_symconst(SymConstKind::Address(callee_ent), modes::P);
        let mem = g.initial_mem();
        let call = g.new_call(block, mem, addr, &[], ty);
        let call_mem = g.new_proj(call, modes::M, pn::call::M);
        let ret = g.new_return(block, call_mem, &[]);
        let end_block = g.end_block();
        g.add_block_pred(end_block, ret);
        g.mature_block(end_block);
        g.phase = kestrel_ir::ir::graph::Phase::High;
        (caller, call)
    };

    let caller_frame = program.graphs[caller].frame_type;
    let members_before = program.types.members(caller_frame).len();
    inline_method(&mut program, caller, call, callee).unwrap();

    // The callee's local was copied into the caller's frame, and the
    // copied Sel selects the copy.
    let members = program.types.members(caller_frame);
    assert_eq!(members.len(), members_before + 1);
    let copied = *members.last().unwrap();
    assert_ne!(copied, local);
    assert_eq!(program.types.entity(copied).owner, caller_frame);

    let g = &program.graphs[caller];
    let found = g.nodes().any(|n| {
        g.opcode(n) == Opcode::Sel
            && match *g.attr(n) {
                kestrel_ir::ir::NodeAttr::Sel(e) => e == copied,
                _ => false,
            }
    });
    assert!(found, "no Sel of the copied frame entity");
}

fn modes_i32_ref(program: &mut Program) -> TypeRef {
    let i32t = program.types.new_primitive(modes::IS32);
    program.types.new_pointer(i32t)
}

#[test]
fn global_inliner_folds_constant_callee() {
    let mut program = Program::new("test");
    let i32t = program.types.new_primitive(modes::IS32);
    let answer_ty = program.types.new_method(vec![], vec![i32t]);
    let answer = program.new_graph("answer", answer_ty);
    {
        let g = &mut program.graphs[answer];
        let block = g.new_block(&[g.initial_exec()]);
        let c42 = g.new_const(Tarval::new_int(modes::IS32, 42));
        let mem = g.initial_mem();
        let ret = g.new_return(block, mem, &[c42]);
        let end_block = g.end_block();
        g.add_block_pred(end_block, ret);
        g.mature_block(end_block);
        g.phase = kestrel_ir::ir::graph::Phase::High;
    }
    let (caller, _call) = build_caller(&mut program, answer, answer_ty);

    let inlined = inline_functions(&mut program, 10_000, i32::min_value() + 1);
    assert_eq!(inlined, 1);

    // After inlining, the caller returns the constant.
    let g = &program.graphs[caller];
    let end_block = g.end_block();
    let ret = g.get_in(end_block, 0);
    let result = g.get_in(ret, 1);
    assert_eq!(g.opcode(result), Opcode::Const);
    assert_eq!(g.const_value(result).as_i64(), 42);

    // No Call is left in the caller.
    assert!(!g.nodes().any(|n| g.opcode(n) == Opcode::Call));
}

#[test]
fn rejected_inline_leaves_graph_untouched() {
    let mut program = Program::new("test");
    let (callee, callee_ty) = build_leaf_accessor(&mut program);
    let (caller, call) = build_caller(&mut program, callee, callee_ty);

    program.graphs[callee]
        .properties
        .insert(kestrel_ir::ir::GraphProperties::NOINLINE);

    let before = program.graphs[caller].n_nodes();
    let result = inline_method(&mut program, caller, call, callee);
    assert!(result.is_err());
    assert_eq!(program.graphs[caller].n_nodes(), before);
}
