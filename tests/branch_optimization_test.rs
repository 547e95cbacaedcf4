//! Branch optimization and edge repointing on whole functions.

use bumpalo::Bump;
use tpde_arm32::arm32::registers::{LR, R0};
use tpde_arm32::arm32::{emit_function, CmpLikeOp, EmitOptions};
use tpde_arm32::{CompilationSession, Condition, MachineFunction, NodeId, Type};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `entry` compares r0 with zero and branches to `then`/`else`, both of
/// which set r0 and jump to `join`.
fn build_diamond<'a>(session: &CompilationSession<'a>) -> (MachineFunction<'a>, [NodeId; 4]) {
    let mut func = MachineFunction::new(session, "diamond");
    let entry = func.make_node("entry");
    let then = func.make_node("then");
    let els = func.make_node("else");
    let join = func.make_node("join");

    let r0 = func.make_reg_variable(Type::I32, R0);
    let lr = func.make_reg_variable(Type::I32, LR);
    let zero = func.try_flex_imm(Type::I32, 0).unwrap();
    let one = func.try_flex_imm(Type::I32, 1).unwrap();
    let two = func.try_flex_imm(Type::I32, 2).unwrap();

    let cmp = func
        .create_cmp_like(CmpLikeOp::Cmp, r0, zero, Condition::Al)
        .unwrap();
    let br = func.create_br_cond(then, els, Condition::Eq).unwrap();
    func.append(entry, cmp).unwrap();
    func.append(entry, br).unwrap();

    let set_one = func.create_mov(r0, one, Condition::Al).unwrap();
    let to_join = func.create_br(join);
    func.append(then, set_one).unwrap();
    func.append(then, to_join).unwrap();

    let set_two = func.create_mov(r0, two, Condition::Al).unwrap();
    let to_join = func.create_br(join);
    func.append(els, set_two).unwrap();
    func.append(els, to_join).unwrap();

    let ret = func.create_ret(lr, None).unwrap();
    func.append(join, ret).unwrap();

    (func, [entry, then, els, join])
}

#[test]
fn test_diamond_before_optimization() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let (func, _) = build_diamond(&session);

    let text = emit_function(&session, &func, &EmitOptions::default()).unwrap();
    assert_eq!(
        text,
        "\
.Ldiamond$entry:
\tcmp\tr0, #0
\tbeq\t.Ldiamond$then
\tb\t.Ldiamond$else
.Ldiamond$then:
\tmov\tr0, #1
\tb\t.Ldiamond$join
.Ldiamond$else:
\tmov\tr0, #2
\tb\t.Ldiamond$join
.Ldiamond$join:
\tbx\tlr
"
    );
    assert_eq!(session.stats().native_insts_emitted, 8);
}

#[test]
fn test_diamond_after_optimization() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let (mut func, _) = build_diamond(&session);

    // entry inverts its condition, else drops its jump into join.
    let changed = func.do_branch_opt();
    assert_eq!(changed, 2);
    session.record_branches_optimized(changed);

    let text = emit_function(&session, &func, &EmitOptions::default()).unwrap();
    assert_eq!(
        text,
        "\
.Ldiamond$entry:
\tcmp\tr0, #0
\tbne\t.Ldiamond$else
.Ldiamond$then:
\tmov\tr0, #1
\tb\t.Ldiamond$join
.Ldiamond$else:
\tmov\tr0, #2
.Ldiamond$join:
\tbx\tlr
"
    );

    // A second run finds nothing left to simplify.
    assert_eq!(func.do_branch_opt(), 0);

    let stats = session.stats();
    assert_eq!(stats.branches_optimized, 2);
    assert_eq!(stats.native_insts_emitted, 6);
}

#[test]
fn test_repoint_edges_through_split_block() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let (mut func, [entry, then, els, join]) = build_diamond(&session);

    // Route both incoming edges of join through a new block.
    let split = func.make_node("join_split");
    let changed = func.repoint_edges(join, split);
    session.record_edges_repointed(changed);
    assert!(changed);
    let to_join = func.create_br(join);
    func.append(split, to_join).unwrap();

    for node in [then, els] {
        let branch = *func.node(node).insts().last().unwrap();
        assert_eq!(
            func.inst(branch).as_branch().unwrap().target_false(),
            Some(split)
        );
    }
    let entry_branch = *func.node(entry).insts().last().unwrap();
    assert!(!func.repoint_branch_edges(entry_branch, join, split).unwrap());

    // Only the edge out of `then` goes back to join directly.
    let then_branch = *func.node(then).insts().last().unwrap();
    assert!(func.repoint_branch_edges(then_branch, split, join).unwrap());
    assert!(!func.repoint_branch_edges(then_branch, split, join).unwrap());

    // Repointing a block nobody targets changes nothing.
    let unused = func.make_node("unused");
    let changed = func.repoint_edges(unused, join);
    session.record_edges_repointed(changed);
    assert!(!changed);

    assert_eq!(session.stats().edges_repointed, 1);
}

#[test]
fn test_labels_inside_a_block() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut func = MachineFunction::new(&session, "spin");
    let entry = func.make_node("entry");
    let r0 = func.make_reg_variable(Type::I32, R0);
    let lr = func.make_reg_variable(Type::I32, LR);
    let zero = func.try_flex_imm(Type::I32, 0).unwrap();

    let retry = func.create_label();
    let done = func.create_label();
    let cmp = func
        .create_cmp_like(CmpLikeOp::Cmp, r0, zero, Condition::Al)
        .unwrap();
    let exit = func.create_br_label(done, Condition::Eq).unwrap();
    let again = func.create_br_label(retry, Condition::Al).unwrap();
    let ret = func.create_ret(lr, None).unwrap();
    for id in [retry, cmp, exit, again, done, ret] {
        func.append(entry, id).unwrap();
    }

    assert_eq!(func.label_name(retry).unwrap(), ".Lspin$local$__0");
    assert_eq!(func.label_name(done).unwrap(), ".Lspin$local$__1");
    // Label branches are never rewritten by the layout pass.
    assert_eq!(func.do_branch_opt(), 0);

    let text = emit_function(&session, &func, &EmitOptions::default()).unwrap();
    assert_eq!(
        text,
        "\
.Lspin$entry:
.Lspin$local$__0:
\tcmp\tr0, #0
\tbeq\t.Lspin$local$__1
\tb\t.Lspin$local$__0
.Lspin$local$__1:
\tbx\tlr
"
    );
}
