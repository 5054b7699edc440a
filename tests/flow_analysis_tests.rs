//! End-to-end flow tracing over hand-assembled code buffers

use classpatch::flow::{self, normalize_offset};
use classpatch::opcode::ops;
use classpatch::scanner;

fn split_path(offsets: &[i32]) -> (Vec<i32>, Vec<i32>) {
    let (branches, terminals): (Vec<i32>, Vec<i32>) =
        offsets.iter().copied().partition(|&o| o < 0);
    (
        branches.iter().map(|&o| normalize_offset(o)).collect(),
        terminals,
    )
}

#[test]
fn test_two_instruction_cycle_terminates_with_two_branches() {
    // 0: goto +3 -> 3: goto -3 -> back to 0
    let code = [ops::GOTO, 0, 3, ops::GOTO, 0xff, 0xfd];
    let path = flow::trace_from(&code, 0).unwrap();
    let (branches, terminals) = split_path(path.offsets());
    assert_eq!(branches, vec![0, 3]);
    assert!(terminals.is_empty());
}

#[test]
fn test_conditional_yields_one_branch_and_two_terminals() {
    // 0: ifeq +9 -> 9, 3: return, 9: ireturn
    let mut code = vec![ops::IFEQ, 0, 9, ops::RETURN];
    code.resize(9, ops::NOP);
    code.push(ops::IRETURN);
    let path = flow::trace_from(&code, 0).unwrap();
    let (branches, mut terminals) = split_path(path.offsets());
    assert_eq!(branches, vec![0]);
    terminals.sort_unstable();
    assert_eq!(terminals, vec![3, 9]);
}

#[test]
fn test_nested_conditionals_cover_every_leg() {
    // 0: ifeq +6 -> 6: ifne +5 -> 11: return
    // fall-throughs: 3: return, 9: return
    let mut code = vec![ops::IFEQ, 0, 6, ops::RETURN, ops::NOP, ops::NOP];
    code.extend_from_slice(&[ops::IFNE, 0, 5, ops::RETURN, ops::NOP, ops::RETURN]);
    let path = flow::trace_from(&code, 0).unwrap();
    let (branches, mut terminals) = split_path(path.offsets());
    assert_eq!(branches, vec![0, 6]);
    terminals.sort_unstable();
    assert_eq!(terminals, vec![3, 9, 11]);
}

#[test]
fn test_throw_is_a_terminal() {
    let code = [ops::ACONST_NULL, ops::ATHROW];
    let path = flow::trace_from(&code, 0).unwrap();
    assert_eq!(path.offsets(), &[1]);
}

#[test]
fn test_max_offset_complements_branch_entries() {
    let code = [ops::GOTO, 0, 5, ops::NOP, ops::NOP, ops::RETURN];
    let path = flow::trace_from(&code, 0).unwrap();
    assert_eq!(path.max_offset(), Some(5));
}

#[test]
fn test_straight_return_run_detection() {
    let code = [ops::ILOAD_0, ops::ICONST_1, ops::IADD, ops::IRETURN];
    assert!(scanner::is_straight_return_run(&code, 0).unwrap());

    let code = [ops::ILOAD_0, ops::IFEQ, 0, 3, ops::IRETURN];
    assert!(!scanner::is_straight_return_run(&code, 0).unwrap());
}

#[test]
fn test_instruction_starts_skip_operand_bytes() {
    let code = [
        ops::SIPUSH, 1, 1,
        ops::WIDE, ops::IINC, 0, 2, 0, 1,
        ops::RETURN,
    ];
    let starts = scanner::mark_instruction_starts(&code).unwrap();
    let marked: Vec<usize> = starts.iter().collect();
    assert_eq!(marked, vec![0, 3, 9]);
}
