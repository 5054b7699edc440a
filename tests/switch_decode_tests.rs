//! Decoding and convergence analysis of the multi-way-branch forms

use classpatch::opcode::{ops, SwitchKind};
use classpatch::switches::{self, padding_after};

/// Assemble a packed-range switch at `at` preceded by nops: low=0 high=2,
/// default and three case arms given as relative offsets
fn assemble_packed(at: usize, default: i32, case_offsets: [i32; 3], total: usize) -> Vec<u8> {
    let mut code = vec![ops::NOP; at];
    code.push(ops::TABLESWITCH);
    code.extend(std::iter::repeat(0).take(padding_after(at)));
    code.extend_from_slice(&default.to_be_bytes());
    code.extend_from_slice(&0i32.to_be_bytes());
    code.extend_from_slice(&2i32.to_be_bytes());
    for offset in case_offsets {
        code.extend_from_slice(&offset.to_be_bytes());
    }
    assert!(code.len() <= total);
    code.resize(total, ops::NOP);
    code
}

#[test]
fn test_packed_range_round_trip_at_unaligned_offset() {
    // switch at 1: padding 2, encoded length 1 + 2 + 12 + 12
    let at = 1;
    let mut code = assemble_packed(at, 30, [32, 34, 36], 40);
    for target in [31, 33, 35, 37] {
        code[target] = ops::RETURN;
    }

    let sw = switches::decode_at(&code, at).unwrap();
    assert_eq!(sw.kind, SwitchKind::Table);
    assert_eq!(sw.at, at);
    assert_eq!(sw.default_case.target, 31);
    assert_eq!(sw.cases.len(), 3);
    for (case, (value, target)) in sw.cases.iter().zip([(0, 33), (1, 35), (2, 37)]) {
        assert_eq!(case.match_value, Some(value));
        assert_eq!(case.target, target);
    }

    let consumed = switches::consumed_len_at(&code, at).unwrap();
    assert_eq!(consumed, padding_after(at) + 12 + 12);
    assert_eq!(sw.encoded_len(), 1 + consumed);
}

#[test]
fn test_sparse_pairs_preserve_unordered_match_values() {
    let at = 0;
    let mut code = vec![ops::LOOKUPSWITCH, 0, 0, 0];
    code.extend_from_slice(&28i32.to_be_bytes());
    code.extend_from_slice(&2i32.to_be_bytes());
    code.extend_from_slice(&99i32.to_be_bytes());
    code.extend_from_slice(&30i32.to_be_bytes());
    code.extend_from_slice(&(-5i32).to_be_bytes());
    code.extend_from_slice(&32i32.to_be_bytes());
    code.resize(34, ops::NOP);
    for target in [28, 30, 32] {
        code[target] = ops::RETURN;
    }

    let sw = switches::decode_at(&code, at).unwrap();
    assert_eq!(sw.kind, SwitchKind::Lookup);
    assert_eq!(sw.cases[0].match_value, Some(99));
    assert_eq!(sw.cases[0].target, 30);
    assert_eq!(sw.cases[1].match_value, Some(-5));
    assert_eq!(sw.cases[1].target, 32);
    assert_eq!(
        switches::consumed_len_at(&code, at).unwrap(),
        padding_after(at) + 8 + 16
    );
}

#[test]
fn test_arms_converging_on_a_shared_tail() {
    // every arm is a straight nop run into the single return at the end
    let code = {
        let mut code = assemble_packed(1, 30, [32, 34, 36], 40);
        code[39] = ops::RETURN;
        code
    };
    let sw = switches::decode_at(&code, 1).unwrap();
    assert_eq!(sw.convergence(), Some(39));
    assert_eq!(sw.max_flow_offset(), Some(39));
}

#[test]
fn test_case_flow_leaving_the_buffer_prevents_convergence() {
    // the default arm returns; case arms run off the end without a terminal
    let mut code = assemble_packed(1, 30, [32, 34, 36], 40);
    code[31] = ops::RETURN;
    let sw = switches::decode_at(&code, 1).unwrap();
    for case in &sw.cases {
        assert!(case.flow.is_empty());
    }
    assert_eq!(sw.convergence(), None);
}

#[test]
fn test_goto_tails_produce_explicit_end_targets() {
    // arms: iconst then goto to the shared return; probing past each arm
    // target finds the unconditional jump and records its destination
    let at = 3; // aligned: no padding
    let mut code = vec![ops::NOP; at];
    code.push(ops::TABLESWITCH);
    code.extend_from_slice(&25i32.to_be_bytes());
    code.extend_from_slice(&0i32.to_be_bytes());
    code.extend_from_slice(&0i32.to_be_bytes());
    code.extend_from_slice(&29i32.to_be_bytes());
    code.resize(45, ops::NOP);
    // default arm at 28: iconst_0; goto +15 -> 44
    code[28] = ops::ICONST_0;
    code[29] = ops::GOTO;
    code[30..32].copy_from_slice(&15i16.to_be_bytes());
    // case arm at 32: iconst_1; goto +11 -> 44
    code[32] = ops::ICONST_1;
    code[33] = ops::GOTO;
    code[34..36].copy_from_slice(&11i16.to_be_bytes());
    code[44] = ops::RETURN;

    let sw = switches::decode_at(&code, at).unwrap();
    assert_eq!(sw.default_case.target, 28);
    assert_eq!(sw.default_case.end_target, Some(44));
    assert_eq!(sw.cases[0].target, 32);
    assert_eq!(sw.cases[0].end_target, Some(44));
    assert_eq!(sw.convergence(), Some(44));
}
