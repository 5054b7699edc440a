//! In-place patching: offset shifts, switch shifts, and the remap broadcast

use classpatch::class_nodes::{ClassNode, CodeAttr, MethodNode};
use classpatch::opcode::{ops, SwitchKind};
use classpatch::patch::{self, RemapCpIndex};
use classpatch::pool::{Constant, ConstantTag, CpIndex};
use classpatch::{io, switches, Error};

#[test]
fn test_one_byte_shift_overflows_past_127() {
    let mut code = [ops::NOP, 120];
    let err = patch::shift_offset(&mut code, 1, 1, 20).unwrap_err();
    assert!(matches!(
        err,
        Error::ArithmeticOverflow {
            current: 120,
            delta: 20,
            width: 1
        }
    ));
    // nothing was written
    assert_eq!(code[1], 120);
}

#[test]
fn test_shift_returns_the_cursor_past_the_field() {
    let mut code = [ops::GOTO, 0, 10, ops::NOP];
    assert_eq!(patch::shift_offset(&mut code, 1, 2, -7).unwrap(), 3);
    assert_eq!(io::read_i16(&code, 1).unwrap(), 3);
}

#[test]
fn test_switch_shift_requires_the_expected_form() {
    let mut code = vec![ops::TABLESWITCH, 0, 0, 0];
    code.extend_from_slice(&20i32.to_be_bytes());
    code.extend_from_slice(&0i32.to_be_bytes());
    code.extend_from_slice(&0i32.to_be_bytes());
    code.extend_from_slice(&24i32.to_be_bytes());
    code.resize(28, ops::NOP);
    code[20] = ops::RETURN;
    code[24] = ops::RETURN;

    let err = patch::shift_switch_offsets(&mut code, 0, SwitchKind::Lookup, 2).unwrap_err();
    assert!(matches!(
        err,
        Error::State {
            offset: 0,
            expected: ops::LOOKUPSWITCH,
            found: ops::TABLESWITCH
        }
    ));

    patch::shift_switch_offsets(&mut code, 0, SwitchKind::Table, 2).unwrap();
    let sw = switches::decode_at(&code, 0).unwrap();
    assert_eq!(sw.default_case.offset, 22);
    assert_eq!(sw.cases[0].offset, 26);
    // match bounds stay untouched
    assert_eq!(io::read_i32(&code, 8).unwrap(), 0);
    assert_eq!(io::read_i32(&code, 12).unwrap(), 0);
}

/// A class whose bytecode and handles alias the same pool entries from
/// several places
fn aliased_class() -> (ClassNode, u16, u16) {
    let mut node = ClassNode::default();
    let name = node.pool.add_utf8("work");
    let descriptor = node.pool.add_utf8("()V");
    let target_a = node.pool.add_method_ref("A", "f", "()V");
    let target_b = node.pool.add_field_ref("A", "g", "I");

    let mut code = vec![ops::GETSTATIC];
    code.extend_from_slice(&target_b.to_be_bytes());
    code.push(ops::INVOKESTATIC);
    code.extend_from_slice(&target_a.to_be_bytes());
    code.push(ops::INVOKESTATIC);
    code.extend_from_slice(&target_a.to_be_bytes());
    code.push(ops::RETURN);

    node.methods.push(MethodNode {
        access_flags: 0,
        name: CpIndex::new(name, ConstantTag::Utf8),
        descriptor: CpIndex::new(descriptor, ConstantTag::Utf8),
        code: Some(CodeAttr {
            max_stack: 1,
            max_locals: 0,
            code,
            exception_handlers: vec![],
        }),
    });
    (node, target_a, target_b)
}

#[test]
fn test_swap_exchanges_every_aliased_reference() {
    let (mut node, a, b) = aliased_class();
    node.swap_constants(a, b).unwrap();

    assert!(matches!(node.pool.get(a).unwrap(), Constant::FieldRef(_, _)));
    assert!(matches!(node.pool.get(b).unwrap(), Constant::MethodRef(_, _)));

    let code = &node.methods[0].code.as_ref().unwrap().code;
    // getstatic now names the slot the field ref moved to
    assert_eq!(io::read_u16(code, 1).unwrap(), a);
    // both aliased call sites moved together
    assert_eq!(io::read_u16(code, 4).unwrap(), b);
    assert_eq!(io::read_u16(code, 7).unwrap(), b);
}

#[test]
fn test_swap_scratch_index_is_outside_the_table() {
    let (node, _, _) = aliased_class();
    let scratch = node.pool.scratch_index();
    assert!(node.pool.get(scratch).is_err());
    assert_eq!(scratch, node.pool.len() + 1);
}

#[test]
fn test_remap_to_self_is_byte_identity() {
    let (mut node, a, _) = aliased_class();
    let pool_before = node.pool.to_bytes();
    let code_before = node.methods[0].code.as_ref().unwrap().code.clone();

    node.remap_cp_index(a, a);

    assert_eq!(node.pool.to_bytes(), pool_before);
    assert_eq!(node.methods[0].code.as_ref().unwrap().code, code_before);
}

#[test]
fn test_remap_skips_offsets_that_merely_look_like_indices() {
    // sipush's operand equals the remapped index but is not a cp slot
    let target = 7u16;
    let mut code = vec![ops::SIPUSH];
    code.extend_from_slice(&target.to_be_bytes());
    code.push(ops::LDC_W);
    code.extend_from_slice(&target.to_be_bytes());
    code.push(ops::RETURN);

    patch::remap_cp_indices_in_code(&mut code, 7, 9);
    assert_eq!(io::read_u16(&code, 1).unwrap(), 7);
    assert_eq!(io::read_u16(&code, 4).unwrap(), 9);
}
