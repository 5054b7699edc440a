//! Catalog-level behavior across the whole opcode value space

use classpatch::opcode::{self, ops, Categories, OpcodeTable, Patch, PopCount};

#[test]
fn test_every_opcode_value_has_a_deterministic_record() {
    for value in 0u16..=255 {
        let op = value as u8;
        let info = opcode::lookup(op);
        assert_eq!(info.opcode, op);
        assert!(std::ptr::eq(info, opcode::lookup(op)));
        if !info.is_defined() {
            assert_eq!(info.operand_count, -1);
            assert!(info.categories.is_empty());
            assert_eq!(info.patch, Patch::None);
        }
    }
}

#[test]
fn test_category_queries_cover_expected_instruction_families() {
    let table = OpcodeTable::global();

    let jumps: Vec<u8> = table
        .opcodes_with(Categories::JUMP)
        .map(|i| i.opcode)
        .collect();
    assert!(jumps.contains(&ops::GOTO));
    assert!(jumps.contains(&ops::IFEQ));
    assert!(jumps.contains(&ops::JSR_W));
    assert!(!jumps.contains(&ops::TABLESWITCH));

    for info in table.opcodes_with(Categories::CONDITION) {
        assert!(info.has(Categories::JUMP), "{}", info.mnemonic);
    }
    for info in table.opcodes_with(Categories::ARRAY_LOAD) {
        assert_eq!(info.pop, PopCount::Fixed(2), "{}", info.mnemonic);
        assert_eq!(info.push, 1, "{}", info.mnemonic);
    }
    for info in table.opcodes_with(Categories::ARRAY_STORE) {
        assert_eq!(info.pop, PopCount::Fixed(3), "{}", info.mnemonic);
    }
}

#[test]
fn test_constant_index_operand_widths() {
    assert_eq!(
        opcode::lookup(ops::LDC).patch,
        Patch::CpIndex { at: 1, width: 1 }
    );
    assert_eq!(
        opcode::lookup(ops::LDC_W).patch,
        Patch::CpIndex { at: 1, width: 2 }
    );
    assert_eq!(
        opcode::lookup(ops::LDC2_W).patch,
        Patch::CpIndex { at: 1, width: 2 }
    );
    assert_eq!(
        opcode::lookup(ops::GETFIELD).patch,
        Patch::CpIndex { at: 1, width: 2 }
    );
}

#[test]
fn test_calls_have_unpredictable_pop_counts() {
    for op in [
        ops::INVOKEVIRTUAL,
        ops::INVOKESPECIAL,
        ops::INVOKESTATIC,
        ops::INVOKEINTERFACE,
        ops::INVOKEDYNAMIC,
    ] {
        let info = opcode::lookup(op);
        assert_eq!(info.pop, PopCount::Unpredictable, "{}", info.mnemonic);
        assert_eq!(info.pop.fixed(), None);
    }
}

#[test]
fn test_jump_destination_resolution() {
    // forward 2-byte
    let code = [ops::GOTO, 0, 4, 0, ops::RETURN];
    assert_eq!(
        opcode::lookup(ops::GOTO).jump_destination(&code, 0).unwrap(),
        4
    );

    // backward 2-byte, sign extended
    let code = [ops::RETURN, 0, 0, ops::GOTO, 0xff, 0xfd];
    assert_eq!(
        opcode::lookup(ops::GOTO).jump_destination(&code, 3).unwrap(),
        0
    );

    // 4-byte wide form
    let mut code = vec![0u8; 12];
    code[2] = ops::GOTO_W;
    code[3..7].copy_from_slice(&7i32.to_be_bytes());
    assert_eq!(
        opcode::lookup(ops::GOTO_W)
            .jump_destination(&code, 2)
            .unwrap(),
        9
    );
}

#[test]
fn test_out_of_buffer_destinations_fail() {
    let code = [ops::GOTO, 0, 9];
    assert!(matches!(
        opcode::lookup(ops::GOTO).jump_destination(&code, 0),
        Err(classpatch::Error::Format { .. })
    ));
    let code = [ops::GOTO, 0xff, 0x00];
    assert!(matches!(
        opcode::lookup(ops::GOTO).jump_destination(&code, 0),
        Err(classpatch::Error::Format { .. })
    ));
}
