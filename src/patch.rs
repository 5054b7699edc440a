//! In-place bytecode patching: offset shifting and constant-index rewriting
//!
//! Offset shifts are checked against the full signed range of the stored
//! field width, in both directions, before anything is written. Constant
//! index remapping by contrast is total: it rewrites what it can identify
//! and silently leaves anything else alone, so a remap broadcast over a
//! whole class never fails halfway through.

use crate::error::{Error, Result};
use crate::io;
use crate::opcode::{self, Patch, SwitchKind};
use crate::scanner;
use crate::switches;

/// Add `delta` to the signed big-endian field of `width` bytes at
/// `location`, failing without writing when the sum leaves the field's
/// signed range. Returns the cursor past the field.
pub fn shift_offset(code: &mut [u8], location: usize, width: u8, delta: i32) -> Result<usize> {
    let current = match width {
        1 => io::read_i8(code, location)? as i64,
        2 => io::read_i16(code, location)? as i64,
        _ => io::read_i32(code, location)? as i64,
    };
    let shifted = current + delta as i64;
    let (min, max) = match width {
        1 => (i8::MIN as i64, i8::MAX as i64),
        2 => (i16::MIN as i64, i16::MAX as i64),
        _ => (i32::MIN as i64, i32::MAX as i64),
    };
    if shifted < min || shifted > max {
        return Err(Error::ArithmeticOverflow {
            current,
            delta: delta as i64,
            width,
        });
    }
    match width {
        1 => io::write_i8(code, location, shifted as i8)?,
        2 => io::write_i16(code, location, shifted as i16)?,
        _ => io::write_i32(code, location, shifted as i32)?,
    }
    Ok(location + width as usize)
}

/// Shift the relative jump offset of the branch instruction at `at` by
/// `delta`, finding the field through the catalog's patch metadata.
///
/// The instruction must carry a plain offset operand; switches have their
/// own entry point below because their offsets live in a data-dependent
/// layout.
pub fn shift_jump_offset(code: &mut [u8], at: usize, delta: i32) -> Result<()> {
    let opcode = *code
        .get(at)
        .ok_or_else(|| Error::format(at, "instruction offset past end of code"))?;
    let info = opcode::lookup(opcode);
    match info.patch {
        Patch::Offset { at: rel_at, width } => {
            shift_offset(code, at + rel_at as usize, width, delta)?;
            Ok(())
        }
        _ => Err(Error::format(
            at,
            format!("{} carries no shiftable jump offset", info.mnemonic),
        )),
    }
}

/// Shift the default offset and every case offset of the switch at `at`
/// by `delta`.
///
/// The opcode byte is checked against the expected form first; finding a
/// different byte is a state error, since it means the caller's picture of
/// the buffer no longer matches the buffer. Only the geometry (padding,
/// bounds, pair count) is re-derived from the encoded bytes; the arm
/// bodies are never inspected, so a mid-edit buffer whose arm code is
/// temporarily malformed or whose targets are temporarily out of range
/// still shifts cleanly.
pub fn shift_switch_offsets(
    code: &mut [u8],
    at: usize,
    kind: SwitchKind,
    delta: i32,
) -> Result<()> {
    let found = *code
        .get(at)
        .ok_or_else(|| Error::format(at, "switch opcode offset past end of code"))?;
    if found != kind.opcode() {
        return Err(Error::State {
            offset: at,
            expected: kind.opcode(),
            found,
        });
    }
    for pos in switches::offset_field_positions(code, at)? {
        shift_offset(code, pos, 4, delta)?;
    }
    Ok(())
}

/// Anything that holds constant-table indices and can rewrite them.
///
/// Implementations replace every stored index equal to `from` with `to`
/// and never fail; indices that do not match are left untouched. Container
/// nodes forward the call to every child.
pub trait RemapCpIndex {
    fn remap_cp_index(&mut self, from: u16, to: u16);
}

impl<T: RemapCpIndex> RemapCpIndex for Vec<T> {
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        for item in self.iter_mut() {
            item.remap_cp_index(from, to);
        }
    }
}

impl<T: RemapCpIndex> RemapCpIndex for Option<T> {
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        if let Some(item) = self.as_mut() {
            item.remap_cp_index(from, to);
        }
    }
}

/// Exchange every reference to constant-table indices `a` and `b` inside
/// `target`, using `temp` as a scratch index that must not collide with
/// any live index (one past the table length works).
pub fn swap_cp_indices<T: RemapCpIndex + ?Sized>(target: &mut T, a: u16, b: u16, temp: u16) {
    target.remap_cp_index(a, temp);
    target.remap_cp_index(b, a);
    target.remap_cp_index(temp, b);
}

/// Rewrite constant-table index operands embedded in raw bytecode.
///
/// Walks the buffer instruction by instruction; a narrow index field that
/// cannot hold `to` is left as it was, and a malformed tail ends the walk,
/// so this never fails.
pub fn remap_cp_indices_in_code(code: &mut [u8], from: u16, to: u16) {
    let mut at = 0;
    while at < code.len() {
        let next = match scanner::step(code, at) {
            Ok(next) => next,
            Err(Error::NotImplemented { .. }) => match switches::consumed_len_at(code, at) {
                Ok(len) => at + 1 + len,
                Err(_) => return,
            },
            Err(_) => return,
        };
        if let Patch::CpIndex { at: rel_at, width } = opcode::lookup(code[at]).patch {
            let pos = at + rel_at as usize;
            match width {
                1 => {
                    if code[pos] as u16 == from && to <= u8::MAX as u16 {
                        code[pos] = to as u8;
                    }
                }
                _ => {
                    if let Ok(current) = io::read_u16(code, pos) {
                        if current == from {
                            let _ = io::write_u16(code, pos, to);
                        }
                    }
                }
            }
        }
        at = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::ops;

    #[test]
    fn test_shift_offset_two_byte_field() {
        let mut code = [ops::GOTO, 0, 5, ops::NOP, ops::NOP, ops::RETURN];
        assert_eq!(shift_offset(&mut code, 1, 2, -2).unwrap(), 3);
        assert_eq!(io::read_i16(&code, 1).unwrap(), 3);
        shift_jump_offset(&mut code, 0, 2).unwrap();
        assert_eq!(io::read_i16(&code, 1).unwrap(), 5);
    }

    #[test]
    fn test_shift_offset_overflow_is_detected_and_leaves_code_intact() {
        // 1-byte field holding 120, shifting by 20 would need 140
        let mut code = [0u8, 120];
        let err = shift_offset(&mut code, 1, 1, 20).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::ArithmeticOverflow {
                current: 120,
                delta: 20,
                width: 1
            }
        ));
        assert_eq!(code[1], 120);

        // negative direction overflows too
        let mut code = [0u8, 0x80]; // -128
        assert!(shift_offset(&mut code, 1, 1, -1).is_err());
    }

    #[test]
    fn test_shift_jump_offset_rejects_non_jump_instruction() {
        let mut code = [ops::NOP, ops::RETURN];
        assert!(matches!(
            shift_jump_offset(&mut code, 0, 1),
            Err(crate::Error::Format { .. })
        ));
    }

    fn packed_switch() -> Vec<u8> {
        let mut code = vec![ops::TABLESWITCH, 0, 0, 0];
        code.extend_from_slice(&20i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&24i32.to_be_bytes());
        code.resize(28, ops::NOP);
        code[20] = ops::RETURN;
        code[24] = ops::RETURN;
        code
    }

    #[test]
    fn test_shift_switch_offsets_moves_default_and_cases() {
        let mut code = packed_switch();
        shift_switch_offsets(&mut code, 0, SwitchKind::Table, 3).unwrap();
        let decoded = switches::decode_at(&code, 0).unwrap();
        assert_eq!(decoded.default_case.offset, 23);
        assert_eq!(decoded.cases[0].offset, 27);
    }

    #[test]
    fn test_shift_switch_offsets_never_inspects_arm_bodies() {
        // valid geometry, but the case arm body starts with an unassigned
        // opcode and the default offset points past the buffer, as happens
        // mid multi-step edit; the shift touches only the offset fields
        let mut code = packed_switch();
        code[24] = 0xcb;
        code[4..8].copy_from_slice(&100i32.to_be_bytes());

        shift_switch_offsets(&mut code, 0, SwitchKind::Table, 2).unwrap();
        assert_eq!(io::read_i32(&code, 4).unwrap(), 102);
        assert_eq!(io::read_i32(&code, 16).unwrap(), 26);
        // the arm byte itself is untouched
        assert_eq!(code[24], 0xcb);
    }

    #[test]
    fn test_shift_switch_offsets_checks_the_opcode_byte() {
        let mut code = packed_switch();
        let err = shift_switch_offsets(&mut code, 0, SwitchKind::Lookup, 3).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::State {
                offset: 0,
                expected: ops::LOOKUPSWITCH,
                found: ops::TABLESWITCH
            }
        ));
    }

    #[test]
    fn test_remap_cp_indices_in_code() {
        let mut code = [
            ops::LDC,
            7,
            ops::GETSTATIC,
            0,
            7,
            ops::INVOKEVIRTUAL,
            0,
            9,
            ops::RETURN,
        ];
        remap_cp_indices_in_code(&mut code, 7, 11);
        assert_eq!(code[1], 11);
        assert_eq!(io::read_u16(&code, 3).unwrap(), 11);
        assert_eq!(io::read_u16(&code, 6).unwrap(), 9);
    }

    #[test]
    fn test_remap_leaves_narrow_field_when_target_does_not_fit() {
        let mut code = [ops::LDC, 7, ops::RETURN];
        remap_cp_indices_in_code(&mut code, 7, 300);
        assert_eq!(code[1], 7);
    }

    struct Holder(u16);
    impl RemapCpIndex for Holder {
        fn remap_cp_index(&mut self, from: u16, to: u16) {
            if self.0 == from {
                self.0 = to;
            }
        }
    }

    #[test]
    fn test_swap_is_aliasing_safe() {
        let mut nodes = vec![Holder(1), Holder(2), Holder(1)];
        swap_cp_indices(&mut nodes, 1, 2, 3);
        assert_eq!(nodes[0].0, 2);
        assert_eq!(nodes[1].0, 1);
        assert_eq!(nodes[2].0, 2);
    }
}
