//! Linear instruction scanning over raw bytecode
//!
//! Everything here walks a code buffer strictly forward from known
//! instruction starts. Variable-length forms are handled in one place:
//! the wide prefix doubles the operand width of the prefixed instruction,
//! and the two switch forms derive their length from their own geometry.

use crate::error::{Error, Result};
use crate::opcode::{self, ops, Categories, OpcodeInfo, Patch};
use crate::switches;

/// Offset of the instruction after the one starting at `at`.
///
/// The returned offset can equal `code.len()` when `at` holds the last
/// instruction. Truncated operands, unassigned opcodes and reserved
/// opcodes are format errors. The two switch forms are not generically
/// sizeable here and raise `NotImplemented`; callers resume past them
/// with the switch decoder's `consumed_len_at`.
pub fn step(code: &[u8], at: usize) -> Result<usize> {
    let opcode = *code
        .get(at)
        .ok_or_else(|| Error::format(at, "instruction offset past end of code"))?;
    let info = opcode::lookup(opcode);
    if !info.is_defined() {
        return Err(Error::format(
            at,
            format!("unassigned opcode 0x{opcode:02x}"),
        ));
    }

    let next = if opcode == ops::WIDE {
        let inner = *code
            .get(at + 1)
            .ok_or_else(|| Error::format(at, "wide prefix at end of code"))?;
        let inner_info = opcode::lookup(inner);
        // only the local-variable forms and iinc take the prefix
        let widenable = matches!(
            inner,
            ops::ILOAD..=ops::ALOAD | ops::ISTORE..=ops::ASTORE | ops::RET | ops::IINC
        );
        if !widenable {
            return Err(Error::format(
                at,
                format!("wide prefix cannot apply to {}", inner_info.mnemonic),
            ));
        }
        // the prefixed instruction's operands double in width
        at + 2 + 2 * inner_info.operand_count as usize
    } else {
        match info.operand_count {
            n if n >= 0 => at + 1 + n as usize,
            opcode::UNPREDICTABLE => {
                return Err(Error::not_implemented(format!(
                    "{} at {at} cannot be sized by the generic scanner",
                    info.mnemonic
                )))
            }
            _ => {
                return Err(Error::format(
                    at,
                    format!("reserved opcode {} in code", info.mnemonic),
                ))
            }
        }
    };

    if next > code.len() {
        return Err(Error::format(
            at,
            format!(
                "operands of {} run past end of code ({} bytes)",
                info.mnemonic,
                code.len()
            ),
        ));
    }
    Ok(next)
}

/// Which offsets of a code buffer begin an instruction, one bit per byte
#[derive(Debug, Clone)]
pub struct InstructionStarts {
    words: Vec<u64>,
    len: usize,
}

impl InstructionStarts {
    fn with_len(len: usize) -> Self {
        InstructionStarts {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    fn set(&mut self, at: usize) {
        self.words[at / 64] |= 1 << (at % 64);
    }

    pub fn is_start(&self, at: usize) -> bool {
        at < self.len && self.words[at / 64] >> (at % 64) & 1 == 1
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&at| self.is_start(at))
    }
}

/// Mark every instruction-start offset in `code`.
///
/// For a wide-prefixed instruction the prefix byte is the start; the
/// prefixed opcode and its doubled operands are interior bytes. A buffer
/// containing a switch form cannot be marked by this generic walk; use
/// [`for_each_instruction`] when switches may be present.
pub fn mark_instruction_starts(code: &[u8]) -> Result<InstructionStarts> {
    let mut starts = InstructionStarts::with_len(code.len());
    let mut at = 0;
    while at < code.len() {
        starts.set(at);
        at = step(code, at)?;
    }
    Ok(starts)
}

/// Offset of the first branch or path-ending instruction at or after `at`,
/// or `None` when the scan falls off the end of the buffer
pub fn next_branch_or_terminal(code: &[u8], at: usize) -> Result<Option<usize>> {
    let mut at = at;
    while at < code.len() {
        let info = opcode::lookup(code[at]);
        if info.has(Categories::JUMP) || info.is_terminal() {
            return Ok(Some(at));
        }
        at = step(code, at)?;
    }
    Ok(None)
}

/// Whether execution from `at` runs straight into a return with no
/// branching of any kind on the way
pub fn is_straight_return_run(code: &[u8], at: usize) -> Result<bool> {
    let mut at = at;
    while at < code.len() {
        let info = opcode::lookup(code[at]);
        if info.has(Categories::RETURN) {
            return Ok(true);
        }
        if info.has(Categories::JUMP)
            || info.has(Categories::THROW)
            || matches!(info.patch, Patch::SwitchOffsets(_))
        {
            return Ok(false);
        }
        at = step(code, at)?;
    }
    Ok(false)
}

/// Visit every instruction in `code` in order. The callback receives the
/// catalog record, the instruction's start offset, and its operand bytes
/// (for wide-prefixed instructions: the prefixed opcode plus its doubled
/// operands).
///
/// Unlike the raw stepping helpers this walk handles the switch forms by
/// delegating to the switch decoder for their consumed length.
pub fn for_each_instruction<F>(code: &[u8], mut f: F) -> Result<()>
where
    F: FnMut(&'static OpcodeInfo, usize, &[u8]) -> Result<()>,
{
    let mut at = 0;
    while at < code.len() {
        let next = match step(code, at) {
            Ok(next) => next,
            Err(Error::NotImplemented { .. }) => at + 1 + switches::consumed_len_at(code, at)?,
            Err(e) => return Err(e),
        };
        f(opcode::lookup(code[at]), at, &code[at + 1..next])?;
        at = next;
    }
    Ok(())
}
