//! Control-flow path tracing over raw bytecode
//!
//! A traced path records only the interesting offsets: branch instructions
//! are stored bitwise-complemented (`!offset`) and path-ending instructions
//! (the return family and throw) are stored raw. Each branch is recorded at
//! most once, which bounds tracing over cyclic code.

use crate::error::Result;
use crate::opcode::{self, Categories};
use crate::scanner;

/// Recover a plain code offset from a possibly complement-encoded entry
pub fn normalize_offset(offset: i32) -> i32 {
    if offset < 0 {
        !offset
    } else {
        offset
    }
}

/// One traced control-flow path through a code buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowPath {
    offsets: Vec<i32>,
}

impl FlowPath {
    /// Recorded offsets in trace order: branches complemented, terminals raw
    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn contains(&self, encoded: i32) -> bool {
        self.offsets.contains(&encoded)
    }

    /// Largest code offset on this path, `None` for an empty path
    pub fn max_offset(&self) -> Option<usize> {
        self.offsets
            .iter()
            .map(|&o| normalize_offset(o) as usize)
            .max()
    }

    fn push(&mut self, encoded: i32) {
        self.offsets.push(encoded);
    }
}

/// Trace every control-flow path reachable from `start`, producing one
/// combined path record
pub fn trace_from(code: &[u8], start: usize) -> Result<FlowPath> {
    let mut path = FlowPath::default();
    trace_into(code, start, &mut path)?;
    Ok(path)
}

/// Continue a trace from `start`, appending into an existing path.
///
/// Scanning that falls off the end of the buffer simply ends that leg of
/// the trace; a branch whose destination lies outside the buffer is a
/// format error.
pub fn trace_into(code: &[u8], start: usize, path: &mut FlowPath) -> Result<()> {
    let mut at = start;
    loop {
        let Some(stop) = scanner::next_branch_or_terminal(code, at)? else {
            return Ok(());
        };
        let info = opcode::lookup(code[stop]);
        if info.is_terminal() {
            path.push(stop as i32);
            return Ok(());
        }

        let encoded = !(stop as i32);
        if path.contains(encoded) {
            // this branch was already walked, stop the cycle here
            return Ok(());
        }
        path.push(encoded);

        let dest = info.jump_destination(code, stop)?;
        if info.has(Categories::CONDITION) {
            trace_into(code, dest, path)?;
            // fall through past the conditional
            at = scanner::step(code, stop)?;
            if at >= code.len() {
                return Ok(());
            }
        } else {
            at = dest;
        }
    }
}

/// Whether any branch in `code` (plain jumps and both switch forms,
/// default and case arms alike) targets the absolute offset `target`
pub fn contains_jump_to(code: &[u8], target: usize) -> Result<bool> {
    let mut found = false;
    scanner::for_each_instruction(code, |info, at, _operands| {
        if found {
            return Ok(());
        }
        match info.patch {
            opcode::Patch::Offset { .. } => {
                if info.jump_destination(code, at)? == target {
                    found = true;
                }
            }
            opcode::Patch::SwitchOffsets(_) => {
                let sw = crate::switches::decode_at(code, at)?;
                if sw.arms().any(|arm| arm.target == target) {
                    found = true;
                }
            }
            _ => {}
        }
        Ok(())
    })?;
    Ok(found)
}

/// Render a traced path for humans, e.g. `~goto@0 -> return@7`.
/// Branches keep a `~` marker; terminals are printed plain.
pub fn flow_path_to_string(code: &[u8], path: &FlowPath) -> String {
    let mut out = String::new();
    for (i, &encoded) in path.offsets().iter().enumerate() {
        if i > 0 {
            out.push_str(" -> ");
        }
        let off = normalize_offset(encoded);
        let mnemonic = code
            .get(off as usize)
            .map(|&op| opcode::lookup(op).mnemonic)
            .unwrap_or("?");
        if encoded < 0 {
            out.push('~');
        }
        out.push_str(mnemonic);
        out.push('@');
        out.push_str(&off.to_string());
    }
    out
}
