//! Decoding and analysis of the two multi-way-branch encodings
//!
//! Both forms start with an alignment gap after the opcode byte so the
//! 32-bit fields that follow sit on a 4-byte boundary relative to the start
//! of the code buffer. The packed-range form stores a default offset plus
//! `high - low + 1` consecutive case offsets; the sparse-pairs form stores a
//! default offset plus `count` (match, offset) pairs.
//!
//! The generic scanner cannot size these instructions; anything walking a
//! buffer that may contain them asks [`consumed_len_at`] for the true
//! encoded length and resumes past it.

use crate::error::{Error, Result};
use crate::flow::{self, FlowPath};
use crate::io;
use crate::opcode::{ops, Categories, SwitchKind};
use crate::scanner;

/// One arm of a decoded switch, default arm included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    /// The matched value; `None` for the default arm
    pub match_value: Option<i32>,
    /// Jump offset relative to the switch opcode
    pub offset: i32,
    /// Buffer position of the 4-byte offset field, for in-place edits
    pub offset_at: usize,
    /// Absolute destination of this arm
    pub target: usize,
    /// Control-flow trace from the arm's destination
    pub flow: FlowPath,
    /// Destination of the unconditional jump this arm's body ends with,
    /// when it ends with one
    pub end_target: Option<usize>,
}

/// A fully decoded multi-way branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSwitch {
    pub kind: SwitchKind,
    /// Buffer offset of the switch opcode byte
    pub at: usize,
    pub default_case: SwitchCase,
    pub cases: Vec<SwitchCase>,
    /// Offset one past the last byte of the encoded instruction
    pub end: usize,
}

/// Number of padding bytes between the opcode byte at `at` and the first
/// 32-bit field, normalized to the range `0..=3`
pub fn padding_after(at: usize) -> usize {
    (4 - ((at + 1) % 4)) % 4
}

fn switch_kind_at(code: &[u8], at: usize) -> Result<SwitchKind> {
    let opcode = *code
        .get(at)
        .ok_or_else(|| Error::format(at, "switch opcode offset past end of code"))?;
    match opcode {
        ops::TABLESWITCH => Ok(SwitchKind::Table),
        ops::LOOKUPSWITCH => Ok(SwitchKind::Lookup),
        other => Err(Error::format(
            at,
            format!("expected a switch opcode, found 0x{other:02x}"),
        )),
    }
}

/// Byte length consumed past the opcode byte by the switch at `at`,
/// derived purely from the encoded geometry.
///
/// `padding + 12 + 4*(high-low+1)` for the packed form,
/// `padding + 8 + 8*count` for the sparse form. The whole span must fit
/// in the buffer.
pub fn consumed_len_at(code: &[u8], at: usize) -> Result<usize> {
    let kind = switch_kind_at(code, at)?;
    let padding = padding_after(at);
    let fields = at + 1 + padding;
    let consumed = match kind {
        SwitchKind::Table => {
            let low = io::read_i32(code, fields + 4)?;
            let high = io::read_i32(code, fields + 8)?;
            if low > high {
                return Err(Error::format(
                    at,
                    format!("packed-range switch bounds inverted: low {low} > high {high}"),
                ));
            }
            padding + 12 + 4 * (high as i64 - low as i64 + 1) as usize
        }
        SwitchKind::Lookup => {
            let count = io::read_i32(code, fields + 4)?;
            if count < 0 {
                return Err(Error::format(
                    at,
                    format!("sparse-pairs switch has negative pair count {count}"),
                ));
            }
            padding + 8 + 8 * count as usize
        }
    };
    if at + 1 + consumed > code.len() {
        return Err(Error::format(
            at,
            format!(
                "{} table runs past end of code ({} bytes)",
                kind.mnemonic(),
                code.len()
            ),
        ));
    }
    Ok(consumed)
}

/// Buffer positions of the 4-byte default offset field and every case
/// offset field of the switch at `at`, default first, derived purely from
/// the encoded geometry. The span is validated against the buffer before
/// anything is sized from the encoded counts.
pub fn offset_field_positions(code: &[u8], at: usize) -> Result<Vec<usize>> {
    let kind = switch_kind_at(code, at)?;
    consumed_len_at(code, at)?;
    let fields = at + 1 + padding_after(at);
    let mut positions = vec![fields];
    match kind {
        SwitchKind::Table => {
            let low = io::read_i32(code, fields + 4)?;
            let high = io::read_i32(code, fields + 8)?;
            let count = (high as i64 - low as i64 + 1) as usize;
            positions.reserve(count);
            for i in 0..count {
                positions.push(fields + 12 + 4 * i);
            }
        }
        SwitchKind::Lookup => {
            let count = io::read_i32(code, fields + 4)? as usize;
            positions.reserve(count);
            for i in 0..count {
                positions.push(fields + 8 + 8 * i + 4);
            }
        }
    }
    Ok(positions)
}

/// Decode the switch instruction whose opcode byte sits at `at`, tracing
/// the control flow of every arm.
///
/// Fails with a format error when the byte at `at` is not one of the two
/// switch opcodes, when the encoded structure runs past the end of the
/// buffer, when the packed form's `low > high`, or when an arm's
/// destination lies outside the buffer.
pub fn decode_at(code: &[u8], at: usize) -> Result<DecodedSwitch> {
    let kind = switch_kind_at(code, at)?;
    // validate the claimed span before sizing anything from it
    consumed_len_at(code, at)?;
    let mut pos = at + 1 + padding_after(at);
    let default_offset_at = pos;
    let default_offset = io::read_i32(code, pos)?;
    pos += 4;

    // (match value, relative offset, offset field position)
    let mut raw_cases: Vec<(i32, i32, usize)>;
    match kind {
        SwitchKind::Table => {
            let low = io::read_i32(code, pos)?;
            let high = io::read_i32(code, pos + 4)?;
            pos += 8;
            let count = (high as i64 - low as i64 + 1) as usize;
            raw_cases = Vec::with_capacity(count);
            for i in 0..count {
                let offset = io::read_i32(code, pos)?;
                raw_cases.push(((low as i64 + i as i64) as i32, offset, pos));
                pos += 4;
            }
        }
        SwitchKind::Lookup => {
            let count = io::read_i32(code, pos)? as usize;
            pos += 4;
            raw_cases = Vec::with_capacity(count);
            for _ in 0..count {
                let value = io::read_i32(code, pos)?;
                let offset = io::read_i32(code, pos + 4)?;
                raw_cases.push((value, offset, pos + 4));
                pos += 8;
            }
        }
    }

    let default_case = build_case(code, at, None, default_offset, default_offset_at)?;
    let mut cases = Vec::with_capacity(raw_cases.len());
    for (value, offset, offset_at) in raw_cases {
        cases.push(build_case(code, at, Some(value), offset, offset_at)?);
    }

    Ok(DecodedSwitch {
        kind,
        at,
        default_case,
        cases,
        end: pos,
    })
}

fn build_case(
    code: &[u8],
    switch_at: usize,
    match_value: Option<i32>,
    offset: i32,
    offset_at: usize,
) -> Result<SwitchCase> {
    let dest = switch_at as i64 + offset as i64;
    if dest < 0 || dest as usize >= code.len() {
        return Err(Error::format(
            switch_at,
            format!(
                "switch arm destination {dest} lies outside the code buffer ({} bytes)",
                code.len()
            ),
        ));
    }
    let target = dest as usize;
    let flow = flow::trace_from(code, target)?;
    Ok(SwitchCase {
        match_value,
        offset,
        offset_at,
        target,
        flow,
        end_target: case_end_target(code, target)?,
    })
}

/// The destination of the first branch or terminal strictly after `target`,
/// provided that instruction is an unconditional jump. An arm whose body
/// ends any other way has no explicit end target.
fn case_end_target(code: &[u8], target: usize) -> Result<Option<usize>> {
    let after = match scanner::step(code, target) {
        Ok(after) => after,
        // the arm target itself holds a switch; its length is ours to derive
        Err(Error::NotImplemented { .. }) => target + 1 + consumed_len_at(code, target)?,
        Err(e) => return Err(e),
    };
    if after >= code.len() {
        return Ok(None);
    }
    let Some(stop) = scanner::next_branch_or_terminal(code, after)? else {
        return Ok(None);
    };
    let info = crate::opcode::lookup(code[stop]);
    if info.has(Categories::JUMP) && !info.has(Categories::CONDITION) {
        Ok(Some(info.jump_destination(code, stop)?))
    } else {
        Ok(None)
    }
}

impl DecodedSwitch {
    /// Total encoded length including the opcode byte
    pub fn encoded_len(&self) -> usize {
        self.end - self.at
    }

    /// Every arm of the switch, default first
    pub fn arms(&self) -> impl Iterator<Item = &SwitchCase> {
        std::iter::once(&self.default_case).chain(self.cases.iter())
    }

    /// The first offset at which every arm of the switch has converged
    /// onto one flow path, or `None` when no common offset exists.
    ///
    /// The default arm's flow offsets are intersected with each case arm's;
    /// the smallest survivor wins. Offsets are compared in normalized
    /// (non-complemented) form so a position counts whether an arm branches
    /// at it or merely ends there.
    pub fn convergence(&self) -> Option<usize> {
        let mut candidates: Vec<usize> = self
            .default_case
            .flow
            .offsets()
            .iter()
            .map(|&o| flow::normalize_offset(o) as usize)
            .collect();
        for case in &self.cases {
            let case_offsets: Vec<usize> = case
                .flow
                .offsets()
                .iter()
                .map(|&o| flow::normalize_offset(o) as usize)
                .collect();
            candidates.retain(|o| case_offsets.contains(o));
            if candidates.is_empty() {
                return None;
            }
        }
        candidates.into_iter().min()
    }

    /// Largest code offset any arm of this switch can reach
    pub fn max_flow_offset(&self) -> Option<usize> {
        self.arms().filter_map(|c| c.flow.max_offset()).max()
    }
}
