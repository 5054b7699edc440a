//! Instruction catalog for the stack-machine opcode set
//!
//! One validated, immutable metadata record per possible opcode byte. The
//! table is built once on first use and lives for the process lifetime;
//! construction eagerly checks the structural invariants (array loads pop 2
//! and push 1, conditions are jumps, and so on) so the catalog can never be
//! observed in an invalid state.

use bitflags::bitflags;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::io;

/// Opcode byte values, ordered by value.
///
/// Mnemonics, operand widths and behavior flags for these live in the
/// [`OpcodeTable`]; these constants exist so call sites can name the handful
/// of opcodes with special structural meaning.
pub mod ops {
    pub const NOP: u8 = 0x00;
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_M1: u8 = 0x02;
    pub const ICONST_0: u8 = 0x03;
    pub const ICONST_1: u8 = 0x04;
    pub const ICONST_2: u8 = 0x05;
    pub const ICONST_3: u8 = 0x06;
    pub const ICONST_4: u8 = 0x07;
    pub const ICONST_5: u8 = 0x08;
    pub const LCONST_0: u8 = 0x09;
    pub const LCONST_1: u8 = 0x0a;
    pub const FCONST_0: u8 = 0x0b;
    pub const FCONST_1: u8 = 0x0c;
    pub const FCONST_2: u8 = 0x0d;
    pub const DCONST_0: u8 = 0x0e;
    pub const DCONST_1: u8 = 0x0f;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const ILOAD: u8 = 0x15;
    pub const LLOAD: u8 = 0x16;
    pub const FLOAD: u8 = 0x17;
    pub const DLOAD: u8 = 0x18;
    pub const ALOAD: u8 = 0x19;
    pub const ILOAD_0: u8 = 0x1a;
    pub const ILOAD_1: u8 = 0x1b;
    pub const ILOAD_2: u8 = 0x1c;
    pub const ILOAD_3: u8 = 0x1d;
    pub const LLOAD_0: u8 = 0x1e;
    pub const LLOAD_1: u8 = 0x1f;
    pub const LLOAD_2: u8 = 0x20;
    pub const LLOAD_3: u8 = 0x21;
    pub const FLOAD_0: u8 = 0x22;
    pub const FLOAD_1: u8 = 0x23;
    pub const FLOAD_2: u8 = 0x24;
    pub const FLOAD_3: u8 = 0x25;
    pub const DLOAD_0: u8 = 0x26;
    pub const DLOAD_1: u8 = 0x27;
    pub const DLOAD_2: u8 = 0x28;
    pub const DLOAD_3: u8 = 0x29;
    pub const ALOAD_0: u8 = 0x2a;
    pub const ALOAD_1: u8 = 0x2b;
    pub const ALOAD_2: u8 = 0x2c;
    pub const ALOAD_3: u8 = 0x2d;
    pub const IALOAD: u8 = 0x2e;
    pub const LALOAD: u8 = 0x2f;
    pub const FALOAD: u8 = 0x30;
    pub const DALOAD: u8 = 0x31;
    pub const AALOAD: u8 = 0x32;
    pub const BALOAD: u8 = 0x33;
    pub const CALOAD: u8 = 0x34;
    pub const SALOAD: u8 = 0x35;
    pub const ISTORE: u8 = 0x36;
    pub const LSTORE: u8 = 0x37;
    pub const FSTORE: u8 = 0x38;
    pub const DSTORE: u8 = 0x39;
    pub const ASTORE: u8 = 0x3a;
    pub const ISTORE_0: u8 = 0x3b;
    pub const ISTORE_1: u8 = 0x3c;
    pub const ISTORE_2: u8 = 0x3d;
    pub const ISTORE_3: u8 = 0x3e;
    pub const LSTORE_0: u8 = 0x3f;
    pub const LSTORE_1: u8 = 0x40;
    pub const LSTORE_2: u8 = 0x41;
    pub const LSTORE_3: u8 = 0x42;
    pub const FSTORE_0: u8 = 0x43;
    pub const FSTORE_1: u8 = 0x44;
    pub const FSTORE_2: u8 = 0x45;
    pub const FSTORE_3: u8 = 0x46;
    pub const DSTORE_0: u8 = 0x47;
    pub const DSTORE_1: u8 = 0x48;
    pub const DSTORE_2: u8 = 0x49;
    pub const DSTORE_3: u8 = 0x4a;
    pub const ASTORE_0: u8 = 0x4b;
    pub const ASTORE_1: u8 = 0x4c;
    pub const ASTORE_2: u8 = 0x4d;
    pub const ASTORE_3: u8 = 0x4e;
    pub const IASTORE: u8 = 0x4f;
    pub const LASTORE: u8 = 0x50;
    pub const FASTORE: u8 = 0x51;
    pub const DASTORE: u8 = 0x52;
    pub const AASTORE: u8 = 0x53;
    pub const BASTORE: u8 = 0x54;
    pub const CASTORE: u8 = 0x55;
    pub const SASTORE: u8 = 0x56;
    pub const POP: u8 = 0x57;
    pub const POP2: u8 = 0x58;
    pub const DUP: u8 = 0x59;
    pub const DUP_X1: u8 = 0x5a;
    pub const DUP_X2: u8 = 0x5b;
    pub const DUP2: u8 = 0x5c;
    pub const DUP2_X1: u8 = 0x5d;
    pub const DUP2_X2: u8 = 0x5e;
    pub const SWAP: u8 = 0x5f;
    pub const IADD: u8 = 0x60;
    pub const LADD: u8 = 0x61;
    pub const FADD: u8 = 0x62;
    pub const DADD: u8 = 0x63;
    pub const ISUB: u8 = 0x64;
    pub const LSUB: u8 = 0x65;
    pub const FSUB: u8 = 0x66;
    pub const DSUB: u8 = 0x67;
    pub const IMUL: u8 = 0x68;
    pub const LMUL: u8 = 0x69;
    pub const FMUL: u8 = 0x6a;
    pub const DMUL: u8 = 0x6b;
    pub const IDIV: u8 = 0x6c;
    pub const LDIV: u8 = 0x6d;
    pub const FDIV: u8 = 0x6e;
    pub const DDIV: u8 = 0x6f;
    pub const IREM: u8 = 0x70;
    pub const LREM: u8 = 0x71;
    pub const FREM: u8 = 0x72;
    pub const DREM: u8 = 0x73;
    pub const INEG: u8 = 0x74;
    pub const LNEG: u8 = 0x75;
    pub const FNEG: u8 = 0x76;
    pub const DNEG: u8 = 0x77;
    pub const ISHL: u8 = 0x78;
    pub const LSHL: u8 = 0x79;
    pub const ISHR: u8 = 0x7a;
    pub const LSHR: u8 = 0x7b;
    pub const IUSHR: u8 = 0x7c;
    pub const LUSHR: u8 = 0x7d;
    pub const IAND: u8 = 0x7e;
    pub const LAND: u8 = 0x7f;
    pub const IOR: u8 = 0x80;
    pub const LOR: u8 = 0x81;
    pub const IXOR: u8 = 0x82;
    pub const LXOR: u8 = 0x83;
    pub const IINC: u8 = 0x84;
    pub const I2L: u8 = 0x85;
    pub const I2F: u8 = 0x86;
    pub const I2D: u8 = 0x87;
    pub const L2I: u8 = 0x88;
    pub const L2F: u8 = 0x89;
    pub const L2D: u8 = 0x8a;
    pub const F2I: u8 = 0x8b;
    pub const F2L: u8 = 0x8c;
    pub const F2D: u8 = 0x8d;
    pub const D2I: u8 = 0x8e;
    pub const D2L: u8 = 0x8f;
    pub const D2F: u8 = 0x90;
    pub const I2B: u8 = 0x91;
    pub const I2C: u8 = 0x92;
    pub const I2S: u8 = 0x93;
    pub const LCMP: u8 = 0x94;
    pub const FCMPL: u8 = 0x95;
    pub const FCMPG: u8 = 0x96;
    pub const DCMPL: u8 = 0x97;
    pub const DCMPG: u8 = 0x98;
    pub const IFEQ: u8 = 0x99;
    pub const IFNE: u8 = 0x9a;
    pub const IFLT: u8 = 0x9b;
    pub const IFGE: u8 = 0x9c;
    pub const IFGT: u8 = 0x9d;
    pub const IFLE: u8 = 0x9e;
    pub const IF_ICMPEQ: u8 = 0x9f;
    pub const IF_ICMPNE: u8 = 0xa0;
    pub const IF_ICMPLT: u8 = 0xa1;
    pub const IF_ICMPGE: u8 = 0xa2;
    pub const IF_ICMPGT: u8 = 0xa3;
    pub const IF_ICMPLE: u8 = 0xa4;
    pub const IF_ACMPEQ: u8 = 0xa5;
    pub const IF_ACMPNE: u8 = 0xa6;
    pub const GOTO: u8 = 0xa7;
    pub const JSR: u8 = 0xa8;
    pub const RET: u8 = 0xa9;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const IRETURN: u8 = 0xac;
    pub const LRETURN: u8 = 0xad;
    pub const FRETURN: u8 = 0xae;
    pub const DRETURN: u8 = 0xaf;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const NEWARRAY: u8 = 0xbc;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const ARRAYLENGTH: u8 = 0xbe;
    pub const ATHROW: u8 = 0xbf;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const MONITORENTER: u8 = 0xc2;
    pub const MONITOREXIT: u8 = 0xc3;
    pub const WIDE: u8 = 0xc4;
    pub const MULTIANEWARRAY: u8 = 0xc5;
    pub const IFNULL: u8 = 0xc6;
    pub const IFNONNULL: u8 = 0xc7;
    pub const GOTO_W: u8 = 0xc8;
    pub const JSR_W: u8 = 0xc9;
    pub const BREAKPOINT: u8 = 0xca;
    pub const IMPDEP1: u8 = 0xfe;
    pub const IMPDEP2: u8 = 0xff;
}

/// Operand count sentinel: encoded length depends on the instruction data
/// itself (wide-prefixed forms and the two multi-way-branch forms)
pub const UNPREDICTABLE: i8 = -1;
/// Operand count sentinel: reserved/debug-only opcode with no defined encoding
pub const RESERVED: i8 = -2;

bitflags! {
    /// Behavior categories an opcode can belong to
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Categories: u16 {
        const JUMP             = 1 << 0;
        const CONDITION        = 1 << 1;
        const RETURN           = 1 << 2;
        const THROW            = 1 << 3;
        const CP_INDEX         = 1 << 4;
        const VAR_LOAD         = 1 << 5;
        const VAR_STORE        = 1 << 6;
        const ARRAY_LOAD       = 1 << 7;
        const ARRAY_STORE      = 1 << 8;
        const MATH_OP          = 1 << 9;
        const TYPE_CONVERT     = 1 << 10;
        const STACK_MANIPULATE = 1 << 11;
    }
}

/// How many operand stack slots an instruction pops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopCount {
    Fixed(u8),
    /// Call instructions: pop count depends on the invoked descriptor
    Unpredictable,
}

impl PopCount {
    pub fn fixed(self) -> Option<u8> {
        match self {
            PopCount::Fixed(n) => Some(n),
            PopCount::Unpredictable => None,
        }
    }
}

/// The two multi-way-branch encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    /// Packed-range form: consecutive match values `low..=high` (tableswitch)
    Table,
    /// Sparse-pairs form: arbitrary unordered (match, target) pairs (lookupswitch)
    Lookup,
}

impl SwitchKind {
    pub fn opcode(self) -> u8 {
        match self {
            SwitchKind::Table => ops::TABLESWITCH,
            SwitchKind::Lookup => ops::LOOKUPSWITCH,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            SwitchKind::Table => "tableswitch",
            SwitchKind::Lookup => "lookupswitch",
        }
    }
}

/// Optional patch capability carried by an opcode's operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch {
    /// No embedded value that edits need to keep consistent
    None,
    /// A constant-table index stored `at` bytes past the opcode, `width` bytes wide
    CpIndex { at: u8, width: u8 },
    /// A relative jump offset stored `at` bytes past the opcode, `width` bytes wide
    Offset { at: u8, width: u8 },
    /// An embedded, data-dependent jump table (see the switch decoder)
    SwitchOffsets(SwitchKind),
}

/// Metadata record for one opcode value
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub opcode: u8,
    /// Lowercase display name, `"undefined"` for unassigned values
    pub mnemonic: &'static str,
    /// Operand byte count, or [`UNPREDICTABLE`] / [`RESERVED`].
    /// Unassigned opcode values also report -1 here.
    pub operand_count: i8,
    pub categories: Categories,
    pub pop: PopCount,
    /// 0 or 1
    pub push: u8,
    pub patch: Patch,
}

impl OpcodeInfo {
    const fn undefined(opcode: u8) -> Self {
        OpcodeInfo {
            opcode,
            mnemonic: "undefined",
            operand_count: -1,
            categories: Categories::empty(),
            pop: PopCount::Fixed(0),
            push: 0,
            patch: Patch::None,
        }
    }

    /// Whether this opcode value has an assigned instruction.
    /// Unassigned values still yield a usable sentinel record so analysis
    /// tools can walk arbitrary byte streams without crashing.
    pub fn is_defined(&self) -> bool {
        self.mnemonic != "undefined"
    }

    /// True if the opcode has every category in `cats`
    pub fn has(&self, cats: Categories) -> bool {
        self.categories.contains(cats)
    }

    /// True for instructions that end a control path: the return family and throw
    pub fn is_terminal(&self) -> bool {
        self.categories
            .intersects(Categories::RETURN | Categories::THROW)
    }

    /// Resolve the absolute destination of this jump instruction located at
    /// `at` in `code`.
    ///
    /// 2-byte operands are sign extended; 4-byte wide forms use the full
    /// signed 32-bit operand. A destination outside `code` (including a
    /// negative computed result) is a format error.
    pub fn jump_destination(&self, code: &[u8], at: usize) -> Result<usize> {
        let (rel_at, width) = match self.patch {
            Patch::Offset { at: rel_at, width } => (rel_at as usize, width),
            _ => {
                return Err(Error::format(
                    at,
                    format!("{} does not carry a jump offset", self.mnemonic),
                ))
            }
        };
        let delta = match width {
            2 => io::read_i16(code, at + rel_at)? as i64,
            4 => io::read_i32(code, at + rel_at)? as i64,
            _ => io::read_i8(code, at + rel_at)? as i64,
        };
        let dest = at as i64 + delta;
        if dest < 0 || dest as usize >= code.len() {
            return Err(Error::format(
                at,
                format!(
                    "{} destination {dest} lies outside the code buffer ({} bytes)",
                    self.mnemonic,
                    code.len()
                ),
            ));
        }
        Ok(dest as usize)
    }
}

/// A structural invariant violated by a catalog entry
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{mnemonic}: {rule}")]
    InvalidEntry {
        mnemonic: &'static str,
        rule: &'static str,
    },
}

/// Check the structural invariants for a single metadata record.
///
/// The global table runs this for every entry at build time; it is public so
/// tooling that synthesizes records can apply the same rules.
pub fn validate_entry(info: &OpcodeInfo) -> std::result::Result<(), CatalogError> {
    let fail = |rule: &'static str| {
        Err(CatalogError::InvalidEntry {
            mnemonic: info.mnemonic,
            rule,
        })
    };
    if info.push > 1 {
        return fail("push count must be 0 or 1");
    }
    if let PopCount::Fixed(n) = info.pop {
        if n > 3 {
            return fail("fixed pop count must be at most 3");
        }
    }
    if info.has(Categories::ARRAY_LOAD)
        && (info.pop != PopCount::Fixed(2) || info.push != 1)
    {
        return fail("array loads must pop 2 and push 1");
    }
    if info.has(Categories::ARRAY_STORE) && info.pop != PopCount::Fixed(3) {
        return fail("array stores must pop 3");
    }
    if info.has(Categories::VAR_LOAD) && info.push != 1 {
        return fail("variable loads must push 1");
    }
    if info.has(Categories::VAR_STORE) && info.pop != PopCount::Fixed(1) {
        return fail("variable stores must pop 1");
    }
    if info.has(Categories::MATH_OP)
        && (!matches!(info.pop, PopCount::Fixed(1) | PopCount::Fixed(2)) || info.push != 1)
    {
        return fail("math ops must pop 1 or 2 and push 1");
    }
    if info.has(Categories::CONDITION) && !info.has(Categories::JUMP) {
        return fail("conditions must also be jumps");
    }
    Ok(())
}

/// The process-wide instruction catalog: one entry per opcode byte value
pub struct OpcodeTable {
    entries: Box<[OpcodeInfo; 256]>,
}

static TABLE: Lazy<OpcodeTable> =
    Lazy::new(|| OpcodeTable::build().expect("opcode catalog invariants hold"));

/// O(1) lookup in the global catalog; never fails
pub fn lookup(opcode: u8) -> &'static OpcodeInfo {
    OpcodeTable::global().lookup(opcode)
}

impl OpcodeTable {
    /// The global validated table, built on first use
    pub fn global() -> &'static OpcodeTable {
        &TABLE
    }

    pub fn lookup(&self, opcode: u8) -> &OpcodeInfo {
        &self.entries[opcode as usize]
    }

    /// All defined opcodes carrying every category in `cats`, for tooling
    pub fn opcodes_with(&self, cats: Categories) -> impl Iterator<Item = &OpcodeInfo> {
        self.entries
            .iter()
            .filter(move |i| i.is_defined() && i.categories.contains(cats))
    }

    fn build() -> std::result::Result<OpcodeTable, CatalogError> {
        let mut table = OpcodeTable {
            entries: Box::new(std::array::from_fn(|op| OpcodeInfo::undefined(op as u8))),
        };
        table.fill();
        for info in table.entries.iter().filter(|i| i.is_defined()) {
            validate_entry(info)?;
        }
        Ok(table)
    }

    #[rustfmt::skip]
    fn fill(&mut self) {
        use self::ops::*;
        use self::Categories as C;

        const NONE: Categories = Categories::empty();
        const CP2: Patch = Patch::CpIndex { at: 1, width: 2 };
        const OFF2: Patch = Patch::Offset { at: 1, width: 2 };
        const OFF4: Patch = Patch::Offset { at: 1, width: 4 };

        let cond = C::CONDITION.union(C::JUMP);

        self.def(NOP,            "nop",            0, NONE, 0, 0, Patch::None);
        self.def(ACONST_NULL,    "aconst_null",    0, NONE, 0, 1, Patch::None);
        for (op, name) in [
            (ICONST_M1, "iconst_m1"), (ICONST_0, "iconst_0"), (ICONST_1, "iconst_1"),
            (ICONST_2, "iconst_2"), (ICONST_3, "iconst_3"), (ICONST_4, "iconst_4"),
            (ICONST_5, "iconst_5"), (LCONST_0, "lconst_0"), (LCONST_1, "lconst_1"),
            (FCONST_0, "fconst_0"), (FCONST_1, "fconst_1"), (FCONST_2, "fconst_2"),
            (DCONST_0, "dconst_0"), (DCONST_1, "dconst_1"),
        ] {
            self.def(op, name, 0, NONE, 0, 1, Patch::None);
        }
        self.def(BIPUSH,         "bipush",         1, NONE, 0, 1, Patch::None);
        self.def(SIPUSH,         "sipush",         2, NONE, 0, 1, Patch::None);
        self.def(LDC,            "ldc",            1, C::CP_INDEX, 0, 1, Patch::CpIndex { at: 1, width: 1 });
        self.def(LDC_W,          "ldc_w",          2, C::CP_INDEX, 0, 1, CP2);
        self.def(LDC2_W,         "ldc2_w",         2, C::CP_INDEX, 0, 1, CP2);
        for (op, name) in [
            (ILOAD, "iload"), (LLOAD, "lload"), (FLOAD, "fload"),
            (DLOAD, "dload"), (ALOAD, "aload"),
        ] {
            self.def(op, name, 1, C::VAR_LOAD, 0, 1, Patch::None);
        }
        for (op, name) in [
            (ILOAD_0, "iload_0"), (ILOAD_1, "iload_1"), (ILOAD_2, "iload_2"), (ILOAD_3, "iload_3"),
            (LLOAD_0, "lload_0"), (LLOAD_1, "lload_1"), (LLOAD_2, "lload_2"), (LLOAD_3, "lload_3"),
            (FLOAD_0, "fload_0"), (FLOAD_1, "fload_1"), (FLOAD_2, "fload_2"), (FLOAD_3, "fload_3"),
            (DLOAD_0, "dload_0"), (DLOAD_1, "dload_1"), (DLOAD_2, "dload_2"), (DLOAD_3, "dload_3"),
            (ALOAD_0, "aload_0"), (ALOAD_1, "aload_1"), (ALOAD_2, "aload_2"), (ALOAD_3, "aload_3"),
        ] {
            self.def(op, name, 0, C::VAR_LOAD, 0, 1, Patch::None);
        }
        for (op, name) in [
            (IALOAD, "iaload"), (LALOAD, "laload"), (FALOAD, "faload"), (DALOAD, "daload"),
            (AALOAD, "aaload"), (BALOAD, "baload"), (CALOAD, "caload"), (SALOAD, "saload"),
        ] {
            self.def(op, name, 0, C::ARRAY_LOAD, 2, 1, Patch::None);
        }
        for (op, name) in [
            (ISTORE, "istore"), (LSTORE, "lstore"), (FSTORE, "fstore"),
            (DSTORE, "dstore"), (ASTORE, "astore"),
        ] {
            self.def(op, name, 1, C::VAR_STORE, 1, 0, Patch::None);
        }
        for (op, name) in [
            (ISTORE_0, "istore_0"), (ISTORE_1, "istore_1"), (ISTORE_2, "istore_2"), (ISTORE_3, "istore_3"),
            (LSTORE_0, "lstore_0"), (LSTORE_1, "lstore_1"), (LSTORE_2, "lstore_2"), (LSTORE_3, "lstore_3"),
            (FSTORE_0, "fstore_0"), (FSTORE_1, "fstore_1"), (FSTORE_2, "fstore_2"), (FSTORE_3, "fstore_3"),
            (DSTORE_0, "dstore_0"), (DSTORE_1, "dstore_1"), (DSTORE_2, "dstore_2"), (DSTORE_3, "dstore_3"),
            (ASTORE_0, "astore_0"), (ASTORE_1, "astore_1"), (ASTORE_2, "astore_2"), (ASTORE_3, "astore_3"),
        ] {
            self.def(op, name, 0, C::VAR_STORE, 1, 0, Patch::None);
        }
        for (op, name) in [
            (IASTORE, "iastore"), (LASTORE, "lastore"), (FASTORE, "fastore"), (DASTORE, "dastore"),
            (AASTORE, "aastore"), (BASTORE, "bastore"), (CASTORE, "castore"), (SASTORE, "sastore"),
        ] {
            self.def(op, name, 0, C::ARRAY_STORE, 3, 0, Patch::None);
        }
        self.def(POP,            "pop",            0, C::STACK_MANIPULATE, 1, 0, Patch::None);
        self.def(POP2,           "pop2",           0, C::STACK_MANIPULATE, 2, 0, Patch::None);
        for (op, name) in [
            (DUP, "dup"), (DUP_X1, "dup_x1"), (DUP_X2, "dup_x2"), (DUP2, "dup2"),
            (DUP2_X1, "dup2_x1"), (DUP2_X2, "dup2_x2"), (SWAP, "swap"),
        ] {
            self.def(op, name, 0, C::STACK_MANIPULATE, 0, 0, Patch::None);
        }
        for (op, name) in [
            (IADD, "iadd"), (LADD, "ladd"), (FADD, "fadd"), (DADD, "dadd"),
            (ISUB, "isub"), (LSUB, "lsub"), (FSUB, "fsub"), (DSUB, "dsub"),
            (IMUL, "imul"), (LMUL, "lmul"), (FMUL, "fmul"), (DMUL, "dmul"),
            (IDIV, "idiv"), (LDIV, "ldiv"), (FDIV, "fdiv"), (DDIV, "ddiv"),
            (IREM, "irem"), (LREM, "lrem"), (FREM, "frem"), (DREM, "drem"),
        ] {
            self.def(op, name, 0, C::MATH_OP, 2, 1, Patch::None);
        }
        for (op, name) in [(INEG, "ineg"), (LNEG, "lneg"), (FNEG, "fneg"), (DNEG, "dneg")] {
            self.def(op, name, 0, C::MATH_OP, 1, 1, Patch::None);
        }
        for (op, name) in [
            (ISHL, "ishl"), (LSHL, "lshl"), (ISHR, "ishr"), (LSHR, "lshr"),
            (IUSHR, "iushr"), (LUSHR, "lushr"), (IAND, "iand"), (LAND, "land"),
            (IOR, "ior"), (LOR, "lor"), (IXOR, "ixor"), (LXOR, "lxor"),
        ] {
            self.def(op, name, 0, C::MATH_OP, 2, 1, Patch::None);
        }
        self.def(IINC,           "iinc",           2, NONE, 0, 0, Patch::None);
        for (op, name) in [
            (I2L, "i2l"), (I2F, "i2f"), (I2D, "i2d"), (L2I, "l2i"), (L2F, "l2f"),
            (L2D, "l2d"), (F2I, "f2i"), (F2L, "f2l"), (F2D, "f2d"), (D2I, "d2i"),
            (D2L, "d2l"), (D2F, "d2f"), (I2B, "i2b"), (I2C, "i2c"), (I2S, "i2s"),
        ] {
            self.def(op, name, 0, C::TYPE_CONVERT, 1, 1, Patch::None);
        }
        for (op, name) in [
            (LCMP, "lcmp"), (FCMPL, "fcmpl"), (FCMPG, "fcmpg"),
            (DCMPL, "dcmpl"), (DCMPG, "dcmpg"),
        ] {
            self.def(op, name, 0, C::MATH_OP, 2, 1, Patch::None);
        }
        for (op, name) in [
            (IFEQ, "ifeq"), (IFNE, "ifne"), (IFLT, "iflt"),
            (IFGE, "ifge"), (IFGT, "ifgt"), (IFLE, "ifle"),
        ] {
            self.def(op, name, 2, cond, 1, 0, OFF2);
        }
        for (op, name) in [
            (IF_ICMPEQ, "if_icmpeq"), (IF_ICMPNE, "if_icmpne"), (IF_ICMPLT, "if_icmplt"),
            (IF_ICMPGE, "if_icmpge"), (IF_ICMPGT, "if_icmpgt"), (IF_ICMPLE, "if_icmple"),
            (IF_ACMPEQ, "if_acmpeq"), (IF_ACMPNE, "if_acmpne"),
        ] {
            self.def(op, name, 2, cond, 2, 0, OFF2);
        }
        self.def(GOTO,           "goto",           2, C::JUMP, 0, 0, OFF2);
        self.def(JSR,            "jsr",            2, C::JUMP, 0, 1, OFF2);
        self.def(RET,            "ret",            1, NONE, 0, 0, Patch::None);
        self.def(TABLESWITCH,    "tableswitch",    UNPREDICTABLE, NONE, 1, 0, Patch::SwitchOffsets(SwitchKind::Table));
        self.def(LOOKUPSWITCH,   "lookupswitch",   UNPREDICTABLE, NONE, 1, 0, Patch::SwitchOffsets(SwitchKind::Lookup));
        for (op, name) in [
            (IRETURN, "ireturn"), (LRETURN, "lreturn"), (FRETURN, "freturn"),
            (DRETURN, "dreturn"), (ARETURN, "areturn"),
        ] {
            self.def(op, name, 0, C::RETURN, 1, 0, Patch::None);
        }
        self.def(RETURN,         "return",         0, C::RETURN, 0, 0, Patch::None);
        self.def(GETSTATIC,      "getstatic",      2, C::CP_INDEX, 0, 1, CP2);
        self.def(PUTSTATIC,      "putstatic",      2, C::CP_INDEX, 1, 0, CP2);
        self.def(GETFIELD,       "getfield",       2, C::CP_INDEX, 1, 1, CP2);
        self.def(PUTFIELD,       "putfield",       2, C::CP_INDEX, 2, 0, CP2);
        self.def_call(INVOKEVIRTUAL,   "invokevirtual",   2);
        self.def_call(INVOKESPECIAL,   "invokespecial",   2);
        self.def_call(INVOKESTATIC,    "invokestatic",    2);
        self.def_call(INVOKEINTERFACE, "invokeinterface", 4);
        self.def_call(INVOKEDYNAMIC,   "invokedynamic",   4);
        self.def(NEW,            "new",            2, C::CP_INDEX, 0, 1, CP2);
        self.def(NEWARRAY,       "newarray",       1, NONE, 1, 1, Patch::None);
        self.def(ANEWARRAY,      "anewarray",      2, C::CP_INDEX, 1, 1, CP2);
        self.def(ARRAYLENGTH,    "arraylength",    0, NONE, 1, 1, Patch::None);
        self.def(ATHROW,         "athrow",         0, C::THROW, 1, 0, Patch::None);
        self.def(CHECKCAST,      "checkcast",      2, C::CP_INDEX, 1, 1, CP2);
        self.def(INSTANCEOF,     "instanceof",     2, C::CP_INDEX, 1, 1, CP2);
        self.def(MONITORENTER,   "monitorenter",   0, NONE, 1, 0, Patch::None);
        self.def(MONITOREXIT,    "monitorexit",    0, NONE, 1, 0, Patch::None);
        self.def(WIDE,           "wide",           UNPREDICTABLE, NONE, 0, 0, Patch::None);
        self.def(MULTIANEWARRAY, "multianewarray", 3, C::CP_INDEX, 3, 1, CP2);
        self.def(IFNULL,         "ifnull",         2, cond, 1, 0, OFF2);
        self.def(IFNONNULL,      "ifnonnull",      2, cond, 1, 0, OFF2);
        self.def(GOTO_W,         "goto_w",         4, C::JUMP, 0, 0, OFF4);
        self.def(JSR_W,          "jsr_w",          4, C::JUMP, 0, 1, OFF4);
        self.def(BREAKPOINT,     "breakpoint",     RESERVED, NONE, 0, 0, Patch::None);
        self.def(IMPDEP1,        "impdep1",        RESERVED, NONE, 0, 0, Patch::None);
        self.def(IMPDEP2,        "impdep2",        RESERVED, NONE, 0, 0, Patch::None);
    }

    fn def(
        &mut self,
        opcode: u8,
        mnemonic: &'static str,
        operand_count: i8,
        categories: Categories,
        pop: u8,
        push: u8,
        patch: Patch,
    ) {
        self.entries[opcode as usize] = OpcodeInfo {
            opcode,
            mnemonic,
            operand_count,
            categories,
            pop: PopCount::Fixed(pop),
            push,
            patch,
        };
    }

    /// Call instructions pop a descriptor-dependent number of values
    fn def_call(&mut self, opcode: u8, mnemonic: &'static str, operand_count: i8) {
        self.entries[opcode as usize] = OpcodeInfo {
            opcode,
            mnemonic,
            operand_count,
            categories: Categories::CP_INDEX,
            pop: PopCount::Unpredictable,
            push: 0,
            patch: Patch::CpIndex { at: 1, width: 2 },
        };
    }
}
