//! Structural container nodes that own constant handles and bytecode
//!
//! A deliberately small tree: enough structure for edits that touch the
//! constant table to reach every place an index can hide, including the
//! operands embedded in raw bytecode. Full container (de)serialization is
//! out of scope; these nodes exist so the remap broadcast has a real tree
//! to traverse.

use crate::error::Result;
use crate::patch::{self, RemapCpIndex};
use crate::pool::{ConstantPool, CpIndex};

#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `None` catches everything
    pub catch_type: Option<CpIndex>,
}

impl RemapCpIndex for ExceptionHandler {
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        self.catch_type.remap_cp_index(from, to);
    }
}

/// A method body: the raw instruction stream plus its handler table
#[derive(Debug, Clone, Default)]
pub struct CodeAttr {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl RemapCpIndex for CodeAttr {
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        // indices hide inside instruction operands too
        patch::remap_cp_indices_in_code(&mut self.code, from, to);
        self.exception_handlers.remap_cp_index(from, to);
    }
}

#[derive(Debug, Clone)]
pub struct FieldNode {
    pub access_flags: u16,
    pub name: CpIndex,
    pub descriptor: CpIndex,
}

impl RemapCpIndex for FieldNode {
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        self.name.remap_cp_index(from, to);
        self.descriptor.remap_cp_index(from, to);
    }
}

#[derive(Debug, Clone)]
pub struct MethodNode {
    pub access_flags: u16,
    pub name: CpIndex,
    pub descriptor: CpIndex,
    pub code: Option<CodeAttr>,
}

impl RemapCpIndex for MethodNode {
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        self.name.remap_cp_index(from, to);
        self.descriptor.remap_cp_index(from, to);
        self.code.remap_cp_index(from, to);
    }
}

/// Root of the node tree: the constant table plus everything that
/// references it
#[derive(Debug, Default)]
pub struct ClassNode {
    pub pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: Option<CpIndex>,
    pub super_class: Option<CpIndex>,
    pub interfaces: Vec<CpIndex>,
    pub fields: Vec<FieldNode>,
    pub methods: Vec<MethodNode>,
}

impl RemapCpIndex for ClassNode {
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        self.pool.remap_cp_index(from, to);
        self.this_class.remap_cp_index(from, to);
        self.super_class.remap_cp_index(from, to);
        self.interfaces.remap_cp_index(from, to);
        self.fields.remap_cp_index(from, to);
        self.methods.remap_cp_index(from, to);
    }
}

impl ClassNode {
    /// Exchange the constant table entries at `i` and `j` and rewrite every
    /// handle and bytecode operand in the class to match, via the 3-pass
    /// scratch-index protocol
    pub fn swap_constants(&mut self, i: u16, j: u16) -> Result<()> {
        self.pool.swap(i, j)?;
        let scratch = self.pool.scratch_index();
        patch::swap_cp_indices(self, i, j, scratch);
        Ok(())
    }
}
