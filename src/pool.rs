//! Shared constant table and the typed index handles that reference it
//!
//! Indices are 1-based as in the container format. Handles carry an
//! expected tag that is fixed once, the first time the handle learns what
//! it points at; later resolutions are validated against it. Handle values
//! change only through the remap broadcast, never by direct assignment
//! during an edit.

use crate::error::{Error, Result};
use crate::patch::RemapCpIndex;

/// Entry tag bytes as stored in the serialized table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConstantTag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    FieldRef = 9,
    MethodRef = 10,
    InterfaceMethodRef = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    InvokeDynamic = 18,
}

impl ConstantTag {
    pub fn tag_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
}

impl Constant {
    pub fn tag(&self) -> ConstantTag {
        match self {
            Constant::Utf8(_) => ConstantTag::Utf8,
            Constant::Integer(_) => ConstantTag::Integer,
            Constant::Float(_) => ConstantTag::Float,
            Constant::Long(_) => ConstantTag::Long,
            Constant::Double(_) => ConstantTag::Double,
            Constant::Class(_) => ConstantTag::Class,
            Constant::String(_) => ConstantTag::String,
            Constant::FieldRef(_, _) => ConstantTag::FieldRef,
            Constant::MethodRef(_, _) => ConstantTag::MethodRef,
            Constant::InterfaceMethodRef(_, _) => ConstantTag::InterfaceMethodRef,
            Constant::NameAndType(_, _) => ConstantTag::NameAndType,
            Constant::MethodHandle(_, _) => ConstantTag::MethodHandle,
            Constant::MethodType(_) => ConstantTag::MethodType,
            Constant::InvokeDynamic(_, _) => ConstantTag::InvokeDynamic,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.tag().tag_byte()];
        match self {
            Constant::Utf8(value) => {
                let utf8_bytes = value.as_bytes();
                bytes.extend_from_slice(&(utf8_bytes.len() as u16).to_be_bytes());
                bytes.extend_from_slice(utf8_bytes);
            }
            Constant::Integer(value) => bytes.extend_from_slice(&value.to_be_bytes()),
            Constant::Float(value) => bytes.extend_from_slice(&value.to_be_bytes()),
            Constant::Long(value) => bytes.extend_from_slice(&value.to_be_bytes()),
            Constant::Double(value) => bytes.extend_from_slice(&value.to_be_bytes()),
            Constant::Class(name_index)
            | Constant::String(name_index)
            | Constant::MethodType(name_index) => {
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::FieldRef(a, b)
            | Constant::MethodRef(a, b)
            | Constant::InterfaceMethodRef(a, b)
            | Constant::NameAndType(a, b)
            | Constant::InvokeDynamic(a, b) => {
                bytes.extend_from_slice(&a.to_be_bytes());
                bytes.extend_from_slice(&b.to_be_bytes());
            }
            Constant::MethodHandle(kind, reference_index) => {
                bytes.push(*kind);
                bytes.extend_from_slice(&reference_index.to_be_bytes());
            }
        }
        bytes
    }
}

impl RemapCpIndex for Constant {
    /// Entries reference each other by index, so the broadcast reaches
    /// into the table itself
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        let remap = |idx: &mut u16| {
            if *idx == from {
                *idx = to;
            }
        };
        match self {
            Constant::Utf8(_)
            | Constant::Integer(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_) => {}
            Constant::Class(i) | Constant::String(i) | Constant::MethodType(i) => remap(i),
            Constant::FieldRef(a, b)
            | Constant::MethodRef(a, b)
            | Constant::InterfaceMethodRef(a, b)
            | Constant::NameAndType(a, b)
            | Constant::InvokeDynamic(a, b) => {
                remap(a);
                remap(b);
            }
            Constant::MethodHandle(_, i) => remap(i),
        }
    }
}

/// The shared constant table, indexed from 1
#[derive(Debug, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries actually stored
    pub fn len(&self) -> u16 {
        self.constants.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// An index value guaranteed not to be in use, for the swap protocol
    pub fn scratch_index(&self) -> u16 {
        self.len() + 1
    }

    pub fn add(&mut self, constant: Constant) -> u16 {
        self.constants.push(constant);
        self.constants.len() as u16
    }

    pub fn add_utf8(&mut self, value: &str) -> u16 {
        self.add(Constant::Utf8(value.to_string()))
    }

    pub fn add_class(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        self.add(Constant::Class(name_index))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.add_utf8(name);
        let descriptor_index = self.add_utf8(descriptor);
        self.add(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.add_class(class);
        let name_and_type_index = self.add_name_and_type(name, descriptor);
        self.add(Constant::FieldRef(class_index, name_and_type_index))
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.add_class(class);
        let name_and_type_index = self.add_name_and_type(name, descriptor);
        self.add(Constant::MethodRef(class_index, name_and_type_index))
    }

    pub fn add_string(&mut self, value: &str) -> u16 {
        let utf8_index = self.add_utf8(value);
        self.add(Constant::String(utf8_index))
    }

    pub fn add_integer(&mut self, value: i32) -> u16 {
        self.add(Constant::Integer(value))
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        if index == 0 || index > self.len() {
            return Err(Error::format(
                index as usize,
                format!("constant index {index} outside table of {} entries", self.len()),
            ));
        }
        Ok(&self.constants[index as usize - 1])
    }

    /// Exchange the entries at `i` and `j`. The caller is responsible for
    /// remapping every index handle that referenced them (the 3-pass swap
    /// broadcast); this only moves the entries themselves.
    pub fn swap(&mut self, i: u16, j: u16) -> Result<()> {
        self.get(i)?;
        self.get(j)?;
        self.constants.swap(i as usize - 1, j as usize - 1);
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(self.constants.len() as u16 + 1).to_be_bytes());
        for constant in &self.constants {
            bytes.extend_from_slice(&constant.to_bytes());
        }
        bytes
    }
}

impl RemapCpIndex for ConstantPool {
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        for constant in self.constants.iter_mut() {
            constant.remap_cp_index(from, to);
        }
    }
}

/// A typed handle into the constant table.
///
/// Parsing creates handles before the table is fully read, so a handle
/// starts without an expected tag and has it fixed the first time the
/// referenced entry's type becomes known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpIndex {
    index: u16,
    expected: Option<ConstantTag>,
}

impl CpIndex {
    pub fn uninitialized(index: u16) -> Self {
        CpIndex {
            index,
            expected: None,
        }
    }

    pub fn new(index: u16, expected: ConstantTag) -> Self {
        CpIndex {
            index,
            expected: Some(expected),
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn is_initialized(&self) -> bool {
        self.expected.is_some()
    }

    /// Fix the expected tag. The tag can be set once; changing an already
    /// fixed tag means two parts of the parse disagree about the handle.
    pub fn initialize(&mut self, tag: ConstantTag) -> Result<()> {
        match self.expected {
            None => {
                self.expected = Some(tag);
                Ok(())
            }
            Some(existing) if existing == tag => Ok(()),
            Some(existing) => Err(Error::State {
                offset: self.index as usize,
                expected: existing.tag_byte(),
                found: tag.tag_byte(),
            }),
        }
    }

    /// Look up the referenced entry, checking its tag against the
    /// handle's expected tag
    pub fn resolve<'p>(&self, pool: &'p ConstantPool) -> Result<&'p Constant> {
        let constant = pool.get(self.index)?;
        if let Some(expected) = self.expected {
            let found = constant.tag();
            if found != expected {
                return Err(Error::State {
                    offset: self.index as usize,
                    expected: expected.tag_byte(),
                    found: found.tag_byte(),
                });
            }
        }
        Ok(constant)
    }
}

impl RemapCpIndex for CpIndex {
    fn remap_cp_index(&mut self, from: u16, to: u16) {
        if self.index == from {
            self.index = to;
        }
    }
}
