//! Minimal JVM class file model
//!
//! Only the structure the shrinker needs is decoded: the constant pool,
//! class header, and member tables. Attribute bodies are kept as raw bytes
//! and written back untouched, so a parse followed by `to_bytes` reproduces
//! the input exactly.

pub mod code;
mod constant_pool;
pub mod descriptor;
mod error;
mod reader;

pub use constant_pool::{Constant, ConstantPool, MemberRef, Utf8Constant};
pub use error::ClassFileError;

use crate::graph::MemberId;
use reader::ByteReader;

pub const MAGIC: u32 = 0xCAFE_BABE;

/// Java 8 class files, the default for classes synthesised by [`ClassFile::new`]
pub const JAVA_8: u16 = 52;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;

/// A raw attribute: name index plus undecoded body
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

/// A field or method table entry
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Start an empty public class with the given internal names
    pub fn new(internal_name: &str, super_name: Option<&str>) -> Self {
        let mut constant_pool = ConstantPool::new();
        let this_class = constant_pool.add_class(internal_name);
        let super_class = super_name.map(|s| constant_pool.add_class(s)).unwrap_or(0);

        Self {
            minor_version: 0,
            major_version: JAVA_8,
            constant_pool,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Decode a class file
    pub fn parse(data: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = ByteReader::new(data);

        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;
        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;

        let interface_count = reader.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(reader.u16()?);
        }

        let fields = parse_members(&mut reader)?;
        let methods = parse_members(&mut reader)?;
        let attributes = parse_attributes(&mut reader)?;

        if reader.remaining() != 0 {
            return Err(ClassFileError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Encode the class file
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&self.minor_version.to_be_bytes());
        out.extend_from_slice(&self.major_version.to_be_bytes());
        self.constant_pool.write(&mut out);
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        write_members(&mut out, &self.fields);
        write_members(&mut out, &self.methods);
        write_attributes(&mut out, &self.attributes);
        out
    }

    /// Internal name of this class
    pub fn class_name(&self) -> Result<&str, ClassFileError> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Internal name of the superclass, `None` for `java/lang/Object`
    pub fn super_class_name(&self) -> Result<Option<&str>, ClassFileError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(self.super_class).map(Some)
    }

    /// Name and descriptor of a field or method entry
    pub fn member_id(&self, member: &MemberInfo) -> Result<MemberId, ClassFileError> {
        Ok(MemberId::new(
            self.constant_pool.utf8(member.name_index)?,
            self.constant_pool.utf8(member.descriptor_index)?,
        ))
    }

    /// Body of the method's `Code` attribute, if it has one
    pub fn code_attribute<'a>(&self, method: &'a MemberInfo) -> Result<Option<&'a [u8]>, ClassFileError> {
        for attribute in &method.attributes {
            if self.constant_pool.utf8(attribute.name_index)? == "Code" {
                return Ok(Some(&attribute.info));
            }
        }
        Ok(None)
    }

    /// Append a method. `code`, when given, becomes a `Code` attribute with
    /// no exception table.
    pub fn add_method(&mut self, access_flags: u16, name: &str, descriptor: &str, code: Option<&[u8]>) {
        let name_index = self.constant_pool.add_utf8(name);
        let descriptor_index = self.constant_pool.add_utf8(descriptor);

        let mut attributes = Vec::new();
        if let Some(code) = code {
            let mut info = Vec::with_capacity(code.len() + 12);
            info.extend_from_slice(&8u16.to_be_bytes()); // max_stack
            info.extend_from_slice(&8u16.to_be_bytes()); // max_locals
            info.extend_from_slice(&(code.len() as u32).to_be_bytes());
            info.extend_from_slice(code);
            info.extend_from_slice(&0u16.to_be_bytes()); // exception_table_length
            info.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
            attributes.push(AttributeInfo {
                name_index: self.constant_pool.add_utf8("Code"),
                info,
            });
        }

        self.methods.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }

    /// Append a field without attributes
    pub fn add_field(&mut self, access_flags: u16, name: &str, descriptor: &str) {
        let name_index = self.constant_pool.add_utf8(name);
        let descriptor_index = self.constant_pool.add_utf8(descriptor);
        self.fields.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
    }

    /// Names and descriptors of all methods, in declaration order
    pub fn method_ids(&self) -> Result<Vec<MemberId>, ClassFileError> {
        self.methods.iter().map(|m| self.member_id(m)).collect()
    }
}

fn parse_members(reader: &mut ByteReader<'_>) -> Result<Vec<MemberInfo>, ClassFileError> {
    let count = reader.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = reader.u16()?;
        let name_index = reader.u16()?;
        let descriptor_index = reader.u16()?;
        let attributes = parse_attributes(reader)?;
        members.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(members)
}

fn parse_attributes(reader: &mut ByteReader<'_>) -> Result<Vec<AttributeInfo>, ClassFileError> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = reader.u16()?;
        let len = reader.u32()? as usize;
        let info = reader.bytes(len)?.to_vec();
        attributes.push(AttributeInfo { name_index, info });
    }
    Ok(attributes)
}

fn write_members(out: &mut Vec<u8>, members: &[MemberInfo]) {
    out.extend_from_slice(&(members.len() as u16).to_be_bytes());
    for member in members {
        out.extend_from_slice(&member.access_flags.to_be_bytes());
        out.extend_from_slice(&member.name_index.to_be_bytes());
        out.extend_from_slice(&member.descriptor_index.to_be_bytes());
        write_attributes(out, &member.attributes);
    }
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[AttributeInfo]) {
    out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for attribute in attributes {
        out.extend_from_slice(&attribute.name_index.to_be_bytes());
        out.extend_from_slice(&(attribute.info.len() as u32).to_be_bytes());
        out.extend_from_slice(&attribute.info);
    }
}
