// Constant pool model with modified UTF-8 handling

use super::reader::ByteReader;
use super::ClassFileError;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELD_REF: u8 = 9;
const TAG_METHOD_REF: u8 = 10;
const TAG_INTERFACE_METHOD_REF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// A single constant pool entry
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0 and the second slot of Long/Double entries
    Unusable,
    Utf8(Utf8Constant),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

/// A `CONSTANT_Utf8` entry
///
/// The stored bytes are written back unchanged. Lookups see a lossy decode,
/// since string literals may hold unpaired surrogates while names and
/// descriptors never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf8Constant {
    bytes: Vec<u8>,
    text: String,
}

impl Utf8Constant {
    pub fn new(text: &str) -> Self {
        Self {
            bytes: encode_modified_utf8(text),
            text: text.to_string(),
        }
    }

    /// Wrap modified UTF-8 bytes; `None` if the byte sequence is malformed
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let units = decode_modified_utf8(&bytes)?;
        Some(Self {
            text: String::from_utf16_lossy(&units),
            bytes,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// A resolved method or field reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub class: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

/// The constant pool of a class file, indexed from 1
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    pub(crate) fn parse(reader: &mut ByteReader<'_>) -> Result<Self, ClassFileError> {
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        let mut index: u16 = 1;
        while index < count {
            let tag = reader.u8()?;
            let constant = match tag {
                TAG_UTF8 => {
                    let len = reader.u16()? as usize;
                    let bytes = reader.bytes(len)?.to_vec();
                    Constant::Utf8(Utf8Constant::from_bytes(bytes).ok_or(ClassFileError::InvalidUtf8(index))?)
                }
                TAG_INTEGER => Constant::Integer(reader.u32()?),
                TAG_FLOAT => Constant::Float(reader.u32()?),
                TAG_LONG => Constant::Long(reader.u64()?),
                TAG_DOUBLE => Constant::Double(reader.u64()?),
                TAG_CLASS => Constant::Class { name_index: reader.u16()? },
                TAG_STRING => Constant::String { string_index: reader.u16()? },
                TAG_FIELD_REF => Constant::FieldRef {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_METHOD_REF => Constant::MethodRef {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name_index: reader.u16()?,
                    descriptor_index: reader.u16()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    reference_kind: reader.u8()?,
                    reference_index: reader.u16()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType { descriptor_index: reader.u16()? },
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap_method_attr_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap_method_attr_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_MODULE => Constant::Module { name_index: reader.u16()? },
                TAG_PACKAGE => Constant::Package { name_index: reader.u16()? },
                _ => return Err(ClassFileError::UnknownConstantTag { tag, index }),
            };

            let wide = constant.is_wide();
            entries.push(constant);
            index += 1;
            if wide {
                entries.push(Constant::Unusable);
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for constant in &self.entries {
            match constant {
                Constant::Unusable => {}
                Constant::Utf8(utf8) => {
                    out.push(TAG_UTF8);
                    out.extend_from_slice(&(utf8.bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(&utf8.bytes);
                }
                Constant::Integer(v) => write_u32(out, TAG_INTEGER, *v),
                Constant::Float(v) => write_u32(out, TAG_FLOAT, *v),
                Constant::Long(v) => {
                    out.push(TAG_LONG);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Double(v) => {
                    out.push(TAG_DOUBLE);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Class { name_index } => write_u16s(out, TAG_CLASS, &[*name_index]),
                Constant::String { string_index } => write_u16s(out, TAG_STRING, &[*string_index]),
                Constant::FieldRef { class_index, name_and_type_index } => {
                    write_u16s(out, TAG_FIELD_REF, &[*class_index, *name_and_type_index])
                }
                Constant::MethodRef { class_index, name_and_type_index } => {
                    write_u16s(out, TAG_METHOD_REF, &[*class_index, *name_and_type_index])
                }
                Constant::InterfaceMethodRef { class_index, name_and_type_index } => {
                    write_u16s(out, TAG_INTERFACE_METHOD_REF, &[*class_index, *name_and_type_index])
                }
                Constant::NameAndType { name_index, descriptor_index } => {
                    write_u16s(out, TAG_NAME_AND_TYPE, &[*name_index, *descriptor_index])
                }
                Constant::MethodHandle { reference_kind, reference_index } => {
                    out.push(TAG_METHOD_HANDLE);
                    out.push(*reference_kind);
                    out.extend_from_slice(&reference_index.to_be_bytes());
                }
                Constant::MethodType { descriptor_index } => {
                    write_u16s(out, TAG_METHOD_TYPE, &[*descriptor_index])
                }
                Constant::Dynamic { bootstrap_method_attr_index, name_and_type_index } => {
                    write_u16s(out, TAG_DYNAMIC, &[*bootstrap_method_attr_index, *name_and_type_index])
                }
                Constant::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => write_u16s(
                    out,
                    TAG_INVOKE_DYNAMIC,
                    &[*bootstrap_method_attr_index, *name_and_type_index],
                ),
                Constant::Module { name_index } => write_u16s(out, TAG_MODULE, &[*name_index]),
                Constant::Package { name_index } => write_u16s(out, TAG_PACKAGE, &[*name_index]),
            }
        }
    }

    /// Number of slots, as stored in `constant_pool_count`
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Get the constant at `index`
    pub fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(ClassFileError::BadConstantIndex(index)),
            Some(constant) => Ok(constant),
        }
    }

    /// Resolve a `CONSTANT_Utf8` entry
    pub fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(utf8) => Ok(utf8.as_str()),
            _ => Err(ClassFileError::WrongConstantKind { index, expected: "Utf8" }),
        }
    }

    /// Resolve a `CONSTANT_Class` entry to its internal name
    pub fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassFileError::WrongConstantKind { index, expected: "Class" }),
        }
    }

    /// Resolve a `CONSTANT_Methodref` or `CONSTANT_InterfaceMethodref` entry
    pub fn method_ref(&self, index: u16) -> Result<MemberRef<'_>, ClassFileError> {
        match self.get(index)? {
            Constant::MethodRef { class_index, name_and_type_index }
            | Constant::InterfaceMethodRef { class_index, name_and_type_index } => {
                let class = self.class_name(*class_index)?;
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(MemberRef { class, name, descriptor })
            }
            _ => Err(ClassFileError::WrongConstantKind { index, expected: "Methodref" }),
        }
    }

    fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.get(index)? {
            Constant::NameAndType { name_index, descriptor_index } => {
                Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?))
            }
            _ => Err(ClassFileError::WrongConstantKind { index, expected: "NameAndType" }),
        }
    }

    /// Append a constant and return its index
    pub fn push(&mut self, constant: Constant) -> u16 {
        let index = self.entries.len() as u16;
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        index
    }

    /// Find or append a `CONSTANT_Utf8` entry
    pub fn add_utf8(&mut self, text: &str) -> u16 {
        let existing = self
            .entries
            .iter()
            .position(|c| matches!(c, Constant::Utf8(t) if t.as_str() == text));
        match existing {
            Some(index) => index as u16,
            None => self.push(Constant::Utf8(Utf8Constant::new(text))),
        }
    }

    /// Find or append a `CONSTANT_Class` entry for an internal name
    pub fn add_class(&mut self, internal_name: &str) -> u16 {
        let name_index = self.add_utf8(internal_name);
        self.find_or_push(Constant::Class { name_index })
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.add_utf8(name);
        let descriptor_index = self.add_utf8(descriptor);
        self.find_or_push(Constant::NameAndType { name_index, descriptor_index })
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.add_class(class);
        let name_and_type_index = self.add_name_and_type(name, descriptor);
        self.find_or_push(Constant::MethodRef { class_index, name_and_type_index })
    }

    fn find_or_push(&mut self, constant: Constant) -> u16 {
        match self.entries.iter().position(|c| *c == constant) {
            Some(index) => index as u16,
            None => self.push(constant),
        }
    }
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

fn write_u32(out: &mut Vec<u8>, tag: u8, value: u32) {
    out.push(tag);
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_u16s(out: &mut Vec<u8>, tag: u8, values: &[u16]) {
    out.push(tag);
    for value in values {
        out.extend_from_slice(&value.to_be_bytes());
    }
}

/// Decode the JVM's modified UTF-8 (two-byte NUL, surrogate pairs as two
/// three-byte sequences) into UTF-16 units
fn decode_modified_utf8(bytes: &[u8]) -> Option<Vec<u16>> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)?;
            units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            units.push((((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16);
            i += 3;
        } else {
            return None;
        }
    }
    Some(units)
}

fn encode_modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
