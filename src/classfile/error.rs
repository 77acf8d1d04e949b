use thiserror::Error;

/// Errors raised while decoding or encoding a class file
#[derive(Error, Debug)]
pub enum ClassFileError {
    #[error("Unexpected end of class data at offset {0}")]
    Truncated(usize),
    #[error("Bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("Unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },
    #[error("Invalid constant pool index {0}")]
    BadConstantIndex(u16),
    #[error("Constant #{index} is not a {expected}")]
    WrongConstantKind { index: u16, expected: &'static str },
    #[error("Invalid modified UTF-8 in constant #{0}")]
    InvalidUtf8(u16),
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Malformed bytecode at offset {offset}: {reason}")]
    MalformedCode { offset: usize, reason: &'static str },
    #[error("{0} trailing bytes after class data")]
    TrailingBytes(usize),
}
