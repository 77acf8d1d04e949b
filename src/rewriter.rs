//! Strips unreachable methods from class files

use crate::classfile::{ClassFile, ClassFileError};
use crate::graph::MemberId;
use std::collections::HashSet;
use tracing::debug;

/// Rewrites a class so that only the given methods remain
///
/// The constant pool, fields, interfaces and attributes are carried over
/// untouched. Entries that only the dropped methods used stay in the pool.
pub struct ClassRewriter<'a> {
    keep: &'a HashSet<MemberId>,
}

impl<'a> ClassRewriter<'a> {
    pub fn new(keep: &'a HashSet<MemberId>) -> Self {
        Self { keep }
    }

    pub fn rewrite(&self, bytes: &[u8]) -> Result<Vec<u8>, ClassFileError> {
        let mut class = ClassFile::parse(bytes)?;
        let methods = std::mem::take(&mut class.methods);
        let total = methods.len();

        let mut kept = Vec::with_capacity(total);
        for method in methods {
            if self.keep.contains(&class.member_id(&method)?) {
                kept.push(method);
            }
        }

        debug!(
            "{}: keeping {} of {} methods",
            class.class_name()?,
            kept.len(),
            total
        );
        class.methods = kept;
        Ok(class.to_bytes())
    }
}
