//! Shared helpers for building class files and streams on disk

#![allow(dead_code)]

use class_shrinker::classfile::{ClassFile, ACC_PUBLIC};
use class_shrinker::shrinker::{KeepRule, KeepRules};
use class_shrinker::{ClassStream, MemberId, ShrinkType};
use std::fs;
use std::path::{Path, PathBuf};

/// A method and the `(class, name, descriptor)` targets it calls through
/// `invokevirtual`
pub struct Method<'a> {
    pub name: &'a str,
    pub descriptor: &'a str,
    pub calls: &'a [(&'a str, &'a str, &'a str)],
}

pub fn method<'a>(name: &'a str, descriptor: &'a str, calls: &'a [(&'a str, &'a str, &'a str)]) -> Method<'a> {
    Method { name, descriptor, calls }
}

/// Encode a class whose methods call the given targets
pub fn class_bytes(name: &str, methods: &[Method<'_>]) -> Vec<u8> {
    let mut class = ClassFile::new(name, Some("java/lang/Object"));
    for m in methods {
        let mut code = Vec::new();
        for (owner, target, descriptor) in m.calls {
            let index = class.constant_pool.add_method_ref(owner, target, descriptor);
            code.push(0x2a); // aload_0
            code.push(0xb6); // invokevirtual
            code.extend_from_slice(&index.to_be_bytes());
        }
        code.push(0xb1); // return
        class.add_method(ACC_PUBLIC, m.name, m.descriptor, Some(&code));
    }
    class.to_bytes()
}

/// Write a class below `root` at the path matching its internal name
pub fn write_class(root: &Path, name: &str, methods: &[Method<'_>]) -> PathBuf {
    let path = root.join(format!("{}.class", name));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, class_bytes(name, methods)).unwrap();
    path
}

/// Method names left in a written class, in declaration order
pub fn method_names(path: &Path) -> Vec<String> {
    let class = ClassFile::parse(&fs::read(path).unwrap()).unwrap();
    class
        .method_ids()
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect()
}

/// Keep rule matching exactly one method by class and name
pub fn keep_method(class: &'static str, name: &'static str) -> Box<dyn KeepRule> {
    Box::new(move |c: &str, m: &MemberId| c == class && m.name == name)
}

pub fn keep_rules(rules: Vec<(ShrinkType, Box<dyn KeepRule>)>) -> KeepRules {
    rules.into_iter().collect()
}

/// Stream over every class file under `root`
pub fn stream(name: &str, root: &Path, output: &Path, files: Vec<PathBuf>) -> ClassStream {
    ClassStream::new(name, root)
        .with_files(files)
        .with_output(ShrinkType::Full, output)
}
