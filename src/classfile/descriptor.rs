//! Field and method descriptor parsing

use super::ClassFileError;

/// Split a method descriptor into its parameter field descriptors
///
/// `(ILjava/lang/String;[J)V` yields `["I", "Ljava/lang/String;", "[J"]`.
pub fn parameter_types(descriptor: &str) -> Result<Vec<&str>, ClassFileError> {
    let (params, _) = split_method_descriptor(descriptor)?;
    let mut types = Vec::new();
    let mut rest = params;
    while !rest.is_empty() {
        let len = field_type_length(rest).ok_or_else(|| invalid(descriptor))?;
        types.push(&rest[..len]);
        rest = &rest[len..];
    }
    Ok(types)
}

/// The return descriptor of a method descriptor (`V` for void)
pub fn return_type(descriptor: &str) -> Result<&str, ClassFileError> {
    let (_, ret) = split_method_descriptor(descriptor)?;
    if ret == "V" || field_type_length(ret) == Some(ret.len()) {
        Ok(ret)
    } else {
        Err(invalid(descriptor))
    }
}

/// Human-readable Java type for a field descriptor, e.g. `java.lang.String[]`
pub fn java_type_name(field_descriptor: &str) -> String {
    let dims = field_descriptor.chars().take_while(|&c| c == '[').count();
    let element = &field_descriptor[dims..];
    let base = match element {
        "V" => "void".to_string(),
        "Z" => "boolean".to_string(),
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "S" => "short".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "F" => "float".to_string(),
        "D" => "double".to_string(),
        _ => element
            .strip_prefix('L')
            .and_then(|e| e.strip_suffix(';'))
            .unwrap_or(element)
            .replace('/', "."),
    };
    format!("{}{}", base, "[]".repeat(dims))
}

/// Java-style signature of a method, e.g. `void run(java.lang.String,int)`
pub fn java_method_signature(name: &str, descriptor: &str) -> Result<String, ClassFileError> {
    let params: Vec<String> = parameter_types(descriptor)?
        .into_iter()
        .map(java_type_name)
        .collect();
    Ok(format!(
        "{} {}({})",
        java_type_name(return_type(descriptor)?),
        name,
        params.join(",")
    ))
}

fn split_method_descriptor(descriptor: &str) -> Result<(&str, &str), ClassFileError> {
    descriptor
        .strip_prefix('(')
        .and_then(|d| d.split_once(')'))
        .ok_or_else(|| invalid(descriptor))
}

/// Length of the single field type at the start of `desc`
fn field_type_length(desc: &str) -> Option<usize> {
    let dims = desc.bytes().take_while(|&b| b == b'[').count();
    let element = desc.as_bytes().get(dims)?;
    let element_len = match element {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => 1,
        b'L' => desc[dims..].find(';')? + 1,
        _ => return None,
    };
    Some(dims + element_len)
}

fn invalid(descriptor: &str) -> ClassFileError {
    ClassFileError::InvalidDescriptor(descriptor.to_string())
}
