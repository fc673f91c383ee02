//! Tcl word quoting.

use crate::ports::CoreError;

/// Characters that change the meaning of a bare Tcl word.
const METACHARACTERS: &[char] = &['"', '\\', '$', '[', ']', '{', '}', ';'];

/// Wrap `text` in double quotes, escaping characters Tcl substitutes inside
/// them.
///
/// Backslashes are escaped rather than rewritten, so Windows paths survive.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '$' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Validate `value` as a bare Tcl word.
///
/// Names, keys and part numbers go through here: they must be non-empty and
/// free of whitespace and metacharacters.
pub fn bare_word<'a>(field: &str, value: &'a str) -> Result<&'a str, CoreError> {
    if value.is_empty() {
        return Err(CoreError::Validation(format!("{field} cannot be empty")));
    }
    if let Some(c) = value
        .chars()
        .find(|c| c.is_whitespace() || METACHARACTERS.contains(c))
    {
        return Err(CoreError::Validation(format!(
            "{field} contains invalid character {c:?}: {value}"
        )));
    }
    Ok(value)
}

/// Emit `value` bare when that is safe, quoted otherwise.
pub fn word(value: &str) -> String {
    if bare_word("value", value).is_ok() {
        value.to_string()
    } else {
        quote(value)
    }
}
