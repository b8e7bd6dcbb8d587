/// Escapes a user-provided value for Lucene-like query syntaxes.
///
/// All Lucene special characters are escaped so ingredient names such as
/// `"Amoxicillin/Clavulanate"` cannot change query semantics.
pub(crate) fn escape_lucene_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '+' | '-' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~' | '*'
            | '?' | ':' | '/' | '&' | '|' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Builds `field:"value"` clauses for every field/value pair, OR-combined.
///
/// Blank values are skipped; an empty string is returned when nothing remains.
pub(crate) fn or_phrase_query(fields: &[&str], values: &[String]) -> String {
    let mut clauses: Vec<String> = Vec::new();
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        let escaped = escape_lucene_value(value);
        for field in fields {
            clauses.push(format!("{field}:\"{escaped}\""));
        }
    }
    clauses.join(" OR ")
}
