//! Source text helpers for the bundler.

/// Strips the UTF-8 BOM (U+FEFF) from the beginning of text if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

/// Wraps JSON source as an ES module exporting the parsed value.
pub fn transform_json_source(source: &str) -> Result<String, anyhow::Error> {
    // A JSON string literal is also a valid JavaScript string literal
    let literal = serde_json::to_string(source)?;
    Ok(format!("export default JSON.parse({literal});"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{FEFF}hello"), "hello");
        assert_eq!(strip_bom("hello"), "hello");
    }

    #[test]
    fn test_transform_json_source() {
        let result = transform_json_source("{\"key\": \"value\"}\n").unwrap();
        assert_eq!(
            result,
            r#"export default JSON.parse("{\"key\": \"value\"}\n");"#
        );
    }
}
