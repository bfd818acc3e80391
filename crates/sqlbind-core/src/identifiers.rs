//! SQL identifier quoting and sanitization utilities.

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
/// This function is safe against SQL injection for any input string.
///
/// # Examples
///
/// ```
/// use sqlbind_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Sanitize a SQL identifier by removing non-alphanumeric/underscore
/// characters.
///
/// Used for catalog, schema and table names that end up in statements
/// unquoted. Strips rather than erroring; an input of only invalid
/// characters yields an empty string.
///
/// # Examples
///
/// ```
/// use sqlbind_core::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("people"), "people");
/// assert_eq!(sanitize_identifier("people;DROP TABLE--"), "peopleDROPTABLE");
/// ```
#[inline]
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
