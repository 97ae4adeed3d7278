/// Characters engines use to quote identifiers: MySQL backticks, SQL Server
/// brackets and ANSI double quotes.
const QUOTE_CHARS: [char; 4] = ['`', '"', '[', ']'];

/// Strip identifier quoting so every engine reports the same bare name.
///
/// Idempotent: `unquote(unquote(x)) == unquote(x)`.
pub fn unquote(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !QUOTE_CHARS.contains(c)).collect();
    stripped.trim().to_string()
}

/// Quote an identifier for interpolation into SQLite/ANSI statements.
pub fn quote_ansi(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_styles() {
        assert_eq!(unquote("`user`"), "user");
        assert_eq!(unquote("[user]"), "user");
        assert_eq!(unquote("\"user\""), "user");
        assert_eq!(unquote("  id "), "id");
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn test_unquote_is_idempotent() {
        for name in ["`a`", "[b c]", "\"d\"", " e ", "f", "\"\"g\"\""] {
            let once = unquote(name);
            assert_eq!(unquote(&once), once);
            assert!(!once.contains(QUOTE_CHARS));
        }
    }

    #[test]
    fn test_quote_ansi_escapes() {
        assert_eq!(quote_ansi("user"), "\"user\"");
        assert_eq!(quote_ansi("we\"ird"), "\"we\"\"ird\"");
    }
}
