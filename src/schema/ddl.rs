//! DDL parser for the embedded engine
//!
//! SQLite keeps no queryable column catalog we rely on; the only contract is
//! the statement text stored in `sqlite_master.sql`. This module tokenizes that
//! text and reads back columns and indexes.
//!
//! Supported subset:
//! - `CREATE TABLE name ( column-def | table-constraint, ... )`
//! - `CREATE [UNIQUE] INDEX [IF NOT EXISTS] [schema.]name ON table ( key, ... )`
//!
//! The tokenizer understands `"..."`, `` `...` ``, `[...]` identifiers, `'...'`
//! literals (doubled-quote escapes), balanced parenthesis groups and both
//! comment styles, so commas inside `real(9,3)` or `CHECK (a IN (1, 2))` never
//! split a definition.

use crate::schema::identifier::unquote;
use crate::schema::model::{Column, Index};

pub type ParseResult<T> = std::result::Result<T, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: keyword, unquoted identifier or number
    Word,
    /// Quoted identifier
    Quoted,
    /// String literal
    Literal,
    /// Balanced `( ... )`, raw text includes the parentheses
    Group,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text exactly as written
    pub raw: String,
}

impl Token {
    fn new(kind: TokenKind, chars: &[char]) -> Self {
        Self {
            kind,
            raw: chars.iter().collect(),
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.raw.eq_ignore_ascii_case(keyword)
    }

    pub fn is_symbol(&self, symbol: char) -> bool {
        self.kind == TokenKind::Symbol && self.raw.starts_with(symbol)
    }

    /// Identifier value with quoting removed.
    pub fn ident(&self) -> Option<String> {
        match self.kind {
            TokenKind::Word | TokenKind::Quoted => Some(unquote(&self.raw)),
            TokenKind::Literal => Some(self.raw.trim_matches('\'').to_string()),
            TokenKind::Group | TokenKind::Symbol => None,
        }
    }

    /// Text between the parentheses of a group.
    pub fn group_inner(&self) -> Option<&str> {
        if self.kind == TokenKind::Group {
            Some(&self.raw[1..self.raw.len() - 1])
        } else {
            None
        }
    }
}

/// Split SQL text into tokens. Whitespace and comments are dropped.
pub fn tokenize(sql: &str) -> ParseResult<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if let Some(end) = comment_end(&chars, i) {
            i = end;
            continue;
        }

        match c {
            '"' | '`' | '[' => {
                let end = scan_quoted(&chars, i)?;
                tokens.push(Token::new(TokenKind::Quoted, &chars[i..=end]));
                i = end + 1;
            }
            '\'' => {
                let end = scan_quoted(&chars, i)?;
                tokens.push(Token::new(TokenKind::Literal, &chars[i..=end]));
                i = end + 1;
            }
            '(' => {
                let end = scan_group(&chars, i)?;
                tokens.push(Token::new(TokenKind::Group, &chars[i..=end]));
                i = end + 1;
            }
            ')' => return Err(format!("unbalanced ')' at offset {}", i)),
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() {
                    let ch = chars[i];
                    // keep decimals like 1.5 in one word
                    let decimal_point = ch == '.'
                        && chars[start..i].iter().all(|d| d.is_ascii_digit())
                        && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit());
                    if is_word_char(ch) || decimal_point {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::new(TokenKind::Word, &chars[start..i]));
            }
            _ => {
                tokens.push(Token::new(TokenKind::Symbol, &chars[i..=i]));
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// Position just past the comment starting at `start`, if one starts there.
/// An unterminated block comment runs to the end of the text.
fn comment_end(chars: &[char], start: usize) -> Option<usize> {
    match (chars[start], chars.get(start + 1).copied()) {
        ('-', Some('-')) => {
            let mut j = start + 2;
            while j < chars.len() && chars[j] != '\n' {
                j += 1;
            }
            Some(j)
        }
        ('/', Some('*')) => {
            let mut j = start + 2;
            while j < chars.len() && !(chars[j] == '*' && chars.get(j + 1) == Some(&'/')) {
                j += 1;
            }
            Some((j + 2).min(chars.len()))
        }
        _ => None,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Index of the character closing the quoted section opened at `start`.
fn scan_quoted(chars: &[char], start: usize) -> ParseResult<usize> {
    let close = match chars[start] {
        '[' => ']',
        other => other,
    };
    let escapable = close != ']';

    let mut j = start + 1;
    while j < chars.len() {
        if chars[j] == close {
            if escapable && chars.get(j + 1) == Some(&close) {
                j += 2;
                continue;
            }
            return Ok(j);
        }
        j += 1;
    }

    Err(format!("unterminated {} quote at offset {}", chars[start], start))
}

/// Index of the `)` matching the `(` at `start`.
fn scan_group(chars: &[char], start: usize) -> ParseResult<usize> {
    let mut depth = 0usize;
    let mut j = start;
    while j < chars.len() {
        if let Some(end) = comment_end(chars, j) {
            j = end;
            continue;
        }
        match chars[j] {
            '"' | '`' | '[' | '\'' => {
                j = scan_quoted(chars, j)?;
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(j);
                }
            }
            _ => {}
        }
        j += 1;
    }

    Err(format!("unbalanced '(' at offset {}", start))
}

/// Split a token stream on commas that are not inside a group.
pub fn split_top_level(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut parts = vec![Vec::new()];
    for token in tokens {
        if token.is_symbol(',') {
            parts.push(Vec::new());
        } else if let Some(current) = parts.last_mut() {
            current.push(token);
        }
    }
    parts.retain(|p| !p.is_empty());
    parts
}

/// Keywords that end the type name of a column definition.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "NOT",
    "NULL",
    "UNIQUE",
    "CHECK",
    "DEFAULT",
    "COLLATE",
    "REFERENCES",
    "GENERATED",
    "AS",
    "AUTOINCREMENT",
];

fn is_constraint_keyword(token: &Token) -> bool {
    CONSTRAINT_KEYWORDS.iter().any(|kw| token.is_keyword(kw))
}

/// Parse the column list of a `CREATE TABLE` statement, in declaration order.
pub fn parse_create_table(sql: &str) -> ParseResult<Vec<Column>> {
    let tokens = tokenize(sql)?;
    let body = tokens
        .iter()
        .find_map(|t| t.group_inner())
        .ok_or_else(|| "no column definition list found".to_string())?;

    let mut columns: Vec<Column> = Vec::new();
    let mut primary_key: Vec<String> = Vec::new();

    for fragment in split_top_level(tokenize(body)?) {
        let mut rest: &[Token] = &fragment;

        // CONSTRAINT <name> introduces a table-level constraint
        if rest[0].is_keyword("CONSTRAINT") {
            rest = rest.get(2..).unwrap_or(&[]);
            if rest.is_empty() {
                return Err("CONSTRAINT without a body".to_string());
            }
        }

        let head = &rest[0];
        if head.is_keyword("PRIMARY") && rest.get(1).is_some_and(|t| t.is_keyword("KEY")) {
            let group = rest
                .iter()
                .find_map(|t| t.group_inner())
                .ok_or_else(|| "PRIMARY KEY clause without a column list".to_string())?;
            primary_key.extend(key_columns(group)?);
            continue;
        }

        if head.is_keyword("UNIQUE") || head.is_keyword("CHECK") || head.is_keyword("FOREIGN") {
            continue;
        }

        if rest.len() < fragment.len() {
            // named constraint of a kind we do not track
            continue;
        }

        columns.push(parse_column_definition(rest)?);
    }

    for name in primary_key {
        if let Some(column) = columns.iter_mut().find(|c| c.name == name) {
            column.is_primary_key = true;
        }
    }

    Ok(columns)
}

fn parse_column_definition(tokens: &[Token]) -> ParseResult<Column> {
    let name = tokens[0]
        .ident()
        .ok_or_else(|| format!("unexpected '{}' where a column name was expected", tokens[0].raw))?;

    let mut i = 1;
    let mut type_words: Vec<&str> = Vec::new();
    while let Some(token) = tokens.get(i) {
        if token.kind != TokenKind::Word || is_constraint_keyword(token) {
            break;
        }
        type_words.push(&token.raw);
        i += 1;
    }

    let mut data_type = type_words.join(" ");
    if !data_type.is_empty() {
        if let Some(args) = tokens.get(i).and_then(|t| t.group_inner()) {
            let args: Vec<&str> = args.split(',').map(str::trim).collect();
            data_type.push('(');
            data_type.push_str(&args.join(","));
            data_type.push(')');
            i += 1;
        }
    }

    let mut column = Column::new(name, data_type);

    while let Some(token) = tokens.get(i) {
        if token.is_keyword("PRIMARY") {
            column.is_primary_key = true;
        } else if token.is_keyword("AUTOINCREMENT") {
            column.is_auto_increment = true;
        } else if token.is_keyword("NOT") && tokens.get(i + 1).is_some_and(|t| t.is_keyword("NULL")) {
            column.nullable = false;
            i += 1;
        } else if token.is_keyword("NULL") {
            column.nullable = true;
        } else if token.is_keyword("DEFAULT") {
            let (value, consumed) = default_value(&tokens[i + 1..])
                .ok_or_else(|| format!("DEFAULT without a value for column {}", column.name))?;
            column.default = Some(value);
            i += consumed;
        }
        i += 1;
    }

    Ok(column)
}

/// Raw default expression and the number of tokens it spans.
fn default_value(tokens: &[Token]) -> Option<(String, usize)> {
    let first = tokens.first()?;
    if first.is_symbol('-') || first.is_symbol('+') {
        let number = tokens.get(1)?;
        return Some((format!("{}{}", first.raw, number.raw), 2));
    }
    Some((first.raw.clone(), 1))
}

/// Column names of an index key list such as `"a" ASC, b COLLATE nocase`.
///
/// Expression entries (`lower(b)`, `(a + 1)`) do not name a column and are skipped.
pub fn key_columns(list: &str) -> ParseResult<Vec<String>> {
    let mut columns = Vec::new();
    for entry in split_top_level(tokenize(list)?) {
        let first = &entry[0];
        let is_call = entry.get(1).is_some_and(|t| t.kind == TokenKind::Group);
        let is_column = matches!(first.kind, TokenKind::Word | TokenKind::Quoted);
        let is_cast = entry.get(1).is_some_and(|t| t.is_symbol(':'));

        if !is_column || is_call || is_cast {
            continue;
        }
        if let Some(name) = first.ident() {
            columns.push(name);
        }
    }
    Ok(columns)
}

/// Key columns of an index definition: the first group after `ON <table>`.
pub fn index_key_columns(definition: &str) -> ParseResult<Vec<String>> {
    let tokens = tokenize(definition)?;
    let on = tokens
        .iter()
        .position(|t| t.is_keyword("ON"))
        .ok_or_else(|| "index definition has no ON clause".to_string())?;
    let group = tokens[on..]
        .iter()
        .find_map(|t| t.group_inner())
        .ok_or_else(|| "index definition has no key list".to_string())?;
    key_columns(group)
}

/// Parse a `CREATE [UNIQUE] INDEX` statement.
pub fn parse_create_index(sql: &str) -> ParseResult<Index> {
    let tokens = tokenize(sql)?;
    let index_pos = tokens
        .iter()
        .position(|t| t.is_keyword("INDEX"))
        .ok_or_else(|| "not a CREATE INDEX statement".to_string())?;
    let is_unique = tokens[..index_pos].iter().any(|t| t.is_keyword("UNIQUE"));

    let on_pos = tokens
        .iter()
        .skip(index_pos)
        .position(|t| t.is_keyword("ON"))
        .map(|p| p + index_pos)
        .ok_or_else(|| "index definition has no ON clause".to_string())?;

    let mut name_tokens = &tokens[index_pos + 1..on_pos];
    if name_tokens.len() >= 3
        && name_tokens[0].is_keyword("IF")
        && name_tokens[1].is_keyword("NOT")
        && name_tokens[2].is_keyword("EXISTS")
    {
        name_tokens = &name_tokens[3..];
    }

    // schema-qualified names keep only the last part
    let name = name_tokens
        .iter()
        .rev()
        .find_map(|t| if t.is_symbol('.') { None } else { t.ident() })
        .ok_or_else(|| "index has no name".to_string())?;

    let mut index = Index::new(name, is_unique);
    index.columns = index_key_columns(sql)?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_TABLE: &str = r#"CREATE TABLE "user" (
  "id" integer PRIMARY KEY AUTOINCREMENT,
  "desc" text,
  "income" real(9,3),
  "attrs" blob
)"#;

    #[test]
    fn test_tokenize_groups_and_quotes() {
        let tokens = tokenize(r#"a "b c" [d] `e` 'it''s' (1, (2)) ;"#).unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Word,
                TokenKind::Quoted,
                TokenKind::Quoted,
                TokenKind::Quoted,
                TokenKind::Literal,
                TokenKind::Group,
                TokenKind::Symbol,
            ]
        );
        assert_eq!(tokens[4].raw, "'it''s'");
        assert_eq!(tokens[5].group_inner(), Some("1, (2)"));
    }

    #[test]
    fn test_tokenize_skips_comments() {
        let tokens = tokenize("a -- note, with comma\n/* b, c */ d").unwrap();
        let raw: Vec<&str> = tokens.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raw, vec!["a", "d"]);
    }

    #[test]
    fn test_comments_inside_groups() {
        let sql = "CREATE TABLE t (\n a integer, -- the user's id\n b text /* note :) */,\n c blob -- (\n)";
        let columns = parse_create_table(sql).unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(columns[1].data_type, "text");
        assert_eq!(columns[2].data_type, "blob");

        let tokens = tokenize("(a /* ) */ , 'x')").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Group);
    }

    #[test]
    fn test_unterminated_block_comment() {
        let tokens = tokenize("a /* open").unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokenize("(a /* )").is_err());
    }

    #[test]
    fn test_tokenize_rejects_unbalanced() {
        assert!(tokenize("CREATE TABLE t (a int").is_err());
        assert!(tokenize("a int)").is_err());
        assert!(tokenize("\"open").is_err());
    }

    #[test]
    fn test_parse_user_fixture() {
        let columns = parse_create_table(USER_TABLE).unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "desc", "income", "attrs"]);

        let id = &columns[0];
        assert_eq!(id.data_type, "integer");
        assert!(id.is_primary_key);
        assert!(id.is_auto_increment);

        assert_eq!(columns[2].data_type, "real(9,3)");
        assert!(columns[1].nullable);
        assert!(!columns[1].is_primary_key);
    }

    #[test]
    fn test_composite_primary_key_clause() {
        let sql = "CREATE TABLE pair (a INTEGER NOT NULL, b TEXT, c TEXT, PRIMARY KEY (a, `b`))";
        let columns = parse_create_table(sql).unwrap();
        assert_eq!(columns.len(), 3);
        assert!(columns[0].is_primary_key);
        assert!(columns[1].is_primary_key);
        assert!(!columns[2].is_primary_key);
        assert!(!columns[0].nullable);
    }

    #[test]
    fn test_named_constraints_and_table_checks() {
        let sql = r#"CREATE TABLE t (
            a int,
            b int CHECK (b IN (1, 2)),
            CONSTRAINT pk_t PRIMARY KEY (a),
            CONSTRAINT uq_b UNIQUE (b),
            FOREIGN KEY (b) REFERENCES other(id),
            CHECK (a > 0)
        )"#;
        let columns = parse_create_table(sql).unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(columns[0].is_primary_key);
        assert_eq!(columns[1].data_type, "int");
    }

    #[test]
    fn test_column_flags_and_defaults() {
        let sql = r#"create table t (
            a varchar (255) not null default 'x, y',
            b decimal(10, 2) DEFAULT -1.5,
            c integer NULL DEFAULT NULL,
            [d] unsigned big int DEFAULT (strftime('%s','now')),
            e
        )"#;
        let columns = parse_create_table(sql).unwrap();
        assert_eq!(columns.len(), 5);

        assert_eq!(columns[0].data_type, "varchar(255)");
        assert!(!columns[0].nullable);
        assert_eq!(columns[0].default.as_deref(), Some("'x, y'"));

        assert_eq!(columns[1].data_type, "decimal(10,2)");
        assert_eq!(columns[1].default.as_deref(), Some("-1.5"));

        assert!(columns[2].nullable);
        assert_eq!(columns[2].default.as_deref(), Some("NULL"));

        assert_eq!(columns[3].name, "d");
        assert_eq!(columns[3].data_type, "unsigned big int");
        assert_eq!(columns[3].default.as_deref(), Some("(strftime('%s','now'))"));

        assert_eq!(columns[4].name, "e");
        assert_eq!(columns[4].data_type, "");
    }

    #[test]
    fn test_parse_create_table_without_body() {
        assert!(parse_create_table("CREATE TABLE t AS SELECT 1").is_err());
    }

    #[test]
    fn test_parse_unique_index_with_schema_prefix() {
        let sql = "CREATE UNIQUE INDEX \"main\".\"IDX_attrs\"\nON \"user\" (\n  \"attrs\" ASC\n)";
        let index = parse_create_index(sql).unwrap();
        assert_eq!(index.name, "IDX_attrs");
        assert!(index.is_unique);
        assert_eq!(index.columns, vec!["attrs"]);
    }

    #[test]
    fn test_parse_index_keeps_key_order() {
        let sql = "CREATE INDEX IF NOT EXISTS [idx_phone] ON phone (num DESC, `userId` COLLATE nocase, lower(num))";
        let index = parse_create_index(sql).unwrap();
        assert_eq!(index.name, "idx_phone");
        assert!(!index.is_unique);
        assert_eq!(index.columns, vec!["num", "userId"]);
    }

    #[test]
    fn test_parse_index_errors() {
        assert!(parse_create_index("CREATE TABLE t (a)").is_err());
        assert!(parse_create_index("CREATE INDEX i").is_err());
        assert!(parse_create_index("CREATE INDEX i ON t").is_err());
    }

    #[test]
    fn test_postgres_index_definition() {
        let def = "CREATE UNIQUE INDEX \"UQE_user_email\" ON public.\"user\" USING btree (email, \"createdAt\" DESC) INCLUDE (id)";
        assert_eq!(index_key_columns(def).unwrap(), vec!["email", "createdAt"]);

        let expr = "CREATE INDEX idx_lower ON public.t USING btree (lower((name)::text), id)";
        assert_eq!(index_key_columns(expr).unwrap(), vec!["id"]);
    }
}
