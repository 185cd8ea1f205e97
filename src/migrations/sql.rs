//! Splitting migration scripts into individual statements.

/// Split a SQL script into statements.
///
/// - `--` comments outside of quotes run to the end of the line and are dropped
/// - `;` ends a statement unless it sits inside a `'...'` or `"..."` string
/// - inside a quoted string a backslash escapes the next character
/// - blank statements are dropped; a trailing statement without `;` is kept
///
/// Returned statements are trimmed and carry no trailing semicolon.
///
/// # Example
///
/// ```
/// use pizzeria::migrations::split_statements;
///
/// let statements = split_statements("INSERT INTO t VALUES ('a;b'); -- done\nSELECT 1");
/// assert_eq!(statements, vec!["INSERT INTO t VALUES ('a;b')", "SELECT 1"]);
/// ```
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    // Skip to end of line, keeping the newline as a separator.
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            current.push('\n');
                            break;
                        }
                    }
                }
                ';' => push_statement(&mut statements, &mut current),
                _ => current.push(c),
            },
        }
    }

    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolons() {
        let statements = split_statements("CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);");
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]
        );
    }

    #[test]
    fn keeps_trailing_statement_without_semicolon() {
        let statements = split_statements("DELETE FROM a; DELETE FROM b");
        assert_eq!(statements, vec!["DELETE FROM a", "DELETE FROM b"]);
    }

    #[test]
    fn drops_blank_statements() {
        let statements = split_statements(";;  \n ; SELECT 1;;");
        assert_eq!(statements, vec!["SELECT 1"]);
    }

    #[test]
    fn ignores_semicolons_inside_quotes() {
        let statements =
            split_statements(r#"INSERT INTO t VALUES ('a;b', "c;d"); SELECT 2"#);
        assert_eq!(
            statements,
            vec![r#"INSERT INTO t VALUES ('a;b', "c;d")"#, "SELECT 2"]
        );
    }

    #[test]
    fn other_quote_char_does_not_close_string() {
        let statements = split_statements(r#"INSERT INTO t VALUES ('it"s; fine'); SELECT 3"#);
        assert_eq!(
            statements,
            vec![r#"INSERT INTO t VALUES ('it"s; fine')"#, "SELECT 3"]
        );
    }

    #[test]
    fn backslash_escapes_quote_inside_string() {
        let statements = split_statements(r"INSERT INTO t VALUES ('don\'t; stop'); SELECT 4");
        assert_eq!(
            statements,
            vec![r"INSERT INTO t VALUES ('don\'t; stop')", "SELECT 4"]
        );
    }

    #[test]
    fn strips_line_comments() {
        let script = "-- header comment; with semicolon\nCREATE TABLE a (id INT); -- trailing\n-- only comment\n";
        assert_eq!(split_statements(script), vec!["CREATE TABLE a (id INT)"]);
    }

    #[test]
    fn comment_markers_inside_strings_are_kept() {
        let statements = split_statements("INSERT INTO t VALUES ('--not a comment');");
        assert_eq!(statements, vec!["INSERT INTO t VALUES ('--not a comment')"]);
    }

    #[test]
    fn empty_script_yields_nothing() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("  -- nothing here\n").is_empty());
    }
}
