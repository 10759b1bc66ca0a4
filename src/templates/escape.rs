//! Escaping rules for values placed in unit files.

/// Escape systemd `%` specifiers.
pub fn escape_specifiers(value: &str) -> String {
    value.replace('%', "%%")
}

fn needs_quoting(token: &str) -> bool {
    token.is_empty()
        || token == ";"
        || token
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'))
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Escape one `ExecStart=` argument so systemd passes it through as a single
/// argument, unexpanded.
///
/// `%` and `$` are doubled. Tokens that are empty, a lone `;`, or contain
/// whitespace, quotes or backslashes are double-quoted.
pub fn quote_exec_token(token: &str) -> String {
    let escaped = escape_specifiers(token).replace('$', "$$");
    if needs_quoting(token) {
        quote(&escaped)
    } else {
        escaped
    }
}

/// Join tokens into an `ExecStart=` command line.
pub fn exec_command_line<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| quote_exec_token(t.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format one `Environment=` assignment.
///
/// The whole `NAME=value` pair is quoted when the value contains whitespace,
/// `=`, quotes or backslashes.
pub fn environment_assignment(name: &str, value: &str) -> String {
    let assignment = escape_specifiers(&format!("{}={}", name, value));
    if value.contains('=') || (!value.is_empty() && needs_quoting(value)) {
        quote(&assignment)
    } else {
        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_tokens_untouched() {
        assert_eq!(quote_exec_token("/opt/app/run.py"), "/opt/app/run.py");
        assert_eq!(quote_exec_token("--bind"), "--bind");
        assert_eq!(quote_exec_token("app:create_app()"), "app:create_app()");
    }

    #[test]
    fn test_whitespace_is_quoted() {
        assert_eq!(quote_exec_token("hello world"), "\"hello world\"");
        assert_eq!(quote_exec_token(""), "\"\"");
        assert_eq!(quote_exec_token(";"), "\";\"");
    }

    #[test]
    fn test_quotes_and_backslashes_escaped() {
        assert_eq!(quote_exec_token(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote_exec_token(r"C:\dir"), r#""C:\\dir""#);
    }

    #[test]
    fn test_specifiers_and_variables_doubled() {
        assert_eq!(quote_exec_token("100%"), "100%%");
        assert_eq!(quote_exec_token("$HOME"), "$$HOME");
    }

    #[test]
    fn test_exec_command_line() {
        let line = exec_command_line(["/venv/bin/python", "/app/run.py", "a b", "c"]);
        assert_eq!(line, "/venv/bin/python /app/run.py \"a b\" c");
    }

    #[test]
    fn test_environment_assignment() {
        assert_eq!(environment_assignment("DEBUG", "1"), "DEBUG=1");
        assert_eq!(environment_assignment("EMPTY", ""), "EMPTY=");
        assert_eq!(
            environment_assignment("GREETING", "hello world"),
            "\"GREETING=hello world\""
        );
        assert_eq!(
            environment_assignment("URL", "postgres://h/db?sslmode=require"),
            "\"URL=postgres://h/db?sslmode=require\""
        );
        assert_eq!(environment_assignment("RATE", "50%"), "RATE=50%%");
    }
}
