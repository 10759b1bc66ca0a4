//! Trimming of captured command output.

const MAX_LINE_LENGTH: usize = 200;
const MAX_TOTAL_LENGTH: usize = 1000;

/// Sanitize command output for inclusion in error messages.
///
/// # Arguments
///
/// * `output` - The raw command output
/// * `max_lines` - Maximum number of lines to include
///
/// # Returns
///
/// At most `max_lines` lines, each cut to 200 characters, with the whole
/// text capped at roughly 1000 bytes. Truncation is marked in the text.
pub fn sanitize_output(output: &str, max_lines: usize) -> String {
    let mut result = String::new();

    for line in output.trim_end().lines().take(max_lines) {
        let truncated = match line.char_indices().nth(MAX_LINE_LENGTH) {
            Some((cut, _)) => format!("{}...", &line[..cut]),
            None => line.to_string(),
        };

        if result.len() + truncated.len() > MAX_TOTAL_LENGTH {
            result.push_str("...[truncated]");
            return result;
        }

        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&truncated);
    }

    if output.trim_end().lines().count() > max_lines {
        result.push_str("\n...[additional output truncated]");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_output_short() {
        assert_eq!(sanitize_output("Hello\nWorld\n", 10), "Hello\nWorld");
    }

    #[test]
    fn test_sanitize_output_truncates_lines() {
        let output = "Line 1\nLine 2\nLine 3\nLine 4\nLine 5";
        let sanitized = sanitize_output(output, 3);
        assert!(sanitized.contains("Line 3"));
        assert!(!sanitized.contains("Line 4"));
        assert!(sanitized.contains("[additional output truncated]"));
    }

    #[test]
    fn test_sanitize_output_truncates_long_lines() {
        let long_line = "x".repeat(300);
        let sanitized = sanitize_output(&long_line, 10);
        assert_eq!(sanitized.len(), MAX_LINE_LENGTH + 3);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn test_sanitize_output_multibyte() {
        let line = "é".repeat(250);
        let sanitized = sanitize_output(&line, 1);
        assert_eq!(sanitized.chars().count(), MAX_LINE_LENGTH + 3);
    }

    #[test]
    fn test_sanitize_output_total_cap() {
        let output = vec!["y".repeat(150); 21].join("\n");
        let sanitized = sanitize_output(&output, 50);
        assert!(sanitized.len() <= MAX_TOTAL_LENGTH + "...[truncated]".len());
        assert!(sanitized.ends_with("...[truncated]"));
    }
}
