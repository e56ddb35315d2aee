//! Whitespace normalization for emitted Markdown.
//!
//! Two rules, applied everywhere Markdown leaves the pipeline: trailing
//! whitespace is trimmed per line, and runs of three or more blank
//! lines collapse to one blank line. Both are idempotent.

/// Normalize a Markdown document.
#[must_use]
pub fn normalize_markdown(markdown: &str) -> String {
    let trimmed_lines: Vec<&str> = markdown.lines().map(str::trim_end).collect();

    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0usize;
    for line in trimmed_lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    let body = out.trim_matches('\n');
    if body.is_empty() {
        String::new()
    } else {
        format!("{body}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_whitespace_trimmed() {
        let out = normalize_markdown("line one   \nline two\t\n");
        assert_eq!(out, "line one\nline two\n");
    }

    #[test]
    fn blank_runs_collapse_to_two_newlines() {
        let out = normalize_markdown("a\n\n\n\n\nb\n");
        assert_eq!(out, "a\n\nb\n");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "# Title\n\n\n\nBody  \n\nMore\n\n\n",
            "\n\n\nleading\n",
            "single line",
        ];
        for input in inputs {
            let once = normalize_markdown(input);
            assert_eq!(normalize_markdown(&once), once, "input {input:?}");
            assert!(!once.contains("\n\n\n"));
            for line in once.lines() {
                assert_eq!(line, line.trim_end());
            }
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_markdown(""), "");
        assert_eq!(normalize_markdown("\n\n\n"), "");
    }
}
