//! Patch dialect engines
//!
//! Two pure functions the applier dispatches on: unified-diff
//! application backed by diffy, and SEARCH/REPLACE block application
//! via a line-oriented state machine. Both are deterministic and touch
//! no state outside their arguments.

use diffy::Patch;

/// Failures of the dialect engines
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("invalid unified diff: {0}")]
    Parse(String),

    #[error("hunk did not apply: {0}")]
    Apply(String),

    #[error("malformed search/replace block: {0}")]
    Malformed(String),

    #[error("search text not found in target")]
    SearchNotFound,
}

/// Apply a unified diff (---/+++/@@ headers) to `original`.
///
/// Tolerates CRLF input and leading blank lines; strict parsers need a
/// trailing newline, so one is ensured.
pub fn apply_standard_diff(original: &str, diff: &str) -> Result<String, DiffError> {
    let cleaned = prepare_diff(diff);
    let patch = Patch::from_str(&cleaned).map_err(|e| DiffError::Parse(e.to_string()))?;

    if patch.hunks().is_empty() {
        return Err(DiffError::Parse("no hunks found".to_string()));
    }

    diffy::apply(original, &patch).map_err(|e| DiffError::Apply(e.to_string()))
}

fn prepare_diff(diff: &str) -> String {
    let mut cleaned = diff.replace("\r\n", "\n");
    while cleaned.starts_with('\n') {
        cleaned.remove(0);
    }
    if !cleaned.ends_with('\n') {
        cleaned.push('\n');
    }
    cleaned
}

const SEARCH_OPEN: &str = "<<<<<<<";
const DIVIDER: &str = "=======";
const REPLACE_CLOSE: &str = ">>>>>>>";

#[derive(Debug)]
struct SearchReplaceBlock {
    search: Vec<String>,
    replace: Vec<String>,
}

/// Apply one or more SEARCH/REPLACE blocks to `original`, in order.
/// Each block replaces the first run of lines matching its search
/// payload; a payload that misses only by trailing whitespace still
/// matches.
pub fn apply_search_replace(original: &str, diff: &str) -> Result<String, DiffError> {
    let blocks = parse_blocks(diff)?;
    let mut current = original.to_string();
    for block in &blocks {
        current = apply_block(&current, block)?;
    }
    Ok(current)
}

/// Line-oriented state machine over the block body. Markers are
/// column-0 anchored; text between blocks is ignored.
fn parse_blocks(diff: &str) -> Result<Vec<SearchReplaceBlock>, DiffError> {
    #[derive(PartialEq)]
    enum State {
        Scanning,
        InSearch,
        InReplace,
    }

    let normalized = diff.replace("\r\n", "\n");
    let mut state = State::Scanning;
    let mut blocks = Vec::new();
    let mut search: Vec<String> = Vec::new();
    let mut replace: Vec<String> = Vec::new();

    for line in normalized.split('\n') {
        match state {
            State::Scanning => {
                if let Some(rest) = line.strip_prefix(SEARCH_OPEN)
                    && rest.trim() == "SEARCH"
                {
                    state = State::InSearch;
                    search.clear();
                    replace.clear();
                }
            }
            State::InSearch => {
                if line.trim_end() == DIVIDER {
                    state = State::InReplace;
                } else {
                    search.push(line.to_string());
                }
            }
            State::InReplace => {
                if let Some(rest) = line.strip_prefix(REPLACE_CLOSE)
                    && rest.trim() == "REPLACE"
                {
                    if search.iter().all(|l| l.is_empty()) {
                        return Err(DiffError::Malformed("empty SEARCH payload".to_string()));
                    }
                    blocks.push(SearchReplaceBlock {
                        search: std::mem::take(&mut search),
                        replace: std::mem::take(&mut replace),
                    });
                    state = State::Scanning;
                } else {
                    replace.push(line.to_string());
                }
            }
        }
    }

    if state != State::Scanning {
        return Err(DiffError::Malformed("unterminated block".to_string()));
    }
    if blocks.is_empty() {
        return Err(DiffError::Malformed("no search/replace blocks found".to_string()));
    }

    Ok(blocks)
}

fn apply_block(content: &str, block: &SearchReplaceBlock) -> Result<String, DiffError> {
    let lines: Vec<&str> = content.split('\n').collect();

    let at = find_run(&lines, &block.search, |a, b| a == b)
        .or_else(|| find_run(&lines, &block.search, |a, b| a.trim_end() == b.trim_end()))
        .ok_or(DiffError::SearchNotFound)?;

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    out.extend_from_slice(&lines[..at]);
    out.extend(block.replace.iter().map(String::as_str));
    out.extend_from_slice(&lines[at + block.search.len()..]);

    Ok(out.join("\n"))
}

/// First index where `needle` matches a consecutive run of `haystack`
/// under the given line comparison.
fn find_run<F>(haystack: &[&str], needle: &[String], eq: F) -> Option<usize>
where
    F: Fn(&str, &str) -> bool,
{
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .find(|&i| needle.iter().enumerate().all(|(j, n)| eq(haystack[i + j], n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_diff_applies() {
        let original = "line1\nline2\nline3\n";
        let diff = "--- a/x\n+++ b/x\n@@ -1,3 +1,3 @@\n line1\n-line2\n+patched\n line3\n";
        assert_eq!(
            apply_standard_diff(original, diff).unwrap(),
            "line1\npatched\nline3\n"
        );
    }

    #[test]
    fn standard_diff_creates_from_empty() {
        let diff = "--- /dev/null\n+++ b/new.ts\n@@ -0,0 +1,2 @@\n+alpha\n+beta\n";
        assert_eq!(apply_standard_diff("", diff).unwrap(), "alpha\nbeta\n");
    }

    #[test]
    fn standard_diff_tolerates_leading_blank_line() {
        let original = "a\nb\n";
        let diff = "\n--- a/x\n+++ b/x\n@@ -1,2 +1,2 @@\n a\n-b\n+c\n";
        assert_eq!(apply_standard_diff(original, diff).unwrap(), "a\nc\n");
    }

    #[test]
    fn standard_diff_rejects_garbage() {
        assert!(apply_standard_diff("content\n", "not a diff").is_err());
    }

    #[test]
    fn standard_diff_surfaces_context_mismatch() {
        let original = "completely\ndifferent\n";
        let diff = "--- a/x\n+++ b/x\n@@ -1,2 +1,2 @@\n line1\n-line2\n+patched\n";
        assert!(matches!(
            apply_standard_diff(original, diff),
            Err(DiffError::Apply(_))
        ));
    }

    #[test]
    fn search_replace_single_block() {
        let original = "fn main() {\n    old();\n}\n";
        let diff = "<<<<<<< SEARCH\n    old();\n=======\n    new();\n>>>>>>> REPLACE\n";
        assert_eq!(
            apply_search_replace(original, diff).unwrap(),
            "fn main() {\n    new();\n}\n"
        );
    }

    #[test]
    fn search_replace_multiple_blocks_in_order() {
        let original = "a\nb\nc\n";
        let diff = "<<<<<<< SEARCH\na\n=======\nA\n>>>>>>> REPLACE\n\
                    <<<<<<< SEARCH\nc\n=======\nC\n>>>>>>> REPLACE\n";
        assert_eq!(apply_search_replace(original, diff).unwrap(), "A\nb\nC\n");
    }

    #[test]
    fn search_replace_deletion_block() {
        let original = "keep\ndrop\nkeep2\n";
        let diff = "<<<<<<< SEARCH\ndrop\n=======\n>>>>>>> REPLACE\n";
        assert_eq!(apply_search_replace(original, diff).unwrap(), "keep\nkeep2\n");
    }

    #[test]
    fn search_replace_trailing_whitespace_tolerant() {
        let original = "line one   \nline two\n";
        let diff = "<<<<<<< SEARCH\nline one\n=======\nreplaced\n>>>>>>> REPLACE\n";
        assert_eq!(
            apply_search_replace(original, diff).unwrap(),
            "replaced\nline two\n"
        );
    }

    #[test]
    fn search_replace_missing_text_errors() {
        let diff = "<<<<<<< SEARCH\nnot here\n=======\nx\n>>>>>>> REPLACE\n";
        assert!(matches!(
            apply_search_replace("content\n", diff),
            Err(DiffError::SearchNotFound)
        ));
    }

    #[test]
    fn search_replace_unterminated_errors() {
        let diff = "<<<<<<< SEARCH\nx\n=======\ny\n";
        assert!(matches!(
            apply_search_replace("x\n", diff),
            Err(DiffError::Malformed(_))
        ));
    }

    #[test]
    fn search_replace_empty_search_errors() {
        let diff = "<<<<<<< SEARCH\n=======\ny\n>>>>>>> REPLACE\n";
        assert!(matches!(
            apply_search_replace("x\n", diff),
            Err(DiffError::Malformed(_))
        ));
    }
}
