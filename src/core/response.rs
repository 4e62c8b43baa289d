//! Response parsing for pasted model output
//!
//! Recovers a trailing control block and a set of file operations from
//! mixed-markdown text. Models emit example fences, comment-prefixed
//! headers, unquoted paths with spaces, and multiple candidate metadata
//! blocks; recovery is tolerant throughout. A malformed candidate block
//! is evidence the surrounding text was reasoning, so it is dropped
//! silently (visible only on the debug log channel), never an error.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::core::schema::{
    ControlBlock, FileOperation, ParsedResponse, PatchDialect, SchemaError, decode_control,
    decode_rename,
};

/// Body sentinel marking a file for deletion
const DELETE_SENTINEL: &str = "//TODO: delete this file";

/// Header sentinel introducing a rename block
const RENAME_HEADER: &str = "rename-file";

/// Lines scanned from the end of the text for a bare `projectId:` anchor
const BARE_TAIL_WINDOW: usize = 20;

/// One fenced code region of the residual text
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedBlock {
    /// Byte extent of the whole fenced region, fences included
    pub span: Range<usize>,
    /// Opening-fence text after the backticks, untrimmed
    pub opening_rest: String,
    /// Raw content between the fences, newlines preserved exactly
    pub body: String,
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Opening fence at line start with the rest of that line captured,
        // then a non-greedy body up to a closing fence at line start.
        Regex::new(r"(?ms)^```([^\n]*)\n(.*?)^```[ \t]*\r?$").expect("fence regex")
    })
}

/// Parse a raw response into control metadata, ordered operations, and
/// leftover reasoning lines. Returns `None` when no control block could
/// be located or when no block yielded a valid operation.
pub fn parse_response(raw: &str) -> Option<ParsedResponse> {
    let (control, residual) = extract_control(raw);
    let Some(control) = control else {
        debug!("no control block found in response tail");
        return None;
    };

    let blocks = scan_blocks(&residual);
    let mut operations = Vec::new();
    let mut classified: Vec<Range<usize>> = Vec::new();

    for block in &blocks {
        match classify_block(block) {
            Some(op) => {
                operations.push(op);
                classified.push(block.span.clone());
            }
            None => debug!(
                header = block.opening_rest.trim(),
                "dropped unclassifiable block"
            ),
        }
    }

    if operations.is_empty() {
        debug!(blocks = blocks.len(), "response produced no valid operations");
        return None;
    }

    let reasoning = reasoning_lines(&residual, &classified);

    Some(ParsedResponse {
        control,
        operations,
        reasoning,
    })
}

/// Locate the trailing control block and split it off the text.
///
/// Tries, in order: the last fenced yaml/yml region, then a bare YAML
/// tail anchored by `projectId:` within the last lines of the text.
/// Parse and validation failures fall through silently.
pub fn extract_control(raw: &str) -> (Option<ControlBlock>, String) {
    if let Some((control, residual)) = last_fenced_yaml(raw) {
        return (Some(control), residual);
    }
    if let Some((control, residual)) = bare_tail(raw) {
        return (Some(control), residual);
    }
    (None, raw.to_string())
}

/// Strategy 1: the last fenced region whose info string is yaml/yml.
/// Only the last candidate is attempted; an earlier valid block behind
/// an invalid last one is intentionally ignored.
fn last_fenced_yaml(raw: &str) -> Option<(ControlBlock, String)> {
    let mut last: Option<(Range<usize>, String)> = None;

    for caps in fence_re().captures_iter(raw) {
        let info = caps.get(1).map_or("", |m| m.as_str()).trim();
        if info.eq_ignore_ascii_case("yaml") || info.eq_ignore_ascii_case("yml") {
            let whole = caps.get(0).expect("match");
            let body = caps.get(2).map_or("", |m| m.as_str());
            last = Some((whole.range(), body.to_string()));
        }
    }

    let (span, body) = last?;
    match decode_control(&body) {
        Ok(control) => {
            let mut residual = String::with_capacity(raw.len() - span.len());
            residual.push_str(&raw[..span.start]);
            residual.push_str(&raw[span.end..]);
            Some((control, residual.trim().to_string()))
        }
        Err(e) => {
            debug!(error = %e, "last fenced yaml block did not validate");
            None
        }
    }
}

/// Strategy 2: a bare YAML tail anchored by a `projectId:` line within
/// the last lines of the trimmed text. The window keeps the anchor from
/// matching prose earlier in the message.
fn bare_tail(raw: &str) -> Option<(ControlBlock, String)> {
    let trimmed = raw.trim();
    let lines: Vec<&str> = trimmed.split('\n').collect();

    // Byte offset of each line start within `trimmed`
    let mut offsets = Vec::with_capacity(lines.len());
    let mut pos = 0usize;
    for line in &lines {
        offsets.push(pos);
        pos += line.len() + 1;
    }

    let window_start = lines.len().saturating_sub(BARE_TAIL_WINDOW);
    for idx in window_start..lines.len() {
        if !lines[idx].trim().starts_with("projectId:") {
            continue;
        }
        let tail = &trimmed[offsets[idx]..];
        match decode_control(tail) {
            Ok(control) => {
                let residual = trimmed[..offsets[idx]].trim().to_string();
                return Some((control, residual));
            }
            Err(e) => {
                debug!(error = %e, "bare projectId tail did not validate");
                return None;
            }
        }
    }
    None
}

/// Iterate the fenced code regions of the residual text in source order.
/// Matches are disjoint; info strings are captured but not consumed here.
pub fn scan_blocks(residual: &str) -> Vec<ScannedBlock> {
    fence_re()
        .captures_iter(residual)
        .map(|caps| {
            let whole = caps.get(0).expect("match");
            ScannedBlock {
                span: whole.range(),
                opening_rest: caps.get(1).map_or("", |m| m.as_str()).to_string(),
                body: caps.get(2).map_or("", |m| m.as_str()).to_string(),
            }
        })
        .collect()
}

/// Classify one scanned block into a typed operation, or drop it.
pub fn classify_block(block: &ScannedBlock) -> Option<FileOperation> {
    let (header, body) = derive_header(&block.opening_rest, &block.body)?;
    let header = normalize_header(&header)?;

    // Rename short-circuit: body must be a JSON object with {from, to}
    if header == RENAME_HEADER {
        return match decode_rename(&body) {
            Ok((from, to)) => Some(FileOperation::Rename { from, to }),
            Err(e) => {
                debug!(error = %e, "rename block body rejected");
                None
            }
        };
    }

    let (path, explicit) = parse_header_grammar(&header)?;

    if body.trim() == DELETE_SENTINEL {
        return Some(FileOperation::Delete { path });
    }

    let dialect = explicit.unwrap_or_else(|| infer_dialect(&body));
    let content = match dialect {
        PatchDialect::Replace => strip_one_leading_newline(&body).to_string(),
        PatchDialect::StandardDiff | PatchDialect::SearchReplace => body,
    };

    Some(FileOperation::Write {
        path,
        content,
        dialect,
    })
}

/// Resolve where the header text lives: on the opening fence line after
/// an optional language tag, or as a `//` comment on the first body line
/// when the fence line carries nothing else. In the latter case the body
/// keeps the newline that followed the comment; replace normalisation
/// strips it later.
fn derive_header(opening_rest: &str, body: &str) -> Option<(String, String)> {
    let rest = opening_rest.trim();

    if !rest.is_empty() {
        let header = strip_info_token(rest);
        if !header.is_empty() {
            return Some((header.to_string(), body.to_string()));
        }
    }

    let first_end = body.find('\n').unwrap_or(body.len());
    let first = body[..first_end].trim();
    if first.starts_with("//") && first != DELETE_SENTINEL {
        return Some((first.to_string(), body[first_end..].to_string()));
    }

    None
}

/// Drop a leading language tag so `ts path/file.ts` and `path/file.ts`
/// both resolve to the path. Only conservative, well-known tags are
/// treated as info strings; anything with path-like characters is kept.
fn strip_info_token(rest: &str) -> &str {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let remainder = parts.next().unwrap_or("").trim_start();

    if is_language_tag(first) { remainder } else { rest }
}

fn is_language_tag(token: &str) -> bool {
    matches!(
        token.to_ascii_lowercase().as_str(),
        "ts" | "tsx"
            | "js"
            | "jsx"
            | "mjs"
            | "cjs"
            | "typescript"
            | "javascript"
            | "rust"
            | "rs"
            | "python"
            | "py"
            | "go"
            | "rb"
            | "ruby"
            | "java"
            | "kt"
            | "kotlin"
            | "c"
            | "h"
            | "cpp"
            | "hpp"
            | "cc"
            | "cs"
            | "csharp"
            | "php"
            | "swift"
            | "scala"
            | "sh"
            | "bash"
            | "zsh"
            | "shell"
            | "fish"
            | "powershell"
            | "sql"
            | "html"
            | "css"
            | "scss"
            | "less"
            | "xml"
            | "json"
            | "jsonc"
            | "yaml"
            | "yml"
            | "toml"
            | "ini"
            | "md"
            | "markdown"
            | "txt"
            | "text"
            | "plaintext"
            | "diff"
            | "patch"
            | "vue"
            | "svelte"
            | "dart"
            | "lua"
            | "perl"
            | "zig"
            | "elixir"
            | "haskell"
            | "graphql"
            | "proto"
            | "dockerfile"
            | "makefile"
    )
}

/// Header normalisation: trim, and honor `//` comment prefixes so both
/// `ts // path/file.ts` and `// path/file.ts` reduce to the path part.
/// An empty result rejects the block.
fn normalize_header(header: &str) -> Option<String> {
    let trimmed = header.trim();
    let stripped = match trimmed.find("//") {
        Some(idx) => trimmed[idx + 2..].trim(),
        None => trimmed,
    };
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Header grammar: a quoted or unquoted path followed by an optional
/// strategy token. Falls back to treating the trailing token as the
/// strategy (allowing unquoted paths with spaces), else the whole header
/// is the path. A quoted path with an unknown trailing strategy rejects
/// the block.
fn parse_header_grammar(header: &str) -> Option<(String, Option<PatchDialect>)> {
    if let Some(rest) = header.strip_prefix('"') {
        let close = rest.find('"')?;
        let path = &rest[..close];
        if path.is_empty() {
            return None;
        }
        let after = rest[close + 1..].trim();
        if after.is_empty() {
            return Some((path.to_string(), None));
        }
        return match PatchDialect::parse(after) {
            Some(dialect) => Some((path.to_string(), Some(dialect))),
            None => {
                let err = SchemaError::UnknownDialect {
                    value: after.to_string(),
                };
                debug!(error = %err, "rejected block with explicit strategy");
                None
            }
        };
    }

    let tokens: Vec<&str> = header.split_whitespace().collect();
    match tokens.as_slice() {
        [] => None,
        [path] => Some(((*path).to_string(), None)),
        [path, strategy] if PatchDialect::parse(strategy).is_some() => {
            Some(((*path).to_string(), PatchDialect::parse(strategy)))
        }
        _ => {
            let last = *tokens.last().expect("nonempty");
            if let Some(dialect) = PatchDialect::parse(last) {
                let cut = header.rfind(last).expect("token from header");
                let path = header[..cut].trim_end();
                if path.is_empty() {
                    None
                } else {
                    Some((path.to_string(), Some(dialect)))
                }
            } else {
                Some((header.to_string(), None))
            }
        }
    }
}

/// Dialect inference for bodies without an explicit strategy. Probing
/// skips the single leading newline a body-line header leaves behind.
fn infer_dialect(body: &str) -> PatchDialect {
    let probe = strip_one_leading_newline(body);

    let has_search = probe.lines().any(|l| l.starts_with("<<<<<<< SEARCH"));
    if has_search && probe.contains(">>>>>>> REPLACE") {
        return PatchDialect::SearchReplace;
    }
    if probe.starts_with("--- ") && probe.contains("+++ ") && probe.contains("@@") {
        return PatchDialect::StandardDiff;
    }
    PatchDialect::Replace
}

/// Strip at most one leading CRLF/LF; trailing whitespace is meaningful
/// and preserved exactly.
fn strip_one_leading_newline(body: &str) -> &str {
    body.strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body)
}

/// Reasoning is the residual with every classified block excised, split
/// into non-empty trimmed lines.
fn reasoning_lines(residual: &str, spans: &[Range<usize>]) -> Vec<String> {
    let mut remainder = String::with_capacity(residual.len());
    let mut pos = 0usize;
    for span in spans {
        remainder.push_str(&residual[pos..span.start]);
        pos = span.end;
    }
    remainder.push_str(&residual[pos..]);

    remainder
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROL: &str = "```yaml\nprojectId: demo\nuuid: 123e4567-e89b-12d3-a456-426614174000\n```\n";

    fn block(opening_rest: &str, body: &str) -> ScannedBlock {
        ScannedBlock {
            span: 0..0,
            opening_rest: opening_rest.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn header_grammar_table() {
        // (opening rest, expected path, expected dialect for empty body)
        let cases: &[(&str, &str, PatchDialect)] = &[
            ("src/a.ts", "src/a.ts", PatchDialect::Replace),
            ("src/a.ts standard-diff", "src/a.ts", PatchDialect::StandardDiff),
            ("\"my file.ts\"", "my file.ts", PatchDialect::Replace),
            ("\"my file.ts\" search-replace", "my file.ts", PatchDialect::SearchReplace),
            ("my file.ts", "my file.ts", PatchDialect::Replace),
            ("my file.ts search-replace", "my file.ts", PatchDialect::SearchReplace),
            ("// src/a.ts", "src/a.ts", PatchDialect::Replace),
            ("ts // \"src/a.ts\" standard-diff", "src/a.ts", PatchDialect::StandardDiff),
        ];

        for (rest, want_path, want_dialect) in cases {
            let op = classify_block(&block(rest, "body\n")).unwrap_or_else(|| {
                panic!("header {rest:?} should classify");
            });
            match op {
                FileOperation::Write { path, dialect, .. } => {
                    assert_eq!(&path, want_path, "path for header {rest:?}");
                    assert_eq!(&dialect, want_dialect, "dialect for header {rest:?}");
                }
                other => panic!("expected write for {rest:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn header_on_first_body_line() {
        let op = classify_block(&block("ts", "// src/a.ts\nconst x = 1;\n")).unwrap();
        match op {
            FileOperation::Write { path, content, dialect } => {
                assert_eq!(path, "src/a.ts");
                assert_eq!(dialect, PatchDialect::Replace);
                // The newline after the comment header is stripped once
                assert_eq!(content, "const x = 1;\n");
            }
            other => panic!("expected write, got {other:?}"),
        }
    }

    #[test]
    fn empty_header_rejects() {
        assert!(classify_block(&block("ts", "const x = 1;\n")).is_none());
        assert!(classify_block(&block("", "plain text\n")).is_none());
    }

    #[test]
    fn quoted_path_with_unknown_strategy_rejects() {
        assert!(classify_block(&block("\"my file.ts\" bogus", "x\n")).is_none());
    }

    #[test]
    fn delete_sentinel_detected() {
        let op = classify_block(&block("src/old.ts", "//TODO: delete this file\n")).unwrap();
        assert_eq!(
            op,
            FileOperation::Delete {
                path: "src/old.ts".to_string()
            }
        );
    }

    #[test]
    fn sentinel_only_block_without_path_rejects() {
        assert!(classify_block(&block("ts", "//TODO: delete this file\n")).is_none());
    }

    #[test]
    fn rename_block_parses_and_bad_bodies_drop() {
        let op = classify_block(&block("json rename-file", "{\"from\":\"a.ts\",\"to\":\"b.ts\"}\n"));
        assert_eq!(
            op,
            Some(FileOperation::Rename {
                from: "a.ts".to_string(),
                to: "b.ts".to_string()
            })
        );
        assert!(classify_block(&block("json rename-file", "{\"from\":\"a.ts\"}\n")).is_none());
        assert!(classify_block(&block("rename-file", "not json\n")).is_none());
    }

    #[test]
    fn dialect_inference_from_body() {
        let diff_body = "--- a/src/a.ts\n+++ b/src/a.ts\n@@ -1 +1 @@\n-old\n+new\n";
        let op = classify_block(&block("src/a.ts", diff_body)).unwrap();
        assert!(matches!(
            op,
            FileOperation::Write {
                dialect: PatchDialect::StandardDiff,
                ..
            }
        ));

        let sr_body = "<<<<<<< SEARCH\nold\n=======\nnew\n>>>>>>> REPLACE\n";
        let op = classify_block(&block("src/a.ts", sr_body)).unwrap();
        assert!(matches!(
            op,
            FileOperation::Write {
                dialect: PatchDialect::SearchReplace,
                ..
            }
        ));
    }

    #[test]
    fn extract_takes_last_fenced_yaml() {
        let raw = format!(
            "An example block:\n```yaml\nprojectId: example\nuuid: nope\n```\nreal one:\n{CONTROL}"
        );
        let (control, residual) = extract_control(&raw);
        let control = control.unwrap();
        assert_eq!(control.project_id, "demo");
        assert!(residual.contains("example block"));
        // the invalid earlier block stays in the residual
        assert!(residual.contains("projectId: example"));
    }

    #[test]
    fn extract_earlier_valid_block_is_ignored_when_last_fails() {
        let raw = format!(
            "{CONTROL}\nprose after\n```yaml\nprojectId: demo\nuuid: not-a-uuid\n```\nmore prose"
        );
        let (control, _) = extract_control(&raw);
        assert!(control.is_none());
    }

    #[test]
    fn extract_bare_tail() {
        let raw = "Here is the change.\n\nprojectId: demo\nuuid: 123e4567-e89b-12d3-a456-426614174000\n";
        let (control, residual) = extract_control(raw);
        assert_eq!(control.unwrap().project_id, "demo");
        assert_eq!(residual, "Here is the change.");
    }

    #[test]
    fn bare_anchor_outside_window_is_ignored() {
        let mut raw = String::from("projectId: demo\nuuid: 123e4567-e89b-12d3-a456-426614174000\n");
        for i in 0..25 {
            raw.push_str(&format!("padding line {i}\n"));
        }
        let (control, _) = extract_control(&raw);
        assert!(control.is_none());
    }

    #[test]
    fn parse_response_orders_operations_and_collects_reasoning() {
        let raw = format!(
            "I will rename then patch.\n\n\
             ```json rename-file\n{{\"from\":\"a.ts\",\"to\":\"b.ts\"}}\n```\n\
             Then update it:\n\
             ```ts\n// a.ts\nconst x = 2;\n```\n\
             {CONTROL}"
        );
        let parsed = parse_response(&raw).unwrap();
        assert_eq!(parsed.operations.len(), 2);
        assert!(matches!(parsed.operations[0], FileOperation::Rename { .. }));
        assert!(matches!(parsed.operations[1], FileOperation::Write { .. }));
        assert_eq!(
            parsed.reasoning,
            vec![
                "I will rename then patch.".to_string(),
                "Then update it:".to_string()
            ]
        );
    }

    #[test]
    fn parse_response_none_without_control_or_operations() {
        assert!(parse_response("just some prose, nothing else").is_none());

        // control present but no valid blocks
        let raw = format!("prose only, no fences with paths\n{CONTROL}");
        assert!(parse_response(&raw).is_none());
    }

    #[test]
    fn scanner_preserves_bodies_verbatim() {
        let text = "```ts x.ts\nline1\n\n  indented\n```\n";
        let blocks = scan_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "line1\n\n  indented\n");
        assert_eq!(blocks[0].opening_rest, "ts x.ts");
    }
}
