//! Locating fenced JSON blocks in model replies.
//!
//! Two fence forms are recognized:
//! 1. ```` ```json ```` with the language tag matched case-insensitively
//! 2. a bare ```` ``` ```` fence whose body starts with `{`
//!
//! Fences tagged with any other language are skipped. The first recognized
//! block wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExtractionError;

const PREVIEW_CHARS: usize = 50;

/// A complete block: info string on the opening line, then a non-greedy body
/// up to the closing fence.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([^\n`]*)(.*?)```").expect("valid fenced block pattern")
});

/// An opening fence with no closing fence after it.
static FENCE_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```([^\n`]*)").expect("valid fence opener pattern"));

static JSON_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[ \t]*json\b").expect("valid json tag pattern"));

/// Returns the trimmed body of the first fenced JSON block in `text`.
pub fn locate_fenced_json(text: &str) -> Result<&str, ExtractionError> {
    let mut tail_start = 0;

    for caps in FENCED_BLOCK.captures_iter(text) {
        let (Some(block), Some(info), Some(body)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        tail_start = block.end();

        if let Some(json) = json_body(text, info.start(), info.as_str(), body.end()) {
            return Ok(json);
        }
    }

    // At most one unmatched opener can follow the last complete block.
    if let Some(caps) = FENCE_OPENER.captures(&text[tail_start..]) {
        if let (Some(opener), Some(info)) = (caps.get(0), caps.get(1)) {
            let info_start = tail_start + info.start();
            if json_body(text, info_start, info.as_str(), text.len()).is_some() {
                return Err(ExtractionError::UnterminatedFence {
                    offset: tail_start + opener.start(),
                });
            }
        }
    }

    Err(ExtractionError::FenceNotFound {
        content_preview: content_preview(text),
    })
}

/// The JSON body of a fence whose info string starts at `info_start`, if the
/// fence holds JSON. The body ends at `body_end`.
fn json_body<'a>(text: &'a str, info_start: usize, info: &str, body_end: usize) -> Option<&'a str> {
    if let Some(tag) = JSON_TAG.find(info) {
        return Some(text[info_start + tag.end()..body_end].trim());
    }

    let trimmed = info.trim();
    if trimmed.is_empty() || trimmed.starts_with('{') {
        let body = text[info_start..body_end].trim();
        if body.starts_with('{') {
            return Some(body);
        }
    }

    None
}

/// First characters of `text`, for error messages.
pub fn content_preview(text: &str) -> String {
    text.trim().chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_fence() {
        let text = "评测如下：\n```json\n{\"a\": 1}\n```\n以上。";
        assert_eq!(locate_fenced_json(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_tag_is_case_insensitive() {
        let text = "```JSON\n{\"a\": 1}\n```";
        assert_eq!(locate_fenced_json(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_inline_json_fence() {
        let text = "```json{\"a\": 1}```";
        assert_eq!(locate_fenced_json(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_bare_fence_with_object() {
        let text = "Result:\n```\n{\"a\": 1}\n```";
        assert_eq!(locate_fenced_json(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_skips_other_languages() {
        let text = "```python\nprint('{')\n```\nthen\n```json\n{\"b\": 2}\n```";
        assert_eq!(locate_fenced_json(text).unwrap(), "{\"b\": 2}");
    }

    #[test]
    fn test_bare_fence_without_object_is_ignored() {
        let text = "```\nplain words\n```";
        assert!(matches!(
            locate_fenced_json(text),
            Err(ExtractionError::FenceNotFound { .. })
        ));
    }

    #[test]
    fn test_first_block_wins() {
        let text = "```json\n{\"n\": 1}\n```\n```json\n{\"n\": 2}\n```";
        assert_eq!(locate_fenced_json(text).unwrap(), "{\"n\": 1}");
    }

    #[test]
    fn test_no_fence_reports_preview() {
        let err = locate_fenced_json("I think the stream was great").unwrap_err();
        match err {
            ExtractionError::FenceNotFound { content_preview } => {
                assert_eq!(content_preview, "I think the stream was great");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_fence() {
        let text = "ok\n```json\n{\"metrics\": [";
        assert_eq!(
            locate_fenced_json(text).unwrap_err(),
            ExtractionError::UnterminatedFence { offset: 3 }
        );
    }

    #[test]
    fn test_unterminated_fence_after_other_block() {
        let text = "```text\nnotes\n```\n```json\n{\"metrics\": [";
        assert!(matches!(
            locate_fenced_json(text),
            Err(ExtractionError::UnterminatedFence { offset: 18 })
        ));
    }

    #[test]
    fn test_unclosed_prose_fence_is_not_found() {
        let text = "```\nstill thinking";
        assert!(matches!(
            locate_fenced_json(text),
            Err(ExtractionError::FenceNotFound { .. })
        ));
    }

    #[test]
    fn test_jsonc_is_not_json() {
        let text = "```jsonc\n{\"a\": 1}\n```";
        assert!(locate_fenced_json(text).is_err());
    }

    #[test]
    fn test_preview_is_char_safe() {
        let text = "直".repeat(80);
        assert_eq!(content_preview(&text).chars().count(), PREVIEW_CHARS);
    }
}
