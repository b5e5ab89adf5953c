//! Content sanitizer: turns free-form model text into a postable message.
//!
//! Steps, in order:
//! 1. drop a bolded title header (`**X Post:**` plus a blank line)
//! 2. turn markdown `*` bullets into `•`
//! 3. drop conversational preamble and instruction echoes
//! 4. drop one pair of surrounding quotes
//! 5. drop a "... post/tweet/x ...:" lead-in up to the first colon
//! 6. drop `*` emphasis markers
//! 7. fit the character limit at a sentence or word boundary
//!
//! Steps 3-5 are also used by the implicit-intent classifier via
//! [`clean_payload`].

use std::sync::LazyLock;
use regex_lite::Regex;

static TITLE_HEADER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\*\*[^*\n]+\*\*[ \t]*\n[ \t]*\n").ok());

static BULLET: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n\*[ \t]+").ok());

static PREAMBLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:okay|ok|sure|alright|absolutely|certainly|here(?:'|’)?s|here is)\b[^:\n]*\b(?:post|tweet|content)\b[^:\n]*:\s*",
    )
    .ok()
});

static INSTRUCTION_ECHO: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:post|tweet|share)\s+(?:about|on|for)\b[^:\n]*:\s*").ok());

static X_WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\bx\b").ok());

/// Lead-in words that mark the text before a colon as a label.
const LEAD_IN_WORDS: [&str; 4] = ["post", "tweet", "share", "content"];

/// Sentence cuts must land past this character position.
const MIN_SENTENCE_CUT: usize = 180;
/// How far before the limit a sentence end may be.
const SENTENCE_WINDOW: usize = 100;
/// How far before `limit - 3` a word boundary may be.
const WORD_MARGIN: usize = 30;

const ELLIPSIS: &str = "...";

/// Normalize `raw` into a message of at most `limit` characters.
pub fn sanitize(raw: &str, limit: usize) -> String {
    let text = raw.trim();
    let text = replace(&TITLE_HEADER, text, "");
    let text = replace(&BULLET, &text, "\n• ");
    let text = clean_payload(&text);
    let text = text.replace("**", "").replace('*', "");
    truncate(text.trim(), limit)
}

/// Preamble, quote and lead-in stripping without length handling.
pub fn clean_payload(text: &str) -> String {
    let text = strip_preamble(text.trim());
    let text = strip_quotes(&text);
    strip_lead_in(&text)
}

fn replace(re: &LazyLock<Option<Regex>>, text: &str, with: &str) -> String {
    match re.as_ref() {
        Some(re) => re.replace_all(text, with).into_owned(),
        None => text.to_string(),
    }
}

fn is_match(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

fn strip_preamble(text: &str) -> String {
    let text = replace(&PREAMBLE, text, "");
    let text = replace(&INSTRUCTION_ECHO, text.trim(), "");
    text.trim().to_string()
}

fn strip_quotes(text: &str) -> String {
    const PAIRS: [(char, char); 4] = [('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')];

    let mut chars = text.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return text.to_string();
    };

    if PAIRS.iter().any(|&(open, close)| first == open && last == close) {
        chars.as_str().trim().to_string()
    } else {
        text.to_string()
    }
}

fn strip_lead_in(text: &str) -> String {
    let Some(idx) = text.find(':') else {
        return text.to_string();
    };

    let before = text[..idx].to_lowercase();
    let is_label = LEAD_IN_WORDS.iter().any(|w| before.contains(w)) || is_match(&X_WORD, &before);
    let rest = text[idx + 1..].trim();

    if is_label && !rest.is_empty() {
        rest.to_string()
    } else {
        text.to_string()
    }
}

fn truncate(text: &str, limit: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return text.to_string();
    }
    if limit <= ELLIPSIS.len() {
        return chars[..limit].iter().collect();
    }

    // Sentence end within the window before the limit
    let window_start = limit.saturating_sub(SENTENCE_WINDOW).max(MIN_SENTENCE_CUT);
    if let Some(end) = (window_start..limit).rev().find(|&i| matches!(chars[i], '.' | '!' | '?')) {
        return chars[..=end].iter().collect::<String>().trim_end().to_string();
    }

    let budget = limit - ELLIPSIS.len();

    // Word boundary within the margin
    let margin_start = budget.saturating_sub(WORD_MARGIN).max(1);
    if let Some(space) = (margin_start..=budget).rev().find(|&i| chars[i].is_whitespace()) {
        let head: String = chars[..space].iter().collect();
        return format!("{}{ELLIPSIS}", head.trim_end());
    }

    let head: String = chars[..budget].iter().collect();
    format!("{head}{ELLIPSIS}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 280;

    #[test]
    fn every_pattern_compiles() {
        for re in [&TITLE_HEADER, &BULLET, &PREAMBLE, &INSTRUCTION_ECHO, &X_WORD] {
            assert!(re.is_some());
        }
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(sanitize("Rust 1.88 is out today", LIMIT), "Rust 1.88 is out today");
    }

    #[test]
    fn strips_title_header() {
        let raw = "**X Post:**\n\nShipping a new release today";
        assert_eq!(sanitize(raw, LIMIT), "Shipping a new release today");
    }

    #[test]
    fn converts_bullets() {
        let raw = "Release notes\n*   faster builds\n*   smaller binaries";
        assert_eq!(
            sanitize(raw, LIMIT),
            "Release notes\n• faster builds\n• smaller binaries"
        );
    }

    #[test]
    fn strips_conversational_preamble() {
        assert_eq!(
            sanitize("Sure! Here's a tweet about Rust: Fearless concurrency rocks", LIMIT),
            "Fearless concurrency rocks"
        );
        assert_eq!(
            sanitize("Okay, here is the post content:\n\nHello world", LIMIT),
            "Hello world"
        );
    }

    #[test]
    fn strips_instruction_echo() {
        assert_eq!(
            clean_payload("Post about rust on twitter: Ownership is neat"),
            "Ownership is neat"
        );
    }

    #[test]
    fn strips_surrounding_quotes() {
        assert_eq!(sanitize("\"hello world\"", LIMIT), "hello world");
        assert_eq!(sanitize("“hello world”", LIMIT), "hello world");
        assert_eq!(sanitize("'hello world'", LIMIT), "hello world");
        // Mismatched quotes stay
        assert_eq!(sanitize("\"hello world'", LIMIT), "\"hello world'");
    }

    #[test]
    fn colon_lead_in_needs_a_label_word() {
        assert_eq!(clean_payload("My X update: new blog is live"), "new blog is live");
        assert_eq!(clean_payload("Tweet text: ship it"), "ship it");
        // "x" inside a word is not the platform
        assert_eq!(clean_payload("Next steps: ship it"), "Next steps: ship it");
        assert_eq!(clean_payload("Time: 10am"), "Time: 10am");
    }

    #[test]
    fn colon_with_empty_remainder_is_kept() {
        assert_eq!(clean_payload("Tweet:"), "Tweet:");
    }

    #[test]
    fn removes_emphasis() {
        assert_eq!(sanitize("**Big** news, *really*", LIMIT), "Big news, really");
    }

    #[test]
    fn long_text_cuts_at_sentence_end() {
        let first = "a".repeat(199) + ".";
        let raw = format!("{first} {}", "b ".repeat(100));
        let out = sanitize(&raw, LIMIT);
        assert_eq!(out, first);
    }

    #[test]
    fn long_text_cuts_at_word_boundary() {
        let raw = "word ".repeat(80);
        let out = sanitize(&raw, LIMIT);
        assert!(out.chars().count() <= LIMIT);
        assert!(out.ends_with("word..."));
    }

    #[test]
    fn long_text_without_boundaries_is_hard_cut() {
        let raw = "z".repeat(400);
        let out = sanitize(&raw, LIMIT);
        assert_eq!(out.chars().count(), LIMIT);
        assert!(out.ends_with("zzz..."));
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let raw = "é".repeat(300);
        let out = sanitize(&raw, LIMIT);
        assert_eq!(out.chars().count(), LIMIT);
    }

    #[test]
    fn output_never_exceeds_limit() {
        let inputs = [
            "x".repeat(1000),
            "Sure, here's a post: ".to_string() + &"lorem ipsum ".repeat(50),
            "One. Two! Three? ".repeat(40),
        ];
        for input in &inputs {
            for limit in [4, 50, 180, 280] {
                assert!(sanitize(input, limit).chars().count() <= limit);
            }
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(sanitize("   ", LIMIT), "");
    }
}
