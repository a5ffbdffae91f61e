//! Markdown stripping for personas that must answer in plain text.
//!
//! Rules run in this order (code fences before inline code, so a fence's
//! backticks are never read as inline-code delimiters):
//!
//! 1. heading markers (`#`)
//! 2. bold (`**x**`, `__x__`), then italic (`*x*`, `_x_`)
//! 3. fenced code blocks (removed with their content)
//! 4. inline code (`` `x` `` → `x`)
//! 5. links (`[text](url)` → `text`)
//! 6. horizontal rules (`---`, `***`, `___` on their own line)
//! 7. bullet (`-`, `*`, `+`) and numbered (`1.`) list markers
//! 8. three or more consecutive newlines collapse to one blank line
//! 9. surrounding whitespace is trimmed
//!
//! Every rule only deletes characters, so [`normalize_markdown`] repeats the
//! pass until the text stops changing. That makes it idempotent even for
//! nested markers such as `- - item`.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD_STARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static BOLD_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"__(.+?)__").unwrap());
static ITALIC_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").unwrap());
static ITALIC_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(.+?)_").unwrap());
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.+?)`").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.+?)\]\(.+?\)").unwrap());
static HORIZONTAL_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[*\-_]{3,}$").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[*\-+]\s+").unwrap());
static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+\.\s+").unwrap());
static EXTRA_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n\n+").unwrap());

fn normalize_once(text: &str) -> String {
    let text = text.replace('#', "");

    let text = BOLD_STARS.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORES.replace_all(&text, "$1");
    let text = ITALIC_STAR.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "$1");

    let text = CODE_FENCE.replace_all(&text, "");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");

    let text = HORIZONTAL_RULE.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "");
    let text = NUMBERED.replace_all(&text, "");

    let text = EXTRA_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Strips markdown formatting, returning plain text.
pub fn normalize_markdown(text: &str) -> String {
    let mut current = normalize_once(text);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
