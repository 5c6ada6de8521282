use std::collections::HashSet;
use std::ops::Range;
use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::types::UserId;

static EXTRA_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("invalid regex"));

/// Removes the given byte spans (mentions, the command itself) from the text and tidies up
/// the whitespace left behind. Spans that are out of bounds or split a character are ignored.
pub fn strip_mentions(raw_text: &str, spans: &[Range<usize>]) -> String {
    let mut spans: Vec<&Range<usize>> = spans.iter()
        .filter(|span| span.start < span.end && span.end <= raw_text.len())
        .filter(|span| raw_text.is_char_boundary(span.start) && raw_text.is_char_boundary(span.end))
        .collect();
    spans.sort_by_key(|span| span.start);

    let mut body = String::with_capacity(raw_text.len());
    let mut cursor = 0;
    for span in spans {
        if span.start > cursor {
            body.push_str(&raw_text[cursor..span.start]);
        }
        cursor = cursor.max(span.end);
    }
    if cursor < raw_text.len() {
        body.push_str(&raw_text[cursor..]);
    }

    body.lines()
        .map(|line| EXTRA_SPACES.replace_all(line.trim(), " "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

/// Drops the owner and repeated mentions, keeping the order of the first occurrences.
pub fn distinct_recipients(owner: UserId, candidates: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
    let mut seen = HashSet::new();
    candidates.into_iter()
        .filter(|uid| *uid != owner)
        .filter(|uid| seen.insert(*uid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_mentions_keeps_body() {
        let text = "/announce @alice @bob_the_builder Deploy is at 5pm";
        let spans = [0..9, 10..16, 17..33];
        assert_eq!(strip_mentions(text, &spans), "Deploy is at 5pm");
    }

    #[test]
    fn strip_mentions_in_the_middle() {
        let text = "Hey @alice, please   read\n  the   doc @bob ";
        let spans = [4..10, 38..42];
        assert_eq!(strip_mentions(text, &spans), "Hey , please read\nthe doc");
    }

    #[test]
    fn strip_mentions_only_mentions() {
        let text = "/announce @alice @bob";
        assert_eq!(strip_mentions(text, &[0..9, 10..16, 17..21]), "");
    }

    #[test]
    fn strip_mentions_multibyte() {
        let text = "Привет @вася, читай";
        let start = text.find('@').unwrap();
        let end = text.find(',').unwrap();
        assert_eq!(strip_mentions(text, &[start..end]), "Привет , читай");
        // a span in the middle of a character is ignored
        assert_eq!(strip_mentions(text, &[1..3]), text);
    }

    #[test]
    fn strip_mentions_overlapping_spans() {
        let text = "@alice@bob text";
        assert_eq!(strip_mentions(text, &[0..6, 3..10, 100..120]), "text");
    }

    #[test]
    fn distinct_recipients_without_owner() {
        let owner = UserId(1);
        let candidates = [UserId(2), UserId(1), UserId(3), UserId(2)];
        assert_eq!(distinct_recipients(owner, candidates), vec![UserId(2), UserId(3)]);
        assert!(distinct_recipients(owner, [owner, owner]).is_empty());
    }
}
