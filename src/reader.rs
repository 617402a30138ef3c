//! Fixed-size pagination over extracted book text.

use serde::Serialize;

/// Default page size in characters.
pub const DEFAULT_PAGE_SIZE: usize = 2000;

/// One page of book text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Page content.
    pub content: String,
    /// Offset of the next page, or `None` at the end of the text.
    pub next_position: Option<usize>,
}

/// Slice `text` into a fixed-size window starting at `position`.
///
/// Positions count Unicode codepoints, not bytes; byte offsets would split
/// multi-byte characters in non-ASCII book text. A position at or past the
/// end of the text yields an empty page with no next position.
pub fn paginate(text: &str, position: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total = char_count(text);

    if position >= total {
        return Page {
            content: String::new(),
            next_position: None,
        };
    }

    let content: String = text.chars().skip(position).take(page_size).collect();
    let next = position + page_size;

    Page {
        content,
        next_position: (next < total).then_some(next),
    }
}

/// Count the codepoints of `text` (the unit bookmark positions are stored in).
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_a_codepoint_slice() {
        let text: String = "AB".repeat(1500); // 3000 chars
        let page = paginate(&text, 0, 2000);

        assert_eq!(page.content, text.chars().take(2000).collect::<String>());
        assert_eq!(page.next_position, Some(2000));

        let last = paginate(&text, 2000, 2000);
        assert_eq!(last.content.chars().count(), 1000);
        assert_eq!(last.next_position, None);
    }

    #[test]
    fn multibyte_text_is_sliced_by_codepoints() {
        let text: String = "буква".repeat(500); // 2500 codepoints, 5000 bytes
        let page = paginate(&text, 0, 2000);

        assert_eq!(page.content.chars().count(), 2000);
        assert_eq!(page.next_position, Some(2000));
        assert!(page.content.starts_with("буква"));
    }

    #[test]
    fn empty_text_yields_empty_page() {
        let page = paginate("", 0, 2000);
        assert_eq!(page.content, "");
        assert_eq!(page.next_position, None);
    }

    #[test]
    fn position_past_end_yields_empty_page() {
        let page = paginate("short", 100, 2000);
        assert_eq!(page.content, "");
        assert_eq!(page.next_position, None);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_page() {
        let text: String = "x".repeat(4000);

        let first = paginate(&text, 0, 2000);
        assert_eq!(first.next_position, Some(2000));

        let second = paginate(&text, 2000, 2000);
        assert_eq!(second.content.chars().count(), 2000);
        assert_eq!(second.next_position, None);
    }

    #[test]
    fn pagination_is_idempotent() {
        let text = "идемпотентность".repeat(300);
        assert_eq!(paginate(&text, 700, 2000), paginate(&text, 700, 2000));
    }

    #[test]
    fn following_next_position_reconstructs_the_text() {
        let text: String = "абвгд ежзик ".repeat(700); // 8400 chars
        let mut position = 0;
        let mut rebuilt = String::new();

        loop {
            let page = paginate(&text, position, 2000);
            rebuilt.push_str(&page.content);
            match page.next_position {
                Some(next) => position = next,
                None => break,
            }
        }

        assert_eq!(rebuilt, text);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let page = paginate("abc", 0, 0);
        assert_eq!(page.content, "a");
        assert_eq!(page.next_position, Some(1));
    }
}
