/// Pixel width of a string in some font. Implemented by the renderer.
pub trait TextMeasure {
    fn text_width(&self, text: &str) -> u32;
}

impl<F> TextMeasure for F
where
    F: Fn(&str) -> u32,
{
    fn text_width(&self, text: &str) -> u32 {
        self(text)
    }
}

/// Greedy word wrap. A word wider than `max_width` still gets a line of its
/// own.
pub fn wrap_text<M>(text: &str, measure: &M, max_width: u32) -> Vec<String>
where
    M: TextMeasure + ?Sized,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{current} {word}");
        if measure.text_width(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Trims trailing characters until `text + ellipsis` fits. Text that already
/// fits is returned unchanged; if nothing fits, the ellipsis alone is.
pub fn truncate_text<M>(text: &str, measure: &M, max_width: u32, ellipsis: &str) -> String
where
    M: TextMeasure + ?Sized,
{
    if measure.text_width(text) <= max_width {
        return text.to_string();
    }

    let mut boundaries: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
    while let Some(cut) = boundaries.pop() {
        let candidate = format!("{}{ellipsis}", text[..cut].trim_end());
        if cut > 0 && measure.text_width(&candidate) <= max_width {
            return candidate;
        }
    }

    ellipsis.to_string()
}

#[cfg(test)]
mod tests {
    use super::{truncate_text, wrap_text};

    fn cells(text: &str) -> u32 {
        text.chars().count() as u32 * 10
    }

    #[test]
    fn wraps_greedily() {
        let lines = wrap_text("Daily sync with the whole team", &cells, 120);
        assert_eq!(lines, vec!["Daily sync", "with the", "whole team"]);
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let lines = wrap_text("a Supercalifragilistic b", &cells, 50);
        assert_eq!(lines, vec!["a", "Supercalifragilistic", "b"]);
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(wrap_text("   ", &cells, 50).is_empty());
    }

    #[test]
    fn truncates_with_ellipsis() {
        assert_eq!(truncate_text("Project planning", &cells, 80, "..."), "Proje...");
        assert_eq!(truncate_text("Gym", &cells, 80, "..."), "Gym");
    }

    #[test]
    fn falls_back_to_bare_ellipsis() {
        assert_eq!(truncate_text("Planning", &cells, 30, "..."), "...");
        assert_eq!(truncate_text("Planning", &cells, 0, "..."), "...");
    }
}
