use crate::tokenizer::term_for_word;
use std::collections::HashSet;

pub const HIGHLIGHT_OPEN: &str = "<b>";
pub const HIGHLIGHT_CLOSE: &str = "</b>";

/// Build up to `max_windows` highlighted excerpts from normalized text.
///
/// Matching positions closer than `window` words are merged into one group;
/// the densest groups win, each rendered as `window` words either side of
/// its middle hit. Without any hit, the leading `2 * window` words are used.
pub fn extract_snippet(normalized_text: &str, query_terms: &[String], window: usize, max_windows: usize) -> String {
    let words: Vec<&str> = normalized_text.split_whitespace().collect();
    let terms: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
    let is_hit = |w: &str| term_for_word(w).map_or(false, |t| terms.contains(t.as_str()));

    let positions: Vec<usize> = words.iter().enumerate().filter(|(_, w)| is_hit(w)).map(|(i, _)| i).collect();
    if positions.is_empty() {
        let lead: Vec<&str> = words.iter().take(window * 2).copied().collect();
        return format!("...{}...", lead.join(" "));
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current = vec![positions[0]];
    for &pos in &positions[1..] {
        let last = *current.last().unwrap_or(&pos);
        if pos - last <= window {
            current.push(pos);
        } else {
            groups.push(std::mem::replace(&mut current, vec![pos]));
        }
    }
    groups.push(current);
    // stable: equally dense groups keep document order
    groups.sort_by(|a, b| b.len().cmp(&a.len()));

    groups
        .iter()
        .take(max_windows)
        .map(|group| {
            let center = group[group.len() / 2];
            let start = center.saturating_sub(window);
            let end = (center + window).min(words.len());
            let fragment: Vec<String> = words[start..end]
                .iter()
                .map(|w| if is_hit(w) { format!("{HIGHLIGHT_OPEN}{w}{HIGHLIGHT_CLOSE}") } else { (*w).to_string() })
                .collect();
            format!("…{}…", fragment.join(" "))
        })
        .collect::<Vec<_>>()
        .join(" ")
}
