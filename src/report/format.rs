//! Chat summary rendering.

use std::fmt::Write as _;

/// Count of one configured segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCount {
    pub id: String,
    pub label: String,
    pub member_count: u64,
}

/// Format with English digit grouping: `1234567` → `1,234,567`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the HTML summary posted to chat: segments in order, then the total.
pub fn render_summary(title: &str, segments: &[SegmentCount], total: u64) -> String {
    let mut content = String::new();
    // Writing to a String cannot fail.
    let _ = write!(content, "<strong>{}</strong><ul>", escape_html(title));
    for segment in segments {
        let _ = write!(
            content,
            "<li><strong>{}:</strong> {}</li>",
            escape_html(&segment.label),
            group_thousands(segment.member_count)
        );
    }
    let _ = write!(
        content,
        "<li><strong>Total list members:</strong> {}</li></ul>",
        group_thousands(total)
    );
    content
}
