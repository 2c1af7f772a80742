//! Case-insensitive term counting over raw bytes.
//!
//! Content is ASCII case-folded once and every term is searched as a byte
//! sequence in the folded buffer. The snippet comes from the same folded
//! buffer, so a reported snippet always corresponds to a counted occurrence.

use memchr::memmem;

pub const SNIPPET_MAX_CHARS: usize = 50;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMatch {
    pub count: usize,
    pub matched_terms: Vec<String>,
    pub snippet: Option<String>,
}

impl ContentMatch {
    pub fn is_hit(&self) -> bool {
        self.count > 0
    }
}

/// Counts non-overlapping occurrences of every term. `terms` must already be
/// lower-cased.
pub fn match_content(content: &[u8], terms: &[String]) -> ContentMatch {
    let folded = content.to_ascii_lowercase();

    let mut count = 0usize;
    let mut matched_terms = Vec::new();
    for term in terms {
        if term.is_empty() {
            continue;
        }
        let n = memmem::find_iter(&folded, term.as_bytes()).count();
        if n > 0 {
            count += n;
            matched_terms.push(term.clone());
        }
    }

    let snippet = if count > 0 {
        first_matching_line(content, &folded, &matched_terms)
    } else {
        None
    };

    ContentMatch {
        count,
        matched_terms,
        snippet,
    }
}

fn first_matching_line(original: &[u8], folded: &[u8], terms: &[String]) -> Option<String> {
    let mut start = 0usize;
    for line in folded.split(|b| *b == b'\n') {
        let end = start + line.len();
        if terms
            .iter()
            .any(|t| memmem::find(line, t.as_bytes()).is_some())
        {
            let text = String::from_utf8_lossy(&original[start..end]);
            return Some(truncate_snippet(text.trim()));
        }
        start = end + 1;
    }
    None
}

pub fn truncate_snippet(line: &str) -> String {
    if line.chars().count() <= SNIPPET_MAX_CHARS {
        return line.to_string();
    }
    let mut out: String = line.chars().take(SNIPPET_MAX_CHARS).collect();
    out.push_str(ELLIPSIS);
    out
}
