//! Citation normalisation for findings reports
//!
//! Models number sources inconsistently. [`normalize`] renumbers `[n]` markers
//! by first appearance of each unique URL, merges duplicate URLs under one
//! number and rebuilds a single trailing `### Sources` section. Normalising a
//! normalised report returns it unchanged.
//!
//! Source entries may be written as `[n] Title: URL`, `n. Title: URL`,
//! `n) Title: URL` or as an unnumbered line carrying a URL such as a
//! markdown link `- [Title](URL)`.

use std::collections::HashMap;

const SOURCES_HEADER: &str = "### Sources";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Source {
    title: String,
    /// URL, or the raw entry text when no URL is present. Used as the identity.
    key: String,
    has_url: bool,
    /// Text following the URL.
    note: String,
}

impl Source {
    fn render(&self, number: usize) -> String {
        let mut line = match (self.has_url, self.title.is_empty()) {
            (true, false) => format!("[{}] {}: {}", number, self.title, self.key),
            _ => format!("[{}] {}", number, self.key),
        };
        if !self.note.is_empty() {
            line.push(' ');
            line.push_str(&self.note);
        }
        line
    }
}

/// A `[n]` or `[n, m]` marker in the report body, as a byte range.
struct Marker {
    start: usize,
    end: usize,
    numbers: Vec<usize>,
}

/// Renumber citations and rebuild the sources section.
///
/// Reports without a sources section, or whose sources section holds no
/// recognisable entry, are returned trimmed and otherwise untouched. Sources
/// never cited in the body are listed after the cited ones. Markers whose
/// number has no source are moved above the renumbered range so they can
/// never point at another source. Lines of the section that are not source
/// entries are kept after the list.
pub fn normalize(report: &str) -> String {
    let Some((body, source_lines)) = split_sources(report) else {
        return report.trim().to_string();
    };

    let mut by_number: HashMap<usize, usize> = HashMap::new();
    let mut sources: Vec<Source> = Vec::new();
    let mut trailing: Vec<&str> = Vec::new();
    for line in source_lines {
        let Some((number, source)) = parse_source_line(line) else {
            if !line.trim().is_empty() {
                trailing.push(line.trim());
            }
            continue;
        };
        let index = match sources.iter().position(|s| s.key == source.key) {
            Some(index) => index,
            None => {
                sources.push(source);
                sources.len() - 1
            }
        };
        if let Some(number) = number {
            by_number.entry(number).or_insert(index);
        }
    }
    if sources.is_empty() {
        return report.trim().to_string();
    }

    let markers = find_markers(body);

    // New number for each source index, assigned by first citation.
    let mut assigned: Vec<Option<usize>> = vec![None; sources.len()];
    let mut order: Vec<usize> = Vec::new();
    for marker in &markers {
        for number in &marker.numbers {
            if let Some(&index) = by_number.get(number) {
                if assigned[index].is_none() {
                    order.push(index);
                    assigned[index] = Some(order.len());
                }
            }
        }
    }
    for index in 0..sources.len() {
        if assigned[index].is_none() {
            order.push(index);
            assigned[index] = Some(order.len());
        }
    }

    // Dangling numbers continue after the last source, by first appearance.
    let mut dangling: HashMap<usize, usize> = HashMap::new();
    for marker in &markers {
        for number in &marker.numbers {
            if !by_number.contains_key(number) && !dangling.contains_key(number) {
                let next = sources.len() + dangling.len() + 1;
                dangling.insert(*number, next);
            }
        }
    }

    let mut rewritten = String::with_capacity(body.len());
    let mut cursor = 0;
    for marker in &markers {
        rewritten.push_str(&body[cursor..marker.start]);
        let mut numbers: Vec<String> = Vec::with_capacity(marker.numbers.len());
        for number in &marker.numbers {
            let renumbered = match by_number.get(number) {
                Some(&index) => assigned[index],
                None => dangling.get(number).copied(),
            }
            .unwrap_or(*number)
            .to_string();
            if !numbers.contains(&renumbered) {
                numbers.push(renumbered);
            }
        }
        rewritten.push('[');
        rewritten.push_str(&numbers.join(", "));
        rewritten.push(']');
        cursor = marker.end;
    }
    rewritten.push_str(&body[cursor..]);

    let mut output = rewritten.trim().to_string();
    if !output.is_empty() {
        output.push_str("\n\n");
    }
    output.push_str(SOURCES_HEADER);
    for (position, &index) in order.iter().enumerate() {
        output.push('\n');
        output.push_str(&sources[index].render(position + 1));
    }
    for line in trailing {
        output.push('\n');
        output.push_str(line);
    }
    output
}

/// Split at the last sources header line.
fn split_sources(report: &str) -> Option<(&str, Vec<&str>)> {
    let mut offset = 0;
    let mut header: Option<(usize, usize)> = None;
    for line in report.split_inclusive('\n') {
        if is_sources_header(line) {
            header = Some((offset, offset + line.len()));
        }
        offset += line.len();
    }
    let (start, end) = header?;
    Some((&report[..start], report[end..].lines().collect()))
}

fn is_sources_header(line: &str) -> bool {
    let stripped = line
        .trim()
        .trim_start_matches('#')
        .trim_matches(|c: char| c == '*' || c == ':' || c.is_whitespace());
    stripped.eq_ignore_ascii_case("sources")
}

/// Parse one line of the sources section.
///
/// Numbered entries may lack a URL; unnumbered ones must carry one.
fn parse_source_line(line: &str) -> Option<(Option<usize>, Source)> {
    let line = line
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '*')
        .trim_start();
    if let Some((number, entry)) = split_number(line) {
        return parse_entry(entry).map(|source| (Some(number), source));
    }
    let source = parse_entry(line)?;
    source.has_url.then_some((None, source))
}

/// Leading `[n]`, `n.` or `n)`.
fn split_number(line: &str) -> Option<(usize, &str)> {
    let (digits, rest) = match line.strip_prefix('[') {
        Some(rest) => {
            let close = rest.find(']')?;
            (&rest[..close], &rest[close + 1..])
        }
        None => {
            let end = line.find(|c: char| c == '.' || c == ')')?;
            (&line[..end], &line[end + 1..])
        }
    };
    let digits = digits.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, rest.trim()))
}

fn parse_entry(entry: &str) -> Option<Source> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    if let Some(source) = parse_markdown_link(entry) {
        return Some(source);
    }

    let url_start = entry.find("https://").or_else(|| entry.find("http://"));
    let source = match url_start {
        Some(start) => {
            let token = entry[start..].split_whitespace().next().unwrap_or_default();
            let url = token.trim_end_matches(|c: char| c == ')' || c == '>' || c == ',');
            let title = entry[..start]
                .trim()
                .trim_start_matches('<')
                .trim_end_matches(|c: char| c == ':' || c == '-' || c == '(' || c == '<')
                .trim();
            Source {
                title: title.to_string(),
                key: url.to_string(),
                has_url: true,
                note: entry[start + token.len()..].trim().to_string(),
            }
        }
        None => Source {
            title: String::new(),
            key: entry.to_string(),
            has_url: false,
            note: String::new(),
        },
    };
    Some(source)
}

/// `[Title](URL) trailing text`
fn parse_markdown_link(entry: &str) -> Option<Source> {
    let rest = entry.strip_prefix('[')?;
    let close = rest.find("](")?;
    let url_start = close + 2;
    let url_end = url_start + rest[url_start..].find(')')?;
    let url = rest[url_start..url_end].trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return None;
    }
    Some(Source {
        title: rest[..close].trim().to_string(),
        key: url.to_string(),
        has_url: true,
        note: rest[url_end + 1..].trim().to_string(),
    })
}

fn find_markers(body: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut search_from = 0;
    while let Some(open) = body[search_from..].find('[').map(|i| i + search_from) {
        let Some(close) = body[open..].find(']').map(|i| i + open) else {
            break;
        };
        let inner = &body[open + 1..close];
        let numbers: Option<Vec<usize>> = inner
            .split(',')
            .map(|part| {
                let part = part.trim();
                if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse().ok()
                } else {
                    None
                }
            })
            .collect();
        match numbers {
            Some(numbers) => {
                markers.push(Marker {
                    start: open,
                    end: close + 1,
                    numbers,
                });
                search_from = close + 1;
            }
            None => search_from = open + 1,
        }
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "\
**Fully Comprehensive Findings**
Rust is fast [3]. It is memory safe [1]. Ferris is the mascot [3, 2].

**List of All Relevant Sources**
### Sources
[1] Rust Book: https://doc.rust-lang.org/book/
[2] Ferris: https://rustacean.net/
[3] Rust Site: https://www.rust-lang.org/
[4] Rust Site again: https://www.rust-lang.org/
";

    #[test]
    fn test_renumbers_by_first_appearance() {
        let normalized = normalize(RAW);
        assert!(normalized.contains("Rust is fast [1]. It is memory safe [2]. Ferris is the mascot [1, 3]."));
        assert!(normalized.ends_with(
            "### Sources\n\
             [1] Rust Site: https://www.rust-lang.org/\n\
             [2] Rust Book: https://doc.rust-lang.org/book/\n\
             [3] Ferris: https://rustacean.net/"
        ));
    }

    #[test]
    fn test_duplicate_urls_merge() {
        let report = "A [1] and B [2].\n\n### Sources\n[1] One: https://a.example\n[2] Same: https://a.example\n";
        assert_eq!(
            normalize(report),
            "A [1] and B [1].\n\n### Sources\n[1] One: https://a.example"
        );
    }

    #[test]
    fn test_idempotent() {
        let once = normalize(RAW);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_uncited_sources_follow_cited_ones() {
        let report = "Only [2].\n\n## Sources\n- [1] First: https://one.example\n- [2] Second: https://two.example";
        assert_eq!(
            normalize(report),
            "Only [1].\n\n### Sources\n[1] Second: https://two.example\n[2] First: https://one.example"
        );
    }

    #[test]
    fn test_unknown_markers_move_above_sources() {
        let report = "See [9] and [docs](https://x.example) [1].\n\n### Sources\n[1] Docs: https://x.example";
        assert_eq!(
            normalize(report),
            "See [2] and [docs](https://x.example) [1].\n\n### Sources\n[1] Docs: https://x.example"
        );
    }

    #[test]
    fn test_unknown_marker_never_takes_a_renumbered_slot() {
        let report = "A [3]. B [1].\n\n### Sources\n[3] S: https://s.example\n";
        let normalized = normalize(report);
        assert_eq!(
            normalized,
            "A [1]. B [2].\n\n### Sources\n[1] S: https://s.example"
        );
        assert_eq!(normalize(&normalized), normalized);
    }

    #[test]
    fn test_numbered_lists_and_markdown_links() {
        let report = "Rust is fast [1].\n\n### Sources\n1. Rust Site: https://www.rust-lang.org/\n- [Rust Book](https://doc.rust-lang.org/book/)\n";
        let normalized = normalize(report);
        assert_eq!(
            normalized,
            "Rust is fast [1].\n\n### Sources\n\
             [1] Rust Site: https://www.rust-lang.org/\n\
             [2] Rust Book: https://doc.rust-lang.org/book/"
        );
        assert_eq!(normalize(&normalized), normalized);
    }

    #[test]
    fn test_parenthesised_numbers_and_trailing_text_kept() {
        let report = "Uses QUIC [2].\n\n## Sources\n2) RFC 9000: https://www.rfc-editor.org/rfc/rfc9000 (IETF)\nAccessed in 2024.";
        let normalized = normalize(report);
        assert_eq!(
            normalized,
            "Uses QUIC [1].\n\n### Sources\n\
             [1] RFC 9000: https://www.rfc-editor.org/rfc/rfc9000 (IETF)\n\
             Accessed in 2024."
        );
        assert_eq!(normalize(&normalized), normalized);
    }

    #[test]
    fn test_unrecognised_sources_section_is_kept() {
        let report = "Findings [1].\n\n### Sources\nsee the appendix\n";
        assert_eq!(normalize(report), report.trim());
    }

    #[test]
    fn test_report_without_sources_is_kept() {
        assert_eq!(normalize("  plain findings [1]\n"), "plain findings [1]");
    }
}
