//! Park document parsing.
//!
//! Park files follow a loose text convention: line 1 is the park name, line 2
//! carries a `State(s):` marker, and a `Description:` section (when present)
//! holds the prose used for embedding. Everything else (directions, hours,
//! fees) stays in the stored content but is excluded from the embedded text.

use crate::models::ParkRecord;

const STATE_MARKER: &str = "State(s):";
const DESCRIPTION_HEADER: &str = "Description:";

/// Multi-word section names that terminate a description.
///
/// The general boundary rule only matches single-word headers like `Fees:`,
/// so headers containing a space need an explicit allow-list. Retained as
/// observed in production data; an unlisted multi-word header is treated as
/// body text.
const KNOWN_SECTIONS: [&str; 3] = ["Directions", "Operating", "Weather"];

/// Parse one raw document into a [`ParkRecord`].
///
/// Returns `None` for documents with fewer than two lines; the caller logs
/// and skips those rather than failing the whole request.
pub fn parse_document(file_name: &str, content: &str) -> Option<ParkRecord> {
    let lines: Vec<&str> = content.split('\n').collect();

    if lines.len() < 2 {
        return None;
    }

    let code = file_stem(file_name).to_string();
    let name = lines[0].trim().to_string();
    let state = {
        let trimmed = lines[1].replace(STATE_MARKER, "");
        let trimmed = trimmed.trim();
        if trimmed.is_empty() {
            "Unknown".to_string()
        } else {
            trimmed.to_string()
        }
    };

    Some(ParkRecord {
        code,
        name,
        state,
        content: content.to_string(),
        description: extract_description(content),
    })
}

/// Extract the `Description:` section body, joined into a single line.
///
/// Falls back to the entire content when the header is absent or the section
/// is empty, so there is always something to embed. Header matching is
/// case-insensitive; body content is preserved as written.
pub fn extract_description(content: &str) -> String {
    let Some(header_at) = find_ignore_ascii_case(content, DESCRIPTION_HEADER) else {
        return content.to_string();
    };

    let start = header_at + DESCRIPTION_HEADER.len();
    let remaining = &content[start..];

    let mut description_lines: Vec<&str> = Vec::new();

    for line in remaining.split('\n') {
        let trimmed = line.trim();

        if !description_lines.is_empty() && is_section_boundary(trimmed) {
            break;
        }

        description_lines.push(trimmed);
    }

    let description = description_lines.join(" ").trim().to_string();
    if description.is_empty() {
        content.to_string()
    } else {
        description
    }
}

/// A line starts a new section when it is non-empty, ends with a colon, and
/// is either a bare header (`Fees:`) or one of the known multi-word headers.
/// In-body colons ("9:00 AM") never sit at the start of a trimmed line with
/// a trailing colon, so they do not trip this.
fn is_section_boundary(trimmed: &str) -> bool {
    if trimmed.is_empty() || !trimmed.ends_with(':') {
        return false;
    }

    if !trimmed.contains(' ') {
        return true;
    }

    KNOWN_SECTIONS.iter().any(|section| {
        trimmed.len() >= section.len()
            && trimmed.as_bytes()[..section.len()].eq_ignore_ascii_case(section.as_bytes())
    })
}

/// Byte offset of the first case-insensitive occurrence of `needle`.
///
/// ASCII-only comparison keeps the offset valid for slicing `haystack`.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// File name without its extension (`acad.txt` -> `acad`).
fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ parse_document ============

    #[test]
    fn parses_code_name_and_state() {
        let record = parse_document("acad.txt", "Acadia National Park\nState(s): ME\n").unwrap();
        assert_eq!(record.code, "acad");
        assert_eq!(record.name, "Acadia National Park");
        assert_eq!(record.state, "ME");
    }

    #[test]
    fn single_line_document_is_skipped() {
        assert!(parse_document("one.txt", "Just a title").is_none());
    }

    #[test]
    fn empty_document_is_skipped() {
        assert!(parse_document("empty.txt", "").is_none());
    }

    #[test]
    fn missing_state_marker_defaults_to_unknown() {
        let record = parse_document("yell.txt", "Yellowstone\n\nDescription:\nGeysers.").unwrap();
        assert_eq!(record.state, "Unknown");
    }

    #[test]
    fn code_keeps_name_without_extension() {
        let record = parse_document("grca", "Grand Canyon\nState(s): AZ").unwrap();
        assert_eq!(record.code, "grca");
    }

    #[test]
    fn content_is_preserved_verbatim() {
        let content = "Zion National Park\nState(s): UT\n\nDescription:\nCanyons.";
        let record = parse_document("zion.txt", content).unwrap();
        assert_eq!(record.content, content);
    }

    // ============ extract_description ============

    #[test]
    fn with_description_section_returns_description() {
        let content = "Park Name\nState(s): CA\n\nDescription:\nA beautiful park with mountains.";
        let result = extract_description(content);
        assert!(result.contains("A beautiful park with mountains."));
    }

    #[test]
    fn no_description_header_returns_entire_content() {
        let content = "Park Name\nState(s): CA\nSome info about the park.";
        assert_eq!(extract_description(content), content);
    }

    #[test]
    fn stops_at_directions() {
        let content = "Park Name\n\nDescription:\nGreat park.\n\nDirections:\nTake I-95 north.";
        let result = extract_description(content);
        assert!(result.contains("Great park."));
        assert!(!result.contains("Take I-95"));
    }

    #[test]
    fn stops_at_operating_hours() {
        let content = "Park Name\n\nDescription:\nWonderful views.\n\nOperating Hours:\nOpen year-round.";
        let result = extract_description(content);
        assert!(result.contains("Wonderful views."));
        assert!(!result.contains("Open year-round"));
    }

    #[test]
    fn stops_at_weather() {
        let content = "Park Name\n\nDescription:\nHistoric site.\n\nWeather:\nMild climate.";
        let result = extract_description(content);
        assert!(result.contains("Historic site."));
        assert!(!result.contains("Mild climate"));
    }

    #[test]
    fn stops_at_single_word_header() {
        let content = "Park Name\n\nDescription:\nLovely scenery.\n\nFees:\n$30 per vehicle.";
        let result = extract_description(content);
        assert!(result.contains("Lovely scenery."));
        assert!(!result.contains("$30 per vehicle"));
    }

    #[test]
    fn multiline_description_joined_with_spaces() {
        let content = "Park\n\nDescription:\nLine one.\nLine two.\nLine three.\n\nDirections:\nGo north.";
        let result = extract_description(content);
        assert!(result.contains("Line one."));
        assert!(result.contains("Line two."));
        assert!(result.contains("Line three."));
        assert!(!result.contains("Go north."));
    }

    #[test]
    fn case_insensitive_header() {
        let content = "Park Name\n\ndescription:\nFound via case-insensitive match.\n\nDirections:\nNorth.";
        let result = extract_description(content);
        assert!(result.contains("Found via case-insensitive match."));
    }

    #[test]
    fn empty_description_section_returns_entire_content() {
        // Empty body between Description: and Directions: trims to nothing,
        // so the fallback returns the whole document.
        let content = "Park Name\n\nDescription:\n\nDirections:\nTake I-95.";
        assert_eq!(extract_description(content), content);
    }

    #[test]
    fn colon_in_text_does_not_stop_prematurely() {
        let content = "Park\n\nDescription:\nThe park hours are 9:00 AM to 5:00 PM daily.\n\nDirections:\nDrive north.";
        let result = extract_description(content);
        assert!(result.contains("9:00 AM to 5:00 PM daily."));
        assert!(!result.contains("Drive north."));
    }

    #[test]
    fn real_park_file_acadia_content() {
        let content = "Acadia National Park\nState(s): ME\n\nDescription:\nAcadia National Park protects the natural beauty of the highest rocky headlands along the Atlantic coastline of the United States, an abundance of habitats, and a rich cultural heritage. Visitors enjoy 27 miles of historic motor roads, 158 miles of hiking trails, and 45 miles of carriage roads.\n\nDirections:\nFrom Boston take I-95 north to Augusta, Maine, then Route 3 east to Ellsworth, and on to Mount Desert Island.\n\nOperating Hours:\nOpen year-round.";
        let result = extract_description(content);
        assert!(result.contains("Acadia National Park protects the natural beauty"));
        assert!(result.contains("45 miles of carriage roads."));
        assert!(!result.contains("From Boston"));
        assert!(!result.contains("Open year-round"));
    }
}
