//! The search pattern matcher.
//!
//! Extracted text arrives as fixed-format lines
//! `"<offsetA> <offsetB> <payload>"`. A pattern is a `+`-joined sequence of
//! `(offset, length, literal)` triplets; a line matches when every
//! triplet's literal occurs in the payload at its offset. The protocol
//! answer is `"<count>;<offA1>;<offB1>;…;"`, with `"0;"` as the valid
//! zero-match result.

use arclink_core::{ArchiveError, ArchiveResult};

/// One parsed pattern segment.
#[derive(Debug, PartialEq, Eq)]
struct PatternSegment {
    offset: usize,
    literal: String,
}

/// Parses the `+`-joined triplet syntax.
fn parse_pattern(pattern: &str) -> ArchiveResult<Vec<PatternSegment>> {
    let tokens: Vec<&str> = pattern.split('+').collect();
    if tokens.is_empty() || tokens.len() % 3 != 0 {
        return Err(ArchiveError::validation(format!(
            "Malformed search pattern: {pattern}"
        )));
    }

    let mut segments = Vec::with_capacity(tokens.len() / 3);
    for triplet in tokens.chunks(3) {
        let offset: usize = triplet[0].parse().map_err(|_| {
            ArchiveError::validation(format!("Malformed search pattern: {pattern}"))
        })?;
        let length: usize = triplet[1].parse().map_err(|_| {
            ArchiveError::validation(format!("Malformed search pattern: {pattern}"))
        })?;
        let literal = triplet[2];
        if length == 0 || literal.len() != length {
            return Err(ArchiveError::validation(format!(
                "Malformed search pattern: {pattern}"
            )));
        }
        segments.push(PatternSegment {
            offset,
            literal: literal.to_string(),
        });
    }
    Ok(segments)
}

/// Runs the pattern over extracted text.
///
/// Lines that do not follow the `"<offsetA> <offsetB> <payload>"` shape are
/// skipped. At most `num_results` matches are collected.
///
/// # Errors
///
/// Returns a validation error for a malformed pattern.
pub fn match_pattern(
    text: &str,
    pattern: &str,
    case_sensitive: bool,
    num_results: usize,
) -> ArchiveResult<String> {
    let segments = parse_pattern(pattern)?;

    let mut offsets: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if offsets.len() >= num_results {
            break;
        }
        let mut parts = line.splitn(3, ' ');
        let (Some(offset_a), Some(offset_b), Some(payload)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if offset_a.parse::<u64>().is_err() || offset_b.parse::<u64>().is_err() {
            continue;
        }
        if line_matches(payload, &segments, case_sensitive) {
            offsets.push((offset_a.to_string(), offset_b.to_string()));
        }
    }

    let mut result = format!("{};", offsets.len());
    for (offset_a, offset_b) in offsets {
        result.push_str(&offset_a);
        result.push(';');
        result.push_str(&offset_b);
        result.push(';');
    }
    Ok(result)
}

fn line_matches(payload: &str, segments: &[PatternSegment], case_sensitive: bool) -> bool {
    segments.iter().all(|segment| {
        let Some(end) = segment.offset.checked_add(segment.literal.len()) else {
            return false;
        };
        let Some(window) = payload.get(segment.offset..end) else {
            return false;
        };
        if case_sensitive {
            window == segment.literal
        } else {
            window.eq_ignore_ascii_case(&segment.literal)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_matching_lines() {
        let text = "73 138 001 first payload\n211 120 001 second payload\n";
        let result = match_pattern(text, "0+3+001", true, 100).unwrap();
        assert_eq!(result, "2;73;138;211;120;");
    }

    #[test]
    fn test_zero_matches_is_a_valid_result() {
        let text = "73 138 XYZ payload\n";
        assert_eq!(match_pattern(text, "0+3+001", true, 100).unwrap(), "0;");
        assert_eq!(match_pattern("", "0+3+001", true, 100).unwrap(), "0;");
    }

    #[test]
    fn test_num_results_caps_the_matches() {
        let text = "1 2 001a\n3 4 001b\n5 6 001c\n";
        let result = match_pattern(text, "0+3+001", true, 2).unwrap();
        assert_eq!(result, "2;1;2;3;4;");
    }

    #[test]
    fn test_multiple_segments_must_all_match() {
        let text = "10 20 001XX42\n30 40 001XX99\n";
        let result = match_pattern(text, "0+3+001+5+2+42", true, 100).unwrap();
        assert_eq!(result, "1;10;20;");
    }

    #[test]
    fn test_case_sensitivity_flag() {
        let text = "1 2 abc\n";
        assert_eq!(match_pattern(text, "0+3+ABC", true, 100).unwrap(), "0;");
        assert_eq!(match_pattern(text, "0+3+ABC", false, 100).unwrap(), "1;1;2;");
    }

    #[test]
    fn test_malformed_patterns_are_validation_errors() {
        for bad in ["0+3", "x+3+001", "0+y+001", "0+4+001", "0+0+", ""] {
            let err = match_pattern("1 2 001", bad, true, 100).unwrap_err();
            assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST, "{bad}");
        }
    }

    #[test]
    fn test_unparsable_lines_are_skipped() {
        let text = "not a line\n73 138 001ok\nalso bad\n";
        assert_eq!(match_pattern(text, "0+3+001", true, 100).unwrap(), "1;73;138;");
    }

    #[test]
    fn test_segment_beyond_payload_does_not_match() {
        let text = "1 2 ab\n";
        assert_eq!(match_pattern(text, "10+2+ab", true, 100).unwrap(), "0;");
    }

    #[test]
    fn test_offset_near_usize_max_does_not_match() {
        let text = "1 2 ab\n";
        let pattern = format!("{}+2+ab", usize::MAX);
        assert_eq!(match_pattern(text, &pattern, true, 100).unwrap(), "0;");
    }
}
