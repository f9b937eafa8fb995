//! Inbound response decoding.
//!
//! A line carries one or more `$<cell>:<value>` segments, each optionally
//! followed by `,<crc8>`. The checksum is matched so it does not bleed into the
//! next segment, but its content is never checked.

use once_cell::sync::Lazy;
use regex::Regex;

use super::CellId;

static SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(\d+):([0-9A-Za-z.\-]+)(?:,[0-9A-Za-z]*)?").expect("segment pattern is valid")
});

/// One `(cell, value)` pair taken from a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub cell: CellId,
    pub value: String,
}

impl ParsedResponse {
    pub fn new(cell: CellId, value: impl Into<String>) -> Self {
        Self {
            cell,
            value: value.into(),
        }
    }
}

/// Extract every tagged segment of `line`, left to right.
///
/// Segments addressing a cell outside 1..=255 are skipped. An empty result
/// means the line did not match the grammar at all.
pub fn parse_line(line: &str) -> Vec<ParsedResponse> {
    SEGMENT
        .captures_iter(line)
        .filter_map(|caps| {
            let cell = caps[1].parse::<u32>().ok().and_then(CellId::new);
            match cell {
                Some(cell) => Some(ParsedResponse::new(cell, &caps[2])),
                None => {
                    log::debug!("Dropping segment for out-of-range cell '{}'", &caps[1]);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(line: &str) -> Vec<(u8, String)> {
        parse_line(line)
            .into_iter()
            .map(|r| (r.cell.get(), r.value))
            .collect()
    }

    #[test]
    fn single_segment_with_crc() {
        assert_eq!(pairs("$1:10,AA"), vec![(1, "10".to_string())]);
    }

    #[test]
    fn several_segments_keep_order() {
        assert_eq!(
            pairs("$10:123$20:432,7F"),
            vec![(10, "123".to_string()), (20, "432".to_string())]
        );
        assert_eq!(
            pairs("$3:-1.5,0C$4:ok,1D$2:7"),
            vec![
                (3, "-1.5".to_string()),
                (4, "ok".to_string()),
                (2, "7".to_string())
            ]
        );
    }

    #[test]
    fn crc_is_not_validated() {
        assert_eq!(pairs("$5:99,ZZ"), vec![(5, "99".to_string())]);
        assert_eq!(pairs("$5:99,"), vec![(5, "99".to_string())]);
        assert_eq!(pairs("$5:99"), vec![(5, "99".to_string())]);
    }

    #[test]
    fn noise_around_segments_is_ignored() {
        assert_eq!(
            pairs("boot ok $7:1.25,3C trailing"),
            vec![(7, "1.25".to_string())]
        );
    }

    #[test]
    fn garbage_and_truncated_lines_yield_nothing() {
        assert!(parse_line("garbage").is_empty());
        assert!(parse_line("").is_empty());
        assert!(parse_line("$1:").is_empty());
        assert!(parse_line("$12").is_empty());
        assert!(parse_line("$:5,AA").is_empty());
    }

    #[test]
    fn out_of_range_cells_are_dropped() {
        assert_eq!(pairs("$0:1$256:2$9:3"), vec![(9, "3".to_string())]);
        assert!(parse_line("$99999999999999999999:1").is_empty());
    }
}
