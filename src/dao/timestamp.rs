use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

/// `2024-05-01T12:30:00.125Z`, millisecond precision in UTC.
const ISO_MILLIS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Current instant as an ISO-8601 string with millisecond precision.
pub fn now_iso() -> String {
    format_iso(OffsetDateTime::now_utc())
}

/// Format an instant the way every stored timestamp is written.
pub fn format_iso(instant: OffsetDateTime) -> String {
    instant
        .to_offset(time::UtcOffset::UTC)
        .format(ISO_MILLIS)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn formats_with_millisecond_precision() {
        let instant = datetime!(2024-05-01 12:30:00.125999 UTC);
        assert_eq!(format_iso(instant), "2024-05-01T12:30:00.125Z");
    }

    #[test]
    fn converts_offsets_to_utc() {
        let instant = datetime!(2024-05-01 14:30:00 +2);
        assert_eq!(format_iso(instant), "2024-05-01T12:30:00.000Z");
    }

    #[test]
    fn successive_timestamps_sort_lexically() {
        let first = now_iso();
        let second = now_iso();
        assert!(first <= second);
    }
}
