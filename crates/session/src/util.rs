use std::path::Path;
use time::UtcDateTime;

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human readable size with up to two decimals (`1.5 MB`, `60 MB`).
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

pub(crate) fn large_file_advisory(size: u64) -> String {
    format!("Large file ({}). Processing may be slow.", format_file_size(size))
}

/// `20250102_030405`, in UTC.
fn timestamp(at: UtcDateTime) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

pub(crate) fn merged_filename(at: UtcDateTime) -> String {
    format!("merged_pdf_{}.pdf", timestamp(at))
}

pub(crate) fn converted_filename(at: UtcDateTime) -> String {
    format!("images_to_pdf_{}.pdf", timestamp(at))
}

/// `report.pdf` becomes `report_compressed.pdf`.
pub(crate) fn compressed_filename(name: &str) -> String {
    let path = Path::new(name);
    let is_pdf = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
    let stem = match path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) if is_pdf => stem,
        _ => name,
    };
    format!("{stem}_compressed.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::{Date, Month, Time};

    #[rstest]
    #[case(0, "0 Bytes")]
    #[case(512, "512 Bytes")]
    #[case(1024, "1 KB")]
    #[case(1536, "1.5 KB")]
    #[case(2_621_440, "2.5 MB")]
    #[case(62_914_560, "60 MB")]
    #[case(1_234_567, "1.18 MB")]
    #[case(5 * 1024 * 1024 * 1024, "5 GB")]
    #[case(3 * 1024 * 1024 * 1024 * 1024, "3072 GB")]
    fn test_format_file_size(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_file_size(bytes), expected);
    }

    #[test]
    fn advisory_message() {
        assert_eq!(
            large_file_advisory(62_914_560),
            "Large file (60 MB). Processing may be slow."
        );
    }

    #[test]
    fn timestamped_names() {
        let date = Date::from_calendar_date(2025, Month::January, 2).unwrap();
        let at = UtcDateTime::new(date, Time::from_hms(3, 4, 5).unwrap());
        assert_eq!(merged_filename(at), "merged_pdf_20250102_030405.pdf");
        assert_eq!(converted_filename(at), "images_to_pdf_20250102_030405.pdf");
    }

    #[rstest]
    #[case("report.pdf", "report_compressed.pdf")]
    #[case("Report.PDF", "Report_compressed.pdf")]
    #[case("archive.v2.pdf", "archive.v2_compressed.pdf")]
    #[case("download", "download_compressed.pdf")]
    fn test_compressed_filename(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(compressed_filename(name), expected);
    }
}
