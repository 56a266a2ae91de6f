use std::time::Duration;

/// Utility function to create a reasonable timeout for web requests
pub fn calculate_timeout(base_ms: u64, url_length: usize) -> Duration {
    // Longer URLs tend to be generated query pages that respond slower
    let additional_ms = (url_length / 20) as u64 * 100;
    Duration::from_millis(base_ms + additional_ms)
}

/// Convert a title into a filename-safe stem
pub fn sanitize_filename(name: &str) -> String {
    let name: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    // Limit filename length
    if name.len() > 100 {
        name[..100].to_string()
    } else {
        name
    }
}

/// Filename a downloaded PDF is saved under
pub fn pdf_filename(title: &str, fallback: &str) -> String {
    let stem = sanitize_filename(title);
    let stem = if stem.trim_matches('_').is_empty() {
        sanitize_filename(fallback.trim_end_matches(".pdf"))
    } else {
        stem
    };
    if stem.trim_matches('_').is_empty() {
        "document.pdf".to_string()
    } else {
        format!("{}.pdf", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_timeout_grows_with_url() {
        assert_eq!(calculate_timeout(1000, 10), Duration::from_millis(1000));
        assert_eq!(calculate_timeout(1000, 45), Duration::from_millis(1200));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(" Q3 report: 2024/25 "), "Q3_report__2024_25");
        assert_eq!(sanitize_filename(&"x".repeat(150)).len(), 100);
    }

    #[test]
    fn test_pdf_filename() {
        assert_eq!(pdf_filename("Annual report", "a.pdf"), "Annual_report.pdf");
        assert_eq!(pdf_filename("  ", "annual-2024.pdf"), "annual_2024.pdf");
        assert_eq!(pdf_filename("", ""), "document.pdf");
    }
}
