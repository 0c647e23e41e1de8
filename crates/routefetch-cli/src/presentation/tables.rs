//! Table formatting utilities for CLI output.

use routefetch_core::{DownloadState, DownloadSummary};

/// Truncates a string to a maximum number of characters, adding "..." if needed.
///
/// # Examples
///
/// ```rust
/// use routefetch_cli::presentation::truncate_string;
///
/// assert_eq!(truncate_string("Hello", 10), "Hello");
/// assert_eq!(truncate_string("Hello World", 8), "Hello...");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Format an optional value for table display, returning a default if None.
pub fn format_optional<T: std::fmt::Display>(value: Option<&T>, default: &str) -> String {
    value.map_or_else(|| default.to_string(), ToString::to_string)
}

/// Print the final outcome of every download.
pub fn print_summary(items: &[DownloadSummary]) {
    println!(
        "{:<8} {:<28} {:<12} {:>12} {:>12}  TARGET",
        "ID", "DESCRIPTION", "STATE", "BYTES", "EXPECTED"
    );
    print_separator(92);
    for item in items {
        println!(
            "{:<8} {:<28} {:<12} {:>12} {:>12}  {}",
            item.id.to_string(),
            truncate_string(&item.description, 28),
            item.state.to_string(),
            item.bytes_transferred,
            format_optional(item.expected_size.as_ref(), "-"),
            item.target.display()
        );
        if let Some(error) = &item.error {
            println!("         {error}");
        }
    }
    print_separator(92);
    let failed = items
        .iter()
        .filter(|item| item.state == DownloadState::Failed)
        .count();
    println!("{} succeeded, {failed} failed", items.len() - failed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate_string("ünïcödé-stríng", 8), "ünïcö...");
        assert_eq!(truncate_string("short", 5), "short");
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(Some(&42), "-"), "42");
        assert_eq!(format_optional::<u64>(None, "-"), "-");
    }
}
