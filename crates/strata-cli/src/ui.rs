//! Status lines and the build summary, written to stderr.

use std::time::Duration;

use console::style;
use strata_bundler::BuildResult;

pub fn success(message: &str) {
    eprintln!("{} {}", style("✓").green().bold(), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), style(message).red());
}

/// `0 B`, `512 B`, `1.50 KB`, `2.00 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// One line per emitted layer plus the artifact total.
pub fn print_build_summary(result: &BuildResult) {
    for layer in result.layers.iter().filter(|l| !l.discard) {
        let size = result
            .artifacts
            .get(&layer.path)
            .map_or(0, |bytes| bytes.len() as u64);
        eprintln!(
            "  {:<40} {:>4} modules  {:>10}",
            layer.path,
            layer.modules.len(),
            style(format_size(size)).dim()
        );
    }
    eprintln!(
        "  {} files, {}",
        result.artifacts.len(),
        format_size(result.artifacts.total_size() as u64)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(2 * 1024 * 1024), "2.00 MB");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(40)), "40ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.50s");
    }
}
