//! CLI output formatting.
//!
//! Every command has a `format_*` function returning lines (testable) and a
//! thin `print_*` wrapper. Sources are the header line; per-request detail
//! is indented below them.
//!
//! # Output Format
//!
//! ## Thumb
//!
//! ```text
//! photos/dawn.jpg
//!     200x200 fill: 200x200 (generated)
//!         Saved: out/dawn_200x200.png
//! photos/dusk.jpg
//!     200x200 fill: 200x200 (cached)
//! Cache: 1 cached, 1 generated (2 total)
//! ```
//!
//! ## Compare
//!
//! ```text
//! 640x480, 2 changed regions
//!     001 (10, 20) 30x10
//!     002 (300, 120) 20x20
//! ```

use crate::cache::CacheStats;
use crate::imaging::{Rect, ResizeMode};
use std::path::Path;

/// Whether a thumbnail came from a cache or was generated for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cached,
    Generated,
}

/// One thumbnail request, as reported by the `thumb` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbReport<'a> {
    pub source: &'a Path,
    pub requested: (u32, u32),
    pub mode: ResizeMode,
    pub produced: (u32, u32),
    pub origin: Origin,
    pub saved_to: Option<&'a Path>,
}

fn format_index(pos: usize) -> String {
    format!("{:03}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn size(dims: (u32, u32)) -> String {
    format!("{}x{}", dims.0, dims.1)
}

pub fn format_thumb_report(report: &ThumbReport<'_>) -> Vec<String> {
    let origin = match report.origin {
        Origin::Cached => "cached",
        Origin::Generated => "generated",
    };
    let mut lines = vec![
        report.source.display().to_string(),
        format!(
            "{}{} {}: {} ({})",
            indent(1),
            size(report.requested),
            report.mode,
            size(report.produced),
            origin
        ),
    ];
    if let Some(saved) = report.saved_to {
        lines.push(format!("{}Saved: {}", indent(2), saved.display()));
    }
    lines
}

pub fn print_thumb_report(report: &ThumbReport<'_>) {
    for line in format_thumb_report(report) {
        println!("{}", line);
    }
}

/// Origin of a lookup, judged by how the service's counters moved.
pub fn origin_from_stats(before: &CacheStats, after: &CacheStats) -> Origin {
    if after.generated > before.generated {
        Origin::Generated
    } else {
        Origin::Cached
    }
}

pub fn format_stats(stats: &CacheStats) -> String {
    format!("Cache: {}", stats)
}

pub fn format_compare_output(dimensions: (u32, u32), changes: &[Rect]) -> Vec<String> {
    let noun = if changes.len() == 1 { "region" } else { "regions" };
    let mut lines = vec![format!(
        "{}, {} changed {}",
        size(dimensions),
        changes.len(),
        noun
    )];
    for (i, rect) in changes.iter().enumerate() {
        lines.push(format!(
            "{}{} ({}, {}) {}x{}",
            indent(1),
            format_index(i + 1),
            rect.x,
            rect.y,
            rect.width,
            rect.height
        ));
    }
    lines
}

pub fn print_compare_output(dimensions: (u32, u32), changes: &[Rect]) {
    for line in format_compare_output(dimensions, changes) {
        println!("{}", line);
    }
}

pub fn format_clear_output(root: &Path) -> String {
    format!("Cleared {}", root.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumb_report_generated_with_saved_path() {
        let report = ThumbReport {
            source: Path::new("photos/dawn.jpg"),
            requested: (200, 200),
            mode: ResizeMode::Fill,
            produced: (200, 200),
            origin: Origin::Generated,
            saved_to: Some(Path::new("out/dawn_200x200.png")),
        };
        assert_eq!(
            format_thumb_report(&report),
            vec![
                "photos/dawn.jpg",
                "    200x200 fill: 200x200 (generated)",
                "        Saved: out/dawn_200x200.png",
            ]
        );
    }

    #[test]
    fn thumb_report_cached_fit() {
        let report = ThumbReport {
            source: Path::new("a.png"),
            requested: (200, 200),
            mode: ResizeMode::Fit,
            produced: (200, 150),
            origin: Origin::Cached,
            saved_to: None,
        };
        let lines = format_thumb_report(&report);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "    200x200 fit: 200x150 (cached)");
    }

    #[test]
    fn origin_follows_generated_counter() {
        let before = CacheStats::default();
        let mut after = before;
        after.disk_hit();
        assert_eq!(origin_from_stats(&before, &after), Origin::Cached);
        after.generate();
        assert_eq!(origin_from_stats(&before, &after), Origin::Generated);
    }

    #[test]
    fn compare_output_lists_regions() {
        let lines = format_compare_output(
            (640, 480),
            &[Rect::new(10, 20, 30, 10), Rect::new(300, 120, 20, 20)],
        );
        assert_eq!(
            lines,
            vec![
                "640x480, 2 changed regions",
                "    001 (10, 20) 30x10",
                "    002 (300, 120) 20x20",
            ]
        );
    }

    #[test]
    fn compare_output_singular_and_empty() {
        assert_eq!(
            format_compare_output((10, 10), &[Rect::new(0, 0, 10, 10)])[0],
            "10x10, 1 changed region"
        );
        assert_eq!(
            format_compare_output((10, 10), &[]),
            vec!["10x10, 0 changed regions"]
        );
    }

    #[test]
    fn stats_line() {
        let stats = CacheStats {
            disk_hits: 1,
            generated: 1,
            ..Default::default()
        };
        assert_eq!(format_stats(&stats), "Cache: 1 cached, 1 generated (2 total)");
    }
}
