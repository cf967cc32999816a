//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output is **content-centric, not file-centric**. Every class, topic, and
//! lesson leads with its position and name; the output file, lesson position
//! id, and due dates follow as indented context lines. The result reads as an
//! inventory of what the site will show.
//!
//! # Output Format
//!
//! ## Sync
//!
//! ```text
//! Classes
//! 001 Physics 10 (2 topics, 5 lessons)
//!     Output: data/class-physics-10.json
//!     001 Mechanics (3 lessons)
//!         1-1 Vectors
//!             Due: יום שני, 01.09.2025
//!         1-2 Forces
//! 002 Chemistry: FAILED
//!     cannot list root folder ...
//!
//! Changes: 3 since last run, 2 folders invalidated
//! Cache: listings: 12 cached, 2 fetched; lessons: 4 cached, 1 derived
//! Token: advanced
//! ```
//!
//! ## Check
//!
//! ```text
//! Classes
//! 001 Physics 10 (active)
//!     Folder: 1AbC...
//!     Output: data/class-physics-10.json
//!
//! Cache: cache/
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure.

use crate::config::CrawlConfig;
use crate::sync::{ClassOutcome, SyncReport};
use crate::types::{ClassDocument, ContentNode};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Number of files anywhere inside a content tree.
fn count_files(content: &[ContentNode]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&ContentNode> = content.iter().collect();
    while let Some(node) = stack.pop() {
        match node {
            ContentNode::File { .. } => count += 1,
            ContentNode::Folder { content, .. } => stack.extend(content.iter()),
        }
    }
    count
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_line(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ============================================================================
// Sync output
// ============================================================================

fn document_lines(index: usize, document: &ClassDocument, output: &str) -> Vec<String> {
    let lesson_count: usize = document.topics.iter().map(|t| t.lessons.len()).sum();
    let mut lines = vec![
        format!(
            "{} {} ({}, {})",
            format_index(index),
            document.name,
            plural(document.topics.len(), "topic"),
            plural(lesson_count, "lesson")
        ),
        format!("{}Output: {}", indent(1), output),
    ];
    for (t, topic) in document.topics.iter().enumerate() {
        lines.push(format!(
            "{}{} {} ({})",
            indent(1),
            format_index(t + 1),
            topic.name,
            plural(topic.lessons.len(), "lesson")
        ));
        for lesson in &topic.lessons {
            let files = count_files(&lesson.content);
            let detail = if files > 0 {
                format!(" ({})", plural(files, "file"))
            } else {
                String::new()
            };
            lines.push(format!("{}{} {}{}", indent(2), lesson.id, lesson.name, detail));
            if !lesson.metadata.due_date_display.is_empty() {
                lines.push(format!(
                    "{}Due: {}",
                    indent(3),
                    lesson.metadata.due_date_display
                ));
            }
        }
    }
    lines
}

/// Format the result of a sync run.
pub fn format_sync_output(report: &SyncReport) -> Vec<String> {
    let mut lines = vec!["Classes".to_string()];
    for (i, outcome) in report.classes.iter().enumerate() {
        match outcome {
            ClassOutcome::Written { path, document } => {
                lines.extend(document_lines(i + 1, document, &path.display().to_string()));
            }
            ClassOutcome::Failed { class, error } => {
                lines.push(format!("{} {}: FAILED", format_index(i + 1), class));
                lines.push(format!("{}{}", indent(1), truncate_line(error, 100)));
            }
        }
    }

    lines.push(String::new());
    if report.plan.caching_enabled {
        lines.push(format!(
            "Changes: {} since last run, {} invalidated",
            report.plan.change_count,
            plural(report.plan.invalidated.len(), "folder")
        ));
    } else {
        lines.push("Changes: full crawl, cache not trusted".to_string());
    }
    lines.push(format!("Cache: {}", report.stats.cache));
    if report.stats.failed_reads > 0 || report.stats.failed_listings > 0 {
        lines.push(format!(
            "Degraded: {} failed, {} failed",
            plural(report.stats.failed_reads as usize, "read"),
            plural(report.stats.failed_listings as usize, "listing")
        ));
    }
    lines.push(
        if report.token_committed {
            "Token: advanced"
        } else {
            "Token: unchanged"
        }
        .to_string(),
    );
    lines
}

pub fn print_sync_output(report: &SyncReport) {
    for line in format_sync_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the configured classes without touching the remote store.
pub fn format_check_output(config: &CrawlConfig) -> Vec<String> {
    let mut lines = vec!["Classes".to_string()];
    if config.classes.is_empty() {
        lines.push(format!("{}(none configured)", indent(1)));
    }
    for (i, class) in config.classes.iter().enumerate() {
        let status = if class.active { "active" } else { "inactive" };
        lines.push(format!("{} {} ({})", format_index(i + 1), class.name, status));
        lines.push(format!("{}Folder: {}", indent(1), class.folder_id()));
        lines.push(format!(
            "{}Output: {}",
            indent(1),
            config.data_dir.join(class.output_filename()).display()
        ));
    }
    lines.push(String::new());
    lines.push(format!("Cache: {}/", config.cache_dir.display()));
    lines
}

pub fn print_check_output(config: &CrawlConfig) {
    for line in format_check_output(config) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::changes::RunPlan;
    use crate::crawl::CrawlStats;
    use crate::test_helpers::sample_class;
    use crate::types::{Lesson, LessonMetadata, Topic};
    use std::path::PathBuf;

    fn file(name: &str) -> ContentNode {
        ContentNode::File {
            name: name.into(),
            file_name: format!("{name}.pdf"),
            url: String::new(),
        }
    }

    fn document() -> ClassDocument {
        ClassDocument {
            id: 3,
            name: "Physics 10".into(),
            url_name: "physics-10".into(),
            banner_url: String::new(),
            desc: String::new(),
            tags: vec!["1 Mechanics".into()],
            topics: vec![Topic {
                name: "1 Mechanics".into(),
                id: "1-mechanics".into(),
                lessons: vec![Lesson {
                    name: "1 Vectors".into(),
                    desc: String::new(),
                    id: "1-1".into(),
                    content: vec![
                        file("a"),
                        ContentNode::Folder {
                            name: "Extras".into(),
                            id: "x".into(),
                            content: vec![file("b")],
                        },
                    ],
                    metadata: LessonMetadata {
                        due_date: Some("01-09-25".into()),
                        due_date_display: "יום שני, 01.09.2025".into(),
                        ..Default::default()
                    },
                }],
            }],
            assignments: String::new(),
            active: true,
        }
    }

    fn report(classes: Vec<ClassOutcome>, caching_enabled: bool) -> SyncReport {
        SyncReport {
            plan: RunPlan {
                caching_enabled,
                invalidated: ["F1".to_string(), "F2".to_string()].into(),
                pending_token: Some("9".into()),
                change_count: 3,
            },
            classes,
            stats: CrawlStats {
                cache: CacheStats {
                    listing_hits: 3,
                    listing_fetches: 1,
                    lesson_hits: 1,
                    lesson_misses: 0,
                },
                ..Default::default()
            },
            token_committed: true,
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(999), "999");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "lesson"), "1 lesson");
        assert_eq!(plural(0, "lesson"), "0 lessons");
    }

    #[test]
    fn truncate_line_counts_chars_not_bytes() {
        assert_eq!(truncate_line("שלום עולם", 4), "שלום...");
        assert_eq!(truncate_line("short", 10), "short");
    }

    #[test]
    fn count_files_descends_into_folders() {
        assert_eq!(count_files(&document().topics[0].lessons[0].content), 2);
    }

    // =========================================================================
    // Sync output
    // =========================================================================

    #[test]
    fn sync_output_lists_classes_topics_lessons() {
        let lines = format_sync_output(&report(
            vec![ClassOutcome::Written {
                path: PathBuf::from("data/class-physics-10.json"),
                document: document(),
            }],
            true,
        ));
        assert_eq!(lines[0], "Classes");
        assert_eq!(lines[1], "001 Physics 10 (1 topic, 1 lesson)");
        assert_eq!(lines[2], "    Output: data/class-physics-10.json");
        assert_eq!(lines[3], "    001 1 Mechanics (1 lesson)");
        assert_eq!(lines[4], "        1-1 1 Vectors (2 files)");
        assert_eq!(lines[5], "            Due: יום שני, 01.09.2025");
        assert!(lines.contains(&"Changes: 3 since last run, 2 folders invalidated".to_string()));
        assert!(lines.contains(
            &"Cache: listings: 3 cached, 1 fetched; lessons: 1 cached, 0 derived".to_string()
        ));
        assert_eq!(lines.last().unwrap(), "Token: advanced");
    }

    #[test]
    fn sync_output_shows_failed_class() {
        let lines = format_sync_output(&report(
            vec![ClassOutcome::Failed {
                class: "Chemistry".into(),
                error: "cannot list root folder".into(),
            }],
            false,
        ));
        assert_eq!(lines[1], "001 Chemistry: FAILED");
        assert_eq!(lines[2], "    cannot list root folder");
        assert!(lines.contains(&"Changes: full crawl, cache not trusted".to_string()));
    }

    // =========================================================================
    // Check output
    // =========================================================================

    #[test]
    fn check_output_lists_configured_classes() {
        let config = CrawlConfig {
            classes: vec![sample_class()],
            ..Default::default()
        };
        let lines = format_check_output(&config);
        assert_eq!(lines[1], "001 Physics 10 (active)");
        assert_eq!(lines[2], "    Folder: root");
        assert!(lines[3].ends_with("class-physics-10.json"));
        assert_eq!(lines.last().unwrap(), "Cache: cache/");
    }

    #[test]
    fn check_output_without_classes() {
        let lines = format_check_output(&CrawlConfig::default());
        assert_eq!(lines[1], "    (none configured)");
    }
}
