//! Markdown change report.
//!
//! Lists URL-only changes, then Substack records grouped by publication, then
//! LinkedIn records. Empty sections are omitted.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{info, instrument};

use citesync_shared::{CitesyncError, Platform, Record, Result};

use crate::batch::RecordChange;

const UNKNOWN_BLOG: &str = "Unknown Blog";

/// Default report file name for the given day, e.g. `Changes_20240301.md`.
pub fn default_report_name(now: NaiveDateTime) -> String {
    format!("Changes_{}.md", now.format("%Y%m%d"))
}

/// Render the report body.
pub fn render_report(changes: &[RecordChange], generated_at: NaiveDateTime) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Zotero Updates Report\n");
    let _ = writeln!(out, "Generated: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S"));

    let mut cleaned: Vec<&RecordChange> = changes
        .iter()
        .filter(|c| c.platform.is_none() && c.original.data.url != c.updated.data.url)
        .collect();
    if !cleaned.is_empty() {
        cleaned.sort_by(|a, b| a.updated.data.title.cmp(&b.updated.data.title));
        let _ = writeln!(out, "## URL Cleaning Updates\n");
        for change in cleaned {
            let _ = writeln!(out, "### {}", heading(&change.updated));
            let _ = writeln!(out, "- Original URL: {}", change.original.data.url);
            let _ = writeln!(out, "- Cleaned URL: {}\n", change.updated.data.url);
        }
    }

    let mut blogs: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
    for change in changes.iter().filter(|c| c.platform == Some(Platform::Substack)) {
        let blog = change.updated.data.container_title().unwrap_or(UNKNOWN_BLOG);
        blogs.entry(blog).or_default().push(&change.updated);
    }
    if !blogs.is_empty() {
        let _ = writeln!(out, "## Substack Updates\n");
        for (blog, mut records) in blogs {
            records.sort_by(|a, b| a.data.title.cmp(&b.data.title));
            let _ = writeln!(out, "### {blog}\n");
            for record in records {
                write_entry(&mut out, "####", record);
            }
        }
    }

    let mut linkedin: Vec<&Record> = changes
        .iter()
        .filter(|c| c.platform == Some(Platform::LinkedIn))
        .map(|c| &c.updated)
        .collect();
    if !linkedin.is_empty() {
        linkedin.sort_by(|a, b| a.data.title.cmp(&b.data.title));
        let _ = writeln!(out, "## LinkedIn Updates\n");
        for record in linkedin {
            write_entry(&mut out, "###", record);
        }
    }

    out
}

fn write_entry(out: &mut String, level: &str, record: &Record) {
    let data = &record.data;
    let _ = writeln!(out, "{level} {}", heading(record));
    let _ = writeln!(out, "- Type: {}", data.item_type);
    let _ = writeln!(out, "- URL: {}", data.url);
    if !data.date.is_empty() {
        let _ = writeln!(out, "- Date: {}", data.date);
    }
    if !data.creators.is_empty() {
        let names: Vec<String> = data.creators.iter().map(|c| c.display_name()).collect();
        let _ = writeln!(out, "- Author(s): {}", names.join(", "));
    }
    out.push('\n');
}

fn heading(record: &Record) -> &str {
    if record.data.title.is_empty() {
        &record.key
    } else {
        &record.data.title
    }
}

/// Write the report to `path`, or to the default dated name in the working
/// directory. Returns the path written.
#[instrument(skip_all, fields(changes = changes.len()))]
pub fn generate_report(changes: &[RecordChange], path: Option<&Path>) -> Result<PathBuf> {
    let now = Local::now().naive_local();
    let target = match path {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(default_report_name(now)),
    };

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CitesyncError::io(parent, e))?;
    }
    std::fs::write(&target, render_report(changes, now))
        .map_err(|e| CitesyncError::io(&target, e))?;

    info!(path = %target.display(), "report written");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use citesync_shared::{Creator, ItemType, RecordData};

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 5)
            .unwrap()
    }

    fn record(key: &str, title: &str, url: &str) -> Record {
        let mut data = RecordData::new(ItemType::BlogPost, url);
        data.title = title.into();
        Record::new(key, data)
    }

    fn substack(title: &str, blog: Option<&str>) -> RecordChange {
        let original = record("S", "", "https://a.substack.com/p/x");
        let mut updated = original.clone();
        updated.data.title = title.into();
        updated.data.blog_title = blog.map(str::to_string);
        updated.data.date = "2024-02-01".into();
        updated.data.creators = vec![Creator::author("Ada", "Lovelace"), Creator::author("Charles", "Babbage")];
        RecordChange { original, updated, platform: Some(Platform::Substack) }
    }

    #[test]
    fn header_and_default_name() {
        let text = render_report(&[], at());
        assert!(text.starts_with("# Zotero Updates Report\n\nGenerated: 2024-03-01 09:30:05\n"));
        assert!(!text.contains("## "));
        assert_eq!(default_report_name(at()), "Changes_20240301.md");
    }

    #[test]
    fn cleaned_urls_show_both_forms() {
        let original = record("K", "Tracked", "https://example.com/a?utm_source=x");
        let mut updated = original.clone();
        updated.data.url = "https://example.com/a".into();
        let text = render_report(&[RecordChange { original, updated, platform: None }], at());

        assert!(text.contains("## URL Cleaning Updates\n\n### Tracked\n"));
        assert!(text.contains("- Original URL: https://example.com/a?utm_source=x\n"));
        assert!(text.contains("- Cleaned URL: https://example.com/a\n"));
        assert!(!text.contains("## Substack Updates"));
    }

    #[test]
    fn substack_entries_grouped_by_blog_and_sorted() {
        let changes = vec![
            substack("Zeta", Some("Field Notes")),
            substack("Alpha", Some("Field Notes")),
            substack("Orphan", None),
            substack("Beta", Some("Abacus")),
        ];
        let text = render_report(&changes, at());

        let abacus = text.find("### Abacus").unwrap();
        let field = text.find("### Field Notes").unwrap();
        let unknown = text.find("### Unknown Blog").unwrap();
        assert!(abacus < field && field < unknown);
        assert!(text.find("#### Alpha").unwrap() < text.find("#### Zeta").unwrap());
        assert!(text.contains("- Type: blogPost\n"));
        assert!(text.contains("- Date: 2024-02-01\n"));
        assert!(text.contains("- Author(s): Ada Lovelace, Charles Babbage\n"));
    }

    #[test]
    fn linkedin_section_lists_full_entries() {
        let original = record("L", "", "https://www.linkedin.com/posts/x?utm_source=share");
        let mut updated = original.clone();
        updated.data.url = "https://www.linkedin.com/posts/x".into();
        updated.data.title = "A post".into();
        updated.data.date = "2024-05-10".into();
        updated.data.creators = vec![Creator::author("Sam", "Lee")];
        let text = render_report(
            &[RecordChange { original, updated, platform: Some(Platform::LinkedIn) }],
            at(),
        );
        assert!(text.contains(
            "## LinkedIn Updates\n\n### A post\n- Type: blogPost\n- URL: https://www.linkedin.com/posts/x\n\
             - Date: 2024-05-10\n- Author(s): Sam Lee\n"
        ));
        assert!(!text.contains("## URL Cleaning Updates"));
    }

    #[test]
    fn writes_report_to_given_path() {
        let dir = std::env::temp_dir().join(format!("citesync-report-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("nested").join("report.md");

        let written = generate_report(&[substack("Alpha", Some("Field Notes"))], Some(&path)).unwrap();
        assert_eq!(written, path);
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("#### Alpha"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
