//! HTML report rendering from accumulated fragment records.
//!
//! The runner collects typed records; everything HTML lives in the askama
//! template, rendered once per engine at the end of a run.

use std::fs;
use std::path::Path;

use askama::Template;

use crate::compare::BestEffort;

/// Outcome of one (page, selector, viewport) triple.
#[derive(Debug, Clone)]
pub struct SectionOutcome {
    /// Base name shared by the triple's images, `{page}-{selector}-{viewport}`
    pub image_name: String,
    /// Display title, e.g. "header Desktop"
    pub title: String,
    /// Whether the capture pair compared equal
    pub equal: bool,
    /// Whether the diff image was actually produced
    pub diff: BestEffort,
}

/// One page's results, wrapped with its id and request key for the heading.
#[derive(Debug, Clone)]
pub struct PageReport {
    pub id: String,
    pub request_key: String,
    pub sections: Vec<SectionOutcome>,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    engine: &'a str,
    pages: &'a [PageReport],
}

/// Render the report document for one engine.
pub fn render(engine: &str, pages: &[PageReport]) -> askama::Result<String> {
    ReportTemplate { engine, pages }.render()
}

/// Write `output.html` into `dir`, overwriting any previous report.
pub fn write_report(dir: &Path, engine: &str, pages: &[PageReport]) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;
    let html = render(engine, pages)?;
    fs::write(dir.join("output.html"), html)?;
    Ok(())
}

/// The stylesheet every report links three levels up from its own folder.
pub const STYLESHEET: &str = include_str!("../assets/visual-regression.css");
pub const STYLESHEET_NAME: &str = "visual-regression.css";

/// Write the shared stylesheet beside the output root when absent, so a
/// fresh checkout produces a browsable report.
pub fn ensure_stylesheet(beside_output_root: &Path) -> std::io::Result<()> {
    let path = beside_output_root.join(STYLESHEET_NAME);
    if !path.exists() {
        fs::write(path, STYLESHEET)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(equal: bool) -> SectionOutcome {
        SectionOutcome {
            image_name: "1-header-Desktop".to_string(),
            title: "header Desktop".to_string(),
            equal,
            diff: BestEffort::Succeeded,
        }
    }

    fn page(sections: Vec<SectionOutcome>) -> PageReport {
        PageReport {
            id: "1".to_string(),
            request_key: "req-1".to_string(),
            sections,
        }
    }

    #[test]
    fn passing_section_renders_pass_marker_only() {
        let pages = [page(vec![outcome(true)])];
        let html = render("chromium", &pages).unwrap();

        assert!(html.contains("Test passed, no diff detected"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn differing_section_renders_triptych() {
        let pages = [page(vec![outcome(false)])];
        let html = render("chromium", &pages).unwrap();

        assert!(!html.contains("Test passed, no diff detected"));
        assert!(html.contains("1-header-Desktop-dev.png"));
        assert!(html.contains("1-header-Desktop-prod.png"));
        assert!(html.contains("1-header-Desktop-diff.png"));
        assert_eq!(html.matches("<img").count(), 3);
    }

    #[test]
    fn report_heads_with_engine_and_page_labels() {
        let pages = [page(vec![outcome(true)])];
        let html = render("firefox", &pages).unwrap();

        assert!(html.contains("<h1>firefox</h1>"));
        assert!(html.contains("1 - req-1"));
        assert!(html.contains("header Desktop"));
    }

    #[test]
    fn stylesheet_is_linked_three_levels_up() {
        let html = render("chromium", &[]).unwrap();
        assert!(html.contains(r#"href="../../../visual-regression.css""#));
    }

    #[test]
    fn write_report_overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();

        write_report(dir.path(), "chromium", &[page(vec![outcome(true)])]).unwrap();
        write_report(dir.path(), "chromium", &[page(vec![outcome(false)])]).unwrap();

        let html = fs::read_to_string(dir.path().join("output.html")).unwrap();
        assert!(!html.contains("Test passed, no diff detected"));
        assert!(html.contains("1-header-Desktop-diff.png"));
    }

    #[test]
    fn ensure_stylesheet_writes_once_and_keeps_edits() {
        let dir = tempfile::tempdir().unwrap();

        ensure_stylesheet(dir.path()).unwrap();
        let path = dir.path().join(STYLESHEET_NAME);
        assert!(path.exists());

        fs::write(&path, "/* customized */").unwrap();
        ensure_stylesheet(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "/* customized */");
    }
}
