//! Per-engine test run: pages × selectors × viewports.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{EngineKind, RunConfig};
use crate::driver::{Driver, DriverError};
use crate::report::{self, PageReport};
use crate::validator;

/// A viewport rendering context applied to both pages before capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportProfile {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

/// The three fixed profiles, in capture order.
pub const VIEWPORTS: [ViewportProfile; 3] = [
    ViewportProfile { label: "Desktop", width: 1024, height: 1000 },
    ViewportProfile { label: "Tablet", width: 768, height: 1000 },
    ViewportProfile { label: "Mobile", width: 375, height: 1000 },
];

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("report error: {0}")]
    Report(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// `{page}-{selector}-{viewport}`: base name shared by a triple's images.
pub fn image_name(page_id: &str, selector: &str, viewport: &str) -> String {
    format!("{page_id}-{selector}-{viewport}")
}

/// Every capture prefix a run will produce for one engine, in iteration
/// order. The capture loop and the report must agree on these; each prefix
/// is unique per (page, selector, viewport) so concurrent writers never
/// share a path.
pub fn capture_prefixes(run_config: &RunConfig, engine: EngineKind) -> Vec<PathBuf> {
    let dir = run_config.engine_dir(engine);
    let mut prefixes = Vec::new();
    for page_id in run_config.config.page_ids.keys() {
        for selector in run_config.config.section_selectors.keys() {
            for viewport in &VIEWPORTS {
                prefixes.push(dir.join(image_name(page_id, selector, viewport.label)));
            }
        }
    }
    prefixes
}

/// Run every configured engine, one independent task each, all writing
/// under the same run folder.
pub async fn run(run_config: RunConfig) -> Result<(), RunError> {
    report::ensure_stylesheet(
        run_config
            .output_root
            .parent()
            .unwrap_or_else(|| Path::new(".")),
    )?;

    let mut tasks = Vec::new();
    for engine in run_config.config.engines.clone() {
        let engine_config = run_config.clone();
        tasks.push(tokio::spawn(async move {
            run_engine(engine, &engine_config).await
        }));
    }
    for task in tasks {
        task.await??;
    }
    Ok(())
}

/// Build one engine's report: iterate pages, selectors, viewports; two
/// browser instances per page, closed once the page is done.
async fn run_engine(engine: EngineKind, run_config: &RunConfig) -> Result<(), RunError> {
    let config = &run_config.config;
    let engine_dir = run_config.engine_dir(engine);
    std::fs::create_dir_all(&engine_dir)?;

    info!(
        "{engine}: {} captures planned",
        capture_prefixes(run_config, engine).len()
    );

    let driver = Driver::connect(engine).await?;
    let mut pages = Vec::new();

    for (page_id, request_key) in &config.page_ids {
        let old_page = driver.open_page().await?;
        let new_page = driver.open_page().await?;
        let mut sections = Vec::new();

        for (selector_label, selector) in &config.section_selectors {
            // Navigation happens once per selector, not per viewport:
            // resizing does not invalidate the loaded document.
            let old_url = format!("{}?id={}", config.urls.old, page_id);
            let new_url = format!("{}?id={}", config.urls.new, page_id);
            tokio::try_join!(old_page.goto(&old_url), new_page.goto(&new_url))?;

            for viewport in &VIEWPORTS {
                info!("{engine} - {page_id} - {selector_label} - {}", viewport.label);
                tokio::try_join!(
                    old_page.set_viewport(viewport.width, viewport.height),
                    new_page.set_viewport(viewport.width, viewport.height),
                )?;

                let name = image_name(page_id, selector_label, viewport.label);
                let prefix = engine_dir.join(&name);
                let title = format!("{selector_label} {}", viewport.label);
                let outcome = validator::validate_section(
                    &old_page, &new_page, selector, &prefix, &name, &title,
                )
                .await?;
                sections.push(outcome);
            }
        }

        old_page.close().await?;
        new_page.close().await?;
        pages.push(PageReport {
            id: page_id.clone(),
            request_key: request_key.clone(),
            sections,
        });
    }

    let skipped_diffs = pages
        .iter()
        .flat_map(|p| &p.sections)
        .filter(|s| !s.diff.succeeded())
        .count();
    if skipped_diffs > 0 {
        warn!("{engine}: {skipped_diffs} diff image(s) could not be generated");
    }

    report::write_report(&engine_dir, &engine.to_string(), &pages)
        .map_err(|err| RunError::Report(err.to_string()))?;
    info!(
        "{engine}: report written to {}",
        engine_dir.join("output.html").display()
    );
    Ok(())
}
