//! Per-triple validation: capture both renderings, compare, record.

use std::path::Path;

use tracing::{info, warn};

use crate::compare::{self, BestEffort, CompareOptions, DiffRequest};
use crate::driver::{DEFAULT_TIMEOUT, DriverError, PageHandle, with_single_retry};
use crate::report::SectionOutcome;

/// Validate one (page, selector, viewport) triple.
///
/// Waits for the selector on both pages (one automatic retry each; a second
/// failure propagates), writes `{prefix}-prod.png` and `{prefix}-dev.png`,
/// compares them, and always attempts `{prefix}-diff.png`. A comparator
/// error is fail-safe: the pair is reported as different rather than
/// silently passing.
pub async fn validate_section(
    old_page: &PageHandle,
    new_page: &PageHandle,
    selector: &str,
    prefix: &Path,
    image_name: &str,
    title: &str,
) -> Result<SectionOutcome, DriverError> {
    with_single_retry(|| old_page.wait_for_selector(selector, DEFAULT_TIMEOUT)).await?;
    with_single_retry(|| new_page.wait_for_selector(selector, DEFAULT_TIMEOUT)).await?;

    let old_path = compare::png_path(prefix, "prod");
    let new_path = compare::png_path(prefix, "dev");
    tokio::try_join!(
        old_page.screenshot_element(selector, &old_path),
        new_page.screenshot_element(selector, &new_path),
    )?;

    let equal = match compare::compare(&old_path, &new_path, &CompareOptions::default()) {
        Ok(equal) => equal,
        Err(err) => {
            warn!("comparison failed for {image_name}, reporting as different: {err}");
            false
        }
    };

    let diff = compare::best_effort_diff(&DiffRequest::for_capture_pair(prefix));
    if let BestEffort::Ignored(reason) = &diff {
        warn!("diff generation skipped for {image_name}: {reason}");
    }
    info!("{title}: {}", if equal { "no diff" } else { "differs" });

    Ok(SectionOutcome {
        image_name: image_name.to_string(),
        title: title.to_string(),
        equal,
        diff,
    })
}
