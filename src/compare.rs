//! Pixel-level image comparison and diff rendering.
//!
//! Mirrors the options surface the report format was built around:
//! tolerance-based equality, optional antialiasing detection, and a diff
//! image with differing pixels painted in a highlight color.

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use thiserror::Error;

/// Errors from the comparator. Only unreadable or undecodable input is an
/// error; images that merely differ are a normal result.
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("could not read image {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("could not write diff image {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },

    /// Diff rendering needs same-sized inputs; plain comparison does not
    #[error("size mismatch between {} and {}", .reference.display(), .current.display())]
    SizeMismatch { reference: PathBuf, current: PathBuf },
}

/// Per-channel difference still counted as equal under lenient comparison.
pub const DEFAULT_TOLERANCE: u8 = 5;

/// Options for pair equality checks.
#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    /// Zero-tolerance comparison; `tolerance` is ignored when set
    pub strict: bool,
    /// Maximum per-channel difference still counted as equal
    pub tolerance: u8,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            strict: false,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// A diff-image request: reference/current in, highlighted diff out.
#[derive(Debug, Clone)]
pub struct DiffRequest {
    pub reference: PathBuf,
    pub current: PathBuf,
    pub diff: PathBuf,
    /// RGB painted over differing pixels
    pub highlight_color: [u8; 3],
    pub strict: bool,
    pub tolerance: u8,
    /// Exclude pixels attributed to font/edge smoothing
    pub ignore_antialiasing: bool,
    /// Sensitivity slack for the antialiasing detector, in luminance units
    pub antialiasing_tolerance: u8,
}

impl DiffRequest {
    /// The defaults the section validator uses for a capture pair: magenta
    /// highlight, lenient comparison, antialiasing ignored.
    pub fn for_capture_pair(prefix: &Path) -> Self {
        Self {
            reference: png_path(prefix, "prod"),
            current: png_path(prefix, "dev"),
            diff: png_path(prefix, "diff"),
            highlight_color: [0xff, 0x00, 0xff],
            strict: false,
            tolerance: DEFAULT_TOLERANCE,
            ignore_antialiasing: true,
            antialiasing_tolerance: 0,
        }
    }
}

/// Outcome of a fire-and-forget side effect: either it happened, or it
/// failed and the failure was deliberately ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort {
    Succeeded,
    Ignored(String),
}

impl BestEffort {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// `{prefix}-{suffix}.png`: the naming scheme shared by a capture pair and
/// its diff.
pub fn png_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push('-');
    name.push_str(suffix);
    name.push_str(".png");
    prefix.with_file_name(name)
}

/// Compare two PNG files for equality under `options`.
///
/// A size mismatch compares as different rather than erroring: a section
/// that changed height is a legitimate regression to surface.
pub fn compare(a: &Path, b: &Path, options: &CompareOptions) -> Result<bool, CompareError> {
    let img_a = load_rgba(a)?;
    let img_b = load_rgba(b)?;

    if img_a.dimensions() != img_b.dimensions() {
        return Ok(false);
    }

    let tolerance = if options.strict { 0 } else { options.tolerance };
    Ok(img_a
        .pixels()
        .zip(img_b.pixels())
        .all(|(pa, pb)| within_tolerance(pa, pb, tolerance)))
}

/// Render a diff image for `request`: the reference with differing pixels
/// painted in the highlight color.
pub fn create_diff(request: &DiffRequest) -> Result<(), CompareError> {
    let reference = load_rgba(&request.reference)?;
    let current = load_rgba(&request.current)?;

    if reference.dimensions() != current.dimensions() {
        return Err(CompareError::SizeMismatch {
            reference: request.reference.clone(),
            current: request.current.clone(),
        });
    }

    let tolerance = if request.strict { 0 } else { request.tolerance };
    let [r, g, b] = request.highlight_color;
    let highlight = Rgba([r, g, b, 0xff]);

    let (width, height) = reference.dimensions();
    let mut diff = reference.clone();
    for y in 0..height {
        for x in 0..width {
            let pr = reference.get_pixel(x, y);
            let pc = current.get_pixel(x, y);
            if within_tolerance(pr, pc, tolerance) {
                continue;
            }
            if request.ignore_antialiasing
                && (is_antialiased(&reference, x, y, request.antialiasing_tolerance)
                    || is_antialiased(&current, x, y, request.antialiasing_tolerance))
            {
                continue;
            }
            diff.put_pixel(x, y, highlight);
        }
    }

    diff.save(&request.diff).map_err(|source| CompareError::Write {
        path: request.diff.clone(),
        source,
    })
}

/// Diff generation for the report is best-effort: when it fails the report
/// simply lacks a diff image.
pub fn best_effort_diff(request: &DiffRequest) -> BestEffort {
    match create_diff(request) {
        Ok(()) => BestEffort::Succeeded,
        Err(err) => BestEffort::Ignored(err.to_string()),
    }
}

fn load_rgba(path: &Path) -> Result<RgbaImage, CompareError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| CompareError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn within_tolerance(a: &Rgba<u8>, b: &Rgba<u8>, tolerance: u8) -> bool {
    a.0.iter()
        .zip(b.0.iter())
        .all(|(ca, cb)| ca.abs_diff(*cb) <= tolerance)
}

fn luma(p: &Rgba<u8>) -> f32 {
    0.299 * f32::from(p.0[0]) + 0.587 * f32::from(p.0[1]) + 0.114 * f32::from(p.0[2])
}

/// Antialiasing heuristic in the spirit of pixelmatch: a pixel sitting on a
/// strong luminance gradient, with both a distinctly brighter and a
/// distinctly darker neighbour, is attributed to font/edge smoothing rather
/// than a real rendering change. Pixels inside flat regions (more than two
/// neighbours of identical luminance) never qualify.
fn is_antialiased(img: &RgbaImage, x: u32, y: u32, tolerance: u8) -> bool {
    let (width, height) = img.dimensions();
    let center = luma(img.get_pixel(x, y));
    let threshold = 8.0 + f32::from(tolerance);

    let mut brighter = false;
    let mut darker = false;
    let mut identical = 0;

    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = i64::from(x) + dx;
            let ny = i64::from(y) + dy;
            if nx < 0 || ny < 0 || nx >= i64::from(width) || ny >= i64::from(height) {
                continue;
            }
            let delta = luma(img.get_pixel(nx as u32, ny as u32)) - center;
            if delta.abs() < f32::EPSILON {
                identical += 1;
                if identical > 2 {
                    return false;
                }
            } else if delta > threshold {
                brighter = true;
            } else if delta < -threshold {
                darker = true;
            }
        }
    }

    brighter && darker
}
