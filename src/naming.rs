//! Output path resolution.
//!
//! Every input produces one output file with the same extension (format is
//! never converted):
//!
//! ```text
//! photos/beach.jpg  --output out --suffix _web   →  out/beach_web.jpg
//! photos/beach.jpg  (no output dir, no suffix)   →  photos/beach.jpg
//! ```
//!
//! ## Auto-increment
//!
//! With auto-increment on (the default), an existing path is never
//! overwritten. The first free `<stem>_<n>.<ext>` for `n` in `1..=1000` is
//! used instead; past that, a millisecond timestamp is appended. `--overwrite`
//! turns this off and writes to the base path unconditionally, which for the
//! no-dir/no-suffix case means replacing the input in place.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Highest `_n` tried before falling back to a timestamp.
pub const MAX_INCREMENT: u32 = 1000;

/// Split a file name into stem and `.ext` (empty when there is no extension).
fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}

/// Where the output for `input` goes before collision handling.
pub fn base_output_path(input: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let (stem, ext) = split_name(input);
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}{suffix}{ext}"))
}

/// First path derived from `base` that `exists` reports as free.
///
/// The existence check is injected so the numbering logic stays testable
/// without touching the filesystem.
pub fn next_free_path(base: &Path, exists: impl Fn(&Path) -> bool) -> PathBuf {
    if !exists(base) {
        return base.to_path_buf();
    }
    let (stem, ext) = split_name(base);
    let dir = base.parent().unwrap_or(Path::new(""));

    for n in 1..=MAX_INCREMENT {
        let candidate = dir.join(format!("{stem}_{n}{ext}"));
        if !exists(&candidate) {
            return candidate;
        }
    }

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    dir.join(format!("{stem}_{millis}{ext}"))
}

/// Resolve the final output path for `input`.
pub fn resolve_output_path(
    input: &Path,
    output_dir: Option<&Path>,
    suffix: &str,
    auto_increment: bool,
) -> PathBuf {
    let base = base_output_path(input, output_dir, suffix);
    if auto_increment {
        next_free_path(&base, Path::exists)
    } else {
        base
    }
}
