use std::path::{Path, PathBuf};

/// `<dir>/<stem>.<extension>`, or `<dir>/<stem>_<n>.<extension>` with the
/// smallest `n` that does not exist yet.
///
/// Artifact names carry a one-second timestamp, so two artifacts made in
/// the same second would otherwise collide.
pub fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}.{extension}"));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.{extension}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
