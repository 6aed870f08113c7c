//! Platform helpers for sandbox defaults.

use std::fs;
use std::path::PathBuf;

/// Returns standard library paths that should be readable by default so
/// dynamically linked plugin executables can start.
#[must_use]
pub fn platform_runtime_roots() -> Vec<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/lib",
            "/lib64",
            "/usr/lib",
            "/usr/lib64",
            "/lib/x86_64-linux-gnu",
            "/usr/lib/x86_64-linux-gnu",
            "/etc/ld.so.cache",
        ];
        candidates
            .iter()
            .filter_map(|path| {
                let candidate = std::path::Path::new(path);
                if candidate.exists() {
                    fs::canonicalize(candidate).ok()
                } else {
                    None
                }
            })
            .collect()
    }

    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}
