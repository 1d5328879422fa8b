// orderlog-watcher - core/pathutil.rs
//
// Path normalization: backslash -> slash, collapse "." / "..", preserve
// UNC (`//host/share/...`) prefixes.

/// Normalizes a path string to forward slashes, collapsing `.` and `..`
/// segments, while preserving a leading UNC-style `//host/share` prefix.
pub fn normalize_path(raw: &str) -> String {
    let slashed = raw.replace('\\', "/");

    let is_unc = slashed.starts_with("//");
    let body = if is_unc { &slashed[2..] } else { slashed.as_str() };

    let mut out: Vec<&str> = Vec::new();
    for segment in body.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }

    let joined = out.join("/");
    if is_unc {
        format!("//{joined}")
    } else {
        joined
    }
}

/// True if a normalized or raw path begins with a UNC share prefix.
pub fn is_unc_path(path: &str) -> bool {
    path.starts_with("\\\\") || path.starts_with("//")
}

/// Returns the filename component without its extension, mirroring the
/// adapters' "name without extension" key.
pub fn stem_without_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}
