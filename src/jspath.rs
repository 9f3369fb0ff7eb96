//! POSIX flavour of Node's `path` module, as seen by evaluated arguments.
//!
//! Pure string functions; nothing here touches the filesystem or the process.

pub const SEP: &str = "/";
pub const DELIMITER: &str = ":";

/// path.normalize(path)
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let is_absolute = path.starts_with('/');
    let trailing = path.ends_with('/');

    let mut out = normalize_segments(path, is_absolute);
    if out.is_empty() && !is_absolute {
        out.push('.');
    }
    if trailing && !out.is_empty() {
        out.push('/');
    }
    if is_absolute {
        format!("/{out}")
    } else {
        out
    }
}

fn normalize_segments(path: &str, is_absolute: bool) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else if !is_absolute {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// path.join(...paths)
pub fn join(paths: &[String]) -> String {
    let joined = paths
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        return ".".to_string();
    }
    normalize(&joined)
}

/// path.resolve(...paths), relative to `cwd` instead of the process directory.
pub fn resolve(cwd: &str, paths: &[String]) -> String {
    let mut resolved = String::new();
    let mut absolute = false;
    for p in paths.iter().rev().map(String::as_str).chain(std::iter::once(cwd)) {
        if p.is_empty() {
            continue;
        }
        resolved = if resolved.is_empty() {
            p.to_string()
        } else {
            format!("{p}/{resolved}")
        };
        if p.starts_with('/') {
            absolute = true;
            break;
        }
    }
    let body = normalize_segments(&resolved, absolute);
    match (absolute, body.is_empty()) {
        (true, _) => format!("/{body}"),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

/// path.isAbsolute(path)
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

fn trim_trailing_slashes(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// path.dirname(path)
pub fn dirname(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let path = trim_trailing_slashes(path);
    if path == "/" {
        return "/".to_string();
    }
    match path.rfind('/') {
        None => ".".to_string(),
        Some(0) => "/".to_string(),
        Some(idx) => trim_trailing_slashes(&path[..idx]).to_string(),
    }
}

/// path.basename(path, ext?)
pub fn basename(path: &str, ext: Option<&str>) -> String {
    let path = trim_trailing_slashes(path);
    if path == "/" {
        return String::new();
    }
    let name = path.rsplit('/').next().unwrap_or_default();
    match ext {
        Some(ext) if !ext.is_empty() && name != ext => {
            name.strip_suffix(ext).unwrap_or(name).to_string()
        }
        _ => name.to_string(),
    }
}

/// path.extname(path)
pub fn extname(path: &str) -> String {
    let name = basename(path, None);
    match name.rfind('.') {
        None | Some(0) => String::new(),
        Some(idx) => name[idx..].to_string(),
    }
}

/// path.relative(from, to)
pub fn relative(cwd: &str, from: &str, to: &str) -> String {
    let from = resolve(cwd, &[from.to_string()]);
    let to = resolve(cwd, &[to.to_string()]);
    if from == to {
        return String::new();
    }
    let from: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();
    let common = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend_from_slice(&to[common..]);
    parts.join("/")
}
