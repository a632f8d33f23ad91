//! Lexical path helpers.
//!
//! None of these functions touch the filesystem.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path, folding `.` and `..` components.
///
/// `..` at the root of an absolute path is dropped; leading `..` in a
/// relative path is preserved.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Render a path with forward slashes regardless of platform.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    let components: Vec<Component<'_>> = path.components().collect();
    let mut s = String::new();
    for (i, component) in components.iter().copied().enumerate() {
        match component {
            Component::RootDir => s.push('/'),
            Component::Prefix(p) => s.push_str(&p.as_os_str().to_string_lossy()),
            Component::CurDir => s.push('.'),
            Component::ParentDir => s.push_str(".."),
            Component::Normal(n) => s.push_str(&n.to_string_lossy()),
        }
        let is_root = matches!(component, Component::RootDir | Component::Prefix(_));
        if !is_root && i + 1 < components.len() {
            s.push('/');
        }
    }
    s
}

/// Compute the path of `to` relative to the directory `from_dir`.
///
/// Both paths are normalized first. When they share no common prefix (for
/// example different Windows drives) `to` is returned unchanged.
#[must_use]
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from = normalize(from_dir);
    let to = normalize(to);

    let from_parts: Vec<Component<'_>> = from.components().collect();
    let to_parts: Vec<Component<'_>> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 && (from.is_absolute() || to.is_absolute()) {
        return to;
    }

    let mut rel = PathBuf::new();
    for part in &from_parts[common..] {
        if !matches!(part, Component::CurDir) {
            rel.push("..");
        }
    }
    for part in &to_parts[common..] {
        rel.push(part.as_os_str());
    }

    if rel.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        rel
    }
}
