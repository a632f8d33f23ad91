//! tsconfig/jsconfig path alias support.
//!
//! A config is located by walking parent directories for a file name
//! (`tsconfig.json`, then `jsconfig.json`). Loading follows `extends`
//! chains (child options win) and loads project `references` transitively.
//! Only `baseUrl` and `paths` are retained.

use super::probe::probe_file;
use crate::cache::{blocking, OnceMap};
use jsrepo_util::path::normalize;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Config file names tried for path aliases, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["tsconfig.json", "jsconfig.json"];

/// Error codes for tsconfig failures.
pub mod codes {
    pub const TSCONFIG_READ_FAILED: &str = "TSCONFIG_READ_FAILED";
    pub const TSCONFIG_INVALID: &str = "TSCONFIG_INVALID";
}

/// Failure to load a tsconfig.
#[derive(Error, Debug, Clone)]
pub enum TsConfigError {
    #[error("failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("invalid tsconfig {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

impl TsConfigError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => codes::TSCONFIG_READ_FAILED,
            Self::Invalid { .. } => codes::TSCONFIG_INVALID,
        }
    }
}

/// Path alias configuration of one config file, with its references.
#[derive(Debug, Clone, Default)]
pub struct TsConfig {
    /// The config file.
    pub path: PathBuf,
    /// Absolute `baseUrl`, if any config in the `extends` chain sets one.
    pub base_url: Option<PathBuf>,
    /// Directory `paths` targets are relative to.
    pub paths_base: PathBuf,
    /// `compilerOptions.paths`, pattern to targets.
    pub paths: Vec<(String, Vec<String>)>,
    /// Loaded project references.
    pub references: Vec<Arc<TsConfig>>,
}

/// Outcome of matching a bare specifier against path aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasMatch {
    /// An alias matched and one of its targets exists.
    Resolved(PathBuf),
    /// An alias pattern matched but none of its targets exist.
    Unresolved { pattern: String },
    /// No alias pattern applies.
    NoMatch,
}

impl TsConfig {
    /// Resolve `specifier` through this config's aliases, then through its
    /// references in order.
    #[must_use]
    pub fn resolve_alias(&self, specifier: &str) -> AliasMatch {
        let mut visited = HashSet::new();
        self.resolve_alias_inner(specifier, &mut visited)
    }

    fn resolve_alias_inner(&self, specifier: &str, visited: &mut HashSet<PathBuf>) -> AliasMatch {
        if !visited.insert(self.path.clone()) {
            return AliasMatch::NoMatch;
        }

        let own = self.resolve_own(specifier);
        if own != AliasMatch::NoMatch {
            return own;
        }

        let mut unresolved = None;
        for reference in &self.references {
            match reference.resolve_alias_inner(specifier, visited) {
                AliasMatch::Resolved(path) => return AliasMatch::Resolved(path),
                AliasMatch::Unresolved { pattern } => {
                    unresolved.get_or_insert(pattern);
                }
                AliasMatch::NoMatch => {}
            }
        }

        match unresolved {
            Some(pattern) => AliasMatch::Unresolved { pattern },
            None => AliasMatch::NoMatch,
        }
    }

    fn resolve_own(&self, specifier: &str) -> AliasMatch {
        if let Some((pattern, captured)) = self.best_pattern(specifier) {
            let targets = self
                .paths
                .iter()
                .find(|(p, _)| p == pattern)
                .map(|(_, t)| t.as_slice())
                .unwrap_or_default();
            for target in targets {
                let substituted = target.replacen('*', captured, 1);
                if let Some(found) = probe_file(&self.paths_base.join(substituted)) {
                    return AliasMatch::Resolved(found);
                }
            }
            return AliasMatch::Unresolved {
                pattern: pattern.to_string(),
            };
        }

        // `baseUrl` alone makes non-relative imports resolvable from it, but
        // only counts when a file is actually there.
        if let Some(base_url) = &self.base_url {
            if let Some(found) = probe_file(&base_url.join(specifier)) {
                return AliasMatch::Resolved(found);
            }
        }

        AliasMatch::NoMatch
    }

    /// Exact patterns win; otherwise the wildcard with the longest prefix.
    fn best_pattern<'a>(&'a self, specifier: &'a str) -> Option<(&'a str, &'a str)> {
        let mut best: Option<(&str, &str, usize)> = None;

        for (pattern, _) in &self.paths {
            match pattern.split_once('*') {
                None => {
                    if pattern == specifier {
                        return Some((pattern.as_str(), ""));
                    }
                }
                Some((prefix, suffix)) => {
                    let matches = specifier.len() >= prefix.len() + suffix.len()
                        && specifier.starts_with(prefix)
                        && specifier.ends_with(suffix);
                    if matches && best.map_or(true, |(_, _, len)| prefix.len() > len) {
                        let captured = &specifier[prefix.len()..specifier.len() - suffix.len()];
                        best = Some((pattern.as_str(), captured, prefix.len()));
                    }
                }
            }
        }

        best.map(|(pattern, captured, _)| (pattern, captured))
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawTsConfig {
    #[serde(default)]
    extends: Option<Extends>,
    #[serde(default)]
    compiler_options: Option<RawCompilerOptions>,
    #[serde(default)]
    references: Vec<RawReference>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    paths: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Deserialize)]
struct RawReference {
    path: String,
}

/// Options accumulated along an `extends` chain.
#[derive(Default)]
struct Merged {
    base_url: Option<PathBuf>,
    paths: Option<(PathBuf, Vec<(String, Vec<String>)>)>,
}

/// Load the config at `path` with its `extends` chain and references.
///
/// # Errors
/// Returns an error if `path` or any config it pulls in cannot be read or
/// parsed. An `extends` target that does not exist is ignored.
pub fn load_tsconfig(path: &Path) -> Result<TsConfig, TsConfigError> {
    let mut loading = HashSet::new();
    load_with_references(&normalize(path), &mut loading)
}

fn load_with_references(
    path: &Path,
    loading: &mut HashSet<PathBuf>,
) -> Result<TsConfig, TsConfigError> {
    loading.insert(path.to_path_buf());

    let mut chain = HashSet::new();
    let (merged, raw) = load_merged(path, &mut chain)?;
    let dir = parent_dir(path);

    let mut references = Vec::new();
    for reference in &raw.references {
        let mut target = normalize(&dir.join(&reference.path));
        if target.is_dir() {
            target = target.join("tsconfig.json");
        }
        if loading.contains(&target) || !target.is_file() {
            continue;
        }
        references.push(Arc::new(load_with_references(&target, loading)?));
    }

    let (paths_base, paths) = match merged.paths {
        Some((explicit_base, paths)) => (
            merged.base_url.clone().unwrap_or(explicit_base),
            paths,
        ),
        None => (merged.base_url.clone().unwrap_or_else(|| dir.clone()), Vec::new()),
    };

    Ok(TsConfig {
        path: path.to_path_buf(),
        base_url: merged.base_url,
        paths_base,
        paths,
        references,
    })
}

/// Read `path` and fold its `extends` parents underneath it.
fn load_merged(
    path: &Path,
    chain: &mut HashSet<PathBuf>,
) -> Result<(Merged, RawTsConfig), TsConfigError> {
    if !chain.insert(path.to_path_buf()) {
        return Ok((Merged::default(), RawTsConfig::default()));
    }

    let raw = read_raw(path)?;
    let dir = parent_dir(path);

    let mut merged = Merged::default();
    let parents = match &raw.extends {
        None => Vec::new(),
        Some(Extends::One(s)) => vec![s.clone()],
        Some(Extends::Many(v)) => v.clone(),
    };
    for parent in parents {
        let Some(parent_path) = resolve_extends(&dir, &parent) else {
            continue;
        };
        let (parent_merged, _) = load_merged(&parent_path, chain)?;
        if parent_merged.base_url.is_some() {
            merged.base_url = parent_merged.base_url;
        }
        if parent_merged.paths.is_some() {
            merged.paths = parent_merged.paths;
        }
    }

    if let Some(options) = &raw.compiler_options {
        if let Some(base_url) = &options.base_url {
            merged.base_url = Some(normalize(&dir.join(base_url)));
        }
        if let Some(paths) = &options.paths {
            merged.paths = Some((
                dir.clone(),
                paths.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ));
        }
    }

    Ok((merged, raw))
}

fn read_raw(path: &Path) -> Result<RawTsConfig, TsConfigError> {
    let content =
        jsrepo_util::fs::read_to_string_lossy(path).map_err(|e| TsConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    serde_json::from_str(&strip_jsonc(&content)).map_err(|e| TsConfigError::Invalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Relative `extends` are joined to `dir`; bare ones are looked up in
/// `node_modules` walking upward.
fn resolve_extends(dir: &Path, extends: &str) -> Option<PathBuf> {
    let with_json = |p: PathBuf| -> Option<PathBuf> {
        if p.is_file() {
            return Some(p);
        }
        let mut s = p.into_os_string();
        s.push(".json");
        let p = PathBuf::from(s);
        p.is_file().then_some(p)
    };

    if extends.starts_with('.') || Path::new(extends).is_absolute() {
        return with_json(normalize(&dir.join(extends)));
    }

    let mut current = Some(dir);
    while let Some(d) = current {
        let base = d.join("node_modules").join(extends);
        if base.is_dir() {
            if let Some(found) = with_json(base.join("tsconfig.json")) {
                return Some(found);
            }
        }
        if let Some(found) = with_json(base) {
            return Some(found);
        }
        current = d.parent();
    }
    None
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Strip `//` and `/* */` comments and trailing commas from JSONC.
#[must_use]
pub fn strip_jsonc(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(source.len());
    let mut i = 0;

    while i < len {
        match chars[i] {
            '"' => {
                result.push('"');
                i += 1;
                while i < len && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < len {
                        result.push(chars[i]);
                        i += 1;
                    }
                    result.push(chars[i]);
                    i += 1;
                }
                if i < len {
                    result.push('"');
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < len && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    if chars[i] == '\n' {
                        result.push('\n');
                    }
                    i += 1;
                }
                i = (i + 2).min(len);
            }
            ',' => {
                let mut j = i + 1;
                loop {
                    while j < len && chars[j].is_whitespace() {
                        j += 1;
                    }
                    // Comments between a trailing comma and the bracket.
                    if chars.get(j) == Some(&'/') && chars.get(j + 1) == Some(&'/') {
                        while j < len && chars[j] != '\n' {
                            j += 1;
                        }
                    } else if chars.get(j) == Some(&'/') && chars.get(j + 1) == Some(&'*') {
                        j += 2;
                        while j < len && !(chars[j] == '*' && chars.get(j + 1) == Some(&'/')) {
                            j += 1;
                        }
                        j = (j + 2).min(len);
                    } else {
                        break;
                    }
                }
                if !matches!(chars.get(j), Some('}' | ']')) {
                    result.push(',');
                }
                i += 1;
            }
            c => {
                result.push(c);
                i += 1;
            }
        }
    }

    result
}

/// Cache of config lookups keyed by (start directory, file name).
///
/// Hits return the identical `Arc`, including "no config found". Failed
/// loads are not cached.
#[derive(Debug, Default)]
pub struct TsConfigCache {
    entries: OnceMap<(PathBuf, String), Arc<Option<TsConfig>>>,
}

impl TsConfigCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Find and load the nearest `file_name` at or above `dir`.
    ///
    /// # Errors
    /// Returns an error if the config found cannot be loaded.
    pub async fn get(
        &self,
        dir: &Path,
        file_name: &str,
    ) -> Result<Arc<Option<TsConfig>>, TsConfigError> {
        let dir = normalize(dir);
        let key = (dir.clone(), file_name.to_string());
        let file_name = file_name.to_string();
        self.entries
            .get_or_try_init(key, || {
                blocking(move || match find_config(&dir, &file_name) {
                    Some(path) => load_tsconfig(&path).map(|c| Arc::new(Some(c))),
                    None => Ok(Arc::new(None)),
                })
            })
            .await
    }

    /// The first of [`CONFIG_FILE_NAMES`] found at or above `dir`.
    ///
    /// # Errors
    /// Returns an error if a config found cannot be loaded.
    pub async fn nearest(&self, dir: &Path) -> Result<Arc<Option<TsConfig>>, TsConfigError> {
        let mut last = Arc::new(None);
        for name in CONFIG_FILE_NAMES {
            last = self.get(dir, name).await?;
            if last.is_some() {
                break;
            }
        }
        Ok(last)
    }

    /// Number of cached lookups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn find_config(start: &Path, file_name: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_strip_jsonc() {
        let src = r#"{
  // comment
  "a": "http://x", /* block */
  "b": [1, 2,],
  "c": "has // inside",
}"#;
        let value: serde_json::Value = serde_json::from_str(&strip_jsonc(src)).unwrap();
        assert_eq!(value["a"], "http://x");
        assert_eq!(value["b"], serde_json::json!([1, 2]));
        assert_eq!(value["c"], "has // inside");
    }

    #[test]
    fn test_paths_wildcard_and_exact() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "tsconfig.json",
            r#"{ "compilerOptions": { "paths": {
                "$lib/*": ["./src/lib/*"],
                "$lib/components/*": ["./src/components/*"],
                "~config": ["./config/index.ts"]
            } } }"#,
        );
        write(root, "src/lib/utils.ts", "");
        write(root, "src/components/button.svelte", "");
        write(root, "config/index.ts", "");

        let config = load_tsconfig(&root.join("tsconfig.json")).unwrap();
        assert_eq!(
            config.resolve_alias("$lib/utils"),
            AliasMatch::Resolved(root.join("src/lib/utils.ts"))
        );
        assert_eq!(
            config.resolve_alias("$lib/components/button.svelte"),
            AliasMatch::Resolved(root.join("src/components/button.svelte"))
        );
        assert_eq!(
            config.resolve_alias("~config"),
            AliasMatch::Resolved(root.join("config/index.ts"))
        );
        assert_eq!(
            config.resolve_alias("$lib/missing"),
            AliasMatch::Unresolved {
                pattern: "$lib/*".to_string()
            }
        );
        assert_eq!(config.resolve_alias("react"), AliasMatch::NoMatch);
    }

    #[test]
    fn test_extends_and_base_url() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "tsconfig.base.json",
            r#"{ "compilerOptions": { "baseUrl": "./src", "paths": { "@/*": ["*"] } } }"#,
        );
        write(
            root,
            "app/tsconfig.json",
            r#"{
                // inherits paths
                "extends": "../tsconfig.base",
                "compilerOptions": { "strict": true, },
            }"#,
        );
        write(root, "src/utils/cn.ts", "");

        let config = load_tsconfig(&root.join("app/tsconfig.json")).unwrap();
        assert_eq!(
            config.resolve_alias("@/utils/cn"),
            AliasMatch::Resolved(root.join("src/utils/cn.ts"))
        );
    }

    #[test]
    fn test_missing_extends_is_ignored() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "tsconfig.json",
            r#"{ "extends": "./.svelte-kit/tsconfig.json" }"#,
        );
        let config = load_tsconfig(&dir.path().join("tsconfig.json")).unwrap();
        assert!(config.paths.is_empty());
    }

    #[test]
    fn test_references_are_followed() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "tsconfig.json",
            r#"{ "files": [], "references": [{ "path": "./tsconfig.app.json" }, { "path": "./tsconfig.json" }] }"#,
        );
        write(
            root,
            "tsconfig.app.json",
            r#"{ "compilerOptions": { "paths": { "@/*": ["./src/*"] } } }"#,
        );
        write(root, "src/lib/utils.ts", "");

        let config = load_tsconfig(&root.join("tsconfig.json")).unwrap();
        assert_eq!(config.references.len(), 1);
        assert_eq!(
            config.resolve_alias("@/lib/utils"),
            AliasMatch::Resolved(root.join("src/lib/utils.ts"))
        );
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        write(dir.path(), "tsconfig.json", "{ nope");
        let err = load_tsconfig(&dir.path().join("tsconfig.json")).unwrap_err();
        assert_eq!(err.code(), codes::TSCONFIG_INVALID);
    }

    #[tokio::test]
    async fn test_cache_returns_same_arc() {
        let dir = tempdir().unwrap();
        write(dir.path(), "tsconfig.json", "{}");
        fs::create_dir(dir.path().join("src")).unwrap();

        let cache = TsConfigCache::new();
        let a = cache.get(&dir.path().join("src"), "tsconfig.json").await.unwrap();
        let b = cache.get(&dir.path().join("src"), "tsconfig.json").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_some());

        let none_a = cache.get(dir.path(), "jsconfig.json").await.unwrap();
        let none_b = cache.get(dir.path(), "jsconfig.json").await.unwrap();
        assert!(Arc::ptr_eq(&none_a, &none_b));
        assert!(none_a.is_none());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_does_not_keep_failures() {
        let dir = tempdir().unwrap();
        write(dir.path(), "tsconfig.json", "{ broken");

        let cache = TsConfigCache::new();
        assert!(cache.get(dir.path(), "tsconfig.json").await.is_err());
        assert!(cache.is_empty());

        write(dir.path(), "tsconfig.json", "{}");
        assert!(cache.get(dir.path(), "tsconfig.json").await.unwrap().is_some());
    }
}
