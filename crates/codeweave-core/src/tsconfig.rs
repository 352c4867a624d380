//! TypeScript / JavaScript project configuration.
//!
//! Loads `tsconfig.json` / `jsconfig.json` files (JSONC: comments and
//! trailing commas allowed), follows `extends` chains, and exposes the
//! module-resolution settings the resolver needs: `baseUrl`, `paths` aliases
//! and `references` aliases. All paths are repository-relative with `/`
//! separators.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// File names recognized as project configs, in lookup priority.
pub const CONFIG_FILE_NAMES: &[&str] = &["tsconfig.json", "jsconfig.json"];

/// Errors raised while loading a project config.
#[derive(Debug, Error)]
pub enum TsConfigError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

type Result<T> = std::result::Result<T, TsConfigError>;

// ============================================================================
// Raw JSON Shape
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    extends: Option<String>,
    compiler_options: Option<RawCompilerOptions>,
    references: Option<Vec<RawReference>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    base_url: Option<String>,
    paths: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Deserialize)]
struct RawReference {
    path: String,
}

// ============================================================================
// Resolved Config
// ============================================================================

/// One `paths` entry with targets resolved to repository-relative patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAlias {
    /// Key as written, e.g. `@app/*`
    pub pattern: String,
    /// Targets, e.g. `src/app/*`
    pub targets: Vec<String>,
}

impl PathAlias {
    /// Substitute `specifier` into the targets if it matches the pattern.
    fn expand(&self, specifier: &str) -> Option<Vec<String>> {
        match self.pattern.split_once('*') {
            Some((prefix, suffix)) => {
                let star = specifier
                    .strip_prefix(prefix)?
                    .strip_suffix(suffix)?;
                Some(self.targets.iter().map(|t| t.replacen('*', star, 1)).collect())
            }
            None => (self.pattern == specifier).then(|| self.targets.clone()),
        }
    }

    fn prefix_len(&self) -> usize {
        self.pattern.split('*').next().map_or(0, str::len)
    }
}

/// A project config merged along its `extends` chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Repository-relative path of the config file
    pub path: String,
    /// Directory containing the config file (`""` for the root)
    pub dir: String,
    /// Resolved `compilerOptions.baseUrl`
    pub base_url: Option<String>,
    /// `paths` aliases, longest prefix first
    pub paths: Vec<PathAlias>,
    /// `references` aliases mapped to the referenced directory
    pub reference_aliases: Vec<(String, String)>,
}

impl ProjectConfig {
    /// Load `rel_path` (relative to `root`) and everything it extends.
    pub fn load(root: &Path, rel_path: &str) -> Result<Self> {
        let mut visited = HashSet::new();
        let mut config = Self::load_chain(root, rel_path, &mut visited)?;
        config
            .paths
            .sort_by(|a, b| b.prefix_len().cmp(&a.prefix_len()).then(a.pattern.cmp(&b.pattern)));
        config
            .reference_aliases
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        Ok(config)
    }

    fn load_chain(root: &Path, rel_path: &str, visited: &mut HashSet<String>) -> Result<Self> {
        let raw = read_raw(root, rel_path)?;
        let dir = parent_dir(rel_path);

        let mut config = match raw.extends.as_deref() {
            Some(extends) if visited.insert(rel_path.to_string()) => {
                match resolve_extends(root, &dir, extends) {
                    Some(base_path) => match Self::load_chain(root, &base_path, visited) {
                        Ok(base) => base,
                        Err(e) => {
                            warn!("Ignoring extended config '{}': {}", base_path, e);
                            Self::default()
                        }
                    },
                    None => {
                        debug!("Extended config '{}' not found from '{}'", extends, rel_path);
                        Self::default()
                    }
                }
            }
            _ => Self::default(),
        };
        config.path = rel_path.to_string();
        config.dir = dir.clone();

        // References are per-project and never inherited.
        config.reference_aliases.clear();

        let options = raw.compiler_options.unwrap_or_default();
        let own_base = options
            .base_url
            .as_deref()
            .and_then(|base| join_normalized(&dir, base));
        if own_base.is_some() {
            config.base_url = own_base.clone();
        }

        if let Some(paths) = options.paths {
            let anchor = own_base.unwrap_or_else(|| dir.clone());
            for (pattern, targets) in paths {
                let targets: Vec<String> = targets
                    .iter()
                    .filter_map(|t| join_normalized(&anchor, t))
                    .collect();
                config.paths.retain(|p| p.pattern != pattern);
                config.paths.push(PathAlias { pattern, targets });
            }
        }

        for reference in raw.references.unwrap_or_default() {
            let Some(target) = join_normalized(&dir, &reference.path) else {
                continue;
            };
            let target = if target.ends_with(".json") {
                parent_dir(&target)
            } else {
                target
            };
            for alias in reference_aliases(&reference.path) {
                config.reference_aliases.push((alias, target.clone()));
            }
        }

        Ok(config)
    }

    /// Extensionless candidate paths for a non-relative specifier.
    ///
    /// `paths` aliases are tried first (longest prefix wins), then
    /// `references` aliases, then `baseUrl`.
    pub fn candidates(&self, specifier: &str) -> Vec<String> {
        let mut out = Vec::new();
        for alias in &self.paths {
            if let Some(targets) = alias.expand(specifier) {
                out.extend(targets);
                break;
            }
        }
        for (alias, target) in &self.reference_aliases {
            if specifier == alias {
                out.push(target.clone());
            } else if let Some(rest) = specifier
                .strip_prefix(alias.as_str())
                .and_then(|r| r.strip_prefix('/'))
            {
                out.push(join_path(target, rest));
            }
        }
        if let Some(base) = &self.base_url {
            out.push(join_path(base, specifier));
        }
        out
    }
}

/// Project configs of a repository keyed by the directory they govern.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfigs {
    by_dir: BTreeMap<String, ProjectConfig>,
}

impl ProjectConfigs {
    /// Load every config in `paths`; unreadable ones are logged and skipped.
    pub fn load(root: &Path, paths: &[String]) -> Self {
        let mut by_dir: BTreeMap<String, ProjectConfig> = BTreeMap::new();
        for rel in paths {
            match ProjectConfig::load(root, rel) {
                Ok(config) => {
                    // tsconfig.json wins over jsconfig.json in the same directory.
                    let keep_existing = by_dir
                        .get(&config.dir)
                        .is_some_and(|existing| existing.path.ends_with(CONFIG_FILE_NAMES[0]));
                    if !keep_existing {
                        by_dir.insert(config.dir.clone(), config);
                    }
                }
                Err(e) => warn!("Skipping project config: {}", e),
            }
        }
        debug!("Loaded {} project configs", by_dir.len());
        Self { by_dir }
    }

    pub fn len(&self) -> usize {
        self.by_dir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dir.is_empty()
    }

    /// Config governing `file`: the nearest one in an ancestor directory.
    pub fn governing(&self, file: &str) -> Option<&ProjectConfig> {
        let mut dir = parent_dir(file);
        loop {
            if let Some(config) = self.by_dir.get(&dir) {
                return Some(config);
            }
            if dir.is_empty() {
                return None;
            }
            dir = parent_dir(&dir);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn read_raw(root: &Path, rel_path: &str) -> Result<RawConfig> {
    let text = std::fs::read_to_string(root.join(rel_path)).map_err(|source| {
        TsConfigError::Read {
            path: rel_path.to_string(),
            source,
        }
    })?;
    serde_json::from_str(&strip_jsonc(&text)).map_err(|source| TsConfigError::Parse {
        path: rel_path.to_string(),
        source,
    })
}

/// Locate the file an `extends` value points to.
fn resolve_extends(root: &Path, dir: &str, extends: &str) -> Option<String> {
    let base = if extends.starts_with('.') || extends.starts_with('/') {
        join_normalized(dir, extends.trim_start_matches('/'))?
    } else {
        format!("node_modules/{extends}")
    };
    if root.join(&base).is_file() {
        return Some(base);
    }
    let with_ext = format!("{base}.json");
    if root.join(&with_ext).is_file() {
        return Some(with_ext);
    }
    let nested = join_path(&base, "tsconfig.json");
    root.join(&nested).is_file().then_some(nested)
}

/// Every trailing sub-path of a reference, with leading `./` and `../`
/// segments removed: `../../shared/app` → `shared/app`, `app`.
pub fn reference_aliases(reference: &str) -> Vec<String> {
    let segments: Vec<&str> = reference
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    let segments: Vec<&str> = match segments.last() {
        Some(last) if last.ends_with(".json") => segments[..segments.len() - 1].to_vec(),
        _ => segments,
    };
    (0..segments.len())
        .map(|i| segments[i..].join("/"))
        .collect()
}

/// Remove `//` and `/* */` comments and trailing commas, leaving strings intact.
pub fn strip_jsonc(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }

    remove_trailing_commas(&out)
}

fn remove_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = text.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Directory part of a repository-relative path (`""` at the root).
pub fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => path[..i].to_string(),
        None => String::new(),
    }
}

pub fn join_path(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        rel.to_string()
    } else if rel.is_empty() {
        dir.to_string()
    } else {
        format!("{dir}/{rel}")
    }
}

/// Join and collapse `.` / `..`; `None` if the result escapes the root.
pub fn join_normalized(dir: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}
