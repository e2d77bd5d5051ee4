use crate::error::{IndexerError, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;

/// Project-local override file, read from the workspace root
pub const IGNORE_FILE_NAME: &str = ".contextignore";

/// Root-level git rules, folded in between the defaults and the override file
const GIT_IGNORE_FILES: &[&str] = &[".gitignore", ".git/info/exclude"];

/// Seed rules applied before the override file
const DEFAULT_PATTERNS: &[&str] = &[
    // VCS
    ".git/",
    ".hg/",
    ".svn/",
    ".gitignore",
    ".gitmodules",
    ".contextignore",
    // IDE
    ".idea/",
    ".vscode/",
    ".cursor/",
    // dependencies
    "node_modules/",
    "vendor/",
    "third_party/",
    ".venv/",
    "venv/",
    ".yarn/",
    // build output / caches
    "target/",
    "dist/",
    "build/",
    "out/",
    "coverage/",
    ".next/",
    ".nuxt/",
    ".turbo/",
    ".cache/",
    ".parcel-cache/",
    "__pycache__/",
    ".mypy_cache/",
    ".pytest_cache/",
    ".tox/",
    // lockfiles
    "*.lock",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    // minified / generated assets
    "*.min.js",
    "*.min.css",
    "*.map",
    ".DS_Store",
];

/// Rejected before any glob evaluation or file read; cannot be re-included
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "svgz",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // archives
    "zip", "gz", "tgz", "bz2", "xz", "7z", "rar", "tar", "jar", "war",
    // native / bytecode
    "exe", "dll", "so", "dylib", "a", "lib", "o", "obj", "class", "pyc", "pyo", "wasm", "node",
    "bin", "dat",
    // media
    "mp3", "mp4", "wav", "ogg", "flac", "mov", "avi", "mkv", "webm",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // data blobs
    "sqlite", "db", "onnx", "pt", "safetensors",
];

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    matcher: GlobMatcher,
    negated: bool,
    dir_only: bool,
    anchored: bool,
}

impl Rule {
    /// Gitignore-flavoured compile: a pattern without an inner `/` matches at
    /// any depth, otherwise it is anchored at the workspace root.
    fn compile(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (negated, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, line),
        };
        let dir_only = body.ends_with('/');
        let body = body.trim_end_matches('/');
        let anchored = body.starts_with('/') || body.contains('/');
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            return Ok(None);
        }

        let glob = if anchored || body.starts_with("**/") {
            body.to_string()
        } else {
            format!("**/{body}")
        };
        let matcher = GlobBuilder::new(&glob)
            .literal_separator(true)
            .build()
            .map_err(|e| IndexerError::InvalidPattern {
                pattern: line.to_string(),
                reason: e.to_string(),
            })?
            .compile_matcher();

        Ok(Some(Self {
            pattern: line.to_string(),
            matcher,
            negated,
            dir_only,
            anchored,
        }))
    }

    /// True when the rule hits `path` itself or one of its ancestor directories.
    fn hits(&self, path: &str) -> bool {
        let mut end = 0;
        while let Some(offset) = path[end..].find('/') {
            let dir = &path[..end + offset];
            if self.matcher.is_match(dir) {
                return true;
            }
            end += offset + 1;
        }
        !self.dir_only && self.matcher.is_match(path)
    }

    fn hits_dir(&self, dir: &str) -> bool {
        self.hits(dir) || self.matcher.is_match(dir)
    }

    /// Whether an include rule could re-include something below `dir`
    fn may_reach_below(&self, dir: &str) -> bool {
        if !self.anchored {
            return true;
        }
        let body = self.pattern.trim_start_matches('!').trim_start_matches('/');
        let literal = body
            .find(|c: char| matches!(c, '*' | '?' | '[' | '{'))
            .map_or(body, |idx| &body[..idx]);
        literal.starts_with(&format!("{dir}/")) || format!("{dir}/").starts_with(literal)
    }
}

/// Glob-based predicate deciding which workspace files are indexed.
///
/// Rules are evaluated in order: built-in defaults first, then the root
/// `.gitignore`, then the lines of `.contextignore` top to bottom. The last rule that matches a path (or one
/// of its parent directories) decides; `!pattern` re-includes. Paths no rule
/// matches are indexed.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    rules: Vec<Rule>,
}

impl IgnoreFilter {
    /// Built-in defaults only
    pub fn with_defaults() -> Result<Self> {
        Self::from_lines(DEFAULT_PATTERNS.iter().copied())
    }

    /// Defaults, the root's git ignore rules, then `<root>/.contextignore`
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(root, true)
    }

    /// Like [`IgnoreFilter::load`]; `respect_gitignore = false` skips
    /// `.gitignore` and `.git/info/exclude`.
    pub fn load_with(root: impl AsRef<Path>, respect_gitignore: bool) -> Result<Self> {
        let root = root.as_ref();
        let mut filter = Self::with_defaults()?;
        if respect_gitignore {
            for file in GIT_IGNORE_FILES {
                filter.extend_from_file(&root.join(file));
            }
        }
        filter.extend_from_file(&root.join(IGNORE_FILE_NAME));
        Ok(filter)
    }

    fn extend_from_file(&mut self, path: &Path) {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let before = self.rules.len();
                self.extend_lenient(text.lines());
                log::debug!(
                    "Loaded {} rules from {}",
                    self.rules.len() - before,
                    path.display()
                );
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("Failed to read {}: {err}", path.display()),
        }
    }

    /// Strict constructor: any invalid pattern is an error
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut rules = Vec::new();
        for line in lines {
            if let Some(rule) = Rule::compile(line)? {
                rules.push(rule);
            }
        }
        Ok(Self { rules })
    }

    /// Append rules, skipping invalid lines with a warning
    pub fn extend_lenient<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        for line in lines {
            match Rule::compile(line) {
                Ok(Some(rule)) => self.rules.push(rule),
                Ok(None) => {}
                Err(err) => log::warn!("Ignoring {err}"),
            }
        }
    }

    /// `relative_path` uses `/` separators and is relative to the workspace root.
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        let path = relative_path.trim_start_matches("./").trim_start_matches('/');
        if has_binary_extension(path) {
            return true;
        }
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.hits(path))
            .is_some_and(|rule| !rule.negated)
    }

    pub fn should_index(&self, relative_path: &str) -> bool {
        !self.is_ignored(relative_path)
    }

    /// Whether a directory can be skipped entirely during the walk: it is
    /// excluded and no include rule could reach anything below it.
    pub fn is_ignored_dir(&self, relative_dir: &str) -> bool {
        let dir = relative_dir.trim_start_matches("./").trim_matches('/');
        if dir.is_empty() {
            return false;
        }
        let excluded = self
            .rules
            .iter()
            .rev()
            .find(|rule| rule.hits_dir(dir))
            .is_some_and(|rule| !rule.negated);
        excluded
            && !self
                .rules
                .iter()
                .any(|rule| rule.negated && rule.may_reach_below(dir))
    }
}

/// Cheap extension check applied before reading a file
pub fn has_binary_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            BINARY_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}
