use crate::ignore_filter::{has_binary_extension, IgnoreFilter};
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

/// Walk settings on top of the ignore filter
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Fold the root `.gitignore` and `.git/info/exclude` into the ignore filter
    pub respect_gitignore: bool,

    /// Larger files are skipped without being read
    pub max_file_size: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            max_file_size: MAX_FILE_SIZE_BYTES,
        }
    }
}

/// Enumerates indexable files under one workspace root
pub struct FileScanner {
    root: PathBuf,
    filter: Arc<IgnoreFilter>,
    options: ScanOptions,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>, filter: Arc<IgnoreFilter>, options: ScanOptions) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            filter,
            options,
        }
    }

    /// Full candidate list, sorted, built up front so batching and progress
    /// totals are exact.
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let filter = Arc::clone(&self.filter);
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .follow_links(false);
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if !is_dir || entry.depth() == 0 {
                return true;
            }
            !filter.is_ignored_dir(&relative_key(&root, entry.path()))
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    let relative = relative_key(&self.root, path);
                    if has_binary_extension(&relative) || self.filter.is_ignored(&relative) {
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.options.max_file_size {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.options.max_file_size
                            );
                            continue;
                        }
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} indexable files under {}", files.len(), self.root.display());
        files
    }
}

/// Root-relative path with `/` separators
pub fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn scan(root: &Path) -> Vec<String> {
        let filter = Arc::new(IgnoreFilter::load(root).unwrap());
        FileScanner::new(root, filter, ScanOptions::default())
            .scan()
            .iter()
            .map(|p| relative_key(root, p))
            .collect()
    }

    #[test]
    fn skips_ignored_directories_and_binaries() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("node_modules/react")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("node_modules/react/index.js"), b"module.exports = {}").unwrap();
        fs::write(root.join("src/main.rs"), b"fn main() {}").unwrap();
        fs::write(root.join("src/logo.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
        fs::write(root.join("Cargo.lock"), b"# lock").unwrap();

        assert_eq!(scan(root), vec!["src/main.rs".to_string()]);
    }

    #[test]
    fn override_file_can_reinclude_inside_excluded_dir() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("dist/bundle.js"), b"var a = 1;").unwrap();
        fs::write(root.join("dist/types.d.ts"), b"export type A = string;").unwrap();
        fs::write(root.join(".contextignore"), b"!dist/types.d.ts\n").unwrap();

        let files = scan(root);
        assert!(files.contains(&"dist/types.d.ts".to_string()));
        assert!(!files.contains(&"dist/bundle.js".to_string()));
    }

    #[test]
    fn gitignored_files_are_skipped_by_the_same_predicate() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join(".gitignore"), b"local.ts\n").unwrap();
        fs::write(root.join("app.ts"), b"export const app = 1;").unwrap();
        fs::write(root.join("local.ts"), b"export const local = 1;").unwrap();
        fs::write(root.join("nested/.gitignore"), b"deep.ts\n").unwrap();
        fs::write(root.join("nested/deep.ts"), b"export const deep = 1;").unwrap();

        let filter = IgnoreFilter::load(root).unwrap();
        let files = scan(root);
        assert_eq!(
            files,
            vec!["app.ts".to_string(), "nested/deep.ts".to_string()]
        );
        for file in ["app.ts", "local.ts", "nested/deep.ts"] {
            assert_eq!(files.contains(&file.to_string()), filter.should_index(file));
        }
    }

    #[test]
    fn skips_files_over_size_limit() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("big.ts"), vec![b'a'; 64]).unwrap();
        fs::write(root.join("small.ts"), b"let a = 1;").unwrap();

        let filter = Arc::new(IgnoreFilter::with_defaults().unwrap());
        let options = ScanOptions {
            max_file_size: 32,
            ..ScanOptions::default()
        };
        let files = FileScanner::new(root, filter, options).scan();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("small.ts"));
    }

    #[test]
    fn relative_key_uses_forward_slashes() {
        let root = Path::new("/work/app");
        assert_eq!(
            relative_key(root, Path::new("/work/app/src/lib/util.ts")),
            "src/lib/util.ts"
        );
    }
}
