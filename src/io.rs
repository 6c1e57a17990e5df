use std::fs;
use std::io::Write;
use std::time::Instant;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use glob::glob;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{CleanError, TransformError};
use crate::utils::as_overhead;

/// Delete an output root and everything below it. A missing root is not an
/// error, so cleaning is idempotent.
pub fn clean(root: &Utf8Path) -> Result<(), CleanError> {
    let s = Instant::now();

    match fs::remove_dir_all(root) {
        Ok(()) => {
            info!("cleaned {} {}", root, as_overhead(s));
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("nothing to clean at {}", root);
            Ok(())
        }
        Err(source) => Err(CleanError {
            root: root.to_owned(),
            source,
        }),
    }
}

/// A source file matched by a transform's glob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path of the file as matched on disk.
    pub path: Utf8PathBuf,
    /// Path relative to the static base of the glob, used to mirror the
    /// source layout in the output root.
    pub relative: Utf8PathBuf,
}

/// Collect every regular file matching `pattern`, sorted by path. Each file's
/// `relative` path is computed against `base`.
pub fn collect_sources(pattern: &str, base: &Utf8Path) -> Result<Vec<SourceFile>, TransformError> {
    let mut files = Vec::new();
    let lexical_base = normalize(base);

    for entry in glob(pattern)? {
        let path = Utf8PathBuf::try_from(entry?)?;

        if !path.is_file() {
            continue;
        }

        // glob drops a leading `./`, compare both sides in normal form
        let relative = normalize(&path)
            .strip_prefix(&lexical_base)
            .map_err(|_| TransformError::OutsideBase {
                path: path.clone(),
                base: base.to_owned(),
            })?
            .to_path_buf();

        files.push(SourceFile { path, relative });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Lexically normalize a path: `.` components are dropped and `..` removes
/// the preceding normal component. The filesystem is never consulted, so
/// symlinks are not resolved.
pub fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();

    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                let last = out.components().next_back();
                match last {
                    Some(Utf8Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Utf8Component::RootDir | Utf8Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_str()),
        }
    }

    out
}

/// Write `data` to `path`, creating parent directories as needed.
pub fn write_output(path: &Utf8Path, data: impl AsRef<[u8]>) -> Result<(), TransformError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    fs::write(path, data)?;
    Ok(())
}

/// Like [`write_output`], but the file only appears once it is complete. The
/// data goes to a temporary file in the same directory which is then renamed
/// over `path`, so concurrent readers see either nothing or all of it.
pub fn write_atomic(path: &Utf8Path, data: impl AsRef<[u8]>) -> Result<(), TransformError> {
    let dir = path.parent().unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data.as_ref())?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Copy a file verbatim, creating parent directories as needed.
pub fn copy_file(from: &Utf8Path, to: &Utf8Path) -> Result<(), TransformError> {
    if let Some(dir) = to.parent() {
        fs::create_dir_all(dir)?;
    }

    fs::copy(from, to)?;
    Ok(())
}

/// Swap the extension of a relative path, keeping a compound suffix such as
/// `min.css` intact (`main.scss` + `min.css` -> `main.min.css`).
pub fn with_suffix(path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    let stem = path.file_stem().unwrap_or_default();
    let name = format!("{stem}.{suffix}");

    match path.parent() {
        Some(parent) => parent.join(name),
        None => Utf8PathBuf::from(name),
    }
}
