use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use image::ExtendedColorType;
use image::codecs::webp::WebPEncoder;

use crate::error::TransformError;
use crate::io::{SourceFile, with_suffix, write_atomic, write_output};
use crate::transform::{Route, Transform};

/// Re-encodes a raster image into a modern format.
pub trait ImageEncoder: Send + Sync {
    /// Extension of the produced files, without the dot.
    fn extension(&self) -> &'static str;
    fn encode(&self, path: &Utf8Path, buffer: &[u8]) -> Result<Vec<u8>, TransformError>;

    /// Whether previously encoded bytes form a whole file. Cache entries
    /// failing this check are encoded again.
    fn is_complete(&self, encoded: &[u8]) -> bool {
        !encoded.is_empty()
    }
}

/// Lossless WebP through the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpEncoder;

impl ImageEncoder for WebpEncoder {
    fn extension(&self) -> &'static str {
        "webp"
    }

    fn encode(&self, path: &Utf8Path, buffer: &[u8]) -> Result<Vec<u8>, TransformError> {
        let error = |e| TransformError::Image(path.to_owned(), e);

        let img = image::ImageReader::new(Cursor::new(buffer))
            .with_guessed_format()?
            .decode()
            .map_err(error)?;

        let (w, h) = (img.width(), img.height());
        let mut out = Vec::new();

        WebPEncoder::new_lossless(&mut out)
            .encode(&img.to_rgba8(), w, h, ExtendedColorType::Rgba8)
            .map_err(error)?;

        Ok(out)
    }

    /// A RIFF container whose declared size matches the data.
    fn is_complete(&self, encoded: &[u8]) -> bool {
        if encoded.len() < 12 || &encoded[0..4] != b"RIFF" || &encoded[8..12] != b"WEBP" {
            return false;
        }

        let size = u32::from_le_bytes([encoded[4], encoded[5], encoded[6], encoded[7]]);
        size as usize + 8 == encoded.len()
    }
}

/// Writes an encoded copy of every matching image alongside the original
/// (`photo.png` -> `photo.webp`). Only files with one of `extensions` are
/// considered.
///
/// Encoded images are kept in a content-addressed cache, keyed by the hash of
/// the source bytes, so an unchanged image is never encoded twice. Entries are
/// written atomically and checked with [`ImageEncoder::is_complete`] before
/// reuse.
///
/// When several sources map to the same output (`photo.jpg` and `photo.png`)
/// only the first in path order is encoded, the rest are skipped with a
/// warning.
pub struct WebpTransform {
    pub route: Route,
    pub extensions: Vec<String>,
    pub encoder: Arc<dyn ImageEncoder>,
    pub cache: Option<Utf8PathBuf>,
}

impl WebpTransform {
    fn accepts(&self, path: &Utf8Path) -> bool {
        path.extension().is_some_and(|ext| {
            self.extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
    }

    fn output(&self, source: &SourceFile) -> Utf8PathBuf {
        let ext = self.encoder.extension();
        self.route.output(&with_suffix(&source.relative, ext))
    }

    /// Accepted sources, one per output path.
    fn select(&self, sources: Vec<SourceFile>) -> Vec<SourceFile> {
        let mut claimed = HashMap::new();
        let mut selected = Vec::new();

        for source in sources {
            if !self.accepts(&source.path) {
                continue;
            }

            match claimed.entry(self.output(&source)) {
                Entry::Occupied(entry) => {
                    tracing::warn!(
                        "skipping {}, {} already produces {}",
                        source.path,
                        entry.get(),
                        entry.key()
                    );
                }
                Entry::Vacant(entry) => {
                    entry.insert(source.path.clone());
                    selected.push(source);
                }
            }
        }

        selected
    }

    fn process(&self, source: &SourceFile) -> Result<(), TransformError> {
        let ext = self.encoder.extension();
        let output = self.output(source);
        let buffer = fs::read(&source.path)?;

        let Some(cache) = &self.cache else {
            let encoded = self.encoder.encode(&source.path, &buffer)?;
            return write_output(&output, encoded);
        };

        let hash = blake3::hash(&buffer).to_hex();
        let cached = cache.join(format!("{hash}.{ext}"));

        match fs::read(&cached) {
            Ok(encoded) if self.encoder.is_complete(&encoded) => {
                tracing::debug!("cache hit for {}", source.path);
                return write_output(&output, encoded);
            }
            Ok(_) => tracing::warn!("discarding incomplete cache entry {cached}"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let encoded = self.encoder.encode(&source.path, &buffer)?;
        write_atomic(&cached, &encoded)?;
        write_output(&output, encoded)
    }
}

impl Transform for WebpTransform {
    fn run(&self) -> Result<(), TransformError> {
        let sources = self.select(self.route.sources()?);
        self.route.for_each_of(sources, |source| self.process(source))?;
        Ok(())
    }
}
