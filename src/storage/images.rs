//! Source image files
//!
//! Inputs may be image files or directories of page images. Directories are
//! read in file-name order so page sequence follows naming.

use crate::etl::Extractor;
use crate::extraction::SourceImage;
use eyre::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// Default cap on document pages read per run
pub const DEFAULT_MAX_PAGES: usize = 88;

/// MIME type for a supported image extension
pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

/// Page images gathered from files and directories
pub struct ImageDirectory {
    inputs: Vec<PathBuf>,
    max_pages: usize,
}

impl ImageDirectory {
    pub fn new<I, P>(inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            inputs: inputs.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Image paths in page order, before the page cap
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for input in &self.inputs {
            if input.is_dir() {
                let mut pages: Vec<PathBuf> = std::fs::read_dir(input)
                    .with_context(|| format!("Failed to read directory: {}", input.display()))?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|path| path.is_file() && mime_for(path).is_some())
                    .collect();
                pages.sort();
                log::debug!("{}: {} page image(s)", input.display(), pages.len());
                paths.extend(pages);
            } else if mime_for(input).is_some() {
                paths.push(input.clone());
            } else if input.exists() {
                bail!("Unsupported image type: {}", input.display());
            } else {
                bail!("Input not found: {}", input.display());
            }
        }

        Ok(paths)
    }

    /// Read the images, keeping at most `max_pages`
    pub fn read(&self) -> Result<Vec<SourceImage>> {
        let mut paths = self.paths()?;
        if paths.len() > self.max_pages {
            log::warn!(
                "{} pages found, only the first {} are read",
                paths.len(),
                self.max_pages
            );
            paths.truncate(self.max_pages);
        }

        paths
            .iter()
            .map(|path| {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read image: {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let mime = mime_for(path).unwrap_or("application/octet-stream");
                Ok(SourceImage::new(name, mime, bytes))
            })
            .collect()
    }
}

impl Extractor for ImageDirectory {
    type Item = SourceImage;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        self.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_for(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for(Path::new("scan.tiff")), Some("image/tiff"));
        assert_eq!(mime_for(Path::new("notes.txt")), None);
        assert_eq!(mime_for(Path::new("noext")), None);
    }

    #[test]
    fn test_directory_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "page-2.png");
        touch(temp.path(), "page-1.jpg");
        touch(temp.path(), "readme.txt");

        let images = ImageDirectory::new([temp.path()]).read().unwrap();
        let names: Vec<_> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["page-1.jpg", "page-2.png"]);
        assert_eq!(images[0].mime, "image/jpeg");
        assert_eq!(images[1].bytes, b"page-2.png");
    }

    #[test]
    fn test_page_cap() {
        let temp = TempDir::new().unwrap();
        for n in 1..=5 {
            touch(temp.path(), &format!("p{}.png", n));
        }
        let images = ImageDirectory::new([temp.path()])
            .with_max_pages(3)
            .read()
            .unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images[2].name, "p3.png");
    }

    #[test]
    fn test_explicit_files_keep_argument_order() {
        let temp = TempDir::new().unwrap();
        let b = touch(temp.path(), "b.png");
        let a = touch(temp.path(), "a.png");
        let paths = ImageDirectory::new([&b, &a]).paths().unwrap();
        assert_eq!(paths, vec![b, a]);
    }

    #[test]
    fn test_bad_inputs() {
        let temp = TempDir::new().unwrap();
        let text = touch(temp.path(), "notes.txt");
        assert!(ImageDirectory::new([&text]).read().is_err());
        assert!(ImageDirectory::new([temp.path().join("missing.png")]).read().is_err());
    }
}
