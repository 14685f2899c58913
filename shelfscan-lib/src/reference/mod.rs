//! Labeled reference images
//!
//! A reference root holds one sub-directory per product class, each with
//! example images of that product:
//!
//! ```text
//! reference_images/
//!   cola_red/      front.jpg side.png ...
//!   foam_blue/     a.jpeg ...
//!   new_product/   (empty: a valid class with no examples yet)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{info, warn};

use crate::embed::{l2_normalize, Embedder, Embedding};
use crate::index::{EmbeddingIndex, FlatIndex, IndexBuilder};
use crate::{Error, Result};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A reference image and the class directory it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub path: PathBuf,
    pub class: String,
}

/// Every class and reference image under a reference root
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    pub root: PathBuf,
    pub classes: Vec<String>,
    pub images: Vec<ReferenceImage>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Sorted names of the class directories under `root`.
pub fn list_classes(root: impl AsRef<Path>) -> Result<Vec<String>> {
    let mut classes = Vec::new();
    for entry in fs::read_dir(root.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => classes.push(name),
            Err(name) => warn!("skipping non UTF-8 class directory {name:?}"),
        }
    }
    classes.sort();
    Ok(classes)
}

impl ReferenceSet {
    /// Collect classes and their image files, both in sorted order.
    ///
    /// Fails with [`Error::InvalidInput`] when `root` has no class directories.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let classes = list_classes(root)?;
        if classes.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no class directories found in {}",
                root.display()
            )));
        }

        let mut images = Vec::new();
        for class in &classes {
            let mut paths: Vec<PathBuf> = fs::read_dir(root.join(class))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && is_image(path))
                .collect();
            paths.sort();

            images.extend(paths.into_iter().map(|path| ReferenceImage {
                path,
                class: class.clone(),
            }));
        }

        Ok(Self {
            root: root.to_path_buf(),
            classes,
            images,
        })
    }

    #[must_use]
    pub fn contains_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Embed every reference image and build an index from the results.
    ///
    /// All images are decoded first and embedded in one
    /// [`embed_batch`](Embedder::embed_batch) call, so a backend batch size
    /// applies here too. Images that fail to decode or give a degenerate
    /// embedding are skipped with a warning; a failing backend aborts the
    /// build. Fails with [`Error::EmptyReferenceSet`] if no image survives.
    pub fn build_index<E: Embedder>(&self, embedder: &mut E) -> Result<FlatIndex> {
        let mut decoded: Vec<&ReferenceImage> = Vec::with_capacity(self.images.len());
        let mut pixels: Vec<RgbImage> = Vec::with_capacity(self.images.len());
        for reference in &self.images {
            match load_rgb(&reference.path) {
                Ok(image) => {
                    decoded.push(reference);
                    pixels.push(image);
                }
                Err(e) => warn!("skipping {}: {e}", reference.path.display()),
            }
        }

        let embeddings = if pixels.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&pixels)?
        };
        if embeddings.len() != pixels.len() {
            return Err(Error::Embedding(format!(
                "{} returned {} embeddings for {} reference images",
                embedder.model_name(),
                embeddings.len(),
                pixels.len()
            )));
        }

        let mut builder = IndexBuilder::new();
        for (reference, embedding) in decoded.into_iter().zip(embeddings) {
            match normalize_reference(&reference.path, embedding) {
                Ok(embedding) => builder.push(embedding, reference.class.clone()),
                Err(e) => warn!("skipping {}: {e}", reference.path.display()),
            }
        }

        let skipped = self.images.len() - builder.len();
        let index = builder.finish()?;
        info!(
            "built index with {} vectors ({skipped} skipped) for classes {:?}",
            index.len(),
            self.classes
        );
        Ok(index)
    }
}

fn load_rgb(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

fn normalize_reference(path: &Path, embedding: Embedding) -> Result<Embedding> {
    l2_normalize(embedding).ok_or_else(|| Error::DegenerateReference(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::classify::tests::ColorEmbedder;

    fn write_png(path: &Path, color: [u8; 3]) {
        RgbImage::from_pixel(8, 8, Rgb(color)).save(path).unwrap();
    }

    fn reference_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir(root.join("red")).unwrap();
        fs::create_dir(root.join("blue")).unwrap();
        fs::create_dir(root.join("empty")).unwrap();

        write_png(&root.join("red").join("b.png"), [250, 0, 0]);
        write_png(&root.join("red").join("a.png"), [200, 10, 0]);
        write_png(&root.join("blue").join("one.png"), [0, 0, 255]);
        fs::write(root.join("blue").join("notes.txt"), "not an image").unwrap();
        fs::write(root.join("stray.png"), "top-level files are not classes").unwrap();

        dir
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("a.png")));
        assert!(is_image(Path::new("a.JPEG")));
        assert!(is_image(Path::new("dir/a.jpg")));
        assert!(!is_image(Path::new("a.gif")));
        assert!(!is_image(Path::new("png")));
    }

    #[test]
    fn test_list_classes_sorted_dirs_only() {
        let dir = reference_root();
        let classes = list_classes(dir.path()).unwrap();
        assert_eq!(classes, ["blue", "empty", "red"]);
    }

    #[test]
    fn test_scan_collects_images_in_order() {
        let dir = reference_root();
        let set = ReferenceSet::scan(dir.path()).unwrap();

        let found: Vec<(String, String)> = set
            .images
            .iter()
            .map(|r| {
                let name = r.path.file_name().unwrap().to_string_lossy().into_owned();
                (r.class.clone(), name)
            })
            .collect();
        assert_eq!(
            found,
            [
                ("blue".to_string(), "one.png".to_string()),
                ("red".to_string(), "a.png".to_string()),
                ("red".to_string(), "b.png".to_string()),
            ]
        );
        assert!(set.contains_class("empty"));
        assert!(!set.contains_class("green"));
    }

    #[test]
    fn test_scan_without_classes_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ReferenceSet::scan(dir.path()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_index_labels_follow_scan_order() {
        let dir = reference_root();
        let set = ReferenceSet::scan(dir.path()).unwrap();

        let index = set.build_index(&mut ColorEmbedder).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.labels(), ["blue", "red", "red"]);

        let norm: f32 = index.embedding(1).unwrap().iter().map(|x| x * x).sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_build_index_skips_broken_images() {
        let dir = reference_root();
        fs::write(dir.path().join("red").join("broken.jpg"), "garbage").unwrap();
        write_png(&dir.path().join("blue").join("black.png"), [0, 0, 0]);

        let set = ReferenceSet::scan(dir.path()).unwrap();
        assert_eq!(set.images.len(), 5);

        let index = set.build_index(&mut ColorEmbedder).unwrap();
        assert_eq!(index.len(), 3);
    }

    /// Counts batch calls and embeds like [`ColorEmbedder`].
    #[derive(Default)]
    struct CountingEmbedder {
        batches: Vec<usize>,
    }

    impl Embedder for CountingEmbedder {
        fn embed(&mut self, crop: &RgbImage) -> Result<Embedding> {
            ColorEmbedder.embed(crop)
        }

        fn embed_batch(&mut self, crops: &[RgbImage]) -> Result<Vec<Embedding>> {
            self.batches.push(crops.len());
            crops.iter().map(|crop| ColorEmbedder.embed(crop)).collect()
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_build_index_embeds_in_one_batch() {
        let dir = reference_root();
        fs::write(dir.path().join("red").join("broken.jpg"), "garbage").unwrap();
        let set = ReferenceSet::scan(dir.path()).unwrap();

        let mut embedder = CountingEmbedder::default();
        let index = set.build_index(&mut embedder).unwrap();

        // the undecodable file never reaches the embedder
        assert_eq!(embedder.batches, [3]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_zero_norm_reference_is_degenerate() {
        let path = Path::new("refs/red/black.png");
        let result = normalize_reference(path, vec![0.0, 0.0, 0.0]);
        assert!(matches!(result, Err(Error::DegenerateReference(p)) if p == path));

        let embedding = normalize_reference(path, vec![3.0, 0.0, 4.0]).unwrap();
        assert_eq!(embedding, [0.6, 0.0, 0.8]);
    }

    #[test]
    fn test_build_index_nothing_usable() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let set = ReferenceSet::scan(dir.path()).unwrap();
        assert!(matches!(
            set.build_index(&mut ColorEmbedder),
            Err(Error::EmptyReferenceSet)
        ));
    }
}
