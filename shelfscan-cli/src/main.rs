//! ShelfScan CLI - count a product on a shelf photo and find gaps
//!
//! # Commands
//!
//! ```bash
//! # Embed the reference images and save the index
//! shelfscan build-index --references data/reference_images --index embeddings
//!
//! # List the product classes available
//! shelfscan classes --references data/reference_images
//!
//! # Count a product and mark gaps
//! shelfscan detect --class cola_red --image data/shelves/aisle3.jpg
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shelfscan_lib::{
    classify::Classifier,
    config::DetectorConfig,
    embed::{ClipEmbedder, Embedder},
    index::EmbeddingIndex,
    pipeline::Pipeline,
    reference::{list_classes, ReferenceSet},
    render::OverlayRenderer,
    segment::ContourSegmenter,
    Error,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_REFERENCES: &str = "data/reference_images";
const DEFAULT_INDEX: &str = "embeddings";
const DEFAULT_OUTPUT: &str = "outputs/vis";

#[derive(Parser)]
#[command(name = "shelfscan")]
#[command(about = "Retail shelf product counter and gap detector")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed all reference images and save the index
    BuildIndex {
        /// Directory with one sub-directory of images per class
        #[arg(long, default_value = DEFAULT_REFERENCES)]
        references: PathBuf,

        /// Directory to write the index into
        #[arg(long, default_value = DEFAULT_INDEX)]
        index: PathBuf,

        /// Crops per model batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// List the product classes in the reference directory
    Classes {
        #[arg(long, default_value = DEFAULT_REFERENCES)]
        references: PathBuf,
    },

    /// Count a product class on a shelf image and mark gaps
    Detect {
        /// Product class to count (a reference sub-directory name)
        #[arg(short, long)]
        class: String,

        /// Shelf image
        #[arg(short, long)]
        image: PathBuf,

        #[arg(long, default_value = DEFAULT_INDEX)]
        index: PathBuf,

        #[arg(long, default_value = DEFAULT_REFERENCES)]
        references: PathBuf,

        /// Directory for the annotated image
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,

        /// JSON file with detector settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Minimum cosine similarity for a match (overrides config)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Gap width in units of average product width (overrides config)
        #[arg(long)]
        gap_factor: Option<f64>,

        /// TTF/OTF font for labels on the annotated image
        #[arg(long)]
        font: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>, threshold: Option<f32>, gap_factor: Option<f64>) -> Result<DetectorConfig> {
    let mut config = match path {
        Some(path) => DetectorConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    if let Some(threshold) = threshold {
        config = config.with_similarity_threshold(threshold);
    }
    if let Some(factor) = gap_factor {
        config = config.with_gap_threshold_factor(factor);
    }
    config.validate()?;
    Ok(config)
}

/// Fail early on a missing shelf image or a class with no reference directory.
fn check_inputs(image: &Path, class: &str, classes: &[String]) -> Result<()> {
    if !image.is_file() {
        bail!("image {} not found", image.display());
    }
    if !classes.iter().any(|c| c == class) {
        bail!(
            "{} (available: {})",
            Error::InvalidClass(class.to_string()),
            classes.join(", ")
        );
    }
    Ok(())
}

fn result_path(output_dir: &Path, image: &Path) -> PathBuf {
    let name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.png".to_string());
    output_dir.join(format!("result_{name}"))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildIndex {
            references,
            index,
            batch_size,
        } => {
            let set = ReferenceSet::scan(&references)
                .with_context(|| format!("failed to scan {}", references.display()))?;
            println!(
                "Found {} reference images in {} classes",
                set.images.len(),
                set.classes.len()
            );

            println!("Loading CLIP model (first run downloads ~350MB)...");
            let mut embedder = ClipEmbedder::new()?;
            if let Some(batch_size) = batch_size {
                embedder = embedder.with_batch_size(batch_size);
            }

            let built = set.build_index(&mut embedder)?;
            built.save(&index)?;
            println!(
                "Index built with {} vectors ({} dims) for classes: {}",
                built.len(),
                built.dimension(),
                set.classes.join(", ")
            );
        }

        Commands::Classes { references } => {
            let classes = list_classes(&references)
                .with_context(|| format!("failed to read {}", references.display()))?;
            if classes.is_empty() {
                println!("No classes found in {}", references.display());
            }
            for class in classes {
                println!("{class}");
            }
        }

        Commands::Detect {
            class,
            image,
            index,
            references,
            output,
            config,
            threshold,
            gap_factor,
            font,
        } => {
            let config = load_config(config.as_deref(), threshold, gap_factor)?;
            let classes = list_classes(&references)
                .with_context(|| format!("failed to read {}", references.display()))?;
            check_inputs(&image, &class, &classes)?;

            let mut renderer = OverlayRenderer::new();
            if let Some(font) = &font {
                renderer = renderer.with_font_file(font)?;
            }

            println!("Loading CLIP model...");
            let embedder = ClipEmbedder::new()?;
            info!("embedding with {}", embedder.model_name());
            let classifier = Classifier::from_artifacts(embedder, &index)
                .context("index not found, run `shelfscan build-index` first")?;

            let shelf = image::open(&image)
                .with_context(|| format!("failed to decode {}", image.display()))?
                .to_rgb8();

            let mut pipeline = Pipeline::new(ContourSegmenter::default(), classifier, renderer)
                .with_known_classes(classes);
            let report = pipeline.run(&shelf, &class, &config)?;

            println!("Detected {} instances of {class}", report.count);
            println!("Found {} gaps", report.gaps.len());

            fs::create_dir_all(&output)?;
            let path = result_path(&output, &image);
            report
                .annotated
                .save(&path)
                .with_context(|| format!("failed to save {}", path.display()))?;
            println!("Results saved to {}", path.display());
        }
    }

    Ok(())
}
