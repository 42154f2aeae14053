use clap::{Parser, Subcommand, ValueEnum};
use chrono::Utc;
use papersift_core::{
    build_cross_modal_encoder, build_text_encoder, AddOptions, BatchReport, CrossModalEncoderKind,
    DocumentOutcome, DocumentQuery, EncoderConfig, ImageIdentity, ImageIndexer, LopdfExtractor,
    PaperIngestor, PipelineConfig, QueryHit, RetrievalService, TextEncoderKind, VectorStore,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "papersift", version, about = "Local multimodal paper and image search")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root data directory (papers/, images/, index/ live underneath)
    #[arg(long, env = "PAPERSIFT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Vector store backend
    #[arg(long, env = "PAPERSIFT_BACKEND", value_enum, default_value_t = Backend::Local)]
    backend: Backend,

    /// Qdrant base URL, used with --backend qdrant
    #[arg(long, env = "PAPERSIFT_QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Text encoder
    #[arg(long, env = "PAPERSIFT_TEXT_ENCODER", value_enum, default_value_t = TextEncoderChoice::Ngram)]
    text_encoder: TextEncoderChoice,

    /// Output dimensionality of the n-gram text encoder
    #[arg(long, env = "PAPERSIFT_NGRAM_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    ngram_dimensions: usize,

    /// Base URL of a remote text embedding server
    #[arg(long, env = "PAPERSIFT_TEXT_ENCODER_URL")]
    text_encoder_url: Option<String>,

    /// Output dimensionality of the remote text encoder
    #[arg(long, env = "PAPERSIFT_TEXT_DIMENSIONS", default_value = "768")]
    text_dimensions: usize,

    /// Cross-modal (image) encoder
    #[arg(long, env = "PAPERSIFT_IMAGE_ENCODER", value_enum, default_value_t = ImageEncoderChoice::Palette)]
    image_encoder: ImageEncoderChoice,

    /// Base URL of a remote cross-modal embedding server
    #[arg(long, env = "PAPERSIFT_IMAGE_ENCODER_URL")]
    image_encoder_url: Option<String>,

    /// Output dimensionality of the remote cross-modal encoder
    #[arg(long, env = "PAPERSIFT_IMAGE_DIMENSIONS", default_value = "1024")]
    image_dimensions: usize,

    /// Image record identity: hash of the path or of the file bytes
    #[arg(long, env = "PAPERSIFT_IMAGE_IDENTITY", value_enum, default_value_t = IdentityChoice::Path)]
    image_identity: IdentityChoice,

    /// Also write logs to this file
    #[arg(long, env = "PAPERSIFT_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Local,
    Qdrant,
}

#[derive(Clone, Copy, ValueEnum)]
enum TextEncoderChoice {
    Ngram,
    Remote,
    /// On-device sentence transformer (build with `--features local-models`)
    Local,
}

#[derive(Clone, Copy, ValueEnum)]
enum ImageEncoderChoice {
    Palette,
    Remote,
    /// On-device CLIP (build with `--features local-models`)
    Clip,
}

#[derive(Clone, Copy, ValueEnum)]
enum IdentityChoice {
    Path,
    Content,
}

#[derive(Subcommand)]
enum Command {
    /// Add a paper, optionally classifying and moving it into a topic folder.
    AddPaper {
        /// Path to the PDF file.
        path: PathBuf,
        /// Comma-separated candidate topics (e.g. CV,NLP,RL).
        #[arg(long, default_value = "")]
        topics: String,
        /// Move the file into its topic folder under the papers directory.
        #[arg(long = "move", default_value_t = false)]
        relocate: bool,
        /// Skip indexing.
        #[arg(long, default_value_t = false)]
        no_index: bool,
    },
    /// Search papers by meaning.
    SearchPaper {
        query: String,
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Also return matching text snippets.
        #[arg(long, default_value_t = false)]
        snippets: bool,
        /// Do not return file-level matches.
        #[arg(long, default_value_t = false)]
        no_files: bool,
    },
    /// Search indexed images with a text description.
    SearchImage {
        query: String,
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// Classify, move and index every PDF below a directory.
    BatchOrganize {
        #[arg(long)]
        root: PathBuf,
        /// Comma-separated candidate topics.
        #[arg(long)]
        topics: String,
    },
    /// Index all images in a directory (defaults to the images directory).
    IndexImages {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print how many records each collection holds.
    Stats,
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(log_file) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        return Ok(None);
    };

    let directory = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&directory)?;
    let file_name = log_file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file has no name: {}", log_file.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&directory, file_name));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

fn parse_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|topic| topic.trim().to_string())
        .filter(|topic| !topic.is_empty())
        .collect()
}

fn encoder_config(cli: &Cli, model_cache_dir: &Path) -> anyhow::Result<EncoderConfig> {
    if cli.ngram_dimensions == 0 {
        anyhow::bail!("--ngram-dimensions must be positive");
    }
    let text = match cli.text_encoder {
        TextEncoderChoice::Ngram => TextEncoderKind::Ngram {
            dimensions: cli.ngram_dimensions,
        },
        TextEncoderChoice::Local => TextEncoderKind::Local,
        TextEncoderChoice::Remote => TextEncoderKind::Remote {
            endpoint: cli
                .text_encoder_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--text-encoder-url is required for a remote text encoder"))?,
        },
    };
    let cross_modal = match cli.image_encoder {
        ImageEncoderChoice::Palette => CrossModalEncoderKind::Palette,
        ImageEncoderChoice::Clip => CrossModalEncoderKind::Clip,
        ImageEncoderChoice::Remote => CrossModalEncoderKind::Remote {
            endpoint: cli
                .image_encoder_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--image-encoder-url is required for a remote image encoder"))?,
        },
    };

    Ok(EncoderConfig {
        text,
        cross_modal,
        remote_text_dimensions: cli.text_dimensions,
        remote_image_dimensions: cli.image_dimensions,
        model_cache_dir: model_cache_dir.to_path_buf(),
        ..EncoderConfig::default()
    })
}

fn print_report(label: &str, report: &BatchReport) {
    println!(
        "{label}: {} succeeded, {} skipped",
        report.succeeded,
        report.skipped.len()
    );
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
}

fn print_files(files: &[QueryHit]) {
    println!("\n[Files]");
    if files.is_empty() {
        println!("No files found.");
        return;
    }
    for (index, hit) in files.iter().enumerate() {
        println!(
            "{}. {} (Dist: {:.4})",
            index + 1,
            hit.metadata_str("filename").unwrap_or("?"),
            hit.distance
        );
        println!("   Path: {}", hit.metadata_str("path").unwrap_or("?"));
        println!("   Topic: {}", hit.metadata_str("topic").unwrap_or("?"));
    }
}

fn print_snippets(snippets: &[QueryHit]) {
    println!("\n[Snippets]");
    if snippets.is_empty() {
        println!("No snippets found.");
        return;
    }
    for (index, hit) in snippets.iter().enumerate() {
        let preview: String = hit
            .document
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(100)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        println!(
            "{}. {} (Page {}): {}...",
            index + 1,
            hit.metadata_str("filename").unwrap_or("?"),
            hit.metadata_u64("page_id").unwrap_or_default(),
            preview
        );
    }
}

fn print_images(images: &[QueryHit]) {
    println!("\n--- Image Search Results ---");
    if images.is_empty() {
        println!("No images found.");
        return;
    }
    for (index, hit) in images.iter().enumerate() {
        println!(
            "{}. {} (Dist: {:.4})",
            index + 1,
            hit.metadata_str("filename").unwrap_or("?"),
            hit.distance
        );
        println!("   Path: {}", hit.metadata_str("path").unwrap_or("?"));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_file.as_deref())?;

    let mut config = PipelineConfig::from_data_dir(&cli.data_dir);
    config.image_identity = match cli.image_identity {
        IdentityChoice::Path => ImageIdentity::Path,
        IdentityChoice::Content => ImageIdentity::Content,
    };
    config.ensure_directories()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        data_dir = %config.data_dir.display(),
        "papersift boot"
    );

    let encoders = encoder_config(&cli, &config.cache_dir)?;
    let text_encoder = build_text_encoder(&encoders)?;
    let image_encoder = build_cross_modal_encoder(&encoders)?;

    let store = match cli.backend {
        Backend::Local => VectorStore::open_local(&config.index_dir, &config.collections)?,
        Backend::Qdrant => {
            VectorStore::open_qdrant(
                &cli.qdrant_url,
                &config.collections,
                text_encoder.dimensions(),
                image_encoder.dimensions(),
            )
            .await?
        }
    };

    match cli.command {
        Command::AddPaper {
            path,
            topics,
            relocate,
            no_index,
        } => {
            let ingestor = PaperIngestor::new(
                Arc::new(LopdfExtractor),
                text_encoder,
                store,
                config.papers_root(),
                config.chunking,
            );
            let options = AddOptions {
                relocate,
                index: !no_index,
            };
            match ingestor.add_document(&path, &parse_topics(&topics), options).await? {
                DocumentOutcome::EmptyText { path } => {
                    warn!(path = %path.display(), "no text extracted");
                    println!("No text extracted from {}", path.display());
                }
                DocumentOutcome::Processed(processed) => {
                    println!("Topic: {}", processed.topic);
                    println!("Path: {}", processed.path.display());
                    if let Some(hash) = processed.hash {
                        println!("Indexed {} ({} chunks)", hash, processed.chunk_count);
                    }
                }
            }
        }
        Command::SearchPaper {
            query,
            top_k,
            snippets,
            no_files,
        } => {
            let service = RetrievalService::new(text_encoder, image_encoder, store);
            let result = service
                .search_documents(&DocumentQuery {
                    text: query,
                    top_k,
                    want_files: !no_files,
                    want_snippets: snippets,
                })
                .await?;

            println!("\n--- Search Results ---");
            if let Some(files) = &result.files {
                print_files(files);
            }
            if let Some(snippets) = &result.snippets {
                print_snippets(snippets);
            }
        }
        Command::SearchImage { query, top_k } => {
            let service = RetrievalService::new(text_encoder, image_encoder, store);
            let hits = service.search_images(&query, top_k).await?;
            print_images(&hits);
        }
        Command::BatchOrganize { root, topics } => {
            let topics = parse_topics(&topics);
            if topics.is_empty() {
                anyhow::bail!("--topics needs at least one topic");
            }
            let ingestor = PaperIngestor::new(
                Arc::new(LopdfExtractor),
                text_encoder,
                store,
                config.papers_root(),
                config.chunking,
            );
            let report = ingestor.batch_add_documents(&root, &topics).await;
            print_report("papers", &report);
        }
        Command::IndexImages { dir } => {
            let directory = dir.unwrap_or_else(|| config.images_dir.clone());
            let indexer = ImageIndexer::new(image_encoder, store)
                .with_batch_size(config.image_batch_size)
                .with_identity(config.image_identity);
            let report = indexer.index_images(&directory).await;
            print_report("images", &report);
        }
        Command::Stats => {
            let counts = store.counts().await?;
            println!("{}: {}", config.collections.files, counts.files);
            println!("{}: {}", config.collections.chunks, counts.chunks);
            println!("{}: {}", config.collections.images, counts.images);
        }
    }

    Ok(())
}
