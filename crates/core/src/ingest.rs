use crate::chunking::{build_chunks, ChunkingConfig};
use crate::embeddings::{dot, embed_one, TextEncoder};
use crate::extractor::PdfExtractor;
use crate::models::{
    to_metadata, BatchReport, ChunkMetadata, DocumentOutcome, FileMetadata, ParsedDocument,
    ProcessedDocument, Record, UNCATEGORIZED,
};
use crate::store::VectorStore;
use crate::IngestError;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_files_with_extensions(folder: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)));

        if matches {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    discover_files_with_extensions(folder, &["pdf"])
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Content address of a document: SHA-256 of its extracted full text.
pub fn document_hash(full_text: &str) -> String {
    sha256_hex(full_text.as_bytes())
}

pub fn chunk_id(document_hash: &str, sequence_index: usize) -> String {
    format!("{document_hash}_{sequence_index}")
}

/// Index of the topic vector with the highest dot product; first wins on ties.
pub fn best_topic_index(document: &[f32], topics: &[Vec<f32>]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, topic) in topics.iter().enumerate() {
        let score = dot(document, topic);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}

/// Topic labels become directory names, so path separators are replaced.
pub fn topic_directory_name(topic: &str) -> String {
    let cleaned: String = topic
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => UNCATEGORIZED.to_string(),
        _ => cleaned,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    pub relocate: bool,
    pub index: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            relocate: false,
            index: true,
        }
    }
}

/// Parses, classifies, optionally relocates and indexes PDF papers.
pub struct PaperIngestor {
    extractor: Arc<dyn PdfExtractor>,
    encoder: Arc<dyn TextEncoder>,
    store: VectorStore,
    papers_root: PathBuf,
    chunking: ChunkingConfig,
}

impl PaperIngestor {
    pub fn new(
        extractor: Arc<dyn PdfExtractor>,
        encoder: Arc<dyn TextEncoder>,
        store: VectorStore,
        papers_root: impl Into<PathBuf>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            extractor,
            encoder,
            store,
            papers_root: papers_root.into(),
            chunking,
        }
    }

    pub fn parse(&self, path: &Path) -> Result<ParsedDocument, IngestError> {
        let pages = self.extractor.extract_pages(path)?;
        let texts: Vec<&str> = pages.iter().map(|page| page.text.as_str()).collect();
        build_chunks(&texts, &self.chunking)
    }

    /// Picks the topic closest to `document_vector`.
    pub async fn classify(
        &self,
        document_vector: &[f32],
        topics: &[String],
    ) -> Result<String, IngestError> {
        if topics.is_empty() {
            return Ok(UNCATEGORIZED.to_string());
        }
        let topic_vectors = self.encoder.embed_texts(topics).await?;
        Ok(best_topic_index(document_vector, &topic_vectors)
            .map(|index| topics[index].clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string()))
    }

    /// Runs the per-document flow. Each step commits on its own: a failure
    /// while indexing does not undo an earlier move.
    pub async fn add_document(
        &self,
        path: &Path,
        topics: &[String],
        options: AddOptions,
    ) -> Result<DocumentOutcome, IngestError> {
        let path = std::fs::canonicalize(path).map_err(|error| match error.kind() {
            ErrorKind::NotFound => IngestError::NotFound(path.to_path_buf()),
            _ => IngestError::Io(error),
        })?;

        info!(path = %path.display(), "processing paper");
        let parsed = match self.parse(&path) {
            Ok(parsed) => parsed,
            Err(IngestError::PdfParse(reason)) => {
                warn!(path = %path.display(), reason = %reason, "unreadable pdf, skipping");
                return Ok(DocumentOutcome::EmptyText { path });
            }
            Err(error) => return Err(error),
        };
        if parsed.full_text.trim().is_empty() {
            warn!(path = %path.display(), "no text extracted, skipping");
            return Ok(DocumentOutcome::EmptyText { path });
        }

        let mut document_vector = None;
        let mut topic = UNCATEGORIZED.to_string();
        if !topics.is_empty() {
            let vector = embed_one(self.encoder.as_ref(), &parsed.full_text).await?;
            topic = self.classify(&vector, topics).await?;
            info!(path = %path.display(), topic = %topic, "classified");
            document_vector = Some(vector);
        }

        let final_path = if options.relocate && !topics.is_empty() {
            self.relocate(&path, &topic).await?
        } else {
            path
        };

        if !options.index {
            return Ok(DocumentOutcome::Processed(ProcessedDocument {
                path: final_path,
                hash: None,
                topic,
                chunk_count: parsed.chunks.len(),
                indexed: false,
            }));
        }

        let document_vector = match document_vector {
            Some(vector) => vector,
            None => embed_one(self.encoder.as_ref(), &parsed.full_text).await?,
        };
        let hash = self
            .index_document(&final_path, &parsed, &topic, document_vector)
            .await?;

        Ok(DocumentOutcome::Processed(ProcessedDocument {
            path: final_path,
            hash: Some(hash),
            topic,
            chunk_count: parsed.chunks.len(),
            indexed: true,
        }))
    }

    async fn relocate(&self, path: &Path, topic: &str) -> Result<PathBuf, IngestError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;
        let destination_dir = self.papers_root.join(topic_directory_name(topic));
        tokio::fs::create_dir_all(&destination_dir).await?;

        let destination_dir = tokio::fs::canonicalize(&destination_dir).await?;
        let destination = destination_dir.join(file_name);
        if destination == path {
            return Ok(destination);
        }

        move_file(path, &destination).await?;
        info!(from = %path.display(), to = %destination.display(), "moved paper");
        Ok(destination)
    }

    async fn index_document(
        &self,
        path: &Path,
        parsed: &ParsedDocument,
        topic: &str,
        document_vector: Vec<f32>,
    ) -> Result<String, IngestError> {
        let hash = document_hash(&parsed.full_text);
        let path_text = path.to_string_lossy().to_string();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| IngestError::MissingFileName(path_text.clone()))?;

        let file_metadata = FileMetadata {
            path: path_text.clone(),
            filename: filename.clone(),
            hash: hash.clone(),
            topic: topic.to_string(),
            indexed_at: Utc::now(),
        };
        self.store
            .files
            .upsert(vec![Record {
                id: hash.clone(),
                vector: document_vector,
                metadata: to_metadata(&file_metadata).map_err(crate::StoreError::from)?,
                document: None,
            }])
            .await?;

        if parsed.chunks.is_empty() {
            return Ok(hash);
        }

        let texts: Vec<String> = parsed.chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.encoder.embed_texts(&texts).await?;

        let records = parsed
            .chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let metadata = ChunkMetadata {
                    file_hash: hash.clone(),
                    page_id: chunk.page_id,
                    char_start: chunk.char_start,
                    char_end: chunk.char_end,
                    path: path_text.clone(),
                    filename: filename.clone(),
                };
                Ok(Record {
                    id: chunk_id(&hash, chunk.sequence_index),
                    vector,
                    metadata: to_metadata(&metadata).map_err(crate::StoreError::from)?,
                    document: Some(chunk.text.clone()),
                })
            })
            .collect::<Result<Vec<_>, IngestError>>()?;

        let count = records.len();
        self.store.chunks.upsert(records).await?;
        info!(hash = %hash, chunks = count, "indexed paper");
        Ok(hash)
    }

    /// Adds every PDF under `root` with relocation and indexing enabled.
    /// Failures are logged per file and never stop the batch.
    pub async fn batch_add_documents(&self, root: &Path, topics: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        let files = discover_pdf_files(root);
        info!(root = %root.display(), files = files.len(), "organizing papers");

        let options = AddOptions {
            relocate: true,
            index: true,
        };
        for path in files {
            match self.add_document(&path, topics, options).await {
                Ok(DocumentOutcome::Processed(_)) => report.succeeded += 1,
                Ok(DocumentOutcome::EmptyText { .. }) => {
                    report.skip(path, "no text extracted");
                }
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "skipped paper");
                    report.skip(path, error.to_string());
                }
            }
        }

        report
    }
}

#[cfg(windows)]
const CROSS_DEVICE_ERROR: i32 = 17;
#[cfg(not(windows))]
const CROSS_DEVICE_ERROR: i32 = 18;

/// True for the OS error `rename` reports when source and destination live
/// on different filesystems.
fn crosses_devices(error: &std::io::Error) -> bool {
    error.raw_os_error() == Some(CROSS_DEVICE_ERROR)
}

async fn move_file(from: &Path, to: &Path) -> Result<(), IngestError> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(error) if crosses_devices(&error) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await?;
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionNames;
    use crate::encoders::CharacterNgramEmbedder;
    use crate::error::EmbedError;
    use crate::extractor::PageText;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Reads the "PDF" as plain text with pages separated by form feeds.
    /// Files not starting with `%PDF-ok` fail to parse.
    struct PlainTextExtractor;

    impl PdfExtractor for PlainTextExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
            let raw = fs::read_to_string(path)?;
            let body = raw
                .strip_prefix("%PDF-ok\n")
                .ok_or_else(|| IngestError::PdfParse("broken header".to_string()))?;
            Ok(body
                .split('\u{c}')
                .enumerate()
                .map(|(index, text)| PageText {
                    number: index as u32 + 1,
                    text: text.to_string(),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct CountingEncoder {
        inner: CharacterNgramEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextEncoder for CountingEncoder {
        fn dimensions(&self) -> usize {
            self.inner.dimensions
        }

        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_texts(texts).await
        }
    }

    /// Scores each text by keyword so topic similarity is fully controlled.
    struct KeywordEncoder;

    #[async_trait]
    impl TextEncoder for KeywordEncoder {
        fn dimensions(&self) -> usize {
            3
        }

        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let lowered = text.to_lowercase();
                    let mut vector = vec![
                        (lowered.matches("image").count() + lowered.matches("cv").count()) as f32,
                        (lowered.matches("language").count() + lowered.matches("nlp").count()) as f32,
                        (lowered.matches("reward").count() + lowered.matches("rl").count()) as f32,
                    ];
                    crate::embeddings::normalize(&mut vector);
                    vector
                })
                .collect())
        }
    }

    fn write_paper(path: &Path, pages: &[&str]) -> std::io::Result<()> {
        fs::write(path, format!("%PDF-ok\n{}", pages.join("\u{c}")))
    }

    fn ingestor(
        encoder: Arc<dyn TextEncoder>,
        store: VectorStore,
        papers_root: &Path,
    ) -> PaperIngestor {
        PaperIngestor::new(
            Arc::new(PlainTextExtractor),
            encoder,
            store,
            papers_root,
            ChunkingConfig::default(),
        )
    }

    fn topics(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|label| label.to_string()).collect()
    }

    #[test]
    fn ties_go_to_the_first_topic() {
        let document = vec![1.0, 0.0];
        let candidates = vec![vec![0.5, 0.5], vec![1.0, 0.0], vec![1.0, 0.0]];
        assert_eq!(best_topic_index(&document, &candidates), Some(1));
        assert_eq!(best_topic_index(&document, &[]), None);
    }

    #[test]
    fn topic_names_are_safe_directories() {
        assert_eq!(topic_directory_name("CV"), "CV");
        assert_eq!(topic_directory_name("a/b"), "a_b");
        assert_eq!(topic_directory_name(".."), UNCATEGORIZED);
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("a.pdf"), b"x")?;
        fs::write(nested.join("b.PDF"), b"x")?;
        fs::write(nested.join("notes.txt"), b"x")?;

        assert_eq!(discover_pdf_files(dir.path()).len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(CharacterNgramEmbedder::default()), store, dir.path());

        let result = ingestor
            .add_document(&dir.path().join("absent.pdf"), &[], AddOptions::default())
            .await;
        assert!(matches!(result, Err(IngestError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn classifies_as_most_similar_topic() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let paper = dir.path().join("paper.pdf");
        write_paper(&paper, &["Policy gradients maximize expected reward. Reward shaping helps."])?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(KeywordEncoder), store, dir.path());

        let outcome = ingestor
            .add_document(&paper, &topics(&["CV", "NLP", "RL"]), AddOptions { relocate: false, index: false })
            .await?;

        match outcome {
            DocumentOutcome::Processed(processed) => assert_eq!(processed.topic, "RL"),
            other => panic!("unexpected outcome {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn no_topics_means_uncategorized_without_embedding() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let paper = dir.path().join("paper.pdf");
        write_paper(&paper, &["Some text that is long enough to matter for the classifier."])?;
        let encoder = Arc::new(CountingEncoder::default());
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(encoder.clone(), store, dir.path());

        let outcome = ingestor
            .add_document(&paper, &[], AddOptions { relocate: true, index: false })
            .await?;

        match outcome {
            DocumentOutcome::Processed(processed) => {
                assert_eq!(processed.topic, UNCATEGORIZED);
                assert_eq!(processed.path, fs::canonicalize(&paper)?);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn empty_text_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let paper = dir.path().join("blank.pdf");
        write_paper(&paper, &["   ", "\n"])?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(CharacterNgramEmbedder::default()), store.clone(), dir.path());

        let outcome = ingestor
            .add_document(&paper, &topics(&["CV"]), AddOptions::default())
            .await?;

        assert!(matches!(outcome, DocumentOutcome::EmptyText { .. }));
        assert_eq!(store.counts().await?.files, 0);
        Ok(())
    }

    #[tokio::test]
    async fn indexing_writes_file_and_chunk_records() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let paper = dir.path().join("paper.pdf");
        let page_one = "a".repeat(1000);
        let page_two = "Second page about transformers and attention over long sequences.";
        write_paper(&paper, &[&page_one, page_two])?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(CharacterNgramEmbedder::default()), store.clone(), dir.path());

        let outcome = ingestor.add_document(&paper, &[], AddOptions::default()).await?;
        let DocumentOutcome::Processed(processed) = outcome else {
            panic!("paper should be processed");
        };

        let hash = processed.hash.clone().unwrap_or_default();
        assert_eq!(hash, document_hash(&format!("{page_one}\n{page_two}")));
        assert_eq!(processed.chunk_count, 3);

        let counts = store.counts().await?;
        assert_eq!((counts.files, counts.chunks), (1, 3));

        let query = CharacterNgramEmbedder::default().embed(page_two);
        let hits = store.chunks.query(&query, 1).await?;
        assert_eq!(hits[0].id, format!("{hash}_2"));
        assert_eq!(hits[0].document.as_deref(), Some(page_two));
        assert_eq!(hits[0].metadata_u64("page_id"), Some(2));
        assert!(hits[0].metadata.get("text").is_none());

        let files = store.files.query(&query, 5).await?;
        assert_eq!(files[0].id, hash);
        assert_eq!(files[0].metadata_str("topic"), Some(UNCATEGORIZED));
        assert_eq!(files[0].metadata_str("filename"), Some("paper.pdf"));
        Ok(())
    }

    #[tokio::test]
    async fn reingesting_keeps_the_same_id() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let paper = dir.path().join("paper.pdf");
        write_paper(&paper, &["Stable content for hashing, repeated twice over the same file."])?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(CharacterNgramEmbedder::default()), store.clone(), dir.path());

        let mut hashes = Vec::new();
        for _ in 0..2 {
            if let DocumentOutcome::Processed(processed) =
                ingestor.add_document(&paper, &[], AddOptions::default()).await?
            {
                hashes.push(processed.hash);
            }
        }

        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes[0], hashes[1]);
        assert_eq!(store.counts().await?.files, 1);
        Ok(())
    }

    #[tokio::test]
    async fn relocation_happens_before_indexing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let inbox = dir.path().join("inbox");
        let papers = dir.path().join("papers");
        fs::create_dir_all(&inbox)?;
        let paper = inbox.join("rl.pdf");
        write_paper(&paper, &["Reward reward reward. An agent acts to collect reward in episodes."])?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(KeywordEncoder), store.clone(), &papers);

        let outcome = ingestor
            .add_document(&paper, &topics(&["CV", "RL"]), AddOptions { relocate: true, index: true })
            .await?;
        let DocumentOutcome::Processed(processed) = outcome else {
            panic!("paper should be processed");
        };

        let expected = fs::canonicalize(papers.join("RL"))?.join("rl.pdf");
        assert_eq!(processed.path, expected);
        assert!(expected.is_file());
        assert!(!paper.exists());

        let files = store.files.query(&[0.0, 0.0, 1.0], 1).await?;
        assert_eq!(files[0].metadata_str("path"), Some(expected.to_string_lossy().as_ref()));

        // already in place: second run is a no-op move
        let again = ingestor
            .add_document(&expected, &topics(&["CV", "RL"]), AddOptions { relocate: true, index: false })
            .await?;
        assert!(matches!(again, DocumentOutcome::Processed(ref p) if p.path == expected));
        Ok(())
    }

    #[tokio::test]
    async fn batch_skips_corrupt_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("incoming");
        fs::create_dir_all(&root)?;
        write_paper(&root.join("good.pdf"), &["Images and convolutional filters for CV classification tasks."])?;
        fs::write(root.join("corrupt.pdf"), b"%PDF-1.4\n%broken")?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(KeywordEncoder), store.clone(), &dir.path().join("papers"));

        let report = ingestor.batch_add_documents(&root, &topics(&["CV", "NLP"])).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            report.skipped[0].path.file_name().and_then(|name| name.to_str()),
            Some("corrupt.pdf")
        );
        assert_eq!(store.counts().await?.files, 1);
        assert!(dir.path().join("papers").join("CV").join("good.pdf").is_file());
        Ok(())
    }

    #[tokio::test]
    async fn short_topic_labels_classify_with_ngram_encoder() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let paper = dir.path().join("agent.pdf");
        write_paper(&paper, &["RL RL RL reinforcement learning RL agent RL policy RL reward RL"])?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(CharacterNgramEmbedder::default()), store, dir.path());

        let outcome = ingestor
            .add_document(&paper, &topics(&["CV", "NLP", "RL"]), AddOptions { relocate: false, index: false })
            .await?;

        match outcome {
            DocumentOutcome::Processed(processed) => assert_eq!(processed.topic, "RL"),
            other => panic!("unexpected outcome {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_pdf_is_treated_as_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let paper = dir.path().join("scrambled.pdf");
        fs::write(&paper, b"%PDF-1.4\n%broken")?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(CharacterNgramEmbedder::default()), store.clone(), dir.path());

        let outcome = ingestor
            .add_document(&paper, &topics(&["CV"]), AddOptions { relocate: true, index: true })
            .await?;

        assert!(matches!(outcome, DocumentOutcome::EmptyText { .. }));
        assert!(paper.is_file());
        assert_eq!(store.counts().await?, crate::CollectionCounts::default());
        Ok(())
    }

    fn write_single_page_pdf(path: &Path, line: &str) -> Result<(), Box<dyn std::error::Error>> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path)?;
        Ok(())
    }

    #[tokio::test]
    async fn batch_extracts_real_pdf_and_skips_corrupt_one() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("incoming");
        fs::create_dir_all(&root)?;
        write_single_page_pdf(
            &root.join("good.pdf"),
            "Convolutional networks learn image features for visual recognition tasks.",
        )?;
        fs::write(root.join("bad.pdf"), b"%PDF-1.4\n%broken")?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = PaperIngestor::new(
            Arc::new(crate::extractor::LopdfExtractor),
            Arc::new(CharacterNgramEmbedder::default()),
            store.clone(),
            dir.path().join("papers"),
            ChunkingConfig::default(),
        );

        let report = ingestor.batch_add_documents(&root, &topics(&["CV", "NLP"])).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("bad.pdf"));
        let counts = store.counts().await?;
        assert_eq!((counts.files, counts.chunks), (1, 1));

        let hits = store.chunks.query(&CharacterNgramEmbedder::default().embed("image features"), 1).await?;
        assert!(hits[0].document.as_deref().unwrap_or_default().contains("Convolutional"));
        Ok(())
    }

    #[test]
    fn only_cross_device_errors_trigger_copy() {
        assert!(crosses_devices(&std::io::Error::from_raw_os_error(CROSS_DEVICE_ERROR)));
        assert!(!crosses_devices(&std::io::Error::from(ErrorKind::PermissionDenied)));
        assert!(!crosses_devices(&std::io::Error::from(ErrorKind::NotFound)));
    }

    #[tokio::test]
    async fn failed_rename_is_reported_and_source_kept() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let source = dir.path().join("paper.pdf");
        fs::write(&source, b"content")?;
        let occupied = dir.path().join("occupied");
        fs::create_dir_all(occupied.join("inner"))?;

        let result = move_file(&source, &occupied).await;

        assert!(matches!(result, Err(IngestError::Io(_))));
        assert!(source.is_file());
        assert!(occupied.join("inner").is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn batch_over_empty_folder_is_empty_report() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = VectorStore::temporary(&CollectionNames::default())?;
        let ingestor = ingestor(Arc::new(CharacterNgramEmbedder::default()), store, dir.path());

        let report = ingestor.batch_add_documents(dir.path(), &topics(&["CV"])).await;
        assert_eq!(report, BatchReport::default());
        Ok(())
    }
}
