use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

use scholar_core::chunking::SectionChunker;
use scholar_core::config::{Config, Settings};
use scholar_embed::embedder_from_settings;
use scholar_hybrid::{Ingestor, PaperRecord};
use scholar_text::TantivyIndex;
use scholar_vector::LanceStore;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Directory holding paper records, one JSON object per file.
    pub dir: PathBuf,

    /// Drop the existing lexical index before ingesting.
    #[arg(long)]
    pub fresh: bool,

    /// Stop after this many papers.
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn paper_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

pub fn read_paper(path: &Path) -> Result<PaperRecord> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub async fn run(args: IngestArgs, config: &Config, settings: &Settings) -> Result<()> {
    let tantivy_dir = config.resolve_path(&settings.data.tantivy_index_dir);
    let lancedb_dir = config.resolve_path(&settings.data.lancedb_dir);
    std::fs::create_dir_all(&lancedb_dir)?;

    let text = if args.fresh { TantivyIndex::create(&tantivy_dir)? } else { TantivyIndex::open_or_create(&tantivy_dir)? };
    let store = LanceStore::open(
        &lancedb_dir.to_string_lossy(),
        &settings.data.papers_table,
        &settings.data.chunks_table,
        settings.embedding.dimension,
    )
    .await?;
    let embedder = embedder_from_settings(&settings.embedding)?;
    let ingestor = Ingestor::new(Arc::new(store), Arc::new(text), embedder, SectionChunker::default());

    let mut files = paper_files(&args.dir);
    if let Some(limit) = args.limit { files.truncate(limit); }
    info!(dir = %args.dir.display(), files = files.len(), "ingesting papers");

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} papers ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let (mut papers, mut chunks, mut failed) = (0usize, 0usize, 0usize);
    for path in &files {
        let outcome = match read_paper(path) {
            Ok(paper) => ingestor.ingest(&paper).await.map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(report) => {
                papers += 1;
                chunks += report.chunks;
                pb.set_message(report.document_id);
            }
            Err(e) => {
                failed += 1;
                warn!(file = %path.display(), error = %e, "skipping paper");
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    println!("Ingested {papers} papers ({chunks} chunks), {failed} failed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_json_records_recursively_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("2024/05")).unwrap();
        std::fs::write(tmp.path().join("2024/05/b.json"), r#"{"document_id": "b", "title": "B"}"#).unwrap();
        std::fs::write(tmp.path().join("a.json"), r#"{"document_id": "a", "title": "A", "full_text": "INTRO\nhello"}"#).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let files = paper_files(tmp.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2024/05/b.json"));
        let paper = read_paper(&files[1]).unwrap();
        assert_eq!(paper.document.document_id, "a");
        assert_eq!(paper.full_text.as_deref(), Some("INTRO\nhello"));
    }

    #[test]
    fn malformed_record_reports_its_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_paper(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));
    }
}
