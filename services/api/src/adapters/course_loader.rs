//! services/api/src/adapters/course_loader.rs
//!
//! Reads the course content directory into `RawDocument`s. The format is
//! chosen by file extension; anything unrecognised goes through a best-effort
//! text extractor. A file that cannot be read is logged and skipped so one bad
//! file never sinks the whole batch.

use async_trait::async_trait;
use regex::Regex;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tutor_core::domain::RawDocument;
use tutor_core::ports::{CorpusSource, PortError, PortResult};
use walkdir::WalkDir;

/// Bytes inspected when deciding whether an unknown file is binary.
const SNIFF_LEN: usize = 8 * 1024;
const HTML_WIDTH: usize = 100;

/// Why a single file could not be turned into documents.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("File is not valid UTF-8 text")]
    Encoding,
    #[error("File looks binary")]
    Binary,
}

/// Loads every file under `root`. Creates `root` if it does not exist yet.
pub fn load_directory(root: &Path) -> Vec<RawDocument> {
    if !root.exists() {
        match fs::create_dir_all(root) {
            Ok(()) => info!("Created content directory {}", root.display()),
            Err(e) => error!("Could not create content directory {}: {}", root.display(), e),
        }
        return Vec::new();
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden {
            debug!("Skipping hidden file {}", entry.path().display());
            continue;
        }
        documents.extend(load_document(entry.path()));
    }
    info!("Loaded {} documents from {}", documents.len(), root.display());
    documents
}

/// Loads one file. Failures are logged and yield no documents.
pub fn load_document(path: &Path) -> Vec<RawDocument> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let result = match extension.as_str() {
        "pdf" => read_pdf(path),
        "docx" => read_docx(path),
        "txt" => read_text(path),
        _ => read_fallback(path, &extension),
    };

    match result {
        Ok(documents) => {
            info!("Loaded {} ({} documents)", path.display(), documents.len());
            documents
        }
        Err(e) => {
            error!("Failed to load {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn single(path: &Path, text: String) -> Vec<RawDocument> {
    vec![RawDocument {
        text,
        source: path.to_path_buf(),
        page: None,
    }]
}

/// One document per page, numbered from 1. Blank pages are dropped.
fn read_pdf(path: &Path) -> Result<Vec<RawDocument>, LoadError> {
    // pdf-extract panics on some malformed files instead of returning an error.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path))
        .map_err(|_| LoadError::Pdf("extractor panicked".to_string()))?
        .map_err(|e| LoadError::Pdf(e.to_string()))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(idx, text)| RawDocument {
            text,
            source: path.to_path_buf(),
            page: Some(idx as u32 + 1),
        })
        .collect())
}

fn read_docx(path: &Path) -> Result<Vec<RawDocument>, LoadError> {
    let bytes = fs::read(path)?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| LoadError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| LoadError::Docx(e.to_string()))?
        .read_to_string(&mut xml)?;
    Ok(single(path, docx_xml_to_text(&xml)?))
}

/// Flattens WordprocessingML into plain text, one paragraph per line.
pub fn docx_xml_to_text(xml: &str) -> Result<String, LoadError> {
    let tags = Regex::new(r"<[^>]+>").map_err(|e| LoadError::Docx(e.to_string()))?;
    let marked = xml
        .replace("</w:p>", "\n")
        .replace("<w:tab/>", "\t")
        .replace("<w:br/>", "\n");
    let stripped = tags.replace_all(&marked, "");
    let text = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    Ok(text.trim().to_string())
}

fn read_text(path: &Path) -> Result<Vec<RawDocument>, LoadError> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|_| LoadError::Encoding)?;
    Ok(single(path, text))
}

/// HTML is rendered to text; everything else is decoded leniently unless it
/// looks like binary data.
fn read_fallback(path: &Path, extension: &str) -> Result<Vec<RawDocument>, LoadError> {
    let bytes = fs::read(path)?;
    if looks_binary(&bytes) {
        return Err(LoadError::Binary);
    }
    let text = if matches!(extension, "html" | "htm") || looks_like_html(&bytes) {
        html2text::from_read(bytes.as_slice(), HTML_WIDTH)
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };
    if text.trim().is_empty() {
        warn!("{} contained no text", path.display());
        return Ok(Vec::new());
    }
    Ok(single(path, text))
}

fn looks_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.contains(&0) {
        return true;
    }
    let decoded = String::from_utf8_lossy(head);
    let replaced = decoded.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
    // A cut at SNIFF_LEN may split one multi-byte character.
    replaced > 1 && replaced * 10 > decoded.chars().count()
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(SNIFF_LEN)]).to_lowercase();
    let head = head.trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

//=========================================================================================
// `CorpusSource` Trait Implementation
//=========================================================================================

/// The course content directory as a `CorpusSource`.
#[derive(Clone)]
pub struct FsCourseLoader {
    root: PathBuf,
}

impl FsCourseLoader {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl CorpusSource for FsCourseLoader {
    async fn load_all(&self) -> PortResult<Vec<RawDocument>> {
        let root = self.root.clone();
        // PDF and DOCX extraction are synchronous and CPU-bound.
        tokio::task::spawn_blocking(move || load_directory(&root))
            .await
            .map_err(|e| PortError::Unexpected(format!("course loader task failed: {}", e)))
    }
}
