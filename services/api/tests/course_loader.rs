//! Integration tests for reading the course content directory.

use api_lib::adapters::course_loader::{load_directory, load_document};
use api_lib::adapters::FsCourseLoader;
use std::fs;
use std::io::Write;
use std::path::Path;
use tutor_core::ports::CorpusSource;

fn write_docx(path: &Path, paragraphs: &[&str]) {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

#[test]
fn missing_directory_is_created_and_empty() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("course_content");
    assert!(load_directory(&root).is_empty());
    assert!(root.is_dir());
}

#[test]
fn mixed_formats_load_and_bad_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir(root.join("week1")).unwrap();
    fs::write(root.join("syllabus.txt"), "The deadline is Friday").unwrap();
    fs::write(root.join("week1/notes.md"), "# Week 1\nOwnership and borrowing.").unwrap();
    fs::write(
        root.join("week1/page.html"),
        "<html><body><h1>Catalysts</h1><p>Catalysts lower activation energy.</p></body></html>",
    )
    .unwrap();
    write_docx(&root.join("week1/reading.docx"), &["Photosynthesis", "Light becomes sugar."]);
    fs::write(root.join("broken.pdf"), "not really a pdf").unwrap();
    fs::write(root.join("image.bin"), [0x89u8, b'P', b'N', b'G', 0, 0, 0, 13]).unwrap();
    fs::write(root.join(".DS_Store"), "hidden").unwrap();

    let documents = load_directory(root);
    let mut names: Vec<String> = documents
        .iter()
        .map(|d| d.source.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["notes.md", "page.html", "reading.docx", "syllabus.txt"]);

    let docx = documents
        .iter()
        .find(|d| d.source.ends_with("reading.docx"))
        .unwrap();
    assert_eq!(docx.text, "Photosynthesis\nLight becomes sugar.");

    let html = documents.iter().find(|d| d.source.ends_with("page.html")).unwrap();
    assert!(html.text.contains("Catalysts lower activation energy."));
    assert!(!html.text.contains("<p>"));
}

#[test]
fn unreadable_files_yield_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let bad_text = dir.path().join("latin1.txt");
    fs::write(&bad_text, [0x63u8, 0x61, 0x66, 0xe9]).unwrap();
    assert!(load_document(&bad_text).is_empty());
    assert!(load_document(&dir.path().join("absent.txt")).is_empty());
}

#[tokio::test]
async fn corpus_source_reads_the_configured_root() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    let loader = FsCourseLoader::new(dir.path().to_path_buf());
    let documents = loader.load_all().await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].text, "alpha");
    assert_eq!(documents[0].page, None);
}
