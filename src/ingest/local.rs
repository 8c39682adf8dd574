use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;

use super::extract::{docx_to_text, pdf_to_text};
use crate::constants::DOCX_MIME;
use crate::core::{ContentSource, DocumentFormat, Ingestor};

/// Reads a local file into a [`ContentSource`]. PDF and DOCX are converted to
/// text; everything else travels as bytes and is judged by the assembler.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalIngestor;

impl LocalIngestor {
    pub fn detect_mime(path: &Path, mime_override: Option<&str>) -> String {
        mime_override
            .map(|s| s.to_string())
            .or_else(|| mime_guess::from_path(path).first_raw().map(|s| s.to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

impl Ingestor for LocalIngestor {
    fn load(&self, path: &Path, mime_override: Option<&str>) -> Result<ContentSource> {
        if !path.is_file() {
            anyhow::bail!("{} is not a file", path.display());
        }
        let mime_type = Self::detect_mime(path, mime_override);
        let source = match mime_type.as_str() {
            "application/pdf" => ContentSource::Document {
                format: DocumentFormat::Pdf,
                text: pdf_to_text(path)?,
            },
            DOCX_MIME => ContentSource::Document {
                format: DocumentFormat::Docx,
                text: docx_to_text(path)?,
            },
            _ => {
                let data =
                    fs::read(path).with_context(|| format!("reading {}", path.display()))?;
                ContentSource::Binary {
                    data: Bytes::from(data),
                    mime_type,
                }
            }
        };
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn guesses_mime_from_extension() {
        assert_eq!(LocalIngestor::detect_mime(Path::new("talk.mp3"), None), "audio/mpeg");
        assert_eq!(LocalIngestor::detect_mime(Path::new("notes.txt"), None), "text/plain");
        assert_eq!(
            LocalIngestor::detect_mime(Path::new("notes.txt"), Some("audio/wav")),
            "audio/wav"
        );
        assert_eq!(
            LocalIngestor::detect_mime(Path::new("blob"), None),
            "application/octet-stream"
        );
    }

    #[test]
    fn text_files_load_as_bytes_with_mime() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "The water cycle").unwrap();
        let source = LocalIngestor.load(file.path(), None).unwrap();
        assert_eq!(
            source,
            ContentSource::Binary {
                data: Bytes::from_static(b"The water cycle"),
                mime_type: "text/plain".into(),
            }
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(LocalIngestor
            .load(Path::new("/definitely/not/here.txt"), None)
            .is_err());
    }
}
