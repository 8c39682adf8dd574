use mime::Mime;

use crate::constants::DOCX_MIME;
use crate::core::{ContentSource, Part};
use crate::error::PipelineError;
use crate::prompts::{AUDIO_LEAD, DOCUMENT_LEAD, JSON_SUFFIX, TEXT_LEAD};

/// Builds the ordered part list for one request: system instruction, content,
/// then the optional strict-JSON suffix.
#[derive(Debug, Clone)]
pub struct ContentAssembler {
    system_instruction: String,
    strict_json_suffix: bool,
}

impl ContentAssembler {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            strict_json_suffix: false,
        }
    }

    pub fn with_json_suffix(mut self, enabled: bool) -> Self {
        self.strict_json_suffix = enabled;
        self
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Pure: rejects unusable input without touching the network.
    pub fn assemble(&self, source: &ContentSource) -> Result<Vec<Part>, PipelineError> {
        let mut parts = vec![Part::text(self.system_instruction.as_str())];
        match source {
            ContentSource::Text(text) => parts.push(text_part(TEXT_LEAD, text)?),
            ContentSource::Document { text, .. } => parts.push(text_part(DOCUMENT_LEAD, text)?),
            ContentSource::Binary { data, mime_type } => {
                let mime: Mime = mime_type.parse().map_err(|_| {
                    PipelineError::UnsupportedInput(format!("unrecognized mime type '{mime_type}'"))
                })?;
                if mime.type_() == mime::AUDIO {
                    parts.push(Part::text(AUDIO_LEAD));
                    parts.push(Part::Binary {
                        data: data.clone(),
                        mime_type: mime.essence_str().to_string(),
                    });
                } else if mime.type_() == mime::TEXT {
                    let text = std::str::from_utf8(data).map_err(|_| {
                        PipelineError::UnsupportedInput(format!("{mime_type} payload is not valid UTF-8"))
                    })?;
                    parts.push(text_part(TEXT_LEAD, text)?);
                } else if mime.essence_str() == mime::APPLICATION_PDF.essence_str()
                    || mime.essence_str() == DOCX_MIME
                {
                    return Err(PipelineError::UnsupportedInput(format!(
                        "{} bytes must be converted to text before submission",
                        mime.essence_str()
                    )));
                } else {
                    return Err(PipelineError::UnsupportedInput(format!(
                        "Unsupported file type {}; expected PDF, DOCX, audio or text",
                        mime.essence_str()
                    )));
                }
            }
        }
        if self.strict_json_suffix {
            parts.push(Part::text(JSON_SUFFIX));
        }
        Ok(parts)
    }
}

fn text_part(lead: &str, text: &str) -> Result<Part, PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::UnsupportedInput("No input provided".into()));
    }
    Ok(Part::Text(format!("{lead}{text}")))
}
