use std::fs;
use std::path::Path;

use anyhow::Context;

pub const JSON_SUFFIX: &str =
    "Respond strictly with valid JSON only. Do not include explanatory text or markdown fences.";

pub const TEXT_LEAD: &str = "Here is the text content: ";
pub const DOCUMENT_LEAD: &str = "Here is the document content: ";
pub const AUDIO_LEAD: &str = "Analyze this audio file.";

pub fn default_study_instruction() -> &'static str {
    include_str!("../templates/study-instruction.txt")
}

/// Reads an instruction override, falling back to the bundled study prompt.
pub fn load_study_instruction(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading system instruction {}", path.display()))?;
            if text.trim().is_empty() {
                anyhow::bail!("system instruction {} is empty", path.display());
            }
            Ok(text)
        }
        None => Ok(default_study_instruction().to_string()),
    }
}

/// Free-form prompt with the strict-JSON suffix appended.
pub fn json_prompt(prompt: &str) -> String {
    format!("{prompt} \n\n{JSON_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bundled_instruction_describes_the_artifact() {
        let text = default_study_instruction();
        assert!(text.contains("\"mcqs\""));
        assert!(text.contains("Return ONLY valid JSON"));
    }

    #[test]
    fn override_file_replaces_bundled_instruction() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Summarize for a ten year old.").unwrap();
        let text = load_study_instruction(Some(file.path())).unwrap();
        assert_eq!(text.trim(), "Summarize for a ten year old.");
    }

    #[test]
    fn empty_override_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(load_study_instruction(Some(file.path())).is_err());
    }

    #[test]
    fn json_prompt_ends_with_suffix() {
        assert!(json_prompt("List three facts").ends_with(JSON_SUFFIX));
    }
}
