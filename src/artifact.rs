//! Typed view of the study artifact the default instruction asks for.
//!
//! The pipeline itself only guarantees well-formed JSON; this layer checks
//! the shape on behalf of callers that want it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mcq {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudyArtifact {
    pub summary: String,
    #[serde(default)]
    pub mcqs: Vec<Mcq>,
    #[serde(default)]
    pub content: String,
}

impl StudyArtifact {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Human-readable shape problems; empty when the artifact looks usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.summary.trim().is_empty() {
            problems.push("summary is empty".to_string());
        }
        if self.mcqs.is_empty() {
            problems.push("no multiple-choice questions".to_string());
        }
        for (idx, mcq) in self.mcqs.iter().enumerate() {
            let n = idx + 1;
            if mcq.question.trim().is_empty() {
                problems.push(format!("question {n} has no text"));
            }
            if mcq.options.len() < 2 {
                problems.push(format!("question {n} has fewer than two options"));
            }
            if !mcq.options.iter().any(|opt| opt.trim() == mcq.answer.trim()) {
                problems.push(format!("question {n} answer is not one of its options"));
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_artifact_has_no_problems() {
        let value = json!({
            "summary": "Cells make energy.",
            "mcqs": [{
                "question": "Choose {A} or {B}?",
                "options": ["{A}", "{B}"],
                "answer": "{A}"
            }],
            "content": "Mitochondria..."
        });
        let artifact = StudyArtifact::from_value(&value).unwrap();
        assert!(artifact.problems().is_empty());
        assert_eq!(artifact.mcqs[0].answer, "{A}");
    }

    #[test]
    fn reports_answer_outside_options() {
        let value = json!({
            "summary": "",
            "mcqs": [{ "question": "Q", "options": ["only"], "answer": "other" }]
        });
        let problems = StudyArtifact::from_value(&value).unwrap().problems();
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("not one of its options")));
    }

    #[test]
    fn missing_summary_fails_to_deserialize() {
        assert!(StudyArtifact::from_value(&json!({ "mcqs": [] })).is_err());
    }
}
