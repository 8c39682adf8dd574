use serde_json::Value;
use tracing::info;

use crate::assemble::ContentAssembler;
use crate::core::{ContentSource, ModelClient, ModelInput};
use crate::error::PipelineError;
use crate::invoker::{parse_model_json, ModelInvoker, RequestScope};

/// Source in, parsed study JSON out: assemble, invoke, normalize.
pub struct StudyEngine<C: ModelClient> {
    pub assembler: ContentAssembler,
    pub invoker: ModelInvoker<C>,
}

impl<C: ModelClient> StudyEngine<C> {
    pub fn new(assembler: ContentAssembler, invoker: ModelInvoker<C>) -> Self {
        Self { assembler, invoker }
    }

    pub async fn run(&self, source: &ContentSource, scope: &RequestScope) -> Result<Value, PipelineError> {
        let parts = self.assembler.assemble(source)?;
        info!("submitting {} part(s) to {}", parts.len(), self.invoker.client().generation_model());
        let text = self.invoker.generate(ModelInput::Parts(parts), scope).await?;
        parse_model_json(&text, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Part;
    use crate::error::ErrorKind;
    use crate::providers::scripted::ScriptedClient;
    use crate::retry::RetryPolicy;
    use bytes::Bytes;
    use std::sync::Arc;

    fn engine(client: ScriptedClient) -> StudyEngine<ScriptedClient> {
        StudyEngine::new(
            ContentAssembler::new("SYSTEM"),
            ModelInvoker::new(Arc::new(client), RetryPolicy::new(3, 0), RetryPolicy::new(3, 0)),
        )
    }

    #[tokio::test]
    async fn unsupported_mime_never_reaches_the_client() {
        let engine = engine(ScriptedClient::new().generation(Ok("{}")));
        let source = ContentSource::Binary {
            data: Bytes::from_static(b"\x89PNG"),
            mime_type: "image/png".into(),
        };
        let err = engine.run(&source, &RequestScope::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedInput);
        assert_eq!(engine.invoker.client().calls(), 0);
    }

    #[tokio::test]
    async fn fenced_reply_becomes_study_json() {
        let reply = "Here's your result: ```json\n{\"summary\":\"x\",\"mcqs\":[{\"question\":\"Choose {A} or {B}?\",\"options\":[\"{A}\",\"{B}\"],\"answer\":\"{A}\"}],\"content\":\"y\"}\n``` Hope that helps!";
        let engine = engine(
            ScriptedClient::new()
                .generation(Err("RESOURCE_EXHAUSTED: quota"))
                .generation(Ok(reply)),
        );
        let value = engine
            .run(&ContentSource::Text("cells".into()), &RequestScope::new())
            .await
            .unwrap();
        assert_eq!(value["summary"], "x");
        assert_eq!(value["mcqs"][0]["options"][1], "{B}");

        let seen = engine.invoker.client().seen_inputs();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0],
            ModelInput::Parts(vec![
                Part::text("SYSTEM"),
                Part::text("Here is the text content: cells"),
            ])
        );
    }

    #[tokio::test]
    async fn garbage_reply_keeps_raw_text() {
        let engine = engine(ScriptedClient::new().generation(Ok("Sorry, I can't do that.")));
        let err = engine
            .run(&ContentSource::Text("cells".into()), &RequestScope::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
        assert_eq!(err.raw(), Some("Sorry, I can't do that."));
    }
}
