//! Uniform readline over any line source

use std::io;
use std::sync::Arc;

use rr_core::LineSource;
use rr_protocol::ReadlineCapability;

/// Wraps a line source so callers can always pass a prompt.
///
/// The capability is resolved when the proxy is built and never re-checked.
/// A source that cannot read lines at all is treated as prompt-blind.
#[derive(Clone)]
pub struct InputProxy {
    source: Arc<dyn LineSource>,
    capability: ReadlineCapability,
}

impl InputProxy {
    pub fn new(source: Arc<dyn LineSource>) -> Self {
        let capability = ReadlineCapability::resolve(source.readline_capability());
        Self { source, capability }
    }

    pub fn capability(&self) -> ReadlineCapability {
        self.capability
    }

    /// Read one line; the prompt is dropped for prompt-blind sources
    pub async fn readline(&self, prompt: &str) -> io::Result<Option<String>> {
        let prompt = self.capability.takes_prompt().then_some(prompt);
        self.source.read_line(prompt).await
    }

    /// Install completion candidates if the source supports them
    pub async fn set_completion(&self, candidates: Vec<String>) -> io::Result<()> {
        if !self.source.supports_completion() {
            return Ok(());
        }
        self.source.set_completion(candidates).await
    }

    /// Installed completion candidates, `None` if unsupported
    pub async fn completion(&self) -> io::Result<Option<Vec<String>>> {
        if !self.source.supports_completion() {
            return Ok(None);
        }
        self.source.completion().await
    }
}

impl std::fmt::Debug for InputProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputProxy")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the prompt each call received
    struct Recording {
        capability: Option<ReadlineCapability>,
        prompts: Mutex<Vec<Option<String>>>,
        completion: Option<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn new(capability: Option<ReadlineCapability>) -> Arc<Self> {
            Arc::new(Self {
                capability,
                prompts: Mutex::new(Vec::new()),
                completion: None,
            })
        }

        fn with_completion() -> Arc<Self> {
            Arc::new(Self {
                capability: Some(ReadlineCapability::PromptAware),
                prompts: Mutex::new(Vec::new()),
                completion: Some(Mutex::new(Vec::new())),
            })
        }
    }

    #[async_trait]
    impl LineSource for Recording {
        fn readline_capability(&self) -> Option<ReadlineCapability> {
            self.capability
        }

        async fn read_line(&self, prompt: Option<&str>) -> io::Result<Option<String>> {
            self.prompts.lock().unwrap().push(prompt.map(String::from));
            Ok(Some("line".into()))
        }

        fn supports_completion(&self) -> bool {
            self.completion.is_some()
        }

        async fn set_completion(&self, candidates: Vec<String>) -> io::Result<()> {
            if let Some(slot) = &self.completion {
                *slot.lock().unwrap() = candidates;
            }
            Ok(())
        }

        async fn completion(&self) -> io::Result<Option<Vec<String>>> {
            Ok(self.completion.as_ref().map(|c| c.lock().unwrap().clone()))
        }
    }

    #[tokio::test]
    async fn test_prompt_aware_receives_prompt() {
        let source = Recording::new(Some(ReadlineCapability::PromptAware));
        let proxy = InputProxy::new(source.clone());

        assert_eq!(proxy.capability(), ReadlineCapability::PromptAware);
        let line = proxy.readline(">> ").await.unwrap();
        assert_eq!(line.as_deref(), Some("line"));
        assert_eq!(*source.prompts.lock().unwrap(), vec![Some(">> ".to_string())]);
    }

    #[tokio::test]
    async fn test_prompt_blind_drops_prompt() {
        let source = Recording::new(Some(ReadlineCapability::PromptBlind));
        let proxy = InputProxy::new(source.clone());

        proxy.readline(">> ").await.unwrap();
        assert_eq!(*source.prompts.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_missing_readline_resolves_prompt_blind() {
        let source = Recording::new(None);
        let proxy = InputProxy::new(source.clone());

        assert_eq!(proxy.capability(), ReadlineCapability::PromptBlind);
        proxy.readline(">> ").await.unwrap();
        assert_eq!(*source.prompts.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_completion_is_noop_when_unsupported() {
        let source = Recording::new(Some(ReadlineCapability::PromptAware));
        let proxy = InputProxy::new(source);

        proxy.set_completion(vec!["foo".into()]).await.unwrap();
        assert_eq!(proxy.completion().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_completion_forwarded_when_supported() {
        let source = Recording::with_completion();
        let proxy = InputProxy::new(source);

        proxy
            .set_completion(vec!["foo".into(), "bar".into()])
            .await
            .unwrap();
        assert_eq!(
            proxy.completion().await.unwrap(),
            Some(vec!["foo".to_string(), "bar".to_string()])
        );
    }
}
