//! Deterministic mock generator for tests

use crate::generate::{GenerationError, TextGenerator};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

enum Scripted {
    Text(String),
    Failure(String),
}

/// Queue-based mock: responses are consumed in FIFO order; an exhausted
/// queue echoes the prompt back, which keeps pipeline tests deterministic
/// without scripting every call.
#[derive(Default)]
pub struct MockGenerator {
    queue: Mutex<VecDeque<Scripted>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a scripted response.
    pub fn enqueue(&self, response: impl Into<String>) {
        self.queue
            .lock()
            .expect("mock queue lock")
            .push_back(Scripted::Text(response.into()));
    }

    /// Enqueue a scripted failure.
    pub fn enqueue_failure(&self, message: impl Into<String>) {
        self.queue
            .lock()
            .expect("mock queue lock")
            .push_back(Scripted::Failure(message.into()));
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _system: Option<&str>,
    ) -> Result<String, GenerationError> {
        let next = self.queue.lock().expect("mock queue lock").pop_front();

        match next {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Failure(message)) => Err(GenerationError::Backend(message)),
            None => Ok(prompt.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let mock = MockGenerator::new();
        mock.enqueue("first");
        mock.enqueue_failure("down");

        assert_eq!(mock.generate("p", None).await.unwrap(), "first");
        assert!(mock.generate("p", None).await.is_err());
        // Exhausted queue echoes the prompt
        assert_eq!(mock.generate("p", None).await.unwrap(), "p");
    }
}
