use std::collections::HashMap;

/// One-shot messages keyed by kind, consumed by the next page render.
pub trait Flash: Send + Sync {
    fn push(&mut self, kind: &str, message: &str);
    fn take(&mut self, kind: &str) -> Vec<String>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlashMessages {
    messages: HashMap<String, Vec<String>>,
}

impl FlashMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.values().all(Vec::is_empty)
    }
}

impl Flash for FlashMessages {
    fn push(&mut self, kind: &str, message: &str) {
        self.messages
            .entry(kind.to_string())
            .or_default()
            .push(message.to_string());
    }

    fn take(&mut self, kind: &str) -> Vec<String> {
        self.messages.remove(kind).unwrap_or_default()
    }
}
