//! Ordered error collection for parsing and validation.

/// Append-only list of diagnostic messages. Insertion order is preserved so
/// callers see violations in schema-traversal order.
#[derive(Debug, Default)]
pub struct Errors {
    messages: Vec<String>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Concatenate another collector's messages onto this one.
    pub fn append(&mut self, other: Errors) {
        self.messages.extend(other.messages);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

/// Outcome of one validation run.
#[derive(Debug)]
pub struct ValidationResult {
    pub success: bool,
    pub errors: Vec<String>,
}
