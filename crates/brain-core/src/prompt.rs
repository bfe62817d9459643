//! Prompt helpers for templating, hashing and tracking prompt versions.

use sha2::{Digest, Sha256};

/// Compute a stable SHA-256 fingerprint for a prompt string.
pub fn hash_prompt(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// A prompt with `{name}` placeholders.
///
/// Unknown placeholders are left untouched so literal braces in prompt text
/// (JSON examples and the like) survive rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Wrap raw template text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The raw template text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Fingerprint of the raw template text.
    pub fn fingerprint(&self) -> String {
        hash_prompt(&self.text)
    }

    /// Whether the template mentions `{name}`.
    pub fn has_placeholder(&self, name: &str) -> bool {
        self.text.contains(&format!("{{{}}}", name))
    }

    /// Substitute every `{name}` with its value.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut rendered = self.text.clone();
        for (name, value) in values {
            rendered = rendered.replace(&format!("{{{}}}", name), value);
        }
        rendered
    }
}

impl From<&str> for PromptTemplate {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for PromptTemplate {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
