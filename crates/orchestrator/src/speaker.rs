//! Speaker selection: asks a utility model who should talk next.
//!
//! The selection prompt is loaded from (in order):
//! 1. `SPEAKER_SELECTOR_PROMPT` env var
//! 2. The file named by `SPEAKER_SELECTOR_PROMPT_FILE` (default `SPEAKER_SELECTOR_PROMPT.md`)
//! 3. The embedded default below

use std::env;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use brain_core::{BrainError, CapabilityClass, ModelBackend, PromptTemplate};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::OrchestratorError;
use crate::history::selection_line;
use crate::pool::ModelPool;
use crate::retry::{RetryError, RetryPolicy};
use crate::transcript::Message;

/// Default selection prompt file, relative to the working directory.
pub const DEFAULT_SELECTION_PROMPT_FILE: &str = "SPEAKER_SELECTOR_PROMPT.md";

/// Embedded selection prompt. `{context}` and `{character_names}` are filled
/// in per call.
pub const DEFAULT_SELECTION_PROMPT: &str = r#"You direct an interactive story with several characters and a narrator.

Read the conversation and decide who should speak next, in order.

Conversation:
{context}

Characters you may choose from:
{character_names}

Rules:
- Pick one to three speakers who would naturally react to the user's latest line.
- Pick the narrator when the scene needs description or the story needs to move on.
- Only use names from the list, spelled exactly as given.
- The same name may appear more than once if that character speaks twice.

Reply with the names in square brackets and nothing else, for example:
[Name1, Name2]"#;

static SPEAKER_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]").expect("valid speaker list regex"));

/// Load the selection prompt.
///
/// Priority:
/// 1. `SPEAKER_SELECTOR_PROMPT` env var (if set)
/// 2. Contents of prompt file (`SPEAKER_SELECTOR_PROMPT_FILE` or default `SPEAKER_SELECTOR_PROMPT.md`)
/// 3. Embedded default prompt
pub fn load_selection_prompt() -> String {
    if let Ok(prompt) = env::var("SPEAKER_SELECTOR_PROMPT") {
        info!("Using selection prompt from SPEAKER_SELECTOR_PROMPT env var");
        return prompt;
    }

    let prompt_file = env::var("SPEAKER_SELECTOR_PROMPT_FILE")
        .unwrap_or_else(|_| DEFAULT_SELECTION_PROMPT_FILE.to_string());

    if let Some(prompt) = load_prompt_file(&prompt_file) {
        info!("Loaded selection prompt from {}", prompt_file);
        return prompt;
    }

    info!("Using embedded default selection prompt");
    DEFAULT_SELECTION_PROMPT.to_string()
}

fn load_prompt_file(path: impl AsRef<Path>) -> Option<String> {
    let content = std::fs::read_to_string(path.as_ref()).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extract the speaker list from a selection reply.
///
/// Takes the first `[...]` on a single line, splits on commas and trims
/// whitespace and quotes. Every name must be a candidate.
pub fn parse_selection(
    response: &str,
    candidates: &[String],
) -> Result<Vec<String>, OrchestratorError> {
    let response = response.trim();
    let inner = SPEAKER_LIST
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| OrchestratorError::SelectionParse(truncate(response)))?;

    let names: Vec<String> = inner
        .split(',')
        .map(|name| name.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
        .collect();

    if let Some(invalid) = names.iter().find(|name| !candidates.contains(name)) {
        return Err(OrchestratorError::InvalidCandidate(invalid.clone()));
    }

    Ok(names)
}

fn truncate(text: &str) -> String {
    const MAX_CHARS: usize = 200;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{}...", head)
    }
}

/// Render `[A, B, C]`.
fn format_names(candidates: &[String]) -> String {
    format!("[{}]", candidates.join(", "))
}

/// Chooses the ordered speakers for a turn.
pub struct SpeakerSelector {
    pool: ModelPool,
    backend: Arc<dyn ModelBackend>,
    retry: RetryPolicy,
    call_timeout: Duration,
    template: PromptTemplate,
    fallback: String,
}

impl SpeakerSelector {
    pub fn new(
        pool: ModelPool,
        backend: Arc<dyn ModelBackend>,
        template: PromptTemplate,
        retry: RetryPolicy,
        call_timeout: Duration,
        fallback: impl Into<String>,
    ) -> Self {
        info!(
            prompt_hash = %template.fingerprint(),
            has_context = template.has_placeholder("context"),
            has_names = template.has_placeholder("character_names"),
            "Speaker selection prompt ready"
        );
        Self {
            pool,
            backend,
            retry,
            call_timeout,
            template,
            fallback: fallback.into(),
        }
    }

    /// The configured fallback name.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// The speaker used when selection keeps failing, always one of
    /// `candidates`: the configured name if present, else `narrator`, else
    /// the first candidate.
    pub fn resolve_fallback(&self, candidates: &[String], narrator: Option<&str>) -> String {
        if candidates.iter().any(|c| *c == self.fallback) {
            return self.fallback.clone();
        }
        narrator
            .filter(|name| candidates.iter().any(|c| c.as_str() == *name))
            .map(str::to_string)
            .or_else(|| candidates.first().cloned())
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Build the rendered selection prompt.
    pub fn render_prompt(&self, history: &[Message], latest: &str, candidates: &[String]) -> String {
        let mut context: Vec<String> = history.iter().map(selection_line).collect();
        context.push(format!("User: {}", latest));

        self.template.render(&[
            ("context", &context.join("\n")),
            ("character_names", &format_names(candidates)),
        ])
    }

    /// Decide who speaks next. Never fails: after the attempt budget is spent
    /// the result is the resolved fallback speaker alone (see
    /// [`resolve_fallback`](Self::resolve_fallback)).
    pub async fn select_next_speakers(
        &self,
        history: &[Message],
        latest: &str,
        candidates: &[String],
        narrator: Option<&str>,
    ) -> Vec<String> {
        let prompt = self.render_prompt(history, latest, candidates);

        let speakers = self
            .retry
            .run_or_fallback(
                "speaker_selection",
                |_| self.attempt(&prompt, candidates),
                |e| {
                    let reason = match e {
                        RetryError::Fatal(_) => "fatal",
                        RetryError::Exhausted { .. } => "exhausted",
                    };
                    let fallback = self.resolve_fallback(candidates, narrator);
                    warn!(error = %e, reason, fallback = %fallback, "SPEAKER_SELECTION_FALLBACK");
                    vec![fallback]
                },
            )
            .await;

        debug!(speakers = ?speakers, "Speakers selected");
        speakers
    }

    async fn attempt(
        &self,
        prompt: &str,
        candidates: &[String],
    ) -> Result<Vec<String>, OrchestratorError> {
        let endpoint = self.pool.select_endpoint(CapabilityClass::Utility).await?;

        let result =
            tokio::time::timeout(self.call_timeout, self.backend.complete(&endpoint, prompt, &[]))
                .await;
        self.pool.record_usage(&endpoint).await;

        let reply = match result {
            Ok(reply) => reply?,
            Err(_) => return Err(OrchestratorError::Brain(BrainError::Timeout)),
        };

        parse_selection(&reply, candidates).inspect_err(|e| {
            warn!(endpoint = %endpoint.id, error = %e, "SPEAKER_SELECTION_FAILED");
        })
    }
}

impl std::fmt::Debug for SpeakerSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakerSelector")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_simple_list() {
        let candidates = names(&["Narrator", "Alice", "Bob"]);
        assert_eq!(
            parse_selection("[Alice, Bob]", &candidates).unwrap(),
            names(&["Alice", "Bob"])
        );
    }

    #[test]
    fn test_parse_strips_quotes_and_surrounding_text() {
        let candidates = names(&["Narrator", "Alice"]);
        let reply = "Sure! The next speakers are [\"Alice\", 'Narrator'] then [Bob].";
        assert_eq!(
            parse_selection(reply, &candidates).unwrap(),
            names(&["Alice", "Narrator"])
        );
    }

    #[test]
    fn test_parse_keeps_duplicates() {
        let candidates = names(&["Alice"]);
        assert_eq!(
            parse_selection("[Alice, Alice]", &candidates).unwrap(),
            names(&["Alice", "Alice"])
        );
    }

    #[test]
    fn test_parse_rejects_missing_list() {
        let result = parse_selection("Alice should talk", &names(&["Alice"]));
        assert!(matches!(result, Err(OrchestratorError::SelectionParse(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_name() {
        let result = parse_selection("[Alice, Carol]", &names(&["Alice", "Bob"]));
        match result {
            Err(OrchestratorError::InvalidCandidate(name)) => assert_eq!(name, "Carol"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_empty_list() {
        let result = parse_selection("[]", &names(&["Alice"]));
        assert!(matches!(result, Err(OrchestratorError::InvalidCandidate(_))));
    }

    #[test]
    fn test_parse_does_not_span_lines() {
        let result = parse_selection("[Alice,\nBob]", &names(&["Alice", "Bob"]));
        assert!(matches!(result, Err(OrchestratorError::SelectionParse(_))));
    }

    #[test]
    fn test_default_prompt_has_placeholders() {
        let template = PromptTemplate::new(DEFAULT_SELECTION_PROMPT);
        assert!(template.has_placeholder("context"));
        assert!(template.has_placeholder("character_names"));
    }

    fn selector(fallback: &str) -> SpeakerSelector {
        use crate::clock::SystemClock;
        use crate::pool::LeastUsedPolicy;
        use crate::store::MemoryEndpointStore;

        let pool = ModelPool::new(
            Arc::new(MemoryEndpointStore::new()),
            Arc::new(LeastUsedPolicy),
            Arc::new(SystemClock),
        );
        SpeakerSelector::new(
            pool,
            Arc::new(mock_brain::ScriptedBrain::new()),
            PromptTemplate::new(DEFAULT_SELECTION_PROMPT),
            RetryPolicy::new(3),
            Duration::from_secs(1),
            fallback,
        )
    }

    #[test]
    fn test_resolve_fallback_prefers_configured_name() {
        let candidates = names(&["Narrator", "Alice"]);
        assert_eq!(
            selector("Narrator").resolve_fallback(&candidates, Some("Narrator")),
            "Narrator"
        );
        assert_eq!(selector("Alice").resolve_fallback(&candidates, Some("Narrator")), "Alice");
    }

    #[test]
    fn test_resolve_fallback_uses_roster_narrator() {
        let candidates = names(&["Storyteller", "Alice"]);
        assert_eq!(
            selector("Narrator").resolve_fallback(&candidates, Some("Storyteller")),
            "Storyteller"
        );
        assert_eq!(selector("Narrator").resolve_fallback(&candidates, None), "Storyteller");
        assert_eq!(
            selector("Narrator").resolve_fallback(&names(&["Alice", "Bob"]), None),
            "Alice"
        );
    }

    #[tokio::test]
    async fn test_selection_without_endpoints_falls_back_inside_candidates() {
        let candidates = names(&["Storyteller", "Alice"]);
        let speakers = selector("Narrator")
            .select_next_speakers(&[], "Hello", &candidates, Some("Storyteller"))
            .await;
        assert_eq!(speakers, names(&["Storyteller"]));
    }

    #[test]
    fn test_format_names() {
        assert_eq!(format_names(&names(&["A", "B", "C"])), "[A, B, C]");
    }

    #[test]
    fn test_load_prompt_file_missing_or_empty() {
        assert!(load_prompt_file("/nonexistent/selector.md").is_none());
    }
}
