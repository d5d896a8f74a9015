//! Shared CLI presentation utilities.
//!
//! Format-only helpers: no domain transforms, no I/O.

use std::fmt::Write as _;

use indicatif::HumanBytes;
use paperclip_core::{Config, FinishReason, SessionStatus};
use paperclip_runtime::FactOrigin;

/// Prefix for assistant output.
pub const ASSISTANT_PROMPT: &str = "📎 ";

/// One-paragraph summary of the session.
pub fn format_status(status: &SessionStatus, backend: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "state:    {}", status.state);
    let _ = writeln!(out, "backend:  {backend}");
    let _ = writeln!(
        out,
        "model:    {}",
        status.model_name.as_deref().unwrap_or("(none)")
    );
    let _ = write!(out, "demo:     {}", if status.demo_mode { "yes" } else { "no" });
    if let Some(detail) = &status.detail {
        let _ = write!(out, "\nreason:   {detail}");
    }
    out
}

/// Note printed after a reply that did not end normally.
pub const fn finish_note(reason: FinishReason) -> Option<&'static str> {
    match reason {
        FinishReason::Completed | FinishReason::StopSequence => None,
        FinishReason::MaxTokens => Some("[reply cut at the token limit]"),
        FinishReason::Cancelled => Some("[cancelled]"),
        FinishReason::TimedOut => Some("[timed out]"),
    }
}

/// A row of `paperclip models`.
pub fn format_model_line(name: &str, size_bytes: Option<u64>, selected: bool) -> String {
    let marker = if selected { '*' } else { ' ' };
    match size_bytes {
        Some(size) => format!("{marker} {name}  ({})", HumanBytes(size)),
        None => format!("{marker} {name}"),
    }
}

pub fn format_config(config: &Config) -> String {
    let llm = &config.llm;
    let ui = &config.ui;
    let privacy = &config.privacy;
    let mut out = String::new();
    let _ = writeln!(out, "LLM");
    let _ = writeln!(
        out,
        "  model:               {}",
        llm.default_model.as_deref().unwrap_or("(first available)")
    );
    let _ = writeln!(out, "  context size:        {}", llm.context_size);
    let _ = writeln!(out, "  temperature:         {}", llm.temperature);
    let _ = writeln!(out, "  max tokens:          {}", llm.max_tokens);
    let _ = writeln!(out, "  top k:               {}", llm.top_k);
    let _ = writeln!(out, "  top p:               {}", llm.top_p);
    let _ = writeln!(out, "  timeout:             {} ms", llm.timeout_ms);
    let _ = writeln!(out, "UI");
    let _ = writeln!(out, "  theme:               {}", ui.theme);
    let _ = writeln!(out, "  animations:          {}", ui.animations);
    let _ = writeln!(out, "  chat bubbles:        {}", ui.chat_bubbles);
    let _ = writeln!(out, "Privacy");
    let _ = writeln!(out, "  store conversations: {}", privacy.store_conversations);
    let _ = writeln!(out, "  analytics:           {}", privacy.analytics);
    let _ = write!(out, "  telemetry:           {}", privacy.telemetry);
    out
}

pub const fn fact_origin_label(origin: FactOrigin) -> &'static str {
    match origin {
        FactOrigin::Queued => "prefetched",
        FactOrigin::Live => "fresh",
        FactOrigin::Fallback => "classic",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_status_shows_reason() {
        let status = SessionStatus::demo(Some("a.gguf".into()), "llama-server not found");
        let text = format_status(&status, "unavailable");
        assert!(text.contains("a.gguf"));
        assert!(text.contains("demo:     yes"));
        assert!(text.ends_with("reason:   llama-server not found"));
    }

    #[test]
    fn test_ready_status_has_no_reason() {
        let text = format_status(&SessionStatus::ready("a.gguf"), "llama-server");
        assert!(!text.contains("reason"));
        assert!(text.contains("state:    ready"));
    }

    #[test]
    fn test_model_line_marks_selection() {
        assert_eq!(format_model_line("a.gguf", None, true), "* a.gguf");
        assert_eq!(format_model_line("b.gguf", Some(1024), false), "  b.gguf  (1.00 KiB)");
    }

    #[test]
    fn test_finish_notes() {
        assert_eq!(finish_note(FinishReason::Completed), None);
        assert_eq!(finish_note(FinishReason::TimedOut), Some("[timed out]"));
    }

    #[test]
    fn test_config_lists_every_section() {
        let text = format_config(&Config::default());
        for heading in ["LLM", "UI", "Privacy", "(first available)", "classic"] {
            assert!(text.contains(heading), "missing {heading}");
        }
    }
}
