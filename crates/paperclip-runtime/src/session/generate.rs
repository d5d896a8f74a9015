//! The token loop shared by primary and ephemeral contexts.

use std::ops::ControlFlow;

use paperclip_core::{ChatContext, Completion, FinishReason, GenerationError, GenerationOptions};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stop::StopMatcher;

/// Run one generation on `ctx`.
///
/// Applies stop sequences and the token cap on top of the backend stream,
/// forwards deliverable text to `on_token`, and records the exchange in the
/// context history unless it was interrupted.
pub(crate) async fn run_generation(
    ctx: &mut dyn ChatContext,
    prompt: &str,
    options: &GenerationOptions,
    cancel: &CancellationToken,
    on_token: &mut (dyn FnMut(&str) + Send),
) -> Result<Completion, GenerationError> {
    options.validate()?;

    let max_tokens = options.max_tokens as usize;
    let mut matcher = StopMatcher::new(&options.stop_sequences);
    let mut text = String::new();
    let mut tokens = 0usize;
    let mut finish: Option<FinishReason> = None;

    let result = {
        let mut sink = |piece: &str| {
            if cancel.is_cancelled() {
                return ControlFlow::Break(());
            }
            tokens += 1;

            let step = matcher.push(piece);
            if !step.emit.is_empty() {
                text.push_str(&step.emit);
                on_token(&step.emit);
            }
            if step.stopped {
                finish = Some(FinishReason::StopSequence);
                return ControlFlow::Break(());
            }
            if tokens >= max_tokens {
                finish = Some(FinishReason::MaxTokens);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        };
        ctx.generate(prompt, options, cancel, &mut sink).await
    };

    let finish = match result {
        // An aborted request surfaces as whatever the transport reports.
        Err(e) if cancel.is_cancelled() => {
            debug!(error = %e, "Backend error after cancellation");
            FinishReason::Cancelled
        }
        Err(e) => return Err(e.into()),
        Ok(()) => {
            let reason = match finish {
                Some(reason) => reason,
                None if cancel.is_cancelled() => FinishReason::Cancelled,
                None if tokens >= max_tokens => FinishReason::MaxTokens,
                None => FinishReason::Completed,
            };
            // Held-back text that never completed a stop sequence belongs to the reply.
            if matches!(reason, FinishReason::Completed | FinishReason::MaxTokens) {
                let rest = matcher.finish();
                if !rest.is_empty() {
                    text.push_str(&rest);
                    on_token(&rest);
                }
            }
            reason
        }
    };

    let reply = text.trim().to_string();
    if !finish.is_interrupted() && !reply.is_empty() {
        ctx.commit_turn(prompt, &reply);
    }

    Ok(Completion {
        text: reply,
        finish,
        tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedContext;
    use paperclip_core::ErrorKind;

    async fn run(
        ctx: &mut ScriptedContext,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> (Result<Completion, GenerationError>, Vec<String>) {
        let mut seen = Vec::new();
        let mut sink = |piece: &str| seen.push(piece.to_string());
        let result = run_generation(ctx, "hi", options, cancel, &mut sink).await;
        (result, seen)
    }

    #[tokio::test]
    async fn test_completed_reply_is_trimmed_and_committed() {
        let mut ctx = ScriptedContext::new(["  Hello", " world ", "\n"]);
        let (result, seen) = run(&mut ctx, &GenerationOptions::default(), &CancellationToken::new()).await;

        let completion = result.unwrap();
        assert_eq!(completion.text, "Hello world");
        assert_eq!(completion.finish, FinishReason::Completed);
        assert_eq!(completion.tokens, 3);
        assert_eq!(seen.concat(), "  Hello world \n");
        assert_eq!(ctx.history(), [("hi".to_string(), "Hello world".to_string())]);
    }

    #[tokio::test]
    async fn test_stop_sequence_never_delivered() {
        let mut ctx = ScriptedContext::new(["Fine.", "\nUs", "er:", " more"]);
        let (result, seen) = run(&mut ctx, &GenerationOptions::default(), &CancellationToken::new()).await;

        let completion = result.unwrap();
        assert_eq!(completion.finish, FinishReason::StopSequence);
        assert_eq!(completion.text, "Fine.");
        assert!(!seen.concat().contains("User"));
    }

    #[tokio::test]
    async fn test_max_tokens() {
        let mut ctx = ScriptedContext::new(["a", "b", "c", "d"]);
        let options = GenerationOptions::default().with_max_tokens(2);
        let (result, seen) = run(&mut ctx, &options, &CancellationToken::new()).await;

        let completion = result.unwrap();
        assert_eq!(completion.finish, FinishReason::MaxTokens);
        assert_eq!(completion.text, "ab");
        assert_eq!(seen, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_max_tokens_flushes_held_back_text() {
        let mut ctx = ScriptedContext::new(["Ask the ", "User", " more"]);
        let options = GenerationOptions::default().with_max_tokens(2);
        let (result, seen) = run(&mut ctx, &options, &CancellationToken::new()).await;

        let completion = result.unwrap();
        assert_eq!(completion.finish, FinishReason::MaxTokens);
        assert_eq!(completion.text, "Ask the User");
        assert_eq!(seen.concat(), "Ask the User");
        assert_eq!(ctx.history(), [("hi".to_string(), "Ask the User".to_string())]);
    }

    #[tokio::test]
    async fn test_pre_cancelled_delivers_nothing() {
        let mut ctx = ScriptedContext::new(["a", "b"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (result, seen) = run(&mut ctx, &GenerationOptions::default(), &cancel).await;

        let completion = result.unwrap();
        assert_eq!(completion.finish, FinishReason::Cancelled);
        assert!(seen.is_empty());
        assert!(ctx.history().is_empty());
    }

    #[tokio::test]
    async fn test_backend_error_is_reported() {
        let mut ctx = ScriptedContext::new(["a"]).failing_with("server died");
        let (result, _) = run(&mut ctx, &GenerationOptions::default(), &CancellationToken::new()).await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Backend);
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_generation() {
        let mut ctx = ScriptedContext::new(["a"]);
        let options = GenerationOptions::default().with_temperature(9.0);
        let (result, seen) = run(&mut ctx, &options, &CancellationToken::new()).await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::InvalidOptions);
        assert!(seen.is_empty());
    }
}
