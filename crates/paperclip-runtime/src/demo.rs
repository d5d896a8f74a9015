//! Synthetic replies served while no model can generate.

use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;

/// Characters per streamed demo chunk.
pub const DEMO_CHUNK_CHARS: usize = 3;

/// Delay between demo chunks.
pub const DEMO_CHUNK_DELAY: Duration = Duration::from_millis(50);

/// The demo reply for `message`.
pub fn demo_reply(message: &str, model_detected: bool) -> String {
    let message = message.trim();
    if model_detected {
        format!(
            "Hi there! You asked about \"{message}\". I found a model file, but it could not be \
             loaded, so I'm running in demo mode. I'm still happy to keep you company! 📎"
        )
    } else {
        format!(
            "Great question! You mentioned \"{message}\". I don't have a language model to think \
             with yet, so I'm running in demo mode. Add a .gguf model and ask me again! 📎"
        )
    }
}

/// Split `text` into chunks of [`DEMO_CHUNK_CHARS`] characters.
pub fn demo_chunks(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(DEMO_CHUNK_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Stream `text` in small chunks, pausing `delay` before each one.
pub fn demo_stream(text: &str, delay: Duration) -> impl Stream<Item = String> + Send + 'static {
    let chunks = demo_chunks(text);
    stream! {
        for chunk in chunks {
            tokio::time::sleep(delay).await;
            yield chunk;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn test_reply_mentions_detection() {
        assert!(demo_reply("hello", true).contains("found a model file"));
        assert!(demo_reply("hello", false).contains(".gguf"));
        assert!(demo_reply("  hello  ", false).contains("\"hello\""));
    }

    #[test]
    fn test_chunks_respect_char_boundaries() {
        assert_eq!(demo_chunks("abcdefg"), ["abc", "def", "g"]);
        assert_eq!(demo_chunks("📎é!x"), ["📎é!", "x"]);
        assert!(demo_chunks("").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_yields_all_chunks() {
        let chunks: Vec<String> = demo_stream("hello!!", DEMO_CHUNK_DELAY).collect().await;
        assert_eq!(chunks.concat(), "hello!!");
        assert_eq!(chunks.len(), 3);
    }
}
