//! Field-by-field recovery of a persisted configuration document.

use std::ops::RangeInclusive;

use serde_json::{Map, Value};
use tracing::debug;

use super::{
    CONTEXT_SIZE_RANGE, Config, LlmConfig, MAX_TOKENS_RANGE, PrivacyConfig, TEMPERATURE_RANGE,
    TIMEOUT_MS_RANGE, TOP_K_RANGE, TOP_P_RANGE, Theme, UiConfig,
};

/// A possibly-missing JSON object section.
struct Section<'a> {
    name: &'static str,
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Section<'a> {
    fn of(root: &'a Value, name: &'static str) -> Self {
        let map = root.get(name).and_then(Value::as_object);
        if map.is_none() && root.get(name).is_some() {
            debug!(section = name, "config section is not an object, using defaults");
        }
        Self { name, map }
    }

    fn field(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(key)).filter(|v| !v.is_null())
    }

    fn rejected(&self, key: &str, value: &Value) {
        debug!(
            section = self.name,
            key,
            %value,
            "ignoring invalid config value"
        );
    }

    #[allow(clippy::cast_possible_truncation)]
    fn f32(&self, key: &str, default: f32, range: &RangeInclusive<f32>) -> f32 {
        let Some(raw) = self.field(key) else {
            return default;
        };
        match raw.as_f64().map(|v| v as f32) {
            Some(v) if v.is_finite() && range.contains(&v) => v,
            _ => {
                self.rejected(key, raw);
                default
            }
        }
    }

    fn u32(&self, key: &str, default: u32, range: &RangeInclusive<u32>) -> u32 {
        let Some(raw) = self.field(key) else {
            return default;
        };
        match raw.as_u64().and_then(|v| u32::try_from(v).ok()) {
            Some(v) if range.contains(&v) => v,
            _ => {
                self.rejected(key, raw);
                default
            }
        }
    }

    fn u64(&self, key: &str, default: u64, range: &RangeInclusive<u64>) -> u64 {
        let Some(raw) = self.field(key) else {
            return default;
        };
        match raw.as_u64() {
            Some(v) if range.contains(&v) => v,
            _ => {
                self.rejected(key, raw);
                default
            }
        }
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.field(key) else {
            return default;
        };
        raw.as_bool().unwrap_or_else(|| {
            self.rejected(key, raw);
            default
        })
    }

    fn opt_string(&self, key: &str) -> Option<String> {
        let raw = self.field(key)?;
        match raw.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            Some(_) => None,
            None => {
                self.rejected(key, raw);
                None
            }
        }
    }

    fn theme(&self, key: &str, default: Theme) -> Theme {
        let Some(raw) = self.field(key) else {
            return default;
        };
        match raw.as_str().map(str::parse::<Theme>) {
            Some(Ok(theme)) => theme,
            _ => {
                self.rejected(key, raw);
                default
            }
        }
    }
}

pub(super) fn config_from_value(root: &Value) -> Config {
    let defaults = Config::default();

    let llm = Section::of(root, "llm");
    let ui = Section::of(root, "ui");
    let privacy = Section::of(root, "privacy");

    Config {
        llm: LlmConfig {
            default_model: llm.opt_string("defaultModel"),
            context_size: llm.u32(
                "contextSize",
                defaults.llm.context_size,
                &CONTEXT_SIZE_RANGE,
            ),
            temperature: llm.f32(
                "temperature",
                defaults.llm.temperature,
                &TEMPERATURE_RANGE,
            ),
            max_tokens: llm.u32("maxTokens", defaults.llm.max_tokens, &MAX_TOKENS_RANGE),
            top_k: llm.u32("topK", defaults.llm.top_k, &TOP_K_RANGE),
            top_p: llm.f32("topP", defaults.llm.top_p, &TOP_P_RANGE),
            timeout_ms: llm.u64("timeoutMs", defaults.llm.timeout_ms, &TIMEOUT_MS_RANGE),
        },
        ui: UiConfig {
            theme: ui.theme("theme", defaults.ui.theme),
            animations: ui.bool("animations", defaults.ui.animations),
            chat_bubbles: ui.bool("chatBubbles", defaults.ui.chat_bubbles),
        },
        privacy: PrivacyConfig {
            store_conversations: privacy.bool(
                "storeConversations",
                defaults.privacy.store_conversations,
            ),
            analytics: privacy.bool("analytics", defaults.privacy.analytics),
            telemetry: privacy.bool("telemetry", defaults.privacy.telemetry),
        },
    }
}
