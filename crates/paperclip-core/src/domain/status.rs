//! Session lifecycle state and the status reported to front ends.

use serde::{Deserialize, Serialize};

/// Lifecycle of an inference session.
///
/// ```text
/// Unloaded ──▶ Loading ──▶ Ready ⇄ Generating
///                 │
///                 └──▶ DemoFallback
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Unloaded,
    Loading,
    Ready,
    Generating,
    /// Loading failed or no backend exists; only synthetic replies are served.
    DemoFallback,
}

impl SessionState {
    /// True if real generation is possible.
    pub const fn can_generate(self) -> bool {
        matches!(self, Self::Ready | Self::Generating)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Generating => "generating",
            Self::DemoFallback => "demo",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status snapshot for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// A model is loaded and can generate.
    pub ready: bool,
    /// A model file was found, whether or not it loaded.
    pub model_detected: bool,
    pub model_name: Option<String>,
    /// Synthetic replies are being served.
    pub demo_mode: bool,
    pub state: SessionState,
    /// Operator-facing cause of demo mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SessionStatus {
    /// Status before anything was loaded.
    pub const fn unloaded() -> Self {
        Self {
            ready: false,
            model_detected: false,
            model_name: None,
            demo_mode: false,
            state: SessionState::Unloaded,
            detail: None,
        }
    }

    pub fn ready(model_name: impl Into<String>) -> Self {
        Self {
            ready: true,
            model_detected: true,
            model_name: Some(model_name.into()),
            demo_mode: false,
            state: SessionState::Ready,
            detail: None,
        }
    }

    pub fn demo(model_name: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            ready: false,
            model_detected: model_name.is_some(),
            model_name,
            demo_mode: true,
            state: SessionState::DemoFallback,
            detail: Some(detail.into()),
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::unloaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_status_remembers_detection() {
        let status = SessionStatus::demo(Some("tiny.gguf".into()), "load failed");
        assert!(status.model_detected);
        assert!(status.demo_mode);
        assert!(!status.ready);

        let status = SessionStatus::demo(None, "no models");
        assert!(!status.model_detected);
    }

    #[test]
    fn test_status_json_shape() {
        let json = serde_json::to_value(SessionStatus::ready("a.gguf")).unwrap();
        assert_eq!(json["ready"], true);
        assert_eq!(json["modelDetected"], true);
        assert_eq!(json["modelName"], "a.gguf");
        assert_eq!(json["demoMode"], false);
        assert!(json.get("detail").is_none());
    }
}
