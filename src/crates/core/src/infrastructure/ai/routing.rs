//! Decides, per request, whether the mesh should be tried before the local server.

use super::circuit_breaker::CircuitBreaker;
use super::message::latest_user_message;
use crate::util::errors::TarxResult;
use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tarx_ai_adapters::MeshStatus;
use tarx_core_types::Message;

pub const COMPLEX_CHAR_THRESHOLD: usize = 500;
pub const COMPLEX_WORD_THRESHOLD: usize = 100;
pub const MESH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const COMPLEXITY_PATTERNS: [&str; 5] = [
    r"(?i)analyze|evaluate|compare",
    r"(?i)step[- ]by[- ]step",
    r"(?i)implement|refactor|optimize",
    r"(?i)debug|fix|resolve",
    r"(?i)explain.*code|review.*code",
];

fn complexity_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        COMPLEXITY_PATTERNS
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some((*pattern, regex)),
                Err(e) => {
                    warn!("Skipping invalid complexity pattern {}: {}", pattern, e);
                    None
                }
            })
            .collect()
    })
}

/// Source of mesh health, probed before every routing decision.
#[async_trait]
pub trait MeshHealthProbe: Send + Sync {
    async fn mesh_status(&self) -> TarxResult<MeshStatus>;
}

/// Size and keyword features of the prompt that drives routing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingContext {
    pub word_count: usize,
    pub char_count: usize,
    pub matched_patterns: Vec<&'static str>,
}

impl RoutingContext {
    pub fn analyze(text: &str) -> Self {
        Self {
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
            matched_patterns: complexity_patterns()
                .iter()
                .filter(|(_, regex)| regex.is_match(text))
                .map(|(pattern, _)| *pattern)
                .collect(),
        }
    }

    /// Context of the latest user message; empty when there is none.
    pub fn from_messages(messages: &[Message]) -> Self {
        latest_user_message(messages)
            .map(|message| Self::analyze(&message.content))
            .unwrap_or_default()
    }

    pub fn is_complex(&self) -> bool {
        self.char_count > COMPLEX_CHAR_THRESHOLD
            || self.word_count > COMPLEX_WORD_THRESHOLD
            || !self.matched_patterns.is_empty()
    }
}

pub struct RoutingDecisionEngine {
    breaker: Arc<CircuitBreaker>,
    probe: Arc<dyn MeshHealthProbe>,
}

impl RoutingDecisionEngine {
    pub fn new(breaker: Arc<CircuitBreaker>, probe: Arc<dyn MeshHealthProbe>) -> Self {
        Self { breaker, probe }
    }

    /// `true` only for complex prompts while the mesh is up and has peers.
    ///
    /// Never fails: every probe problem routes locally.
    pub async fn should_use_mesh(&self, messages: &[Message]) -> bool {
        if !self.breaker.permits_attempt() {
            debug!("Circuit breaker open, skipping mesh probe");
            return false;
        }

        match tokio::time::timeout(MESH_PROBE_TIMEOUT, self.probe.mesh_status()).await {
            Ok(Ok(status)) if status.is_available() => {}
            Ok(Ok(status)) => {
                debug!(
                    "Mesh unavailable: running={}, peers={}",
                    status.is_running(),
                    status.peer_count()
                );
                return false;
            }
            Ok(Err(e)) => {
                debug!("Mesh status probe failed: {}", e);
                return false;
            }
            Err(_) => {
                debug!(
                    "Mesh status probe timed out after {}ms",
                    MESH_PROBE_TIMEOUT.as_millis()
                );
                return false;
            }
        }

        let context = RoutingContext::from_messages(messages);
        let complex = context.is_complex();
        debug!(
            "Routing decision: mesh={}, words={}, chars={}, patterns={:?}",
            complex, context.word_count, context.char_count, context.matched_patterns
        );
        complex
    }
}
