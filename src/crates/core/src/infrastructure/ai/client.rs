//! TARX inference client.
//!
//! Each call is routed to the mesh when the prompt looks complex and the mesh
//! has peers, and always ends on the local server if the mesh attempt fails.
//! Only local outcomes feed the circuit breaker.

use super::circuit_breaker::{CircuitBreaker, CircuitState};
use super::config::TarxClientConfig;
use super::health::{self, ConnectivityStatus};
use super::message::{build_message_array, system_prompt_of};
use super::retry::RetryPolicy;
use super::routing::RoutingDecisionEngine;
use super::transport::{HttpTransport, LOCAL_BACKEND};
use crate::util::errors::{TarxError, TarxResult};
use futures::{Stream, StreamExt};
use log::{debug, error, warn};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use tarx_ai_adapters::{
    local_server_stream, mesh_stream, ChatCompletionRequest, DecodeControl, DecodedStream,
    Deadline, MeshQueryRequest, StreamEvent,
};
use tarx_core_types::{ConversationTurn, Message, ModelDescriptor, ModelInfo};
use tokio_util::sync::CancellationToken;

pub type ApiStream<'a> = Pin<Box<dyn Stream<Item = TarxResult<StreamEvent>> + Send + 'a>>;

pub const LOCAL_MAX_TOKENS: u32 = 4096;
pub const MODEL_CONTEXT_WINDOW: u32 = 32_768;

pub struct TarxMeshClient {
    config: TarxClientConfig,
    transport: Arc<HttpTransport>,
    breaker: Arc<CircuitBreaker>,
    router: RoutingDecisionEngine,
    active_request: Mutex<CancellationToken>,
}

impl TarxMeshClient {
    pub fn new(config: TarxClientConfig) -> Self {
        Self::with_circuit_breaker(config, Arc::new(CircuitBreaker::new()))
    }

    /// Builds a client around an existing breaker, e.g. one shared with another client.
    pub fn with_circuit_breaker(config: TarxClientConfig, breaker: Arc<CircuitBreaker>) -> Self {
        let transport = Arc::new(HttpTransport::new(&config));
        let router = RoutingDecisionEngine::new(breaker.clone(), transport.clone());
        Self {
            config,
            transport,
            breaker,
            router,
            active_request: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &TarxClientConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn should_use_mesh(&self, messages: &[Message]) -> bool {
        self.router.should_use_mesh(messages).await
    }

    /// Streams one completion for `history` behind `system_prompt`.
    ///
    /// A successful stream ends with exactly one usage event. After
    /// [`abort`](Self::abort) the stream simply ends.
    pub fn create_message(&self, system_prompt: &str, history: &[ConversationTurn]) -> ApiStream<'_> {
        let messages = build_message_array(system_prompt, history);
        let cancel = self.begin_request();
        self.stream_messages(messages, cancel)
    }

    /// Like [`create_message`](Self::create_message), re-running the whole call
    /// while `should_retry` accepts an error raised before any event was delivered.
    ///
    /// Every attempt shares the token installed here, so [`abort`](Self::abort)
    /// also ends the retries, including one waiting out its backoff.
    pub fn create_message_with_retry<'a, P>(
        &'a self,
        policy: RetryPolicy,
        should_retry: P,
        system_prompt: &str,
        history: &[ConversationTurn],
    ) -> ApiStream<'a>
    where
        P: Fn(&TarxError) -> bool + Send + Sync + 'a,
    {
        let messages = build_message_array(system_prompt, history);
        let cancel = self.begin_request();

        Box::pin(async_stream::stream! {
            // An attempt succeeds once its first item is not an error.
            let mut attempts = policy.wrap(
                |attempt: u32| {
                    if attempt > 0 {
                        debug!("Starting inference attempt {}", attempt + 1);
                    }
                    let mut events = self.stream_messages(messages.clone(), cancel.clone());
                    async move {
                        match events.next().await {
                            Some(Err(e)) => Err(e),
                            first => Ok((first, events)),
                        }
                    }
                },
                &should_retry,
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = attempts.call() => Some(outcome),
            };

            match outcome {
                None => debug!("Retrying request aborted"),
                Some(Ok((first, mut rest))) => {
                    if let Some(item) = first {
                        yield item;
                    }
                    while let Some(item) = rest.next().await {
                        yield item;
                    }
                }
                Some(Err(e)) => {
                    yield Err(e);
                }
            }
        })
    }

    fn stream_messages(&self, messages: Vec<Message>, cancel: CancellationToken) -> ApiStream<'_> {
        Box::pin(async_stream::stream! {
            if cancel.is_cancelled() {
                return;
            }

            if self.config.enable_mesh_routing && self.router.should_use_mesh(&messages).await {
                match self.open_mesh(&messages, &cancel).await {
                    Ok(Some(mut events)) => {
                        let mut failure = None;
                        while let Some(item) = events.next().await {
                            match item {
                                Ok(event) => {
                                    yield Ok(event);
                                }
                                Err(e) => {
                                    failure = Some(TarxError::from(e));
                                    break;
                                }
                            }
                        }
                        match failure {
                            None => return,
                            Some(e) => warn!("Mesh stream failed, falling back to local server: {}", e),
                        }
                    }
                    Ok(None) => return,
                    Err(e) => warn!("Mesh query failed, falling back to local server: {}", e),
                }
            }

            if cancel.is_cancelled() {
                return;
            }

            let mut failure = None;
            match self.open_local(&messages, &cancel).await {
                Ok(Some(mut events)) => {
                    while let Some(item) = events.next().await {
                        match item {
                            Ok(event) => {
                                yield Ok(event);
                            }
                            Err(e) => {
                                failure = Some(TarxError::from(e));
                                break;
                            }
                        }
                    }
                }
                Ok(None) => return,
                Err(e) => failure = Some(e),
            }

            match failure {
                None if cancel.is_cancelled() => debug!("Local stream aborted"),
                None => self.breaker.record_success(),
                Some(e) => {
                    yield Err(self.local_failure(e));
                }
            }
        })
    }

    /// Cancels whichever request is currently streaming.
    pub fn abort(&self) {
        debug!("Aborting active inference request");
        self.lock_active().cancel();
    }

    pub fn get_model(&self) -> ModelDescriptor {
        ModelDescriptor {
            id: self.config.model.clone(),
            info: ModelInfo {
                context_window: MODEL_CONTEXT_WINDOW,
                max_tokens: LOCAL_MAX_TOKENS,
                supports_images: false,
                supports_prompt_cache: false,
                input_price: 0.0,
                output_price: 0.0,
            },
        }
    }

    pub async fn check_local_health(&self) -> ConnectivityStatus {
        health::check_local_health(&self.transport).await
    }

    pub async fn mesh_connectivity(&self) -> ConnectivityStatus {
        health::mesh_connectivity(self.transport.as_ref()).await
    }

    /// Opens the mesh stream; `None` when aborted before the response arrived.
    async fn open_mesh(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> TarxResult<Option<DecodedStream>> {
        let body = MeshQueryRequest {
            model: &self.config.model,
            prompt: messages
                .last()
                .map(|message| message.content.as_str())
                .unwrap_or_default(),
            system_prompt: system_prompt_of(messages),
            stream: true,
            timeout: self.config.request_timeout_ms,
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            response = self.transport.open_mesh_stream(&body) => response?,
        };
        Ok(Some(mesh_stream(response, DecodeControl::new(cancel.clone()))))
    }

    /// Opens the local stream under the request deadline, which covers the
    /// connection as well as every read.
    async fn open_local(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> TarxResult<Option<DecodedStream>> {
        let deadline = Deadline::after(self.config.request_timeout());
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            stream: true,
            max_tokens: LOCAL_MAX_TOKENS,
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            _ = tokio::time::sleep_until(deadline.at) => {
                return Err(TarxError::Timeout {
                    backend: LOCAL_BACKEND,
                    timeout: deadline.budget,
                });
            }
            response = self.transport.open_local_stream(&body) => response?,
        };
        let control = DecodeControl::new(cancel.clone()).with_deadline(deadline);
        Ok(Some(local_server_stream(response, control)))
    }

    /// Records a local failure and picks the error the caller sees.
    fn local_failure(&self, err: TarxError) -> TarxError {
        error!("Local inference failed: {}", err);
        self.breaker.record_failure();
        if !self.config.enable_cloud_fallback && self.breaker.state() == CircuitState::Open {
            TarxError::LocalInferenceUnavailable
        } else {
            err
        }
    }

    fn begin_request(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.lock_active() = token.clone();
        token
    }

    fn lock_active(&self) -> MutexGuard<'_, CancellationToken> {
        self.active_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
