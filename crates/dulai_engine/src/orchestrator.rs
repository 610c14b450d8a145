use std::collections::VecDeque;
use std::sync::Arc;

use dulai_core::{update, ApiKey, Effect, Msg, TaskId, TaskPhase, TaskState};
use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::agent::resolve_agent;
use crate::browser::BrowserLauncher;
use crate::channel::ProgressChannel;
use crate::completion::{CompletionTransport, OpenAiTransport, RetryingCompletionClient};
use crate::config::EngineConfig;
use crate::credential::{CredentialVerifier, OpenAiCredentialProbe};
use crate::offload::BlockingOffloader;
use crate::research::Researcher;
use crate::summarize::{ScrapeSettings, ScrapeSummarizer};
use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
    /// Cancelled or the client went away; no terminal message was delivered.
    Abandoned,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Failed => "failed",
            RunOutcome::Abandoned => "abandoned",
        }
    }
}

/// Drives one task per call: feeds collaborator results into the pure state
/// machine and executes the effects it returns.
#[derive(Clone)]
pub struct TaskOrchestrator {
    config: Arc<EngineConfig>,
    transport: Arc<dyn CompletionTransport>,
    verifier: Arc<dyn CredentialVerifier>,
    launcher: Arc<dyn BrowserLauncher>,
    offloader: Arc<BlockingOffloader>,
}

impl TaskOrchestrator {
    pub fn new(
        config: Arc<EngineConfig>,
        transport: Arc<dyn CompletionTransport>,
        verifier: Arc<dyn CredentialVerifier>,
        launcher: Arc<dyn BrowserLauncher>,
        offloader: Arc<BlockingOffloader>,
    ) -> Self {
        Self {
            config,
            transport,
            verifier,
            launcher,
            offloader,
        }
    }

    /// Production wiring: OpenAI transport and probe, configured browser
    /// backend and a worker pool sized from the config.
    pub fn from_config(config: Arc<EngineConfig>) -> Result<Self, EngineError> {
        let transport = OpenAiTransport::new(config.api_base.clone(), config.request_timeout)?;
        let verifier = OpenAiCredentialProbe::new(config.api_base.clone(), config.request_timeout)?;
        let launcher = config.browser.clone();
        let offloader = BlockingOffloader::new(config.worker_pool_size);
        engine_info!(
            "orchestrator_ready workers={} smart_model={} fast_model={}",
            offloader.size(),
            config.smart_llm_model,
            config.fast_llm_model
        );
        Ok(Self::new(
            config,
            Arc::new(transport),
            Arc::new(verifier),
            Arc::new(launcher),
            Arc::new(offloader),
        ))
    }

    pub fn offloader(&self) -> &Arc<BlockingOffloader> {
        &self.offloader
    }

    /// Runs the task requested by `frame` until it finishes, `cancel` fires or
    /// the receiving side of `channel` is dropped.
    ///
    /// Cancellation drops in-flight completion calls. A scrape already running
    /// on the worker pool finishes in the background; its result is discarded
    /// and its worker slot is released when it returns.
    pub async fn run(
        &self,
        task_id: TaskId,
        frame: String,
        channel: &ProgressChannel,
        cancel: CancellationToken,
    ) -> RunOutcome {
        engine_info!("task_start task={}", task_id);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                engine_info!("task_cancelled task={}", task_id);
                RunOutcome::Abandoned
            }
            _ = channel.disconnected() => {
                engine_info!("task_client_gone task={}", task_id);
                RunOutcome::Abandoned
            }
            outcome = self.drive(task_id, frame, channel) => outcome,
        };
        engine_info!("task_end task={} outcome={}", task_id, outcome.as_str());
        outcome
    }

    async fn drive(&self, task_id: TaskId, frame: String, channel: &ProgressChannel) -> RunOutcome {
        let mut state = TaskState::new(task_id);
        let mut inbox = VecDeque::from([Msg::FrameReceived(frame)]);

        while let Some(msg) = inbox.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                match self.execute(effect, channel).await {
                    Ok(Some(msg)) => inbox.push_back(msg),
                    Ok(None) => {}
                    Err(err) => {
                        engine_warn!("task_delivery_failed task={} error=\"{}\"", task_id, err);
                        return RunOutcome::Abandoned;
                    }
                }
            }
        }

        match state.phase() {
            TaskPhase::Succeeded => RunOutcome::Succeeded,
            TaskPhase::Failed => RunOutcome::Failed,
            phase => {
                engine_warn!("task_stalled task={} phase={:?}", task_id, phase);
                RunOutcome::Abandoned
            }
        }
    }

    /// Performs one effect. `Err` means the channel can no longer deliver.
    async fn execute(
        &self,
        effect: Effect,
        channel: &ProgressChannel,
    ) -> Result<Option<Msg>, EngineError> {
        match effect {
            Effect::Send(message) => {
                channel.send(message).await?;
                Ok(None)
            }
            Effect::VerifyCredential { api_key } => {
                let result = self.verifier.verify(&api_key).await;
                engine_debug!(
                    "credential_checked task={} ok={}",
                    channel.task_id(),
                    result.is_ok()
                );
                Ok(Some(Msg::CredentialChecked(
                    result.map_err(|err| err.to_string()),
                )))
            }
            Effect::ResolveAgent { query, api_key } => {
                let client = self.client(api_key).with_policy(self.config.agent_retry);
                let persona = resolve_agent(&client, &self.config.smart_llm_model, &query).await;
                Ok(Some(Msg::AgentResolved(persona)))
            }
            Effect::StartResearch { task, persona } => {
                let client = self.client(task.api_key.clone());
                let summarizer = ScrapeSummarizer::new(
                    Arc::clone(&self.launcher),
                    Arc::clone(&self.offloader),
                    client.clone(),
                    ScrapeSettings::from(self.config.as_ref()),
                );
                let researcher = Researcher::new(&self.config, client, summarizer);
                match researcher.run(&task, &persona, channel).await {
                    Ok(report) => Ok(Some(Msg::ResearchFinished(Ok(report)))),
                    Err(err) if err.is_delivery_failure() => Err(err),
                    Err(err) => {
                        engine_warn!(
                            "research_failed task={} kind={} error=\"{}\"",
                            task.id,
                            err.kind(),
                            err
                        );
                        Ok(Some(Msg::ResearchFinished(Err(err.to_failure()))))
                    }
                }
            }
        }
    }

    fn client(&self, api_key: ApiKey) -> RetryingCompletionClient {
        RetryingCompletionClient::new(
            Arc::clone(&self.transport),
            api_key,
            self.config.completion_retry,
        )
    }
}
