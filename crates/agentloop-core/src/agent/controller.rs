//! Run controller implementation

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use super::decision::{DecisionStep, ReasoningOracle};
use super::execution::{ExecutionOutcome, ExecutionStep};
use super::observer::{NoopObserver, RunObserver};
use super::router::{route, Route};
use super::state::{FailureTracker, RunConfig, RunState};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{RunError, StoreError};
use crate::message::{ActionRequest, ConversationState, Message, Suspension};
use crate::tools::registry::ToolRegistry;

/// Output of a run that reached the terminal state
#[derive(Debug, Clone, PartialEq)]
pub struct FinalAnswer {
    pub conversation_id: String,
    pub content: String,
    /// Sequence number of the checkpoint holding the answer
    pub sequence: u64,
}

/// How an invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(FinalAnswer),
    /// Waiting for `resume` with the human's answer
    Suspended {
        conversation_id: String,
        suspension: Suspension,
    },
}

impl RunOutcome {
    pub fn is_suspended(&self) -> bool {
        matches!(self, RunOutcome::Suspended { .. })
    }

    pub fn answer(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed(answer) => Some(&answer.content),
            RunOutcome::Suspended { .. } => None,
        }
    }

    pub fn question(&self) -> Option<&str> {
        match self {
            RunOutcome::Suspended { suspension, .. } => suspension.request.question_text(),
            RunOutcome::Completed(_) => None,
        }
    }
}

/// Where the loop picks up
enum Step {
    Decide,
    Execute(Vec<ActionRequest>),
}

/// Drives conversations through decide/execute cycles.
///
/// One controller can serve many conversations concurrently; a single
/// conversation is only ever driven by one invocation at a time.
pub struct RunController {
    registry: Arc<ToolRegistry>,
    decision: DecisionStep,
    execution: ExecutionStep,
    store: Arc<dyn CheckpointStore>,
    observer: Arc<dyn RunObserver>,
    config: RunConfig,
    active: DashMap<String, ()>,
}

impl RunController {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        registry: ToolRegistry,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let registry = Arc::new(registry);
        let config = RunConfig::default();
        info!(tools = ?registry.list_names(), persistent = store.is_persistent(), "Created run controller");

        Self {
            decision: DecisionStep::new(oracle, Arc::clone(&registry)),
            execution: ExecutionStep::new(Arc::clone(&registry), config.max_output_len),
            registry,
            store,
            observer: Arc::new(NoopObserver),
            config,
            active: DashMap::new(),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.execution = ExecutionStep::new(Arc::clone(&self.registry), config.max_output_len);
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Add a user message and drive the conversation until it answers or
    /// suspends. Starts a new conversation if the id has no checkpoint.
    #[instrument(skip(self, user_message), fields(conversation_id = %conversation_id))]
    pub async fn run(
        &self,
        conversation_id: &str,
        user_message: impl Into<String>,
    ) -> Result<RunOutcome, RunError> {
        let _owner = self.claim(conversation_id)?;

        let checkpoint = match self.store.load(conversation_id).await {
            Ok(checkpoint) => checkpoint,
            Err(StoreError::NotFound(_)) => {
                info!("Starting new conversation");
                Checkpoint::new(ConversationState::new(conversation_id))
            }
            Err(e) => return Err(e.into()),
        };
        if checkpoint.state.is_suspended() {
            return Err(RunError::AwaitingInput(conversation_id.to_string()));
        }
        if checkpoint.state.last_message().is_some_and(Message::has_action_requests) {
            warn!("Last plan was never executed");
            return Err(RunError::PendingActions(conversation_id.to_string()));
        }

        // Committed together with the first decision
        let mut working = checkpoint.state.clone();
        working.push(Message::user(user_message))?;

        info!(history = checkpoint.state.len(), sequence = checkpoint.sequence, "Starting run");
        self.transition(conversation_id, RunState::Init, RunState::Deciding);
        self.drive(checkpoint, working, Step::Decide).await
    }

    /// Deliver the human's answer to a suspended conversation and continue
    #[instrument(skip(self, answer), fields(conversation_id = %conversation_id))]
    pub async fn resume(
        &self,
        conversation_id: &str,
        answer: impl Into<String>,
    ) -> Result<RunOutcome, RunError> {
        let _owner = self.claim(conversation_id)?;
        let mut checkpoint = self.load_existing(conversation_id).await?;

        let mut working = checkpoint.state.clone();
        let suspension = working
            .take_suspension()
            .ok_or_else(|| RunError::NotSuspended(conversation_id.to_string()))?;

        let message = Message::tool_result(&suspension.request_id, answer);
        working.push(message.clone())?;
        self.commit(&mut checkpoint, &working).await?;
        info!(request_id = %suspension.request_id, tool = %suspension.tool, "Human input delivered");

        self.observer.on_tool_message(conversation_id, &message);
        self.transition(conversation_id, RunState::Suspended, RunState::Deciding);
        self.drive(checkpoint, working, Step::Decide).await
    }

    /// Continue a conversation from its last checkpoint without new input,
    /// e.g. after a failed invocation or a process restart.
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn recover(&self, conversation_id: &str) -> Result<RunOutcome, RunError> {
        let _owner = self.claim(conversation_id)?;
        let checkpoint = self.load_existing(conversation_id).await?;
        if checkpoint.state.is_suspended() {
            return Err(RunError::AwaitingInput(conversation_id.to_string()));
        }

        let step = match checkpoint.state.last_message() {
            None => return Err(RunError::UnknownConversation(conversation_id.to_string())),
            Some(last) if last.is_final_answer() => {
                debug!("Conversation already terminal");
                return Ok(RunOutcome::Completed(FinalAnswer {
                    conversation_id: conversation_id.to_string(),
                    content: last.content.clone(),
                    sequence: checkpoint.sequence,
                }));
            }
            Some(last) if last.has_action_requests() => {
                info!(requests = last.action_requests.len(), "Re-running uncommitted batch");
                self.transition(conversation_id, RunState::Init, RunState::Executing);
                Step::Execute(last.action_requests.clone())
            }
            Some(_) => {
                self.transition(conversation_id, RunState::Init, RunState::Deciding);
                Step::Decide
            }
        };

        let working = checkpoint.state.clone();
        self.drive(checkpoint, working, step).await
    }

    async fn drive(
        &self,
        mut checkpoint: Checkpoint,
        mut working: ConversationState,
        mut step: Step,
    ) -> Result<RunOutcome, RunError> {
        let id = checkpoint.conversation_id().to_string();
        let mut decisions = 0usize;
        let mut failures = FailureTracker::new(self.config.max_consecutive_failures);

        loop {
            step = match step {
                Step::Decide => {
                    if decisions >= self.config.max_steps {
                        warn!(max_steps = self.config.max_steps, "Run reached step limit");
                        return Err(RunError::StepLimit {
                            conversation_id: id,
                            limit: self.config.max_steps,
                        });
                    }
                    decisions += 1;
                    debug!(step = decisions, messages = working.len(), "Deciding");

                    let message = self.decision.decide(&working).await?;
                    working.push(message.clone())?;
                    self.commit(&mut checkpoint, &working).await?;
                    self.observer.on_decision(&id, &message);
                    self.transition(&id, RunState::Deciding, RunState::Routing);

                    match route(&message) {
                        Route::Execute => {
                            self.transition(&id, RunState::Routing, RunState::Executing);
                            Step::Execute(message.action_requests)
                        }
                        Route::Terminal => {
                            self.transition(&id, RunState::Routing, RunState::Terminal);
                            info!(steps = decisions, sequence = checkpoint.sequence, "Run completed");
                            return Ok(RunOutcome::Completed(FinalAnswer {
                                conversation_id: id,
                                content: message.content,
                                sequence: checkpoint.sequence,
                            }));
                        }
                    }
                }
                Step::Execute(requests) => {
                    match self.execution.execute(&id, &requests).await {
                        ExecutionOutcome::Completed(messages) => {
                            for message in &messages {
                                working.push(message.clone())?;
                            }
                            self.commit(&mut checkpoint, &working).await?;
                            for message in &messages {
                                self.observer.on_tool_message(&id, message);
                            }
                            self.track_failures(&id, &mut failures, &requests, &messages)?;
                            self.transition(&id, RunState::Executing, RunState::Deciding);
                            Step::Decide
                        }
                        ExecutionOutcome::Suspended {
                            messages,
                            suspension,
                        } => {
                            for message in &messages {
                                working.push(message.clone())?;
                            }
                            working.suspend(suspension.clone());
                            self.commit(&mut checkpoint, &working).await?;
                            for message in &messages {
                                self.observer.on_tool_message(&id, message);
                            }
                            self.track_failures(&id, &mut failures, &requests, &messages)?;
                            self.observer.on_suspended(&id, &suspension.request);
                            self.transition(&id, RunState::Executing, RunState::Suspended);
                            info!(
                                request_id = %suspension.request_id,
                                sequence = checkpoint.sequence,
                                "Run suspended awaiting human input"
                            );
                            return Ok(RunOutcome::Suspended {
                                conversation_id: id,
                                suspension,
                            });
                        }
                    }
                }
            };
        }
    }

    /// Persist `working` as the next checkpoint; `checkpoint` only advances
    /// once the store confirms the write.
    async fn commit(
        &self,
        checkpoint: &mut Checkpoint,
        working: &ConversationState,
    ) -> Result<(), RunError> {
        let next = checkpoint.next(working.clone());
        if let Err(e) = self.store.save(&next).await {
            warn!(error = %e, sequence = next.sequence, "Checkpoint write failed");
            return Err(e.into());
        }
        debug!(sequence = next.sequence, messages = working.len(), "Checkpoint committed");
        *checkpoint = next;
        Ok(())
    }

    fn track_failures(
        &self,
        conversation_id: &str,
        tracker: &mut FailureTracker,
        requests: &[ActionRequest],
        messages: &[Message],
    ) -> Result<(), RunError> {
        for (request, message) in requests.iter().zip(messages) {
            let signature = FailureTracker::signature(&request.tool, &request.arguments);
            if !message.is_error {
                tracker.record_success(&signature);
                continue;
            }
            if let Some(reason) = tracker.record_failure(&signature, &message.content) {
                warn!(
                    tool = %request.tool,
                    failures = tracker.failure_count(&signature),
                    "Aborting due to consecutive failures"
                );
                return Err(RunError::RepeatedToolFailure {
                    conversation_id: conversation_id.to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }

    async fn load_existing(&self, conversation_id: &str) -> Result<Checkpoint, RunError> {
        match self.store.load(conversation_id).await {
            Ok(checkpoint) => Ok(checkpoint),
            Err(StoreError::NotFound(_)) => {
                Err(RunError::UnknownConversation(conversation_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn transition(&self, conversation_id: &str, from: RunState, to: RunState) {
        debug_assert!(from.can_transition_to(to), "illegal transition {} -> {}", from, to);
        debug!(from = %from, to = %to, "Transition");
        self.observer.on_transition(conversation_id, from, to);
    }

    fn claim(&self, conversation_id: &str) -> Result<OwnerGuard<'_>, RunError> {
        match self.active.entry(conversation_id.to_string()) {
            Entry::Occupied(_) => {
                warn!("Conversation already in use");
                Err(RunError::Busy(conversation_id.to_string()))
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(OwnerGuard {
                    active: &self.active,
                    conversation_id: conversation_id.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("active", &self.active.len())
            .finish()
    }
}

/// Marks a conversation as owned by the current invocation
struct OwnerGuard<'a> {
    active: &'a DashMap<String, ()>,
    conversation_id: String,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.conversation_id);
    }
}
