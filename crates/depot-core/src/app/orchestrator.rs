//! The orchestration state machine.
//!
//! Each turn runs the node graph reasoning → consequence evaluation →
//! confirmation / dispatch until it suspends: turn complete, awaiting a
//! user yes/no, or failed. A dangerous capability is dispatched only when
//! its risk was classified Low this turn, or when the turn began awaiting
//! confirmation and the user's reply matched the affirmative vocabulary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument, warn};

use crate::api::ReasoningProvider;
use crate::app::consequence::{ConsequenceEvaluator, RiskLevel};
use crate::app::conversation::Message;
use crate::app::prompts;
use crate::error::{Error, Result};
use crate::session::{CheckpointStore, ThreadId, ThreadState};
use crate::tools::CapabilityRegistry;
use depot_tools::result::InterlockResult;
use depot_tools::{ToolCall, ToolResult};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Ceiling on gateway invocations per turn; the dispatch↔reasoning loop
    /// fails the turn when it would exceed this.
    pub max_reasoning_rounds: u32,
    /// Argument name carrying the targeted entity id on the dangerous call.
    pub dangerous_entity_param: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_reasoning_rounds: 8,
            dangerous_entity_param: crate::tools::transit::REMOVE_VEHICLE_ENTITY_PARAM.to_string(),
        }
    }
}

/// What a completed turn hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub awaiting_confirmation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnPhase {
    Reasoning,
    EvaluatingConsequence,
    Confirming,
    DispatchingTools,
    End,
}

pub struct Orchestrator {
    gateway: Arc<dyn ReasoningProvider>,
    registry: CapabilityRegistry,
    evaluator: ConsequenceEvaluator,
    checkpoints: Arc<dyn CheckpointStore>,
    config: OrchestratorConfig,
    thread_locks: Mutex<HashMap<ThreadId, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn ReasoningProvider>,
        registry: CapabilityRegistry,
        evaluator: ConsequenceEvaluator,
        checkpoints: Arc<dyn CheckpointStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gateway,
            registry,
            evaluator,
            checkpoints,
            config,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Process one user turn for a thread.
    ///
    /// Turns for the same thread are serialized on a per-thread lock held
    /// until the final save; turns for different threads run concurrently.
    /// On any failure the loaded state is discarded unsaved, so a retried
    /// turn starts from the last committed checkpoint.
    #[instrument(skip(self, user_text, context_tag), fields(thread_id = %thread_id))]
    pub async fn submit_turn(
        &self,
        thread_id: ThreadId,
        user_text: &str,
        context_tag: &str,
    ) -> Result<TurnOutcome> {
        let lock = self.thread_lock(&thread_id);
        let _guard = lock.lock().await;

        let mut state = match self.checkpoints.load(&thread_id).await? {
            Some(state) => state,
            None => {
                debug!(target: "orchestrator", "Starting new thread");
                ThreadState::new(thread_id.clone())
            }
        };
        state.context_tag = context_tag.to_string();

        let outcome = self.run_turn(&mut state, user_text).await?;
        self.checkpoints.save(&state).await?;
        Ok(outcome)
    }

    fn thread_lock(&self, thread_id: &ThreadId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.thread_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(thread_id.clone()).or_default().clone()
    }

    async fn run_turn(&self, state: &mut ThreadState, user_text: &str) -> Result<TurnOutcome> {
        let mut rounds: u32 = 0;

        let mut phase = if state.awaiting_confirmation {
            self.resume_from_confirmation(state, user_text)?
        } else {
            if state.messages.is_empty() {
                state.push(Message::system(prompts::SYSTEM_PROMPT));
            }
            state.push(Message::user(user_text));
            TurnPhase::Reasoning
        };

        while phase != TurnPhase::End {
            phase = match phase {
                TurnPhase::Reasoning => self.reasoning_step(state, &mut rounds).await?,
                TurnPhase::EvaluatingConsequence => self.evaluate_consequence_step(state).await?,
                TurnPhase::Confirming => Self::confirm_step(state),
                TurnPhase::DispatchingTools => self.dispatch_step(state).await?,
                TurnPhase::End => unreachable!("End is the loop exit"),
            };
        }

        Ok(TurnOutcome {
            reply: state.last_assistant_text().unwrap_or_default(),
            awaiting_confirmation: state.awaiting_confirmation,
        })
    }

    /// The turn began suspended on a yes/no. An affirmative reply turns into
    /// a one-shot system instruction and re-enters reasoning; anything else
    /// cancels the pending action outright. Consequence evaluation is never
    /// re-run here: the instruction is trusted for exactly one dispatch.
    fn resume_from_confirmation(
        &self,
        state: &mut ThreadState,
        user_text: &str,
    ) -> Result<TurnPhase> {
        state.push(Message::user(user_text));

        if prompts::is_affirmative(user_text) {
            let Some(target) = state.target_entity_id.clone() else {
                return Err(Error::InvalidState(
                    "awaiting confirmation without a target entity".to_string(),
                ));
            };
            info!(target: "orchestrator", entity_id = %target, "User confirmed pending action");
            state.push(Message::system(prompts::confirmation_instruction(&target)));
            state.awaiting_confirmation = false;
            state.consequence_risk = None;
            state.consequence_message = None;
            Ok(TurnPhase::Reasoning)
        } else {
            info!(target: "orchestrator", "User declined pending action");
            state.push(Message::assistant(prompts::CANCELLED_REPLY, Vec::new()));
            state.awaiting_confirmation = false;
            state.target_entity_id = None;
            state.consequence_risk = None;
            state.consequence_message = None;
            Ok(TurnPhase::End)
        }
    }

    async fn reasoning_step(&self, state: &mut ThreadState, rounds: &mut u32) -> Result<TurnPhase> {
        *rounds += 1;
        if *rounds > self.config.max_reasoning_rounds {
            warn!(target: "orchestrator", rounds = *rounds, "Reasoning round ceiling exceeded");
            return Err(Error::LoopCeilingExceeded {
                rounds: self.config.max_reasoning_rounds,
            });
        }

        let decision = self
            .gateway
            .decide(&state.messages, &self.registry.schemas())
            .await?;

        // A confirmation instruction directly before this assistant message
        // means the user approved the dangerous call this very turn.
        let just_confirmed = state
            .last_message()
            .is_some_and(prompts::is_confirmation_instruction);

        let has_dangerous = decision
            .tool_calls
            .iter()
            .any(|call| self.registry.is_dangerous(&call.name));

        state.push(Message::assistant(
            decision.content.clone(),
            decision.tool_calls.clone(),
        ));

        if decision.tool_calls.is_empty() {
            return Ok(TurnPhase::End);
        }

        if has_dangerous && !just_confirmed {
            Ok(TurnPhase::EvaluatingConsequence)
        } else {
            if has_dangerous {
                debug!(target: "orchestrator", "Dangerous call just confirmed; skipping re-evaluation");
            }
            Ok(TurnPhase::DispatchingTools)
        }
    }

    /// Classify the pending dangerous call. Low risk falls through to
    /// dispatch; high risk records the interlock pause as the call's
    /// tool-result (so the call/result pairing holds even though nothing ran)
    /// and moves to the confirmation gate.
    async fn evaluate_consequence_step(&self, state: &mut ThreadState) -> Result<TurnPhase> {
        let Some(call) = state.last_message().and_then(|message| {
            message
                .tool_calls()
                .iter()
                .find(|call| self.registry.is_dangerous(&call.name))
                .cloned()
        }) else {
            return Err(Error::InvalidState(
                "consequence evaluation without a dangerous call".to_string(),
            ));
        };
        let call_id = call.id.clone();

        let entity_id = call
            .parameters
            .get(&self.config.dangerous_entity_param)
            .and_then(|v| v.as_str())
            .map(str::to_string);
        state.target_entity_id = entity_id.clone();

        // No entity id on the call: nothing to look up, let the handler
        // surface the argument problem.
        let Some(entity_id) = entity_id else {
            state.consequence_risk = Some(RiskLevel::Low);
            return Ok(TurnPhase::DispatchingTools);
        };

        info!(target: "orchestrator", entity_id = %entity_id, "Checking consequences");
        let assessment = self.evaluator.assess(&entity_id).await;
        state.consequence_risk = Some(assessment.risk);

        match assessment.risk {
            RiskLevel::Low => Ok(TurnPhase::DispatchingTools),
            RiskLevel::High => {
                state.consequence_message = assessment.warning;
                state.push(Message::tool(
                    call_id,
                    ToolResult::Interlock(InterlockResult {
                        trip_id: entity_id,
                        booking_percentage: assessment.metric.unwrap_or_default(),
                    }),
                ));
                Ok(TurnPhase::Confirming)
            }
        }
    }

    fn confirm_step(state: &mut ThreadState) -> TurnPhase {
        let warning = state
            .consequence_message
            .clone()
            .unwrap_or_else(|| "This action needs confirmation. Proceed?".to_string());
        state.push(Message::assistant(warning, Vec::new()));
        state.awaiting_confirmation = true;
        TurnPhase::End
    }

    /// Execute every call on the latest assistant message in order, then loop
    /// back to reasoning so the gateway can react to the results. Handler
    /// failures become error results in the conversation, not turn failures.
    async fn dispatch_step(&self, state: &mut ThreadState) -> Result<TurnPhase> {
        let calls: Vec<ToolCall> = state
            .last_message()
            .map(|m| m.tool_calls().to_vec())
            .unwrap_or_default();

        for call in calls {
            info!(target: "orchestrator", name = %call.name, call_id = %call.id, "Executing capability");
            let result = match self.registry.invoke(&call).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(target: "orchestrator", name = %call.name, error = %e, "Capability failed");
                    ToolResult::Error(e)
                }
            };
            state.push(Message::tool(call.id, result));
        }

        Ok(TurnPhase::Reasoning)
    }
}
