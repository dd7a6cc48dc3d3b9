//! The evaluation protocol.
//!
//! A [`ConversationSession`] wires the submitter to the coordinator, drives a
//! single request/response exchange and owns the transcript. Every failure
//! inside [`ConversationSession::run`] is turned into an
//! [`ErrorEnvelope`]; `run` itself never fails.
//!
//! With [`DelegationMode::FanOut`] the session first asks the four
//! specialists directly and combines their metrics. Any specialist failure
//! falls back to the coordinator exchange.

use uuid::Uuid;

use super::delegation::{aggregate_metrics, fan_out, parse_specialist_reply};
use super::registry::{AgentHandle, Team};
use super::roles::{RoleKind, STRICT_REMINDER, SUBMISSION_PREFIX};
use super::transcript::Transcript;
use crate::config::{DelegationMode, EvaluationSettings};
use crate::error::{EvalError, EvalResult};
use crate::extraction::{extract, reconcile_total, validate, Validated};
use crate::llm::Message;
use crate::result::{ErrorEnvelope, EvaluationOutcome, EvaluationResult};

/// Reply turns the protocol allows.
pub const MAX_REPLY_TURNS: u32 = 1;

/// Directed routing link between two roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleLink {
    pub from: RoleKind,
    pub to: RoleKind,
    /// Only active links carry messages.
    pub active: bool,
}

/// One evaluation conversation.
#[derive(Debug)]
pub struct ConversationSession {
    id: Uuid,
    team: Team,
    coordinator: AgentHandle,
    settings: EvaluationSettings,
    links: Vec<RoleLink>,
    transcript: Transcript,
}

impl ConversationSession {
    /// Creates a session for `team`.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::InvalidTeam` naming the first absent role when the
    /// team lacks the coordinator or the submitter.
    pub fn new(team: Team, settings: EvaluationSettings) -> EvalResult<Self> {
        let coordinator = team
            .get(RoleKind::Coordinator)
            .cloned()
            .ok_or_else(|| EvalError::InvalidTeam(RoleKind::Coordinator.team_key().to_string()))?;
        if !team.contains(RoleKind::Submitter) {
            return Err(EvalError::InvalidTeam(
                RoleKind::Submitter.team_key().to_string(),
            ));
        }

        let links = build_links(&team, settings.delegation);
        let id = Uuid::new_v4();
        for link in &links {
            tracing::debug!(
                session_id = %id,
                from = %link.from,
                to = %link.to,
                active = link.active,
                "Role link"
            );
        }

        Ok(Self {
            id,
            team,
            coordinator,
            settings,
            links,
            transcript: Transcript::new(),
        })
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn links(&self) -> &[RoleLink] {
        &self.links
    }

    /// Whether messages may flow from `from` to `to`.
    pub fn routes(&self, from: RoleKind, to: RoleKind) -> bool {
        self.links
            .iter()
            .any(|l| l.from == from && l.to == to && l.active)
    }

    /// The message the submitter sends for `content`.
    pub fn compose_instruction(content: &str) -> String {
        format!("{}{}", SUBMISSION_PREFIX, content)
    }

    /// Evaluates `content`.
    ///
    /// `max_turns` above one is accepted and capped.
    pub async fn run(&mut self, content: &str, max_turns: u32) -> EvaluationOutcome {
        if max_turns > MAX_REPLY_TURNS {
            tracing::debug!(
                session_id = %self.id,
                requested = max_turns,
                allowed = MAX_REPLY_TURNS,
                "Capping reply turns"
            );
        }

        tracing::info!(
            session_id = %self.id,
            delegation = ?self.settings.delegation,
            content_chars = content.chars().count(),
            "Starting evaluation"
        );

        let instruction = Self::compose_instruction(content);
        self.transcript.push(RoleKind::Submitter, instruction.clone());

        if self.settings.delegation == DelegationMode::FanOut {
            match self.delegate(&instruction).await {
                Ok(result) => return self.succeed(result),
                Err(err) => tracing::warn!(
                    session_id = %self.id,
                    error = %err,
                    "Specialist delegation failed, falling back to coordinator"
                ),
            }
        }

        match self.exchange(&instruction).await {
            Ok(result) => self.succeed(result),
            Err((err, raw)) => {
                tracing::error!(session_id = %self.id, error = %err, "Evaluation failed");
                ErrorEnvelope::from_error(&err, raw).into()
            }
        }
    }

    fn succeed(&self, result: EvaluationResult) -> EvaluationOutcome {
        tracing::info!(
            session_id = %self.id,
            total = result.total().unwrap_or_default(),
            messages = self.transcript.len(),
            "Evaluation complete"
        );
        result.into()
    }

    /// Submitter to coordinator exchange, with optional reminder re-asks.
    ///
    /// Failures carry the last raw reply when one was received.
    async fn exchange(
        &mut self,
        instruction: &str,
    ) -> Result<EvaluationResult, (EvalError, Option<String>)> {
        if !self.routes(RoleKind::Submitter, RoleKind::Coordinator) {
            return Err((
                EvalError::InvalidTeam(RoleKind::Coordinator.team_key().to_string()),
                None,
            ));
        }

        let mut conversation = vec![Message::user(instruction)];
        let mut reminders_left = self.settings.reminder_retries;

        loop {
            let reply = self
                .coordinator
                .complete(&conversation)
                .await
                .map_err(|e| (EvalError::from(e), None))?;
            self.transcript.push(RoleKind::Coordinator, reply.clone());

            match self.finish(&reply) {
                Ok(result) => return Ok(result),
                Err(err) if reminders_left > 0 => {
                    reminders_left -= 1;
                    tracing::warn!(
                        session_id = %self.id,
                        error = %err,
                        reminders_left = reminders_left,
                        "Unusable reply, re-asking with reminder"
                    );
                    conversation.push(Message::assistant(reply));
                    conversation.push(Message::user(STRICT_REMINDER));
                    self.transcript.push(RoleKind::Submitter, STRICT_REMINDER);
                }
                Err(err) => return Err((err, Some(reply))),
            }
        }
    }

    /// Extracts, validates and reconciles the last coordinator reply.
    fn finish(&self, raw: &str) -> EvalResult<EvaluationResult> {
        let result = extract(&self.transcript)?;
        self.check(result, raw)
    }

    fn check(&self, result: EvaluationResult, raw: &str) -> EvalResult<EvaluationResult> {
        let report = validate(result, raw, self.settings.total_tolerance);
        for warning in &report.warnings {
            tracing::warn!(session_id = %self.id, warning = %warning, "Result warning");
        }

        match report.verdict {
            Validated::Valid(result) => Ok(reconcile_total(result, self.settings.total_policy)),
            Validated::Invalid { reason, .. } => Err(EvalError::Validation(reason)),
        }
    }

    /// Fan-out delegation to the specialists.
    async fn delegate(&mut self, instruction: &str) -> EvalResult<EvaluationResult> {
        let specialists: Vec<AgentHandle> = RoleKind::SPECIALISTS
            .iter()
            .filter(|kind| self.routes(RoleKind::Coordinator, **kind))
            .filter_map(|kind| self.team.get(*kind).cloned())
            .collect();

        if let Some(missing) = RoleKind::SPECIALISTS
            .iter()
            .find(|kind| !specialists.iter().any(|h| h.kind() == **kind))
        {
            return Err(EvalError::InvalidTeam(missing.team_key().to_string()));
        }

        let replies = fan_out(
            &specialists,
            instruction,
            self.settings.max_concurrent_specialists,
            self.settings.specialist_timeout(),
        )
        .await;

        let mut metrics = Vec::with_capacity(replies.len());
        let mut combined = Vec::with_capacity(replies.len());
        for reply in replies {
            let text = reply.reply?;
            self.transcript.push(reply.kind, text.clone());
            metrics.push(parse_specialist_reply(reply.kind, &text)?);
            combined.push(text);
        }

        self.check(aggregate_metrics(metrics), &combined.join("\n\n"))
    }
}

/// Submitter and coordinator are linked both ways. Every other member gets a
/// nominal link with the coordinator, active only for specialists under
/// fan-out delegation.
fn build_links(team: &Team, delegation: DelegationMode) -> Vec<RoleLink> {
    let mut links = vec![
        RoleLink {
            from: RoleKind::Submitter,
            to: RoleKind::Coordinator,
            active: true,
        },
        RoleLink {
            from: RoleKind::Coordinator,
            to: RoleKind::Submitter,
            active: true,
        },
    ];

    for kind in team.roles() {
        if matches!(kind, RoleKind::Coordinator | RoleKind::Submitter) {
            continue;
        }
        let active = delegation == DelegationMode::FanOut && kind.is_specialist();
        links.push(RoleLink {
            from: RoleKind::Coordinator,
            to: kind,
            active,
        });
        links.push(RoleLink {
            from: kind,
            to: RoleKind::Coordinator,
            active,
        });
    }

    links
}
