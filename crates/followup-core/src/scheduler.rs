//! Per-order orchestration of the main pass.
//!
//! Every order is evaluated fresh each run. The only state carried between
//! runs is the [`ProcessingLedger`] and the markers projected into the CRM
//! comment.

use crate::config::{Config, TaskTemplate};
use crate::error::{FollowupError, Result};
use crate::filter::{Eligibility, OrderFilter};
use crate::gateway::{CrmGateway, TaskExtractor};
use crate::ledger::{OrderState, ProcessingLedger};
use crate::marker::{append_state_marker, has_state_marker, CommentMarkers};
use crate::time_rules::TimeRules;
use crate::types::{CreatedTask, Order, TaskProposal};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrderOutcome {
    Ineligible { reason: String },
    NoManager,
    /// A previous escalation is still waiting for a human.
    Gated { state: OrderState },
    NothingNew,
    CommentRequested { created: bool },
    FollowUpRequested { created: bool },
    Proposals {
        created: usize,
        skipped: usize,
        failed: usize,
    },
}

impl OrderOutcome {
    pub fn tasks_created(&self) -> usize {
        match self {
            OrderOutcome::CommentRequested { created: true }
            | OrderOutcome::FollowUpRequested { created: true } => 1,
            OrderOutcome::Proposals { created, .. } => *created,
            _ => 0,
        }
    }

    pub fn failures(&self) -> usize {
        match self {
            OrderOutcome::CommentRequested { created: false }
            | OrderOutcome::FollowUpRequested { created: false } => 1,
            OrderOutcome::Proposals { failed, .. } => *failed,
            _ => 0,
        }
    }
}

pub struct TaskScheduler<'a> {
    cfg: &'a Config,
    rules: TimeRules,
    markers: CommentMarkers,
    filter: OrderFilter,
    crm: &'a dyn CrmGateway,
    extractor: &'a dyn TaskExtractor,
}

impl<'a> TaskScheduler<'a> {
    pub fn new(
        cfg: &'a Config,
        crm: &'a dyn CrmGateway,
        extractor: &'a dyn TaskExtractor,
    ) -> Result<Self> {
        Ok(Self {
            cfg,
            rules: TimeRules::new(&cfg.hours)?,
            markers: CommentMarkers::new(&cfg.markers),
            filter: OrderFilter::new(&cfg.filter),
            crm,
            extractor,
        })
    }

    pub fn rules(&self) -> &TimeRules {
        &self.rules
    }

    pub fn process(
        &self,
        order: &Order,
        ledger: &mut ProcessingLedger,
        now: NaiveDateTime,
    ) -> OrderOutcome {
        let id = order.id;
        let today = now.date();

        let eligibility = self.filter.check(order);
        if eligibility != Eligibility::Eligible {
            debug!(order_id = id, reason = %eligibility, "skipped");
            return OrderOutcome::Ineligible {
                reason: eligibility.to_string(),
            };
        }
        if order.manager_id.is_none() {
            info!(order_id = id, "no manager assigned, skipped");
            return OrderOutcome::NoManager;
        }

        let comment = order.manager_comment.as_str();

        if !ledger.contains(id) {
            let imported = self.markers.state_in(comment);
            if imported != OrderState::Clean {
                debug!(order_id = id, state = %imported, "state imported from comment marker");
                ledger.set_state(id, imported, today);
                ledger.note_marker_written(id);
            }
        }

        let tail = self
            .markers
            .extract_unprocessed_tail(comment, self.cfg.comment_lines, |line| {
                ledger.is_handled(id, &self.markers.line_hash(line))
            });

        let state = ledger.state(id);
        if state != OrderState::Clean {
            let marker_removed = ledger.marker_written(id)
                && self
                    .markers
                    .state_marker(state)
                    .is_some_and(|m| !has_state_marker(comment, m));
            if marker_removed {
                info!(order_id = id, previous = %state, "state marker removed from comment, state reset");
                ledger.set_state(id, OrderState::Clean, today);
            } else if tail.is_empty() {
                debug!(order_id = id, %state, "waiting for a human response");
                return OrderOutcome::Gated { state };
            } else {
                info!(order_id = id, previous = %state, "new comment text after escalation, state reset");
                ledger.set_state(id, OrderState::Clean, today);
            }
        }

        if comment.trim().is_empty() {
            let created = self.escalate(
                order,
                ledger,
                &self.cfg.escalation.fill_comment,
                self.rules.escalation_anchor(now),
                OrderState::CommentRequested,
                now,
            );
            return OrderOutcome::CommentRequested { created };
        }

        if tail.is_empty() {
            debug!(order_id = id, "no unprocessed comment lines");
            return OrderOutcome::NothingNew;
        }

        let proposals = self.extractor.extract(&tail, today);
        if proposals.is_empty() {
            info!(order_id = id, "no task found in comment, requesting follow-up date");
            let created = self.escalate(
                order,
                ledger,
                &self.cfg.escalation.schedule_follow_up,
                self.rules.next_opening(now),
                OrderState::FollowUpRequested,
                now,
            );
            if created {
                for line in tail.lines() {
                    ledger.record_handled(id, self.markers.line_hash(line), today);
                }
            }
            return OrderOutcome::FollowUpRequested { created };
        }

        self.apply_proposals(order, ledger, &tail, proposals, now)
    }

    fn apply_proposals(
        &self,
        order: &Order,
        ledger: &mut ProcessingLedger,
        tail: &str,
        proposals: Vec<TaskProposal>,
        now: NaiveDateTime,
    ) -> OrderOutcome {
        let id = order.id;
        let today = now.date();
        let fallback_line = tail.lines().last().unwrap_or_default();
        let mut working = order.manager_comment.clone();
        let (mut created, mut skipped, mut failed) = (0, 0, 0);

        for proposal in proposals {
            if !proposal.is_well_formed() {
                warn!(order_id = id, ?proposal, "malformed proposal skipped");
                skipped += 1;
                continue;
            }
            let due = match self.rules.correct_due_str(&proposal.due, now) {
                Ok(due) => due,
                Err(e @ FollowupError::PastDate { .. }) => {
                    info!(order_id = id, error = %e, "proposal in the past skipped");
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(order_id = id, error = %e, "proposal with unusable date skipped");
                    skipped += 1;
                    continue;
                }
            };

            let source = proposal
                .source_line
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(fallback_line);
            let Some(task) =
                CreatedTask::for_order(order, &proposal.action_text, &proposal.note, due)
            else {
                skipped += 1;
                continue;
            };

            match self.crm.create_task(&task) {
                Ok(task_id) => {
                    info!(order_id = id, task_id, due = %task.due_string(), text = %task.action_text, "task created");
                    created += 1;
                }
                Err(e) => {
                    warn!(order_id = id, error = %e, "task creation failed");
                    failed += 1;
                    continue;
                }
            }

            let line = self
                .markers
                .matching_line(&working, source)
                .unwrap_or_else(|| source.trim().to_string());
            ledger.record_handled(id, self.markers.line_hash(&line), today);

            match self.markers.mark_line(&working, source) {
                Some(updated) => match self.crm.update_order_comment(id, &updated) {
                    Ok(()) => working = updated,
                    Err(e) => warn!(order_id = id, error = %e, "comment marker not written"),
                },
                None => debug!(order_id = id, source = %source, "source line not found, marker skipped"),
            }
        }

        OrderOutcome::Proposals {
            created,
            skipped,
            failed,
        }
    }

    /// Create an escalation task and, on success, move the order into
    /// `state` and project the state marker into the comment.
    fn escalate(
        &self,
        order: &Order,
        ledger: &mut ProcessingLedger,
        template: &TaskTemplate,
        due: NaiveDateTime,
        state: OrderState,
        now: NaiveDateTime,
    ) -> bool {
        let id = order.id;
        let (text, note) = template.render(&[]);
        let Some(task) = CreatedTask::for_order(order, text, note, due) else {
            return false;
        };
        match self.crm.create_task(&task) {
            Ok(task_id) => {
                info!(order_id = id, task_id, %state, due = %task.due_string(), "escalation task created");
            }
            Err(e) => {
                warn!(order_id = id, %state, error = %e, "escalation task failed");
                return false;
            }
        }

        ledger.set_state(id, state, now.date());
        if let Some(marker) = self.markers.state_marker(state) {
            let updated = append_state_marker(&order.manager_comment, marker, now);
            match self.crm.update_order_comment(id, &updated) {
                Ok(()) => ledger.note_marker_written(id),
                Err(e) => warn!(order_id = id, error = %e, "state marker not written"),
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
