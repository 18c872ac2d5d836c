use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::Clock;
use crate::config::WaitThresholds;
use crate::flow::{FlowStage, FlowStateStore, PatientFlowState};
use crate::queue::types::{
    FlowListFilter, FlowStateView, QueueBuckets, QueueEntry, QueueProjection, QueueSummary,
    WaitStatus,
};

/// Read-only projection over the flow store for a given day. Never writes;
/// dashboards poll it.
pub struct QueueProjector {
    store: Arc<FlowStateStore>,
    clock: Arc<dyn Clock>,
    thresholds: WaitThresholds,
}

impl QueueProjector {
    pub fn new(
        store: Arc<FlowStateStore>,
        clock: Arc<dyn Clock>,
        thresholds: WaitThresholds,
    ) -> Self {
        Self {
            store,
            clock,
            thresholds,
        }
    }

    /// Minutes a patient has been waiting at their current point of care.
    /// Falls back to check-in time when no wait segment is open, and to zero
    /// when the record carries neither timestamp.
    pub fn wait_minutes(state: &PatientFlowState, now: DateTime<Utc>) -> i64 {
        let since = state
            .current_wait_started_at
            .or(state.checked_in_at)
            .unwrap_or(now);
        (now - since).num_minutes().max(0)
    }

    pub fn wait_status(&self, wait_minutes: i64) -> WaitStatus {
        if wait_minutes < self.thresholds.warning_minutes {
            WaitStatus::Normal
        } else if wait_minutes <= self.thresholds.critical_minutes {
            WaitStatus::Warning
        } else {
            WaitStatus::Critical
        }
    }

    /// The live queue for a service day: ordered entries, stage buckets and
    /// summary counts. `stages` narrows the view; by default every queued
    /// stage (CheckedIn/Waiting/Called) is included.
    pub async fn list_queue(
        &self,
        date: Option<NaiveDate>,
        stages: Option<&[FlowStage]>,
    ) -> QueueProjection {
        let now = self.clock.now();
        let day = date.unwrap_or_else(|| now.date_naive());

        let mut entries: Vec<QueueEntry> = self
            .store
            .snapshot()
            .await
            .into_iter()
            .filter(|state| state.scheduled_at.date_naive() == day)
            .filter(|state| state.stage.is_queued())
            .filter(|state| {
                stages
                    .map(|wanted| wanted.contains(&state.stage))
                    .unwrap_or(true)
            })
            .map(|state| self.entry(&state, now))
            .collect();

        Self::order(&mut entries);

        let mut grouped = QueueBuckets::default();
        for entry in &entries {
            match entry.stage {
                FlowStage::CheckedIn => grouped.checked_in.push(entry.clone()),
                FlowStage::Waiting => grouped.waiting.push(entry.clone()),
                FlowStage::Called => grouped.called.push(entry.clone()),
                // is_queued() filtered everything else out already.
                _ => {}
            }
        }

        let summary = Self::summarize(&entries, &grouped);
        QueueProjection {
            queue: entries,
            grouped,
            summary,
        }
    }

    /// The day's flow states, optionally narrowed by stage/provider/chair,
    /// each with its computed live wait.
    pub async fn list_flow(&self, filter: FlowListFilter) -> Vec<FlowStateView> {
        let now = self.clock.now();
        let day = filter.date.unwrap_or_else(|| now.date_naive());

        let mut states: Vec<PatientFlowState> = self
            .store
            .snapshot()
            .await
            .into_iter()
            .filter(|state| state.scheduled_at.date_naive() == day)
            .filter(|state| filter.stage.map_or(true, |s| state.stage == s))
            .filter(|state| filter.provider_id.map_or(true, |p| state.provider_id == p))
            .filter(|state| filter.chair_id.map_or(true, |c| state.chair_id == Some(c)))
            .collect();
        states.sort_by_key(|state| (state.scheduled_at, state.id));

        states
            .into_iter()
            .map(|state| {
                let current_wait_minutes = state
                    .stage
                    .is_queued()
                    .then(|| Self::wait_minutes(&state, now));
                FlowStateView {
                    state,
                    current_wait_minutes,
                }
            })
            .collect()
    }

    fn entry(&self, state: &PatientFlowState, now: DateTime<Utc>) -> QueueEntry {
        let wait_minutes = Self::wait_minutes(state, now);
        QueueEntry {
            flow_state_id: state.id,
            appointment_id: state.appointment_id,
            patient_id: state.patient_id,
            provider_id: state.provider_id,
            stage: state.stage,
            priority: state.priority,
            checked_in_at: state.checked_in_at,
            wait_minutes,
            wait_status: self.wait_status(wait_minutes),
        }
    }

    /// Priority tier first, FIFO by check-in within a tier, record id as the
    /// final tiebreak so equal keys order deterministically.
    fn order(entries: &mut [QueueEntry]) {
        entries.sort_by_key(|entry| {
            (
                Reverse(entry.priority),
                entry.checked_in_at,
                entry.flow_state_id,
            )
        });
    }

    fn summarize(entries: &[QueueEntry], grouped: &QueueBuckets) -> QueueSummary {
        let total = entries.len();
        let longest_wait_minutes = entries.iter().map(|e| e.wait_minutes).max().unwrap_or(0);
        let average_wait_minutes = if total == 0 {
            0.0
        } else {
            entries.iter().map(|e| e.wait_minutes).sum::<i64>() as f64 / total as f64
        };
        QueueSummary {
            total,
            checked_in_count: grouped.checked_in.len(),
            waiting_count: grouped.waiting.len(),
            called_count: grouped.called.len(),
            average_wait_minutes,
            longest_wait_minutes,
            urgent_count: entries
                .iter()
                .filter(|e| e.priority == crate::flow::Priority::Urgent)
                .count(),
            high_priority_count: entries
                .iter()
                .filter(|e| e.priority == crate::flow::Priority::High)
                .count(),
        }
    }
}
