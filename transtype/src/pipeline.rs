use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dom::{NodeId, Page};
use crate::input::injector::{InsertError, Insertion, insert_candidate};
use crate::input::segment::extract_segment;
use crate::input::shortcut::{EventDisposition, KeyEvent, Platform, is_accept_shortcut};
use crate::input::{ActiveField, FieldKind, resolve_editable_target};
use crate::metrics::AssistantMetrics;
use crate::network::TranslateError;
use crate::overlay::{
    CONTENT_CHANGED_MESSAGE, IDLE_MESSAGE, INSERT_FAILED_MESSAGE, INSERTED_MESSAGE, Overlay,
    TRANSLATING_MESSAGE,
};
use crate::state::{Candidate, FieldSession, InFlightRequest, Phase};

pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ArmDebounce { token: u64, delay: Duration },
    CancelDebounce,
    Translate { seq: u64, text: String },
}

#[derive(Debug)]
pub struct Assistant {
    platform: Platform,
    session: FieldSession,
    latest_seq: u64,
    next_debounce_token: u64,
    overlay: Overlay,
    metrics: AssistantMetrics,
}

impl Assistant {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            session: FieldSession::default(),
            latest_seq: 0,
            next_debounce_token: 0,
            overlay: Overlay::new(),
            metrics: AssistantMetrics::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn active_field(&self) -> Option<ActiveField> {
        self.session.active
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        self.session.candidate.as_ref()
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn metrics(&self) -> &AssistantMetrics {
        &self.metrics
    }

    pub fn handle_focus_in(&mut self, page: &Page, target: NodeId) -> Vec<Command> {
        let Some(field) = resolve_editable_target(&page.document, target) else {
            return self.deactivate();
        };

        debug!(field = ?field.node, kind = ?field.kind, "field activated");
        self.session.activate(field);
        self.overlay.set_status(IDLE_MESSAGE);
        self.overlay.show(page, field);
        vec![Command::CancelDebounce]
    }

    pub fn handle_focus_out(&mut self, page: &Page, target: NodeId) -> Vec<Command> {
        let leaving = resolve_editable_target(&page.document, target);
        match (leaving, self.session.active) {
            (Some(leaving), Some(active)) if leaving.node == active.node => self.deactivate(),
            _ => Vec::new(),
        }
    }

    pub fn handle_navigation(&mut self) -> Vec<Command> {
        self.deactivate()
    }

    fn deactivate(&mut self) -> Vec<Command> {
        if let Some(field) = self.session.active {
            debug!(field = ?field.node, "field deactivated");
        }
        self.session.clear();
        self.overlay.hide();
        vec![Command::CancelDebounce]
    }

    pub fn handle_input(&mut self, page: &Page, target: NodeId) -> Vec<Command> {
        let Some(active) = self.session.active else {
            return Vec::new();
        };
        let edited = resolve_editable_target(&page.document, target);
        if edited.map(|field| field.node) != Some(active.node) {
            return Vec::new();
        }

        if self.session.in_flight.is_some() {
            debug!(seq = self.latest_seq, "edit invalidated in-flight request");
        }
        self.next_debounce_token += 1;
        let token = self.next_debounce_token;
        self.session.mark_edited(token);
        self.overlay.reposition(page, active);
        vec![Command::ArmDebounce {
            token,
            delay: DEBOUNCE_INTERVAL,
        }]
    }

    pub fn handle_debounce_elapsed(&mut self, page: &Page, token: u64) -> Vec<Command> {
        if self.session.debounce_token != Some(token) {
            return Vec::new();
        }
        self.session.debounce_token = None;
        let Some(field) = self.session.active else {
            return Vec::new();
        };

        let Some(segment) = extract_segment(&page.document, field) else {
            self.session.settle_idle();
            self.overlay.set_status(IDLE_MESSAGE);
            self.overlay.reposition(page, field);
            return Vec::new();
        };

        self.latest_seq += 1;
        let seq = self.latest_seq;
        let text = segment.text().to_string();
        info!(seq, chars = text.chars().count(), "requesting translation");

        self.session.in_flight = Some(InFlightRequest {
            seq,
            segment,
            started_at: Instant::now(),
        });
        self.session.phase = Phase::Requesting;
        self.metrics.record_request_sent();
        self.overlay.set_status(TRANSLATING_MESSAGE);
        self.overlay.reposition(page, field);
        vec![Command::Translate { seq, text }]
    }

    /// Applies a finished request. Anything but the latest outstanding
    /// request is dropped without touching the field or the overlay.
    pub fn handle_translation(
        &mut self,
        page: &Page,
        seq: u64,
        result: Result<String, TranslateError>,
    ) {
        let is_current = seq == self.latest_seq
            && self
                .session
                .in_flight
                .as_ref()
                .is_some_and(|request| request.seq == seq);
        let (Some(field), true) = (self.session.active, is_current) else {
            debug!(seq, latest = self.latest_seq, "dropping stale translation response");
            self.metrics.record_stale_drop();
            return;
        };
        let Some(request) = self.session.in_flight.take() else {
            return;
        };
        let latency_ms = request.started_at.elapsed().as_millis() as u64;

        match result {
            Ok(translation) => {
                info!(seq, latency_ms, "translation ready");
                self.metrics.record_response(latency_ms, true);
                self.overlay
                    .set_suggestion(translation.as_str(), self.platform.accept_key_label());
                self.session.candidate = Some(Candidate::new(request.segment, translation));
                self.session.phase = Phase::Suggested;
            }
            Err(err) => {
                warn!(seq, code = err.code().as_str(), "translation failed: {err}");
                self.metrics.record_response(latency_ms, false);
                self.session.candidate = None;
                self.session.phase = self.resting_phase();
                self.overlay.set_status(err.status_message());
            }
        }
        self.overlay.reposition(page, field);
    }

    pub fn handle_keydown(&mut self, page: &mut Page, event: &KeyEvent) -> EventDisposition {
        if self.session.active.is_none() || !is_accept_shortcut(self.platform, event) {
            return EventDisposition::Continue;
        }
        if self.session.candidate.is_none() {
            return EventDisposition::Continue;
        }
        self.accept(page);
        EventDisposition::PreventDefault
    }

    pub fn handle_overlay_pointer_down(&self) -> EventDisposition {
        self.overlay.handle_pointer_down()
    }

    /// Inserts the pending candidate, consuming it. A second call without a
    /// new suggestion does nothing.
    pub fn accept(&mut self, page: &mut Page) -> Option<Insertion> {
        let field = self.session.active?;
        let candidate = self.session.candidate.take()?;
        self.session.phase = self.resting_phase();

        let outcome = match insert_candidate(&mut page.document, field, &candidate) {
            Ok(insertion) => {
                info!(
                    field = ?field.node,
                    added_space = insertion.added_space,
                    "suggestion inserted"
                );
                self.metrics.record_insertion();
                self.overlay.set_status(INSERTED_MESSAGE);
                Some(insertion)
            }
            Err(InsertError::ContentChanged) => {
                warn!(field = ?field.node, "suggestion not inserted: field content changed");
                self.metrics.record_reconciliation_failure();
                self.overlay.set_status(CONTENT_CHANGED_MESSAGE);
                None
            }
            Err(err) => {
                warn!(field = ?field.node, "suggestion not inserted: {err}");
                self.overlay.set_status(INSERT_FAILED_MESSAGE);
                None
            }
        };
        self.overlay.reposition(page, field);
        outcome
    }

    pub fn handle_selection_change(&mut self, page: &Page) {
        let Some(field) = self.session.active else {
            return;
        };
        if field.kind != FieldKind::Rich {
            return;
        }
        let anchored_inside = page
            .document
            .selection()
            .is_some_and(|selection| page.document.contains(field.node, selection.start.node));
        if anchored_inside {
            self.overlay.reposition(page, field);
        }
    }

    pub fn handle_viewport_change(&mut self, page: &Page) {
        if let Some(field) = self.session.active {
            self.overlay.reposition(page, field);
        }
    }

    fn resting_phase(&self) -> Phase {
        if self.session.in_flight.is_some() {
            Phase::Requesting
        } else if self.session.debounce_token.is_some() {
            Phase::Pending
        } else {
            Phase::Idle
        }
    }
}
