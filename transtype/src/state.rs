use std::time::Instant;

use serde::Serialize;

use crate::input::ActiveField;
use crate::input::segment::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Pending,
    Requesting,
    Suggested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub segment: Segment,
    pub translation: String,
}

impl Candidate {
    pub fn new(segment: Segment, translation: impl Into<String>) -> Self {
        Self {
            segment,
            translation: translation.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub seq: u64,
    pub segment: Segment,
    pub started_at: Instant,
}

#[derive(Debug, Default)]
pub struct FieldSession {
    pub active: Option<ActiveField>,
    pub phase: Phase,
    pub candidate: Option<Candidate>,
    pub debounce_token: Option<u64>,
    pub in_flight: Option<InFlightRequest>,
}

impl FieldSession {
    pub fn activate(&mut self, field: ActiveField) {
        self.reset();
        self.active = Some(field);
    }

    pub fn clear(&mut self) {
        self.reset();
        self.active = None;
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.candidate = None;
        self.debounce_token = None;
        self.in_flight = None;
    }

    /// An edit supersedes whatever request was outstanding.
    pub fn mark_edited(&mut self, token: u64) {
        self.debounce_token = Some(token);
        self.in_flight = None;
        self.phase = Phase::Pending;
    }

    pub fn settle_idle(&mut self) {
        self.phase = Phase::Idle;
        self.candidate = None;
        self.in_flight = None;
    }
}
