use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// Store-assigned record identifier. Monotonic within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pipeline stage a record has reached.
///
/// Transitions form a DAG:
///
/// ```text
/// RECEIVED ──► TRANSFORMED ──► FORWARDED
///     │             │
///     └──► ERROR ◄──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Received,
    Transformed,
    Forwarded,
    Error,
}

impl RecordStatus {
    /// Whether `next` is reachable from `self` in one step.
    /// Re-asserting the current status is allowed.
    pub fn can_advance_to(self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        self == next
            || matches!(
                (self, next),
                (Received, Transformed) | (Received, Error) | (Transformed, Forwarded) | (Transformed, Error)
            )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Received => "RECEIVED",
            RecordStatus::Transformed => "TRANSFORMED",
            RecordStatus::Forwarded => "FORWARDED",
            RecordStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "received" => Ok(RecordStatus::Received),
            "transformed" => Ok(RecordStatus::Transformed),
            "forwarded" => Ok(RecordStatus::Forwarded),
            "error" => Ok(RecordStatus::Error),
            other => Err(format!("unknown record status '{other}'")),
        }
    }
}

/// One inbound datagram and its progress through the pipeline.
///
/// Arrival metadata and the raw payload are fixed at construction. Status
/// only moves forward (see [`RecordStatus::can_advance_to`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: Option<RecordId>,
    received_at: DateTime<Utc>,
    source: SocketAddr,
    raw_payload: String,
    status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rendered_payload: Option<String>,
}

impl Record {
    pub fn received(source: SocketAddr, raw_payload: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            received_at,
            source,
            raw_payload: raw_payload.into(),
            status: RecordStatus::Received,
            rendered_payload: None,
        }
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    /// Attach the store-assigned id. Ids are assigned once.
    pub fn assign_id(&mut self, id: RecordId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn source(&self) -> SocketAddr {
        self.source
    }

    pub fn source_address(&self) -> IpAddr {
        self.source.ip()
    }

    pub fn source_port(&self) -> u16 {
        self.source.port()
    }

    pub fn raw_payload(&self) -> &str {
        &self.raw_payload
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn rendered_payload(&self) -> Option<&str> {
        self.rendered_payload.as_deref()
    }

    /// Move to `next`, rejecting any backwards or skipping transition.
    pub fn advance(&mut self, next: RecordStatus) -> Result<(), StatusError> {
        if !self.status.can_advance_to(next) {
            return Err(StatusError { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    /// Store a successful transformation. A fresh record moves to
    /// TRANSFORMED; a record past that stage keeps its status and only
    /// has its rendered payload overwritten.
    pub fn render(&mut self, payload: impl Into<String>) -> Result<(), StatusError> {
        if self.status == RecordStatus::Received {
            self.advance(RecordStatus::Transformed)?;
        } else if self.rendered_payload.is_none() {
            // ERROR reached straight from RECEIVED never carries output.
            return Err(StatusError { from: self.status, to: RecordStatus::Transformed });
        }
        self.rendered_payload = Some(payload.into());
        Ok(())
    }

    /// Apply a persisted status update: advance, then overwrite the
    /// rendered payload when one is supplied.
    pub fn apply_update(&mut self, status: RecordStatus, rendered: Option<&str>) -> Result<(), StatusError> {
        match rendered {
            Some(payload) if status == RecordStatus::Transformed => self.render(payload),
            Some(payload) => {
                self.advance(status)?;
                self.rendered_payload = Some(payload.to_string());
                Ok(())
            }
            None => self.advance(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use RecordStatus::*;

    fn record() -> Record {
        Record::received("10.0.0.7:5123".parse().unwrap(), "<event/>", Utc::now())
    }

    #[rstest]
    #[case(Received, Transformed, true)]
    #[case(Received, Error, true)]
    #[case(Transformed, Forwarded, true)]
    #[case(Transformed, Error, true)]
    #[case(Received, Forwarded, false)]
    #[case(Transformed, Received, false)]
    #[case(Forwarded, Received, false)]
    #[case(Forwarded, Error, false)]
    #[case(Error, Received, false)]
    #[case(Error, Transformed, false)]
    #[case(Forwarded, Forwarded, true)]
    fn transition_table(#[case] from: RecordStatus, #[case] to: RecordStatus, #[case] allowed: bool) {
        assert_eq!(from.can_advance_to(to), allowed);
    }

    #[test]
    fn nothing_returns_to_received() {
        for from in [Transformed, Forwarded, Error] {
            assert!(!from.can_advance_to(Received), "{from} -> RECEIVED");
        }
    }

    #[test]
    fn render_moves_to_transformed() {
        let mut r = record();
        r.render("<simdis/>").unwrap();
        assert_eq!(r.status(), Transformed);
        assert_eq!(r.rendered_payload(), Some("<simdis/>"));

        r.advance(Forwarded).unwrap();
        r.render("{}").unwrap();
        assert_eq!(r.status(), Forwarded);
        assert_eq!(r.rendered_payload(), Some("{}"));
    }

    #[test]
    fn transport_error_keeps_rendered_payload() {
        let mut r = record();
        r.render("x").unwrap();
        r.advance(Error).unwrap();
        assert_eq!(r.rendered_payload(), Some("x"));
    }

    #[test]
    fn transform_error_record_cannot_be_rendered() {
        let mut r = record();
        r.advance(Error).unwrap();
        let err = r.render("x").unwrap_err();
        assert_eq!(err, StatusError { from: Error, to: Transformed });
        assert_eq!(r.rendered_payload(), None);
    }

    #[test]
    fn id_is_assigned_once() {
        let mut r = record();
        r.assign_id(RecordId(3));
        r.assign_id(RecordId(9));
        assert_eq!(r.id(), Some(RecordId(3)));
    }

    #[test]
    fn source_accessors() {
        let r = record();
        assert_eq!(r.source_address().to_string(), "10.0.0.7");
        assert_eq!(r.source_port(), 5123);
    }

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Forwarded).unwrap(), "\"FORWARDED\"");
        assert_eq!("transformed".parse::<RecordStatus>().unwrap(), Transformed);
    }
}
