use chrono::{DateTime, Utc};
use common::dates::{format_for_db, parse_gerrit_timestamp, DateError};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::messages::{classify, MessageKind};
use crate::models::{Change, ChangeState, Document, Event, EventKind, FileDetail, OnChange};
use crate::payloads::{ChangePayload, MessagePayload, RevisionPayload};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("malformed change payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("unknown change status {0:?}")]
    UnknownStatus(String),
    #[error(transparent)]
    Date(#[from] DateError),
    #[error("change has no revision")]
    MissingRevision,
    #[error("merged change has no submitted date")]
    MissingSubmitDate,
}

/// A raw change that could not be turned into documents.
#[derive(Debug)]
pub struct ExtractFailure {
    pub change_id: Option<String>,
    pub raw: Value,
    pub error: ExtractError,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub documents: Vec<Document>,
    pub failures: Vec<ExtractFailure>,
}

/// Turns raw Gerrit changes into [`Change`] and [`Event`] documents.
#[derive(Debug, Clone)]
pub struct ChangeExtractor {
    base_url: String,
}

impl ChangeExtractor {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Extracts every change. A change that fails is logged and reported in
    /// [`Extraction::failures`]; the others are unaffected.
    pub fn extract_all(&self, raw_changes: &[Value]) -> Extraction {
        let mut extraction = Extraction::default();
        for raw in raw_changes {
            match self.extract_one(raw) {
                Ok(documents) => extraction.documents.extend(documents),
                Err(error) => {
                    let change_id = raw.get("id").and_then(Value::as_str).map(str::to_string);
                    warn!(
                        change_id = change_id.as_deref().unwrap_or("<unknown>"),
                        error = %error,
                        raw = %raw,
                        "unable to extract change"
                    );
                    extraction.failures.push(ExtractFailure {
                        change_id,
                        raw: raw.clone(),
                        error,
                    });
                }
            }
        }
        extraction
    }

    /// Returns the change followed by its events: created, closed (if any),
    /// then message events and review events in discovery order.
    pub fn extract_one(&self, raw: &Value) -> Result<Vec<Document>, ExtractError> {
        let payload = ChangePayload::deserialize(raw)?;
        let change = self.build_change(&payload)?;
        let on = OnChange::from(&change);
        let mut events = vec![Event {
            id: format!("CCE{}", change.id),
            kind: EventKind::Created,
            created_at: change.created_at,
            author: Some(change.author.clone()),
            on: on.clone(),
        }];

        if let Some(closed_at) = change.closed_at {
            let kind = if change.state == ChangeState::Merged {
                EventKind::Merged
            } else {
                EventKind::Abandoned
            };
            events.push(Event {
                id: format!("CCLE{}", change.id),
                kind,
                created_at: closed_at,
                author: change.merged_by.clone(),
                on: on.clone(),
            });
        }

        for message in &payload.messages {
            if let Some(event) = message_event(message, &on)? {
                events.push(event);
            }
        }
        events.extend(review_events(&payload, &on)?);

        let mut documents = Vec::with_capacity(events.len() + 1);
        documents.push(Document::Change(change));
        documents.extend(events.into_iter().map(Document::Event));
        Ok(documents)
    }

    fn build_change(&self, payload: &ChangePayload) -> Result<Change, ExtractError> {
        let state = ChangeState::from_gerrit_status(&payload.status)
            .ok_or_else(|| ExtractError::UnknownStatus(payload.status.clone()))?;
        let revision = current_revision(payload)?;
        let (repository_prefix, repository_shortname) = split_project(&payload.project);

        let created_at = parse_gerrit_timestamp(&payload.created)?;
        let updated_at = parse_gerrit_timestamp(&payload.updated)?;
        let merged_at = payload
            .submitted
            .as_deref()
            .map(parse_gerrit_timestamp)
            .transpose()?;
        // Gerrit keeps no abandon time; the last update stands in for it.
        let closed_at = match state {
            ChangeState::Open => None,
            ChangeState::Merged => Some(merged_at.ok_or(ExtractError::MissingSubmitDate)?),
            ChangeState::Closed => Some(updated_at),
        };
        let duration = closed_at.map(|closed_at| seconds_between(created_at, closed_at));
        let merged_by = match state {
            ChangeState::Merged => payload.submitter.as_ref().map(|s| s.attribution()),
            _ => None,
        };

        let changes_files_details: Vec<FileDetail> = revision
            .files
            .iter()
            .map(|(path, file)| FileDetail {
                path: path.clone(),
                additions: file.lines_inserted.unwrap_or(0),
                deletions: file.lines_deleted.unwrap_or(0),
            })
            .collect();

        Ok(Change {
            id: payload.id.clone(),
            number: payload.number,
            repository_fullname_and_number: format!("{}#{}", payload.project, payload.number),
            repository_prefix,
            repository_fullname: payload.project.clone(),
            repository_shortname,
            branch: payload.branch.clone(),
            target_branch: payload.branch.clone(),
            url: format!("{}/{}", self.base_url, payload.number),
            author: payload.owner.attribution(),
            title: payload.subject.clone(),
            created_at,
            updated_at,
            merged_at,
            closed_at,
            mergeable: is_mergeable(payload.mergeable.as_ref()),
            state,
            labels: Vec::new(),
            assignees: payload.assignee.iter().map(|a| a.attribution()).collect(),
            additions: payload.insertions,
            deletions: payload.deletions,
            commit_count: 1,
            changed_files: changes_files_details.len() as i64,
            changes_files_details,
            text: revision.commit.message.clone(),
            duration,
            merged_by,
        })
    }
}

fn message_event(message: &MessagePayload, on: &OnChange) -> Result<Option<Event>, ExtractError> {
    let kind = match classify(&message.message) {
        MessageKind::PatchSetUploaded => EventKind::CommitPushed,
        kind if kind.is_comment() => EventKind::Commented,
        _ => return Ok(None),
    };
    Ok(Some(Event {
        id: message.id.clone(),
        kind,
        created_at: parse_gerrit_timestamp(&message.date)?,
        author: message.author.as_ref().map(|a| a.attribution()),
        on: on.clone(),
    }))
}

fn review_events(payload: &ChangePayload, on: &OnChange) -> Result<Vec<Event>, ExtractError> {
    let mut events = Vec::new();
    for (label, details) in &payload.labels {
        for approval in &details.all {
            // Accounts that are only allowed to vote have no date.
            let (Some(date), Some(value)) = (approval.date.as_deref(), approval.value) else {
                continue;
            };
            let created_at = parse_gerrit_timestamp(date)?;
            events.push(Event {
                id: format!(
                    "{}_{}_{}_{}",
                    format_for_db(&created_at),
                    label,
                    value,
                    approval.account_id
                ),
                kind: EventKind::Reviewed {
                    approval: format_approval(label, value),
                },
                created_at,
                author: Some(approval.attribution()),
                on: on.clone(),
            });
        }
    }
    Ok(events)
}

/// The entry named by `current_revision`, else the first one.
fn current_revision(payload: &ChangePayload) -> Result<&RevisionPayload, ExtractError> {
    payload
        .current_revision
        .as_ref()
        .and_then(|sha| payload.revisions.get(sha))
        .or_else(|| payload.revisions.values().next())
        .ok_or(ExtractError::MissingRevision)
}

/// `tenant/sub/repo` -> (`tenant`, `sub/repo`)
fn split_project(project: &str) -> (String, String) {
    match project.split_once('/') {
        Some((prefix, short)) => (prefix.to_string(), short.to_string()),
        None => (project.to_string(), String::new()),
    }
}

fn is_mergeable(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if s == "true")
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds()
}

fn format_approval(label: &str, value: i64) -> String {
    if value < 0 {
        format!("{label}{value}")
    } else {
        format!("{label}+{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_split() {
        assert_eq!(
            split_project("software-factory/sf-config"),
            ("software-factory".to_string(), "sf-config".to_string())
        );
        assert_eq!(
            split_project("openstack/nova/specs"),
            ("openstack".to_string(), "nova/specs".to_string())
        );
        assert_eq!(split_project("gerrit"), ("gerrit".to_string(), String::new()));
    }

    #[test]
    fn mergeable_only_for_true_string() {
        assert!(is_mergeable(Some(&json!("true"))));
        assert!(!is_mergeable(Some(&json!("false"))));
        assert!(!is_mergeable(Some(&json!(true))));
        assert!(!is_mergeable(None));
    }

    #[test]
    fn approval_sign() {
        assert_eq!(format_approval("Code-Review", 2), "Code-Review+2");
        assert_eq!(format_approval("Code-Review", -1), "Code-Review-1");
        assert_eq!(format_approval("Verified", 0), "Verified+0");
    }

    #[test]
    fn trailing_slash_trimmed_from_base_url() {
        let extractor = ChangeExtractor::new("https://review.example.org/r/");
        assert_eq!(extractor.base_url, "https://review.example.org/r");
    }
}
