use chrono::{DateTime, Utc};
use common::dates::db_format;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeState {
    Open,
    Merged,
    Closed,
}

impl ChangeState {
    /// Maps a Gerrit change status. Anything but `NEW`, `MERGED` or
    /// `ABANDONED` is rejected.
    pub fn from_gerrit_status(status: &str) -> Option<Self> {
        match status {
            "NEW" => Some(Self::Open),
            "MERGED" => Some(Self::Merged),
            "ABANDONED" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Merged | Self::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDetail {
    pub path: String,
    pub additions: i64,
    pub deletions: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "Change")]
pub struct Change {
    pub id: String,
    pub number: i64,
    pub repository_prefix: String,
    pub repository_fullname: String,
    pub repository_shortname: String,
    pub repository_fullname_and_number: String,
    pub branch: String,
    pub target_branch: String,
    pub url: String,
    pub author: String,
    pub title: String,
    #[serde(with = "db_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "db_format")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "db_format::option", default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// Set iff the change is merged or abandoned.
    #[serde(
        with = "db_format::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub closed_at: Option<DateTime<Utc>>,
    pub mergeable: bool,
    pub state: ChangeState,
    /// Votes are emitted as `ChangeReviewedEvent`s, never inlined here.
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub additions: i64,
    pub deletions: i64,
    pub commit_count: i64,
    pub changed_files: i64,
    pub changes_files_details: Vec<FileDetail>,
    pub text: String,
    /// Seconds from creation to close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    pub merged_by: Option<String>,
}

/// Attributes every event copies from the change it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnChange {
    pub repository_prefix: String,
    pub repository_fullname: String,
    pub repository_shortname: String,
    pub number: i64,
    pub repository_fullname_and_number: String,
    pub on_author: String,
    #[serde(with = "db_format")]
    pub on_created_at: DateTime<Utc>,
}

impl From<&Change> for OnChange {
    fn from(change: &Change) -> Self {
        Self {
            repository_prefix: change.repository_prefix.clone(),
            repository_fullname: change.repository_fullname.clone(),
            repository_shortname: change.repository_shortname.clone(),
            number: change.number,
            repository_fullname_and_number: change.repository_fullname_and_number.clone(),
            on_author: change.author.clone(),
            on_created_at: change.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "ChangeCreatedEvent")]
    Created,
    #[serde(rename = "ChangeMergedEvent")]
    Merged,
    #[serde(rename = "ChangeAbandonedEvent")]
    Abandoned,
    #[serde(rename = "ChangeCommitPushedEvent")]
    CommitPushed,
    #[serde(rename = "ChangeCommentedEvent")]
    Commented,
    /// `approval` is `<label><sign><value>`, e.g. `Code-Review+2`.
    #[serde(rename = "ChangeReviewedEvent")]
    Reviewed { approval: String },
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Created => "ChangeCreatedEvent",
            Self::Merged => "ChangeMergedEvent",
            Self::Abandoned => "ChangeAbandonedEvent",
            Self::CommitPushed => "ChangeCommitPushedEvent",
            Self::Commented => "ChangeCommentedEvent",
            Self::Reviewed { .. } => "ChangeReviewedEvent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    #[serde(flatten)]
    pub kind: EventKind,
    #[serde(with = "db_format")]
    pub created_at: DateTime<Utc>,
    pub author: Option<String>,
    #[serde(flatten)]
    pub on: OnChange,
}

/// One record handed to the sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Document {
    Change(Change),
    Event(Event),
}

impl Document {
    pub fn id(&self) -> &str {
        match self {
            Self::Change(change) => &change.id,
            Self::Event(event) => &event.id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Change(_) => "Change",
            Self::Event(event) => event.kind.type_name(),
        }
    }

    pub fn as_change(&self) -> Option<&Change> {
        match self {
            Self::Change(change) => Some(change),
            Self::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Change(_) => None,
            Self::Event(event) => Some(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn on_change() -> OnChange {
        OnChange {
            repository_prefix: "zuul".into(),
            repository_fullname: "zuul/zuul".into(),
            repository_shortname: "zuul".into(),
            number: 42,
            repository_fullname_and_number: "zuul/zuul#42".into(),
            on_author: "Jane/7".into(),
            on_created_at: Utc.with_ymd_and_hms(2020, 4, 8, 10, 15, 30).unwrap(),
        }
    }

    #[test]
    fn reviewed_event_serializes_flat() {
        let event = Event {
            id: "2020-04-09T08:00:00Z_Code-Review_2_9".into(),
            kind: EventKind::Reviewed {
                approval: "Code-Review+2".into(),
            },
            created_at: Utc.with_ymd_and_hms(2020, 4, 9, 8, 0, 0).unwrap(),
            author: Some("Bob/9".into()),
            on: on_change(),
        };
        let value = serde_json::to_value(Document::Event(event)).unwrap();
        assert_eq!(value["type"], json!("ChangeReviewedEvent"));
        assert_eq!(value["approval"], json!("Code-Review+2"));
        assert_eq!(value["created_at"], json!("2020-04-09T08:00:00Z"));
        assert_eq!(value["on_created_at"], json!("2020-04-08T10:15:30Z"));
        assert_eq!(value["repository_fullname_and_number"], json!("zuul/zuul#42"));
    }

    #[test]
    fn abandon_event_keeps_null_author() {
        let event = Event {
            id: "CCLEabc".into(),
            kind: EventKind::Abandoned,
            created_at: Utc.with_ymd_and_hms(2020, 4, 9, 8, 0, 0).unwrap(),
            author: None,
            on: on_change(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("ChangeAbandonedEvent"));
        assert!(value["author"].is_null());
        assert!(value.get("approval").is_none());
    }

    #[test]
    fn status_mapping_rejects_unknown() {
        assert_eq!(ChangeState::from_gerrit_status("NEW"), Some(ChangeState::Open));
        assert_eq!(ChangeState::from_gerrit_status("ABANDONED"), Some(ChangeState::Closed));
        assert_eq!(ChangeState::from_gerrit_status("DRAFT"), None);
    }
}
