//! Subset of the Gerrit `ChangeInfo` JSON consumed by the extractor.
//!
//! Field names follow the REST API; leading underscores are renamed. Maps
//! keep the order Gerrit sent them in: labels follow the project's label
//! configuration and files follow the revision's file list.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePayload {
    pub id: String,
    #[serde(rename = "_number")]
    pub number: i64,
    pub project: String,
    pub branch: String,
    pub subject: String,
    pub status: String,
    pub owner: AccountPayload,
    pub assignee: Option<AccountPayload>,
    pub submitter: Option<AccountPayload>,
    pub created: String,
    pub updated: String,
    pub submitted: Option<String>,
    /// Only the string `"true"` counts as mergeable.
    pub mergeable: Option<Value>,
    pub insertions: i64,
    pub deletions: i64,
    pub current_revision: Option<String>,
    pub revisions: IndexMap<String, RevisionPayload>,
    #[serde(default)]
    pub messages: Vec<MessagePayload>,
    #[serde(default)]
    pub labels: IndexMap<String, LabelPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountPayload {
    #[serde(rename = "_account_id")]
    pub account_id: i64,
    pub name: Option<String>,
}

/// `<name>/<account id>`, with `None` standing in for a missing name.
pub fn attribution(name: Option<&str>, account_id: i64) -> String {
    format!("{}/{}", name.unwrap_or("None"), account_id)
}

impl AccountPayload {
    pub fn attribution(&self) -> String {
        attribution(self.name.as_deref(), self.account_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevisionPayload {
    pub commit: CommitPayload,
    #[serde(default)]
    pub files: IndexMap<String, FilePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitPayload {
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilePayload {
    pub lines_inserted: Option<i64>,
    pub lines_deleted: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub message: String,
    pub date: String,
    pub author: Option<AccountPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelPayload {
    #[serde(default)]
    pub all: Vec<ApprovalPayload>,
}

/// One entry of a label's `all` list. Accounts that are merely allowed to vote
/// carry neither `date` nor `value`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalPayload {
    #[serde(rename = "_account_id")]
    pub account_id: i64,
    pub name: Option<String>,
    pub value: Option<i64>,
    pub date: Option<String>,
}

impl ApprovalPayload {
    pub fn attribution(&self) -> String {
        attribution(self.name.as_deref(), self.account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attribution_falls_back_to_none_for_missing_name() {
        assert_eq!(attribution(Some("Jane Doe"), 7), "Jane Doe/7");
        assert_eq!(attribution(None, 7), "None/7");

        let account: AccountPayload = serde_json::from_value(json!({"_account_id": 3})).unwrap();
        let approval: ApprovalPayload =
            serde_json::from_value(json!({"_account_id": 3, "value": 1})).unwrap();
        assert_eq!(account.attribution(), approval.attribution());
    }

    #[test]
    fn labels_and_files_keep_upstream_order() {
        let revision: RevisionPayload = serde_json::from_str(
            r#"{"commit": {"message": "m"}, "files": {"z.py": {}, "a.py": {}, "m.py": {}}}"#,
        )
        .unwrap();
        let files: Vec<&str> = revision.files.keys().map(String::as_str).collect();
        assert_eq!(files, vec!["z.py", "a.py", "m.py"]);

        let labels: IndexMap<String, LabelPayload> =
            serde_json::from_str(r#"{"Verified": {}, "Code-Review": {}, "Workflow": {}}"#).unwrap();
        let names: Vec<&str> = labels.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Verified", "Code-Review", "Workflow"]);
    }
}
