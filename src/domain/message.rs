//! Safe-output message model
//!
//! A message is an agent's request for one privileged side effect. Only the
//! `type` tag is mandatory; everything else is handler-specific and kept as a
//! JSON object. A message may declare the temporary ID it provides and may
//! reference IDs provided by other messages in the same batch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::{scan_text_references, IdError, TemporaryId};

/// Fields whose whole value may be a temporary ID reference
pub const ID_REFERENCE_FIELDS: &[&str] = &[
    "issue_number",
    "item_number",
    "pull_request_number",
    "discussion_number",
    "parent_issue_number",
    "sub_issue_number",
    "content_number",
    "target",
];

/// Free-text fields scanned for embedded `#aw_...` references
pub const TEXT_REFERENCE_FIELDS: &[&str] = &["body", "title", "description"];

/// Which resolution context a message type's handler receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerFamily {
    /// Receives an immutable snapshot of resolved IDs
    Regular,
    /// Receives the live, shared resolution store
    Project,
}

/// Every message type the dispatcher knows how to route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    CreateIssue,
    UpdateIssue,
    CloseIssue,
    AddComment,
    HideComment,
    AddLabels,
    RemoveLabels,
    AssignMilestone,
    AssignToAgent,
    AssignToUser,
    LinkSubIssue,
    CreatePullRequest,
    UpdatePullRequest,
    ClosePullRequest,
    PushToPullRequestBranch,
    AddReviewer,
    CreatePullRequestReviewComment,
    CreateDiscussion,
    UpdateDiscussion,
    CloseDiscussion,
    DispatchWorkflow,
    CreateProject,
    UpdateProject,
    CreateProjectStatusUpdate,
    CopyProject,
    MissingTool,
    Noop,
}

impl MessageType {
    /// All known message types, in declaration order
    pub const ALL: [MessageType; 27] = [
        MessageType::CreateIssue,
        MessageType::UpdateIssue,
        MessageType::CloseIssue,
        MessageType::AddComment,
        MessageType::HideComment,
        MessageType::AddLabels,
        MessageType::RemoveLabels,
        MessageType::AssignMilestone,
        MessageType::AssignToAgent,
        MessageType::AssignToUser,
        MessageType::LinkSubIssue,
        MessageType::CreatePullRequest,
        MessageType::UpdatePullRequest,
        MessageType::ClosePullRequest,
        MessageType::PushToPullRequestBranch,
        MessageType::AddReviewer,
        MessageType::CreatePullRequestReviewComment,
        MessageType::CreateDiscussion,
        MessageType::UpdateDiscussion,
        MessageType::CloseDiscussion,
        MessageType::DispatchWorkflow,
        MessageType::CreateProject,
        MessageType::UpdateProject,
        MessageType::CreateProjectStatusUpdate,
        MessageType::CopyProject,
        MessageType::MissingTool,
        MessageType::Noop,
    ];

    /// Returns the canonical snake_case tag
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::CreateIssue => "create_issue",
            MessageType::UpdateIssue => "update_issue",
            MessageType::CloseIssue => "close_issue",
            MessageType::AddComment => "add_comment",
            MessageType::HideComment => "hide_comment",
            MessageType::AddLabels => "add_labels",
            MessageType::RemoveLabels => "remove_labels",
            MessageType::AssignMilestone => "assign_milestone",
            MessageType::AssignToAgent => "assign_to_agent",
            MessageType::AssignToUser => "assign_to_user",
            MessageType::LinkSubIssue => "link_sub_issue",
            MessageType::CreatePullRequest => "create_pull_request",
            MessageType::UpdatePullRequest => "update_pull_request",
            MessageType::ClosePullRequest => "close_pull_request",
            MessageType::PushToPullRequestBranch => "push_to_pull_request_branch",
            MessageType::AddReviewer => "add_reviewer",
            MessageType::CreatePullRequestReviewComment => "create_pull_request_review_comment",
            MessageType::CreateDiscussion => "create_discussion",
            MessageType::UpdateDiscussion => "update_discussion",
            MessageType::CloseDiscussion => "close_discussion",
            MessageType::DispatchWorkflow => "dispatch_workflow",
            MessageType::CreateProject => "create_project",
            MessageType::UpdateProject => "update_project",
            MessageType::CreateProjectStatusUpdate => "create_project_status_update",
            MessageType::CopyProject => "copy_project",
            MessageType::MissingTool => "missing_tool",
            MessageType::Noop => "noop",
        }
    }

    /// Static classification of the handler family for this type
    pub fn family(&self) -> HandlerFamily {
        match self {
            MessageType::CreateProject
            | MessageType::UpdateProject
            | MessageType::CreateProjectStatusUpdate
            | MessageType::CopyProject => HandlerFamily::Project,
            _ => HandlerFamily::Regular,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_type_key(s);
        MessageType::ALL
            .into_iter()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| s.to_string())
    }
}

/// Normalizes a type tag or config key: trimmed, lowercase, underscores
pub fn normalize_type_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

/// A single safe-output message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The raw type tag (selects the handler)
    #[serde(rename = "type")]
    type_tag: String,

    /// The temporary ID this message provides on success, as written
    #[serde(rename = "temporary_id", default, skip_serializing_if = "Option::is_none")]
    temporary_id: Option<Value>,

    /// Camel-case spelling; `temporary_id` wins when both are present
    #[serde(rename = "temporaryId", default, skip_serializing_if = "Option::is_none")]
    temporary_id_camel: Option<Value>,

    /// Handler-specific fields
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Message {
    /// Creates a message with the given type tag and no fields
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            temporary_id: None,
            temporary_id_camel: None,
            fields: Map::new(),
        }
    }

    /// Sets the declared temporary ID
    pub fn with_temporary_id(mut self, raw: impl Into<String>) -> Self {
        self.temporary_id = Some(Value::String(raw.into()));
        self
    }

    /// Sets a handler-specific field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns the raw type tag
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Returns the known message type, if the tag is recognized
    pub fn message_type(&self) -> Option<MessageType> {
        self.type_tag.parse().ok()
    }

    /// Returns the declared temporary ID exactly as written
    ///
    /// A null `temporary_id` counts as absent, so a camel-case value beside
    /// it is still used.
    pub fn temporary_id(&self) -> Option<&Value> {
        match &self.temporary_id {
            None | Some(Value::Null) => self.temporary_id_camel.as_ref(),
            declared => declared.as_ref(),
        }
    }

    /// Returns a handler-specific field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a handler-specific field as a string
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns all handler-specific fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns the normalized temporary ID this message provides
    ///
    /// A declared value that cannot be normalized is malformed; the message
    /// must then fail without its handler being invoked.
    pub fn provided_id(&self) -> Result<Option<TemporaryId>, IdError> {
        match self.temporary_id() {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => raw.parse().map(Some),
            Some(other) => Err(IdError::NotAString(other.to_string())),
        }
    }

    /// Returns the temporary IDs this message references
    ///
    /// Scans the fixed id-bearing fields and the free-text fields. Duplicates
    /// are dropped (first occurrence wins) and the message's own provided ID
    /// is never reported.
    pub fn references(&self) -> Vec<TemporaryId> {
        let own = self.provided_id().ok().flatten();
        let mut refs: Vec<TemporaryId> = Vec::new();

        let mut push = |id: TemporaryId| {
            if Some(&id) != own.as_ref() && !refs.contains(&id) {
                refs.push(id);
            }
        };

        for field in ID_REFERENCE_FIELDS {
            if let Some(raw) = self.str_field(field) {
                if let Some(id) = TemporaryId::normalize(raw) {
                    push(id);
                }
            }
        }

        for field in TEXT_REFERENCE_FIELDS {
            if let Some(text) = self.str_field(field) {
                for id in scan_text_references(text) {
                    push(id);
                }
            }
        }

        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID_A: &str = "aw_00000000000a";
    const ID_B: &str = "aw_00000000000b";

    #[test]
    fn every_type_roundtrips_through_its_tag() {
        for t in MessageType::ALL {
            assert_eq!(t.as_str().parse::<MessageType>(), Ok(t));
        }
    }

    #[test]
    fn type_tags_accept_hyphens_and_case() {
        assert_eq!("Create-Issue".parse(), Ok(MessageType::CreateIssue));
        assert!("launch_rocket".parse::<MessageType>().is_err());
    }

    #[test]
    fn project_family_classification() {
        let project: Vec<_> = MessageType::ALL
            .into_iter()
            .filter(|t| t.family() == HandlerFamily::Project)
            .map(|t| t.as_str())
            .collect();

        assert_eq!(
            project,
            vec!["create_project", "update_project", "create_project_status_update", "copy_project"]
        );
    }

    #[test]
    fn decodes_both_temporary_id_spellings() {
        let camel: Message =
            serde_json::from_value(json!({"type": "create_issue", "temporaryId": ID_A})).unwrap();
        let snake: Message =
            serde_json::from_value(json!({"type": "create_issue", "temporary_id": ID_A})).unwrap();

        assert_eq!(camel.provided_id().unwrap().unwrap().to_string(), ID_A);
        assert_eq!(snake.provided_id().unwrap().unwrap().to_string(), ID_A);
        assert!(camel.field("temporaryId").is_none());
    }

    #[test]
    fn snake_case_temporary_id_wins_over_camel_case() {
        let both: Message = serde_json::from_value(json!({
            "type": "create_issue",
            "temporary_id": ID_A,
            "temporaryId": ID_B,
        }))
        .unwrap();

        assert_eq!(both.provided_id().unwrap().unwrap().to_string(), ID_A);
        assert!(both.references().is_empty());
        assert!(both.field("temporaryId").is_none());

        let null_snake: Message = serde_json::from_value(json!({
            "type": "create_issue",
            "temporary_id": null,
            "temporaryId": ID_B,
        }))
        .unwrap();
        assert_eq!(null_snake.provided_id().unwrap().unwrap().to_string(), ID_B);
    }

    #[test]
    fn unknown_type_survives_decoding() {
        let msg: Message =
            serde_json::from_value(json!({"type": "launch_rocket", "payload": 1})).unwrap();

        assert_eq!(msg.type_tag(), "launch_rocket");
        assert!(msg.message_type().is_none());
        assert_eq!(msg.field("payload"), Some(&json!(1)));
    }

    #[test]
    fn missing_type_is_rejected() {
        assert!(serde_json::from_value::<Message>(json!({"title": "x"})).is_err());
    }

    #[test]
    fn malformed_provided_id() {
        let msg = Message::new("create_issue").with_temporary_id("not-a-valid-id");
        assert_eq!(
            msg.provided_id(),
            Err(IdError::Malformed("not-a-valid-id".to_string()))
        );

        let numeric: Message =
            serde_json::from_value(json!({"type": "create_issue", "temporary_id": 7})).unwrap();
        assert!(matches!(numeric.provided_id(), Err(IdError::NotAString(_))));
    }

    #[test]
    fn null_provided_id_is_absent() {
        let msg: Message =
            serde_json::from_value(json!({"type": "create_issue", "temporary_id": null})).unwrap();
        assert_eq!(msg.provided_id(), Ok(None));
    }

    #[test]
    fn references_from_id_fields_and_text() {
        let msg = Message::new("link_sub_issue")
            .with_field("parent_issue_number", format!("#{ID_A}"))
            .with_field("sub_issue_number", ID_B.to_uppercase())
            .with_field("body", format!("Tracks #{ID_A}"));

        let refs: Vec<String> = msg.references().iter().map(ToString::to_string).collect();
        assert_eq!(refs, vec![ID_A, ID_B]);
    }

    #[test]
    fn numeric_and_unrelated_fields_are_not_references() {
        let msg = Message::new("add_comment")
            .with_field("issue_number", 42)
            .with_field("labels", json!([format!("#{ID_A}")]))
            .with_field("body", "no refs here");

        assert!(msg.references().is_empty());
    }

    #[test]
    fn own_id_is_not_a_reference() {
        let msg = Message::new("create_issue")
            .with_temporary_id(ID_A)
            .with_field("body", format!("I am #{ID_A}"));

        assert!(msg.references().is_empty());
    }
}
