//! Staged handlers
//!
//! Preview handlers for every message type. They apply policy, resolve
//! temporary-ID references, and synthesize the entities a real handler
//! would create, without calling any remote API. Numbers are allocated
//! sequentially per factory, so each dispatch call should use a fresh
//! factory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::policy::PolicyGuard;
use super::{HandlerEntry, HandlerFactory, HandlerResult, ProjectHandler, RegularHandler};
use crate::domain::{
    resolve_reference, rewrite_references, HandlerFamily, Message, MessageType,
    MutableResolutionStore, Reference, ResolutionSnapshot, ResolvedEntity, TemporaryId,
    ID_REFERENCE_FIELDS,
};
use crate::storage::HandlerConfig;

/// Repository used when neither the message nor the config names one
pub const DEFAULT_STAGED_REPO: &str = "staged/preview";

/// Fields each message type must carry
fn required_fields(message_type: MessageType) -> &'static [&'static str] {
    match message_type {
        MessageType::CreateIssue
        | MessageType::CreatePullRequest
        | MessageType::CreateDiscussion
        | MessageType::CreateProject => &["title"],
        MessageType::AddComment | MessageType::CreatePullRequestReviewComment => &["body"],
        MessageType::AddLabels | MessageType::RemoveLabels => &["labels"],
        MessageType::LinkSubIssue => &["parent_issue_number", "sub_issue_number"],
        MessageType::DispatchWorkflow => &["workflow_name"],
        MessageType::AddReviewer => &["reviewers"],
        MessageType::AssignToUser => &["assignees"],
        MessageType::HideComment => &["comment_id"],
        MessageType::MissingTool => &["tool"],
        MessageType::UpdateProject => &["project"],
        MessageType::CreateProjectStatusUpdate => &["project", "body"],
        MessageType::CopyProject => &["source_project"],
        _ => &[],
    }
}

/// Field whose values are checked against `allowed` / `blocked`
fn policy_field(message_type: MessageType) -> Option<&'static str> {
    match message_type {
        MessageType::CreateIssue
        | MessageType::CreatePullRequest
        | MessageType::CreateDiscussion
        | MessageType::AddLabels
        | MessageType::RemoveLabels => Some("labels"),
        MessageType::AddReviewer => Some("reviewers"),
        MessageType::AssignToUser => Some("assignees"),
        MessageType::DispatchWorkflow => Some("workflow_name"),
        _ => None,
    }
}

/// Types whose success creates a new issue-like entity
fn creates_item(message_type: MessageType) -> bool {
    matches!(
        message_type,
        MessageType::CreateIssue | MessageType::CreatePullRequest | MessageType::CreateDiscussion
    )
}

fn missing_field(message: &Message, message_type: MessageType) -> Option<&'static str> {
    required_fields(message_type).iter().copied().find(|field| {
        match message.field(field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        }
    })
}

/// String values of a scalar or array field
fn field_values<'a>(message: &'a Message, field: &str) -> Vec<&'a str> {
    match message.field(field) {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => vec![],
    }
}

/// Shared checks: max, required fields, allowed/blocked
fn check_policy(
    policy: &mut PolicyGuard,
    message: &Message,
    message_type: MessageType,
) -> Option<HandlerResult> {
    if let Some(field) = missing_field(message, message_type) {
        return Some(HandlerResult::failure(format!(
            "{} requires a non-empty '{}' field",
            message_type, field
        )));
    }

    if let Some(field) = policy_field(message_type) {
        if let Err(violation) = policy.check_values(field_values(message, field)) {
            return Some(HandlerResult::failure(violation.to_string()));
        }
    }

    if let Err(violation) = policy.admit() {
        return Some(HandlerResult::failure(violation.to_string()));
    }

    None
}

/// Builds staged handlers for every message type
pub struct StagedHandlerFactory {
    repo: String,
    next_number: Arc<AtomicU64>,
}

impl StagedHandlerFactory {
    /// Creates a factory whose default repository is `repo`
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            next_number: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sets the first number handed out to created entities
    pub fn with_first_number(self, first: u64) -> Self {
        self.next_number.store(first, Ordering::SeqCst);
        self
    }
}

impl Default for StagedHandlerFactory {
    fn default() -> Self {
        Self::new(DEFAULT_STAGED_REPO)
    }
}

impl HandlerFactory for StagedHandlerFactory {
    fn supports(&self, _message_type: MessageType) -> bool {
        true
    }

    fn create(&self, message_type: MessageType, config: &HandlerConfig) -> Option<HandlerEntry> {
        let policy = PolicyGuard::from_config(message_type.as_str(), config);
        let numbers = Arc::clone(&self.next_number);

        Some(match message_type.family() {
            HandlerFamily::Regular => HandlerEntry::regular(StagedHandler {
                message_type,
                repo: self.repo.clone(),
                policy,
                numbers,
            }),
            HandlerFamily::Project => HandlerEntry::project(StagedProjectHandler {
                message_type,
                owner: self.repo.split('/').next().unwrap_or_default().to_string(),
                policy,
                numbers,
            }),
        })
    }
}

/// Staged handler for issue, pull request, discussion, and workflow types
pub struct StagedHandler {
    message_type: MessageType,
    repo: String,
    policy: PolicyGuard,
    numbers: Arc<AtomicU64>,
}

impl StagedHandler {
    fn target_repo(&self, message: &Message) -> String {
        message
            .str_field("repo")
            .or_else(|| self.policy.target().filter(|t| t.contains('/')))
            .unwrap_or(self.repo.as_str())
            .to_string()
    }
}

#[async_trait]
impl RegularHandler for StagedHandler {
    async fn handle(
        &mut self,
        message: &Message,
        resolved: &ResolutionSnapshot,
    ) -> Result<HandlerResult> {
        if let Some(rejected) = check_policy(&mut self.policy, message, self.message_type) {
            return Ok(rejected);
        }

        let repo = self.target_repo(message);
        let mut fields = Map::new();
        fields.insert("staged".to_string(), json!(true));

        for field in ID_REFERENCE_FIELDS {
            let Some(value) = message.field(field) else {
                continue;
            };

            match resolve_reference(value, resolved) {
                Reference::Literal(number) => {
                    fields.insert(field.to_string(), json!(number));
                }
                Reference::Resolved(id, entity) => match entity.number() {
                    Some(number) => {
                        fields.insert(field.to_string(), json!(number));
                    }
                    None => {
                        return Ok(HandlerResult::failure(format!(
                            "'{}' references {} which is not an issue or pull request",
                            field, id
                        )))
                    }
                },
                Reference::Unresolved(id) => {
                    return Ok(HandlerResult::deferred(format!(
                        "'{}' references temporary id {} which is not resolved yet",
                        field, id
                    )))
                }
                // `target` also accepts keywords such as "triggering" or "*"
                Reference::Invalid(raw) if *field == "target" => {
                    fields.insert(field.to_string(), json!(raw));
                }
                Reference::Invalid(raw) => {
                    return Ok(HandlerResult::failure(format!(
                        "'{}' must be a number or a temporary id, got '{}'",
                        field, raw
                    )))
                }
            }
        }

        if let Some(body) = message.str_field("body") {
            fields.insert("body".to_string(), json!(rewrite_references(body, resolved, &repo)));
        }

        if creates_item(self.message_type) {
            let number = self.numbers.fetch_add(1, Ordering::SeqCst);
            fields.insert("repo".to_string(), json!(repo));
            fields.insert("number".to_string(), json!(number));
            debug!(message_type = %self.message_type, %repo, number, "staged entity created");
        } else {
            fields.insert("target_repo".to_string(), json!(repo));
        }

        Ok(HandlerResult::success(Value::Object(fields)))
    }
}

/// Staged handler for project board types
pub struct StagedProjectHandler {
    message_type: MessageType,
    owner: String,
    policy: PolicyGuard,
    numbers: Arc<AtomicU64>,
}

impl StagedProjectHandler {
    fn next(&self) -> u64 {
        self.numbers.fetch_add(1, Ordering::SeqCst)
    }

    fn new_project(&self) -> HandlerResult {
        let number = self.next();
        HandlerResult::success(json!({
            "staged": true,
            "projectUrl": format!("https://github.com/orgs/{}/projects/{}", self.owner, number),
            "projectNumber": number,
        }))
    }

    /// Resolves the `project` field, which may reference a created project
    fn project_url(
        &self,
        message: &Message,
        store: &dyn MutableResolutionStore,
    ) -> std::result::Result<String, HandlerResult> {
        let raw = message
            .str_field("project")
            .map(str::to_string)
            .or_else(|| self.policy.target().map(str::to_string))
            .unwrap_or_default();

        match TemporaryId::normalize(&raw) {
            None => Ok(raw),
            Some(id) => match store.get(&id) {
                Some(ResolvedEntity::Project { project_url }) => Ok(project_url.clone()),
                Some(_) => Err(HandlerResult::failure(format!(
                    "'project' references {} which is not a project",
                    id
                ))),
                None => Err(HandlerResult::deferred(format!(
                    "'project' references temporary id {} which is not resolved yet",
                    id
                ))),
            },
        }
    }

    fn update_project(&self, message: &Message, store: &dyn MutableResolutionStore) -> HandlerResult {
        let project = match self.project_url(message, store) {
            Ok(url) => url,
            Err(result) => return result,
        };

        // Update an existing draft, possibly one created earlier in this batch
        if let Some(raw) = message.str_field("draft_issue_id") {
            let draft_item_id = match TemporaryId::normalize(raw) {
                None => raw.to_string(),
                Some(id) => match store.get(&id) {
                    Some(ResolvedEntity::DraftItem { draft_item_id }) => draft_item_id.clone(),
                    Some(_) => {
                        return HandlerResult::failure(format!(
                            "'draft_issue_id' references {} which is not a draft item",
                            id
                        ))
                    }
                    None => {
                        return HandlerResult::deferred(format!(
                            "'draft_issue_id' references temporary id {} which is not resolved yet",
                            id
                        ))
                    }
                },
            };

            return HandlerResult::success(json!({
                "staged": true,
                "project": project,
                "draftItemId": draft_item_id,
                "updated": true,
            }));
        }

        // Add existing content to the board
        if let Some(value) = message.field("content_number") {
            return match resolve_reference(value, &*store) {
                Reference::Literal(number) => HandlerResult::success(json!({
                    "staged": true,
                    "project": project,
                    "contentNumber": number,
                })),
                Reference::Resolved(_, ResolvedEntity::Item { repo, number }) => {
                    HandlerResult::success(json!({
                        "staged": true,
                        "project": project,
                        "contentRepo": repo,
                        "contentNumber": number,
                    }))
                }
                Reference::Resolved(id, _) => HandlerResult::failure(format!(
                    "'content_number' references {} which is not an issue or pull request",
                    id
                )),
                Reference::Unresolved(id) => HandlerResult::deferred(format!(
                    "'content_number' references temporary id {} which is not resolved yet",
                    id
                )),
                Reference::Invalid(raw) => HandlerResult::failure(format!(
                    "'content_number' must be a number or a temporary id, got '{}'",
                    raw
                )),
            };
        }

        // Create a draft; the dispatcher records it for the first provider only
        let draft_item_id = format!("DI_staged_{}", self.next());

        HandlerResult::success(json!({
            "staged": true,
            "project": project,
            "draftItemId": draft_item_id,
        }))
    }
}

#[async_trait]
impl ProjectHandler for StagedProjectHandler {
    async fn handle(
        &mut self,
        message: &Message,
        store: &mut dyn MutableResolutionStore,
    ) -> Result<HandlerResult> {
        if let Some(rejected) = check_policy(&mut self.policy, message, self.message_type) {
            return Ok(rejected);
        }

        let result = match self.message_type {
            MessageType::CreateProject | MessageType::CopyProject => self.new_project(),
            MessageType::UpdateProject => self.update_project(message, store),
            MessageType::CreateProjectStatusUpdate => match self.project_url(message, store) {
                Ok(project) => HandlerResult::success(json!({
                    "staged": true,
                    "project": project,
                    "statusUpdateId": format!("PVTSU_staged_{}", self.next()),
                })),
                Err(result) => result,
            },
            other => HandlerResult::failure(format!("{} is not a project message type", other)),
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReadOnlyResolutionView, ResolutionStore};

    const ID_A: &str = "aw_00000000000a";

    fn regular(factory: &StagedHandlerFactory, t: MessageType, config: &HandlerConfig) -> Box<dyn RegularHandler> {
        match factory.create(t, config) {
            Some(HandlerEntry::Regular(h)) => h,
            other => panic!("expected regular handler, got {:?}", other),
        }
    }

    fn project(factory: &StagedHandlerFactory, t: MessageType) -> Box<dyn ProjectHandler> {
        match factory.create(t, &HandlerConfig::default()) {
            Some(HandlerEntry::Project(h)) => h,
            other => panic!("expected project handler, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_issue_allocates_numbers() {
        let factory = StagedHandlerFactory::new("octo/app").with_first_number(100);
        let mut handler = regular(&factory, MessageType::CreateIssue, &HandlerConfig::default());
        let snapshot = ResolutionSnapshot::default();

        let first = handler
            .handle(&Message::new("create_issue").with_field("title", "a"), &snapshot)
            .await
            .unwrap();
        let second = handler
            .handle(&Message::new("create_issue").with_field("title", "b"), &snapshot)
            .await
            .unwrap();

        assert_eq!(first.entity(), Some(ResolvedEntity::item("octo/app", 100)));
        assert_eq!(second.entity(), Some(ResolvedEntity::item("octo/app", 101)));
    }

    #[tokio::test]
    async fn missing_required_field_fails() {
        let factory = StagedHandlerFactory::default();
        let mut handler = regular(&factory, MessageType::CreateIssue, &HandlerConfig::default());

        let result = handler
            .handle(&Message::new("create_issue").with_field("title", "  "), &ResolutionSnapshot::default())
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("'title'"));
    }

    #[tokio::test]
    async fn max_is_enforced_per_instance() {
        let factory = StagedHandlerFactory::default();
        let config = HandlerConfig {
            max: Some(1),
            ..HandlerConfig::default()
        };
        let mut handler = regular(&factory, MessageType::Noop, &config);
        let snapshot = ResolutionSnapshot::default();

        assert!(handler.handle(&Message::new("noop"), &snapshot).await.unwrap().success);
        let second = handler.handle(&Message::new("noop"), &snapshot).await.unwrap();
        assert!(second.error.unwrap().contains("max is 1"));

        let mut fresh = regular(&factory, MessageType::Noop, &config);
        assert!(fresh.handle(&Message::new("noop"), &snapshot).await.unwrap().success);
    }

    #[tokio::test]
    async fn blocked_labels_fail() {
        let factory = StagedHandlerFactory::default();
        let config = HandlerConfig {
            blocked: vec!["wontfix".to_string()],
            ..HandlerConfig::default()
        };
        let mut handler = regular(&factory, MessageType::AddLabels, &config);

        let result = handler
            .handle(
                &Message::new("add_labels").with_field("labels", json!(["bug", "wontfix"])),
                &ResolutionSnapshot::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.error.as_deref(), Some("'wontfix' is blocked by configuration"));
    }

    #[tokio::test]
    async fn unresolved_reference_defers() {
        let factory = StagedHandlerFactory::default();
        let mut handler = regular(&factory, MessageType::AddComment, &HandlerConfig::default());

        let result = handler
            .handle(
                &Message::new("add_comment")
                    .with_field("issue_number", format!("#{ID_A}"))
                    .with_field("body", "hi"),
                &ResolutionSnapshot::default(),
            )
            .await
            .unwrap();

        assert!(result.deferred);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn resolved_reference_and_body_are_rewritten() {
        let factory = StagedHandlerFactory::new("octo/app");
        let mut handler = regular(&factory, MessageType::AddComment, &HandlerConfig::default());

        let mut store = ResolutionStore::new();
        store.insert(ID_A.parse().unwrap(), ResolvedEntity::item("octo/app", 7));

        let result = handler
            .handle(
                &Message::new("add_comment")
                    .with_field("issue_number", format!("#{ID_A}"))
                    .with_field("body", format!("Filed as #{ID_A}")),
                &store.snapshot(),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.fields.get("issue_number"), Some(&json!(7)));
        assert_eq!(result.fields.get("body"), Some(&json!("Filed as #7")));
        assert!(result.entity().is_none());
    }

    #[tokio::test]
    async fn invalid_reference_fails() {
        let factory = StagedHandlerFactory::default();
        let mut handler = regular(&factory, MessageType::CloseIssue, &HandlerConfig::default());

        let result = handler
            .handle(
                &Message::new("close_issue").with_field("issue_number", "soon"),
                &ResolutionSnapshot::default(),
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert!(!result.deferred);
    }

    #[tokio::test]
    async fn draft_create_leaves_store_to_the_dispatcher() {
        let factory = StagedHandlerFactory::new("octo/app");
        let mut handler = project(&factory, MessageType::UpdateProject);
        let mut store = ResolutionStore::new();
        let project_url = "https://github.com/orgs/octo/projects/1";

        let created = handler
            .handle(
                &Message::new("update_project")
                    .with_temporary_id(ID_A)
                    .with_field("project", project_url)
                    .with_field("draft_title", "Draft"),
                &mut store,
            )
            .await
            .unwrap();
        let draft_id = created.fields["draftItemId"].as_str().unwrap().to_string();
        assert!(store.is_empty());
        assert_eq!(created.entity(), Some(ResolvedEntity::draft_item(draft_id.clone())));

        store.insert(ID_A.parse().unwrap(), created.entity().unwrap());

        let updated = handler
            .handle(
                &Message::new("update_project")
                    .with_field("project", project_url)
                    .with_field("draft_issue_id", format!("#{ID_A}")),
                &mut store,
            )
            .await
            .unwrap();

        assert!(updated.success);
        assert_eq!(updated.fields["draftItemId"], json!(draft_id));
    }

    #[tokio::test]
    async fn update_before_create_defers() {
        let factory = StagedHandlerFactory::default();
        let mut handler = project(&factory, MessageType::UpdateProject);
        let mut store = ResolutionStore::new();

        let result = handler
            .handle(
                &Message::new("update_project")
                    .with_field("project", "https://github.com/orgs/o/projects/1")
                    .with_field("draft_issue_id", format!("#{ID_A}")),
                &mut store,
            )
            .await
            .unwrap();

        assert!(result.deferred);
    }

    #[tokio::test]
    async fn create_project_resolves_to_url() {
        let factory = StagedHandlerFactory::new("octo/app");
        let mut handler = project(&factory, MessageType::CreateProject);

        let result = handler
            .handle(&Message::new("create_project").with_field("title", "Roadmap"), &mut ResolutionStore::new())
            .await
            .unwrap();

        assert_eq!(
            result.entity(),
            Some(ResolvedEntity::Project {
                project_url: "https://github.com/orgs/octo/projects/1".to_string()
            })
        );
    }
}
