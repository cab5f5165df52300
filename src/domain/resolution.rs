//! Resolution state for temporary IDs
//!
//! Resolved values flow from provider messages to dependent messages within
//! one dispatch pass. Two capabilities exist:
//!
//! - [`ReadOnlyResolutionView`] - lookups only, implemented by the
//!   [`ResolutionSnapshot`] handed to regular handlers
//! - [`MutableResolutionStore`] - lookups plus in-place updates, implemented
//!   by the live [`ResolutionStore`] handed to project handlers

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::{replace_text_references, TemporaryId};

/// Resolved temporary IDs keyed by canonical ID
pub type ResolvedMap = BTreeMap<TemporaryId, ResolvedEntity>;

/// The value a temporary ID resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedEntity {
    /// An issue, pull request, or discussion
    Item { repo: String, number: u64 },

    /// A draft item on a project board
    DraftItem {
        #[serde(rename = "draftItemId")]
        draft_item_id: String,
    },

    /// A project board
    Project {
        #[serde(rename = "projectUrl")]
        project_url: String,
    },
}

impl ResolvedEntity {
    /// Creates an item entity
    pub fn item(repo: impl Into<String>, number: u64) -> Self {
        ResolvedEntity::Item {
            repo: repo.into(),
            number,
        }
    }

    /// Creates a draft item entity
    pub fn draft_item(draft_item_id: impl Into<String>) -> Self {
        ResolvedEntity::DraftItem {
            draft_item_id: draft_item_id.into(),
        }
    }

    /// Derives an entity from handler result fields
    ///
    /// Accepts `repo` + `number` (number as integer or numeric string),
    /// `draftItemId` / `draft_item_id`, or `projectUrl` / `project_url`.
    pub fn from_fields(fields: &Map<String, Value>) -> Option<Self> {
        let text = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|k| fields.get(*k).and_then(Value::as_str))
                .map(str::to_string)
        };

        if let Some(repo) = text(&["repo"]) {
            let number = match fields.get("number") {
                Some(Value::Number(n)) => n.as_u64(),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            };
            if let Some(number) = number {
                return Some(ResolvedEntity::Item { repo, number });
            }
        }

        if let Some(draft_item_id) = text(&["draftItemId", "draft_item_id"]) {
            return Some(ResolvedEntity::DraftItem { draft_item_id });
        }

        text(&["projectUrl", "project_url"]).map(|project_url| ResolvedEntity::Project { project_url })
    }

    /// Returns the issue/PR number for item entities
    pub fn number(&self) -> Option<u64> {
        match self {
            ResolvedEntity::Item { number, .. } => Some(*number),
            _ => None,
        }
    }
}

impl fmt::Display for ResolvedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedEntity::Item { repo, number } => write!(f, "{}#{}", repo, number),
            ResolvedEntity::DraftItem { draft_item_id } => write!(f, "draft {}", draft_item_id),
            ResolvedEntity::Project { project_url } => write!(f, "{}", project_url),
        }
    }
}

/// Read-only access to resolved temporary IDs
pub trait ReadOnlyResolutionView: Send + Sync {
    /// Looks up a resolved ID
    fn get(&self, id: &TemporaryId) -> Option<&ResolvedEntity>;

    /// Iterates over all resolved IDs in canonical order
    fn entries(&self) -> Box<dyn Iterator<Item = (&TemporaryId, &ResolvedEntity)> + '_>;

    /// Returns the number of resolved IDs
    fn len(&self) -> usize;

    fn contains(&self, id: &TemporaryId) -> bool {
        self.get(id).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-write access to the live resolution state
pub trait MutableResolutionStore: ReadOnlyResolutionView {
    /// Records a resolved ID, returning the previous value if any
    fn insert(&mut self, id: TemporaryId, entity: ResolvedEntity) -> Option<ResolvedEntity>;

    /// Forgets a resolved ID
    fn remove(&mut self, id: &TemporaryId) -> Option<ResolvedEntity>;
}

/// An immutable copy of the resolution state at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionSnapshot {
    entries: ResolvedMap,
}

impl ResolutionSnapshot {
    /// Returns the snapshot contents
    pub fn as_map(&self) -> &ResolvedMap {
        &self.entries
    }
}

impl ReadOnlyResolutionView for ResolutionSnapshot {
    fn get(&self, id: &TemporaryId) -> Option<&ResolvedEntity> {
        self.entries.get(id)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&TemporaryId, &ResolvedEntity)> + '_> {
        Box::new(self.entries.iter())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The live resolution state for one dispatch pass
#[derive(Debug, Default)]
pub struct ResolutionStore {
    entries: ResolvedMap,
}

impl ResolutionStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with IDs resolved by an earlier pass
    pub fn seeded(seed: ResolvedMap) -> Self {
        Self { entries: seed }
    }

    /// Takes an immutable copy of the current state
    pub fn snapshot(&self) -> ResolutionSnapshot {
        ResolutionSnapshot {
            entries: self.entries.clone(),
        }
    }
}

impl ReadOnlyResolutionView for ResolutionStore {
    fn get(&self, id: &TemporaryId) -> Option<&ResolvedEntity> {
        self.entries.get(id)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&TemporaryId, &ResolvedEntity)> + '_> {
        Box::new(self.entries.iter())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl MutableResolutionStore for ResolutionStore {
    fn insert(&mut self, id: TemporaryId, entity: ResolvedEntity) -> Option<ResolvedEntity> {
        self.entries.insert(id, entity)
    }

    fn remove(&mut self, id: &TemporaryId) -> Option<ResolvedEntity> {
        self.entries.remove(id)
    }
}

/// Classification of a reference-bearing field value
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// A concrete number (e.g., an existing issue)
    Literal(u64),
    /// A temporary ID that has already been resolved
    Resolved(TemporaryId, ResolvedEntity),
    /// A temporary ID with no resolved value yet
    Unresolved(TemporaryId),
    /// Neither a number nor a temporary ID
    Invalid(String),
}

/// Classifies a field value against the resolution state
pub fn resolve_reference<V>(value: &Value, view: &V) -> Reference
where
    V: ReadOnlyResolutionView + ?Sized,
{
    let raw = match value {
        Value::Number(n) => {
            return n
                .as_u64()
                .map(Reference::Literal)
                .unwrap_or_else(|| Reference::Invalid(n.to_string()))
        }
        Value::String(s) => s.trim(),
        other => return Reference::Invalid(other.to_string()),
    };

    let digits = raw.strip_prefix('#').unwrap_or(raw);
    if let Ok(number) = digits.parse::<u64>() {
        return Reference::Literal(number);
    }

    match TemporaryId::normalize(raw) {
        Some(id) => match view.get(&id) {
            Some(entity) => Reference::Resolved(id, entity.clone()),
            None => Reference::Unresolved(id),
        },
        None => Reference::Invalid(raw.to_string()),
    }
}

/// Rewrites `#aw_...` references in text to real issue references
///
/// Items in `current_repo` become `#N`, items elsewhere become
/// `owner/repo#N`. Unresolved IDs and non-item entities are left as written.
pub fn rewrite_references<V>(text: &str, view: &V, current_repo: &str) -> String
where
    V: ReadOnlyResolutionView + ?Sized,
{
    replace_text_references(text, |id| match view.get(id)? {
        ResolvedEntity::Item { repo, number } if repo.eq_ignore_ascii_case(current_repo) => {
            Some(format!("#{}", number))
        }
        ResolvedEntity::Item { repo, number } => Some(format!("{}#{}", repo, number)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: &str) -> TemporaryId {
        raw.parse().unwrap()
    }

    #[test]
    fn entity_from_item_fields() {
        let fields = json!({"repo": "octo/app", "number": 12, "url": "x"});
        let entity = ResolvedEntity::from_fields(fields.as_object().unwrap());
        assert_eq!(entity, Some(ResolvedEntity::item("octo/app", 12)));
    }

    #[test]
    fn entity_from_string_number() {
        let fields = json!({"repo": "octo/app", "number": " 7 "});
        let entity = ResolvedEntity::from_fields(fields.as_object().unwrap());
        assert_eq!(entity.and_then(|e| e.number()), Some(7));
    }

    #[test]
    fn entity_from_draft_fields() {
        let camel = json!({"draftItemId": "d1"});
        let snake = json!({"draft_item_id": "d1"});

        assert_eq!(
            ResolvedEntity::from_fields(camel.as_object().unwrap()),
            Some(ResolvedEntity::draft_item("d1"))
        );
        assert_eq!(
            ResolvedEntity::from_fields(snake.as_object().unwrap()),
            Some(ResolvedEntity::draft_item("d1"))
        );
    }

    #[test]
    fn entity_requires_recognized_fields() {
        let fields = json!({"repo": "octo/app", "commented": true});
        assert!(ResolvedEntity::from_fields(fields.as_object().unwrap()).is_none());
    }

    #[test]
    fn entity_wire_format() {
        let item = serde_json::to_value(ResolvedEntity::item("octo/app", 3)).unwrap();
        assert_eq!(item, json!({"repo": "octo/app", "number": 3}));

        let draft = serde_json::to_value(ResolvedEntity::draft_item("d1")).unwrap();
        assert_eq!(draft, json!({"draftItemId": "d1"}));

        let parsed: ResolvedEntity = serde_json::from_value(json!({"projectUrl": "u"})).unwrap();
        assert_eq!(parsed, ResolvedEntity::Project { project_url: "u".into() });
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let mut store = ResolutionStore::new();
        store.insert(id("aw_00000000000a"), ResolvedEntity::item("o/r", 1));

        let snapshot = store.snapshot();
        store.insert(id("aw_00000000000b"), ResolvedEntity::item("o/r", 2));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
        assert!(!snapshot.contains(&id("aw_00000000000b")));
    }

    #[test]
    fn seeded_store_starts_with_seed() {
        let mut seed = ResolvedMap::new();
        seed.insert(id("aw_00000000000a"), ResolvedEntity::item("o/r", 9));

        let store = ResolutionStore::seeded(seed);
        assert_eq!(
            store.get(&id("#aw_00000000000a")),
            Some(&ResolvedEntity::item("o/r", 9))
        );
    }

    #[test]
    fn classify_references() {
        let mut store = ResolutionStore::new();
        store.insert(id("aw_00000000000a"), ResolvedEntity::item("o/r", 5));

        assert_eq!(resolve_reference(&json!(17), &store), Reference::Literal(17));
        assert_eq!(resolve_reference(&json!("#17"), &store), Reference::Literal(17));
        assert_eq!(
            resolve_reference(&json!("#aw_00000000000a"), &store),
            Reference::Resolved(id("aw_00000000000a"), ResolvedEntity::item("o/r", 5))
        );
        assert_eq!(
            resolve_reference(&json!("aw_00000000000b"), &store),
            Reference::Unresolved(id("aw_00000000000b"))
        );
        assert!(matches!(
            resolve_reference(&json!("soon"), &store),
            Reference::Invalid(_)
        ));
        assert!(matches!(resolve_reference(&json!(-1), &store), Reference::Invalid(_)));
    }

    #[test]
    fn rewrites_same_and_cross_repo_references() {
        let mut store = ResolutionStore::new();
        store.insert(id("aw_00000000000a"), ResolvedEntity::item("octo/app", 5));
        store.insert(id("aw_00000000000b"), ResolvedEntity::item("octo/docs", 6));
        store.insert(id("aw_00000000000c"), ResolvedEntity::draft_item("d1"));

        let text = "#aw_00000000000a #aw_00000000000b #aw_00000000000c #aw_00000000000d";
        let out = rewrite_references(text, &store.snapshot(), "octo/app");

        assert_eq!(out, "#5 octo/docs#6 #aw_00000000000c #aw_00000000000d");
    }
}
