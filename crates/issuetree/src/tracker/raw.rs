//! Builder for tracker-shaped raw records.
//!
//! Produces the same JSON layout the tracker's REST API returns, so
//! synthetic snapshots go through exactly the translation path real data
//! does.

use crate::config::{DEFAULT_EPIC_LINK_FIELD, DEFAULT_PARENT_LINK_FIELD};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

/// Start building a raw record for `key`.
///
/// Defaults: type `Task`, status `In Progress` (category `indeterminate`),
/// created and updated at `2024-01-01T00:00:00Z`.
pub fn raw_issue(key: &str) -> RawIssueBuilder {
    RawIssueBuilder::new(key)
}

/// Builder for one raw tracker record.
#[derive(Debug, Clone)]
pub struct RawIssueBuilder {
    key: String,
    fields: Map<String, Value>,
    links: Vec<Value>,
    subtasks: Vec<Value>,
    comments: Vec<Value>,
}

impl RawIssueBuilder {
    /// Create a builder with default field values.
    pub fn new(key: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("issuetype".into(), json!({"name": "Task"}));
        fields.insert("summary".into(), json!(format!("Summary of {key}")));
        fields.insert("created".into(), json!("2024-01-01T00:00:00Z"));
        fields.insert("updated".into(), json!("2024-01-01T00:00:00Z"));
        fields.insert("labels".into(), json!([]));

        let builder = Self {
            key: key.to_string(),
            fields,
            links: Vec::new(),
            subtasks: Vec::new(),
            comments: Vec::new(),
        };
        builder.status("In Progress", "indeterminate")
    }

    /// Set the issue type name.
    #[must_use]
    pub fn issue_type(mut self, name: &str) -> Self {
        self.fields.insert("issuetype".into(), json!({"name": name}));
        self
    }

    /// Set the summary.
    #[must_use]
    pub fn summary(mut self, summary: &str) -> Self {
        self.fields.insert("summary".into(), json!(summary));
        self
    }

    /// Set status name and status-category key (`new`, `indeterminate`, `done`).
    #[must_use]
    pub fn status(mut self, name: &str, category_key: &str) -> Self {
        self.fields.insert(
            "status".into(),
            json!({"name": name, "statusCategory": {"key": category_key}}),
        );
        self
    }

    /// Shorthand for a `New` status named "To Do".
    #[must_use]
    pub fn new_status(self) -> Self {
        self.status("To Do", "new")
    }

    /// Shorthand for a `Done` status named "Closed".
    #[must_use]
    pub fn done(self) -> Self {
        self.status("Closed", "done")
    }

    /// Set the priority name.
    #[must_use]
    pub fn priority(mut self, name: &str) -> Self {
        self.fields.insert("priority".into(), json!({"name": name}));
        self
    }

    /// Set the last-updated timestamp.
    #[must_use]
    pub fn updated(mut self, at: DateTime<Utc>) -> Self {
        self.fields.insert("updated".into(), json!(at.to_rfc3339()));
        self
    }

    /// Set the creation timestamp.
    #[must_use]
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.fields.insert("created".into(), json!(at.to_rfc3339()));
        self
    }

    /// Add a sub-task reference.
    #[must_use]
    pub fn subtask(mut self, key: &str) -> Self {
        self.subtasks.push(json!({"key": key}));
        self
    }

    /// Add several sub-task references in order.
    #[must_use]
    pub fn subtasks(self, keys: &[&str]) -> Self {
        keys.iter().fold(self, |builder, key| builder.subtask(key))
    }

    /// Set the built-in `parent` field.
    #[must_use]
    pub fn parent(mut self, key: &str) -> Self {
        self.fields.insert("parent".into(), json!({"key": key}));
        self
    }

    /// Set the default epic-link custom field.
    #[must_use]
    pub fn epic_link(mut self, key: &str) -> Self {
        self.fields
            .insert(DEFAULT_EPIC_LINK_FIELD.into(), json!(key));
        self
    }

    /// Set the default hierarchy ("Parent Link") custom field.
    #[must_use]
    pub fn parent_link(mut self, key: &str) -> Self {
        self.fields
            .insert(DEFAULT_PARENT_LINK_FIELD.into(), json!(key));
        self
    }

    /// Add an arbitrary link. `inward` selects which side `other` sits on.
    #[must_use]
    pub fn link(
        mut self,
        name: &str,
        inward_phrase: &str,
        outward_phrase: &str,
        inward: bool,
        other: Value,
    ) -> Self {
        let side = if inward { "inwardIssue" } else { "outwardIssue" };
        let mut link = Map::new();
        link.insert(
            "type".into(),
            json!({"name": name, "inward": inward_phrase, "outward": outward_phrase}),
        );
        link.insert(side.into(), other);
        self.links.push(Value::Object(link));
        self
    }

    /// This issue is blocked by `key`.
    #[must_use]
    pub fn blocked_by(self, key: &str) -> Self {
        self.link("Blocks", "is blocked by", "blocks", true, json!({"key": key}))
    }

    /// This issue is blocked by `key`, whose status category is embedded in the link.
    #[must_use]
    pub fn blocked_by_with_status(self, key: &str, category_key: &str) -> Self {
        let other = json!({
            "key": key,
            "fields": {"status": {"statusCategory": {"key": category_key}}}
        });
        self.link("Blocks", "is blocked by", "blocks", true, other)
    }

    /// This issue blocks `key`.
    #[must_use]
    pub fn blocks(self, key: &str) -> Self {
        self.link("Blocks", "is blocked by", "blocks", false, json!({"key": key}))
    }

    /// This issue relates to `key`.
    #[must_use]
    pub fn relates_to(self, key: &str) -> Self {
        self.link(
            "Relates",
            "is related to",
            "relates to",
            false,
            json!({"key": key}),
        )
    }

    /// Set the reporter's user name.
    #[must_use]
    pub fn reporter(mut self, name: &str) -> Self {
        self.fields.insert("reporter".into(), json!({"name": name}));
        self
    }

    /// Set the assignee's user name.
    #[must_use]
    pub fn assignee(mut self, name: &str) -> Self {
        self.fields.insert("assignee".into(), json!({"name": name}));
        self
    }

    /// Add a comment by `name`.
    #[must_use]
    pub fn comment_by(mut self, name: &str) -> Self {
        self.comments
            .push(json!({"author": {"name": name}, "body": ""}));
        self
    }

    /// Set an arbitrary field.
    #[must_use]
    pub fn field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Produce the raw record.
    pub fn build(self) -> Value {
        let mut fields = self.fields;
        fields.insert("subtasks".into(), Value::Array(self.subtasks));
        fields.insert("issuelinks".into(), Value::Array(self.links));
        fields.insert("comment".into(), json!({"comments": self.comments}));
        json!({"key": self.key, "fields": fields})
    }
}
