//! Translation of raw tracker JSON into [`IssueRecord`].
//!
//! This is the only place that looks at raw field names. Required fields
//! that are absent or of the wrong type fail with [`Error::DataShape`];
//! nothing is silently defaulted, because a defaulted status would quietly
//! corrupt roll-up classification.
//!
//! Optional collections (`subtasks`, `issuelinks`, `labels`, `comment`) are
//! treated as empty when the field was not requested, but must have the right
//! shape when present.

use super::{
    IssueKey, IssueLink, IssueRecord, LinkDirection, LinkType, ParentRef, ParentSource,
    StatusCategory,
};
use crate::config::FieldMap;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Key used in error messages when the record has no usable key.
const UNKNOWN_KEY: &str = "<unknown>";

/// The tracker's built-in parent field.
pub const PARENT_FIELD: &str = "parent";

/// Translate one raw tracker record.
///
/// # Errors
///
/// Returns `Error::DataShape` if `key`, `fields.issuetype.name`,
/// `fields.status.name`, `fields.status.statusCategory.key`, `fields.summary`,
/// `fields.created`, or `fields.updated` is missing or malformed, or if an
/// optional collection is present with the wrong shape.
pub fn parse_record(raw: &Value, field_map: &FieldMap) -> Result<IssueRecord> {
    let key = raw
        .get("key")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::data_shape(UNKNOWN_KEY, "key", "is missing"))?;
    let fields = raw
        .get("fields")
        .filter(|f| f.is_object())
        .ok_or_else(|| Error::data_shape(key, "fields", "is missing"))?;

    let reader = FieldReader { key, fields };

    let category_key = reader.required_str("/status/statusCategory/key")?;
    let status_category = StatusCategory::from_tracker_key(category_key).ok_or_else(|| {
        Error::data_shape(
            key,
            "fields.status.statusCategory.key",
            format!("has unknown value '{category_key}'"),
        )
    })?;

    Ok(IssueRecord {
        key: IssueKey::new(key),
        issue_type: reader.required_str("/issuetype/name")?.to_string(),
        status: reader.required_str("/status/name")?.to_string(),
        status_category,
        priority: reader.optional_str("/priority/name").map(str::to_string),
        summary: reader.required_str("/summary")?.to_string(),
        labels: reader.labels()?,
        created: reader.required_timestamp("/created")?,
        updated: reader.required_timestamp("/updated")?,
        parent: reader.parent(field_map)?,
        children: reader.subtasks()?,
        links: reader.links()?,
        reporter: reader.fields.get("reporter").and_then(user_id),
        assignee: reader.fields.get("assignee").and_then(user_id),
        comment_authors: reader.comment_authors()?,
    })
}

/// Extract the key of a raw record without validating anything else.
pub fn raw_key(raw: &Value) -> Option<IssueKey> {
    raw.get("key").and_then(Value::as_str).map(IssueKey::from)
}

/// Parse a tracker timestamp.
///
/// Accepts RFC 3339 as well as the tracker's native
/// `2024-01-15T10:30:00.000+0000` form (offset without a colon).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

struct FieldReader<'a> {
    key: &'a str,
    fields: &'a Value,
}

impl<'a> FieldReader<'a> {
    fn path_name(pointer: &str) -> String {
        format!("fields{}", pointer.replace('/', "."))
    }

    fn required_str(&self, pointer: &str) -> Result<&'a str> {
        match self.fields.pointer(pointer) {
            Some(Value::String(s)) => Ok(s),
            Some(Value::Null) | None => Err(Error::data_shape(
                self.key,
                Self::path_name(pointer),
                "is missing",
            )),
            Some(_) => Err(Error::data_shape(
                self.key,
                Self::path_name(pointer),
                "is not a string",
            )),
        }
    }

    fn optional_str(&self, pointer: &str) -> Option<&'a str> {
        self.fields.pointer(pointer).and_then(Value::as_str)
    }

    fn required_timestamp(&self, pointer: &str) -> Result<DateTime<Utc>> {
        let raw = self.required_str(pointer)?;
        parse_timestamp(raw).ok_or_else(|| {
            Error::data_shape(
                self.key,
                Self::path_name(pointer),
                format!("is not a timestamp: '{raw}'"),
            )
        })
    }

    /// Optional array field: absent or null is empty, anything else must be an array.
    fn optional_array(&self, pointer: &str) -> Result<&'a [Value]> {
        match self.fields.pointer(pointer) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(Error::data_shape(
                self.key,
                Self::path_name(pointer),
                "is not an array",
            )),
        }
    }

    fn labels(&self) -> Result<Vec<String>> {
        self.optional_array("/labels")?
            .iter()
            .map(|label| {
                label.as_str().map(str::to_string).ok_or_else(|| {
                    Error::data_shape(self.key, "fields.labels", "contains a non-string label")
                })
            })
            .collect()
    }

    fn subtasks(&self) -> Result<Vec<IssueKey>> {
        self.optional_array("/subtasks")?
            .iter()
            .map(|subtask| {
                referenced_key(subtask).ok_or_else(|| {
                    Error::data_shape(self.key, "fields.subtasks", "entry has no key")
                })
            })
            .collect()
    }

    /// Resolve the authoritative parent.
    ///
    /// Precedence: hierarchy parent, then the built-in `parent` field, then
    /// the epic link. Lower-precedence values are ignored when a higher one
    /// is populated.
    fn parent(&self, field_map: &FieldMap) -> Result<Option<ParentRef>> {
        let candidates = [
            (field_map.parent_link.as_str(), ParentSource::Hierarchy),
            (PARENT_FIELD, ParentSource::Parent),
            (field_map.epic_link.as_str(), ParentSource::EpicLink),
        ];

        for (field, source) in candidates {
            match self.fields.get(field) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    let key = referenced_key(value).ok_or_else(|| {
                        Error::data_shape(
                            self.key,
                            format!("fields.{field}"),
                            "is neither a key nor an issue reference",
                        )
                    })?;
                    return Ok(Some(ParentRef { key, source }));
                }
            }
        }

        Ok(None)
    }

    fn links(&self) -> Result<Vec<IssueLink>> {
        let mut links = Vec::new();

        for link in self.optional_array("/issuelinks")? {
            let link_type = link
                .get("type")
                .and_then(|t| {
                    Some(LinkType {
                        name: t.get("name")?.as_str()?.to_string(),
                        inward: t.get("inward")?.as_str()?.to_string(),
                        outward: t.get("outward")?.as_str()?.to_string(),
                    })
                })
                .ok_or_else(|| {
                    Error::data_shape(self.key, "fields.issuelinks.type", "is incomplete")
                })?;

            let (direction, other) = if let Some(other) = link.get("inwardIssue") {
                (LinkDirection::Inward, other)
            } else if let Some(other) = link.get("outwardIssue") {
                (LinkDirection::Outward, other)
            } else {
                return Err(Error::data_shape(
                    self.key,
                    "fields.issuelinks",
                    "entry has neither inwardIssue nor outwardIssue",
                ));
            };

            let target = referenced_key(other).ok_or_else(|| {
                Error::data_shape(self.key, "fields.issuelinks", "linked issue has no key")
            })?;
            let target_status = other
                .pointer("/fields/status/statusCategory/key")
                .and_then(Value::as_str)
                .and_then(StatusCategory::from_tracker_key);

            links.push(IssueLink {
                link_type,
                direction,
                target,
                target_status,
            });
        }

        Ok(links)
    }

    fn comment_authors(&self) -> Result<Vec<String>> {
        Ok(self
            .optional_array("/comment/comments")?
            .iter()
            .filter_map(|comment| comment.get("author").and_then(user_id))
            .collect())
    }
}

/// A reference is either a bare key string or an object with a `key` member.
pub(crate) fn referenced_key(value: &Value) -> Option<IssueKey> {
    match value {
        Value::String(s) if !s.is_empty() => Some(IssueKey::new(s.as_str())),
        Value::Object(_) => value
            .get("key")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(IssueKey::from),
        _ => None,
    }
}

/// Stable identifier of a user object: account id, then user name, then user key.
fn user_id(user: &Value) -> Option<String> {
    ["accountId", "name", "key"]
        .iter()
        .find_map(|field| user.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}
