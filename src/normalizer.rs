//! Action normalizer: turns whatever a model emitted into schema-safe actions.
//!
//! Model output is untrusted. Every entry is checked against the request
//! state; entries that would reference an unknown task or time block, or
//! that are missing required fields, are dropped and reported. New-entity
//! ids are minted here when the model left them out or reused an id that
//! already belongs to an existing task.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{Action, ChatRequest, Priority, Task, new_entity_id};

/// Extract a JSON block from model output, stripping markdown fences and
/// surrounding prose.
pub fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    if let Some(start) = trimmed.find('{')
        && let Some(end) = trimmed.rfind('}')
        && end > start
    {
        return &trimmed[start..=end];
    }

    trimmed
}

/// Decode model output as a JSON object.
///
/// The whole reply is tried as JSON before any fence or brace extraction,
/// so string values that contain backticks survive intact.
///
/// # Errors
///
/// Returns a description of the failure when the text is not a JSON object.
pub fn parse_json_object(raw: &str) -> Result<Map<String, Value>, String> {
    let decoded = serde_json::from_str::<Value>(raw.trim())
        .or_else(|_| serde_json::from_str::<Value>(extract_json_block(raw)));
    match decoded {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a timestamp the way models write them.
///
/// Accepts RFC 3339, naive date-times (taken as UTC) and bare dates
/// (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// What the normalizer kept and why it dropped the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    pub kept: usize,
    /// One human-readable reason per dropped entry.
    pub dropped: Vec<String>,
    /// createTask entries whose id was replaced with a fresh one.
    pub reassigned_ids: usize,
}

impl NormalizationReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }

    fn record_drop(&mut self, index: usize, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(index, %reason, "dropping model action");
        self.dropped.push(format!("#{index}: {reason}"));
    }
}

/// Normalize a model's `actions` value against the request state.
///
/// Order is preserved. A `createTimeBlock` may reference a task created
/// earlier in the same list.
pub fn normalize_actions(
    raw: &Value,
    request: &ChatRequest,
    now: DateTime<Utc>,
) -> (Vec<Action>, NormalizationReport) {
    let mut report = NormalizationReport::default();
    let entries: &[Value] = match raw {
        Value::Array(entries) => entries.as_slice(),
        Value::Null => &[],
        other => {
            report.record_drop(0, format!("actions is {}, not an array", json_kind(other)));
            &[]
        }
    };

    let mut batch = Batch::new(request);
    let mut actions = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match batch.normalize(entry, now, &mut report) {
            Ok(action) => actions.push(action),
            Err(reason) => report.record_drop(index, reason),
        }
    }
    report.kept = actions.len();
    (actions, report)
}

/// Per-call state: which ids exist and which were created so far.
struct Batch<'a> {
    request: &'a ChatRequest,
    created: HashSet<String>,
    /// Repeated new-task ids that were replaced, mapped to their new value.
    remapped: HashMap<String, String>,
}

type Normalized = std::result::Result<Action, String>;

impl<'a> Batch<'a> {
    fn new(request: &'a ChatRequest) -> Self {
        Self {
            request,
            created: HashSet::new(),
            remapped: HashMap::new(),
        }
    }

    fn normalize(
        &mut self,
        entry: &Value,
        now: DateTime<Utc>,
        report: &mut NormalizationReport,
    ) -> Normalized {
        let obj = entry.as_object().ok_or("entry is not an object")?;
        let action_type = obj
            .get("action_type")
            .and_then(Value::as_str)
            .ok_or("missing action_type")?;
        let empty = Map::new();
        let payload = match obj.get("payload") {
            Some(Value::Object(p)) => p,
            None | Some(Value::Null) => &empty,
            Some(_) => return Err(format!("{action_type} payload is not an object")),
        };

        match action_type {
            "createTask" => self.create_task(payload, now, report),
            "updateTask" => self.update_task(payload),
            "deleteTask" => {
                let id = self.existing_task_id(payload, action_type)?;
                Ok(Action::DeleteTask { id })
            }
            "toggleTaskCompletion" => {
                let id = self.existing_task_id(payload, action_type)?;
                Ok(Action::ToggleTaskCompletion { id })
            }
            "createTimeBlock" => self.create_time_block(payload),
            "updateTimeBlock" => self.update_time_block(payload),
            "deleteTimeBlock" => {
                let id = self.existing_block_id(payload, action_type)?;
                Ok(Action::DeleteTimeBlock { id })
            }
            other => Err(format!("unknown action_type {other:?}")),
        }
    }

    fn create_task(
        &mut self,
        payload: &Map<String, Value>,
        now: DateTime<Utc>,
        report: &mut NormalizationReport,
    ) -> Normalized {
        let fields = payload
            .get("task")
            .and_then(Value::as_object)
            .ok_or("createTask without a task object")?;
        let title = non_blank_str(fields.get("title")).ok_or("createTask without a title")?;

        let proposed = non_blank_str(fields.get("id"));
        let id = match proposed {
            Some(id) if !self.id_taken(id) => id.to_owned(),
            _ => {
                let fresh = new_entity_id();
                // An existing task keeps its id for later references; only a
                // repeated new id follows the replacement.
                if let Some(old) = proposed
                    && self.request.task(old).is_none()
                {
                    self.remapped.insert(old.to_owned(), fresh.clone());
                }
                report.reassigned_ids += 1;
                fresh
            }
        };
        self.created.insert(id.clone());

        let task = Task {
            id,
            title: title.to_owned(),
            description: opt_string(fields.get("description")),
            is_completed: fields
                .get("is_completed")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            priority: opt_priority(fields.get("priority")),
            creation_date: opt_timestamp(fields.get("creation_date")).unwrap_or(now),
            deadline: opt_timestamp(fields.get("deadline")),
            predicted_duration_in_minutes: opt_minutes(fields.get("predicted_duration_in_minutes")),
        };
        Ok(Action::CreateTask { task })
    }

    fn update_task(&self, payload: &Map<String, Value>) -> Normalized {
        let id = self.existing_task_id(payload, "updateTask")?;
        let fields = payload
            .get("updatedTask")
            .and_then(Value::as_object)
            .ok_or("updateTask without an updatedTask object")?;
        let original = self
            .request
            .task(&id)
            .ok_or("updateTask target vanished")?;
        Ok(Action::UpdateTask {
            updated_task: merge_task(original, fields),
            id,
        })
    }

    fn create_time_block(&self, payload: &Map<String, Value>) -> Normalized {
        let raw_id =
            non_blank_str(payload.get("task_id")).ok_or("createTimeBlock without a task_id")?;
        let task_id = self
            .remapped
            .get(raw_id)
            .cloned()
            .unwrap_or_else(|| raw_id.to_owned());
        if self.request.task(&task_id).is_none() && !self.created.contains(&task_id) {
            return Err(format!("createTimeBlock references unknown task {task_id}"));
        }
        let start_time = opt_timestamp(payload.get("start_time"))
            .ok_or("createTimeBlock without a valid start_time")?;
        let duration_in_minutes = opt_minutes(payload.get("duration_in_minutes"))
            .filter(|m| *m > 0)
            .ok_or("createTimeBlock without a positive duration_in_minutes")?;
        Ok(Action::CreateTimeBlock {
            task_id,
            start_time,
            duration_in_minutes,
        })
    }

    fn update_time_block(&self, payload: &Map<String, Value>) -> Normalized {
        let id = self.existing_block_id(payload, "updateTimeBlock")?;
        let new_start_time = opt_timestamp(payload.get("new_start_time"));
        let new_duration_in_minutes =
            opt_minutes(payload.get("new_duration_in_minutes")).filter(|m| *m > 0);
        if new_start_time.is_none() && new_duration_in_minutes.is_none() {
            return Err("updateTimeBlock changes nothing".to_owned());
        }
        Ok(Action::UpdateTimeBlock {
            id,
            new_start_time,
            new_duration_in_minutes,
        })
    }

    fn id_taken(&self, id: &str) -> bool {
        self.request.task(id).is_some() || self.created.contains(id)
    }

    fn existing_task_id(
        &self,
        payload: &Map<String, Value>,
        action_type: &str,
    ) -> std::result::Result<String, String> {
        let id = non_blank_str(payload.get("id"))
            .ok_or_else(|| format!("{action_type} without an id"))?;
        if self.request.task(id).is_none() {
            return Err(format!("{action_type} references unknown task {id}"));
        }
        Ok(id.to_owned())
    }

    fn existing_block_id(
        &self,
        payload: &Map<String, Value>,
        action_type: &str,
    ) -> std::result::Result<String, String> {
        let id = non_blank_str(payload.get("id"))
            .ok_or_else(|| format!("{action_type} without an id"))?;
        if self.request.time_block(id).is_none() {
            return Err(format!("{action_type} references unknown time block {id}"));
        }
        Ok(id.to_owned())
    }
}

/// Overlay model-supplied fields on the original task. The id never changes.
fn merge_task(original: &Task, fields: &Map<String, Value>) -> Task {
    let mut task = original.clone();
    if let Some(title) = non_blank_str(fields.get("title")) {
        title.clone_into(&mut task.title);
    }
    if let Some(value) = fields.get("description") {
        task.description = opt_string(Some(value));
    }
    if let Some(done) = fields.get("is_completed").and_then(Value::as_bool) {
        task.is_completed = done;
    }
    if let Some(value) = fields.get("priority") {
        task.priority = opt_priority(Some(value));
    }
    if let Some(value) = fields.get("deadline") {
        task.deadline = opt_timestamp(Some(value));
    }
    if let Some(value) = fields.get("predicted_duration_in_minutes") {
        task.predicted_duration_in_minutes = opt_minutes(Some(value));
    }
    if let Some(created) = opt_timestamp(fields.get("creation_date")) {
        task.creation_date = created;
    }
    task
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn opt_string(value: Option<&Value>) -> Option<String> {
    non_blank_str(value).map(str::to_owned)
}

fn opt_priority(value: Option<&Value>) -> Option<Priority> {
    value.and_then(Value::as_str).and_then(Priority::parse_lenient)
}

fn opt_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value.and_then(Value::as_str).and_then(parse_timestamp)
}

fn opt_minutes(value: Option<&Value>) -> Option<u32> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))?;
    if f.is_finite() && f >= 0.0 && f <= f64::from(u32::MAX) {
        Some(f.round() as u32)
    } else {
        None
    }
}
