//! The built-in task-management tools.
//!
//! Seven tools over a [`TaskStore`]: list, create, update, delete, toggle
//! completion, summary counts, and prioritization suggestions. Every tool
//! verifies the per-run credential itself and scopes all storage access to
//! the user it was minted for. A row that exists but belongs to another
//! user is reported exactly like a missing row.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Days, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::{Credential, CredentialVerifier};
use crate::error::ToolError;
use crate::nlp::{infer_priority, parse_due_phrase};
use crate::tools::core::{Tool, ToolFuture, ToolRegistry};
use crate::{ToolDef, json_schema_for};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

// ── Domain types ───────────────────────────────────────────────────

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// Completion filter for `list_tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

/// Due-window filter for `get_task_summary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    All,
    Today,
    Week,
    Overdue,
}

/// A stored task, as returned to the model.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|d| d < today)
    }

    fn is_due_today(&self, today: NaiveDate) -> bool {
        self.due_date == Some(today)
    }

    /// Due after today but within the next seven days.
    fn is_due_this_week(&self, today: NaiveDate) -> bool {
        let Some(due) = self.due_date else {
            return false;
        };
        let week_end = today.checked_add_days(Days::new(7)).unwrap_or(today);
        due > today && due <= week_end
    }
}

/// Fields for a new task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
    }
}

// ── TaskStore ──────────────────────────────────────────────────────

/// Storage collaborator for the task tools. All access is scoped by owner;
/// `get`/`update`/`delete` return nothing for rows owned by other users.
pub trait TaskStore: Send + Sync {
    fn list(&self, user_id: Uuid) -> Vec<Task>;
    fn get(&self, user_id: Uuid, task_id: i64) -> Option<Task>;
    fn insert(&self, user_id: Uuid, new: NewTask) -> Task;
    fn update(&self, user_id: Uuid, task_id: i64, patch: TaskPatch) -> Option<Task>;
    fn delete(&self, user_id: Uuid, task_id: i64) -> bool;
}

#[derive(Default)]
struct StoreInner {
    next_id: i64,
    tasks: Vec<Task>,
}

/// In-memory [`TaskStore`] for tests and the demo CLI.
#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TaskStore for InMemoryTaskStore {
    fn list(&self, user_id: Uuid) -> Vec<Task> {
        self.lock()
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    fn get(&self, user_id: Uuid, task_id: i64) -> Option<Task> {
        self.lock()
            .tasks
            .iter()
            .find(|t| t.user_id == user_id && t.id == task_id)
            .cloned()
    }

    fn insert(&self, user_id: Uuid, new: NewTask) -> Task {
        let mut inner = self.lock();
        inner.next_id += 1;
        let now = Utc::now();
        let task = Task {
            id: inner.next_id,
            user_id,
            title: new.title,
            description: new.description,
            completed: false,
            priority: new.priority,
            due_date: new.due_date,
            created_at: now,
            updated_at: now,
        };
        inner.tasks.push(task.clone());
        task
    }

    fn update(&self, user_id: Uuid, task_id: i64, patch: TaskPatch) -> Option<Task> {
        let mut inner = self.lock();
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| t.user_id == user_id && t.id == task_id)?;
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        task.updated_at = Utc::now();
        Some(task.clone())
    }

    fn delete(&self, user_id: Uuid, task_id: i64) -> bool {
        let mut inner = self.lock();
        let before = inner.tasks.len();
        inner
            .tasks
            .retain(|t| !(t.user_id == user_id && t.id == task_id));
        inner.tasks.len() != before
    }
}

// ── Shared helpers ─────────────────────────────────────────────────

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| ToolError::MalformedArguments(format!("invalid arguments: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn validate_title(title: &str) -> Result<String, ToolError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ToolError::Validation("title must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(ToolError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_description(description: &str) -> Result<(), ToolError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ToolError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn parse_due(input: &str, today: NaiveDate) -> Result<NaiveDate, ToolError> {
    parse_due_phrase(input, today).ok_or_else(|| {
        ToolError::Validation(format!(
            "could not parse due date {input:?}; use a phrase like 'tomorrow', \
             'in 3 days', or an ISO date like 2026-09-15"
        ))
    })
}

fn not_found(task_id: i64) -> ToolError {
    ToolError::NotFound(format!("Task {task_id} not found"))
}

// ── list_tasks ─────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct ListTasksArgs {
    /// Filter by completion status.
    #[serde(default)]
    status: StatusFilter,
}

pub struct ListTasks {
    store: Arc<dyn TaskStore>,
    verifier: CredentialVerifier,
}

impl ListTasks {
    pub fn new(store: Arc<dyn TaskStore>, verifier: CredentialVerifier) -> Self {
        Self { store, verifier }
    }
}

impl Tool for ListTasks {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "list_tasks",
            "List the user's tasks, optionally filtered by completion status \
             ('all', 'pending', or 'completed'). Use this before updating or \
             deleting to find the task's numeric id.",
            json_schema_for::<ListTasksArgs>(),
        )
    }

    fn execute(&self, credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
        let credential = credential.clone();
        let arguments = arguments.clone();
        Box::pin(async move {
            let user_id = self.verifier.verify(&credential)?;
            let args: ListTasksArgs = parse_args(&arguments)?;
            let tasks: Vec<Task> = self
                .store
                .list(user_id)
                .into_iter()
                .filter(|t| match args.status {
                    StatusFilter::All => true,
                    StatusFilter::Pending => !t.completed,
                    StatusFilter::Completed => t.completed,
                })
                .collect();
            Ok(json!({
                "tasks": tasks.iter().map(to_json).collect::<Vec<_>>(),
                "count": tasks.len(),
            }))
        })
    }
}

// ── create_task ────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct CreateTaskArgs {
    /// Task title, 1-200 characters.
    title: String,
    /// Optional longer description, up to 1000 characters.
    #[serde(default)]
    description: Option<String>,
    /// 'low', 'normal', or 'high'. Omit to infer from the wording.
    #[serde(default)]
    priority: Option<Priority>,
    /// Due date: a phrase like 'tomorrow' or 'in 3 days', or an ISO date.
    #[serde(default)]
    due_date: Option<String>,
}

pub struct CreateTask {
    store: Arc<dyn TaskStore>,
    verifier: CredentialVerifier,
}

impl CreateTask {
    pub fn new(store: Arc<dyn TaskStore>, verifier: CredentialVerifier) -> Self {
        Self { store, verifier }
    }
}

impl Tool for CreateTask {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "create_task",
            "Create a new task. If the priority is omitted it is inferred \
             from the title and description wording. Due dates accept natural \
             phrases ('tomorrow', 'next week', 'in 3 days') and ISO dates.",
            json_schema_for::<CreateTaskArgs>(),
        )
    }

    fn execute(&self, credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
        let credential = credential.clone();
        let arguments = arguments.clone();
        Box::pin(async move {
            let user_id = self.verifier.verify(&credential)?;
            let args: CreateTaskArgs = parse_args(&arguments)?;

            let title = validate_title(&args.title)?;
            if let Some(description) = &args.description {
                validate_description(description)?;
            }

            let priority = match args.priority {
                Some(p) => p,
                None => {
                    let text = format!(
                        "{title} {}",
                        args.description.as_deref().unwrap_or_default()
                    );
                    infer_priority(&text)
                }
            };

            let today = Utc::now().date_naive();
            let due_date = match &args.due_date {
                Some(s) => Some(parse_due(s, today)?),
                None => None,
            };

            let task = self.store.insert(
                user_id,
                NewTask {
                    title,
                    description: args.description,
                    priority,
                    due_date,
                },
            );
            Ok(to_json(&task))
        })
    }
}

// ── update_task ────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct UpdateTaskArgs {
    /// Numeric id of the task to update.
    task_id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<Priority>,
    /// New due date: a phrase or an ISO date.
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
}

pub struct UpdateTask {
    store: Arc<dyn TaskStore>,
    verifier: CredentialVerifier,
}

impl UpdateTask {
    pub fn new(store: Arc<dyn TaskStore>, verifier: CredentialVerifier) -> Self {
        Self { store, verifier }
    }
}

impl Tool for UpdateTask {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "update_task",
            "Update fields of an existing task by numeric id. At least one \
             field besides task_id must be provided.",
            json_schema_for::<UpdateTaskArgs>(),
        )
    }

    fn execute(&self, credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
        let credential = credential.clone();
        let arguments = arguments.clone();
        Box::pin(async move {
            let user_id = self.verifier.verify(&credential)?;
            let args: UpdateTaskArgs = parse_args(&arguments)?;

            let title = match &args.title {
                Some(t) => Some(validate_title(t)?),
                None => None,
            };
            if let Some(description) = &args.description {
                validate_description(description)?;
            }
            let today = Utc::now().date_naive();
            let due_date = match &args.due_date {
                Some(s) => Some(parse_due(s, today)?),
                None => None,
            };

            let patch = TaskPatch {
                title,
                description: args.description,
                priority: args.priority,
                due_date,
                completed: args.completed,
            };
            if patch.is_empty() {
                return Err(ToolError::Validation(
                    "at least one field to update must be provided".into(),
                ));
            }

            let task = self
                .store
                .update(user_id, args.task_id, patch)
                .ok_or_else(|| not_found(args.task_id))?;
            Ok(to_json(&task))
        })
    }
}

// ── delete_task ────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct DeleteTaskArgs {
    /// Numeric id of the task to delete.
    task_id: i64,
}

pub struct DeleteTask {
    store: Arc<dyn TaskStore>,
    verifier: CredentialVerifier,
}

impl DeleteTask {
    pub fn new(store: Arc<dyn TaskStore>, verifier: CredentialVerifier) -> Self {
        Self { store, verifier }
    }
}

impl Tool for DeleteTask {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "delete_task",
            "Permanently delete a task by numeric id.",
            json_schema_for::<DeleteTaskArgs>(),
        )
    }

    fn execute(&self, credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
        let credential = credential.clone();
        let arguments = arguments.clone();
        Box::pin(async move {
            let user_id = self.verifier.verify(&credential)?;
            let args: DeleteTaskArgs = parse_args(&arguments)?;
            if !self.store.delete(user_id, args.task_id) {
                return Err(not_found(args.task_id));
            }
            Ok(json!({"detail": format!("Task {} deleted", args.task_id)}))
        })
    }
}

// ── toggle_task_completion ─────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct ToggleTaskArgs {
    /// Numeric id of the task to toggle.
    task_id: i64,
}

pub struct ToggleTaskCompletion {
    store: Arc<dyn TaskStore>,
    verifier: CredentialVerifier,
}

impl ToggleTaskCompletion {
    pub fn new(store: Arc<dyn TaskStore>, verifier: CredentialVerifier) -> Self {
        Self { store, verifier }
    }
}

impl Tool for ToggleTaskCompletion {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "toggle_task_completion",
            "Flip a task between completed and pending by numeric id.",
            json_schema_for::<ToggleTaskArgs>(),
        )
    }

    fn execute(&self, credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
        let credential = credential.clone();
        let arguments = arguments.clone();
        Box::pin(async move {
            let user_id = self.verifier.verify(&credential)?;
            let args: ToggleTaskArgs = parse_args(&arguments)?;
            let current = self
                .store
                .get(user_id, args.task_id)
                .ok_or_else(|| not_found(args.task_id))?;
            let task = self
                .store
                .update(
                    user_id,
                    args.task_id,
                    TaskPatch {
                        completed: Some(!current.completed),
                        ..TaskPatch::default()
                    },
                )
                .ok_or_else(|| not_found(args.task_id))?;
            Ok(to_json(&task))
        })
    }
}

// ── get_task_summary ───────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct TaskSummaryArgs {
    /// Restrict the summary to a due window: 'all', 'today', 'week', or
    /// 'overdue'.
    #[serde(default)]
    timeframe: Timeframe,
}

pub struct TaskSummary {
    store: Arc<dyn TaskStore>,
    verifier: CredentialVerifier,
}

impl TaskSummary {
    pub fn new(store: Arc<dyn TaskStore>, verifier: CredentialVerifier) -> Self {
        Self { store, verifier }
    }
}

impl Tool for TaskSummary {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "get_task_summary",
            "Summarize the user's tasks: counts by status, priority, and due \
             window, optionally restricted to a timeframe.",
            json_schema_for::<TaskSummaryArgs>(),
        )
    }

    fn execute(&self, credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
        let credential = credential.clone();
        let arguments = arguments.clone();
        Box::pin(async move {
            let user_id = self.verifier.verify(&credential)?;
            let args: TaskSummaryArgs = parse_args(&arguments)?;
            let today = Utc::now().date_naive();

            let tasks: Vec<Task> = self
                .store
                .list(user_id)
                .into_iter()
                .filter(|t| match args.timeframe {
                    Timeframe::All => true,
                    Timeframe::Today => t.is_due_today(today),
                    Timeframe::Week => t.is_due_today(today) || t.is_due_this_week(today),
                    Timeframe::Overdue => t.is_overdue(today),
                })
                .collect();

            Ok(json!({
                "timeframe": args.timeframe,
                "total": tasks.len(),
                "completed": tasks.iter().filter(|t| t.completed).count(),
                "pending": tasks.iter().filter(|t| !t.completed).count(),
                "high_priority": tasks
                    .iter()
                    .filter(|t| t.priority == Priority::High)
                    .count(),
                "overdue": tasks.iter().filter(|t| t.is_overdue(today)).count(),
                "due_today": tasks.iter().filter(|t| t.is_due_today(today)).count(),
                "due_this_week": tasks.iter().filter(|t| t.is_due_this_week(today)).count(),
            }))
        })
    }
}

// ── suggest_task_prioritization ────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct SuggestPrioritizationArgs {}

pub struct SuggestTaskPrioritization {
    store: Arc<dyn TaskStore>,
    verifier: CredentialVerifier,
}

impl SuggestTaskPrioritization {
    pub fn new(store: Arc<dyn TaskStore>, verifier: CredentialVerifier) -> Self {
        Self { store, verifier }
    }

    fn score(task: &Task, today: NaiveDate) -> (i64, Vec<String>) {
        let mut score = 0;
        let mut reasons = Vec::new();

        if task.is_overdue(today) {
            score += 100;
            reasons.push("overdue".to_string());
        } else if task.is_due_today(today) {
            score += 50;
            reasons.push("due today".to_string());
        } else if task.is_due_this_week(today) {
            score += 25;
            reasons.push("due this week".to_string());
        }

        let (points, label) = match task.priority {
            Priority::High => (30, "high priority"),
            Priority::Normal => (15, "normal priority"),
            Priority::Low => (5, "low priority"),
        };
        score += points;
        reasons.push(label.to_string());

        (score, reasons)
    }
}

impl Tool for SuggestTaskPrioritization {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "suggest_task_prioritization",
            "Rank the user's pending tasks by urgency (due dates and \
             priority) and explain the ranking.",
            json_schema_for::<SuggestPrioritizationArgs>(),
        )
    }

    fn execute(&self, credential: &Credential, arguments: &Value) -> ToolFuture<'_> {
        let credential = credential.clone();
        let arguments = arguments.clone();
        Box::pin(async move {
            let user_id = self.verifier.verify(&credential)?;
            let _args: SuggestPrioritizationArgs = parse_args(&arguments)?;
            let today = Utc::now().date_naive();

            let mut scored: Vec<(i64, Value)> = self
                .store
                .list(user_id)
                .into_iter()
                .filter(|t| !t.completed)
                .map(|t| {
                    let (score, reasons) = Self::score(&t, today);
                    let suggestion = json!({
                        "task_id": t.id,
                        "title": t.title,
                        "priority": t.priority,
                        "due_date": t.due_date,
                        "score": score,
                        "reasoning": reasons.join("; "),
                    });
                    (score, suggestion)
                })
                .collect();

            scored.sort_by(|a, b| b.0.cmp(&a.0));
            let suggestions: Vec<Value> = scored.into_iter().map(|(_, s)| s).collect();
            Ok(json!({"suggestions": suggestions}))
        })
    }
}

// ── Registry assembly ──────────────────────────────────────────────

/// Build a [`ToolRegistry`] with all seven task tools wired to one store
/// and one verifier.
pub fn task_toolset(store: Arc<dyn TaskStore>, verifier: CredentialVerifier) -> ToolRegistry {
    ToolRegistry::new()
        .with(ListTasks::new(store.clone(), verifier.clone()))
        .with(CreateTask::new(store.clone(), verifier.clone()))
        .with(UpdateTask::new(store.clone(), verifier.clone()))
        .with(DeleteTask::new(store.clone(), verifier.clone()))
        .with(ToggleTaskCompletion::new(store.clone(), verifier.clone()))
        .with(TaskSummary::new(store.clone(), verifier.clone()))
        .with(SuggestTaskPrioritization::new(store, verifier))
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialMinter;
    use chrono::Days;

    const SECRET: &str = "test-secret";

    fn fixtures() -> (Arc<InMemoryTaskStore>, CredentialVerifier, Uuid, Credential) {
        let store = Arc::new(InMemoryTaskStore::new());
        let verifier = CredentialVerifier::new(SECRET);
        let user = Uuid::new_v4();
        let cred = CredentialMinter::new(SECRET).mint(user).unwrap();
        (store, verifier, user, cred)
    }

    fn seed(store: &InMemoryTaskStore, user: Uuid, title: &str, due: Option<NaiveDate>) -> Task {
        store.insert(
            user,
            NewTask {
                title: title.into(),
                description: None,
                priority: Priority::Normal,
                due_date: due,
            },
        )
    }

    #[test]
    fn store_scopes_by_user() {
        let store = InMemoryTaskStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let task = seed(&store, alice, "alice's task", None);

        assert!(store.get(bob, task.id).is_none());
        assert!(!store.delete(bob, task.id));
        assert!(store.update(bob, task.id, TaskPatch::default()).is_none());
        assert_eq!(store.list(bob).len(), 0);
        assert_eq!(store.list(alice).len(), 1);
    }

    #[test]
    fn store_ids_are_sequential() {
        let store = InMemoryTaskStore::new();
        let user = Uuid::new_v4();
        let a = seed(&store, user, "a", None);
        let b = seed(&store, user, "b", None);
        assert_eq!(b.id, a.id + 1);
    }

    #[tokio::test]
    async fn create_task_happy_path() {
        let (store, verifier, _user, cred) = fixtures();
        let tool = CreateTask::new(store.clone(), verifier);

        let result = tool
            .execute(&cred, &json!({"title": "Buy milk", "due_date": "tomorrow"}))
            .await
            .unwrap();
        assert_eq!(result["title"], "Buy milk");
        assert_eq!(result["completed"], false);
        assert_eq!(result["priority"], "normal");
        assert!(result["due_date"].is_string());
    }

    #[tokio::test]
    async fn create_task_infers_priority() {
        let (store, verifier, _user, cred) = fixtures();
        let tool = CreateTask::new(store, verifier);

        let result = tool
            .execute(&cred, &json!({"title": "URGENT: fix prod"}))
            .await
            .unwrap();
        assert_eq!(result["priority"], "high");
    }

    #[tokio::test]
    async fn create_task_rejects_bad_title() {
        let (store, verifier, _user, cred) = fixtures();
        let tool = CreateTask::new(store, verifier);

        let err = tool
            .execute(&cred, &json!({"title": "   "}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));

        let err = tool
            .execute(&cred, &json!({"title": "x".repeat(201)}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn create_task_rejects_unparseable_due_date() {
        let (store, verifier, _user, cred) = fixtures();
        let tool = CreateTask::new(store, verifier);

        let err = tool
            .execute(&cred, &json!({"title": "x", "due_date": "whenever"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn forged_credential_is_rejected() {
        let (store, verifier, _user, _cred) = fixtures();
        let tool = ListTasks::new(store, verifier);

        let forged = CredentialMinter::new("other-secret")
            .mint(Uuid::new_v4())
            .unwrap();
        let err = tool.execute(&forged, &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Authentication(_)));
    }

    #[tokio::test]
    async fn list_tasks_filters_by_status() {
        let (store, verifier, user, cred) = fixtures();
        let done = seed(&store, user, "done", None);
        seed(&store, user, "open", None);
        store.update(
            user,
            done.id,
            TaskPatch {
                completed: Some(true),
                ..TaskPatch::default()
            },
        );

        let tool = ListTasks::new(store, verifier);
        let all = tool.execute(&cred, &json!({})).await.unwrap();
        assert_eq!(all["count"], 2);

        let pending = tool
            .execute(&cred, &json!({"status": "pending"}))
            .await
            .unwrap();
        assert_eq!(pending["count"], 1);
        assert_eq!(pending["tasks"][0]["title"], "open");
    }

    #[tokio::test]
    async fn update_requires_a_field() {
        let (store, verifier, user, cred) = fixtures();
        let task = seed(&store, user, "t", None);
        let tool = UpdateTask::new(store, verifier);

        let err = tool
            .execute(&cred, &json!({"task_id": task.id}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn update_missing_task_is_not_found() {
        let (store, verifier, _user, cred) = fixtures();
        let tool = UpdateTask::new(store, verifier);

        let err = tool
            .execute(&cred, &json!({"task_id": 999, "completed": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn another_users_task_reads_as_missing() {
        let (store, verifier, _user, cred) = fixtures();
        let stranger = Uuid::new_v4();
        let foreign = seed(&store, stranger, "not yours", None);

        let tool = DeleteTask::new(store, verifier);
        let err = tool
            .execute(&cred, &json!({"task_id": foreign.id}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_task_reports_detail() {
        let (store, verifier, user, cred) = fixtures();
        let task = seed(&store, user, "t", None);

        let tool = DeleteTask::new(store.clone(), verifier);
        let result = tool
            .execute(&cred, &json!({"task_id": task.id}))
            .await
            .unwrap();
        assert_eq!(result["detail"], format!("Task {} deleted", task.id));
        assert!(store.get(user, task.id).is_none());
    }

    #[tokio::test]
    async fn toggle_flips_both_ways() {
        let (store, verifier, user, cred) = fixtures();
        let task = seed(&store, user, "t", None);
        let tool = ToggleTaskCompletion::new(store.clone(), verifier);

        let result = tool
            .execute(&cred, &json!({"task_id": task.id}))
            .await
            .unwrap();
        assert_eq!(result["completed"], true);

        let result = tool
            .execute(&cred, &json!({"task_id": task.id}))
            .await
            .unwrap();
        assert_eq!(result["completed"], false);
    }

    #[tokio::test]
    async fn summary_counts_due_windows() {
        let (store, verifier, user, cred) = fixtures();
        let today = Utc::now().date_naive();
        seed(&store, user, "overdue", today.checked_sub_days(Days::new(2)));
        seed(&store, user, "today", Some(today));
        seed(&store, user, "this week", today.checked_add_days(Days::new(3)));
        seed(&store, user, "later", today.checked_add_days(Days::new(30)));

        let tool = TaskSummary::new(store, verifier);
        let summary = tool.execute(&cred, &json!({})).await.unwrap();
        assert_eq!(summary["total"], 4);
        assert_eq!(summary["pending"], 4);
        assert_eq!(summary["overdue"], 1);
        assert_eq!(summary["due_today"], 1);
        assert_eq!(summary["due_this_week"], 1);

        let overdue_only = tool
            .execute(&cred, &json!({"timeframe": "overdue"}))
            .await
            .unwrap();
        assert_eq!(overdue_only["total"], 1);
    }

    #[tokio::test]
    async fn prioritization_ranks_overdue_first() {
        let (store, verifier, user, cred) = fixtures();
        let today = Utc::now().date_naive();
        seed(&store, user, "someday", None);
        seed(&store, user, "late", today.checked_sub_days(Days::new(1)));
        seed(&store, user, "today", Some(today));
        let done = seed(&store, user, "finished", Some(today));
        store.update(
            user,
            done.id,
            TaskPatch {
                completed: Some(true),
                ..TaskPatch::default()
            },
        );

        let tool = SuggestTaskPrioritization::new(store, verifier);
        let result = tool.execute(&cred, &json!({})).await.unwrap();
        let suggestions = result["suggestions"].as_array().unwrap();

        // Completed tasks are excluded.
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0]["title"], "late");
        assert_eq!(suggestions[0]["score"], 115);
        assert!(
            suggestions[0]["reasoning"]
                .as_str()
                .unwrap()
                .contains("overdue")
        );
        assert_eq!(suggestions[1]["title"], "today");
        assert_eq!(suggestions[2]["title"], "someday");
    }

    #[test]
    fn task_toolset_registers_all_seven() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let registry = task_toolset(store, CredentialVerifier::new(SECRET));
        assert_eq!(registry.len(), 7);
        for name in [
            "list_tasks",
            "create_task",
            "update_task",
            "delete_task",
            "toggle_task_completion",
            "get_task_summary",
            "suggest_task_prioritization",
        ] {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }
    }

    #[test]
    fn tool_schemas_never_mention_credentials() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let registry = task_toolset(store, CredentialVerifier::new(SECRET));
        for def in registry.definitions() {
            let schema = serde_json::to_string(&def.function.parameters).unwrap();
            assert!(!schema.contains("credential"), "{}", def.function.name);
            assert!(!schema.contains("token"), "{}", def.function.name);
        }
    }
}
