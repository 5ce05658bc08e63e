use chrono::{NaiveDateTime, NaiveTime};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use super::{
    AuthProvider, DocRef, Direction, Document, DocumentStore, Filter, Query, StoreError,
    Subscription, User,
};
use crate::core::recurrence::RecurrenceError;
use crate::core::task::{DraftError, Task, TaskDraft, TaskStatus, UserRole};

pub const TASKS_COLLECTION: &str = "tasks";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("not allowed to change task {0}")]
    Forbidden(Uuid),
    #[error("task {0} is already completed")]
    AlreadyCompleted(Uuid),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of completing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub completed: Task,
    /// The next instance of a recurring series, already stored.
    pub next: Option<Task>,
}

/// Task operations on top of the hosted document store.
pub struct TaskService<S, A> {
    store: S,
    auth: A,
    default_time: NaiveTime,
}

impl<S: DocumentStore, A: AuthProvider> TaskService<S, A> {
    pub fn new(store: S, auth: A, default_time: NaiveTime) -> Self {
        Self {
            store,
            auth,
            default_time,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn require_user(&self) -> Result<User, ServiceError> {
        self.auth.current_user().ok_or(ServiceError::NotSignedIn)
    }

    fn doc_ref(id: Uuid) -> DocRef {
        DocRef::new(TASKS_COLLECTION, id.to_string())
    }

    /// Validate the form and store a new task. A recurring task gets its
    /// first `next_occurrence`, anchored on the later of its due date and `now`.
    pub async fn create_task(&self, draft: &TaskDraft, now: NaiveDateTime) -> Result<Task, ServiceError> {
        let user = self.require_user()?;
        let mut task = Task::from_draft(draft, &user.uid, now, self.default_time)?;
        if task.team.is_none() {
            task.team = user.team.clone();
        }
        if let Some(rule) = task.recurrence.as_mut() {
            rule.schedule_initial(task.due.unwrap_or(now), now)?;
        }
        self.store
            .create(TASKS_COLLECTION, serde_json::to_value(&task).map_err(StoreError::from)?)
            .await
            .inspect_err(|e| log::error!("Failed to create task: {}", e))?;
        log::info!("Created task {} ({})", task.id, task.title);
        Ok(task)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task, ServiceError> {
        let data = self.store.get(&Self::doc_ref(id)).await?;
        Ok(serde_json::from_value(data).map_err(StoreError::from)?)
    }

    /// Mark a task completed. A recurring task rolls its rule forward from the
    /// stored `next_occurrence` and spawns the next instance due at that
    /// occurrence. The successor is stored before the completion, so a failed
    /// call leaves the series open and the call can be retried.
    pub async fn complete_task(&self, id: Uuid, now: NaiveDateTime) -> Result<Completion, ServiceError> {
        let user = self.require_user()?;
        let mut task = self.get_task(id).await?;
        if !can_edit(&user, &task) {
            return Err(ServiceError::Forbidden(id));
        }
        if task.status.is_done() {
            return Err(ServiceError::AlreadyCompleted(id));
        }

        let next = match &task.recurrence {
            Some(rule) => {
                let mut rule = rule.clone();
                let due = rule.next_occurrence.ok_or(RecurrenceError::InvalidDate)?;
                rule.roll_forward()?;
                let mut next = task.next_instance(due, now);
                next.recurrence = Some(rule);
                Some(next)
            }
            None => None,
        };

        if let Some(next) = &next {
            self.store
                .create(TASKS_COLLECTION, serde_json::to_value(next).map_err(StoreError::from)?)
                .await
                .inspect_err(|e| log::error!("Failed to schedule next instance of {}: {}", id, e))?;
        }

        task.complete(now);
        let marked = self
            .store
            .update(
                &Self::doc_ref(id),
                json!({ "status": task.status, "completed": task.completed }),
            )
            .await;
        if let Err(e) = marked {
            log::error!("Failed to complete task {}: {}", id, e);
            if let Some(next) = &next {
                if let Err(undo) = self.store.delete(&Self::doc_ref(next.id)).await {
                    log::warn!("Could not withdraw next instance {} of {}: {}", next.id, id, undo);
                }
            }
            return Err(e.into());
        }
        log::info!("Completed task {}", id);
        if let Some(next) = &next {
            log::info!("Rolled over task {}: next instance {} due {:?}", id, next.id, next.due);
        }

        Ok(Completion {
            completed: task,
            next,
        })
    }

    /// Replace the editable fields of a task from a form. Identity, owner,
    /// creation time and the recurrence schedule are kept. Completing a
    /// recurring task through the form goes through [`Self::complete_task`]
    /// so the series rolls over.
    pub async fn update_task(&self, id: Uuid, draft: &TaskDraft, now: NaiveDateTime) -> Result<Task, ServiceError> {
        let user = self.require_user()?;
        let current = self.get_task(id).await?;
        if !can_edit(&user, &current) {
            return Err(ServiceError::Forbidden(id));
        }
        let edited = Task::from_draft(draft, &current.owner, now, self.default_time)?;
        let completes_series =
            current.is_recurring() && !current.status.is_done() && edited.status.is_done();
        let (status, completed) = if completes_series {
            (current.status, None)
        } else if edited.status.is_done() {
            (edited.status, current.completed.or(edited.completed))
        } else {
            (edited.status, None)
        };
        let task = Task {
            id: current.id,
            owner: current.owner,
            created: current.created,
            recurrence: current.recurrence,
            status,
            completed,
            team: edited.team.or(current.team),
            ..edited
        };
        self.store
            .update(&Self::doc_ref(id), serde_json::to_value(&task).map_err(StoreError::from)?)
            .await?;
        log::info!("Updated task {}", id);
        if completes_series {
            return Ok(self.complete_task(id, now).await?.completed);
        }
        Ok(task)
    }

    pub async fn assign_task(&self, id: Uuid, member: Option<&str>) -> Result<(), ServiceError> {
        let user = self.require_user()?;
        let task = self.get_task(id).await?;
        if !can_manage(&user, &task) {
            return Err(ServiceError::Forbidden(id));
        }
        self.store
            .update(&Self::doc_ref(id), json!({ "assignee": member }))
            .await?;
        log::info!("Assigned task {} to {:?}", id, member);
        Ok(())
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), ServiceError> {
        let user = self.require_user()?;
        let task = self.get_task(id).await?;
        if !can_manage(&user, &task) {
            return Err(ServiceError::Forbidden(id));
        }
        self.store.delete(&Self::doc_ref(id)).await?;
        log::info!("Deleted task {}", id);
        Ok(())
    }

    /// Tasks visible to the signed-in user, oldest first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ServiceError> {
        let user = self.require_user()?;
        let query = Query::collection(TASKS_COLLECTION).order_by("created", Direction::Ascending);
        let tasks = decode_tasks(self.store.query(&query).await?);
        Ok(tasks
            .into_iter()
            .filter(|t| t.visible_to(&user.uid, user.role, user.team.as_deref()))
            .collect())
    }

    pub async fn tasks_with_status(&self, status: TaskStatus) -> Result<Vec<Task>, ServiceError> {
        let user = self.require_user()?;
        let query = Query::collection(TASKS_COLLECTION)
            .filter(Filter::eq("status", status.as_slug()))
            .order_by("due", Direction::Ascending);
        Ok(decode_tasks(self.store.query(&query).await?)
            .into_iter()
            .filter(|t| t.visible_to(&user.uid, user.role, user.team.as_deref()))
            .collect())
    }

    /// Live feed of every task, newest snapshot per item.
    pub fn subscribe(&self) -> TaskFeed {
        TaskFeed {
            inner: self
                .store
                .subscribe(Query::collection(TASKS_COLLECTION).order_by("created", Direction::Ascending)),
        }
    }
}

fn can_edit(user: &User, task: &Task) -> bool {
    task.visible_to(&user.uid, user.role, user.team.as_deref())
}

fn can_manage(user: &User, task: &Task) -> bool {
    task.owner == user.uid
        || (user.role == UserRole::Admin && user.team.is_some() && task.team == user.team)
}

/// Documents that do not decode as tasks are skipped with a warning.
fn decode_tasks(docs: Vec<Document>) -> Vec<Task> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<Task>(doc.data) {
            Ok(task) => Some(task),
            Err(e) => {
                log::warn!("Skipping malformed task {}: {}", doc.reference.id, e);
                None
            }
        })
        .collect()
}

pub struct TaskFeed {
    inner: Subscription,
}

impl TaskFeed {
    pub async fn next(&mut self) -> Option<Result<Vec<Task>, StoreError>> {
        Some(self.inner.next().await?.map(decode_tasks))
    }
}
