use anyhow::anyhow;
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::session::Session;
use crate::task::Task;

/// The input form shared by the create and update submit paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
}

impl TaskForm {
    pub fn clear(&mut self) {
        self.title.clear();
        self.description.clear();
    }
}

/// The task-list view-model: the last-fetched collection, the edit-mode
/// target, and the input form. Every mutating operation ends with a full
/// refetch, so the cached collection always mirrors the server's last
/// answer — there is no diffing and no optimistic update.
///
/// Edit mode holds at most one task id. The submit label and the cancel
/// control are derived from it and can never disagree with it.
#[derive(Debug, Default)]
pub struct TaskListView {
    tasks: Vec<Task>,
    editing: Option<u64>,
    pub form: TaskForm,
}

impl TaskListView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn editing(&self) -> Option<u64> {
        self.editing
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn submit_label(&self) -> &'static str {
        if self.editing.is_some() {
            "Update task"
        } else {
            "Add task"
        }
    }

    pub fn cancel_visible(&self) -> bool {
        self.editing.is_some()
    }

    /// Replaces the cached collection with the server's array, in server
    /// order. A rejected request leaves the previous collection in place.
    #[instrument(skip(self, api, session))]
    pub fn fetch_tasks(&mut self, api: &ApiClient, session: &Session) -> anyhow::Result<()> {
        let token = require_token(session)?;
        let tasks = api.list_tasks(token)?;
        debug!(count = tasks.len(), "replacing task list");
        self.tasks = tasks;
        Ok(())
    }

    /// The shared submit path. While a task is being edited this is an
    /// update of that task, never a create.
    #[instrument(skip(self, api, session, description))]
    pub fn create_task(
        &mut self,
        api: &ApiClient,
        session: &Session,
        title: &str,
        description: &str,
    ) -> anyhow::Result<()> {
        if let Some(id) = self.editing {
            return self.update_task(api, session, id, title, description);
        }

        info!("command add");
        let token = require_token(session)?;
        let status = api.create_task(token, title, description)?;
        if status.is_success() {
            self.form.clear();
            self.fetch_tasks(api, session)?;
        } else {
            warn!(%status, "create rejected; keeping form");
        }
        Ok(())
    }

    /// Full title/description replacement. Only an ok response leaves
    /// edit mode; a rejection keeps the target and the form so the user
    /// can retry.
    #[instrument(skip(self, api, session, description))]
    pub fn update_task(
        &mut self,
        api: &ApiClient,
        session: &Session,
        id: u64,
        title: &str,
        description: &str,
    ) -> anyhow::Result<()> {
        info!(id, "command update");
        let token = require_token(session)?;
        let status = api.update_task(token, id, title, description)?;
        if status.is_success() {
            self.editing = None;
            self.form.clear();
            self.fetch_tasks(api, session)?;
        } else {
            warn!(%status, id, "update rejected; still editing");
        }
        Ok(())
    }

    /// Refreshes whatever the response status was. A rejected completion
    /// therefore still re-renders the unchanged list.
    #[instrument(skip(self, api, session))]
    pub fn mark_completed(
        &mut self,
        api: &ApiClient,
        session: &Session,
        id: u64,
    ) -> anyhow::Result<()> {
        info!(id, "command done");
        let token = require_token(session)?;
        let status = api.complete_task(token, id)?;
        if !status.is_success() {
            warn!(%status, id, "complete rejected; refreshing anyway");
        }
        self.fetch_tasks(api, session)
    }

    /// Confirmation happens in the shell before this is called; like
    /// completion, the refresh does not depend on the response status.
    #[instrument(skip(self, api, session))]
    pub fn delete_task(
        &mut self,
        api: &ApiClient,
        session: &Session,
        id: u64,
    ) -> anyhow::Result<()> {
        info!(id, "command delete");
        let token = require_token(session)?;
        let status = api.delete_task(token, id)?;
        if !status.is_success() {
            warn!(%status, id, "delete rejected; refreshing anyway");
        }
        self.fetch_tasks(api, session)
    }

    /// Looks the task up in the cached collection — not a fresh fetch —
    /// copies its fields into the form, and records it as the edit
    /// target. Re-entering with another id overwrites both.
    #[instrument(skip(self))]
    pub fn edit_task(&mut self, id: u64) -> anyhow::Result<()> {
        let task = self
            .tasks
            .iter()
            .find(|task| task.id == id)
            .ok_or_else(|| anyhow!("no such task: {id}"))?;

        info!(id, "entering edit mode");
        self.form.title = task.title.clone();
        self.form.description = task.description.clone();
        self.editing = Some(id);
        Ok(())
    }

    /// Leaves edit mode without any network call.
    #[instrument(skip(self))]
    pub fn cancel_editing(&mut self) {
        info!(editing = ?self.editing, "leaving edit mode");
        self.editing = None;
        self.form.clear();
    }
}

fn require_token(session: &Session) -> anyhow::Result<&str> {
    session.token().ok_or_else(|| anyhow!("not logged in"))
}
