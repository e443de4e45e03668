//! Per-task progress accounting.
//!
//! The runtime needs to know when the last download of a task lands (to
//! flip the task to `processing`) and when the last file reaches a
//! terminal process status (to run imputation and complete the task).
//! Counts live in memory; the catalog remains the durable source.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, Default)]
struct TaskCounts {
    files_total: usize,
    download_terminal: usize,
    process_terminal: usize,
}

/// Tracks file completion per task.
#[derive(Default)]
pub struct TaskProgress {
    tasks: Mutex<HashMap<i64, TaskCounts>>,
}

impl TaskProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a task with `files_total` files, `download_terminal`
    /// of which already have a terminal download status and
    /// `process_terminal` a terminal process status (non-zero when
    /// resuming).
    pub fn register(
        &self,
        task_id: i64,
        files_total: usize,
        download_terminal: usize,
        process_terminal: usize,
    ) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.insert(
            task_id,
            TaskCounts {
                files_total,
                download_terminal,
                process_terminal,
            },
        );
    }

    /// Record one download reaching a terminal status. Returns `true`
    /// exactly when this was the last outstanding download of the task.
    pub fn download_terminal(&self, task_id: i64) -> bool {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(counts) = tasks.get_mut(&task_id) else {
            return false;
        };
        counts.download_terminal += 1;
        counts.download_terminal == counts.files_total
    }

    /// Record one file reaching a terminal process status. Returns `true`
    /// exactly when every file of the task is process-terminal.
    pub fn process_terminal(&self, task_id: i64) -> bool {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(counts) = tasks.get_mut(&task_id) else {
            return false;
        };
        counts.process_terminal += 1;
        counts.process_terminal == counts.files_total
    }

    /// Whether every file of the task is already process-terminal.
    pub fn is_process_done(&self, task_id: i64) -> bool {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .get(&task_id)
            .is_some_and(|c| c.files_total > 0 && c.process_terminal >= c.files_total)
    }

    /// Stop tracking a finished task.
    pub fn forget(&self, task_id: i64) {
        self.tasks.lock().unwrap().remove(&task_id);
    }
}
