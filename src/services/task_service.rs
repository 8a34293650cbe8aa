//! In-memory task store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewTask, TaskSink};
use crate::domain::{TaskId, ThreadId};

/// A stored task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub source_thread_id: ThreadId,
    pub is_ai_generated: bool,
    pub created_at: DateTime<Utc>,
}

/// Task sink that keeps tasks in memory.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<Vec<Task>>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all tasks, oldest first.
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    /// Returns tasks created from a thread.
    pub async fn tasks_for_thread(&self, thread_id: &ThreadId) -> Vec<Task> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|t| &t.source_thread_id == thread_id)
            .cloned()
            .collect()
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskSink for InMemoryTaskStore {
    async fn add_task(&self, task: NewTask) -> Result<TaskId> {
        let id = TaskId::from(Uuid::new_v4().to_string());
        let stored = Task {
            id: id.clone(),
            title: task.title,
            source_thread_id: task.source_thread_id,
            is_ai_generated: task.is_ai_generated,
            created_at: Utc::now(),
        };

        tracing::debug!(task = %id, title = %stored.title, "task stored");
        self.tasks.write().await.push(stored);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(title: &str, thread: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            source_thread_id: ThreadId::from(thread),
            is_ai_generated: true,
        }
    }

    #[test]
    fn new_store_is_empty() {
        let store = InMemoryTaskStore::new();
        assert!(tokio_test::block_on(store.is_empty()));
        assert!(tokio_test::block_on(store.tasks()).is_empty());
    }

    #[tokio::test]
    async fn every_add_creates_a_new_task() {
        let store = InMemoryTaskStore::new();

        let first = store.add_task(new_task("Reply to sender", "t1")).await.unwrap();
        let second = store.add_task(new_task("Reply to sender", "t1")).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn filters_by_thread() {
        let store = InMemoryTaskStore::new();
        store.add_task(new_task("a", "t1")).await.unwrap();
        store.add_task(new_task("b", "t2")).await.unwrap();

        let tasks = store.tasks_for_thread(&ThreadId::from("t2")).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "b");
    }
}
