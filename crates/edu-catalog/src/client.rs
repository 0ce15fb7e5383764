//! Async catalog client.
//!
//! `CatalogClient` wraps a [`CatalogRepository`] behind a mutex and runs every
//! call on the blocking thread pool, so UI tasks can await it without stalling
//! the runtime on SQLite I/O.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::document::DocumentStore;
use crate::error::{CatalogError, CatalogResult};
use crate::repository::CatalogRepository;
use crate::sqlite_store::SqliteDocumentStore;
use crate::types::{
    EducationalModule, Lesson, LessonUpdate, ModuleUpdate, NewLesson, NewModule, ProfileInput,
    ProgressUpdate, UserEnrollment, UserProfile, UserProgress,
};

/// Cloneable async handle to a catalog repository.
pub struct CatalogClient<S = SqliteDocumentStore> {
    repo: Arc<Mutex<CatalogRepository<S>>>,
}

impl<S> Clone for CatalogClient<S> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<S: DocumentStore + 'static> CatalogClient<S> {
    pub fn new(store: S) -> Self {
        Self {
            repo: Arc::new(Mutex::new(CatalogRepository::new(store))),
        }
    }

    async fn with_repo<T, F>(&self, f: F) -> CatalogResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&CatalogRepository<S>) -> CatalogResult<T> + Send + 'static,
    {
        let repo = self.repo.clone();
        tokio::task::spawn_blocking(move || f(&repo.lock()))
            .await
            .map_err(|e| CatalogError::StoreUnavailable(format!("catalog task failed: {}", e)))?
    }

    pub async fn list_published_modules(&self) -> CatalogResult<Vec<EducationalModule>> {
        self.with_repo(|repo| repo.list_published_modules()).await
    }

    pub async fn list_modules_by_subject(&self, subject: &str) -> CatalogResult<Vec<EducationalModule>> {
        let subject = subject.to_string();
        self.with_repo(move |repo| repo.list_modules_by_subject(&subject))
            .await
    }

    pub async fn get_module(&self, id: &str) -> CatalogResult<EducationalModule> {
        let id = id.to_string();
        self.with_repo(move |repo| repo.get_module(&id)).await
    }

    pub async fn create_module(&self, module: NewModule) -> CatalogResult<String> {
        self.with_repo(move |repo| repo.create_module(&module)).await
    }

    pub async fn update_module(&self, id: &str, update: ModuleUpdate) -> CatalogResult<()> {
        let id = id.to_string();
        self.with_repo(move |repo| repo.update_module(&id, &update))
            .await
    }

    pub async fn delete_module(&self, id: &str) -> CatalogResult<()> {
        let id = id.to_string();
        self.with_repo(move |repo| repo.delete_module(&id)).await
    }

    pub async fn list_lessons_by_module(&self, module_id: &str) -> CatalogResult<Vec<Lesson>> {
        let module_id = module_id.to_string();
        self.with_repo(move |repo| repo.list_lessons_by_module(&module_id))
            .await
    }

    pub async fn get_lesson(&self, id: &str) -> CatalogResult<Lesson> {
        let id = id.to_string();
        self.with_repo(move |repo| repo.get_lesson(&id)).await
    }

    pub async fn create_lesson(&self, lesson: NewLesson) -> CatalogResult<String> {
        self.with_repo(move |repo| repo.create_lesson(&lesson)).await
    }

    pub async fn update_lesson(&self, id: &str, update: LessonUpdate) -> CatalogResult<()> {
        let id = id.to_string();
        self.with_repo(move |repo| repo.update_lesson(&id, &update))
            .await
    }

    pub async fn delete_lesson(&self, id: &str) -> CatalogResult<()> {
        let id = id.to_string();
        self.with_repo(move |repo| repo.delete_lesson(&id)).await
    }

    pub async fn get_user_module_progress(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> CatalogResult<Vec<UserProgress>> {
        let (user_id, module_id) = (user_id.to_string(), module_id.to_string());
        self.with_repo(move |repo| repo.get_user_module_progress(&user_id, &module_id))
            .await
    }

    pub async fn upsert_user_progress(&self, update: ProgressUpdate) -> CatalogResult<UserProgress> {
        self.with_repo(move |repo| repo.upsert_user_progress(&update))
            .await
    }

    pub async fn get_user_enrollment(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> CatalogResult<Option<UserEnrollment>> {
        let (user_id, module_id) = (user_id.to_string(), module_id.to_string());
        self.with_repo(move |repo| repo.get_user_enrollment(&user_id, &module_id))
            .await
    }

    pub async fn enroll_user(&self, user_id: &str, module_id: &str) -> CatalogResult<UserEnrollment> {
        let (user_id, module_id) = (user_id.to_string(), module_id.to_string());
        self.with_repo(move |repo| repo.enroll_user(&user_id, &module_id))
            .await
    }

    pub async fn sync_enrollment_progress(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> CatalogResult<UserEnrollment> {
        let (user_id, module_id) = (user_id.to_string(), module_id.to_string());
        self.with_repo(move |repo| repo.sync_enrollment_progress(&user_id, &module_id))
            .await
    }

    pub async fn get_user_profile(&self, user_id: &str) -> CatalogResult<Option<UserProfile>> {
        let user_id = user_id.to_string();
        self.with_repo(move |repo| repo.get_user_profile(&user_id))
            .await
    }

    pub async fn upsert_user_profile(
        &self,
        user_id: &str,
        profile: ProfileInput,
    ) -> CatalogResult<UserProfile> {
        let user_id = user_id.to_string();
        self.with_repo(move |repo| repo.upsert_user_profile(&user_id, &profile))
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::memory_store::MemoryDocumentStore;
    use crate::types::{Preferences, Role};

    fn profile(name: &str) -> ProfileInput {
        ProfileInput {
            email: "priya@example.edu".into(),
            name: name.into(),
            role: Role::Teacher,
            avatar: None,
            bio: None,
            subjects: vec!["Science".into()],
            grade: None,
            school: Some("Central School".into()),
            preferences: Preferences::default(),
        }
    }

    #[tokio::test]
    async fn test_profile_upsert_keyed_by_user_id() {
        let client = CatalogClient::new(SqliteDocumentStore::in_memory().unwrap());
        assert!(client.get_user_profile("uid-7").await.unwrap().is_none());

        let created = client.upsert_user_profile("uid-7", profile("Priya")).await.unwrap();
        let updated = client
            .upsert_user_profile("uid-7", profile("Priya S."))
            .await
            .unwrap();

        assert_eq!(created.id, "uid-7");
        assert_eq!(updated.id, "uid-7");
        assert_eq!(updated.name, "Priya S.");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.last_active >= created.last_active);
    }

    #[tokio::test]
    async fn test_clones_share_the_repository() {
        let client = CatalogClient::new(MemoryDocumentStore::new());
        let other = client.clone();
        other.upsert_user_profile("u1", profile("Ravi")).await.unwrap();

        let found = client.get_user_profile("u1").await.unwrap().unwrap();
        assert_eq!(found.name, "Ravi");
    }
}
