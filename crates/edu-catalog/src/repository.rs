//! Catalog/progress repository.
//!
//! The only component that builds store queries. Translates between stored
//! documents and the typed records in [`crate::types`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::document::{Direction, Document, DocumentStore, Fields, Filter, Query, UpsertKey};
use crate::error::{CatalogError, CatalogResult, StoreError};
use crate::types::{
    EducationalModule, Lesson, LessonUpdate, ModuleUpdate, NewLesson, NewModule, ProfileInput,
    ProgressStatus, ProgressUpdate, UserEnrollment, UserProfile, UserProgress,
};

pub const MODULES: &str = "modules";
pub const LESSONS: &str = "lessons";
pub const PROGRESS: &str = "userProgress";
pub const ENROLLMENTS: &str = "enrollments";
pub const USERS: &str = "users";

/// Typed access to modules, lessons, progress, enrollments and profiles.
pub struct CatalogRepository<S> {
    store: S,
}

impl<S: DocumentStore> CatalogRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ===== Modules =====

    /// Published modules, newest first.
    #[tracing::instrument(skip(self))]
    pub fn list_published_modules(&self) -> CatalogResult<Vec<EducationalModule>> {
        let query = Query::collection(MODULES)
            .filter("isPublished", true)
            .order_by("createdAt", Direction::Descending);
        let modules: Vec<EducationalModule> = self.fetch_all(&query)?;
        debug!("Loaded {} published modules", modules.len());
        Ok(modules)
    }

    /// Published modules of one subject, newest first. An unknown subject
    /// yields an empty list.
    #[tracing::instrument(skip(self))]
    pub fn list_modules_by_subject(&self, subject: &str) -> CatalogResult<Vec<EducationalModule>> {
        let query = Query::collection(MODULES)
            .filter("isPublished", true)
            .filter("subject", subject)
            .order_by("createdAt", Direction::Descending);
        self.fetch_all(&query)
    }

    pub fn get_module(&self, id: &str) -> CatalogResult<EducationalModule> {
        let doc = self.store.get(MODULES, id)?;
        decode(doc.ok_or_else(|| CatalogError::not_found("Module", id))?)
    }

    /// Create a module and return its generated id.
    pub fn create_module(&self, module: &NewModule) -> CatalogResult<String> {
        module.validate()?;
        let now = self.store.now();
        let mut fields = encode(module)?;
        fields.insert("createdAt".into(), timestamp(now));
        fields.insert("updatedAt".into(), timestamp(now));

        let id = self.store.add(MODULES, fields)?;
        info!("Created module {} ({})", id, module.title);
        Ok(id)
    }

    /// Merge the supplied fields into a module and refresh `updatedAt`.
    pub fn update_module(&self, id: &str, update: &ModuleUpdate) -> CatalogResult<()> {
        update.validate()?;
        let mut fields = encode(update)?;
        fields.insert("updatedAt".into(), timestamp(self.store.now()));
        self.store
            .update(MODULES, id, fields)
            .map_err(|e| missing_as("Module", id, e))?;
        debug!("Updated module {}", id);
        Ok(())
    }

    /// Delete a module together with its lessons. Missing ids are ignored.
    pub fn delete_module(&self, id: &str) -> CatalogResult<()> {
        let lessons = self
            .store
            .query(&Query::collection(LESSONS).filter("moduleId", id))?;
        for lesson in &lessons {
            self.store.delete(LESSONS, &lesson.id)?;
        }
        self.store.delete(MODULES, id)?;
        info!("Deleted module {} and {} lessons", id, lessons.len());
        Ok(())
    }

    // ===== Lessons =====

    /// Lessons of a module by ascending `order`. Gaps in `order` are kept.
    pub fn list_lessons_by_module(&self, module_id: &str) -> CatalogResult<Vec<Lesson>> {
        self.fetch_all(&lessons_of(module_id))
    }

    pub fn get_lesson(&self, id: &str) -> CatalogResult<Lesson> {
        let doc = self.store.get(LESSONS, id)?;
        decode(doc.ok_or_else(|| CatalogError::not_found("Lesson", id))?)
    }

    /// Create a lesson in an existing module and return its generated id.
    pub fn create_lesson(&self, lesson: &NewLesson) -> CatalogResult<String> {
        lesson.validate()?;
        if self.store.get(MODULES, &lesson.module_id)?.is_none() {
            return Err(CatalogError::validation(format!(
                "Module {} does not exist",
                lesson.module_id
            )));
        }
        self.ensure_order_free(&lesson.module_id, lesson.order, None)?;

        let now = self.store.now();
        let mut fields = encode(lesson)?;
        fields.insert("createdAt".into(), timestamp(now));
        fields.insert("updatedAt".into(), timestamp(now));
        let id = self.store.add(LESSONS, fields)?;

        self.relink_lessons(&lesson.module_id)?;
        info!("Created lesson {} in module {}", id, lesson.module_id);
        Ok(id)
    }

    pub fn update_lesson(&self, id: &str, update: &LessonUpdate) -> CatalogResult<()> {
        update.validate()?;
        let current = self.get_lesson(id)?;
        let reordered = update.order.is_some_and(|order| order != current.order);
        if let Some(order) = update.order.filter(|_| reordered) {
            self.ensure_order_free(&current.module_id, order, Some(id))?;
        }

        let mut fields = encode(update)?;
        fields.insert("updatedAt".into(), timestamp(self.store.now()));
        self.store
            .update(LESSONS, id, fields)
            .map_err(|e| missing_as("Lesson", id, e))?;

        if reordered {
            self.relink_lessons(&current.module_id)?;
        }
        Ok(())
    }

    /// Delete a lesson. Siblings are not renumbered; missing ids are ignored.
    pub fn delete_lesson(&self, id: &str) -> CatalogResult<()> {
        let Some(doc) = self.store.get(LESSONS, id)? else {
            return Ok(());
        };
        self.store.delete(LESSONS, id)?;
        if let Some(module_id) = doc.fields.get("moduleId").and_then(Value::as_str) {
            self.relink_lessons(module_id)?;
        }
        Ok(())
    }

    fn ensure_order_free(&self, module_id: &str, order: u32, except: Option<&str>) -> CatalogResult<()> {
        let clash = self
            .store
            .query(
                &Query::collection(LESSONS)
                    .filter("moduleId", module_id)
                    .filter("order", order),
            )?
            .into_iter()
            .any(|doc| Some(doc.id.as_str()) != except);
        if clash {
            return Err(CatalogError::validation(format!(
                "Lesson order {} is already used in module {}",
                order, module_id
            )));
        }
        Ok(())
    }

    /// Rewrite the module's `lessons` list from the stored lessons.
    fn relink_lessons(&self, module_id: &str) -> CatalogResult<()> {
        let ids: Vec<Value> = self
            .store
            .query(&lessons_of(module_id))?
            .into_iter()
            .map(|doc| Value::String(doc.id))
            .collect();
        let mut fields = Fields::new();
        fields.insert("lessons".into(), Value::Array(ids));
        match self.store.update(MODULES, module_id, fields) {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                warn!("Lessons reference missing module {}", module_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ===== Progress =====

    /// All lesson progress rows of a user within a module.
    pub fn get_user_module_progress(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> CatalogResult<Vec<UserProgress>> {
        let query = Query::collection(PROGRESS)
            .filter("userId", user_id)
            .filter("moduleId", module_id);
        self.fetch_all(&query)
    }

    /// Insert or overwrite the progress row for (user, module, lesson).
    ///
    /// Only supplied optional fields overwrite stored ones; `lastAccessed` is
    /// refreshed on both branches.
    #[tracing::instrument(skip(self, update), fields(user = %update.user_id, lesson = %update.lesson_id))]
    pub fn upsert_user_progress(&self, update: &ProgressUpdate) -> CatalogResult<UserProgress> {
        update.validate()?;
        let key = [
            Filter::eq("userId", update.user_id.as_str()),
            Filter::eq("moduleId", update.module_id.as_str()),
            Filter::eq("lessonId", update.lesson_id.as_str()),
        ];
        let mut fields = encode(update)?;
        fields.insert("lastAccessed".into(), timestamp(self.store.now()));

        let outcome = self
            .store
            .upsert(PROGRESS, UpsertKey::Fields(&key), fields.clone(), fields)?;
        debug!(
            "{} progress {}",
            if outcome.created { "Inserted" } else { "Updated" },
            outcome.id
        );
        self.read_back(PROGRESS, &outcome.id)
    }

    // ===== Enrollments =====

    pub fn get_user_enrollment(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> CatalogResult<Option<UserEnrollment>> {
        let query = Query::collection(ENROLLMENTS)
            .filter("userId", user_id)
            .filter("moduleId", module_id)
            .limit(1);
        self.store
            .query(&query)?
            .into_iter()
            .next()
            .map(decode)
            .transpose()
    }

    /// Enroll a user in a module. Enrolling twice returns the existing record.
    pub fn enroll_user(&self, user_id: &str, module_id: &str) -> CatalogResult<UserEnrollment> {
        if user_id.trim().is_empty() {
            return Err(CatalogError::validation("userId cannot be empty"));
        }
        let module = self.get_module(module_id)?;
        let key = [
            Filter::eq("userId", user_id),
            Filter::eq("moduleId", module_id),
        ];

        let mut on_insert = Fields::new();
        on_insert.insert("userId".into(), user_id.into());
        on_insert.insert("moduleId".into(), module_id.into());
        on_insert.insert("enrolledAt".into(), timestamp(self.store.now()));
        on_insert.insert("overallProgress".into(), 0.into());
        on_insert.insert("lessonsCompleted".into(), 0.into());
        on_insert.insert("totalLessons".into(), module.lessons.len().into());

        let outcome = self
            .store
            .upsert(ENROLLMENTS, UpsertKey::Fields(&key), on_insert, Fields::new())?;

        if outcome.created {
            // Read-modify-write on the current counter. Not atomic across
            // processes sharing one store; writers in this process are
            // serialized by `CatalogClient`.
            let current = self.get_module(module_id)?;
            let mut fields = Fields::new();
            fields.insert(
                "enrolledStudents".into(),
                (current.enrolled_students + 1).into(),
            );
            self.store
                .update(MODULES, module_id, fields)
                .map_err(|e| missing_as("Module", module_id, e))?;
            info!("Enrolled {} in module {}", user_id, module_id);
        }
        self.read_back(ENROLLMENTS, &outcome.id)
    }

    /// Recompute an enrollment's counters from the module's lessons and the
    /// user's progress rows. Completed lessons count as 100%.
    pub fn sync_enrollment_progress(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> CatalogResult<UserEnrollment> {
        let enrollment = self
            .get_user_enrollment(user_id, module_id)?
            .ok_or_else(|| CatalogError::not_found("Enrollment", format!("{}/{}", user_id, module_id)))?;
        let lessons = self.list_lessons_by_module(module_id)?;
        let progress: HashMap<String, UserProgress> = self
            .get_user_module_progress(user_id, module_id)?
            .into_iter()
            .map(|p| (p.lesson_id.clone(), p))
            .collect();

        let mut completed = 0u32;
        let mut sum = 0u32;
        for lesson in &lessons {
            match progress.get(&lesson.id) {
                Some(p) if p.status == ProgressStatus::Completed => {
                    completed += 1;
                    sum += 100;
                }
                Some(p) => sum += u32::from(p.progress),
                None => {}
            }
        }
        let total = u32::try_from(lessons.len()).unwrap_or(u32::MAX);
        let overall = if total == 0 {
            0
        } else {
            u8::try_from((sum + total / 2) / total).unwrap_or(100)
        };

        let mut fields = Fields::new();
        fields.insert("lessonsCompleted".into(), completed.into());
        fields.insert("totalLessons".into(), total.into());
        fields.insert("overallProgress".into(), overall.into());
        if total > 0 && completed == total && enrollment.completed_at.is_none() {
            fields.insert("completedAt".into(), timestamp(self.store.now()));
            info!("User {} completed module {}", user_id, module_id);
        }

        self.store.update(ENROLLMENTS, &enrollment.id, fields)?;
        self.read_back(ENROLLMENTS, &enrollment.id)
    }

    // ===== Profiles =====

    pub fn get_user_profile(&self, user_id: &str) -> CatalogResult<Option<UserProfile>> {
        self.store.get(USERS, user_id)?.map(decode).transpose()
    }

    /// Create or update the profile stored under `user_id`.
    pub fn upsert_user_profile(
        &self,
        user_id: &str,
        profile: &ProfileInput,
    ) -> CatalogResult<UserProfile> {
        if user_id.trim().is_empty() {
            return Err(CatalogError::validation("user id cannot be empty"));
        }
        profile.validate()?;

        let now = self.store.now();
        let mut on_update = encode(profile)?;
        on_update.insert("lastActive".into(), timestamp(now));
        let mut on_insert = on_update.clone();
        on_insert.insert("createdAt".into(), timestamp(now));

        let outcome = self
            .store
            .upsert(USERS, UpsertKey::Id(user_id), on_insert, on_update)?;
        if outcome.created {
            info!("Created profile for {}", user_id);
        }
        self.read_back(USERS, user_id)
    }

    // ===== Helpers =====

    fn fetch_all<T: DeserializeOwned>(&self, query: &Query) -> CatalogResult<Vec<T>> {
        self.store.query(query)?.into_iter().map(decode).collect()
    }

    fn read_back<T: DeserializeOwned>(&self, collection: &str, id: &str) -> CatalogResult<T> {
        let doc = self.store.get(collection, id)?.ok_or_else(|| {
            CatalogError::StoreUnavailable(format!("{}/{} vanished after write", collection, id))
        })?;
        decode(doc)
    }
}

fn lessons_of(module_id: &str) -> Query {
    Query::collection(LESSONS)
        .filter("moduleId", module_id)
        .order_by("order", Direction::Ascending)
}

fn missing_as(kind: &str, id: &str, err: StoreError) -> CatalogError {
    match err {
        StoreError::NotFound { .. } => CatalogError::not_found(kind, id),
        other => other.into(),
    }
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::from(at.timestamp_millis())
}

/// Decode a stored document into a typed record, restoring its id.
pub(crate) fn decode<T: DeserializeOwned>(doc: Document) -> CatalogResult<T> {
    let Document { id, mut fields } = doc;
    fields.insert("id".into(), Value::String(id.clone()));
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| CatalogError::Decode(format!("{}: {}", id, e)))
}

/// Encode a record into document fields. Any `id` field is dropped; ids live
/// outside the body.
pub(crate) fn encode<T: Serialize>(value: &T) -> CatalogResult<Fields> {
    match serde_json::to_value(value).map_err(|e| CatalogError::Decode(e.to_string()))? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        other => Err(CatalogError::Decode(format!("expected an object, got {}", other))),
    }
}
