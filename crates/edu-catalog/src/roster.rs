//! Per-session roster of students and their module progress.
//!
//! Backs the dashboard views. One `Roster` is owned by each session and passed
//! to whatever needs it; there is no process-wide instance.

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
    pub module_id: String,
    pub title: String,
    /// Percentage 0-100.
    pub percent: u8,
}

impl ModuleProgress {
    pub fn new(module_id: impl Into<String>, title: impl Into<String>, percent: u8) -> Self {
        Self {
            module_id: module_id.into(),
            title: title.into(),
            percent: percent.min(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub modules: Vec<ModuleProgress>,
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: Vec<Student>,
}

impl Roster {
    pub fn new(students: Vec<Student>) -> Self {
        Self { students }
    }

    /// Sample roster shown before any real data is loaded.
    pub fn demo() -> Self {
        let modules = || {
            vec![
                ModuleProgress::new("m1", "Algebra Basics", 10),
                ModuleProgress::new("m2", "Geometry", 30),
                ModuleProgress::new("m3", "Statistics", 0),
            ]
        };
        Self::new(vec![
            Student {
                id: "s1".into(),
                name: "Alice".into(),
                modules: modules(),
            },
            Student {
                id: "s2".into(),
                name: "Bob".into(),
                modules: modules(),
            },
        ])
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn add_student(&mut self, student: Student) -> CatalogResult<()> {
        if student.id.trim().is_empty() {
            return Err(CatalogError::validation("student id cannot be empty"));
        }
        if self.student(&student.id).is_some() {
            return Err(CatalogError::validation(format!(
                "Student {} is already on the roster",
                student.id
            )));
        }
        self.students.push(student);
        Ok(())
    }

    /// Remove a student; returns whether one was removed.
    pub fn remove_student(&mut self, id: &str) -> bool {
        let before = self.students.len();
        self.students.retain(|s| s.id != id);
        self.students.len() != before
    }

    /// Set a student's progress in one module. Values above 100 are clamped.
    pub fn update_student_progress(
        &mut self,
        student_id: &str,
        module_id: &str,
        percent: u8,
    ) -> CatalogResult<()> {
        let student = self
            .students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or_else(|| CatalogError::not_found("Student", student_id))?;
        let module = student
            .modules
            .iter_mut()
            .find(|m| m.module_id == module_id)
            .ok_or_else(|| CatalogError::not_found("Module", module_id))?;
        module.percent = percent.min(100);
        Ok(())
    }

    /// Mean progress across a student's modules, `None` for unknown students
    /// or students with no modules.
    pub fn average_progress(&self, student_id: &str) -> Option<f64> {
        let student = self.student(student_id)?;
        if student.modules.is_empty() {
            return None;
        }
        let total: u32 = student.modules.iter().map(|m| u32::from(m.percent)).sum();
        Some(f64::from(total) / student.modules.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_demo_roster() {
        let roster = Roster::demo();
        assert_eq!(roster.students().len(), 2);
        let alice = roster.student("s1").unwrap();
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.modules[1].title, "Geometry");
        assert!((roster.average_progress("s1").unwrap() - 40.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_updates_are_per_student() {
        let mut roster = Roster::demo();
        roster.update_student_progress("s1", "m3", 150).unwrap();

        assert_eq!(roster.student("s1").unwrap().modules[2].percent, 100);
        assert_eq!(roster.student("s2").unwrap().modules[2].percent, 0);
        assert!(matches!(
            roster.update_student_progress("s9", "m1", 10),
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[test]
    fn test_add_and_remove_students() {
        let mut roster = Roster::default();
        let carol = Student {
            id: "s3".into(),
            name: "Carol".into(),
            modules: vec![],
        };
        roster.add_student(carol.clone()).unwrap();
        assert!(roster.add_student(carol).is_err());
        assert_eq!(roster.average_progress("s3"), None);

        assert!(roster.remove_student("s3"));
        assert!(!roster.remove_student("s3"));
        assert!(roster.students().is_empty());
    }
}
