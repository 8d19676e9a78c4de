//! The ordered list of projects and the one currently open.

use uuid::Uuid;

use crate::project::Project;

/// Projects, newest first, with exactly one selected.
///
/// The list is never empty: deleting the last project creates a fresh one.
#[derive(Debug, Clone)]
pub struct ProjectList {
    projects: Vec<Project>,
    current: Uuid,
}

impl Default for ProjectList {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectList {
    /// A list holding one fresh project.
    pub fn new() -> Self {
        let project = Project::new();
        Self {
            current: project.id,
            projects: vec![project],
        }
    }

    /// Restore a loaded list. The first project becomes current; an empty
    /// list falls back to [`ProjectList::new`].
    pub fn from_loaded(projects: Vec<Project>) -> Self {
        match projects.first() {
            Some(first) => Self {
                current: first.id,
                projects,
            },
            None => Self::new(),
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn current_id(&self) -> Uuid {
        self.current
    }

    pub fn current(&self) -> &Project {
        // `current` always names a project in the list.
        self.projects
            .iter()
            .find(|p| p.id == self.current)
            .unwrap_or(&self.projects[0])
    }

    pub fn get(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    /// Create a project at the front of the list and select it.
    pub fn create(&mut self) -> Uuid {
        let project = Project::new();
        let id = project.id;
        self.projects.insert(0, project);
        self.current = id;
        id
    }

    pub fn select(&mut self, id: Uuid) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.current = id;
        true
    }

    /// Remove a project. If it was current, select the first remaining one,
    /// creating a fresh project when none remain.
    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);
        if self.projects.len() == before {
            return false;
        }

        if self.current == id {
            match self.projects.first() {
                Some(first) => self.current = first.id,
                None => {
                    self.create();
                }
            }
        }
        log::debug!("Deleted project {id}");
        true
    }

    pub fn rename(&mut self, id: Uuid, name: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(project) => {
                project.rename(name);
                true
            }
            None => false,
        }
    }

    /// Replace a project with a newer copy of itself, e.g. one committed by
    /// a collaboration session. A project no longer in the list stays gone.
    pub fn replace(&mut self, project: Project) -> bool {
        match self.get_mut(project.id) {
            Some(existing) => {
                *existing = project;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_list_has_one_project() {
        let list = ProjectList::new();
        assert_eq!(list.len(), 1);
        assert_eq!(list.current().id, list.current_id());
    }

    #[test]
    fn test_from_loaded_empty_creates_project() {
        let list = ProjectList::from_loaded(Vec::new());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_from_loaded_selects_first() {
        let a = Project::new();
        let b = Project::new();
        let list = ProjectList::from_loaded(vec![a.clone(), b]);
        assert_eq!(list.current_id(), a.id);
    }

    #[test]
    fn test_create_inserts_at_front() {
        let mut list = ProjectList::new();
        let first = list.current_id();
        let second = list.create();

        assert_eq!(list.projects()[0].id, second);
        assert_eq!(list.projects()[1].id, first);
        assert_eq!(list.current_id(), second);
    }

    #[test]
    fn test_delete_current_selects_first_remaining() {
        let mut list = ProjectList::new();
        let older = list.current_id();
        let newer = list.create();

        assert!(list.delete(newer));
        assert_eq!(list.current_id(), older);
    }

    #[test]
    fn test_delete_last_project_creates_fresh() {
        let mut list = ProjectList::new();
        let only = list.current_id();

        assert!(list.delete(only));
        assert_eq!(list.len(), 1);
        assert_ne!(list.current_id(), only);
    }

    #[test]
    fn test_delete_unknown() {
        let mut list = ProjectList::new();
        assert!(!list.delete(Uuid::new_v4()));
    }

    #[test]
    fn test_rename_and_select() {
        let mut list = ProjectList::new();
        let first = list.current_id();
        list.create();

        assert!(list.rename(first, "Landing page"));
        assert!(list.select(first));
        assert_eq!(list.current().name, "Landing page");
        assert!(!list.select(Uuid::new_v4()));
    }

    #[test]
    fn test_replace_known_project_only() {
        let mut list = ProjectList::new();
        let mut copy = list.current().clone();
        copy.current_code = "<p>remote</p>".into();

        assert!(list.replace(copy.clone()));
        assert_eq!(list.len(), 1);
        assert_eq!(list.current().current_code, "<p>remote</p>");

        // A late copy of a deleted project does not bring it back.
        list.create();
        assert!(list.delete(copy.id));
        assert!(!list.replace(copy.clone()));
        assert!(list.get(copy.id).is_none());
        assert_eq!(list.len(), 1);
    }
}
