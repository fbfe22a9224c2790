//! Persistence for view preferences: favorites and expanded lists.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tms_view::{Favorites, ShowMore, DEFAULT_PAGE_SIZE};

/// Lists with their own "show more" control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Applications,
    Offers,
    Recognitions,
    Invitations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPreferences {
    pub favorites: Favorites,
    pub applications: ShowMore,
    pub offers: ShowMore,
    pub recognitions: ShowMore,
    pub invitations: ShowMore,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl ViewPreferences {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            favorites: Favorites::new(),
            applications: ShowMore::new(page_size),
            offers: ShowMore::new(page_size),
            recognitions: ShowMore::new(page_size),
            invitations: ShowMore::new(page_size),
        }
    }

    pub fn list(&self, kind: ListKind) -> &ShowMore {
        match kind {
            ListKind::Applications => &self.applications,
            ListKind::Offers => &self.offers,
            ListKind::Recognitions => &self.recognitions,
            ListKind::Invitations => &self.invitations,
        }
    }

    pub fn list_mut(&mut self, kind: ListKind) -> &mut ShowMore {
        match kind {
            ListKind::Applications => &mut self.applications,
            ListKind::Offers => &mut self.offers,
            ListKind::Recognitions => &mut self.recognitions,
            ListKind::Invitations => &mut self.invitations,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub fn load(path: &Path) -> Result<Option<ViewPreferences>, PersistenceError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let preferences = serde_json::from_str::<ViewPreferences>(&contents)?;
    Ok(Some(preferences))
}

pub fn save(path: &Path, preferences: &ViewPreferences) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(preferences)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        let mut preferences = ViewPreferences::with_page_size(3);
        preferences.favorites.toggle("app-7");
        preferences.list_mut(ListKind::Offers).toggle();
        save(&path, &preferences).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded, preferences);
        assert!(loaded.favorites.contains("app-7"));
        assert!(loaded.list(ListKind::Offers).expanded);
        assert!(!loaded.list(ListKind::Applications).expanded);
    }

    #[test]
    fn test_corrupt_file_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(PersistenceError::Serde(_))));
    }
}
