//! Project metadata storage
//!
//! Records mirror the `projects` and `tracks` tables of the hosted backend.
//! [`JsonFileRepository`] keeps each table in its own JSON file under a
//! directory; a missing file means the schema was never created and is
//! reported as [`VibelabError::MigrationRequired`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VibelabError};
use crate::timeline::TrackKind;

pub const PROJECTS_TABLE: &str = "projects";
pub const TRACKS_TABLE: &str = "tracks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    /// Storage path of the track's audio
    pub file_path: String,
    pub position: u32,
    #[serde(default)]
    pub effects: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Fields a save may change on a project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub lyrics: Option<String>,
    pub bpm: Option<f64>,
}

/// Persistence collaborator for the studio
pub trait ProjectRepository {
    /// Most recently updated project of `user_id`
    fn latest_project(&self, user_id: &str) -> Result<Option<ProjectRecord>>;

    fn create_project(&mut self, user_id: &str, name: &str, lyrics: Option<&str>) -> Result<ProjectRecord>;

    fn update_project(&mut self, project_id: &str, update: ProjectUpdate) -> Result<ProjectRecord>;

    /// Tracks of a project ordered by position
    fn list_tracks(&self, project_id: &str) -> Result<Vec<TrackRecord>>;

    fn insert_track(
        &mut self,
        project_id: &str,
        kind: TrackKind,
        file_path: &str,
        position: u32,
    ) -> Result<TrackRecord>;
}

/// Repository backed by one JSON file per table
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    dir: PathBuf,
}

impl JsonFileRepository {
    /// Create the directory and any missing tables
    pub fn init(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let repo = Self {
            dir: dir.to_path_buf(),
        };
        for table in [PROJECTS_TABLE, TRACKS_TABLE] {
            let path = repo.table_path(table);
            if !path.exists() {
                fs::write(&path, "[]")?;
                tracing::info!(table, path = %path.display(), "created table");
            }
        }
        Ok(repo)
    }

    /// Open existing tables; fails if any table was never created
    pub fn open(dir: &Path) -> Result<Self> {
        let repo = Self {
            dir: dir.to_path_buf(),
        };
        for table in [PROJECTS_TABLE, TRACKS_TABLE] {
            repo.require(table)?;
        }
        Ok(repo)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.json"))
    }

    fn require(&self, table: &str) -> Result<PathBuf> {
        let path = self.table_path(table);
        if path.is_file() {
            Ok(path)
        } else {
            tracing::error!(table, path = %path.display(), "table not found");
            Err(VibelabError::MigrationRequired {
                table: table.to_string(),
            })
        }
    }

    fn read<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let path = self.require(table)?;
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<()> {
        let path = self.require(table)?;
        fs::write(path, serde_json::to_string_pretty(rows)?)?;
        Ok(())
    }
}

impl ProjectRepository for JsonFileRepository {
    fn latest_project(&self, user_id: &str) -> Result<Option<ProjectRecord>> {
        let projects: Vec<ProjectRecord> = self.read(PROJECTS_TABLE)?;
        Ok(projects
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .max_by_key(|p| p.updated_at))
    }

    fn create_project(&mut self, user_id: &str, name: &str, lyrics: Option<&str>) -> Result<ProjectRecord> {
        let mut projects: Vec<ProjectRecord> = self.read(PROJECTS_TABLE)?;
        let now = Utc::now();
        let record = ProjectRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            lyrics: lyrics.map(str::to_string),
            bpm: None,
            key: None,
            created_at: now,
            updated_at: now,
        };
        projects.push(record.clone());
        self.write(PROJECTS_TABLE, &projects)?;
        tracing::info!(project_id = %record.id, user_id, "project created");
        Ok(record)
    }

    fn update_project(&mut self, project_id: &str, update: ProjectUpdate) -> Result<ProjectRecord> {
        let mut projects: Vec<ProjectRecord> = self.read(PROJECTS_TABLE)?;
        let record = projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| VibelabError::ProjectNotFound {
                project_id: project_id.to_string(),
            })?;

        if let Some(name) = update.name {
            record.name = name;
        }
        if let Some(lyrics) = update.lyrics {
            record.lyrics = Some(lyrics);
        }
        if let Some(bpm) = update.bpm {
            record.bpm = Some(bpm);
        }
        // Strictly later than the previous stamp so "latest" stays well ordered
        let now = Utc::now();
        record.updated_at = if now > record.updated_at {
            now
        } else {
            record.updated_at + chrono::Duration::milliseconds(1)
        };

        let updated = record.clone();
        self.write(PROJECTS_TABLE, &projects)?;
        tracing::debug!(project_id, "project updated");
        Ok(updated)
    }

    fn list_tracks(&self, project_id: &str) -> Result<Vec<TrackRecord>> {
        let tracks: Vec<TrackRecord> = self.read(TRACKS_TABLE)?;
        let mut tracks: Vec<_> = tracks.into_iter().filter(|t| t.project_id == project_id).collect();
        tracks.sort_by_key(|t| t.position);
        Ok(tracks)
    }

    fn insert_track(
        &mut self,
        project_id: &str,
        kind: TrackKind,
        file_path: &str,
        position: u32,
    ) -> Result<TrackRecord> {
        let projects: Vec<ProjectRecord> = self.read(PROJECTS_TABLE)?;
        if !projects.iter().any(|p| p.id == project_id) {
            return Err(VibelabError::ProjectNotFound {
                project_id: project_id.to_string(),
            });
        }

        let mut tracks: Vec<TrackRecord> = self.read(TRACKS_TABLE)?;
        let record = TrackRecord {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            kind,
            file_path: file_path.to_string(),
            position,
            effects: None,
            created_at: Utc::now(),
        };
        tracks.push(record.clone());
        self.write(TRACKS_TABLE, &tracks)?;
        tracing::debug!(project_id, track_id = %record.id, %kind, "track inserted");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_open_without_tables_requires_migration() {
        let dir = TempDir::new().unwrap();
        let err = JsonFileRepository::open(dir.path()).unwrap_err();
        assert!(matches!(err, VibelabError::MigrationRequired { ref table } if table == PROJECTS_TABLE));
    }

    #[test]
    fn test_missing_tracks_table() {
        let dir = TempDir::new().unwrap();
        JsonFileRepository::init(dir.path()).unwrap();
        fs::remove_file(dir.path().join("tracks.json")).unwrap();

        let err = JsonFileRepository::open(dir.path()).unwrap_err();
        assert!(matches!(err, VibelabError::MigrationRequired { ref table } if table == TRACKS_TABLE));
    }

    #[test]
    fn test_latest_project_follows_updates() {
        let dir = TempDir::new().unwrap();
        let mut repo = JsonFileRepository::init(dir.path()).unwrap();

        let first = repo.create_project("u1", "First", None).unwrap();
        let second = repo.create_project("u1", "Second", Some("la la")).unwrap();
        repo.create_project("u2", "Other", None).unwrap();
        assert_eq!(repo.latest_project("u1").unwrap().map(|p| p.id), Some(second.id));

        let update = ProjectUpdate {
            name: Some("First, renamed".into()),
            ..Default::default()
        };
        repo.update_project(&first.id, update).unwrap();
        let latest = repo.latest_project("u1").unwrap().unwrap();
        assert_eq!(latest.id, first.id);
        assert_eq!(latest.name, "First, renamed");
    }

    #[test]
    fn test_update_unknown_project() {
        let dir = TempDir::new().unwrap();
        let mut repo = JsonFileRepository::init(dir.path()).unwrap();
        assert!(matches!(
            repo.update_project("nope", ProjectUpdate::default()),
            Err(VibelabError::ProjectNotFound { .. })
        ));
    }

    #[test]
    fn test_tracks_sorted_by_position() {
        let dir = TempDir::new().unwrap();
        let mut repo = JsonFileRepository::init(dir.path()).unwrap();
        let project = repo.create_project("u1", "Song", None).unwrap();

        repo.insert_track(&project.id, TrackKind::Vocal, "takes/v1.wav", 1).unwrap();
        repo.insert_track(&project.id, TrackKind::Beat, "beat.wav", 0).unwrap();

        let reopened = JsonFileRepository::open(dir.path()).unwrap();
        let paths: Vec<_> = reopened
            .list_tracks(&project.id)
            .unwrap()
            .into_iter()
            .map(|t| t.file_path)
            .collect();
        assert_eq!(paths, vec!["beat.wav", "takes/v1.wav"]);
    }

    #[test]
    fn test_track_kind_serialized_as_type() {
        let dir = TempDir::new().unwrap();
        let mut repo = JsonFileRepository::init(dir.path()).unwrap();
        let project = repo.create_project("u1", "Song", None).unwrap();
        repo.insert_track(&project.id, TrackKind::Beat, "beat.wav", 0).unwrap();

        let raw = fs::read_to_string(dir.path().join("tracks.json")).unwrap();
        assert!(raw.contains(r#""type": "beat""#));
    }
}
