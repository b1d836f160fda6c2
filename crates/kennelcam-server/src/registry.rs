//! Registry of every dog that has been exported.
//!
//! Stored as a JSON array in `<export dir>/dogs.json` and rewritten after each
//! change, so it survives restarts. Track ids restart at 1 with the process,
//! so an id seen again after a restart updates the existing record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kennelcam_models::TrackId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ServerResult;

pub const REGISTRY_FILE: &str = "dogs.json";

/// One dog in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DogRecord {
    pub id: TrackId,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// First snapshot written for this dog
    pub image_path: PathBuf,
    /// Most recent snapshot
    pub latest_image_path: PathBuf,
}

#[derive(Debug)]
pub struct DogRegistry {
    path: PathBuf,
    dogs: BTreeMap<TrackId, DogRecord>,
}

impl DogRegistry {
    /// Load the registry in `dir`, starting empty if there is none yet.
    pub fn open(dir: &Path) -> ServerResult<Self> {
        let path = dir.join(REGISTRY_FILE);
        let dogs = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Vec<DogRecord>>(&bytes)?
                .into_iter()
                .map(|record| (record.id, record))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), dogs = dogs.len(), "Dog registry loaded");
        Ok(Self { path, dogs })
    }

    /// Insert a new dog or refresh an existing one, then persist.
    pub fn record(
        &mut self,
        id: TrackId,
        image_path: &Path,
        seen: DateTime<Utc>,
    ) -> ServerResult<&DogRecord> {
        self.dogs
            .entry(id)
            .and_modify(|record| {
                record.last_seen = seen;
                record.latest_image_path = image_path.to_path_buf();
            })
            .or_insert_with(|| DogRecord {
                id,
                first_seen: seen,
                last_seen: seen,
                image_path: image_path.to_path_buf(),
                latest_image_path: image_path.to_path_buf(),
            });
        self.save()?;

        Ok(&self.dogs[&id])
    }

    pub fn get(&self, id: TrackId) -> Option<&DogRecord> {
        self.dogs.get(&id)
    }

    pub fn len(&self) -> usize {
        self.dogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dogs.is_empty()
    }

    fn save(&self) -> ServerResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let records: Vec<&DogRecord> = self.dogs.values().collect();
        let json = serde_json::to_vec_pretty(&records)?;

        // Replace in one step so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
