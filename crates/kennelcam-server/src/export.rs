//! Snapshot export: crops of tracked objects written to disk.
//!
//! Layout is `<dir>/<plural category>/<id>/<YYYY-mm-dd_HH-MM-SS>.jpg`.
//! Exported dogs are also recorded in the [`DogRegistry`] kept in `<dir>`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kennelcam_models::{TrackId, TrackedObjectSnapshot};
use kennelcam_vision::Frame;
use tracing::{debug, info, warn};

use crate::error::ServerResult;
use crate::metrics;
use crate::overlay::encode_jpeg;
use crate::registry::DogRegistry;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Writes at most one crop per object per cooldown window.
#[derive(Debug)]
pub struct SnapshotExporter {
    dir: PathBuf,
    cooldown: Duration,
    quality: u8,
    last_export: HashMap<TrackId, DateTime<Utc>>,
    registry: DogRegistry,
}

impl SnapshotExporter {
    /// Create an exporter writing under `dir`. Fails if an existing dog
    /// registry there cannot be read.
    pub fn new(dir: impl Into<PathBuf>, cooldown: Duration, quality: u8) -> ServerResult<Self> {
        let dir = dir.into();
        let registry = DogRegistry::open(&dir)?;
        Ok(Self {
            dir,
            cooldown,
            quality,
            last_export: HashMap::new(),
            registry,
        })
    }

    pub fn registry(&self) -> &DogRegistry {
        &self.registry
    }

    /// Export every object not saved within the cooldown. Returns the paths written.
    pub fn export(
        &mut self,
        frame: &Frame,
        objects: &[TrackedObjectSnapshot],
        now: DateTime<Utc>,
    ) -> ServerResult<Vec<PathBuf>> {
        // Ids are never reused, so entries of retired objects can go
        self.last_export
            .retain(|id, _| objects.iter().any(|o| o.id == *id));

        let mut written = Vec::new();
        for object in objects {
            if self.recently_saved(object.id, now) {
                continue;
            }
            let Some(path) = self.save(frame, object, now)? else {
                continue;
            };

            self.last_export.insert(object.id, now);
            metrics::record_snapshots_exported(&object.category.plural(), 1);
            info!(
                track_id = %object.id,
                category = %object.category,
                path = %path.display(),
                "Snapshot exported"
            );

            if object.category.is_dog() {
                if let Err(e) = self.registry.record(object.id, &path, now) {
                    warn!(track_id = %object.id, error = %e, "Dog registry update failed");
                }
            }
            written.push(path);
        }

        Ok(written)
    }

    fn recently_saved(&self, id: TrackId, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_export.get(&id) else {
            return false;
        };
        match now.signed_duration_since(*last).to_std() {
            Ok(elapsed) => elapsed < self.cooldown,
            Err(_) => true,
        }
    }

    /// Crop and write one object. `None` when the box is outside the frame.
    fn save(
        &self,
        frame: &Frame,
        object: &TrackedObjectSnapshot,
        now: DateTime<Utc>,
    ) -> ServerResult<Option<PathBuf>> {
        let Some(visible) = object.bbox.clip_to(frame.width(), frame.height()) else {
            debug!(track_id = %object.id, "Object outside frame, snapshot skipped");
            return Ok(None);
        };

        let x = visible.x as u32;
        let y = visible.y as u32;
        let width = (visible.width as u32).min(frame.width() - x);
        let height = (visible.height as u32).min(frame.height() - y);
        if width == 0 || height == 0 {
            return Ok(None);
        }

        let crop = image::imageops::crop_imm(frame.rgb(), x, y, width, height).to_image();
        let jpeg = encode_jpeg(&crop, self.quality)?;

        let dir = self
            .dir
            .join(object.category.plural())
            .join(object.id.to_string());
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.jpg", now.format(TIMESTAMP_FORMAT)));
        std::fs::write(&path, jpeg)?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kennelcam_models::{BoundingBox, Category};
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    fn object(id: u64, category: Category) -> TrackedObjectSnapshot {
        TrackedObjectSnapshot {
            id: TrackId(id),
            bbox: BoundingBox::new(10.0, 10.0, 20.0, 30.0),
            category,
            last_seen: Utc::now(),
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_export_layout() {
        let dir = TempDir::new().unwrap();
        let mut exporter = SnapshotExporter::new(dir.path(), Duration::from_secs(10), 80).unwrap();
        let frame = Frame::filled(100, 100, [200, 100, 50]);

        let written = assert_ok!(exporter.export(
            &frame,
            &[object(3, Category::Dog), object(4, Category::Person)],
            start()
        ));

        assert_eq!(written.len(), 2);
        let dog = dir.path().join("dogs/3/2024-05-01_12-00-00.jpg");
        assert_eq!(written[0], dog);
        assert!(dir.path().join("owners/4/2024-05-01_12-00-00.jpg").is_file());

        let crop = image::open(&dog).unwrap();
        assert_eq!((crop.width(), crop.height()), (20, 30));
    }

    #[test]
    fn test_export_respects_cooldown() {
        let dir = TempDir::new().unwrap();
        let mut exporter = SnapshotExporter::new(dir.path(), Duration::from_secs(10), 80).unwrap();
        let frame = Frame::filled(100, 100, [0, 0, 0]);
        let objects = [object(1, Category::Dog)];

        assert_eq!(exporter.export(&frame, &objects, start()).unwrap().len(), 1);
        let within = start() + chrono::Duration::seconds(9);
        assert!(exporter.export(&frame, &objects, within).unwrap().is_empty());
        let after = start() + chrono::Duration::seconds(10);
        assert_eq!(exporter.export(&frame, &objects, after).unwrap().len(), 1);

        let files = std::fs::read_dir(dir.path().join("dogs/1")).unwrap().count();
        assert_eq!(files, 2);
    }

    #[test]
    fn test_export_registers_dogs_only() {
        let dir = TempDir::new().unwrap();
        let mut exporter = SnapshotExporter::new(dir.path(), Duration::from_secs(10), 80).unwrap();
        let frame = Frame::filled(100, 100, [0, 0, 0]);
        let objects = [object(3, Category::Dog), object(4, Category::Person)];

        let first = assert_ok!(exporter.export(&frame, &objects, start()));
        let later = start() + chrono::Duration::seconds(20);
        let second = assert_ok!(exporter.export(&frame, &objects, later));

        let registry = exporter.registry();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(TrackId(4)).is_none());

        let dog = registry.get(TrackId(3)).unwrap();
        assert_eq!(dog.first_seen, start());
        assert_eq!(dog.last_seen, later);
        assert_eq!(dog.image_path, first[0]);
        assert_eq!(dog.latest_image_path, second[0]);
    }

    #[test]
    fn test_export_reuses_existing_registry() {
        let dir = TempDir::new().unwrap();
        let frame = Frame::filled(100, 100, [0, 0, 0]);
        let objects = [object(1, Category::Dog)];

        let mut exporter = SnapshotExporter::new(dir.path(), Duration::from_secs(10), 80).unwrap();
        exporter.export(&frame, &objects, start()).unwrap();

        let mut restarted = SnapshotExporter::new(dir.path(), Duration::from_secs(10), 80).unwrap();
        let later = start() + chrono::Duration::seconds(60);
        restarted.export(&frame, &objects, later).unwrap();

        let dog = restarted.registry().get(TrackId(1)).unwrap();
        assert_eq!((dog.first_seen, dog.last_seen), (start(), later));
    }

    #[test]
    fn test_export_skips_offscreen_objects() {
        let dir = TempDir::new().unwrap();
        let mut exporter = SnapshotExporter::new(dir.path(), Duration::from_secs(10), 80).unwrap();
        let frame = Frame::filled(100, 100, [0, 0, 0]);
        let mut offscreen = object(7, Category::from("cat"));
        offscreen.bbox = BoundingBox::new(300.0, 300.0, 10.0, 10.0);

        assert!(exporter.export(&frame, &[offscreen], start()).unwrap().is_empty());
        assert!(!dir.path().join("cats").exists());
    }
}
