//! Archive directory on the local file system.

use super::{BoxFuture, DocumentStore, StorageError, StorageResult, StoredMap, document_id};
use crate::document::Document;
use std::fs;
use std::path::{Path, PathBuf};

/// One `<id>.json` per archived map.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open an archive at `root`, creating the directory if needed.
    pub fn new(root: PathBuf) -> StorageResult<Self> {
        fs::create_dir_all(&root)
            .map_err(|e| StorageError::Io(format!("Cannot create {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    /// Archive under `<data_local>/mapdraft/documents`.
    pub fn default_location() -> StorageResult<Self> {
        let data = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("No data directory for this user".to_string()))?;
        Self::new(data.join("mapdraft").join("documents"))
    }

    pub fn base_path(&self) -> &Path {
        &self.root
    }

    /// First id not yet taken, suffixing `-2`, `-3`... on collisions.
    fn free_id(&self, base: &str) -> String {
        let taken = |id: &str| self.root.join(format!("{}.json", id)).exists();
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|id| !taken(id))
            .unwrap_or_else(|| base.to_string())
    }

    fn read_entry(path: &Path) -> Option<StoredMap> {
        let id = path.file_stem()?.to_str()?.to_string();
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| Document::from_json(&json).map_err(|e| e.to_string()));
        match parsed {
            Ok(doc) => Some(StoredMap {
                id,
                title: doc.map_title,
                export_date: doc.export_date,
                geometry_count: doc.geometries.len(),
            }),
            Err(e) => {
                log::warn!("Skipping unreadable archive entry {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl DocumentStore for FileStore {
    fn save(&self, document: &Document) -> BoxFuture<'_, StorageResult<String>> {
        let json = document.to_json();
        let id = self.free_id(&document_id(document));
        let title = document.map_title.clone();

        Box::pin(async move {
            let json = json.map_err(|e| StorageError::Serialization(e.to_string()))?;
            let path = self.root.join(format!("{}.json", id));
            let partial = path.with_extension("json.partial");
            fs::write(&partial, json)
                .and_then(|_| fs::rename(&partial, &path))
                .map_err(|e| StorageError::Io(format!("Cannot write {}: {}", path.display(), e)))?;
            log::info!("Archived map '{}' as {}", title, id);
            Ok(id)
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<StoredMap>>> {
        Box::pin(async move {
            let entries = fs::read_dir(&self.root).map_err(|e| {
                StorageError::Io(format!("Cannot read {}: {}", self.root.display(), e))
            })?;
            let mut maps: Vec<StoredMap> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|e| e == "json"))
                .filter_map(|path| Self::read_entry(&path))
                .collect();
            maps.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(maps)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::Composition;
    use crate::document::export_document;
    use crate::storage::block_on;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn document(title: &str) -> Document {
        let mut comp = Composition::new();
        comp.set_title(title).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        export_document(&comp, at)
    }

    #[test]
    fn test_save_and_list() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("archive")).unwrap();

        let id = block_on(store.save(&document("Coastline"))).unwrap();
        assert_eq!(id, "carte_Coastline_2024-06-01T12-00-00");
        assert!(dir.path().join("archive").join(format!("{}.json", id)).exists());

        let maps = block_on(store.list()).unwrap();
        assert_eq!(
            maps,
            vec![StoredMap {
                id,
                title: "Coastline".to_string(),
                export_date: "2024-06-01T12:00:00.000Z".to_string(),
                geometry_count: 0,
            }]
        );
    }

    #[test]
    fn test_same_title_and_time_gets_suffix() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let doc = document("Route");
        let first = block_on(store.save(&doc)).unwrap();
        let second = block_on(store.save(&doc)).unwrap();
        assert_eq!(second, format!("{}-2", first));
        assert_eq!(block_on(store.list()).unwrap().len(), 2);
    }

    #[test]
    fn test_list_skips_unreadable_files() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        block_on(store.save(&document(""))).unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let maps = block_on(store.list()).unwrap();
        assert_eq!(maps.len(), 1);
        assert!(maps[0].id.starts_with("carte_export_"));
    }
}
