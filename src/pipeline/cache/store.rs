use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{CacheError, SegmentCache};
use crate::models::{DocumentSegment, Requirement};
use crate::pipeline::import::short_hash;

const ENTRY_EXTENSION: &str = "json";

/// Cache key: the segment id (file-name safe) plus the first 16 hex
/// characters of the SHA-256 of its text. Any text change is a miss.
pub fn cache_key(segment: &DocumentSegment) -> String {
    let id: String = segment
        .id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{id}_{}", short_hash(&segment.text, 16))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
}

/// One JSON file per entry under a directory. Survives restarts and never
/// evicts on its own; see [`FileSegmentCache::purge`].
pub struct FileSegmentCache {
    dir: PathBuf,
}

impl FileSegmentCache {
    /// Open (creating if needed) the cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, segment: &DocumentSegment) -> PathBuf {
        self.dir
            .join(format!("{}.{ENTRY_EXTENSION}", cache_key(segment)))
    }

    fn entries(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file()
                && path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
            {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        for path in self.entries()? {
            stats.entries += 1;
            stats.bytes += fs::metadata(&path)?.len();
        }
        Ok(stats)
    }

    /// Delete every entry. Returns how many were removed.
    pub fn purge(&self) -> Result<usize, CacheError> {
        let entries = self.entries()?;
        for path in &entries {
            fs::remove_file(path)?;
        }
        tracing::info!(dir = %self.dir.display(), removed = entries.len(), "Segment cache purged");
        Ok(entries.len())
    }
}

impl SegmentCache for FileSegmentCache {
    fn get(&self, segment: &DocumentSegment) -> Result<Option<Vec<Requirement>>, CacheError> {
        let path = self.entry_path(segment);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Written to a temporary file in the same directory, then renamed over
    /// the entry, so readers never observe a partial write.
    fn put(&self, segment: &DocumentSegment, requirements: &[Requirement]) -> Result<(), CacheError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, requirements)?;
            writer.flush()?;
        }
        tmp.persist(self.entry_path(segment))
            .map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequirementType;

    fn segment(id: &str, text: &str) -> DocumentSegment {
        DocumentSegment::new(id, text, "srs.txt")
    }

    fn sample_requirements() -> Vec<Requirement> {
        let mut req = Requirement::new("FR-1", "系统应支持导出报表", RequirementType::Functional)
            .with_elements([("触发条件", "用户点击导出")]);
        req.completeness_score = 40.0;
        req.missing_elements.insert("验收标准".into());
        vec![req]
    }

    #[test]
    fn key_combines_id_and_text_hash() {
        let key = cache_key(&segment("srs.txt_ch1", "text"));
        assert!(key.starts_with("srs_txt_ch1_"));
        assert_eq!(key.len(), "srs_txt_ch1_".len() + 16);
    }

    #[test]
    fn key_changes_with_any_text_edit() {
        assert_ne!(
            cache_key(&segment("a", "需求 一")),
            cache_key(&segment("a", "需求  一"))
        );
        assert_eq!(cache_key(&segment("a", "x")), cache_key(&segment("a", "x")));
    }

    #[test]
    fn miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSegmentCache::open(dir.path()).unwrap();
        let seg = segment("doc_ch1", "系统应支持导出报表");

        assert!(cache.get(&seg).unwrap().is_none());
        cache.put(&seg, &sample_requirements()).unwrap();
        assert_eq!(cache.get(&seg).unwrap().unwrap(), sample_requirements());
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let seg = segment("doc_ch1", "text");
        FileSegmentCache::open(dir.path())
            .unwrap()
            .put(&seg, &sample_requirements())
            .unwrap();

        let reopened = FileSegmentCache::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&seg).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn put_replaces_whole_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSegmentCache::open(dir.path()).unwrap();
        let seg = segment("doc_ch1", "text");
        cache.put(&seg, &sample_requirements()).unwrap();
        cache.put(&seg, &[]).unwrap();
        assert!(cache.get(&seg).unwrap().unwrap().is_empty());
        assert_eq!(cache.stats().unwrap().entries, 1);
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSegmentCache::open(dir.path()).unwrap();
        let seg = segment("doc_ch1", "text");
        fs::write(cache.entry_path(&seg), "{not json").unwrap();
        assert!(matches!(cache.get(&seg), Err(CacheError::Serialization(_))));
    }

    #[test]
    fn purge_removes_entries_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSegmentCache::open(dir.path()).unwrap();
        cache.put(&segment("a", "1"), &[]).unwrap();
        cache.put(&segment("b", "2"), &sample_requirements()).unwrap();
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.bytes > 0);

        assert_eq!(cache.purge().unwrap(), 2);
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let cache = FileSegmentCache::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(cache.dir(), nested.as_path());
    }
}
