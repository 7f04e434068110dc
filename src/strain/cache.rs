// On-disk cache for downloaded strain files
// Files are keyed by the SHA256 of their archive URL

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to get cache directory")]
    NoCacheDir,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Directory of previously downloaded strain files
#[derive(Debug, Clone)]
pub struct StrainCache {
    dir: PathBuf,
}

impl StrainCache {
    pub fn new(dir: PathBuf) -> Self {
        StrainCache { dir }
    }

    /// Cache under the platform cache directory (e.g., ~/.cache/strainwave)
    pub fn default_location() -> CacheResult<Self> {
        let cache_dir = dirs::cache_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(StrainCache::new(cache_dir.join("strainwave")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the file for `url` is (or would be) stored
    pub fn path_for(&self, url: &str) -> PathBuf {
        let extension = if url.ends_with(".gz") { "gz" } else { "dat" };
        self.dir.join(format!("{}.{}", calculate_sha256(url.as_bytes()), extension))
    }

    /// Cached bytes for `url`, if present
    pub fn load(&self, url: &str) -> CacheResult<Option<Vec<u8>>> {
        let path = self.path_for(url);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    /// Store downloaded bytes for `url` and return the file path
    pub fn store(&self, url: &str, data: &[u8]) -> CacheResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(url);
        let mut file = fs::File::create(&path)?;
        file.write_all(data)?;
        Ok(path)
    }
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_calculate_sha256() {
        let data = b"hello world";
        let hash = calculate_sha256(data);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_cache_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StrainCache::new(temp_dir.path().join("strain"));
        let url = "https://example.org/H-H1_LOSC_4_V2-1126259446-32.txt.gz";

        assert!(cache.load(url).unwrap().is_none());

        let path = cache.store(url, b"payload").unwrap();
        assert!(path.starts_with(cache.dir()));
        assert_eq!(path.extension().unwrap(), "gz");
        assert_eq!(cache.load(url).unwrap().unwrap(), b"payload".to_vec());
    }

    #[test]
    fn test_distinct_urls_distinct_paths() {
        let cache = StrainCache::new(PathBuf::from("/tmp/cache"));
        assert_ne!(cache.path_for("a.txt.gz"), cache.path_for("b.txt.gz"));
    }
}
