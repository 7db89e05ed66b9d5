//! Picture storage: enumerate a category's directory and pick one at random.

use std::path::PathBuf;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::warn;

use crate::config::StorageSettings;

/// On-disk directory holding a category's pictures.
pub fn category_dir(storage: &StorageSettings, category: &str) -> PathBuf {
    storage.base_path.join("pictures").join(category)
}

/// File names currently in a category's directory.
///
/// The listing is taken fresh on every call, so pictures added or removed by
/// the parser show up on the next request. A missing or unreadable directory
/// is the same as an empty one.
pub async fn list_pictures(storage: &StorageSettings, category: &str) -> Vec<String> {
    let dir = category_dir(storage, category);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Failed to list {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read entry in {}: {e}", dir.display());
                break;
            }
        }
    }
    names
}

/// Uniform choice over a listing. None when the listing is empty.
pub fn choose_picture<'a, R: Rng + ?Sized>(names: &'a [String], rng: &mut R) -> Option<&'a str> {
    names.choose(rng).map(String::as_str)
}

/// A random picture file name from a category, or None when it has none.
pub async fn random_picture(storage: &StorageSettings, category: &str) -> Option<String> {
    let names = list_pictures(storage, category).await;
    choose_picture(&names, &mut rand::thread_rng()).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use url::Url;

    fn storage(dir: &TempDir) -> StorageSettings {
        StorageSettings {
            url: Url::parse("https://pics.example.com/").unwrap(),
            base_path: dir.path().to_path_buf(),
        }
    }

    fn add_picture(dir: &TempDir, category: &str, name: &str) {
        let category_dir = dir.path().join("pictures").join(category);
        std::fs::create_dir_all(&category_dir).unwrap();
        std::fs::write(category_dir.join(name), b"\xff\xd8").unwrap();
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_pictures(&storage(&dir), "cats").await.is_empty());
        assert!(random_picture(&storage(&dir), "cats").await.is_none());
    }

    #[tokio::test]
    async fn test_empty_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("pictures").join("cats")).unwrap();
        assert!(random_picture(&storage(&dir), "cats").await.is_none());
    }

    #[tokio::test]
    async fn test_lists_all_files() {
        let dir = TempDir::new().unwrap();
        add_picture(&dir, "cats", "a.jpg");
        add_picture(&dir, "cats", "b.jpg");
        add_picture(&dir, "dogs", "c.jpg");

        let mut names = list_pictures(&storage(&dir), "cats").await;
        names.sort();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[tokio::test]
    async fn test_random_picture_is_from_listing() {
        let dir = TempDir::new().unwrap();
        add_picture(&dir, "cats", "a.jpg");
        add_picture(&dir, "cats", "b.jpg");

        for _ in 0..20 {
            let pic = random_picture(&storage(&dir), "cats").await.unwrap();
            assert!(pic == "a.jpg" || pic == "b.jpg");
        }
    }

    #[tokio::test]
    async fn test_listing_is_live() {
        let dir = TempDir::new().unwrap();
        add_picture(&dir, "cats", "a.jpg");
        assert_eq!(random_picture(&storage(&dir), "cats").await.unwrap(), "a.jpg");

        std::fs::remove_file(dir.path().join("pictures").join("cats").join("a.jpg")).unwrap();
        assert!(random_picture(&storage(&dir), "cats").await.is_none());
    }

    #[test]
    fn test_choose_picture_empty() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(choose_picture(&[], &mut rng).is_none());
    }

    #[test]
    fn test_choose_picture_roughly_uniform() {
        let names: Vec<String> = ["a.jpg", "b.jpg", "c.jpg"].iter().map(|s| s.to_string()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let trials = 3000;
        for _ in 0..trials {
            *counts.entry(choose_picture(&names, &mut rng).unwrap()).or_default() += 1;
        }
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            let share = counts[name] as f64 / trials as f64;
            assert!((share - 1.0 / 3.0).abs() < 0.05, "{name} share was {share}");
        }
    }
}
