use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Profile identifiers and moodboard aliases, loaded once at startup.
/// Read-only afterwards; shared between the dispatcher and the queue worker.
#[derive(Debug, Default)]
pub struct ProfileStore {
    /// Profile identifiers in file order. Duplicates are kept as-is.
    pub profiles: Vec<String>,
    moodboards: HashMap<String, String>,
}

impl ProfileStore {
    /// Load both data files, warning on the console for anything missing.
    pub fn load(profiles_path: &Path, moodboards_path: &Path) -> Self {
        let profiles = load_profiles(profiles_path);
        let moodboards = load_moodboards(moodboards_path);
        Self { profiles, moodboards }
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Translate a moodboard alias to its profile identifier.
    /// An unknown alias is returned unchanged, so raw identifiers pass through.
    pub fn resolve_moodboard(&self, alias: &str) -> String {
        self.moodboards
            .get(alias)
            .cloned()
            .unwrap_or_else(|| alias.to_string())
    }

    #[cfg(test)]
    fn with_data(profiles: Vec<String>, moodboards: HashMap<String, String>) -> Self {
        Self { profiles, moodboards }
    }
}

/// Read newline-separated profile identifiers. Blank lines are skipped,
/// surrounding whitespace is trimmed, order is preserved.
fn load_profiles(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let profiles: Vec<String> = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect();
            println!("  ✓ Loaded {} profiles from {}", profiles.len(), path.display());
            profiles
        }
        Err(_) => {
            println!("  ⚠ Profile file not found: {}", path.display());
            Vec::new()
        }
    }
}

/// Read the alias → profile identifier map from a JSON object.
/// Duplicate keys resolve last-write-wins during the parse.
fn load_moodboards(path: &Path) -> HashMap<String, String> {
    let Ok(content) = fs::read_to_string(path) else {
        println!("  ⚠ Moodboard file not found: {}", path.display());
        return HashMap::new();
    };
    match serde_json::from_str::<HashMap<String, String>>(&content) {
        Ok(map) => {
            println!("  ✓ Loaded {} moodboards from {}", map.len(), path.display());
            map
        }
        Err(e) => {
            println!("  ⚠ Invalid moodboard file {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}
