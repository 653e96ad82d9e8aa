use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Telegram bot token; the TELOXIDE_TOKEN environment variable takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_token: Option<String>,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Fixed destination the composer lives at; submissions navigate here first
    #[serde(default)]
    pub composer_url: String,
    #[serde(default = "default_composer_selector")]
    pub composer_selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moodboards_path: Option<String>,
    /// Delay between consecutive browser submissions, in seconds
    #[serde(default = "default_submit_delay_secs")]
    pub submit_delay_secs: u64,
    /// Wait after a page navigation before touching elements, in seconds
    #[serde(default = "default_page_settle_secs")]
    pub page_settle_secs: u64,
    /// How long to wait for an element to appear, in seconds
    #[serde(default = "default_element_timeout_secs")]
    pub element_timeout_secs: u64,
    /// Extra attempts when a composer click is intercepted
    #[serde(default = "default_click_retries")]
    pub click_retries: u32,
    /// `--c` value appended to every submitted prompt
    #[serde(default = "default_chaos")]
    pub chaos: u32,
}

fn default_login_url() -> String {
    "https://discord.com/login".to_string()
}

fn default_composer_selector() -> String {
    "div[role=\"textbox\"]".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_submit_delay_secs() -> u64 {
    3
}

fn default_page_settle_secs() -> u64 {
    5
}

fn default_element_timeout_secs() -> u64 {
    10
}

fn default_click_retries() -> u32 {
    3
}

fn default_chaos() -> u32 {
    15
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram_token: None,
            login_url: default_login_url(),
            composer_url: String::new(),
            composer_selector: default_composer_selector(),
            login_email: None,
            login_password: None,
            chrome_executable: None,
            headless: default_headless(),
            profiles_path: None,
            moodboards_path: None,
            submit_delay_secs: default_submit_delay_secs(),
            page_settle_secs: default_page_settle_secs(),
            element_timeout_secs: default_element_timeout_secs(),
            click_retries: default_click_retries(),
            chaos: default_chaos(),
        }
    }
}

impl Settings {
    /// Returns the config directory path (~/.promptrelay)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".promptrelay"))
    }

    /// Returns the config file path (~/.promptrelay/settings.json)
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.json"))
    }

    /// Returns the persistent Chromium profile directory (~/.promptrelay/browser)
    pub fn browser_data_dir() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("browser"))
    }

    /// Ensures the config directory and a default settings file exist
    /// Called on startup to initialize configuration
    pub fn ensure_config_exists() {
        if let Some(config_dir) = Self::config_dir() {
            if !config_dir.exists() {
                if fs::create_dir_all(&config_dir).is_ok() {
                    // Settings hold credentials; keep the directory user-only on Unix
                    #[cfg(unix)]
                    {
                        use std::os::unix::fs::PermissionsExt;
                        let perms = fs::Permissions::from_mode(0o700);
                        let _ = fs::set_permissions(&config_dir, perms);
                    }
                }
            }
        }

        if let Some(config_path) = Self::config_path() {
            if !config_path.exists() {
                let default_settings = Self::default();
                let _ = default_settings.save();
            }
        }
    }

    /// Loads settings from the config file, returns default if not found or invalid
    pub fn load() -> Self {
        Self::load_with_error().unwrap_or_default()
    }

    /// Loads settings from the config file with error information
    pub fn load_with_error() -> Result<Self, String> {
        Self::ensure_config_exists();

        let config_path = Self::config_path()
            .ok_or_else(|| "Could not determine config path".to_string())?;

        let content = fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Invalid JSON in settings.json: {}", e))
    }

    /// Saves settings to the config file using atomic write pattern
    pub fn save(&self) -> io::Result<()> {
        let Some(config_dir) = Self::config_dir() else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine config directory",
            ));
        };

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = fs::Permissions::from_mode(0o700);
                let _ = fs::set_permissions(&config_dir, perms);
            }
        }

        let config_path = config_dir.join("settings.json");
        let temp_path = config_dir.join("settings.json.tmp");
        let content = serde_json::to_string_pretty(self)?;

        // Atomic write: write to temp file first, then rename
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &config_path)?;

        Ok(())
    }

    /// Bot token: TELOXIDE_TOKEN environment variable, then settings file
    pub fn token(&self) -> Option<String> {
        env::var("TELOXIDE_TOKEN").ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.telegram_token.clone())
    }

    /// Login email: PROMPTRELAY_EMAIL environment variable, then settings file
    pub fn email(&self) -> Option<String> {
        env::var("PROMPTRELAY_EMAIL").ok()
            .filter(|e| !e.is_empty())
            .or_else(|| self.login_email.clone())
    }

    /// Login password: PROMPTRELAY_PASSWORD environment variable, then settings file
    pub fn password(&self) -> Option<String> {
        env::var("PROMPTRELAY_PASSWORD").ok()
            .filter(|p| !p.is_empty())
            .or_else(|| self.login_password.clone())
    }

    /// Path of the newline-delimited profile list
    pub fn profiles_path(&self) -> PathBuf {
        match &self.profiles_path {
            Some(p) => PathBuf::from(p),
            None => Self::config_dir()
                .map(|d| d.join("profiles.txt"))
                .unwrap_or_else(|| PathBuf::from("profiles.txt")),
        }
    }

    /// Path of the moodboard alias map
    pub fn moodboards_path(&self) -> PathBuf {
        match &self.moodboards_path {
            Some(p) => PathBuf::from(p),
            None => Self::config_dir()
                .map(|d| d.join("moodboards.json"))
                .unwrap_or_else(|| PathBuf::from("moodboards.json")),
        }
    }

    pub fn submit_delay(&self) -> Duration {
        Duration::from_secs(self.submit_delay_secs)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_secs(self.page_settle_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.login_url, "https://discord.com/login");
        assert_eq!(settings.composer_selector, "div[role=\"textbox\"]");
        assert!(settings.composer_url.is_empty());
        assert!(settings.headless);
        assert_eq!(settings.submit_delay_secs, 3);
        assert_eq!(settings.element_timeout_secs, 10);
        assert_eq!(settings.click_retries, 3);
        assert_eq!(settings.chaos, 15);
    }

    #[test]
    fn test_parse_partial_json() {
        let json = r#"{"composer_url":"https://example.com/channels/@me/1"}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.composer_url, "https://example.com/channels/@me/1");
        assert_eq!(settings.submit_delay_secs, 3); // default
        assert_eq!(settings.login_url, "https://discord.com/login"); // default
    }

    #[test]
    fn test_parse_overrides() {
        let json = r#"{"headless":false,"submit_delay_secs":7,"chaos":40,"profiles_path":"/tmp/p.txt"}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert!(!settings.headless);
        assert_eq!(settings.submit_delay(), Duration::from_secs(7));
        assert_eq!(settings.chaos, 40);
        assert_eq!(settings.profiles_path(), PathBuf::from("/tmp/p.txt"));
    }

    #[test]
    fn test_roundtrip_keeps_optional_fields_absent() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("telegram_token"));
        assert!(!json.contains("login_email"));
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert!(back.telegram_token.is_none());
        assert!(back.login_email.is_none());
    }
}
