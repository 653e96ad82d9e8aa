use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::Settings;

/// Slash command typed into the composer ahead of every prompt
const SLASH_COMMAND: &str = "/imagine";

/// Poll interval while waiting for an element to appear
const ELEMENT_POLL: Duration = Duration::from_millis(500);

/// Pause between composer keystroke phases, mirroring a human typing cadence
const KEYSTROKE_PAUSE: Duration = Duration::from_millis(800);

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("browser is not configured: {0}")]
    Config(&'static str),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("authentication timed out waiting for `{0}`")]
    AuthTimeout(String),
    #[error("composer element `{0}` not found")]
    ComposerNotFound(String),
    #[error("composer click failed after {attempts} attempts: {last}")]
    ClickRejected { attempts: u32, last: String },
    #[error("browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// A single long-lived Chromium instance, authenticated once at startup.
/// All submissions go through the one page this session owns.
pub struct BrowserSession {
    page: Page,
    composer_url: String,
    composer_selector: String,
    page_settle: Duration,
    element_timeout: Duration,
    click_retries: u32,
    // Dropping the Browser closes Chromium; keep it for the session lifetime.
    _browser: Browser,
    _handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chromium, authenticate, and verify the composer is reachable.
    /// Any failure here leaves the caller without a session; submissions are
    /// then reported as unavailable instead of retried.
    pub async fn start(settings: &Settings) -> Result<Self, BrowserError> {
        if settings.composer_url.is_empty() {
            return Err(BrowserError::Config("composer_url is empty in settings.json"));
        }

        let mut builder = BrowserConfig::builder().no_sandbox();
        if !settings.headless {
            builder = builder.with_head().window_size(1280, 900);
        }
        if let Some(data_dir) = Settings::browser_data_dir() {
            builder = builder.user_data_dir(data_dir);
        }
        if let Some(path) = &settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        // The handler drives the CDP websocket; it must be polled for the
        // session's whole lifetime.
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser.new_page(settings.login_url.as_str()).await?;

        let session = Self {
            page,
            composer_url: settings.composer_url.clone(),
            composer_selector: settings.composer_selector.clone(),
            page_settle: settings.page_settle(),
            element_timeout: settings.element_timeout(),
            click_retries: settings.click_retries,
            _browser: browser,
            _handler_task: handler_task,
        };

        session.authenticate(settings).await?;
        Ok(session)
    }

    /// Fill the login form once, then verify by reaching the composer.
    /// A persisted browser profile may skip the form entirely; the composer
    /// probe is the authority on whether the session is usable.
    async fn authenticate(&self, settings: &Settings) -> Result<(), BrowserError> {
        let ts = chrono::Local::now().format("%H:%M:%S");
        match wait_for_element(&self.page, "input[name=\"email\"]", self.element_timeout).await {
            Some(email_field) => {
                let Some(email) = settings.email() else {
                    return Err(BrowserError::Config("login_email is not set"));
                };
                let Some(password) = settings.password() else {
                    return Err(BrowserError::Config("login_password is not set"));
                };
                email_field.click().await?;
                email_field.type_str(&email).await?;
                let password_field = self.page.find_element("input[name=\"password\"]").await?;
                password_field.type_str(&password).await?;
                password_field.press_key("Enter").await?;
                println!("  [{ts}] ✓ Login form submitted");
                sleep(self.page_settle).await;
            }
            None => {
                // No login form: a restored profile is likely already signed in
                println!("  [{ts}] ○ Login form not present, probing composer directly");
            }
        }

        self.page.goto(self.composer_url.as_str()).await?;
        sleep(self.page_settle).await;
        wait_for_element(&self.page, &self.composer_selector, self.element_timeout)
            .await
            .ok_or_else(|| BrowserError::AuthTimeout(self.composer_selector.clone()))?;
        Ok(())
    }

    /// Submit one prompt into the composer: navigate to the fixed destination,
    /// focus the composer, type the slash command, Tab into its argument field,
    /// type the prompt, press Enter.
    pub async fn submit(&self, full_prompt: &str) -> Result<(), BrowserError> {
        self.page.goto(self.composer_url.as_str()).await?;
        sleep(self.page_settle).await;

        let composer =
            wait_for_element(&self.page, &self.composer_selector, self.element_timeout)
                .await
                .ok_or_else(|| BrowserError::ComposerNotFound(self.composer_selector.clone()))?;

        self.click_with_retry(&composer).await?;
        sleep(KEYSTROKE_PAUSE).await;

        composer.type_str(SLASH_COMMAND).await?;
        sleep(KEYSTROKE_PAUSE).await;
        composer.press_key("Tab").await?;
        composer.type_str(full_prompt).await?;
        sleep(KEYSTROKE_PAUSE).await;
        composer.press_key("Enter").await?;

        Ok(())
    }

    /// Click an element, retrying when an overlay intercepts the click.
    async fn click_with_retry(&self, element: &Element) -> Result<(), BrowserError> {
        let attempts = self.click_retries.max(1);
        let mut last = String::new();
        for _ in 0..attempts {
            match element.click().await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    last = e.to_string();
                    sleep(ELEMENT_POLL).await;
                }
            }
        }
        Err(BrowserError::ClickRejected { attempts, last })
    }
}

/// Poll for an element until it exists or the timeout elapses.
async fn wait_for_element(page: &Page, selector: &str, timeout: Duration) -> Option<Element> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Some(element);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        sleep(ELEMENT_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_rejects_missing_composer_url() {
        let settings = Settings::default();
        assert!(settings.composer_url.is_empty());
        // start() is async and launches a real browser, so only the
        // configuration guard is exercised here.
        let err = futures::executor::block_on(async {
            BrowserSession::start(&settings).await.err()
        });
        assert!(matches!(err, Some(BrowserError::Config(_))));
    }

    #[test]
    fn test_error_display() {
        let err = BrowserError::ComposerNotFound("div[role=\"textbox\"]".to_string());
        assert!(err.to_string().contains("div[role=\"textbox\"]"));

        let err = BrowserError::ClickRejected { attempts: 3, last: "intercepted".to_string() };
        assert!(err.to_string().contains("3 attempts"));
    }
}
