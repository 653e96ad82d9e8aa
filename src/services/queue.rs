use std::sync::Arc;

use teloxide::prelude::*;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::config::Settings;
use crate::services::browser::BrowserSession;
use crate::services::profiles::ProfileStore;
use crate::utils::format::truncate_str;

/// One unit of queued automation work: a prompt destined for one or more profiles.
/// Consumed exactly once; lost on process exit.
#[derive(Debug, Clone)]
pub struct Job {
    pub prompt: String,
    /// Chat the status replies go back to
    pub chat: ChatId,
    /// When set, the job submits once with this profile instead of fanning out
    pub forced_profile: Option<String>,
}

pub type JobSender = mpsc::UnboundedSender<Job>;
pub type JobReceiver = mpsc::UnboundedReceiver<Job>;

pub fn channel() -> (JobSender, JobReceiver) {
    mpsc::unbounded_channel()
}

/// Profiles a job expands into at consumption time: the forced profile alone,
/// or every loaded profile in load order.
pub fn submission_profiles(job: &Job, loaded: &[String]) -> Vec<String> {
    match &job.forced_profile {
        Some(profile) => vec![profile.clone()],
        None => loaded.to_vec(),
    }
}

/// Full composer text for one submission.
pub fn build_full_prompt(base: &str, profile: &str, chaos: u32) -> String {
    format!("{} --c {} --profile {}", base, chaos, profile)
}

/// Perpetual queue worker. Pulls jobs one at a time, expands each into browser
/// submissions, and serializes them with a fixed cool-down after every
/// submission. Never terminates on its own; a dequeued job always runs to
/// completion.
pub async fn run(
    bot: Bot,
    mut jobs: JobReceiver,
    session: Option<BrowserSession>,
    store: Arc<ProfileStore>,
    settings: Settings,
) {
    println!("  ✓ Queue worker started");

    while let Some(job) = jobs.recv().await {
        let ts = chrono::Local::now().format("%H:%M:%S");
        println!("  [{ts}] ◀ Job dequeued: {}", truncate_str(&job.prompt, 40));

        let targets = submission_profiles(&job, &store.profiles);
        if targets.is_empty() {
            let _ = bot
                .send_message(job.chat, "No profiles loaded! Check the profiles file.")
                .await;
            continue;
        }

        let Some(session) = session.as_ref() else {
            let _ = bot
                .send_message(
                    job.chat,
                    "Browser session is not available — prompt skipped.",
                )
                .await;
            continue;
        };

        let fan_out = targets.len();
        for profile in targets {
            let full_prompt = build_full_prompt(&job.prompt, &profile, settings.chaos);
            match session.submit(&full_prompt).await {
                Ok(()) => {
                    let ts = chrono::Local::now().format("%H:%M:%S");
                    println!("  [{ts}] ▶ Sent prompt with profile {profile}");
                    let _ = bot
                        .send_message(job.chat, format!("Sent: {}", full_prompt))
                        .await;
                }
                Err(e) => {
                    // One failed submission skips only itself; the remaining
                    // profiles and jobs still run.
                    let ts = chrono::Local::now().format("%H:%M:%S");
                    println!("  [{ts}] ✗ Error with profile {profile}: {e}");
                    let _ = bot
                        .send_message(job.chat, format!("Error with profile {}: {}", profile, e))
                        .await;
                }
            }

            // Cool down after every submission, success or not
            sleep(settings.submit_delay()).await;
        }

        if fan_out > 1 {
            let _ = bot.send_message(job.chat, "Completed all profiles!").await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(prompt: &str, forced: Option<&str>) -> Job {
        Job {
            prompt: prompt.to_string(),
            chat: ChatId(1),
            forced_profile: forced.map(String::from),
        }
    }

    #[test]
    fn test_forced_profile_submits_once() {
        let loaded = vec!["a".to_string(), "b".to_string()];
        let targets = submission_profiles(&job("x", Some("forced")), &loaded);
        assert_eq!(targets, vec!["forced"]);
    }

    #[test]
    fn test_fan_out_covers_every_profile_in_order() {
        let loaded = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let targets = submission_profiles(&job("x", None), &loaded);
        assert_eq!(targets, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_profiles_and_no_forced_yields_nothing() {
        let targets = submission_profiles(&job("x", None), &[]);
        assert!(targets.is_empty());
    }

    #[test]
    fn test_build_full_prompt() {
        assert_eq!(
            build_full_prompt("a cat in the rain", "12345", 15),
            "a cat in the rain --c 15 --profile 12345"
        );
    }

    #[tokio::test]
    async fn test_channel_is_fifo_across_jobs() {
        let (tx, mut rx) = channel();
        for i in 0..5 {
            tx.send(job(&format!("prompt-{i}"), None)).unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(job) = rx.recv().await {
            seen.push(job.prompt);
        }
        assert_eq!(
            seen,
            vec!["prompt-0", "prompt-1", "prompt-2", "prompt-3", "prompt-4"]
        );
    }

    #[tokio::test]
    async fn test_fifo_consumption_regardless_of_fan_out() {
        // A large fan-out job ahead of a single-submission job must still
        // complete first: expansion happens per job, strictly in dequeue order.
        let loaded: Vec<String> = (0..4).map(|i| format!("p{i}")).collect();
        let (tx, mut rx) = channel();
        tx.send(job("first", None)).unwrap();
        tx.send(job("second", Some("only"))).unwrap();
        drop(tx);

        let mut submissions = Vec::new();
        while let Some(job) = rx.recv().await {
            for profile in submission_profiles(&job, &loaded) {
                submissions.push(format!("{}:{}", job.prompt, profile));
            }
        }
        assert_eq!(
            submissions,
            vec![
                "first:p0", "first:p1", "first:p2", "first:p3",
                "second:only",
            ]
        );
    }
}
