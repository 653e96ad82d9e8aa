use std::sync::Arc;

use teloxide::prelude::*;

use crate::services::profiles::ProfileStore;
use crate::services::queue::{Job, JobSender};
use crate::utils::format::{floor_char_boundary, truncate_str};

/// Telegram message length limit
const TELEGRAM_MSG_LIMIT: usize = 4096;

/// The three recognized direct-message command forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// `imagine <text>`: one prompt, fanned out to every loaded profile
    Imagine(String),
    /// `batch [<alias>::]<p1>|<p2>|...`: several prompts, optionally pinned
    /// to one profile for the whole batch
    Batch {
        alias: Option<String>,
        prompts: Vec<String>,
    },
    /// `profiles`: report loaded profile identifiers
    Profiles,
}

/// Parse a direct message into a command. Prefixes match case-insensitively;
/// anything unrecognized returns None and is ignored.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("profiles") {
        return Some(BotCommand::Profiles);
    }
    if let Some(rest) = strip_prefix_ci(text, "imagine ") {
        return Some(BotCommand::Imagine(rest.trim().to_string()));
    }
    if let Some(rest) = strip_prefix_ci(text, "batch ") {
        return Some(parse_batch(rest));
    }
    None
}

/// Case-insensitive prefix strip. The prefix is ASCII; a message starting with
/// a multi-byte character simply fails the boundary check.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

/// Split a batch body into its optional alias segment and prompt list.
/// Prompts are trimmed; empty ones are dropped here, before anything is queued.
fn parse_batch(rest: &str) -> BotCommand {
    let (alias, body) = match rest.split_once("::") {
        Some((alias, body)) => {
            let alias = alias.trim();
            if alias.is_empty() {
                (None, body)
            } else {
                (Some(alias.to_string()), body)
            }
        }
        None => (None, rest),
    };
    let prompts: Vec<String> = body
        .split('|')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();
    BotCommand::Batch { alias, prompts }
}

/// Entry point: run the Telegram bot with long polling until it is stopped.
pub async fn run_bot(bot: Bot, jobs: JobSender, store: Arc<ProfileStore>) {
    println!("  ✓ Bot connected — listening for direct messages");

    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let jobs = jobs.clone();
        let store = store.clone();
        async move { handle_message(bot, msg, jobs, store).await }
    })
    .await;
}

/// Route one incoming message. Only text in private chats is considered;
/// unrecognized content is silently ignored.
async fn handle_message(
    bot: Bot,
    msg: Message,
    jobs: JobSender,
    store: Arc<ProfileStore>,
) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(command) = parse_command(text) else {
        return Ok(());
    };

    let chat_id = msg.chat.id;
    let user_name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.as_str())
        .unwrap_or("unknown");
    let timestamp = chrono::Local::now().format("%H:%M:%S");

    match command {
        BotCommand::Imagine(prompt) => {
            if prompt.is_empty() {
                // Empty after trimming, dropped before enqueue
                return Ok(());
            }
            println!("  [{timestamp}] ◀ [{user_name}] imagine {}", truncate_str(&prompt, 40));

            if store.is_empty() {
                bot.send_message(chat_id, "No profiles loaded! Check the profiles file.")
                    .await?;
                return Ok(());
            }

            bot.send_message(
                chat_id,
                format!(
                    "Processing prompt: {}\nUsing {} profiles...",
                    prompt,
                    store.len()
                ),
            )
            .await?;

            let _ = jobs.send(Job {
                prompt,
                chat: chat_id,
                forced_profile: None,
            });
        }
        BotCommand::Batch { alias, prompts } => {
            println!(
                "  [{timestamp}] ◀ [{user_name}] batch of {} prompt(s){}",
                prompts.len(),
                alias.as_deref().map(|a| format!(" via {a}")).unwrap_or_default()
            );

            if prompts.is_empty() {
                bot.send_message(chat_id, "Batch contained no prompts.").await?;
                return Ok(());
            }

            let forced_profile = alias.map(|a| store.resolve_moodboard(&a));
            if forced_profile.is_none() && store.is_empty() {
                bot.send_message(chat_id, "No profiles loaded! Check the profiles file.")
                    .await?;
                return Ok(());
            }

            let notice = match &forced_profile {
                Some(profile) => format!(
                    "Queued {} prompt(s) with profile {}.",
                    prompts.len(),
                    profile
                ),
                None => format!(
                    "Queued {} prompt(s) across {} profiles...",
                    prompts.len(),
                    store.len()
                ),
            };
            bot.send_message(chat_id, notice).await?;

            for prompt in prompts {
                let _ = jobs.send(Job {
                    prompt,
                    chat: chat_id,
                    forced_profile: forced_profile.clone(),
                });
            }
        }
        BotCommand::Profiles => {
            println!("  [{timestamp}] ◀ [{user_name}] profiles");
            if store.is_empty() {
                bot.send_message(chat_id, "No profiles loaded!").await?;
            } else {
                let listing = format!("Loaded profiles:\n{}", store.profiles.join("\n"));
                send_long_message(&bot, chat_id, &listing).await?;
            }
        }
    }

    Ok(())
}

/// Send a message that may exceed Telegram's 4096 character limit by
/// splitting it into multiple messages on UTF-8 safe boundaries, preferring
/// newlines at split points.
async fn send_long_message(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    if text.len() <= TELEGRAM_MSG_LIMIT {
        bot.send_message(chat_id, text).await?;
        return Ok(());
    }

    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= TELEGRAM_MSG_LIMIT {
            bot.send_message(chat_id, remaining).await?;
            break;
        }
        let safe_end = floor_char_boundary(remaining, TELEGRAM_MSG_LIMIT);
        let split_at = remaining[..safe_end].rfind('\n').unwrap_or(safe_end);
        let (chunk, rest) = remaining.split_at(split_at);
        bot.send_message(chat_id, chunk).await?;
        remaining = rest.strip_prefix('\n').unwrap_or(rest);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_imagine() {
        assert_eq!(
            parse_command("imagine a red fox"),
            Some(BotCommand::Imagine("a red fox".to_string()))
        );
    }

    #[test]
    fn test_parse_imagine_case_insensitive() {
        assert_eq!(
            parse_command("IMAGINE a red fox"),
            Some(BotCommand::Imagine("a red fox".to_string()))
        );
        assert_eq!(
            parse_command("Imagine  padded  "),
            Some(BotCommand::Imagine("padded".to_string()))
        );
    }

    #[test]
    fn test_parse_imagine_preserves_prompt_case() {
        assert_eq!(
            parse_command("imagine A Red FOX"),
            Some(BotCommand::Imagine("A Red FOX".to_string()))
        );
    }

    #[test]
    fn test_parse_profiles() {
        assert_eq!(parse_command("profiles"), Some(BotCommand::Profiles));
        assert_eq!(parse_command("  PROFILES  "), Some(BotCommand::Profiles));
    }

    #[test]
    fn test_parse_batch_with_alias() {
        assert_eq!(
            parse_command("batch noir::a|b|c"),
            Some(BotCommand::Batch {
                alias: Some("noir".to_string()),
                prompts: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            })
        );
    }

    #[test]
    fn test_parse_batch_without_alias() {
        assert_eq!(
            parse_command("batch one | two "),
            Some(BotCommand::Batch {
                alias: None,
                prompts: vec!["one".to_string(), "two".to_string()],
            })
        );
    }

    #[test]
    fn test_parse_batch_drops_empty_prompts() {
        assert_eq!(
            parse_command("batch a|| |b"),
            Some(BotCommand::Batch {
                alias: None,
                prompts: vec!["a".to_string(), "b".to_string()],
            })
        );
    }

    #[test]
    fn test_parse_batch_empty_alias_segment_is_none() {
        assert_eq!(
            parse_command("batch ::a|b"),
            Some(BotCommand::Batch {
                alias: None,
                prompts: vec!["a".to_string(), "b".to_string()],
            })
        );
    }

    #[test]
    fn test_unrecognized_text_is_ignored() {
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("imagine"), None); // no payload, no trailing space
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("profilesX"), None);
    }

    #[test]
    fn test_multibyte_message_does_not_panic() {
        assert_eq!(parse_command("안녕하세요"), None);
        assert_eq!(
            parse_command("imagine 여우 한 마리"),
            Some(BotCommand::Imagine("여우 한 마리".to_string()))
        );
    }
}
