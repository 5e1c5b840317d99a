//! Human-readable conversation descriptions for the token message.

use crate::activity::{Activity, ConversationType};
use notiteams_core::{ConversationToken, DirectoryLookup, DirectoryMember};
use tracing::warn;

/// Members listed by name in an unnamed group chat description.
pub const MAX_LISTED_MEMBERS: usize = 5;

/// Channel name Teams leaves unset for a team's default channel.
const DEFAULT_CHANNEL_NAME: &str = "General";

/// Describes the activity's conversation as the requester would name it.
///
/// Directory failures are logged and the description falls back to the
/// conversation type; the token is delivered either way.
pub async fn describe_conversation(
    activity: &Activity,
    requester_id: &str,
    directory: &dyn DirectoryLookup,
) -> String {
    let conversation = activity.conversation.as_ref();
    let name = conversation
        .and_then(|c| c.name.as_deref())
        .filter(|n| !n.is_empty());

    match activity.conversation_type() {
        Some(ConversationType::Personal) => "this conversation".to_string(),
        Some(ConversationType::GroupChat) => {
            if let Some(name) = name {
                return format!("group chat named '{name}'");
            }
            let Some(chat_id) = activity.base_conversation_id() else {
                return ConversationType::GroupChat.as_str().to_string();
            };
            match directory.chat_members(chat_id).await {
                Ok(members) => unnamed_group_chat(&members, requester_id),
                Err(e) => {
                    warn!(chat_id, error = %e, "could not list chat members");
                    ConversationType::GroupChat.as_str().to_string()
                }
            }
        }
        Some(ConversationType::Channel) => {
            let channel = name.unwrap_or(DEFAULT_CHANNEL_NAME);
            let team = match activity.team_id() {
                Some(team_id) => match directory.team_name(team_id).await {
                    Ok(team) => team,
                    Err(e) => {
                        warn!(team_id, error = %e, "could not look up team name");
                        None
                    }
                },
                None => None,
            };
            match team {
                Some(team) => format!("channel '{team} > {channel}'"),
                None => format!("channel '{channel}'"),
            }
        }
        Some(ConversationType::Other) | None => ConversationType::Other.as_str().to_string(),
    }
}

/// Describes a group chat without a name by its members.
///
/// The requester is left out of the list and appended as "you"; at most
/// [`MAX_LISTED_MEMBERS`] names are shown, sorted.
#[must_use]
pub fn unnamed_group_chat(members: &[DirectoryMember], requester_id: &str) -> String {
    let others: Vec<&DirectoryMember> = members
        .iter()
        .filter(|m| m.external_id.as_deref() != Some(requester_id))
        .collect();

    let mut names: Vec<&str> = others
        .iter()
        .filter_map(|m| m.display_name.as_deref())
        .collect();
    names.sort_unstable();

    let shown = names
        .iter()
        .take(MAX_LISTED_MEMBERS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    let more = if names.len() > MAX_LISTED_MEMBERS { "..." } else { "" };
    let participants = others.len() + 1;

    if shown.is_empty() {
        format!("the unnamed group chat with {participants} participants (you)")
    } else {
        format!("the unnamed group chat with {participants} participants ({shown}{more} and you)")
    }
}

/// The private message carrying a token.
#[must_use]
pub fn token_message(description: &str, token: &ConversationToken) -> String {
    format!("Hi there, the token to publish to {description} is:\n`{token}`\n")
}
