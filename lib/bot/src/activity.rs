//! The subset of the Bot Framework activity schema notiteams reads.
//!
//! Unknown fields are kept in `extra` maps so an activity serializes back
//! to what was received.

use notiteams_core::IdentityMapping;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Card action value that asks for the conversation's token.
pub const REQUEST_TOKEN_ACTION: &str = "requestToken";

/// A user or bot account on the channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    /// Platform id (for example `29:...`).
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Directory object id, present for real users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_object_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kind of conversation an activity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConversationType {
    Personal,
    GroupChat,
    Channel,
    #[serde(other)]
    Other,
}

impl ConversationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::GroupChat => "groupChat",
            Self::Channel => "channel",
            Self::Other => "conversation",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<ConversationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Channel-specific payload. Only the tenant and team are read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<EntityRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An inbound activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Installation update action (`add`, `remove`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_removed: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<ChannelData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pointer to a conversation, enough to message it again later.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<&'a ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot: Option<&'a ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<&'a ConversationAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<&'a str>,
}

impl Activity {
    /// Tenant id from the channel data.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.channel_data
            .as_ref()?
            .tenant
            .as_ref()
            .map(|t| t.id.as_str())
    }

    /// Team id from the channel data, for channel conversations.
    #[must_use]
    pub fn team_id(&self) -> Option<&str> {
        self.channel_data
            .as_ref()?
            .team
            .as_ref()
            .map(|t| t.id.as_str())
    }

    #[must_use]
    pub fn conversation_type(&self) -> Option<ConversationType> {
        self.conversation.as_ref()?.conversation_type
    }

    /// Conversation id without the `;messageid=...` suffix channels append.
    #[must_use]
    pub fn base_conversation_id(&self) -> Option<&str> {
        let id = &self.conversation.as_ref()?.id;
        id.split(';').next()
    }

    /// Whether this activity asks for the conversation's token: a card
    /// submit carrying the request action, or the bot being installed.
    #[must_use]
    pub fn is_token_request(&self) -> bool {
        match self.kind.as_str() {
            "message" => {
                self.text.as_deref().is_none_or(str::is_empty)
                    && self
                        .value
                        .as_ref()
                        .and_then(|v| v.get("action"))
                        .and_then(Value::as_str)
                        == Some(REQUEST_TOKEN_ACTION)
            }
            "installationUpdate" => {
                matches!(self.action.as_deref(), Some("add" | "add-upgrade"))
            }
            _ => false,
        }
    }

    /// The reference to this activity's conversation, as seen from the bot.
    #[must_use]
    pub fn conversation_reference(&self) -> ConversationReference<'_> {
        ConversationReference {
            activity_id: self.id.as_deref(),
            user: self.from.as_ref(),
            bot: self.recipient.as_ref(),
            conversation: self.conversation.as_ref(),
            channel_id: self.channel_id.as_deref(),
            locale: self.locale.as_deref(),
            service_url: self.service_url.as_deref(),
        }
    }

    /// Identity mappings for every account in the activity that carries a
    /// directory id, deduplicated in order of appearance.
    ///
    /// Empty when the activity has no tenant.
    #[must_use]
    pub fn identities(&self) -> Vec<IdentityMapping> {
        let Some(tenant_id) = self.tenant_id() else {
            return Vec::new();
        };

        let accounts = self
            .from
            .iter()
            .chain(&self.members_added)
            .chain(&self.members_removed);

        let mut seen = HashSet::new();
        accounts
            .filter_map(|account| {
                let external_id = account.aad_object_id.as_deref()?;
                Some(IdentityMapping::new(
                    external_id,
                    tenant_id,
                    account.id.as_str(),
                    account.name.clone(),
                ))
            })
            .filter(|mapping| seen.insert(mapping.clone()))
            .collect()
    }
}
