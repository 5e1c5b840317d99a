//! Request and response bodies of the Bot Connector REST API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ChannelAccount<'a> {
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TenantInfo<'a> {
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConversationChannelData<'a> {
    pub tenant: TenantInfo<'a>,
}

/// Body of `POST /v3/conversations`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConversationParameters<'a> {
    pub bot: ChannelAccount<'a>,
    pub members: Vec<ChannelAccount<'a>>,
    pub is_group: bool,
    pub tenant_id: &'a str,
    pub channel_data: ConversationChannelData<'a>,
}

impl<'a> ConversationParameters<'a> {
    /// A 1:1 conversation between the bot and one user.
    pub fn personal(bot_id: &'a str, user_id: &'a str, tenant_id: &'a str) -> Self {
        Self {
            bot: ChannelAccount { id: bot_id },
            members: vec![ChannelAccount { id: user_id }],
            is_group: false,
            tenant_id,
            channel_data: ConversationChannelData {
                tenant: TenantInfo { id: tenant_id },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConversationResourceResponse {
    pub id: String,
}

/// A plain text message activity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageActivity<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
    pub text_format: &'static str,
}

impl<'a> MessageActivity<'a> {
    pub fn markdown(text: &'a str) -> Self {
        Self {
            kind: "message",
            text,
            text_format: "markdown",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceResponse {
    #[serde(default)]
    pub id: Option<String>,
}
