//! Conversational glue for notiteams.
//!
//! Turns inbound chat activities into registry operations: identities seen
//! in an activity are recorded, token requests issue (or re-issue) the
//! conversation's token, and the token is sent privately to the requester.

pub mod activity;
pub mod describe;
pub mod error;
pub mod handler;

pub use activity::{Activity, ChannelAccount, ConversationAccount, ConversationType};
pub use describe::{describe_conversation, token_message};
pub use error::BotError;
pub use handler::{BotHandler, DEFAULT_DEDUP_CAPACITY, IssuedToken, TurnOutcome};
