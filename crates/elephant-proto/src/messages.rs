//! Protocol messages.
//!
//! Every struct derives both [`prost::Message`] and the serde traits so a
//! single definition serves both wire formats. JSON field names are the
//! lowercase protobuf names; absent JSON fields decode to their defaults.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A query against one or more providers.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    /// Provider names, either bare (`"calc"`) or menu-qualified
    /// (`"menus:bookmarks"`).
    #[prost(string, repeated, tag = "1")]
    pub providers: Vec<String>,
    #[prost(string, tag = "2")]
    pub query: String,
    /// Per-provider result cap; `0` disables truncation.
    #[prost(int32, tag = "3")]
    pub maxresults: i32,
    /// Substring matching instead of fuzzy matching.
    #[prost(bool, tag = "4")]
    pub exactsearch: bool,
}

/// Activation of a previously returned item.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivateRequest {
    #[prost(string, tag = "1")]
    pub provider: String,
    /// The identifier exactly as the provider emitted it.
    #[prost(string, tag = "2")]
    pub identifier: String,
    #[prost(string, tag = "3")]
    pub action: String,
    /// Query that produced the item.
    #[prost(string, tag = "4")]
    pub query: String,
    /// Free-form arguments forwarded to the action.
    #[prost(string, tag = "5")]
    pub arguments: String,
    #[prost(bool, tag = "6")]
    pub single: bool,
}

/// A live-update subscription.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeRequest {
    #[prost(string, tag = "1")]
    pub provider: String,
    #[prost(string, tag = "2")]
    pub query: String,
    /// Polling interval in milliseconds; `0` selects event mode.
    #[prost(int32, tag = "3")]
    pub interval: i32,
}

/// Notification carried by a subscription update.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeResponse {
    /// Event value, e.g. `"bluetooth:connect"`; empty for interval
    /// subscriptions.
    #[prost(string, tag = "1")]
    pub value: String,
}

/// Pivot to another menu, fanned out to `menus` subscribers.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuRequest {
    #[prost(string, tag = "1")]
    pub menu: String,
}

/// Request for a provider's current UI state.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderStateRequest {
    #[prost(string, tag = "1")]
    pub provider: String,
}

/// A provider's current UI state.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderStateResponse {
    /// Echoes the requested key verbatim, including a `menus:` prefix.
    #[prost(string, tag = "1")]
    pub provider: String,
    #[prost(string, repeated, tag = "2")]
    pub states: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub actions: Vec<String>,
}

/// Item kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ItemType {
    Regular = 0,
}

/// Match details for highlighting in front-ends.
///
/// `positions` index characters of the scored field, not bytes.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyInfo {
    /// Which field matched, e.g. `"text"` or `"subtext"`.
    #[prost(string, tag = "1")]
    pub field: String,
    #[prost(int32, tag = "2")]
    pub start: i32,
    #[prost(int32, repeated, tag = "3")]
    pub positions: Vec<i32>,
}

/// One searchable result.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Opaque to the core; round-trips verbatim on Activate/State.
    #[prost(string, tag = "1")]
    pub identifier: String,
    #[prost(string, tag = "2")]
    pub text: String,
    #[prost(string, tag = "3")]
    pub subtext: String,
    #[prost(string, tag = "4")]
    pub icon: String,
    /// Bare provider name or `"<provider>:<menu>"`.
    #[prost(string, tag = "5")]
    pub provider: String,
    #[prost(int32, tag = "6")]
    pub score: i32,
    #[prost(enumeration = "ItemType", tag = "7")]
    pub r#type: i32,
    #[prost(string, repeated, tag = "8")]
    pub state: Vec<String>,
    #[prost(string, repeated, tag = "9")]
    pub actions: Vec<String>,
    #[prost(string, tag = "10")]
    pub preview: String,
    #[prost(string, tag = "11")]
    pub preview_type: String,
    #[prost(message, optional, tag = "12")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy: Option<FuzzyInfo>,
}

/// Ranking order shared by query streaming and subscription diffing:
/// descending score, ties broken by text, then identifier.
#[must_use]
pub fn compare_ranked(a: &Item, b: &Item) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.text.cmp(&b.text))
        .then_with(|| a.identifier.cmp(&b.identifier))
}
