//! Optional-field filters for the query family.
//!
//! Every field is optional; an absent field imposes no constraint.
//! Malformed values (non-numeric pagination, unknown enum values) are
//! treated as absent rather than rejected, so these deserialize
//! leniently from query strings.

use serde::{Deserialize, Deserializer};

/// Page size applied when a filter does not specify one.
pub const DEFAULT_LIMIT: u32 = 100;
/// Hard cap on any single page.
pub const MAX_LIMIT: u32 = 500;
/// Fixed cap on the conversation summary listing.
pub const SUMMARY_LIMIT: u32 = 100;
/// Truncation length for summary previews (chars).
pub const PREVIEW_LEN: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogFilter {
    #[serde(rename = "type")]
    pub log_type: Option<String>,
    pub uid: Option<String>,
    pub method: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub status: Option<i64>,
    #[serde(deserialize_with = "lenient_i64")]
    pub start_time: Option<i64>,
    #[serde(deserialize_with = "lenient_i64")]
    pub end_time: Option<i64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub limit: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversationFilter {
    pub role: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub start_time: Option<i64>,
    #[serde(deserialize_with = "lenient_i64")]
    pub end_time: Option<i64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub limit: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserFilter {
    pub uid: Option<String>,
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub limit: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthRecordFilter {
    pub uid: Option<String>,
    pub auth_type: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub success: Option<bool>,
    #[serde(deserialize_with = "lenient_i64")]
    pub start_time: Option<i64>,
    #[serde(deserialize_with = "lenient_i64")]
    pub end_time: Option<i64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub limit: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionLogFilter {
    pub uid: Option<String>,
    pub status: Option<String>,
    pub msg_type: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub start_time: Option<i64>,
    #[serde(deserialize_with = "lenient_i64")]
    pub end_time: Option<i64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub limit: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub offset: Option<u32>,
}

/// Effective page bounds for a (limit, offset) pair.
pub fn page(limit: Option<u32>, offset: Option<u32>) -> (u32, u32) {
    (
        limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        offset.unwrap_or(0),
    )
}

/// Keep an enum-valued filter field only if it names a known value.
pub fn known<'a>(value: &'a Option<String>, allowed: &[&str]) -> Option<&'a str> {
    value
        .as_deref()
        .filter(|v| allowed.contains(v))
}

// Query-string values arrive as strings; JSON bodies carry numbers.
// Accept both, and map anything unparsable to None.
#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Num(i64),
    Str(String),
    Other(serde::de::IgnoredAny),
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Raw>::deserialize(d)? {
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Str(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(match Option::<Raw>::deserialize(d)? {
        Some(Raw::Num(n)) => u32::try_from(n).ok(),
        Some(Raw::Str(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawBool {
        Bool(bool),
        Num(i64),
        Str(String),
        Other(serde::de::IgnoredAny),
    }
    Ok(match Option::<RawBool>::deserialize(d)? {
        Some(RawBool::Bool(b)) => Some(b),
        Some(RawBool::Num(n)) => Some(n != 0),
        Some(RawBool::Str(s)) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}
