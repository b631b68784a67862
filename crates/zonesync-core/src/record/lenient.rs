//! Deserializers for providers that return numbers as strings
//!
//! ClouDNS answers `"ttl": "3600"`, `"priority": "10"` and sometimes an empty
//! string for unset columns.

use serde::de::{Deserializer, Error as _};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn convert<T, E>(value: NumberOrString) -> Result<Option<T>, E>
where
    T: TryFrom<u64> + FromStr,
    E: serde::de::Error,
{
    match value {
        NumberOrString::Number(n) => T::try_from(n)
            .map(Some)
            .map_err(|_| E::custom(format!("number {n} out of range"))),
        NumberOrString::Text(s) if s.trim().is_empty() => Ok(None),
        NumberOrString::Text(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| E::custom(format!("invalid number {s:?}"))),
    }
}

/// Required numeric field
pub(crate) fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
{
    let value = NumberOrString::deserialize(deserializer)?;
    convert::<T, D::Error>(value)?.ok_or_else(|| D::Error::custom("missing number"))
}

/// Optional numeric field; `null` and `""` both become `None`
pub(crate) fn opt_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => convert(value),
    }
}

/// Identifier that may arrive as a number or a string
pub(crate) fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::Text(s) => s,
    })
}
