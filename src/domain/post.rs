use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Epoch values at or above this are taken to be milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// A newly created lost-pet listing, as carried by a post-creation event.
///
/// Producers are only required to send `petName`; everything else is optional
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pet_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        serialize_with = "time::serde::rfc3339::option::serialize"
    )]
    pub created_at: Option<OffsetDateTime>,
}

impl Post {
    #[must_use]
    pub fn new(id: impl Into<String>, pet_name: impl Into<String>) -> Self {
        Self { id: id.into(), pet_name: Some(pet_name.into()), created_at: Some(OffsetDateTime::now_utc()) }
    }

    /// Decodes a post from a raw event payload.
    ///
    /// # Errors
    /// Returns an error if the payload is not a JSON object matching the post shape.
    pub fn from_slice(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Epoch(i64),
    Fractional(f64),
    Firestore {
        #[serde(alias = "_seconds")]
        seconds: i64,
    },
    Other(IgnoredAny),
}

fn from_epoch(value: i64) -> Option<OffsetDateTime> {
    if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(value) * 1_000_000).ok()
    } else {
        OffsetDateTime::from_unix_timestamp(value).ok()
    }
}

/// `createdAt` is informational, so a shape we cannot read becomes `None`
/// instead of failing the whole event.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(text) => OffsetDateTime::parse(&text, &Rfc3339).ok(),
        RawTimestamp::Epoch(value) | RawTimestamp::Firestore { seconds: value } => from_epoch(value),
        #[allow(clippy::cast_possible_truncation)]
        RawTimestamp::Fractional(value) => value.is_finite().then(|| from_epoch(value as i64)).flatten(),
        RawTimestamp::Other(_) => None,
    };
    if parsed.is_none() {
        tracing::debug!("Ignoring unreadable createdAt");
    }
    Ok(parsed)
}
