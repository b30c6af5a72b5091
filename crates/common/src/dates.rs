//! Timestamp conversions between Gerrit's wire format, the stored document
//! format and the date accepted by the change query.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Format of every timestamp written to a document: second precision, UTC.
pub const DB_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const GERRIT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const QUERY_FORMAT: &str = "%Y-%m-%d";
/// Gerrit appends `.000000000` to every timestamp.
const GERRIT_FRACTION_LEN: usize = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid timestamp {input:?}, expected {expected}")]
pub struct DateError {
    pub input: String,
    pub expected: &'static str,
}

impl DateError {
    fn new(input: &str, expected: &'static str) -> Self {
        Self {
            input: input.to_string(),
            expected,
        }
    }
}

/// Parses a Gerrit timestamp such as `2020-04-08 10:15:30.000000000`.
///
/// The fractional part is dropped without being inspected.
pub fn parse_gerrit_timestamp(input: &str) -> Result<DateTime<Utc>, DateError> {
    let expected = "YYYY-MM-DD HH:MM:SS.NNNNNNNNN";
    let truncated = input
        .len()
        .checked_sub(GERRIT_FRACTION_LEN)
        .and_then(|end| input.get(..end))
        .ok_or_else(|| DateError::new(input, expected))?;
    let naive = NaiveDateTime::parse_from_str(truncated, GERRIT_FORMAT)
        .map_err(|_| DateError::new(input, expected))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Parses a stored document timestamp (`YYYY-MM-DDTHH:MM:SSZ`).
pub fn parse_db_timestamp(input: &str) -> Result<DateTime<Utc>, DateError> {
    let naive = NaiveDateTime::parse_from_str(input, DB_FORMAT)
        .map_err(|_| DateError::new(input, "YYYY-MM-DDTHH:MM:SSZ"))?;
    Ok(Utc.from_utc_datetime(&naive))
}

pub fn format_for_db(date: &DateTime<Utc>) -> String {
    date.format(DB_FORMAT).to_string()
}

/// `2020-04-08 10:15:30.000000000` -> `2020-04-08T10:15:30Z`
pub fn convert_date_for_db(input: &str) -> Result<String, DateError> {
    parse_gerrit_timestamp(input).map(|date| format_for_db(&date))
}

/// `2020-04-08T10:15:30Z` -> `2020-04-08`
///
/// Gerrit returns nothing when the `after:` operator carries a timezone
/// marker and ignores the time of day, so only the date is kept. Changes
/// updated earlier on the same day are fetched again.
pub fn convert_date_for_query(input: &str) -> Result<String, DateError> {
    let stripped = input.replace('T', " ").replace('Z', "");
    let naive = NaiveDateTime::parse_from_str(&stripped, GERRIT_FORMAT)
        .map_err(|_| DateError::new(input, "YYYY-MM-DDTHH:MM:SSZ"))?;
    Ok(naive.format(QUERY_FORMAT).to_string())
}

/// Serde adapter writing `DateTime<Utc>` as `YYYY-MM-DDTHH:MM:SSZ`.
pub mod db_format {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_for_db(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_db_timestamp(&raw).map_err(de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.serialize_str(&super::super::format_for_db(date)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::super::parse_db_timestamp(&raw).map_err(de::Error::custom))
                .transpose()
        }
    }
}
