//! Serde helpers for request bodies.

/// ISO-8601 rendering of `DateTime<Utc>` fields, e.g. `2024-05-01T12:30:00+00:00`.
///
/// Use as `#[serde(with = "iso8601")]`; `iso8601::naive` covers
/// `NaiveDateTime` and `iso8601::option` covers `Option<DateTime<Utc>>`.
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }

    pub(crate) fn parse(s: &str) -> Result<DateTime<Utc>, String> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid ISO-8601 datetime {s:?}: {e}"))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{self, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(dt) => serializer.serialize_some(&super::format(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s: Option<String> = Option::deserialize(deserializer)?;
            s.map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }

    pub mod naive {
        use chrono::NaiveDateTime;
        use serde::{self, Deserialize, Deserializer, Serializer};

        // Fraction is omitted when zero
        const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

        pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&value.format(FORMAT).to_string())
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            NaiveDateTime::parse_from_str(s.trim(), FORMAT).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::iso8601;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Event {
        #[serde(with = "iso8601")]
        at: DateTime<Utc>,
        #[serde(with = "iso8601::option")]
        until: Option<DateTime<Utc>>,
        #[serde(with = "iso8601::naive")]
        local: NaiveDateTime,
    }

    #[test]
    fn test_iso8601_renders_offset_and_naive_forms() {
        let event = Event {
            at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            until: None,
            local: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(8, 0, 5)
                .unwrap(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["at"], "2024-05-01T12:30:00+00:00");
        assert_eq!(json["until"], serde_json::Value::Null);
        assert_eq!(json["local"], "2024-05-01T08:00:05");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_iso8601_accepts_other_offsets() {
        let json = serde_json::json!({
            "at": "2024-05-01T15:30:00+03:00",
            "until": "2024-05-02T00:00:00.250+00:00",
            "local": "2024-05-01T08:00:05.5",
        });

        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event.at, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap());
        assert_eq!(event.until.unwrap().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_iso8601_rejects_garbage() {
        let json = serde_json::json!({ "at": "yesterday", "until": null, "local": "2024-05-01T08:00:05" });
        assert!(serde_json::from_value::<Event>(json).is_err());
    }
}
