//! Decoding of Firestore REST documents into dashboard records.
//!
//! Firestore wraps every field in a typed envelope such as
//! `{"integerValue": "12"}`. [`plain`] unwraps those into ordinary JSON so the
//! shared coercion helpers in [`crate::station`] apply unchanged.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::calendar::{DayKey, MonthKey};
use crate::station::{DailyMetrics, DailyRecord, MonthlyMetrics, StationSummary, coerce_count};
use crate::users::UserRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// One page of a `documents.list` response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPage {
    #[serde(default)]
    pub documents: Vec<Document>,
    pub next_page_token: Option<String>,
}

impl Document {
    /// Last path segment of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn field(&self, key: &str) -> Value {
        self.fields.get(key).map(plain).unwrap_or(Value::Null)
    }

    fn string(&self, key: &str) -> String {
        match self.field(key) {
            Value::String(s) => s,
            _ => String::new(),
        }
    }
}

/// Unwraps a typed Firestore value.
pub fn plain(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return value.clone();
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue" => {
            inner.clone()
        }
        // int64 travels as a decimal string
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| inner.clone()),
            other => other.clone(),
        },
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(plain).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(|fields| fields.iter().map(|(k, v)| (k.clone(), plain(v))).collect())
                .unwrap_or_default(),
        ),
        "geoPointValue" => Value::Array(vec![
            inner.get("latitude").cloned().unwrap_or(Value::Null),
            inner.get("longitude").cloned().unwrap_or(Value::Null),
        ]),
        _ => Value::Null,
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// RFC 3339 strings and epoch milliseconds are accepted.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

pub fn station_summary(doc: &Document) -> StationSummary {
    let coordinates = doc.field("coordinates");
    let coordinate = |i: usize| coordinates.get(i).map(as_f64).unwrap_or(0.0);

    StationSummary {
        station_id: doc.id().to_string(),
        place_name: doc.string("placeName"),
        company_name: doc.string("companyName"),
        address: doc.string("address"),
        latitude: coordinate(0),
        longitude: coordinate(1),
        capacity: coerce_count(&doc.field("capacity")),
        current_cap: coerce_count(&doc.field("currentCap")),
    }
}

/// `capacity` is `None` when the field is absent, so an update can keep the
/// previously known capacity.
pub fn station_fields(doc: &Document) -> (Option<u64>, u64) {
    let capacity = match doc.field("capacity") {
        Value::Null => None,
        value => Some(coerce_count(&value)).filter(|c| *c > 0),
    };
    (capacity, coerce_count(&doc.field("currentCap")))
}

/// Monthly documents keyed `YYYY-MM`; other ids are skipped.
pub fn monthly_metrics(docs: &[Document]) -> MonthlyMetrics {
    docs.iter()
        .filter_map(|doc| match doc.id().parse::<MonthKey>() {
            Ok(month) => Some((month, coerce_count(&doc.field("bottlesCollected")))),
            Err(e) => {
                debug!(doc = %doc.name, error = %e, "Skipping monthly document");
                None
            }
        })
        .collect()
}

/// Daily documents keyed `YYYY-MM-DD`; other ids are skipped.
pub fn daily_metrics(docs: &[Document]) -> DailyMetrics {
    docs.iter()
        .filter_map(|doc| match doc.id().parse::<DayKey>() {
            Ok(day) => Some((
                day,
                DailyRecord {
                    count: coerce_count(&doc.field("bottlesCollected")),
                    updated_at: parse_timestamp(&doc.field("updatedAt")),
                },
            )),
            Err(e) => {
                debug!(doc = %doc.name, error = %e, "Skipping daily document");
                None
            }
        })
        .collect()
}

/// The recycle count is read from the first non-zero of the field names
/// the apps have used over time.
pub fn user_record(doc: &Document) -> UserRecord {
    let recycle_count = ["UserRecycleCount", "recycleCount", "lifetimeBottles"]
        .iter()
        .map(|k| coerce_count(&doc.field(k)))
        .find(|n| *n > 0)
        .unwrap_or(0);

    UserRecord {
        recycle_count,
        last_recycle: parse_timestamp(&doc.field("lastRecycleDate")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(name: &str, fields: Value) -> Document {
        serde_json::from_value(json!({ "name": name, "fields": fields })).unwrap()
    }

    #[test]
    fn test_plain_values() {
        assert_eq!(plain(&json!({"integerValue": "42"})), json!(42));
        assert_eq!(plain(&json!({"doubleValue": 1.5})), json!(1.5));
        assert_eq!(plain(&json!({"stringValue": "x"})), json!("x"));
        assert_eq!(plain(&json!({"nullValue": null})), Value::Null);
        assert_eq!(
            plain(&json!({"arrayValue": {"values": [{"doubleValue": 59.9}, {"integerValue": "10"}]}})),
            json!([59.9, 10])
        );
        assert_eq!(plain(&json!({"arrayValue": {}})), json!([]));
        assert_eq!(
            plain(&json!({"mapValue": {"fields": {"a": {"booleanValue": true}}}})),
            json!({"a": true})
        );
    }

    #[test]
    fn test_station_summary() {
        let d = doc(
            "projects/p/databases/(default)/documents/stations/1002",
            json!({
                "placeName": {"stringValue": "Storgata"},
                "companyName": {"stringValue": "Cycl"},
                "capacity": {"integerValue": "200"},
                "currentCap": {"stringValue": "oops"},
                "coordinates": {"arrayValue": {"values": [{"doubleValue": 59.9}, {"doubleValue": 10.7}]}}
            }),
        );
        let s = station_summary(&d);
        assert_eq!(s.station_id, "1002");
        assert_eq!(s.place_name, "Storgata");
        assert_eq!(s.address, "");
        assert_eq!(s.capacity, 200);
        assert_eq!(s.current_cap, 0);
        assert_eq!(s.latitude, 59.9);
        assert_eq!(s.longitude, 10.7);
    }

    #[test]
    fn test_station_fields_missing_capacity() {
        let d = doc("x/stations/1", json!({"currentCap": {"integerValue": "5"}}));
        assert_eq!(station_fields(&d), (None, 5));
    }

    #[test]
    fn test_monthly_skips_malformed_ids() {
        let docs = vec![
            doc("s/metrics/2024-01", json!({"bottlesCollected": {"integerValue": "10"}})),
            doc("s/metrics/2024-02", json!({})),
            doc("s/metrics/summary", json!({"bottlesCollected": {"integerValue": "999"}})),
        ];
        let metrics = monthly_metrics(&docs);
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[&"2024-01".parse::<MonthKey>().unwrap()], 10);
        assert_eq!(metrics[&"2024-02".parse::<MonthKey>().unwrap()], 0);
    }

    #[test]
    fn test_daily_with_timestamps() {
        let docs = vec![doc(
            "s/daily/2024-01-07",
            json!({
                "bottlesCollected": {"integerValue": "3"},
                "updatedAt": {"timestampValue": "2024-01-07T15:30:00.123Z"}
            }),
        )];
        let daily = daily_metrics(&docs);
        let record = daily[&"2024-01-07".parse::<DayKey>().unwrap()];
        assert_eq!(record.count, 3);
        assert_eq!(record.updated_at.unwrap().to_rfc3339(), "2024-01-07T15:30:00.123+00:00");
    }

    #[test]
    fn test_user_record_field_fallbacks() {
        let d = doc(
            "users/u1",
            json!({
                "UserRecycleCount": {"integerValue": "0"},
                "recycleCount": {"stringValue": "4"},
                "lastRecycleDate": {"integerValue": "1704067200000"}
            }),
        );
        let user = user_record(&d);
        assert_eq!(user.recycle_count, 4);
        assert_eq!(user.last_recycle.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
