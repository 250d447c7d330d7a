use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Racket identity as the spreadsheet returns it. Wire names are the
/// workshop's Czech column headers; every field except the code may be
/// absent and defaults to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RacketDetail {
    #[serde(rename = "kod")]
    pub code: String,
    #[serde(rename = "nazev", default)]
    pub name: String,
    #[serde(rename = "majitel", default)]
    pub owner: String,
    #[serde(rename = "delka", default)]
    pub string_length: String,
    #[serde(rename = "uzly", default)]
    pub knots: String,
}

/// One stringing job in a racket's history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryRow {
    #[serde(rename = "datum", default)]
    pub date: String,
    #[serde(rename = "typ", default)]
    pub string_type: String,
    #[serde(rename = "napeti", default)]
    pub tension: String,
}

/// One racket in an owner's list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RacketItem {
    #[serde(rename = "kod")]
    pub code: String,
    #[serde(rename = "nazev", default)]
    pub name: String,
}

/// One string reel/set an owner has on deposit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StringItem {
    #[serde(rename = "kod")]
    pub code: String,
    #[serde(rename = "nazev", default)]
    pub name: String,
    #[serde(rename = "mnozstvi", default)]
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MonthCount {
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub count: i64,
}

/// Owner usage statistics. Older deployments of the sheet script named the
/// "most common" fields `topString`/`topTension`; both spellings are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OwnerStats {
    #[serde(default)]
    pub total: i64,
    #[serde(rename = "commonString", alias = "topString", default)]
    pub common_string: String,
    #[serde(rename = "commonTension", alias = "topTension", default)]
    pub common_tension: String,
    #[serde(rename = "byMonth", default)]
    pub by_month: Vec<MonthCount>,
}

/// The Apps Script endpoint sometimes wraps a payload in a keyed envelope
/// and sometimes returns it bare; accept both.
pub(crate) fn unwrap_envelope(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(key) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// List payloads additionally tolerate a non-array body, which the original
/// front-end rendered as an empty list rather than an error.
pub(crate) fn parse_list<T: DeserializeOwned>(
    value: Value,
    key: &str,
) -> Result<Vec<T>, serde_json::Error> {
    match unwrap_envelope(value, key) {
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_fills_absent_fields_with_empty_strings() {
        let detail: RacketDetail =
            serde_json::from_value(json!({ "kod": "raketa001" })).unwrap();
        assert_eq!(detail.code, "raketa001");
        assert_eq!(detail.name, "");
        assert_eq!(detail.owner, "");
        assert_eq!(detail.string_length, "");
        assert_eq!(detail.knots, "");
    }

    #[test]
    fn detail_without_code_is_rejected() {
        let result: Result<RacketDetail, _> =
            serde_json::from_value(json!({ "nazev": "Pure Drive" }));
        assert!(result.is_err());
    }

    #[test]
    fn envelope_is_unwrapped_by_key_with_bare_fallback() {
        let wrapped = json!({ "detail": { "kod": "r1" } });
        assert_eq!(unwrap_envelope(wrapped, "detail"), json!({ "kod": "r1" }));

        let bare = json!({ "kod": "r1" });
        assert_eq!(unwrap_envelope(bare.clone(), "detail"), bare);
    }

    #[test]
    fn history_accepts_wrapped_bare_and_junk_bodies() {
        let wrapped = json!({ "history": [ { "datum": "2024-05-01" } ] });
        let rows: Vec<HistoryRow> = parse_list(wrapped, "history").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "2024-05-01");
        assert_eq!(rows[0].string_type, "");
        assert_eq!(rows[0].tension, "");

        let bare = json!([ { "typ": "RPM Blast", "napeti": "24/23" } ]);
        let rows: Vec<HistoryRow> = parse_list(bare, "history").unwrap();
        assert_eq!(rows[0].string_type, "RPM Blast");

        let junk = json!({ "message": "nothing here" });
        let rows: Vec<HistoryRow> = parse_list(junk, "history").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn strings_default_quantity_to_zero() {
        let items: Vec<StringItem> =
            parse_list(json!([ { "kod": "s1" } ]), "strings").unwrap();
        assert_eq!(items[0].quantity, 0);
    }

    #[test]
    fn stats_accept_both_field_spellings() {
        let current: OwnerStats = serde_json::from_value(json!({
            "total": 12,
            "commonString": "Alu Power",
            "commonTension": "25",
            "byMonth": [ { "month": "2024-04", "count": 3 } ]
        }))
        .unwrap();
        assert_eq!(current.common_string, "Alu Power");
        assert_eq!(current.by_month.len(), 1);

        let legacy: OwnerStats = serde_json::from_value(json!({
            "topString": "RPM Rough",
            "topTension": "23"
        }))
        .unwrap();
        assert_eq!(legacy.common_string, "RPM Rough");
        assert_eq!(legacy.common_tension, "23");
        assert_eq!(legacy.total, 0);
        assert!(legacy.by_month.is_empty());
    }
}
