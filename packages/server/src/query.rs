//! Range queries over a room's records.
//!
//! Parameter values are JSON encoded, e.g. `orderBy="$key"` or
//! `startAt="chat!00000001"`.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::ApiError;

/// Ordering a range query is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// Record key, compared as a string
    Key,
    /// Server-assigned write timestamp
    Timestamp,
}

/// Inclusive bound of a range query
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Key(String),
    Timestamp(i64),
}

/// Parsed query parameters of a room read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub order_by: Option<OrderBy>,
    pub start_at: Option<Bound>,
    pub end_at: Option<Bound>,
    pub limit_to_last: Option<usize>,
}

impl RecordQuery {
    /// Parse decoded query parameters; unknown parameters are ignored.
    pub fn parse(params: &HashMap<String, String>) -> Result<Self, ApiError> {
        let order_by = params
            .get("orderBy")
            .map(|raw| match parse_json(raw, "orderBy")? {
                Value::String(field) if field == "$key" => Ok(OrderBy::Key),
                Value::String(field) if field == "timestamp" => Ok(OrderBy::Timestamp),
                other => Err(ApiError::BadRequest(format!(
                    "orderBy {} is not supported",
                    other
                ))),
            })
            .transpose()?;

        let start_at = Self::parse_bound(params, "startAt", order_by)?;
        let end_at = Self::parse_bound(params, "endAt", order_by)?;

        let limit_to_last = params
            .get("limitToLast")
            .map(|raw| {
                raw.parse::<usize>()
                    .ok()
                    .filter(|limit| *limit > 0)
                    .ok_or_else(|| {
                        ApiError::BadRequest(format!("limitToLast must be a positive integer: {}", raw))
                    })
            })
            .transpose()?;

        Ok(Self {
            order_by,
            start_at,
            end_at,
            limit_to_last,
        })
    }

    fn parse_bound(
        params: &HashMap<String, String>,
        name: &str,
        order_by: Option<OrderBy>,
    ) -> Result<Option<Bound>, ApiError> {
        let Some(raw) = params.get(name) else {
            return Ok(None);
        };
        let bound = match (order_by, parse_json(raw, name)?) {
            (None, _) => {
                return Err(ApiError::BadRequest(format!(
                    "{} requires orderBy",
                    name
                )));
            }
            (Some(OrderBy::Key), Value::String(key)) => Bound::Key(key),
            (Some(OrderBy::Timestamp), Value::Number(n)) => match n.as_i64() {
                Some(timestamp) => Bound::Timestamp(timestamp),
                None => {
                    return Err(ApiError::BadRequest(format!(
                        "{} must be an integer timestamp",
                        name
                    )));
                }
            },
            (Some(_), other) => {
                return Err(ApiError::BadRequest(format!(
                    "{} {} does not match orderBy",
                    name, other
                )));
            }
        };
        Ok(Some(bound))
    }

    /// Whether the query narrows the room at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Select matching records, keeping the last `limit_to_last` in query order.
    pub fn apply(&self, records: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        let mut selected: Vec<(&String, &Value)> = records
            .iter()
            .filter(|(key, record)| self.in_range(key, record))
            .collect();

        if self.order_by == Some(OrderBy::Timestamp) {
            selected.sort_by_key(|(key, record)| (record_timestamp(record), key.to_string()));
        }

        if let Some(limit) = self.limit_to_last {
            let skip = selected.len().saturating_sub(limit);
            selected.drain(..skip);
        }

        selected
            .into_iter()
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }

    fn in_range(&self, key: &str, record: &Value) -> bool {
        let above = match &self.start_at {
            Some(Bound::Key(start)) => key >= start.as_str(),
            Some(Bound::Timestamp(start)) => record_timestamp(record) >= *start,
            None => true,
        };
        let below = match &self.end_at {
            Some(Bound::Key(end)) => key <= end.as_str(),
            Some(Bound::Timestamp(end)) => record_timestamp(record) <= *end,
            None => true,
        };
        above && below
    }
}

fn parse_json(raw: &str, name: &str) -> Result<Value, ApiError> {
    serde_json::from_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("{} is not valid JSON: {}", name, e)))
}

fn record_timestamp(record: &Value) -> i64 {
    record.get("timestamp").and_then(Value::as_i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn create_records() -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("chat!00000001aaaa".to_string(), json!({ "timestamp": 30, "value": "a" })),
            ("chat!00000005bbbb".to_string(), json!({ "timestamp": 10, "value": "b" })),
            ("chat!0000000Acccc".to_string(), json!({ "timestamp": 20, "value": "c" })),
            ("meta!lastConnect".to_string(), json!({ "timestamp": 40, "value": null })),
        ])
    }

    #[test]
    fn test_parse_key_range() {
        // テスト項目: キー順の範囲クエリが解析される
        // given (前提条件):
        let raw = params(&[
            ("orderBy", "\"$key\""),
            ("limitToLast", "25"),
            ("startAt", "\"chat!00000001\""),
            ("endAt", "\"chat!00000009\""),
        ]);

        // when (操作):
        let query = RecordQuery::parse(&raw).unwrap();

        // then (期待する結果):
        assert_eq!(query.order_by, Some(OrderBy::Key));
        assert_eq!(query.start_at, Some(Bound::Key("chat!00000001".to_string())));
        assert_eq!(query.end_at, Some(Bound::Key("chat!00000009".to_string())));
        assert_eq!(query.limit_to_last, Some(25));
    }

    #[test]
    fn test_parse_rejects_bound_without_order() {
        // テスト項目: orderBy なしの範囲指定は 400 になる
        // given (前提条件):
        let raw = params(&[("startAt", "\"chat!\"")]);

        // when (操作):
        let result = RecordQuery::parse(&raw);

        // then (期待する結果):
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_parse_rejects_unquoted_order() {
        // テスト項目: JSON として不正な orderBy は 400 になる
        // given (前提条件):
        let raw = params(&[("orderBy", "$key")]);

        // when (操作):
        let result = RecordQuery::parse(&raw);

        // then (期待する結果):
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_parse_rejects_zero_limit() {
        // テスト項目: limitToLast=0 は 400 になる
        // given (前提条件):
        let raw = params(&[("orderBy", "\"$key\""), ("limitToLast", "0")]);

        // when (操作):
        let result = RecordQuery::parse(&raw);

        // then (期待する結果):
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_apply_key_range_excludes_other_kinds() {
        // テスト項目: キー範囲で chat レコードのみが選択される
        // given (前提条件):
        let query = RecordQuery::parse(&params(&[
            ("orderBy", "\"$key\""),
            ("startAt", "\"chat!00000000\""),
            ("endAt", "\"chat!00000009\""),
        ]))
        .unwrap();

        // when (操作):
        let selected = query.apply(&create_records());

        // then (期待する結果):
        assert_eq!(
            selected.keys().collect::<Vec<_>>(),
            vec!["chat!00000001aaaa", "chat!00000005bbbb"]
        );
    }

    #[test]
    fn test_apply_latest_by_timestamp() {
        // テスト項目: タイムスタンプ順で最後の 1 件が選択される
        // given (前提条件):
        let query = RecordQuery::parse(&params(&[
            ("orderBy", "\"timestamp\""),
            ("limitToLast", "1"),
        ]))
        .unwrap();

        // when (操作):
        let selected = query.apply(&create_records());

        // then (期待する結果):
        assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["meta!lastConnect"]);
    }

    #[test]
    fn test_apply_limit_keeps_last_in_key_order() {
        // テスト項目: limitToLast はキー順で末尾のレコードを残す
        // given (前提条件):
        let query = RecordQuery::parse(&params(&[
            ("orderBy", "\"$key\""),
            ("limitToLast", "2"),
        ]))
        .unwrap();

        // when (操作):
        let selected = query.apply(&create_records());

        // then (期待する結果):
        assert_eq!(
            selected.keys().collect::<Vec<_>>(),
            vec!["chat!0000000Acccc", "meta!lastConnect"]
        );
    }

    #[test]
    fn test_apply_timestamp_range() {
        // テスト項目: タイムスタンプの範囲で選択される
        // given (前提条件):
        let query = RecordQuery::parse(&params(&[
            ("orderBy", "\"timestamp\""),
            ("startAt", "15"),
            ("endAt", "30"),
        ]))
        .unwrap();

        // when (操作):
        let selected = query.apply(&create_records());

        // then (期待する結果):
        assert_eq!(
            selected.keys().collect::<Vec<_>>(),
            vec!["chat!00000001aaaa", "chat!0000000Acccc"]
        );
    }
}
