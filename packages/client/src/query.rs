//! Query-string and URL helpers for the record tree.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left as-is by [`encode_component`]: alphanumerics and
/// `- _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a single URL component (space becomes `%20`).
pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

/// Join `key=value` pairs with `&`, encoding both sides, in the given order.
pub fn build_query<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                encode_component(key.as_ref()),
                encode_component(value.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// `<base>/<room>/<resource>.json`, with `resource` empty for the room root.
pub fn build_url(base_url: &str, room: &str, resource: Option<&str>) -> String {
    format!(
        "{}/{}/{}.json",
        base_url,
        encode_component(room),
        encode_component(resource.unwrap_or_default())
    )
}

/// Quote a query value as a JSON string, as range parameters require.
pub fn json_quote(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_single_pair() {
        // テスト項目: 1 組の key=value が生成される
        // given (前提条件):
        let params = [("key", "value")];

        // when (操作):
        let query = build_query(&params);

        // then (期待する結果):
        assert_eq!(query, "key=value");
    }

    #[test]
    fn test_build_query_multiple_pairs_keep_order() {
        // テスト項目: 複数の組が & で順序通りに連結される
        // given (前提条件):
        let params = [("k1", "v1"), ("k2", "v2")];

        // when (操作):
        let query = build_query(&params);

        // then (期待する結果):
        assert_eq!(query, "k1=v1&k2=v2");
    }

    #[test]
    fn test_build_query_encodes_keys_and_values() {
        // テスト項目: キーと値の両方がパーセントエンコードされる
        // given (前提条件):
        let params = [("key?", "the value")];

        // when (操作):
        let query = build_query(&params);

        // then (期待する結果):
        assert_eq!(query, "key%3F=the%20value");
    }

    #[test]
    fn test_build_query_quoted_values() {
        // テスト項目: JSON 文字列として引用された値がエンコードされる
        // given (前提条件):
        let params = [("orderBy", json_quote("$key")), ("startAt", json_quote("chat!00000000"))];

        // when (操作):
        let query = build_query(&params);

        // then (期待する結果):
        assert_eq!(query, "orderBy=%22%24key%22&startAt=%22chat!00000000%22");
    }

    #[test]
    fn test_build_url_room_root() {
        // テスト項目: リソース省略時はルームのルートを指す
        // given (前提条件):
        let base = "http://dummy";

        // when (操作):
        let url = build_url(base, "defaultRoom", None);

        // then (期待する結果):
        assert_eq!(url, "http://dummy/defaultRoom/.json");
    }

    #[test]
    fn test_build_url_with_resource() {
        // テスト項目: リソースとルームが URL に含まれる
        // given (前提条件):
        let base = "http://dummy";

        // when (操作):
        let url = build_url(base, "theRoom", Some("theResource"));

        // then (期待する結果):
        assert_eq!(url, "http://dummy/theRoom/theResource.json");
    }

    #[test]
    fn test_build_url_encodes_room_and_resource() {
        // テスト項目: ルームとリソースがエンコードされる
        // given (前提条件):
        let base = "http://dummy";

        // when (操作):
        let url = build_url(base, "the room", Some("res?"));

        // then (期待する結果):
        assert_eq!(url, "http://dummy/the%20room/res%3F.json");
    }

    #[test]
    fn test_build_url_keeps_record_key_separator() {
        // テスト項目: レコードキーの ! はエンコードされない
        // given (前提条件):
        let base = "http://dummy";

        // when (操作):
        let url = build_url(base, "theRoom", Some("meta!lastConnect"));

        // then (期待する結果):
        assert_eq!(url, "http://dummy/theRoom/meta!lastConnect.json");
    }
}
