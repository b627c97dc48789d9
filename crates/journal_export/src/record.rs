use serde_json::{Map, Value};

/// One decoded journal entry: a JSON object keyed by field name.
pub type Record = Map<String, Value>;

const INVALID_JSON_KEY: &str = "invalid_json";

/// Converts one raw producer line into a [`Record`]. Never fails.
///
/// Garbage stays visible downstream instead of being dropped: a line that
/// is not UTF-8, not JSON, or not a JSON object is preserved as
/// `{"invalid_json": <best-effort text>}`.
pub fn decode_line(line: &[u8]) -> Record {
    match std::str::from_utf8(line) {
        Ok(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(record)) => record,
            Ok(_) | Err(_) => invalid_json(text),
        },
        Err(_) => invalid_json(&String::from_utf8_lossy(line)),
    }
}

fn invalid_json(text: &str) -> Record {
    let mut record = Record::new();
    record.insert(
        INVALID_JSON_KEY.to_string(),
        Value::String(text.trim_end().to_string()),
    );
    record
}

/// Output layout for emitted records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Indented block per record, for human tailing.
    #[default]
    Pretty,
    /// Single-line NDJSON.
    Compact,
}

/// Serializes a record for emission.
///
/// serde_json's map is BTreeMap-backed (the `preserve_order` feature is
/// off), so keys always come out sorted lexicographically.
pub fn render(record: &Record, mode: RenderMode) -> String {
    let rendered = match mode {
        RenderMode::Pretty => serde_json::to_string_pretty(record),
        RenderMode::Compact => serde_json::to_string(record),
    };
    rendered.expect("a string-keyed JSON map always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_object_passes_through() {
        let record = decode_line(br#"{"MESSAGE":"hi","PRIORITY":"6"}"#);
        assert_eq!(record.get("MESSAGE"), Some(&Value::String("hi".into())));
        assert_eq!(record.get("PRIORITY"), Some(&Value::String("6".into())));
    }

    #[test]
    fn malformed_json_becomes_marker() {
        let record = decode_line(b"{not-json}  \t");
        assert_eq!(
            record.get("invalid_json"),
            Some(&Value::String("{not-json}".into()))
        );
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn non_object_json_becomes_marker() {
        let record = decode_line(b"[1, 2, 3]");
        assert_eq!(
            record.get("invalid_json"),
            Some(&Value::String("[1, 2, 3]".into()))
        );
    }

    #[test]
    fn invalid_utf8_is_preserved_lossily() {
        let record = decode_line(b"\xff\xfegarbage");
        let text = record
            .get("invalid_json")
            .and_then(Value::as_str)
            .expect("marker record");
        assert!(text.contains("garbage"));
    }

    #[test]
    fn empty_line_is_a_marker() {
        let record = decode_line(b"");
        assert_eq!(record.get("invalid_json"), Some(&Value::String(String::new())));
    }

    #[test]
    fn render_sorts_keys() {
        let mut record = Record::new();
        record.insert("zebra".into(), Value::from(1));
        record.insert("alpha".into(), Value::from(2));
        assert_eq!(
            render(&record, RenderMode::Compact),
            r#"{"alpha":2,"zebra":1}"#
        );
    }

    #[test]
    fn pretty_render_is_a_multi_line_block() {
        let mut record = Record::new();
        record.insert("host".into(), Value::from("node1"));
        let out = render(&record, RenderMode::Pretty);
        assert!(out.starts_with("{\n"));
        assert!(out.contains("\"host\""));
    }
}
