use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use serde_json::Value;

use crate::record::Record;

/// Field names the downstream indexer assigns itself; producer data must
/// never occupy them directly.
pub const RESERVED_KEYS: [&str; 3] = ["_id", "_index", "_type"];

/// Timestamp source fields, most trustworthy first. Values are microsecond
/// epochs, sent either as JSON strings or numbers.
const SOURCE_TIMESTAMP_KEYS: [&str; 2] = ["_SOURCE_REALTIME_TIMESTAMP", "__REALTIME_TIMESTAMP"];

/// Longest `orig_` chain walked before switching to a counter suffix.
const MAX_QUARANTINE_DEPTH: usize = 32;

fn severity_name(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("emerg"),
        1 => Some("alert"),
        2 => Some("crit"),
        3 => Some("err"),
        4 => Some("warn"),
        5 => Some("notice"),
        6 => Some("info"),
        7 => Some("debug"),
        _ => None,
    }
}

// Codes 12-15 carry no name here and pass through numerically.
fn facility_name(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("kern"),
        1 => Some("ftp"),
        2 => Some("mail"),
        3 => Some("daemon"),
        4 => Some("auth"),
        5 => Some("syslog"),
        6 => Some("lpr"),
        7 => Some("news"),
        8 => Some("uucp"),
        9 => Some("cron"),
        10 => Some("authpriv"),
        11 => Some("user"),
        16 => Some("local0"),
        17 => Some("local1"),
        18 => Some("local2"),
        19 => Some("local3"),
        20 => Some("local4"),
        21 => Some("local5"),
        22 => Some("local6"),
        23 => Some("local7"),
        _ => None,
    }
}

/// Applies the canonical-field policy to decoded records.
///
/// Owned map in, owned map out; the only ambient read is the clock, used
/// when a record carries no usable timestamp. Fields whose shape defeats a
/// step are left as-is rather than failing the record.
#[derive(Debug, Clone)]
pub struct Normalizer {
    hostname: String,
}

impl Normalizer {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    /// Uses the machine name reported by the OS.
    pub fn local() -> Self {
        let name = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        Self::new(name)
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Runs the normalization steps in their fixed order; later steps may
    /// observe fields set by earlier ones.
    pub fn normalize(&self, mut record: Record) -> Record {
        quarantine_reserved(&mut record);
        self.reconcile_host(&mut record);
        alias_message(&mut record);
        derive_timestamp(&mut record);
        map_code_field(&mut record, "PRIORITY", "severity", severity_name);
        map_code_field(&mut record, "SYSLOG_FACILITY", "facility", facility_name);
        record
    }

    /// `host` always ends up populated. A forwarded record whose `host`
    /// disagrees with the producer hostname is overridden with the local
    /// machine name; the disagreeing value is quarantined for audit.
    fn reconcile_host(&self, record: &mut Record) {
        let producer = record.get("_HOSTNAME").cloned();
        if record.contains_key("host") {
            if let Some(producer) = producer {
                if record.get("host") != Some(&producer) {
                    quarantine(record, "host");
                    record.insert("host".to_string(), Value::String(self.hostname.clone()));
                }
            }
        } else if let Some(producer) = producer {
            record.insert("host".to_string(), producer);
        } else {
            record.insert("host".to_string(), Value::String(self.hostname.clone()));
        }
    }
}

fn quarantine_reserved(record: &mut Record) {
    for key in RESERVED_KEYS {
        quarantine(record, key);
    }
}

/// Moves `key` to a free `orig_`-prefixed name, shifting any occupants of
/// the target chain one level deeper so no value is ever overwritten.
fn quarantine(record: &mut Record, key: &str) {
    if !record.contains_key(key) {
        return;
    }

    let mut chain = vec![key.to_string()];
    loop {
        let candidate = format!("orig_{}", chain.last().expect("chain starts non-empty"));
        let occupied = record.contains_key(&candidate);
        chain.push(candidate);
        if !occupied {
            break;
        }
        if chain.len() > MAX_QUARANTINE_DEPTH {
            // Pathological orig_orig_... nesting: stop extending the prefix
            // chain and find a free terminal name with a counter instead.
            let stem = chain.pop().expect("chain starts non-empty");
            let mut n = 2u32;
            loop {
                let candidate = format!("{stem}_{n}");
                if !record.contains_key(&candidate) {
                    chain.push(candidate);
                    break;
                }
                n += 1;
            }
            break;
        }
    }

    // Vacate from the deepest link down so every move lands in a free slot.
    for i in (0..chain.len() - 1).rev() {
        if let Some(value) = record.remove(&chain[i]) {
            record.insert(chain[i + 1].clone(), value);
        }
    }
}

/// Copies `MESSAGE` into `@message` when no alias exists yet. The producer
/// field stays in place.
fn alias_message(record: &mut Record) {
    if record.contains_key("@message") {
        return;
    }
    if let Some(message) = record.get("MESSAGE").cloned() {
        record.insert("@message".to_string(), message);
    }
}

/// `@timestamp` always ends up holding the derived value; a pre-existing
/// one is quarantined first. The first timestamp source field present wins
/// even if its value turns out unparseable, in which case the current local
/// time stands in.
fn derive_timestamp(record: &mut Record) {
    quarantine(record, "@timestamp");

    let derived = SOURCE_TIMESTAMP_KEYS
        .iter()
        .find_map(|key| record.get(*key))
        .and_then(epoch_micros)
        .and_then(|micros| Local.timestamp_millis_opt(micros / 1000).single());
    let timestamp = derived.unwrap_or_else(Local::now);

    record.insert(
        "@timestamp".to_string(),
        Value::String(render_timestamp(&timestamp)),
    );
}

fn render_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, false)
}

fn epoch_micros(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Shared severity/facility procedure: map the producer code through the
/// table when it matches (integer or string-of-integer form), otherwise
/// pass the raw value through; quarantine a differing pre-existing
/// canonical value before overwriting it.
fn map_code_field(
    record: &mut Record,
    source_key: &str,
    canonical_key: &str,
    table: fn(u64) -> Option<&'static str>,
) {
    let Some(raw) = record.get(source_key).cloned() else {
        return;
    };
    let mapped = match code_of(&raw).and_then(table) {
        Some(name) => Value::String(name.to_string()),
        None => raw,
    };

    match record.get(canonical_key) {
        Some(existing) if *existing == mapped => {}
        Some(_) => {
            quarantine(record, canonical_key);
            record.insert(canonical_key.to_string(), mapped);
        }
        None => {
            record.insert(canonical_key.to_string(), mapped);
        }
    }
}

fn code_of(raw: &Value) -> Option<u64> {
    match raw {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse::<u64>().ok(),
        _ => None,
    }
}
