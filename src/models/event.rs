//! Sensor event model

use serde::{Deserialize, Serialize};

/// Reporting device metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub os: String,
}

/// File timestamps in epoch milliseconds.
///
/// Wire names follow the sensor protocol: `a` = accessed, `m` = modified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FileTimes {
    #[serde(rename = "a")]
    pub accessed: i64,
    #[serde(rename = "m")]
    pub modified: i64,
}

/// File observation carried by an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileObservation {
    pub hash: String,
    pub path: String,
    pub time: FileTimes,
}

/// Process observation carried by an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessObservation {
    pub hash: String,
    pub path: String,
    pub pid: u32,
}

/// One sensor event. Immutable once constructed; references exactly two
/// hashes that need verdict resolution (`file.hash` and `process.hash`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub device: Device,
    pub file: FileObservation,
    pub process: ProcessObservation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_wire_names() {
        let event: Event = serde_json::from_str(
            r#"{
                "device": {"id": "d-1", "os": "linux"},
                "file": {"hash": "abc", "path": "/tmp/x", "time": {"a": 10, "m": 5}},
                "process": {"hash": "def", "path": "/usr/bin/x", "pid": 4242}
            }"#,
        )
        .unwrap();

        assert_eq!(event.file.time.accessed, 10);
        assert_eq!(event.file.time.modified, 5);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["file"]["time"]["a"], 10);
        assert_eq!(json["process"]["pid"], 4242);
    }
}
