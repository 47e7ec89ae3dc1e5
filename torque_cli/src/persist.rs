//! JSON-lines persistence sink and summary serialization.

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use torque_core::{Persistence, SampleRecord, SampleSlot, SessionId, StopReason, Summary, SummaryRow};

fn unix_ms(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

pub fn rows_json(rows: &[SummaryRow]) -> Value {
    rows.iter()
        .map(|r| {
            let samples: Vec<Value> = r
                .samples
                .iter()
                .map(|s| match s {
                    SampleSlot::Value(v) => json!(v),
                    SampleSlot::Absent => Value::Null,
                })
                .collect();
            json!({
                "range": r.range.index() + 1,
                "target": r.target,
                "low": r.low,
                "high": r.high,
                "label": r.label,
                "samples": samples,
                "samples_so_far": r.samples_so_far,
            })
        })
        .collect()
}

pub fn summary_json(summary: &Summary) -> Value {
    let (reason, detail) = match &summary.reason {
        StopReason::Operator => ("operator", None),
        StopReason::FeedDisconnected(why) => ("feed_disconnected", Some(why.as_str())),
    };
    json!({
        "session": summary.session.to_string(),
        "profile": summary.profile,
        "unit": summary.unit,
        "passed": summary.passed,
        "stop_reason": reason,
        "stop_detail": detail,
        "accepted": summary.accepted_total(),
        "rows": rows_json(&summary.rows),
    })
}

/// Appends one JSON object per line; flushed after every record.
pub struct JsonlSink {
    out: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_line(&self, value: &Value) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *out, value)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

impl Persistence for JsonlSink {
    fn record_sample(&self, record: &SampleRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.write_line(&json!({
            "type": "sample",
            "session": record.session.to_string(),
            "range": record.range.index() + 1,
            "label": record.label,
            "value": record.value,
            "seq": record.seq,
            "elapsed_ms": u64::try_from(record.elapsed.as_millis()).unwrap_or(u64::MAX),
            "ts_ms": unix_ms(record.recorded_at),
        }))
    }

    fn record_summary(
        &self,
        session: SessionId,
        profile: &str,
        rows: &[SummaryRow],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.write_line(&json!({
            "type": "summary",
            "session": session.to_string(),
            "profile": profile,
            "rows": rows_json(rows),
            "ts_ms": unix_ms(SystemTime::now()),
        }))
    }
}
