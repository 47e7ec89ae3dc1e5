#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Terminal rendering of session summaries.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use torque_core::{SampleSlot, Summary, SummaryHandle, SummaryRow};

fn fmt_num(v: f64) -> String {
    format!("{v:.1}")
}

/// Plain-text table: one line per range, one column per sample slot.
pub fn render_table(rows: &[SummaryRow]) -> String {
    let slots = rows.iter().map(|r| r.samples.len()).max().unwrap_or(0);
    let mut header: Vec<String> = vec!["Applied Torque".to_string(), "Allowance".to_string()];
    header.extend((1..=slots).map(|i| format!("Test {i}")));

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut cells = vec![fmt_num(r.target), r.label.clone()];
            cells.extend(r.samples.iter().map(|s| match s {
                SampleSlot::Value(v) => fmt_num(*v),
                SampleSlot::Absent => "-".to_string(),
            }));
            cells.resize(header.len(), String::new());
            cells
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|c| {
            body.iter()
                .map(|row| row[c].len())
                .chain(std::iter::once(header[c].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let line = |cells: &[String], out: &mut String| {
        let joined: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect();
        let _ = writeln!(out, "{}", joined.join(" | ").trim_end());
    };
    line(&header, &mut out);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in &body {
        line(row, &mut out);
    }
    out
}

/// Title, table and verdict for a finalized session.
pub fn render_summary(summary: &Summary) -> String {
    let mut out = format!("Session {} - {}\n", summary.session, summary.profile);
    out.push_str(&render_table(&summary.rows));
    let verdict = if summary.passed { "PASS" } else { "INCOMPLETE" };
    let _ = writeln!(
        out,
        "Result: {verdict} ({} samples, stopped: {})",
        summary.accepted_total(),
        summary.reason
    );
    out
}

/// Redraws the running session's table on a fixed interval while it changes.
///
/// The polling thread is stopped and joined on drop.
pub struct LiveView {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl LiveView {
    pub fn spawn<F>(handle: SummaryHandle, refresh: Duration, mut draw: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let join_handle = std::thread::spawn(move || {
            let mut last: Option<Vec<SummaryRow>> = None;
            while !shutdown_clone.load(Ordering::Relaxed) {
                let rows = handle.project();
                if last.as_ref() != Some(&rows) {
                    draw(&render_table(&rows));
                    last = Some(rows);
                }
                std::thread::sleep(refresh);
            }
            tracing::trace!("live view exiting");
        });
        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for LiveView {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "live view thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use torque_core::{RangeId, SampleBank, ToleranceProfile, ToolKind, project};

    #[test]
    fn renders_absent_slots_as_dashes() {
        let profile =
            ToleranceProfile::from_targets(75.0, ToolKind::Wrench, "ft/lbs", &[70.0, 50.0], 0.04);
        let bank = SampleBank::new(2, 3);
        bank.try_accept(RangeId(0), 70.1);
        let table = render_table(&project(&profile, &bank));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Applied Torque | Allowance"));
        assert!(lines[0].ends_with("Test 3"));
        assert!(lines[2].contains("67.2 - 72.8"));
        assert!(lines[2].contains("70.1"));
        assert_eq!(lines[3].split(" | ").filter(|c| c.trim() == "-").count(), 3);
    }
}
