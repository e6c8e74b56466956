use crate::{DerivedMetrics, StoredRow, TIMESTAMP_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_WINDOW: usize = 20;
pub const LABEL_FORMAT: &str = "%m-%d %H:%M";
pub const EMPTY_LABEL: &str = "No data";

const FALLBACK_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];

/// Parallel chart series, one entry per history point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartHistory {
    pub labels: Vec<String>,
    pub time_poverty: Vec<f64>,
    pub work_imbalance: Vec<f64>,
    pub mental_strain: Vec<f64>,
    pub recovery_deficit: Vec<f64>,
    pub sustainability: Vec<f64>,
    pub burnout_risk: Vec<f64>,
}

impl ChartHistory {
    /// Single neutral point shown when nothing has been recorded yet.
    pub fn placeholder() -> Self {
        let mut history = Self::default();
        history.push(
            EMPTY_LABEL.to_string(),
            &DerivedMetrics {
                sustainability_score: 100.0,
                ..DerivedMetrics::default()
            },
        );
        history
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn push(&mut self, label: String, metrics: &DerivedMetrics) {
        let metrics = metrics.recoerced();
        self.labels.push(label);
        self.time_poverty.push(metrics.time_poverty_index);
        self.work_imbalance.push(metrics.work_imbalance);
        self.mental_strain.push(metrics.mental_strain);
        self.recovery_deficit.push(metrics.recovery_deficit_score);
        self.sustainability.push(metrics.sustainability_score);
        self.burnout_risk.push(metrics.burnout_risk);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub metrics: DerivedMetrics,
    pub history: ChartHistory,
}

pub fn build_view(rows: &[StoredRow], window: usize) -> DashboardView {
    DashboardView {
        metrics: latest_metrics(rows),
        history: build_history(rows, window),
    }
}

/// Metrics of the last row in file order, or all zeros for an empty table.
pub fn latest_metrics(rows: &[StoredRow]) -> DerivedMetrics {
    rows.last()
        .map(|row| row.metrics.recoerced())
        .unwrap_or_default()
}

/// Chart series for the trailing `window` rows, ordered by timestamp.
///
/// When any timestamp in the window cannot be parsed the whole window is
/// relabelled with consecutive days from 2026-01-01, keeping file order.
pub fn build_history(rows: &[StoredRow], window: usize) -> ChartHistory {
    if rows.is_empty() {
        return ChartHistory::placeholder();
    }

    let window = window.max(1);
    let tail = &rows[rows.len().saturating_sub(window)..];

    let parsed: Option<Vec<NaiveDateTime>> = tail
        .iter()
        .map(|row| parse_timestamp(row.timestamp()))
        .collect();
    let stamps = parsed.unwrap_or_else(|| synthetic_timestamps(tail.len()));

    let mut points: Vec<(NaiveDateTime, &StoredRow)> = stamps.into_iter().zip(tail).collect();
    points.sort_by_key(|(stamp, _)| *stamp);

    let mut history = ChartHistory::default();
    for (stamp, row) in points {
        history.push(stamp.format(LABEL_FORMAT).to_string(), &row.metrics);
    }
    history
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
        return Some(stamp);
    }
    for format in FALLBACK_FORMATS {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(value, format) {
            return Some(stamp);
        }
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Some(stamp.naive_local());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn synthetic_timestamps(count: usize) -> Vec<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .into_iter()
        .flat_map(|origin| origin.iter_days())
        .filter_map(|date| date.and_hms_opt(0, 0, 0))
        .take(count)
        .collect()
}
