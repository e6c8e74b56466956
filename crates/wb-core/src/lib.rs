use serde::{Deserialize, Serialize};

pub mod history;

pub const INPUT_COLUMNS: [&str; 16] = [
    "planned_study_time",
    "actual_study_time",
    "break_time",
    "personal_care",
    "active_tasks",
    "deadlines",
    "context_switches",
    "task_complexity",
    "stress",
    "fatigue",
    "exhaustion",
    "motivation",
    "sleep_duration",
    "sleep_quality",
    "holidays",
    "micro_breaks",
];

pub const METRIC_COLUMNS: [&str; 6] = [
    "time_poverty_index",
    "work_imbalance",
    "mental_strain",
    "recovery_deficit_score",
    "sustainability_score",
    "burnout_risk",
];

pub const TEXT_INPUT_COLUMNS: [&str; 6] = [
    "task_complexity",
    "sleep_quality",
    "holidays",
    "break_time",
    "personal_care",
    "motivation",
];

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// Header of the persisted table: inputs followed by metrics.
pub fn header() -> Vec<&'static str> {
    INPUT_COLUMNS
        .iter()
        .chain(METRIC_COLUMNS.iter())
        .copied()
        .collect()
}

/// Every column a stored row carries, in write order.
pub fn stored_columns() -> Vec<&'static str> {
    let mut columns = header();
    columns.push(TIMESTAMP_COLUMN);
    columns
}

pub fn column_kind(name: &str) -> ColumnKind {
    if name == TIMESTAMP_COLUMN || TEXT_INPUT_COLUMNS.contains(&name) {
        ColumnKind::Text
    } else {
        ColumnKind::Numeric
    }
}

/// An untyped value as it arrives from a form or a table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Missing,
    Number(f64),
    Text(String),
}

impl RawValue {
    pub fn into_text(self) -> String {
        match self {
            RawValue::Missing => String::new(),
            RawValue::Text(text) => text,
            RawValue::Number(value) => value.to_string(),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// Total conversion to a finite float. Anything unusable becomes 0.0.
pub fn coerce(value: &RawValue) -> f64 {
    match value {
        RawValue::Missing => 0.0,
        RawValue::Number(number) => finite_or_zero(*number),
        RawValue::Text(text) => coerce_str(text),
    }
}

pub fn coerce_str(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "nan" {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(number) => finite_or_zero(number),
        Err(_) => 0.0,
    }
}

fn finite_or_zero(number: f64) -> f64 {
    if number.is_finite() {
        number
    } else {
        0.0
    }
}

/// One form submission before coercion. Absent fields stay `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSubmission {
    pub planned_study_time: Option<String>,
    pub actual_study_time: Option<String>,
    pub break_time: Option<String>,
    pub personal_care: Option<String>,
    pub active_tasks: Option<String>,
    pub deadlines: Option<String>,
    pub context_switches: Option<String>,
    pub task_complexity: Option<String>,
    pub stress: Option<String>,
    pub fatigue: Option<String>,
    pub exhaustion: Option<String>,
    pub motivation: Option<String>,
    pub sleep_duration: Option<String>,
    pub sleep_quality: Option<String>,
    pub holidays: Option<String>,
    pub micro_breaks: Option<String>,
}

impl RawSubmission {
    /// Builds a submission from decoded form pairs. The first value wins
    /// for a repeated field and unknown names are ignored.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut raw = Self::default();
        for (name, value) in pairs {
            if let Some(slot) = raw.field_mut(name.as_ref()) {
                if slot.is_none() {
                    *slot = Some(value.into());
                }
            }
        }
        raw
    }

    fn field_mut(&mut self, column: &str) -> Option<&mut Option<String>> {
        let slot = match column {
            "planned_study_time" => &mut self.planned_study_time,
            "actual_study_time" => &mut self.actual_study_time,
            "break_time" => &mut self.break_time,
            "personal_care" => &mut self.personal_care,
            "active_tasks" => &mut self.active_tasks,
            "deadlines" => &mut self.deadlines,
            "context_switches" => &mut self.context_switches,
            "task_complexity" => &mut self.task_complexity,
            "stress" => &mut self.stress,
            "fatigue" => &mut self.fatigue,
            "exhaustion" => &mut self.exhaustion,
            "motivation" => &mut self.motivation,
            "sleep_duration" => &mut self.sleep_duration,
            "sleep_quality" => &mut self.sleep_quality,
            "holidays" => &mut self.holidays,
            "micro_breaks" => &mut self.micro_breaks,
            _ => return None,
        };
        Some(slot)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub planned_study_time: f64,
    pub actual_study_time: f64,
    pub active_tasks: f64,
    pub deadlines: f64,
    pub context_switches: f64,
    pub stress: f64,
    pub fatigue: f64,
    pub exhaustion: f64,
    pub sleep_duration: f64,
    pub micro_breaks: f64,
    pub task_complexity: String,
    pub sleep_quality: String,
    pub holidays: String,
    pub break_time: String,
    pub personal_care: String,
    pub motivation: String,
    pub timestamp: String,
}

impl InputRecord {
    pub fn from_submission(raw: &RawSubmission, timestamp: impl Into<String>) -> Self {
        let number = |value: &Option<String>| value.as_deref().map(coerce_str).unwrap_or(0.0);
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            planned_study_time: number(&raw.planned_study_time),
            actual_study_time: number(&raw.actual_study_time),
            active_tasks: number(&raw.active_tasks),
            deadlines: number(&raw.deadlines),
            context_switches: number(&raw.context_switches),
            stress: number(&raw.stress),
            fatigue: number(&raw.fatigue),
            exhaustion: number(&raw.exhaustion),
            sleep_duration: number(&raw.sleep_duration),
            micro_breaks: number(&raw.micro_breaks),
            task_complexity: text(&raw.task_complexity),
            sleep_quality: text(&raw.sleep_quality),
            holidays: text(&raw.holidays),
            break_time: text(&raw.break_time),
            personal_care: text(&raw.personal_care),
            motivation: text(&raw.motivation),
            timestamp: timestamp.into(),
        }
    }

    fn number(&self, column: &str) -> Option<f64> {
        let value = match column {
            "planned_study_time" => self.planned_study_time,
            "actual_study_time" => self.actual_study_time,
            "active_tasks" => self.active_tasks,
            "deadlines" => self.deadlines,
            "context_switches" => self.context_switches,
            "stress" => self.stress,
            "fatigue" => self.fatigue,
            "exhaustion" => self.exhaustion,
            "sleep_duration" => self.sleep_duration,
            "micro_breaks" => self.micro_breaks,
            _ => return None,
        };
        Some(value)
    }

    fn text(&self, column: &str) -> Option<&str> {
        let value = match column {
            "task_complexity" => &self.task_complexity,
            "sleep_quality" => &self.sleep_quality,
            "holidays" => &self.holidays,
            "break_time" => &self.break_time,
            "personal_care" => &self.personal_care,
            "motivation" => &self.motivation,
            TIMESTAMP_COLUMN => &self.timestamp,
            _ => return None,
        };
        Some(value.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub time_poverty_index: f64,
    pub work_imbalance: f64,
    pub mental_strain: f64,
    pub recovery_deficit_score: f64,
    pub sustainability_score: f64,
    pub burnout_risk: f64,
}

impl DerivedMetrics {
    /// Applies the fixed linear formulas. Recovery deficit is computed
    /// before the two scores that depend on it.
    pub fn from_inputs(input: &InputRecord) -> Self {
        let time_poverty_index = input.planned_study_time - input.actual_study_time;
        let work_imbalance = input.active_tasks + input.deadlines + input.context_switches;
        let mental_strain = input.stress + input.fatigue + input.exhaustion;
        let recovery_deficit_score =
            clamp_zero(8.0 - input.sleep_duration) + clamp_zero(3.0 - input.micro_breaks);

        let load = time_poverty_index + work_imbalance + mental_strain + recovery_deficit_score;

        Self {
            time_poverty_index,
            work_imbalance,
            mental_strain,
            recovery_deficit_score,
            sustainability_score: clamp_zero(100.0 - load),
            burnout_risk: load / 4.0,
        }
    }

    /// Re-runs coercion over already stored values.
    pub fn recoerced(&self) -> Self {
        let fix = |value: f64| coerce(&value.into());
        Self {
            time_poverty_index: fix(self.time_poverty_index),
            work_imbalance: fix(self.work_imbalance),
            mental_strain: fix(self.mental_strain),
            recovery_deficit_score: fix(self.recovery_deficit_score),
            sustainability_score: fix(self.sustainability_score),
            burnout_risk: fix(self.burnout_risk),
        }
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        let value = match column {
            "time_poverty_index" => self.time_poverty_index,
            "work_imbalance" => self.work_imbalance,
            "mental_strain" => self.mental_strain,
            "recovery_deficit_score" => self.recovery_deficit_score,
            "sustainability_score" => self.sustainability_score,
            "burnout_risk" => self.burnout_risk,
            _ => return None,
        };
        Some(value)
    }
}

fn clamp_zero(value: f64) -> f64 {
    value.max(0.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub input: InputRecord,
    pub metrics: DerivedMetrics,
}

impl StoredRow {
    pub fn timestamp(&self) -> &str {
        &self.input.timestamp
    }

    /// Cell values in `stored_columns()` order.
    pub fn values(&self) -> Vec<RawValue> {
        stored_columns()
            .into_iter()
            .map(|column| self.value(column))
            .collect()
    }

    pub fn value(&self, column: &str) -> RawValue {
        if let Some(number) = self.input.number(column) {
            return RawValue::Number(number);
        }
        if let Some(number) = self.metrics.get(column) {
            return RawValue::Number(number);
        }
        match self.input.text(column) {
            Some(text) => RawValue::Text(text.to_string()),
            None => RawValue::Missing,
        }
    }

    /// Rebuilds a row from stored cells, coercing numbers and defaulting text.
    pub fn from_values<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> RawValue,
    {
        let mut number = |column: &str| coerce(&lookup(column));
        let input_numbers = [
            number("planned_study_time"),
            number("actual_study_time"),
            number("active_tasks"),
            number("deadlines"),
            number("context_switches"),
            number("stress"),
            number("fatigue"),
            number("exhaustion"),
            number("sleep_duration"),
            number("micro_breaks"),
        ];
        let metrics = DerivedMetrics {
            time_poverty_index: number("time_poverty_index"),
            work_imbalance: number("work_imbalance"),
            mental_strain: number("mental_strain"),
            recovery_deficit_score: number("recovery_deficit_score"),
            sustainability_score: number("sustainability_score"),
            burnout_risk: number("burnout_risk"),
        };
        let mut text = |column: &str| lookup(column).into_text();
        let input = InputRecord {
            planned_study_time: input_numbers[0],
            actual_study_time: input_numbers[1],
            active_tasks: input_numbers[2],
            deadlines: input_numbers[3],
            context_switches: input_numbers[4],
            stress: input_numbers[5],
            fatigue: input_numbers[6],
            exhaustion: input_numbers[7],
            sleep_duration: input_numbers[8],
            micro_breaks: input_numbers[9],
            task_complexity: text("task_complexity"),
            sleep_quality: text("sleep_quality"),
            holidays: text("holidays"),
            break_time: text("break_time"),
            personal_care: text("personal_care"),
            motivation: text("motivation"),
            timestamp: text(TIMESTAMP_COLUMN),
        };
        Self { input, metrics }
    }
}

/// Coerces a submission, stamps it and derives the metrics.
pub fn calculate(raw: &RawSubmission, timestamp: impl Into<String>) -> StoredRow {
    let input = InputRecord::from_submission(raw, timestamp);
    let metrics = DerivedMetrics::from_inputs(&input);
    StoredRow { input, metrics }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(values: &[(&str, &str)]) -> RawSubmission {
        let mut raw = RawSubmission::default();
        for (key, value) in values {
            let slot = match *key {
                "planned_study_time" => &mut raw.planned_study_time,
                "actual_study_time" => &mut raw.actual_study_time,
                "active_tasks" => &mut raw.active_tasks,
                "deadlines" => &mut raw.deadlines,
                "context_switches" => &mut raw.context_switches,
                "stress" => &mut raw.stress,
                "fatigue" => &mut raw.fatigue,
                "exhaustion" => &mut raw.exhaustion,
                "sleep_duration" => &mut raw.sleep_duration,
                "micro_breaks" => &mut raw.micro_breaks,
                "motivation" => &mut raw.motivation,
                "sleep_quality" => &mut raw.sleep_quality,
                other => panic!("unexpected key {other}"),
            };
            *slot = Some(value.to_string());
        }
        raw
    }

    fn reference_submission() -> RawSubmission {
        submission(&[
            ("planned_study_time", "8"),
            ("actual_study_time", "5"),
            ("active_tasks", "3"),
            ("deadlines", "2"),
            ("context_switches", "1"),
            ("stress", "4"),
            ("fatigue", "3"),
            ("exhaustion", "2"),
            ("sleep_duration", "6"),
            ("micro_breaks", "1"),
        ])
    }

    #[test]
    fn coerce_defaults_unusable_values_to_zero() {
        for value in [
            RawValue::Missing,
            RawValue::from(""),
            RawValue::from("   "),
            RawValue::from("nan"),
            RawValue::from("NaN"),
            RawValue::from("inf"),
            RawValue::from("seven"),
            RawValue::from("4h"),
            RawValue::Number(f64::NAN),
            RawValue::Number(f64::NEG_INFINITY),
        ] {
            assert_eq!(coerce(&value), 0.0, "value {value:?}");
        }
    }

    #[test]
    fn coerce_parses_numeric_text_and_numbers() {
        assert_eq!(coerce(&RawValue::from("7.5")), 7.5);
        assert_eq!(coerce(&RawValue::from(" -2 ")), -2.0);
        assert_eq!(coerce(&RawValue::from("1e2")), 100.0);
        assert_eq!(coerce(&RawValue::Number(3.25)), 3.25);
    }

    #[test]
    fn calculate_matches_reference_example() {
        let row = calculate(&reference_submission(), "2026-03-01 08:00:00");

        assert_eq!(row.metrics.time_poverty_index, 3.0);
        assert_eq!(row.metrics.work_imbalance, 6.0);
        assert_eq!(row.metrics.mental_strain, 9.0);
        assert_eq!(row.metrics.recovery_deficit_score, 4.0);
        assert_eq!(row.metrics.sustainability_score, 78.0);
        assert_eq!(row.metrics.burnout_risk, 5.5);
        assert_eq!(row.timestamp(), "2026-03-01 08:00:00");
    }

    #[test]
    fn empty_submission_yields_defaults() {
        let row = calculate(&RawSubmission::default(), "2026-03-01 08:00:00");

        assert_eq!(row.input.planned_study_time, 0.0);
        assert_eq!(row.input.motivation, "");
        assert_eq!(row.input.holidays, "");
        assert_eq!(row.metrics.recovery_deficit_score, 11.0);
        assert_eq!(row.metrics.sustainability_score, 89.0);
        assert_eq!(row.metrics.burnout_risk, 11.0 / 4.0);
    }

    #[test]
    fn clamped_scores_never_go_negative() {
        let heavy = submission(&[
            ("planned_study_time", "60"),
            ("stress", "50"),
            ("sleep_duration", "12"),
            ("micro_breaks", "9"),
        ]);
        let row = calculate(&heavy, "2026-03-01 08:00:00");

        assert_eq!(row.metrics.recovery_deficit_score, 0.0);
        assert_eq!(row.metrics.sustainability_score, 0.0);
        assert_eq!(row.metrics.burnout_risk, 110.0 / 4.0);
    }

    #[test]
    fn sustainability_has_no_upper_clamp() {
        let relaxed = submission(&[
            ("actual_study_time", "30"),
            ("sleep_duration", "8"),
            ("micro_breaks", "3"),
        ]);
        let row = calculate(&relaxed, "2026-03-01 08:00:00");

        assert_eq!(row.metrics.time_poverty_index, -30.0);
        assert_eq!(row.metrics.sustainability_score, 130.0);
        assert_eq!(row.metrics.burnout_risk, -7.5);
    }

    #[test]
    fn text_fields_pass_through_verbatim() {
        let raw = submission(&[("motivation", "  high "), ("sleep_quality", "poor")]);
        let row = calculate(&raw, "2026-03-01 08:00:00");

        assert_eq!(row.input.motivation, "  high ");
        assert_eq!(row.input.sleep_quality, "poor");
    }

    #[test]
    fn values_follow_stored_column_order() {
        let row = calculate(&reference_submission(), "2026-03-01 08:00:00");
        let values = row.values();
        let columns = stored_columns();

        assert_eq!(values.len(), columns.len());
        assert_eq!(columns.len(), 23);
        assert_eq!(values[0], RawValue::Number(8.0));
        assert_eq!(values[2], RawValue::Text(String::new()));
        assert_eq!(values[16], RawValue::Number(3.0));
        assert_eq!(values[21], RawValue::Number(5.5));
        assert_eq!(values[22], RawValue::from("2026-03-01 08:00:00"));
    }

    #[test]
    fn from_values_coerces_stored_cells() {
        let row = calculate(&reference_submission(), "2026-03-01 08:00:00");
        let rebuilt = StoredRow::from_values(|column| row.value(column));
        assert_eq!(rebuilt, row);

        let damaged = StoredRow::from_values(|column| match column {
            "burnout_risk" => RawValue::from("oops"),
            "stress" => RawValue::Number(f64::NAN),
            "motivation" => RawValue::Number(2.0),
            _ => RawValue::Missing,
        });
        assert_eq!(damaged.metrics.burnout_risk, 0.0);
        assert_eq!(damaged.input.stress, 0.0);
        assert_eq!(damaged.input.motivation, "2");
        assert_eq!(damaged.timestamp(), "");
    }

    #[test]
    fn column_kinds_cover_header() {
        let text_columns: Vec<_> = stored_columns()
            .into_iter()
            .filter(|column| column_kind(column) == ColumnKind::Text)
            .collect();
        assert_eq!(text_columns.len(), 7);
        assert_eq!(header().len(), 22);
        assert_eq!(column_kind("burnout_risk"), ColumnKind::Numeric);
    }

    #[test]
    fn raw_submission_ignores_missing_form_fields() {
        let raw: RawSubmission =
            serde_json::from_str(r#"{"stress":"4","motivation":"ok"}"#).expect("parse");
        assert_eq!(raw.stress.as_deref(), Some("4"));
        assert_eq!(raw.fatigue, None);
    }

    #[test]
    fn recoerced_zeroes_non_finite_metrics() {
        let metrics = DerivedMetrics {
            burnout_risk: f64::INFINITY,
            mental_strain: f64::NAN,
            work_imbalance: 4.5,
            ..DerivedMetrics::default()
        }
        .recoerced();
        assert_eq!(metrics.burnout_risk, 0.0);
        assert_eq!(metrics.mental_strain, 0.0);
        assert_eq!(metrics.work_imbalance, 4.5);
    }

    #[test]
    fn from_pairs_keeps_first_value_and_skips_unknown_names() {
        let raw = RawSubmission::from_pairs([
            ("stress", "4"),
            ("stress", "9"),
            ("csrf_token", "abc"),
            ("holidays", "yes"),
        ]);
        assert_eq!(raw.stress.as_deref(), Some("4"));
        assert_eq!(raw.holidays.as_deref(), Some("yes"));
        assert_eq!(raw.fatigue, None);

        for column in INPUT_COLUMNS {
            let raw = RawSubmission::from_pairs([(column, "1")]);
            let row = calculate(&raw, "2026-01-01 00:00:00");
            let expected = match column_kind(column) {
                ColumnKind::Numeric => RawValue::Number(1.0),
                ColumnKind::Text => RawValue::from("1"),
            };
            assert_eq!(row.value(column), expected, "{column} not mapped");
        }
    }
}
