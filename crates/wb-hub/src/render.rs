use std::fmt::Write;
use wb_core::history::{ChartHistory, DashboardView};
use wb_core::DerivedMetrics;

const CHART_JS: &str = "https://cdn.jsdelivr.net/npm/chart.js@4.4.1/dist/chart.umd.min.js";

enum FieldKind {
    Number { max: Option<&'static str> },
    Choice(&'static [&'static str]),
    Text,
}

struct FormField {
    name: &'static str,
    label: &'static str,
    kind: FieldKind,
}

const fn number(name: &'static str, label: &'static str, max: Option<&'static str>) -> FormField {
    FormField {
        name,
        label,
        kind: FieldKind::Number { max },
    }
}

const LEVELS: &[&str] = &["low", "medium", "high"];
const QUALITY: &[&str] = &["poor", "fair", "good", "excellent"];
const YES_NO: &[&str] = &["no", "yes"];

const SECTIONS: [(&str, [FormField; 4]); 4] = [
    (
        "Study time",
        [
            number("planned_study_time", "Planned study time (h)", None),
            number("actual_study_time", "Actual study time (h)", None),
            FormField {
                name: "break_time",
                label: "Break time",
                kind: FieldKind::Text,
            },
            FormField {
                name: "personal_care",
                label: "Personal care",
                kind: FieldKind::Text,
            },
        ],
    ),
    (
        "Workload",
        [
            number("active_tasks", "Active tasks", None),
            number("deadlines", "Deadlines", None),
            number("context_switches", "Context switches", None),
            FormField {
                name: "task_complexity",
                label: "Task complexity",
                kind: FieldKind::Choice(LEVELS),
            },
        ],
    ),
    (
        "Strain",
        [
            number("stress", "Stress (0-10)", Some("10")),
            number("fatigue", "Fatigue (0-10)", Some("10")),
            number("exhaustion", "Exhaustion (0-10)", Some("10")),
            FormField {
                name: "motivation",
                label: "Motivation",
                kind: FieldKind::Choice(LEVELS),
            },
        ],
    ),
    (
        "Recovery",
        [
            number("sleep_duration", "Sleep duration (h)", Some("24")),
            FormField {
                name: "sleep_quality",
                label: "Sleep quality",
                kind: FieldKind::Choice(QUALITY),
            },
            FormField {
                name: "holidays",
                label: "Holiday",
                kind: FieldKind::Choice(YES_NO),
            },
            number("micro_breaks", "Micro breaks", None),
        ],
    ),
];

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem auto;max-width:960px;color:#1f2933}\
fieldset{border:1px solid #cbd2d9;border-radius:6px;margin-bottom:1rem}\
label{display:block;margin:.4rem 0}input,select{margin-left:.5rem}\
.cards{display:grid;grid-template-columns:repeat(3,1fr);gap:1rem}\
.card{border:1px solid #cbd2d9;border-radius:6px;padding:1rem}\
.card strong{display:block;font-size:1.6rem}";

pub fn render_form() -> String {
    let mut body = String::new();
    body.push_str("<h1>Daily check-in</h1>\n<form method=\"post\" action=\"/\">\n");
    for (legend, fields) in SECTIONS.iter() {
        let _ = writeln!(body, "<fieldset><legend>{legend}</legend>");
        for field in fields.iter() {
            let _ = writeln!(body, "<label>{}{}</label>", field.label, field_input(field));
        }
        body.push_str("</fieldset>\n");
    }
    body.push_str("<button type=\"submit\">Save</button>\n</form>\n");
    body.push_str("<p><a href=\"/metrics\">View dashboard</a></p>\n");
    page("Daily check-in", &body, "")
}

fn field_input(field: &FormField) -> String {
    match &field.kind {
        FieldKind::Number { max } => {
            let max = max.map(|max| format!(" max=\"{max}\"")).unwrap_or_default();
            format!(
                "<input type=\"number\" step=\"any\" min=\"0\"{max} name=\"{}\">",
                field.name
            )
        }
        FieldKind::Choice(options) => {
            let mut select = format!("<select name=\"{}\"><option value=\"\"></option>", field.name);
            for option in options.iter() {
                let _ = write!(select, "<option value=\"{option}\">{option}</option>");
            }
            select.push_str("</select>");
            select
        }
        FieldKind::Text => format!("<input type=\"text\" name=\"{}\">", field.name),
    }
}

pub fn render_dashboard(view: &DashboardView) -> String {
    let mut body = String::new();
    body.push_str("<h1>Wellbeing dashboard</h1>\n<div class=\"cards\">\n");
    for (label, value) in metric_cards(&view.metrics) {
        let _ = writeln!(
            body,
            "<div class=\"card\">{label}<strong>{value:.1}</strong></div>"
        );
    }
    body.push_str("</div>\n<canvas id=\"history\" height=\"120\"></canvas>\n");
    body.push_str("<p><a href=\"/\">New check-in</a></p>\n");

    let script = format!(
        "<script src=\"{CHART_JS}\"></script>\n<script>\n{}\n</script>",
        chart_script(&view.history)
    );
    page("Wellbeing dashboard", &body, &script)
}

fn metric_cards(metrics: &DerivedMetrics) -> [(&'static str, f64); 6] {
    [
        ("Burnout risk", metrics.burnout_risk),
        ("Sustainability", metrics.sustainability_score),
        ("Time poverty", metrics.time_poverty_index),
        ("Work imbalance", metrics.work_imbalance),
        ("Mental strain", metrics.mental_strain),
        ("Recovery deficit", metrics.recovery_deficit_score),
    ]
}

fn chart_script(history: &ChartHistory) -> String {
    let data = serde_json::to_string(history)
        .unwrap_or_else(|_| "{\"labels\":[]}".to_string())
        .replace("</", "<\\/");
    format!(
        "const chartData = {data};\n\
         const series = [\n\
           ['Time poverty', 'time_poverty'],\n\
           ['Work imbalance', 'work_imbalance'],\n\
           ['Mental strain', 'mental_strain'],\n\
           ['Recovery deficit', 'recovery_deficit'],\n\
           ['Sustainability', 'sustainability'],\n\
           ['Burnout risk', 'burnout_risk'],\n\
         ];\n\
         new Chart(document.getElementById('history'), {{\n\
           type: 'line',\n\
           data: {{\n\
             labels: chartData.labels,\n\
             datasets: series.map(([label, key]) => ({{ label, data: chartData[key] || [], tension: 0.25 }})),\n\
           }},\n\
         }});"
    )
}

fn page(title: &str, body: &str, scripts: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}{scripts}\n</body>\n</html>\n"
    )
}
