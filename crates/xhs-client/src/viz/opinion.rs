//! Opinion distribution chart, drawn as a bubble scatter.
//!
//! x is the support level (%), y the confidence (%), and the bubble size the
//! influence score scaled by 0.4 and clamped to `[20, 50]`.

use serde::Deserialize;
use serde_json::{Value, json};

/// Labels longer than this many characters are shortened.
const LABEL_MAX_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Opinion {
    pub content: String,
    #[serde(default)]
    pub support_level: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub influence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpinionData {
    #[serde(default)]
    pub title: Option<String>,
    pub data: Vec<Opinion>,
}

impl OpinionData {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("主要观点分布")
    }
}

/// Bubble diameter for an influence score.
pub fn symbol_size(influence: f64) -> f64 {
    if influence.is_nan() {
        return 20.0;
    }
    (influence * 0.4).clamp(20.0, 50.0)
}

/// Shorten a label to 20 characters plus an ellipsis.
pub fn truncate_label(content: &str) -> String {
    if content.chars().count() > LABEL_MAX_CHARS {
        let head: String = content.chars().take(LABEL_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_owned()
    }
}

pub fn build_option(data: &OpinionData) -> Value {
    let points: Vec<Value> = data
        .data
        .iter()
        .map(|opinion| {
            json!({
                "name": truncate_label(&opinion.content),
                "value": [opinion.support_level, opinion.confidence, opinion.influence_score],
                "content": opinion.content,
                "symbolSize": symbol_size(opinion.influence_score),
                "itemStyle": {
                    "color": {
                        "type": "linear",
                        "x": 0, "y": 0, "x2": 1, "y2": 1,
                        "colorStops": [
                            { "offset": 0, "color": "rgba(91, 143, 249, 0.8)" },
                            { "offset": 1, "color": "rgba(91, 143, 249, 0.2)" }
                        ]
                    }
                }
            })
        })
        .collect();

    let dashed = json!({ "show": true, "lineStyle": { "type": "dashed" } });

    json!({
        "title": { "text": data.title(), "left": "center" },
        "tooltip": { "trigger": "item" },
        "legend": { "right": "5%", "top": "15%", "orient": "vertical" },
        "grid": { "left": "8%", "right": "15%", "top": "15%", "bottom": "10%", "containLabel": true },
        "xAxis": { "type": "value", "name": "支持度(%)", "max": 100, "splitLine": dashed },
        "yAxis": { "type": "value", "name": "可信度(%)", "max": 100, "splitLine": dashed },
        "series": [{
            "type": "scatter",
            "data": points,
            "label": { "show": true, "formatter": "{b}", "position": "right", "fontSize": 12 },
            "emphasis": { "focus": "series", "label": { "show": true, "position": "top" } }
        }]
    })
}
