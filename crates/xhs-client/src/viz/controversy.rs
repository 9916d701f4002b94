//! Controversy analysis chart: stacked horizontal bars per topic.
//!
//! Each topic gets a support bar and an opposing bar (`100 - support`);
//! both are tinted with an opacity of `discussion_heat / 100`.

use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Topic {
    pub topic: String,
    #[serde(default)]
    pub support_ratio: f64,
    #[serde(default)]
    pub supporting_view: String,
    #[serde(default)]
    pub opposing_view: String,
    #[serde(default)]
    pub discussion_heat: f64,
}

impl Topic {
    /// Support share clamped to `[0, 100]`.
    pub fn support(&self) -> f64 {
        if self.support_ratio.is_nan() {
            return 0.0;
        }
        self.support_ratio.clamp(0.0, 100.0)
    }

    pub fn opposition(&self) -> f64 {
        100.0 - self.support()
    }

    /// Bar opacity derived from discussion heat.
    pub fn heat_alpha(&self) -> f64 {
        if self.discussion_heat.is_nan() {
            return 0.0;
        }
        (self.discussion_heat / 100.0).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ControversyData {
    #[serde(default)]
    pub title: Option<String>,
    pub data: Vec<Topic>,
}

impl ControversyData {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("主要争议点")
    }
}

fn bar_point(topic: &Topic, value: f64, rgb: &str) -> Value {
    json!({
        "value": value,
        "topic": topic.topic,
        "supporting_view": topic.supporting_view,
        "opposing_view": topic.opposing_view,
        "discussion_heat": topic.discussion_heat,
        "itemStyle": { "color": format!("rgba({rgb}, {})", topic.heat_alpha()) }
    })
}

pub fn build_option(data: &ControversyData) -> Value {
    let topics: Vec<&str> = data.data.iter().map(|t| t.topic.as_str()).collect();
    let support: Vec<Value> = data
        .data
        .iter()
        .map(|t| bar_point(t, t.support(), "91, 191, 95"))
        .collect();
    let oppose: Vec<Value> = data
        .data
        .iter()
        .map(|t| bar_point(t, t.opposition(), "214, 69, 65"))
        .collect();
    let label = json!({ "show": true, "position": "inside", "formatter": "{c}%" });

    json!({
        "title": { "text": data.title(), "left": "center" },
        "tooltip": { "trigger": "axis", "axisPointer": { "type": "shadow" } },
        "legend": { "data": ["支持", "反对"], "top": 30 },
        "grid": { "left": "3%", "right": "4%", "bottom": "3%", "containLabel": true },
        "xAxis": { "type": "value", "max": 100, "name": "比例(%)" },
        "yAxis": {
            "type": "category",
            "data": topics,
            "axisLabel": { "width": 200, "overflow": "break" }
        },
        "series": [
            { "name": "支持", "type": "bar", "stack": "total", "data": support, "label": label },
            { "name": "反对", "type": "bar", "stack": "total", "data": oppose, "label": label }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(support: f64, heat: f64) -> Topic {
        Topic {
            topic: "价格".into(),
            support_ratio: support,
            supporting_view: "值".into(),
            opposing_view: "贵".into(),
            discussion_heat: heat,
        }
    }

    #[test]
    fn opposition_complements_support() {
        let t = topic(65.0, 50.0);
        assert_eq!(t.opposition(), 35.0);
        assert_eq!(topic(120.0, 0.0).opposition(), 0.0);
    }

    #[test]
    fn heat_controls_opacity() {
        assert_eq!(topic(50.0, 80.0).heat_alpha(), 0.8);
        assert_eq!(topic(50.0, 300.0).heat_alpha(), 1.0);
    }

    #[test]
    fn bars_are_stacked_per_topic() {
        let data = ControversyData {
            title: None,
            data: vec![topic(60.0, 40.0)],
        };
        let option = build_option(&data);
        assert_eq!(option["yAxis"]["data"], json!(["价格"]));
        assert_eq!(option["series"][0]["stack"], "total");
        assert_eq!(option["series"][0]["data"][0]["value"], 60.0);
        assert_eq!(option["series"][1]["data"][0]["value"], 40.0);
        assert_eq!(
            option["series"][1]["data"][0]["itemStyle"]["color"],
            "rgba(214, 69, 65, 0.4)"
        );
        assert_eq!(option["title"]["text"], "主要争议点");
    }
}
