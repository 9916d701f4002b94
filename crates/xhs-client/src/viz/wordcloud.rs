//! Word cloud chart.
//!
//! Font size is linear in the token weight, clamped to `[12, 50]`; each
//! token gets a random color from a fixed ten-color palette.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::{Value, json};

/// Smallest and largest font size, in pixels.
pub const FONT_RANGE: (f64, f64) = (12.0, 50.0);

/// Token colors.
pub const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// A weighted token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WordWeight {
    pub text: String,
    #[serde(default)]
    pub weight: f64,
}

/// Dataset for the word cloud.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WordCloudData {
    #[serde(default)]
    pub title: Option<String>,
    pub data: Vec<WordWeight>,
}

impl WordCloudData {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("关键词分布")
    }

    /// Tokens sorted by descending weight.
    pub fn ranked(&self) -> Vec<&WordWeight> {
        let mut words: Vec<&WordWeight> = self.data.iter().collect();
        words.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        words
    }
}

/// Font size for a token weight: `clamp(weight / 2, 12, 50)`.
pub fn font_size(weight: f64) -> f64 {
    if weight.is_nan() {
        return FONT_RANGE.0;
    }
    (weight / 2.0).clamp(FONT_RANGE.0, FONT_RANGE.1)
}

/// Build the ECharts option for the word cloud.
pub fn build_option<R: Rng + ?Sized>(data: &WordCloudData, rng: &mut R) -> Value {
    let words: Vec<Value> = data
        .data
        .iter()
        .map(|word| {
            let color = PALETTE.choose(rng).copied().unwrap_or(PALETTE[0]);
            json!({
                "name": word.text,
                "value": word.weight,
                "textStyle": {
                    "fontSize": font_size(word.weight),
                    "color": color,
                }
            })
        })
        .collect();

    json!({
        "title": { "text": data.title(), "left": "center" },
        "tooltip": { "show": true, "formatter": "{b}: {c}" },
        "series": [{
            "type": "wordCloud",
            "width": "90%",
            "height": "90%",
            "left": "center",
            "top": "center",
            "sizeRange": [FONT_RANGE.0, FONT_RANGE.1],
            "rotationRange": [-45, 45],
            "textStyle": { "fontFamily": "sans-serif", "fontWeight": "bold" },
            "layoutAnimation": false,
            "gridSize": 6,
            "data": words,
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample() -> WordCloudData {
        serde_json::from_value(json!({
            "data": [
                {"text": "好吃", "weight": 80},
                {"text": "便宜", "weight": 10},
                {"text": "推荐", "weight": 500}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn font_size_is_clamped_and_monotonic() {
        assert_eq!(font_size(0.0), 12.0);
        assert_eq!(font_size(40.0), 20.0);
        assert_eq!(font_size(1000.0), 50.0);
        let sizes: Vec<f64> = (0..200).map(|w| font_size(f64::from(w))).collect();
        assert!(sizes.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn option_has_one_entry_per_word() {
        let mut rng = StdRng::seed_from_u64(7);
        let option = build_option(&sample(), &mut rng);
        let data = option["series"][0]["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["name"], "好吃");
        assert_eq!(data[0]["textStyle"]["fontSize"], 40.0);
        assert_eq!(data[2]["textStyle"]["fontSize"], 50.0);
        let color = data[1]["textStyle"]["color"].as_str().unwrap();
        assert!(PALETTE.contains(&color));
        assert_eq!(option["title"]["text"], "关键词分布");
    }

    #[test]
    fn ranked_sorts_by_weight() {
        let data = sample();
        let ranked: Vec<&str> = data.ranked().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(ranked, vec!["推荐", "好吃", "便宜"]);
    }
}
