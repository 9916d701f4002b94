//! Visualization panel.
//!
//! The panel holds one widget per chart kind.  A widget exists only if its
//! container was mounted by the front end; updates aimed at an absent widget
//! are dropped.  Each update replaces the chart's option wholesale.
//!
//! The panel is collapsible.  Expanding it schedules a resize pass after a
//! short delay so the layout can settle first, and window resizes only
//! reach the charts while the panel is expanded.

pub mod controversy;
pub mod opinion;
pub mod wordcloud;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::protocol::VisualizationData;

pub use controversy::ControversyData;
pub use opinion::OpinionData;
pub use wordcloud::WordCloudData;

/// The chart widgets the panel knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChartKind {
    WordCloud,
    OpinionDistribution,
    ControversyAnalysis,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [
        ChartKind::WordCloud,
        ChartKind::OpinionDistribution,
        ChartKind::ControversyAnalysis,
    ];

    /// Key of this chart's dataset in `visualization_data`.
    pub fn key(self) -> &'static str {
        match self {
            Self::WordCloud => "word_cloud",
            Self::OpinionDistribution => "opinion_distribution",
            Self::ControversyAnalysis => "controversy_analysis",
        }
    }
}

/// The typed dataset a chart was last rendered from.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    WordCloud(WordCloudData),
    Opinion(OpinionData),
    Controversy(ControversyData),
}

/// One chart widget bound to a container.
#[derive(Debug, Clone, Default)]
pub struct Chart {
    option: Option<Value>,
    dataset: Option<Dataset>,
    updates: u32,
    resizes: u32,
}

impl Chart {
    /// The current ECharts option, if the chart has been rendered.
    pub fn option(&self) -> Option<&Value> {
        self.option.as_ref()
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// How many times the chart has been re-rendered.
    pub fn updates(&self) -> u32 {
        self.updates
    }

    /// How many resize passes the chart has received.
    pub fn resizes(&self) -> u32 {
        self.resizes
    }

    fn set(&mut self, option: Value, dataset: Dataset) {
        self.option = Some(option);
        self.dataset = Some(dataset);
        self.updates += 1;
    }
}

/// The collapsible chart panel.
#[derive(Debug)]
pub struct VisualizationPanel {
    charts: BTreeMap<ChartKind, Chart>,
    expanded: bool,
    resize_delay: Duration,
    resize_due: Option<Instant>,
    minority_insights: Vec<String>,
}

impl VisualizationPanel {
    /// A collapsed panel with every chart container mounted.
    pub fn new(resize_delay: Duration) -> Self {
        Self::with_containers(resize_delay, &ChartKind::ALL)
    }

    /// A collapsed panel with only the given containers mounted.
    pub fn with_containers(resize_delay: Duration, kinds: &[ChartKind]) -> Self {
        Self {
            charts: kinds.iter().map(|k| (*k, Chart::default())).collect(),
            expanded: false,
            resize_delay,
            resize_due: None,
            minority_insights: Vec::new(),
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn chart(&self, kind: ChartKind) -> Option<&Chart> {
        self.charts.get(&kind)
    }

    pub fn minority_insights(&self) -> &[String] {
        &self.minority_insights
    }

    /// When the deferred resize pass will run, if one is scheduled.
    pub fn resize_due(&self) -> Option<Instant> {
        self.resize_due
    }

    /// Arrow shown on the toggle: right when expanded, left when collapsed.
    pub fn toggle_glyph(&self) -> &'static str {
        if self.expanded { "►" } else { "◄" }
    }

    // -- Panel state --------------------------------------------------------

    /// Flip the panel; expanding schedules a deferred resize.
    ///
    /// Returns whether the panel is now expanded.
    pub fn toggle(&mut self, now: Instant) -> bool {
        self.expanded = !self.expanded;
        if self.expanded {
            self.resize_due = Some(now + self.resize_delay);
        } else {
            self.resize_due = None;
        }
        debug!(expanded = self.expanded, "visualization panel toggled");
        self.expanded
    }

    /// Run the deferred resize once its delay has elapsed.
    pub fn tick(&mut self, now: Instant) {
        if self.resize_due.is_some_and(|due| due <= now) {
            self.resize_due = None;
            self.resize();
        }
    }

    /// React to the host window changing size.
    pub fn on_window_resize(&mut self) {
        self.resize();
    }

    /// Resize every mounted chart, but only while expanded.
    fn resize(&mut self) {
        if !self.expanded {
            return;
        }
        for chart in self.charts.values_mut() {
            chart.resizes += 1;
        }
    }

    // -- Data ---------------------------------------------------------------

    /// Render whichever datasets are present; absent keys leave their
    /// charts untouched.  A collapsed panel is expanded to show the results.
    pub fn handle_search_result(&mut self, data: &VisualizationData, now: Instant) {
        if let Some(raw) = &data.word_cloud {
            self.update_word_cloud(raw);
        }
        if let Some(raw) = &data.opinion_distribution {
            self.update_opinion_distribution(raw);
        }
        if let Some(raw) = &data.controversy_analysis {
            self.update_controversy_analysis(raw);
        }
        if let Some(raw) = &data.minority_insights {
            self.update_minority_insights(raw);
        }

        if !self.expanded {
            self.toggle(now);
        }
    }

    pub fn update_word_cloud(&mut self, raw: &Value) {
        let Some(data) = self.parse::<WordCloudData>(ChartKind::WordCloud, raw) else {
            return;
        };
        let option = wordcloud::build_option(&data, &mut rand::thread_rng());
        self.store(ChartKind::WordCloud, option, Dataset::WordCloud(data));
    }

    pub fn update_opinion_distribution(&mut self, raw: &Value) {
        let Some(data) = self.parse::<OpinionData>(ChartKind::OpinionDistribution, raw) else {
            return;
        };
        let option = opinion::build_option(&data);
        self.store(ChartKind::OpinionDistribution, option, Dataset::Opinion(data));
    }

    pub fn update_controversy_analysis(&mut self, raw: &Value) {
        let Some(data) = self.parse::<ControversyData>(ChartKind::ControversyAnalysis, raw) else {
            return;
        };
        let option = controversy::build_option(&data);
        self.store(ChartKind::ControversyAnalysis, option, Dataset::Controversy(data));
    }

    /// Minority insights have no chart; they are kept as a list of texts.
    ///
    /// Accepts `{data: [...]}` or a bare array, whose items are strings or
    /// objects with a `content` (or `text`) field.
    pub fn update_minority_insights(&mut self, raw: &Value) {
        let items = match raw {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("data") {
                Some(Value::Array(items)) => items,
                _ => {
                    debug!("minority insights without data, skipped");
                    return;
                }
            },
            _ => return,
        };
        self.minority_insights = items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map
                    .get("content")
                    .or_else(|| map.get("text"))
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                _ => None,
            })
            .collect();
    }

    fn parse<T: DeserializeOwned>(&self, kind: ChartKind, raw: &Value) -> Option<T> {
        if !self.charts.contains_key(&kind) {
            debug!(chart = kind.key(), "chart container absent, update skipped");
            return None;
        }
        if raw.get("data").is_none_or(Value::is_null) {
            debug!(chart = kind.key(), "dataset without data, update skipped");
            return None;
        }
        match serde_json::from_value(raw.clone()) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(chart = kind.key(), error = %e, "malformed chart dataset, update skipped");
                None
            }
        }
    }

    fn store(&mut self, kind: ChartKind, option: Value, dataset: Dataset) {
        if let Some(chart) = self.charts.get_mut(&kind) {
            chart.set(option, dataset);
            info!(chart = kind.key(), "chart updated");
        }
    }
}
