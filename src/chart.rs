use std::sync::Arc;

use crate::record::CanonicalRecord;
use crate::render::ChartRenderer;
use crate::suite::Topic;

/// One topic's ordered measurements, renderable once a renderer is bound.
#[derive(Clone)]
pub struct Chart {
    pub suite_name: String,
    pub operation_id: String,
    pub field: String,
    pub data: Vec<CanonicalRecord>,
    renderer: Option<Arc<dyn ChartRenderer>>,
}

impl std::fmt::Debug for Chart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chart")
            .field("suite_name", &self.suite_name)
            .field("operation_id", &self.operation_id)
            .field("field", &self.field)
            .field("data", &self.data.len())
            .field("renderer", &self.renderer.as_ref().map(|r| r.name()))
            .finish()
    }
}

impl Chart {
    pub fn new(suite_name: impl Into<String>, topic: &Topic, data: Vec<CanonicalRecord>) -> Self {
        Self {
            suite_name: suite_name.into(),
            operation_id: topic.operation_id.clone(),
            field: topic.field.clone(),
            data,
            renderer: None,
        }
    }

    pub fn topic(&self) -> Topic {
        Topic::new(self.operation_id.clone(), self.field.clone())
    }

    pub fn set_renderer(&mut self, renderer: Arc<dyn ChartRenderer>) {
        self.renderer = Some(renderer);
    }

    pub fn renderer(&self) -> Option<&dyn ChartRenderer> {
        self.renderer.as_deref()
    }

    pub fn is_renderable(&self) -> bool {
        self.renderer.is_some()
    }

    /// Earliest and latest timestamp (ns) in this chart's data.
    pub fn time_frame(&self) -> Option<(i64, i64)> {
        let first = self.data.first()?.timestamp;
        Some(self.data.iter().fold((first, first), |(lo, hi), record| {
            (lo.min(record.timestamp), hi.max(record.timestamp))
        }))
    }

    /// Numeric samples as (seconds since `start_seconds`, value).
    pub fn points(&self, start_seconds: f64) -> Vec<(f64, f64)> {
        self.data
            .iter()
            .filter_map(|record| {
                record
                    .value
                    .as_f64()
                    .map(|value| (record.seconds() - start_seconds, value))
            })
            .collect()
    }

    /// Sample times in seconds since `start_seconds`.
    pub fn offsets(&self, start_seconds: f64) -> Vec<f64> {
        self.data
            .iter()
            .map(|record| record.seconds() - start_seconds)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    #[test]
    fn time_frame_tracks_extremes_regardless_of_order() {
        let topic = Topic::new("op", "field");
        let data = vec![
            CanonicalRecord::new("s", "op", "field", 30, Value::Int(1)),
            CanonicalRecord::new("s", "op", "field", 10, Value::Int(2)),
            CanonicalRecord::new("s", "op", "field", 20, Value::Int(3)),
        ];
        let chart = Chart::new("s", &topic, data);
        assert_eq!(chart.time_frame(), Some((10, 30)));
        assert!(!chart.is_renderable());

        let empty = Chart::new("s", &topic, Vec::new());
        assert_eq!(empty.time_frame(), None);
    }

    #[test]
    fn points_skip_text_values() {
        let topic = Topic::new("op", "state");
        let data = vec![
            CanonicalRecord::new("s", "op", "state", 2_000_000_000, Value::Float(1.5)),
            CanonicalRecord::new("s", "op", "state", 3_000_000_000, Value::Text("idle".into())),
        ];
        let chart = Chart::new("s", &topic, data);
        assert_eq!(chart.points(1.0), vec![(1.0, 1.5)]);
        assert_eq!(chart.offsets(1.0), vec![1.0, 2.0]);
    }
}
