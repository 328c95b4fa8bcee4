use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::chart::Chart;
use crate::handler::{AnalysisCallback, HandlerRegistry, SuiteHandler};
use crate::record::{BuildInfo, CanonicalRecord};

/// Grouping key within a suite: `(operation_id, field)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic {
    pub operation_id: String,
    pub field: String,
}

impl Topic {
    pub fn new(operation_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            field: field.into(),
        }
    }

    pub fn of(record: &CanonicalRecord) -> Self {
        Self::new(record.operation_id.clone(), record.field.clone())
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.operation_id, self.field)
    }
}

/// Records of one suite partitioned by topic. Topics iterate in order of
/// first appearance; records within a topic keep arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicGroups {
    groups: Vec<(Topic, Vec<CanonicalRecord>)>,
}

impl TopicGroups {
    pub fn from_records(records: &[CanonicalRecord]) -> Self {
        let mut index: HashMap<Topic, usize> = HashMap::new();
        let mut groups: Vec<(Topic, Vec<CanonicalRecord>)> = Vec::new();
        for record in records {
            let topic = Topic::of(record);
            let slot = match index.get(&topic) {
                Some(slot) => *slot,
                None => {
                    index.insert(topic.clone(), groups.len());
                    groups.push((topic, Vec::new()));
                    groups.len() - 1
                }
            };
            groups[slot].1.push(record.clone());
        }
        Self { groups }
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> + '_ {
        self.groups.iter().map(|(topic, _)| topic)
    }

    pub fn get(&self, topic: &Topic) -> Option<&[CanonicalRecord]> {
        self.groups
            .iter()
            .find(|(candidate, _)| candidate == topic)
            .map(|(_, records)| records.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Topic, &[CanonicalRecord])> + '_ {
        self.groups
            .iter()
            .map(|(topic, records)| (topic, records.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// One logical test run-group sharing a suite id.
pub struct Suite {
    name: String,
    source: PathBuf,
    build: Option<Arc<BuildInfo>>,
    entries: Vec<CanonicalRecord>,
    topics: TopicGroups,
    handler: Option<Box<dyn SuiteHandler>>,
    /// Registry name of the descriptor that produced `handler`.
    registered_as: Option<&'static str>,
    charts: Vec<Chart>,
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("entries", &self.entries.len())
            .field("topics", &self.topics.len())
            .field("handler", &self.handler_name())
            .field("charts", &self.charts.len())
            .finish()
    }
}

impl Suite {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        build: Option<Arc<BuildInfo>>,
        entries: Vec<CanonicalRecord>,
    ) -> Self {
        let topics = TopicGroups::from_records(&entries);
        Self {
            name: name.into(),
            source: source.into(),
            build,
            entries,
            topics,
            handler: None,
            registered_as: None,
            charts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn build(&self) -> Option<&BuildInfo> {
        self.build.as_deref()
    }

    pub fn entries(&self) -> &[CanonicalRecord] {
        &self.entries
    }

    pub fn topics(&self) -> &TopicGroups {
        &self.topics
    }

    /// True when any entry was produced by `operation_id`.
    pub fn has_operation(&self, operation_id: &str) -> bool {
        self.topics
            .topics()
            .any(|topic| topic.operation_id == operation_id)
    }

    pub fn handler(&self) -> Option<&dyn SuiteHandler> {
        self.handler.as_deref()
    }

    pub fn handler_name(&self) -> Option<&'static str> {
        self.handler.as_ref().map(|handler| handler.name())
    }

    /// Name the bound handler was registered under.
    pub fn registered_as(&self) -> Option<&'static str> {
        self.registered_as
    }

    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    /// Run handler dispatch and chart construction. Returns whether a
    /// handler was bound; a suite is only ever bound once.
    pub fn bind(&mut self, registry: &HandlerRegistry) -> bool {
        if self.handler.is_some() {
            return true;
        }
        let Some(descriptor) = registry.find(self) else {
            return false;
        };
        let handler = (descriptor.create)(self);
        let charts = handler.build_charts(self);
        debug!(
            suite = %self.name,
            handler = handler.name(),
            topics = self.topics.len(),
            charts = charts.len(),
            "bound suite handler"
        );
        self.charts = charts;
        self.handler = Some(handler);
        self.registered_as = Some(descriptor.name);
        true
    }

    /// Run the bound handler's analysis, logging every message it reports.
    pub fn analyze(&self, callback: &mut AnalysisCallback<'_>) -> Option<String> {
        let handler = self.handler.as_ref()?;
        let mut logged = |suite: &Suite, datum: Option<&CanonicalRecord>, message: &str| {
            info!(suite = %suite.name(), "analyze: {message}");
            callback(suite, datum, message);
        };
        handler.analyze(self, &mut logged)
    }
}
