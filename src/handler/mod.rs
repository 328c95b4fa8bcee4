pub mod buffer_storage;
pub mod memory_allocation;
pub mod temperature;

use tracing::info;

use crate::chart::Chart;
use crate::record::CanonicalRecord;
use crate::suite::Suite;

pub use buffer_storage::BufferStorageHandler;
pub use memory_allocation::MemoryAllocationHandler;
pub use temperature::TemperatureHandler;

/// Receives `(suite, datum, message)` for every finding an analysis reports.
pub type AnalysisCallback<'a> = dyn FnMut(&Suite, Option<&CanonicalRecord>, &str) + 'a;

/// Per-suite-type strategy. A [`HandlerRegistry`] binds one to each suite.
pub trait SuiteHandler {
    /// Capability predicate over a suite's identity and content. Must be
    /// total and side-effect free.
    fn matches(suite: &Suite) -> bool
    where
        Self: Sized;

    fn create(suite: &Suite) -> Self
    where
        Self: Sized;

    /// Cross-suite rollup over every suite bound to this handler type.
    /// `None` means the handler has no summarization to offer.
    fn summarize(_suites: &[&Suite]) -> Option<String>
    where
        Self: Sized,
    {
        None
    }

    fn name(&self) -> &'static str;

    /// Bind a renderer to `chart`; `false` drops the chart from the suite.
    fn assign_renderer(&self, chart: &mut Chart) -> bool;

    /// One chart per topic, in topic order, keeping those that get a renderer.
    fn build_charts(&self, suite: &Suite) -> Vec<Chart> {
        let mut charts = Vec::new();
        for (topic, records) in suite.topics().iter() {
            let mut chart = Chart::new(suite.name(), topic, records.to_vec());
            if self.assign_renderer(&mut chart) {
                charts.push(chart);
            } else {
                info!(
                    suite = %suite.name(),
                    topic = %topic,
                    "no renderer for topic; chart omitted"
                );
            }
        }
        charts
    }

    fn analyze(&self, _suite: &Suite, _report: &mut AnalysisCallback<'_>) -> Option<String> {
        None
    }
}

/// Registration entry: a handler type's predicate and constructors.
#[derive(Clone, Copy)]
pub struct HandlerDescriptor {
    pub name: &'static str,
    pub matches: fn(&Suite) -> bool,
    pub create: fn(&Suite) -> Box<dyn SuiteHandler>,
    pub summarize: fn(&[&Suite]) -> Option<String>,
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

impl HandlerDescriptor {
    pub fn of<H: SuiteHandler + 'static>(name: &'static str) -> Self {
        Self {
            name,
            matches: H::matches,
            create: create_boxed::<H>,
            summarize: H::summarize,
        }
    }
}

fn create_boxed<H: SuiteHandler + 'static>(suite: &Suite) -> Box<dyn SuiteHandler> {
    Box::new(H::create(suite))
}

/// Ordered registry of suite handlers. Registration order is precedence.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<HandlerDescriptor>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers shipped with suitechart.
    pub fn builtin() -> Self {
        Self::new()
            .register::<BufferStorageHandler>(buffer_storage::NAME)
            .register::<MemoryAllocationHandler>(memory_allocation::NAME)
            .register::<TemperatureHandler>(temperature::NAME)
    }

    pub fn register<H: SuiteHandler + 'static>(self, name: &'static str) -> Self {
        self.with_descriptor(HandlerDescriptor::of::<H>(name))
    }

    pub fn with_descriptor(mut self, descriptor: HandlerDescriptor) -> Self {
        self.handlers.push(descriptor);
        self
    }

    pub fn descriptors(&self) -> &[HandlerDescriptor] {
        &self.handlers
    }

    /// First descriptor whose predicate accepts `suite`.
    pub fn find(&self, suite: &Suite) -> Option<&HandlerDescriptor> {
        self.handlers
            .iter()
            .find(|descriptor| (descriptor.matches)(suite))
    }

    pub fn dispatch(&self, suite: &Suite) -> Option<Box<dyn SuiteHandler>> {
        self.find(suite).map(|descriptor| (descriptor.create)(suite))
    }

    /// Cross-suite rollups, one per handler type that offers one, in
    /// registration order.
    pub fn summaries(&self, suites: &[Suite]) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        for descriptor in &self.handlers {
            let bound: Vec<&Suite> = suites
                .iter()
                .filter(|suite| suite.registered_as() == Some(descriptor.name))
                .collect();
            if bound.is_empty() {
                continue;
            }
            if let Some(summary) = (descriptor.summarize)(&bound) {
                out.push((descriptor.name, summary));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    struct PrefixHandler;

    impl SuiteHandler for PrefixHandler {
        fn matches(suite: &Suite) -> bool {
            suite.name().starts_with("Memory")
        }

        fn create(_suite: &Suite) -> Self {
            PrefixHandler
        }

        fn summarize(suites: &[&Suite]) -> Option<String> {
            Some(format!("{} prefixed suite(s)", suites.len()))
        }

        fn name(&self) -> &'static str {
            "prefix"
        }

        fn assign_renderer(&self, _chart: &mut Chart) -> bool {
            false
        }
    }

    fn suite(name: &str) -> Suite {
        Suite::new(
            name,
            "log.csv",
            None,
            vec![CanonicalRecord::new(
                name,
                "MemoryAllocOperation",
                "total_allocation_bytes",
                0,
                Value::Int(1),
            )],
        )
    }

    #[test]
    fn registration_order_decides_overlapping_predicates() {
        let first = HandlerRegistry::new()
            .register::<PrefixHandler>("prefix")
            .register::<MemoryAllocationHandler>(memory_allocation::NAME);
        let second = HandlerRegistry::new()
            .register::<MemoryAllocationHandler>(memory_allocation::NAME)
            .register::<PrefixHandler>("prefix");

        let target = suite("Memory allocation");
        assert_eq!(first.dispatch(&target).unwrap().name(), "prefix");
        assert_eq!(
            second.dispatch(&target).unwrap().name(),
            memory_allocation::NAME
        );
    }

    #[test]
    fn dispatch_is_deterministic() {
        let registry = HandlerRegistry::builtin();
        let target = suite("Memory allocation");
        let names: Vec<&str> = (0..5)
            .map(|_| registry.dispatch(&target).unwrap().name())
            .collect();
        assert!(names.iter().all(|name| *name == memory_allocation::NAME));
        assert!(registry.dispatch(&suite("Unknown workload")).is_none());
    }

    #[test]
    fn builtin_registry_order() {
        let names: Vec<&str> = HandlerRegistry::builtin()
            .descriptors()
            .iter()
            .map(|descriptor| descriptor.name)
            .collect();
        assert_eq!(
            names,
            vec![
                buffer_storage::NAME,
                memory_allocation::NAME,
                temperature::NAME
            ]
        );
    }

    #[test]
    fn summaries_follow_registration_name() {
        let registry = HandlerRegistry::new().register::<PrefixHandler>("memory-prefix");
        let mut suites = vec![suite("Memory allocation"), suite("Memory pressure")];
        for target in &mut suites {
            assert!(target.bind(&registry));
        }
        assert_eq!(suites[0].handler_name(), Some("prefix"));
        assert_eq!(suites[0].registered_as(), Some("memory-prefix"));
        assert_eq!(
            registry.summaries(&suites),
            vec![("memory-prefix", "2 prefixed suite(s)".to_string())]
        );
    }

    #[test]
    fn default_build_charts_omits_unrendered_topics() {
        let mut target = suite("Memory leak probe");
        let registry = HandlerRegistry::new().register::<PrefixHandler>("prefix");
        assert!(target.bind(&registry));
        assert_eq!(target.handler_name(), Some("prefix"));
        assert!(target.charts().is_empty());
    }
}
