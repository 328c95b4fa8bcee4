use std::fs;

use suitechart::ChartPipeline;
use suitechart::RenderRequest;
use suitechart::config::{BackendKind, Settings, WindowPolicy};
use suitechart::handler::HandlerRegistry;
use suitechart::ingest::{DiagnosticKind, load_report};
use suitechart::orchestrator::{ChartFilter, Composition, RenderOrchestrator};
use suitechart::render::Mark;
use tempfile::tempdir;

const MEMORY_LOG: &str = "\
suite_id;timestamp;operation_id;token;value;note
Memory allocation;1000000000;MemoryAllocOperation;total_allocation_bytes;1048576;
Memory allocation;2000000000;MemoryAllocOperation;on_trim_level;5;critical
Memory allocation;3000000000;MemoryAllocOperation;total_allocation_bytes;2097152;
Memory allocation;oops;MemoryAllocOperation;total_allocation_bytes;1;
Memory allocation;7000000000;MemoryAllocOperation;sys_mem_info.low_memory;true;
Unknown suite;1000000000;Whatever;metric;1;
";

#[test]
fn semicolon_log_flows_through_to_a_stacked_figure() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("memory.csv");
    fs::write(&path, MEMORY_LOG).unwrap();

    let report = load_report(&path, None, &HandlerRegistry::builtin()).unwrap();
    assert_eq!(report.suites.len(), 2);
    assert_eq!(report.diagnostics_of(DiagnosticKind::Parse).count(), 1);
    assert_eq!(report.diagnostics_of(DiagnosticKind::UnhandledSuite).count(), 1);

    let suite = report.suite("Memory allocation").unwrap();
    let trim = suite
        .entries()
        .iter()
        .find(|record| record.field == "on_trim_level")
        .unwrap();
    assert_eq!(
        trim.custom_field("note").map(|value| value.to_string()),
        Some("critical".to_string())
    );

    let orchestrator = RenderOrchestrator::new(Settings::default().plot);
    let Composition::Figure(figure) =
        orchestrator.compose_suite(suite, None, &ChartFilter::default())
    else {
        panic!("expected a figure");
    };
    assert_eq!(figure.title, "Memory allocation");
    assert_eq!(figure.window, (1.0, 7.0));
    assert_eq!(figure.panels.len(), 3);
    assert_eq!(figure.panels[0].x_range, (0.0, 6.0));
    assert!(figure.panels[2].show_x_axis);
    assert!(!figure.panels[0].show_x_axis);
    assert!(matches!(
        figure.panels[1].marks[0],
        Mark::VerticalRule { x, .. } if x == 1.0
    ));
}

#[test]
fn window_policy_changes_alignment_of_filtered_figures() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("memory.csv");
    fs::write(&path, MEMORY_LOG).unwrap();
    let report = load_report(&path, None, &HandlerRegistry::builtin()).unwrap();
    let suite = report.suite("Memory allocation").unwrap();
    let only_allocations = ChartFilter::new(vec!["total_allocation".into()], Vec::new());

    let all = RenderOrchestrator::new(Settings::default().plot);
    let Composition::Figure(wide) = all.compose_suite(suite, None, &only_allocations) else {
        panic!("expected a figure");
    };
    assert_eq!(wide.window, (1.0, 7.0));

    let filtered = RenderOrchestrator::new(Settings::default().plot)
        .with_window_policy(WindowPolicy::FilteredCharts);
    let Composition::Figure(narrow) = filtered.compose_suite(suite, None, &only_allocations)
    else {
        panic!("expected a figure");
    };
    assert_eq!(narrow.window, (1.0, 3.0));
}

#[test]
fn json_report_renders_through_the_text_backend() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("run.log");
    fs::write(
        &path,
        concat!(
            r#"{"DEVICE":"redfin","MANUFACTURER":"Google","MODEL":"Pixel 5","SDK_INT":33}"#,
            "\n",
            r#"{"suite_id":"GLES3 Buffer Storage","operation_id":"BufferStorageGLES3Operation","timestamp":5,"custom":{"buffer_storage":{"status":2}}}"#,
            "\n",
            r#"{"suite_id":"Thermal soak","operation_id":"ThermalOperation","timestamp":0,"field":"temperature_celsius","value":40}"#,
            "\n",
            r#"{"suite_id":"Thermal soak","operation_id":"ThermalOperation","timestamp":2000000000,"field":"temperature_celsius","value":48.5}"#,
            "\n",
        ),
    )
    .unwrap();

    let mut settings = Settings::default();
    settings.plot.backend = BackendKind::Text;
    let pipeline = ChartPipeline::from_settings(settings);
    let report = pipeline.load(&path, None).unwrap();
    assert_eq!(
        report.build.as_ref().and_then(|build| build.model.as_deref()),
        Some("Pixel 5")
    );

    let storage = report.suite("GLES3 Buffer Storage").unwrap();
    assert_eq!(storage.handler_name(), Some("buffer-storage"));
    let mut messages = Vec::new();
    let verdict = storage.analyze(&mut |_, _, message| messages.push(message.to_string()));
    assert_eq!(verdict.as_deref(), Some("UNAVAILABLE"));
    assert_eq!(messages, vec!["Feature not found in OpenGL ES driver library."]);

    let summaries = pipeline.handlers().summaries(&report.suites);
    let names: Vec<&str> = summaries.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["buffer-storage", "temperature"]);

    let rendered = pipeline
        .render_report(&report, &RenderRequest::default())
        .unwrap();
    assert_eq!(rendered.len(), 2);
    assert!(rendered.iter().all(|item| item.diagnostic().is_none()));

    let orchestrator = RenderOrchestrator::new(Settings::default().plot);
    let Composition::Figure(verdict) =
        orchestrator.compose_suite(storage, None, &ChartFilter::default())
    else {
        panic!("expected a verdict figure");
    };
    assert_eq!(verdict.panels.len(), 1);
    assert!(matches!(
        &verdict.panels[0].marks[0],
        Mark::Line { label, .. } if label == "UNAVAILABLE"
    ));
}
