mod scenarios;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand, value_parser};
use directories::ProjectDirs;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::scenarios::{
    FixtureScenario, Sample, default_fixture_scenario, find_fixture_scenario, fixture_scenarios,
};

#[derive(Parser, Debug)]
#[command(name = "suitechart-fixtures", version, about = "Synthetic suite logs for suitechart", long_about = None)]
struct FixturesCli {
    /// Increase logging verbosity.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Directory to write generated logs into.
    #[arg(long, value_parser = value_parser!(PathBuf))]
    output: Option<PathBuf>,

    /// Command to execute.
    #[command(subcommand)]
    command: FixturesCommand,
}

#[derive(Subcommand, Debug)]
enum FixturesCommand {
    /// Write a comma separated log with a header row.
    Csv(GenerateArgs),
    /// Write a line-delimited JSON log led by a build info line.
    Json(GenerateArgs),
    /// List the available scenarios.
    List,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Scenario to generate (defaults to memory-allocation).
    #[arg(long)]
    scenario: Option<String>,

    /// Number of sampling instants (defaults per scenario).
    #[arg(long)]
    samples: Option<u32>,

    /// Milliseconds between sampling instants (defaults per scenario).
    #[arg(long)]
    interval_ms: Option<u64>,
}

impl GenerateArgs {
    fn resolve(&self) -> Result<(&'static FixtureScenario, Vec<Sample>)> {
        let scenario = match &self.scenario {
            Some(name) => find_fixture_scenario(name)
                .ok_or_else(|| anyhow!("unknown scenario '{name}'"))?,
            None => default_fixture_scenario(),
        };
        let samples = self.samples.unwrap_or(scenario.default_samples);
        let interval_ms = self.interval_ms.unwrap_or(scenario.default_interval_ms);
        Ok((scenario, scenario.generate(samples, interval_ms)))
    }
}

#[derive(Serialize)]
struct BuildLine {
    build: BuildFields,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct BuildFields {
    manufacturer: &'static str,
    model: &'static str,
    device: &'static str,
    fingerprint: String,
    sdk_int: u32,
}

#[derive(Serialize)]
struct DatumLine<'a> {
    suite_id: &'a str,
    operation_id: &'a str,
    timestamp: i64,
    field: &'a str,
    value: serde_json::Value,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        "suitechart_fixtures=debug"
    } else {
        "suitechart_fixtures=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = FixturesCli::parse();
    init_tracing(cli.verbose);

    let output_root = cli.output.unwrap_or_else(|| {
        ProjectDirs::from("dev", "suitechart", "SuiteChart")
            .map(|dirs| dirs.data_dir().join("fixtures"))
            .unwrap_or_else(|| PathBuf::from("./fixtures"))
    });

    match &cli.command {
        FixturesCommand::List => {
            for scenario in fixture_scenarios() {
                println!(
                    "{:<18} {} ({} samples every {} ms)",
                    scenario.name,
                    scenario.description,
                    scenario.default_samples,
                    scenario.default_interval_ms
                );
            }
            return Ok(());
        }
        FixturesCommand::Csv(args) => {
            let (scenario, samples) = args.resolve()?;
            let path = prepare_output(&output_root, scenario, "csv")?;
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(scenario, &samples, file)?;
            report_written(scenario, samples.len(), &path);
        }
        FixturesCommand::Json(args) => {
            let (scenario, samples) = args.resolve()?;
            let path = prepare_output(&output_root, scenario, "jsonl")?;
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_json(scenario, &samples, BufWriter::new(file))?;
            report_written(scenario, samples.len(), &path);
        }
    }

    Ok(())
}

fn prepare_output(root: &Path, scenario: &FixtureScenario, extension: &str) -> Result<PathBuf> {
    if let Err(err) = fs::create_dir_all(root) {
        warn!(error = %err, path = %root.display(), "unable to create fixture output directory");
    }
    Ok(root.join(format!("{}.{extension}", scenario.name)))
}

fn report_written(scenario: &FixtureScenario, count: usize, path: &Path) {
    info!(
        scenario = scenario.name,
        records = count,
        path = %path.display(),
        "fixture written"
    );
    println!("{}", path.display());
}

fn write_csv<W: Write>(scenario: &FixtureScenario, samples: &[Sample], sink: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(["suite_id", "timestamp", "operation_id", "token", "value"])?;
    for sample in samples {
        writer.write_record([
            scenario.suite_id,
            sample.timestamp_ns.to_string().as_str(),
            scenario.operation_id,
            sample.field,
            sample.formatted_value().as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<W: Write>(scenario: &FixtureScenario, samples: &[Sample], mut sink: W) -> Result<()> {
    let build = BuildLine {
        build: BuildFields {
            manufacturer: "suitechart",
            model: "synthetic",
            device: scenario.name,
            fingerprint: format!("suitechart/synthetic/{}", Utc::now().format("%Y%m%d")),
            sdk_int: 34,
        },
    };
    serde_json::to_writer(&mut sink, &build)?;
    writeln!(sink)?;

    for sample in samples {
        let value = if sample.integral {
            serde_json::Value::from(sample.value.round() as i64)
        } else {
            serde_json::Value::from(sample.value)
        };
        let line = DatumLine {
            suite_id: scenario.suite_id,
            operation_id: scenario.operation_id,
            timestamp: sample.timestamp_ns,
            field: sample.field,
            value,
        };
        serde_json::to_writer(&mut sink, &line)?;
        writeln!(sink)?;
    }
    sink.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_output_has_header_and_positional_columns() {
        let scenario = find_fixture_scenario("buffer-storage").unwrap();
        let samples = scenario.generate(3, 100);
        let mut buffer = Vec::new();
        write_csv(scenario, &samples, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "suite_id,timestamp,operation_id,token,value");
        assert_eq!(
            lines[1],
            "GLES3 Buffer Storage,200000000,BufferStorageGLES3Operation,buffer_storage.status,0"
        );
    }

    #[test]
    fn json_output_leads_with_build_info() {
        let scenario = find_fixture_scenario("temperature").unwrap();
        let samples = scenario.generate(2, 500);
        let mut buffer = Vec::new();
        write_json(scenario, &samples, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();

        let build: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(build["build"]["MODEL"], "synthetic");
        assert_eq!(build["build"]["SDK_INT"], 34);

        let first: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(first["suite_id"], "Thermal soak");
        assert_eq!(first["field"], "temperature_celsius");
        assert_eq!(first["value"], 42.0);
        assert_eq!(lines.count(), samples.len() - 1);
    }

    #[test]
    fn parses_generate_subcommand() {
        let cli = FixturesCli::parse_from([
            "suitechart-fixtures",
            "--output",
            "/tmp/fixtures",
            "json",
            "--scenario",
            "temperature",
            "--samples",
            "10",
            "--interval-ms",
            "50",
        ]);
        let FixturesCommand::Json(args) = cli.command else {
            panic!("expected json subcommand");
        };
        let (scenario, samples) = args.resolve().unwrap();
        assert_eq!(scenario.name, "temperature");
        assert_eq!(samples.len(), 10 * scenario.series.len());
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/fixtures")));
    }
}
