/// Shape of one synthetic measurement stream.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// `start + step * i`.
    Ramp { start: f64, step: f64 },
    /// Sine around `base`, `period` samples long.
    Wave { base: f64, amplitude: f64, period: u32 },
    /// Alternates between 0 and 1 every `every` samples.
    Toggle { every: u32 },
    /// Emits `value` only on every `every`-th sample.
    Event { every: u32, value: f64 },
    /// Emits `value` once, on the last sample.
    Final { value: f64 },
}

impl Shape {
    pub fn sample(&self, index: u32, samples: u32) -> Option<f64> {
        match *self {
            Shape::Ramp { start, step } => Some(start + step * f64::from(index)),
            Shape::Wave {
                base,
                amplitude,
                period,
            } => {
                let phase = f64::from(index % period.max(1)) / f64::from(period.max(1));
                Some(base + amplitude * (phase * std::f64::consts::TAU).sin())
            }
            Shape::Toggle { every } => Some(f64::from((index / every.max(1)) % 2)),
            Shape::Event { every, value } => {
                let every = every.max(1);
                (index % every == every - 1).then_some(value)
            }
            Shape::Final { value } => (index + 1 == samples).then_some(value),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Series {
    pub field: &'static str,
    pub shape: Shape,
    /// Write values without a fractional part.
    pub integral: bool,
}

#[derive(Debug, Clone)]
pub struct FixtureScenario {
    pub name: &'static str,
    pub description: &'static str,
    pub suite_id: &'static str,
    pub operation_id: &'static str,
    pub default_samples: u32,
    pub default_interval_ms: u64,
    pub series: &'static [Series],
}

const MB: f64 = 1024.0 * 1024.0;

const FIXTURE_SCENARIOS: &[FixtureScenario] = &[
    FixtureScenario {
        name: "memory-allocation",
        description: "Allocation stress with trim notifications and frees.",
        suite_id: "Memory allocation",
        operation_id: "MemoryAllocOperation",
        default_samples: 60,
        default_interval_ms: 250,
        series: &[
            Series {
                field: "total_allocation_bytes",
                shape: Shape::Ramp {
                    start: 0.0,
                    step: 16.0 * MB,
                },
                integral: true,
            },
            Series {
                field: "sys_mem_info.available_memory",
                shape: Shape::Ramp {
                    start: 3072.0 * MB,
                    step: -16.0 * MB,
                },
                integral: true,
            },
            Series {
                field: "sys_mem_info.low_memory",
                shape: Shape::Toggle { every: 20 },
                integral: true,
            },
            Series {
                field: "sys_mem_info.oom_score",
                shape: Shape::Ramp {
                    start: 0.0,
                    step: 5.0,
                },
                integral: true,
            },
            Series {
                field: "on_trim_level",
                shape: Shape::Event {
                    every: 15,
                    value: 15.0,
                },
                integral: true,
            },
            Series {
                field: "is_free",
                shape: Shape::Event {
                    every: 10,
                    value: 1.0,
                },
                integral: true,
            },
        ],
    },
    FixtureScenario {
        name: "buffer-storage",
        description: "GLES3 buffer storage compliance run reporting one status code.",
        suite_id: "GLES3 Buffer Storage",
        operation_id: "BufferStorageGLES3Operation",
        default_samples: 5,
        default_interval_ms: 100,
        series: &[Series {
            field: "buffer_storage.status",
            shape: Shape::Final { value: 0.0 },
            integral: true,
        }],
    },
    FixtureScenario {
        name: "temperature",
        description: "Thermal soak with a temperature excursion and fan noise.",
        suite_id: "Thermal soak",
        operation_id: "ThermalOperation",
        default_samples: 120,
        default_interval_ms: 500,
        series: &[
            Series {
                field: "temperature_celsius",
                shape: Shape::Wave {
                    base: 42.0,
                    amplitude: 6.0,
                    period: 60,
                },
                integral: false,
            },
            Series {
                field: "thermal_status",
                shape: Shape::Toggle { every: 30 },
                integral: true,
            },
            Series {
                field: "fan_rpm",
                shape: Shape::Wave {
                    base: 2400.0,
                    amplitude: 300.0,
                    period: 20,
                },
                integral: true,
            },
        ],
    },
];

pub fn default_fixture_scenario() -> &'static FixtureScenario {
    &FIXTURE_SCENARIOS[0]
}

pub fn fixture_scenarios() -> &'static [FixtureScenario] {
    FIXTURE_SCENARIOS
}

pub fn find_fixture_scenario(name: &str) -> Option<&'static FixtureScenario> {
    let needle = name.trim();
    if needle.is_empty() {
        return None;
    }
    FIXTURE_SCENARIOS
        .iter()
        .find(|scenario| scenario.name.eq_ignore_ascii_case(needle))
}

/// One generated measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp_ns: i64,
    pub field: &'static str,
    pub value: f64,
    pub integral: bool,
}

impl Sample {
    pub fn formatted_value(&self) -> String {
        if self.integral {
            format!("{}", self.value.round() as i64)
        } else {
            format!("{:.2}", self.value)
        }
    }
}

impl FixtureScenario {
    /// Samples in timestamp order, series order within one instant.
    pub fn generate(&self, samples: u32, interval_ms: u64) -> Vec<Sample> {
        let interval_ns = i64::try_from(interval_ms)
            .unwrap_or(i64::MAX / 1_000_000)
            .saturating_mul(1_000_000);
        let mut out = Vec::new();
        for index in 0..samples {
            let timestamp_ns = interval_ns.saturating_mul(i64::from(index));
            for series in self.series {
                if let Some(value) = series.shape.sample(index, samples) {
                    out.push(Sample {
                        timestamp_ns,
                        field: series.field,
                        value,
                        integral: series.integral,
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(
            find_fixture_scenario(" Temperature ").map(|s| s.name),
            Some("temperature")
        );
        assert!(find_fixture_scenario("").is_none());
        assert!(find_fixture_scenario("unknown").is_none());
        assert_eq!(default_fixture_scenario().name, "memory-allocation");
        assert_eq!(fixture_scenarios().len(), 3);
    }

    #[test]
    fn events_fire_periodically() {
        let scenario = find_fixture_scenario("memory-allocation").unwrap();
        let samples = scenario.generate(30, 100);
        let trims: Vec<i64> = samples
            .iter()
            .filter(|sample| sample.field == "on_trim_level")
            .map(|sample| sample.timestamp_ns)
            .collect();
        assert_eq!(trims, vec![1_400_000_000, 2_900_000_000]);
    }

    #[test]
    fn status_is_reported_once_at_the_end() {
        let scenario = find_fixture_scenario("buffer-storage").unwrap();
        let samples = scenario.generate(5, 100);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp_ns, 400_000_000);
        assert_eq!(samples[0].formatted_value(), "0");
    }
}
