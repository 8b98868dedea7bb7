//! Synthetic sensor readings and host health sampling for the live feed.

use chrono::Utc;
use parking_lot::Mutex;
use sysinfo::System;

use crate::events::{NetworkStats, SensorReading, SystemHealthSnapshot};
use crate::protocol_constants::{SYNTHETIC_LATENCY_MS, SYNTHETIC_SENSOR_COUNT};
use crate::utils::{pick, rand_float, rand_int, round2};

/// Sensor kind with its value range and unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorKind {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
}

pub const SENSOR_KINDS: [SensorKind; 6] = [
    SensorKind {
        name: "temperature",
        min: 15.0,
        max: 80.0,
        unit: "°C",
    },
    SensorKind {
        name: "humidity",
        min: 30.0,
        max: 90.0,
        unit: "%",
    },
    SensorKind {
        name: "gas",
        min: 0.0,
        max: 400.0,
        unit: "ppm",
    },
    SensorKind {
        name: "vibration",
        min: 0.0,
        max: 20.0,
        unit: "mm/s",
    },
    SensorKind {
        name: "pressure",
        min: 1.0,
        max: 9.0,
        unit: "bar",
    },
    SensorKind {
        name: "noise",
        min: 40.0,
        max: 110.0,
        unit: "dB",
    },
];

/// Draws one random sensor reading.
pub fn sensor_reading() -> SensorReading {
    let kind = pick(&SENSOR_KINDS).copied().unwrap_or(SENSOR_KINDS[0]);
    SensorReading {
        sensor_id: format!("SNS-{:04}", rand_int(1, SYNTHETIC_SENSOR_COUNT)),
        sensor_type: kind.name.to_string(),
        value: rand_float(kind.min, kind.max),
        unit: kind.unit.to_string(),
        timestamp: Utc::now(),
    }
}

/// Samples host CPU and memory utilisation.
///
/// CPU usage is a delta between refreshes, so the sampler keeps one
/// [`System`] alive across heartbeats. The first sample reads 0%.
pub struct SystemHealthSampler {
    system: Mutex<System>,
}

impl SystemHealthSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }

    pub fn sample(&self) -> SystemHealthSnapshot {
        let (cpu, memory) = {
            let mut system = self.system.lock();
            system.refresh_cpu();
            system.refresh_memory();

            let cpus = system.cpus();
            let cpu = if cpus.is_empty() {
                0.0
            } else {
                cpus.iter().map(|c| f64::from(c.cpu_usage())).sum::<f64>() / cpus.len() as f64
            };
            let total = system.total_memory();
            let memory = if total > 0 {
                (system.used_memory() as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            (cpu.clamp(0.0, 100.0), memory.clamp(0.0, 100.0))
        };

        SystemHealthSnapshot {
            timestamp: Utc::now(),
            cpu: round2(cpu),
            memory: memory.round() as u32,
            network: NetworkStats {
                latency: rand_int(SYNTHETIC_LATENCY_MS.0, SYNTHETIC_LATENCY_MS.1),
            },
        }
    }
}

impl Default for SystemHealthSampler {
    fn default() -> Self {
        Self::new()
    }
}
