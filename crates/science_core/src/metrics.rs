//! Snapshot metrics computed from `GameState`.
//!
//! A single `compute_metrics(&GameState) -> MetricsSnapshot` function samples
//! the current state for time-series analysis. No state mutation, no IO.

use std::io::Write;

use serde::Serialize;

use crate::{ExperimentStatus, GameState};

/// Current schema version; bump when fields are added/removed/reordered.
const METRICS_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub tick: u64,
    pub metrics_version: u32,
    pub time: f32,

    // Lifecycle phases (all vessels combined)
    pub experiments_total: u32,
    pub experiments_idle: u32,
    pub experiments_waiting: u32,
    pub experiments_paused: u32,
    pub experiments_researching: u32,
    pub experiments_capped: u32,
    pub experiments_analyzing: u32,
    pub experiments_transmitting: u32,
    pub experiments_completed: u32,
    pub experiments_failed: u32,

    // Data
    pub total_current_data: f32,
    pub total_data_to_send: f32,
    pub total_transmitted_packets: f32,

    // Value
    pub science_transmitted: f32,
    pub science_recovered: f32,
    pub pending_recovery_value: f32,

    // Vessels
    pub channels_claimed: u32,
    pub resource_stock: f32,
}

#[allow(clippy::cast_possible_truncation)]
pub fn compute_metrics(state: &GameState) -> MetricsSnapshot {
    let mut snapshot = MetricsSnapshot {
        tick: state.meta.tick,
        metrics_version: METRICS_VERSION,
        time: state.meta.time,
        science_transmitted: state.ledger.transmitted,
        science_recovered: state.ledger.recovered,
        ..MetricsSnapshot::default()
    };

    for vessel in state.vessels.values() {
        snapshot.channels_claimed += vessel
            .channels
            .iter()
            .filter(|channel| channel.claimed_by.is_some())
            .count() as u32;
        snapshot.resource_stock += vessel.resources.pools.values().map(|pool| pool.amount).sum::<f32>();

        for experiment in &vessel.experiments {
            let runtime = &experiment.runtime;
            snapshot.experiments_total += 1;
            snapshot.total_current_data += runtime.current_data;
            snapshot.total_data_to_send += runtime.data_to_send;
            snapshot.total_transmitted_packets += runtime.transmitted_packets;
            snapshot.pending_recovery_value += runtime.recovery_value;
            *phase_counter(&mut snapshot, runtime.status) += 1;
        }
    }
    snapshot
}

fn phase_counter(snapshot: &mut MetricsSnapshot, status: ExperimentStatus) -> &mut u32 {
    use ExperimentStatus as S;
    match status {
        S::Unknown | S::Idle => &mut snapshot.experiments_idle,
        S::ConditionsNotMet | S::ResearchPausedConditionsNotMet => &mut snapshot.experiments_waiting,
        S::Paused | S::PausedConnection => &mut snapshot.experiments_paused,
        S::Researching => &mut snapshot.experiments_researching,
        S::DataCapReached => &mut snapshot.experiments_capped,
        S::ResearchComplete | S::Analyzing | S::AnalysisComplete => {
            &mut snapshot.experiments_analyzing
        }
        S::ReadyToTransmit | S::StartTransmit | S::Transmitting | S::TransmitComplete => {
            &mut snapshot.experiments_transmitting
        }
        S::Completed => &mut snapshot.experiments_completed,
        S::Failed => &mut snapshot.experiments_failed,
    }
}

/// Write the CSV header row for metrics.
pub fn write_metrics_header(writer: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        writer,
        "tick,metrics_version,time,\
         experiments_total,experiments_idle,experiments_waiting,experiments_paused,\
         experiments_researching,experiments_capped,experiments_analyzing,\
         experiments_transmitting,experiments_completed,experiments_failed,\
         total_current_data,total_data_to_send,total_transmitted_packets,\
         science_transmitted,science_recovered,pending_recovery_value,\
         channels_claimed,resource_stock"
    )
}

/// Append a single metrics snapshot as a CSV row.
pub fn append_metrics_row(writer: &mut impl Write, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
    writeln!(
        writer,
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        snapshot.tick,
        snapshot.metrics_version,
        snapshot.time,
        snapshot.experiments_total,
        snapshot.experiments_idle,
        snapshot.experiments_waiting,
        snapshot.experiments_paused,
        snapshot.experiments_researching,
        snapshot.experiments_capped,
        snapshot.experiments_analyzing,
        snapshot.experiments_transmitting,
        snapshot.experiments_completed,
        snapshot.experiments_failed,
        snapshot.total_current_data,
        snapshot.total_data_to_send,
        snapshot.total_transmitted_packets,
        snapshot.science_transmitted,
        snapshot.science_recovered,
        snapshot.pending_recovery_value,
        snapshot.channels_claimed,
        snapshot.resource_stock,
    )
}

/// Write a collection of snapshots to a CSV file.
pub fn write_metrics_csv(path: &std::path::Path, snapshots: &[MetricsSnapshot]) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_metrics_header(&mut file)?;
    for snapshot in snapshots {
        append_metrics_row(&mut file, snapshot)?;
    }
    file.flush()
}

/// Maximum data rows per CSV file before rotating to a new file.
const MAX_ROWS_PER_FILE: usize = 50_000;

/// Rotating metrics CSV writer. Splits into numbered files
/// (`metrics_000.csv`, `metrics_001.csv`, ...) after [`MAX_ROWS_PER_FILE`] rows each.
pub struct MetricsFileWriter {
    run_dir: std::path::PathBuf,
    file_index: u32,
    rows_in_current_file: usize,
    writer: std::io::BufWriter<std::fs::File>,
}

impl MetricsFileWriter {
    pub fn new(run_dir: std::path::PathBuf) -> std::io::Result<Self> {
        let writer = open_csv_file(&run_dir, 0)?;
        Ok(Self {
            run_dir,
            file_index: 0,
            rows_in_current_file: 0,
            writer,
        })
    }

    pub fn write_row(&mut self, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
        if self.rows_in_current_file >= MAX_ROWS_PER_FILE {
            self.writer.flush()?;
            self.file_index += 1;
            self.writer = open_csv_file(&self.run_dir, self.file_index)?;
            self.rows_in_current_file = 0;
        }
        append_metrics_row(&mut self.writer, snapshot)?;
        self.rows_in_current_file += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

fn open_csv_file(
    run_dir: &std::path::Path,
    index: u32,
) -> std::io::Result<std::io::BufWriter<std::fs::File>> {
    let path = run_dir.join(format!("metrics_{index:03}.csv"));
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_metrics_header(&mut writer)?;
    Ok(writer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
