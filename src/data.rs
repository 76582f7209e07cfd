//! Sensor log ingestion
//!
//! One record per line, whitespace separated:
//!
//! ```text
//! L px py timestamp [gt_px gt_py gt_vx gt_vy [gt_yaw gt_yawrate]]
//! R rho phi rho_dot timestamp [gt_px gt_py gt_vx gt_vy [gt_yaw gt_yawrate]]
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Files ending in `.gz`
//! are decompressed while reading.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::types::{GroundTruth, MeasurementPackage};

/// A parsed log line
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub measurement: MeasurementPackage,
    pub ground_truth: Option<GroundTruth>,
}

pub fn load_log(path: &Path) -> Result<Vec<LogRecord>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let records = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        read_records(BufReader::new(GzDecoder::new(file)))
    } else {
        read_records(BufReader::new(file))
    };
    records.with_context(|| format!("reading {}", path.display()))
}

pub fn read_records<R: Read>(reader: BufReader<R>) -> Result<Vec<LogRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if let Some(record) =
            parse_line(&line).with_context(|| format!("line {line_no}: {:?}", line.trim()))?
        {
            records.push(record);
        }
    }
    Ok(records)
}

/// Parse one line. `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<LogRecord>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let tag = fields.next().ok_or_else(|| anyhow!("empty record"))?;
    let rest: Vec<&str> = fields.collect();

    let (measurement, tail) = match tag {
        "L" => {
            let [px, py] = floats::<2>(&rest, "laser")?;
            let timestamp = timestamp_at(&rest, 2)?;
            (MeasurementPackage::laser(timestamp, px, py), &rest[3..])
        }
        "R" => {
            let [rho, phi, rho_dot] = floats::<3>(&rest, "radar")?;
            let timestamp = timestamp_at(&rest, 3)?;
            (
                MeasurementPackage::radar(timestamp, rho, phi, rho_dot),
                &rest[4..],
            )
        }
        other => bail!("unknown sensor tag {other:?}"),
    };

    Ok(Some(LogRecord {
        measurement,
        ground_truth: ground_truth(tail)?,
    }))
}

fn floats<const N: usize>(fields: &[&str], what: &str) -> Result<[f64; N]> {
    if fields.len() < N + 1 {
        bail!(
            "{what} record needs {} fields after the tag, found {}",
            N + 1,
            fields.len()
        );
    }
    let mut out = [0.0; N];
    for (slot, field) in out.iter_mut().zip(fields) {
        *slot = parse_f64(field)?;
    }
    Ok(out)
}

fn timestamp_at(fields: &[&str], idx: usize) -> Result<i64> {
    let field = fields[idx];
    field
        .parse::<i64>()
        .with_context(|| format!("invalid timestamp {field:?}"))
}

fn parse_f64(field: &str) -> Result<f64> {
    field
        .parse::<f64>()
        .with_context(|| format!("invalid number {field:?}"))
}

fn ground_truth(fields: &[&str]) -> Result<Option<GroundTruth>> {
    let values = fields
        .iter()
        .map(|f| parse_f64(f))
        .collect::<Result<Vec<_>>>()?;
    match values.as_slice() {
        [] => Ok(None),
        [px, py, vx, vy] => Ok(Some(GroundTruth {
            px: *px,
            py: *py,
            vx: *vx,
            vy: *vy,
            yaw: None,
            yaw_rate: None,
        })),
        [px, py, vx, vy, yaw, yaw_rate] => Ok(Some(GroundTruth {
            px: *px,
            py: *py,
            vx: *vx,
            vy: *vy,
            yaw: Some(*yaw),
            yaw_rate: Some(*yaw_rate),
        })),
        other => bail!("expected 0, 4 or 6 ground truth values, found {}", other.len()),
    }
}
