// src/output.rs
use crate::calibration::CalibrationResult;
use crate::mc::simulator::PathResult;
use crate::models::heston::PARAM_NAMES;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// One row per (path, day): `path_id,day,price[,variance]`
pub fn write_paths_to_csv<P: AsRef<Path>>(filename: P, result: &PathResult) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);

    match &result.variances {
        Some(_) => writeln!(file, "path_id,day,price,variance")?,
        None => writeln!(file, "path_id,day,price")?,
    }

    for ((path_id, day), price) in result.prices.indexed_iter() {
        match &result.variances {
            Some(variances) => writeln!(
                file,
                "{},{},{},{}",
                path_id,
                day,
                price,
                variances[[path_id, day]]
            )?,
            None => writeln!(file, "{},{},{}", path_id, day, price)?,
        }
    }

    file.flush()
}

pub fn write_summary_to_csv<P: AsRef<Path>>(filename: P, summary_data: &[(&str, String)]) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    for (key, value) in summary_data {
        writeln!(file, "{},{}", key, value)?;
    }
    file.flush()
}

/// Fitted parameters and fit quality as `key,value` lines
pub fn write_calibration_summary<P: AsRef<Path>>(
    filename: P,
    result: &CalibrationResult,
) -> io::Result<()> {
    let mut rows: Vec<(&str, String)> = PARAM_NAMES
        .iter()
        .zip(result.params.to_array())
        .map(|(name, value)| (*name, value.to_string()))
        .collect();
    rows.push(("sse", result.sse.to_string()));
    rows.push(("rmse", result.rmse().to_string()));
    rows.push(("converged", result.converged.to_string()));
    rows.push(("termination", format!("{:?}", result.termination)));
    rows.push(("evaluations", result.evaluations.to_string()));
    rows.push(("seed", result.seed.to_string()));
    write_summary_to_csv(filename, &rows)
}
