//! Read/write `fake_rates.json`.
//!
//! The file maps object names to `domain::ObjectResult` and is pretty printed
//! with four-space indentation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::domain::FakeRateFile;
use crate::error::AppError;

/// Write a fake-rate JSON file.
pub fn write_fake_rates_json(path: &Path, results: &FakeRateFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create fake-rate JSON '{}': {e}", path.display()))
    })?;
    let mut writer = BufWriter::new(file);

    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    results
        .serialize(&mut ser)
        .map_err(|e| AppError::new(2, format!("Failed to write fake-rate JSON: {e}")))?;
    writeln!(writer)
        .and_then(|_| writer.flush())
        .map_err(|e| AppError::new(2, format!("Failed to write fake-rate JSON: {e}")))?;

    Ok(())
}

/// Read a fake-rate JSON file.
pub fn read_fake_rates_json(path: &Path) -> Result<FakeRateFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open fake-rate JSON '{}': {e}", path.display()))
    })?;
    let results: FakeRateFile = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid fake-rate JSON '{}': {e}", path.display())))?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::domain::{ChannelSummary, FitVars, ObjectResult};

    fn sample() -> FakeRateFile {
        let mut types = BTreeMap::new();
        types.insert(
            "SingleMu_Wjets".to_string(),
            ChannelSummary {
                num: 12.0,
                denom: 100.0,
                ndof: 7,
                chi2_ndf: 1.25,
            },
        );
        let vars = FitVars {
            scale: 3.141592653589793,
            mu: 17.25,
            sigma: 1.9e-3,
            offset: 1.0 / 3.0,
        };
        let mut out = FakeRateFile::new();
        out.insert(
            "mu".to_string(),
            ObjectResult {
                types,
                combined_num: 12.0,
                combined_denom: 100.0,
                combined_eff: 0.12,
                vars,
                fit_status: 0,
                raw_func: "scale*TMath::Landau(jetPt,mu,sigma,0)+offset".to_string(),
                fitted_func: "x".to_string(),
            },
        );
        out
    }

    #[test]
    fn round_trip_preserves_values_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake_rates.json");
        write_fake_rates_json(&path, &sample()).unwrap();
        let back = read_fake_rates_json(&path).unwrap();
        assert_eq!(back, sample());
        assert_eq!(back["mu"].vars.offset.to_bits(), (1.0f64 / 3.0).to_bits());
    }

    #[test]
    fn uses_four_space_indentation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake_rates.json");
        write_fake_rates_json(&path, &sample()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"mu\": {\n        \"types\""), "{text}");
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = read_fake_rates_json(Path::new("/nonexistent/fake_rates.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
