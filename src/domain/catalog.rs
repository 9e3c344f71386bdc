//! The built-in object catalog.
//!
//! Eight fake-rate objects, each combining a few control regions. Every object
//! `X` is also duplicated as `X_barrel` and `X_endcap`, reading the
//! eta-restricted histograms `<histo>_barrel` / `<histo>_endcap`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;

use crate::domain::{ChannelScenario, FileRole, ObjectCatalog, ObjectConfig};
use crate::error::AppError;
use crate::models::FitFunction;

/// Detector regions used for the eta split, in output order.
pub const ETA_REGIONS: [&str; 2] = ["barrel", "endcap"];

const MU_LABEL: &str = "Jet #rightarrow #mu fake rate";
const E_LABEL: &str = "Jet #rightarrow e fake rate";
const TAU_LABEL: &str = "Jet #rightarrow #tau fake rate";

fn channel(title: &str, file: FileRole, histo: &str, rebin: usize, exclude: bool) -> ChannelScenario {
    ChannelScenario {
        title: title.to_string(),
        file,
        histo: histo.to_string(),
        rebin,
        exclude,
    }
}

fn object(
    scenarios: Vec<(&str, ChannelScenario)>,
    rebin: usize,
    fit_label: &str,
    label: &str,
) -> ObjectConfig {
    ObjectConfig {
        scenarios: scenarios
            .into_iter()
            .map(|(name, s)| (name.to_string(), s))
            .collect(),
        rebin,
        function: FitFunction::LandauPlusOffset,
        label: label.to_string(),
        fit_label: fit_label.to_string(),
    }
}

/// The eight base objects, without the eta split.
pub fn base_catalog() -> ObjectCatalog {
    use FileRole::{SingleMu, Trilepton};

    let wjets_mu = || channel("W+jet_{#mu} (Single Mu)", SingleMu, "mu", 5, false);
    let zmm_mu = || channel("Z#mu #mu + jet_{#mu} (Double Mu)", Trilepton, "mu", 5, false);
    let zmm_tau = || channel("Z#mu#mu + jet_{#tau}", Trilepton, "tau", 1, false);
    let qcd_tau = || channel("QCD + jet_{#tau}", Trilepton, "tauQCD", 1, false);

    let mut catalog = BTreeMap::new();
    catalog.insert(
        "mu".to_string(),
        object(
            vec![
                ("SingleMu_Wjets", wjets_mu()),
                ("SingleMu_QCD", channel("QCD (Single Mu)", SingleMu, "muQCD", 1, true)),
                ("TriLep_ZMM", zmm_mu()),
            ],
            2,
            "EWK Fit",
            MU_LABEL,
        ),
    );
    catalog.insert(
        "muQCD".to_string(),
        object(
            vec![
                ("SingleMu_Wjets", ChannelScenario { exclude: true, ..wjets_mu() }),
                ("SingleMu_QCD", channel("QCD (Single Mu)", SingleMu, "muQCD", 1, false)),
                ("TriLep_ZMM", ChannelScenario { exclude: true, ..zmm_mu() }),
                ("TriLep_ZEE", channel("Zee + jet_{#mu} (Double Elec)", Trilepton, "muZEE", 5, true)),
                ("Trilep_QCD", channel("QCD (Double Mu)", Trilepton, "muQCD", 5, false)),
            ],
            1,
            "QCD Fit",
            MU_LABEL,
        ),
    );
    catalog.insert(
        "muHighPt".to_string(),
        object(
            vec![
                ("SingleMu_Wjets", channel("W+jet_{#mu} (Single Mu)", SingleMu, "muHighPt", 5, false)),
                ("SingleMu_QCD", channel("QCD (Single Mu)", SingleMu, "muQCDHighPt", 5, true)),
            ],
            5,
            "Combined Fit",
            MU_LABEL,
        ),
    );
    catalog.insert(
        "muHighPtQCDOnly".to_string(),
        object(
            vec![("SingleMu_QCD", channel("QCD (Single Mu)", SingleMu, "muQCDHighPt", 5, false))],
            5,
            "QCD Fit",
            MU_LABEL,
        ),
    );
    catalog.insert(
        "eMIT".to_string(),
        object(
            vec![
                ("SingleMu_Wjets", channel("W+jet_{#mu} (Single Mu)", SingleMu, "eMIT", 5, false)),
                ("SingleMu_QCD", channel("QCD (Single Mu)", SingleMu, "eQCDMIT", 1, true)),
                ("TriLep_ZMM", channel("Z#mu#mu + jet_{e}", Trilepton, "eMuEG", 10, false)),
            ],
            5,
            "Wjets Fit",
            E_LABEL,
        ),
    );
    catalog.insert(
        "eMITQCD".to_string(),
        object(
            vec![("SingleMu_QCD", channel("QCD (Single Mu)", SingleMu, "eQCDMIT", 1, false))],
            1,
            "QCD Fit",
            E_LABEL,
        ),
    );
    catalog.insert(
        "tau".to_string(),
        object(
            vec![
                ("TriLep_ZMM", zmm_tau()),
                ("TriLep_AntiIsoMM", channel("QCD + jet_{#tau}", Trilepton, "tauQCD", 2, true)),
                ("SingleMu_Wjets", channel("W #mu #nu + jet_{#tau}", SingleMu, "tau", 2, true)),
            ],
            1,
            "Zjets Fit",
            TAU_LABEL,
        ),
    );
    catalog.insert(
        "tauQCD".to_string(),
        object(
            vec![
                ("TriLep_AntiIsoMM", qcd_tau()),
                ("TriLep_ZMM", ChannelScenario { exclude: true, ..zmm_tau() }),
            ],
            1,
            "QCD Fit",
            TAU_LABEL,
        ),
    );
    catalog
}

/// Add `X_barrel` / `X_endcap` copies of every object in `base`.
///
/// The copies are identical except that each channel's histogram stem gains
/// the region suffix.
pub fn with_eta_split(base: ObjectCatalog) -> ObjectCatalog {
    let mut out = base.clone();
    for (name, config) in &base {
        for region in ETA_REGIONS {
            let mut copy = config.clone();
            for scenario in copy.scenarios.values_mut() {
                scenario.histo = format!("{}_{region}", scenario.histo);
            }
            debug!("Added {name}_{region}");
            out.insert(format!("{name}_{region}"), copy);
        }
    }
    out
}

/// Built-in catalog including the eta split.
pub fn builtin_catalog() -> ObjectCatalog {
    with_eta_split(base_catalog())
}

/// Load a catalog from JSON. The file is used as given (no eta split).
pub fn load_catalog(path: &Path) -> Result<ObjectCatalog, AppError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::new(2, format!("Failed to read object catalog '{}': {e}", path.display()))
    })?;
    let catalog: ObjectCatalog = serde_json::from_str(&text).map_err(|e| {
        AppError::new(2, format!("Invalid object catalog '{}': {e}", path.display()))
    })?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// Reject configurations the pipeline cannot process.
pub fn validate_catalog(catalog: &ObjectCatalog) -> Result<(), AppError> {
    if catalog.is_empty() {
        return Err(AppError::new(2, "Object catalog is empty."));
    }
    for (name, config) in catalog {
        if config.rebin == 0 {
            return Err(AppError::new(2, format!("Object '{name}': rebin must be >= 1.")));
        }
        if config.scenarios.is_empty() {
            return Err(AppError::new(2, format!("Object '{name}' has no channels.")));
        }
        for (channel, scenario) in &config.scenarios {
            if scenario.rebin == 0 {
                return Err(AppError::new(
                    2,
                    format!("Object '{name}', channel '{channel}': rebin must be >= 1."),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_all_objects_and_regions() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.len(), 24);
        for base in ["mu", "muQCD", "muHighPt", "muHighPtQCDOnly", "eMIT", "eMITQCD", "tau", "tauQCD"] {
            assert!(catalog.contains_key(base));
            assert!(catalog.contains_key(&format!("{base}_barrel")));
            assert!(catalog.contains_key(&format!("{base}_endcap")));
        }
        validate_catalog(&catalog).unwrap();
    }

    #[test]
    fn eta_split_suffixes_histograms_only() {
        let catalog = builtin_catalog();
        let base = &catalog["tau"];
        let barrel = &catalog["tau_barrel"];
        assert_eq!(barrel.rebin, base.rebin);
        assert_eq!(barrel.scenarios["TriLep_ZMM"].histo, "tau_barrel");
        assert_eq!(base.scenarios["TriLep_ZMM"].histo, "tau");
        assert_eq!(
            barrel.scenarios["TriLep_AntiIsoMM"].exclude,
            base.scenarios["TriLep_AntiIsoMM"].exclude
        );
    }

    #[test]
    fn every_object_combines_at_least_one_channel() {
        for (name, config) in base_catalog() {
            assert!(
                config.scenarios.values().any(|s| !s.exclude),
                "{name} has only excluded channels"
            );
        }
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.json");
        fs::write(&path, serde_json::to_string(&base_catalog()).unwrap()).unwrap();
        assert_eq!(load_catalog(&path).unwrap(), base_catalog());
    }

    #[test]
    fn catalog_json_defaults_function_and_exclude() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.json");
        fs::write(
            &path,
            r#"{"mu": {"scenarios": {"W": {"title": "W", "file": "singlemu", "histo": "mu", "rebin": 5}},
                       "rebin": 2, "label": "l", "fit_label": "f"}}"#,
        )
        .unwrap();
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog["mu"].function, FitFunction::LandauPlusOffset);
        assert!(!catalog["mu"].scenarios["W"].exclude);
    }

    #[test]
    fn zero_rebin_is_rejected() {
        let mut catalog = base_catalog();
        if let Some(mu) = catalog.get_mut("mu") {
            mu.rebin = 0;
        }
        assert_eq!(validate_catalog(&catalog).unwrap_err().exit_code(), 2);
    }
}
