//! MVA-MET sequence assembly.
//!
//! The MVA-MET recipe (jet calibration, lepton selectors, the MET producer)
//! is defined externally and loaded from a JSON recipe file. The assembler
//! keeps the recipe's lepton cuts but re-points the selectors at the cleaned
//! PAT collections, adds a tau selector, and orders everything into one
//! sequence. Without a usable recipe the sequence is empty.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const JETS_MODULE: &str = "calibratedAK5PFJetsForPFMEtMVA";
pub const MET_MODULE: &str = "pfMEtMVA";
pub const MUON_SELECTOR: &str = "isomuons";
pub const ELECTRON_SELECTOR: &str = "isoelectrons";
pub const TAU_SELECTOR: &str = "isotaus";

pub const TAU_CUT: &str = "pt > 19 && abs(eta) < 2.3 && \
tauID(\"decayModeFinding\") && \
tauID(\"byIsolationMVAraw\") > 0.7 && \
tauID(\"againstElectronLoose\") && tauID(\"againstMuonLoose\")";

pub const DISABLED_WARNING: &str = "MVA MET dependencies not installed => MVA MET disabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Producer,
    Filter,
}

impl ModuleKind {
    fn cms_type(self) -> &'static str {
        match self {
            ModuleKind::Producer => "EDProducer",
            ModuleKind::Filter => "EDFilter",
        }
    }
}

/// A typed configuration parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    InputTag(String),
    Vstring(Vec<String>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "cms.bool({})", if *b { "True" } else { "False" }),
            ParamValue::Int(i) => write!(f, "cms.int32({i})"),
            ParamValue::Double(d) => write!(f, "cms.double({d})"),
            ParamValue::String(s) => write!(f, "cms.string({s:?})"),
            ParamValue::InputTag(s) => write!(f, "cms.InputTag({s:?})"),
            ParamValue::Vstring(v) => {
                let items: Vec<String> = v.iter().map(|s| format!("{s:?}")).collect();
                write!(f, "cms.vstring({})", items.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDef {
    /// Filled from the recipe key when loading.
    #[serde(default)]
    pub label: String,
    pub kind: ModuleKind,
    pub plugin: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl fmt::Display for ModuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = cms.{}({:?}", self.label, self.kind.cms_type(), self.plugin)?;
        for (name, value) in &self.params {
            write!(f, ",\n    {name} = {value}")?;
        }
        write!(f, "\n)")
    }
}

/// Ordered list of modules, displayed as `a * b * c`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    pub modules: Vec<ModuleDef>,
}

impl Sequence {
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.label.as_str()).collect()
    }

    pub fn get(&self, label: &str) -> Option<&ModuleDef> {
        self.modules.iter().find(|m| m.label == label)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cms.Sequence({})", self.labels().join(" * "))
    }
}

/// Externally defined modules, keyed by label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeCatalog {
    pub modules: BTreeMap<String, ModuleDef>,
}

impl RecipeCatalog {
    pub fn from_json_str(text: &str) -> Result<Self, AppError> {
        let mut modules: BTreeMap<String, ModuleDef> = serde_json::from_str(text)
            .map_err(|e| AppError::new(2, format!("Invalid MET recipe JSON: {e}")))?;
        for (label, module) in modules.iter_mut() {
            module.label = label.clone();
        }
        Ok(Self { modules })
    }

    pub fn get(&self, label: &str) -> Option<&ModuleDef> {
        self.modules.get(label)
    }
}

/// Load a recipe file. A missing file is `Ok(None)`; an unreadable or
/// malformed one is an error.
pub fn load_recipe(path: &Path) -> Result<Option<RecipeCatalog>, AppError> {
    if !path.exists() {
        info!("No MET recipe at {}", path.display());
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read MET recipe '{}': {e}", path.display())))?;
    RecipeCatalog::from_json_str(&text)
        .map(Some)
        .map_err(|e| e.context(path.display()))
}

/// Replace a recipe selector with a non-filtering selector on `src`,
/// keeping its `cut`.
fn override_selector(recipe: &RecipeCatalog, label: &str, plugin: &str, src: &str) -> Option<ModuleDef> {
    let original = recipe.get(label)?;
    let cut = original.params.get("cut")?.clone();
    let mut params = BTreeMap::new();
    params.insert("src".to_string(), ParamValue::InputTag(src.to_string()));
    params.insert("cut".to_string(), cut);
    params.insert("filter".to_string(), ParamValue::Bool(false));
    Some(ModuleDef {
        label: label.to_string(),
        kind: ModuleKind::Filter,
        plugin: plugin.to_string(),
        params,
    })
}

fn tau_selector() -> ModuleDef {
    let mut params = BTreeMap::new();
    params.insert("src".to_string(), ParamValue::InputTag("selectedPatTaus".to_string()));
    params.insert("cut".to_string(), ParamValue::String(TAU_CUT.to_string()));
    params.insert("filter".to_string(), ParamValue::Bool(false));
    ModuleDef {
        label: TAU_SELECTOR.to_string(),
        kind: ModuleKind::Filter,
        plugin: "PATTauSelector".to_string(),
        params,
    }
}

fn try_assemble(recipe: &RecipeCatalog) -> Option<Sequence> {
    let jets = recipe.get(JETS_MODULE)?.clone();
    let met = recipe.get(MET_MODULE)?.clone();
    let muons = override_selector(recipe, MUON_SELECTOR, "PATMuonSelector", "cleanPatMuons")?;
    let electrons = override_selector(recipe, ELECTRON_SELECTOR, "PATElectronSelector", "cleanPatElectrons")?;
    Some(Sequence {
        modules: vec![jets, muons, electrons, tau_selector(), met],
    })
}

/// Build the MVA-MET sequence, or an empty one when the recipe is missing
/// or incomplete.
pub fn assemble_mva_met_sequence(recipe: Option<&RecipeCatalog>) -> Sequence {
    match recipe.and_then(try_assemble) {
        Some(sequence) => sequence,
        None => {
            warn!("{DISABLED_WARNING}.");
            Sequence::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPE: &str = r#"{
        "calibratedAK5PFJetsForPFMEtMVA": {"kind": "producer", "plugin": "PFJetCorrectionProducer",
            "params": {"src": {"input_tag": "ak5PFJets"}, "correctors": {"vstring": ["ak5PFL1FastL2L3"]}}},
        "pfMEtMVA": {"kind": "producer", "plugin": "PFMETProducerMVA",
            "params": {"srcLeptons": {"input_tag": "isomuons"}}},
        "isomuons": {"kind": "filter", "plugin": "MuonSelector",
            "params": {"src": {"input_tag": "muons"}, "cut": {"string": "pt > 10 && isGlobalMuon"}}},
        "isoelectrons": {"kind": "filter", "plugin": "GsfElectronSelector",
            "params": {"src": {"input_tag": "gsfElectrons"}, "cut": {"string": "pt > 10"}}}
    }"#;

    #[test]
    fn assembles_in_fixed_order() {
        let recipe = RecipeCatalog::from_json_str(RECIPE).unwrap();
        let seq = assemble_mva_met_sequence(Some(&recipe));
        assert_eq!(
            seq.labels(),
            vec![JETS_MODULE, MUON_SELECTOR, ELECTRON_SELECTOR, TAU_SELECTOR, MET_MODULE]
        );
        assert_eq!(
            seq.to_string(),
            "cms.Sequence(calibratedAK5PFJetsForPFMEtMVA * isomuons * isoelectrons * isotaus * pfMEtMVA)"
        );
    }

    #[test]
    fn selectors_keep_cut_and_switch_source() {
        let recipe = RecipeCatalog::from_json_str(RECIPE).unwrap();
        let seq = assemble_mva_met_sequence(Some(&recipe));

        let muons = seq.get(MUON_SELECTOR).unwrap();
        assert_eq!(muons.kind, ModuleKind::Filter);
        assert_eq!(muons.plugin, "PATMuonSelector");
        assert_eq!(muons.params["cut"], ParamValue::String("pt > 10 && isGlobalMuon".into()));
        assert_eq!(muons.params["src"], ParamValue::InputTag("cleanPatMuons".into()));
        assert_eq!(muons.params["filter"], ParamValue::Bool(false));

        let electrons = seq.get(ELECTRON_SELECTOR).unwrap();
        assert_eq!(electrons.plugin, "PATElectronSelector");
        assert_eq!(electrons.params["src"], ParamValue::InputTag("cleanPatElectrons".into()));

        let taus = seq.get(TAU_SELECTOR).unwrap();
        assert_eq!(taus.plugin, "PATTauSelector");
        assert_eq!(taus.params["src"], ParamValue::InputTag("selectedPatTaus".into()));
        assert_eq!(taus.params["cut"], ParamValue::String(TAU_CUT.into()));
    }

    #[test]
    fn missing_recipe_gives_empty_sequence() {
        assert!(assemble_mva_met_sequence(None).is_empty());
        assert_eq!(assemble_mva_met_sequence(None).to_string(), "cms.Sequence()");
    }

    #[test]
    fn incomplete_recipe_gives_empty_sequence() {
        let mut recipe = RecipeCatalog::from_json_str(RECIPE).unwrap();
        recipe.modules.remove(MET_MODULE);
        assert!(assemble_mva_met_sequence(Some(&recipe)).is_empty());
    }

    #[test]
    fn load_recipe_distinguishes_missing_from_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_recipe(&dir.path().join("absent.json")).unwrap(), None);

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert_eq!(load_recipe(&bad).unwrap_err().exit_code(), 2);

        let good = dir.path().join("good.json");
        fs::write(&good, RECIPE).unwrap();
        let recipe = load_recipe(&good).unwrap().unwrap();
        assert_eq!(recipe.get(MET_MODULE).unwrap().label, MET_MODULE);
    }

    #[test]
    fn module_display_uses_config_syntax() {
        let text = tau_selector().to_string();
        assert!(text.starts_with("isotaus = cms.EDFilter(\"PATTauSelector\""));
        assert!(text.contains("filter = cms.bool(False)"));
        assert!(text.contains("src = cms.InputTag(\"selectedPatTaus\")"));
    }
}
