//! End-to-end runs of the combination pipeline on in-memory histograms.

use std::collections::BTreeMap;
use std::path::PathBuf;

use vh_fakerates::app::pipeline::{histogram_name, run_combine};
use vh_fakerates::codegen::{FunctionSet, render_macro};
use vh_fakerates::domain::{
    ChannelScenario, CombineConfig, FileRole, InputFiles, ObjectCatalog, ObjectConfig, with_eta_split,
};
use vh_fakerates::hist::{Histogram, MemorySource};
use vh_fakerates::io::{read_fake_rates_json, write_fake_rates_json};
use vh_fakerates::models::FitFunction;
use vh_fakerates::report::format_run_summary;

const DATA_SET: &str = "2011AB";
const TRUTH: [f64; 4] = [2.0, 15.0, 3.0, 0.02];

fn files() -> InputFiles {
    InputFiles {
        singlemu: PathBuf::from("singlemu.root"),
        trilepton: PathBuf::from("trilepton.root"),
    }
}

fn scenario(file: FileRole, histo: &str, exclude: bool) -> ChannelScenario {
    ChannelScenario {
        title: format!("{histo} channel"),
        file,
        histo: histo.to_string(),
        rebin: 1,
        exclude,
    }
}

fn object(scenarios: Vec<(&str, ChannelScenario)>) -> ObjectConfig {
    ObjectConfig {
        scenarios: scenarios.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        rebin: 1,
        function: FitFunction::LandauPlusOffset,
        label: "Jet #rightarrow #mu fake rate".to_string(),
        fit_label: "Landau + offset".to_string(),
    }
}

/// Ten 10 GeV bins with `per_bin` denominator entries each and numerators
/// following the truth curve.
fn insert_channel(source: &mut MemorySource, file: &str, histo: &str, per_bin: f64) {
    insert_binned(source, file, histo, per_bin, 10, &TRUTH);
}

/// `n_bins` uniform bins over [0, 100] GeV; returns the numerator contents.
fn insert_binned(
    source: &mut MemorySource,
    file: &str,
    histo: &str,
    per_bin: f64,
    n_bins: usize,
    params: &[f64; 4],
) -> Vec<f64> {
    let f = FitFunction::LandauPlusOffset;
    let width = 100.0 / n_bins as f64;
    let denom = vec![per_bin; n_bins];
    let num: Vec<f64> = (0..n_bins)
        .map(|i| (per_bin * f.predict(width * (i as f64 + 0.5), params)).round())
        .collect();
    source.insert(
        file,
        Histogram::uniform(histogram_name(DATA_SET, histo, "num"), 0.0, 100.0, num.clone()).unwrap(),
    );
    source.insert(
        file,
        Histogram::uniform(histogram_name(DATA_SET, histo, "denom"), 0.0, 100.0, denom).unwrap(),
    );
    num
}

fn config(catalog: ObjectCatalog, output: PathBuf) -> CombineConfig {
    CombineConfig {
        files: files(),
        data_set: DATA_SET.to_string(),
        catalog,
        output,
        plot_dir: None,
    }
}

fn two_channel_setup() -> (MemorySource, ObjectCatalog) {
    let mut source = MemorySource::new();
    insert_channel(&mut source, "singlemu.root", "mu", 10.0);
    insert_channel(&mut source, "trilepton.root", "mu_zmm", 5.0);

    let mut catalog = BTreeMap::new();
    catalog.insert(
        "mu".to_string(),
        object(vec![
            ("wjets", scenario(FileRole::SingleMu, "mu", false)),
            ("zmm", scenario(FileRole::Trilepton, "mu_zmm", true)),
        ]),
    );
    (source, catalog)
}

#[test]
fn excluded_channel_is_reported_but_not_combined() {
    let (mut source, catalog) = two_channel_setup();
    let cfg = config(catalog, PathBuf::from("unused.json"));
    let out = run_combine(&cfg, &mut source).unwrap();

    let mu = &out.fake_rates["mu"];
    assert_eq!(mu.combined_denom, 100.0);
    assert_eq!(mu.types["wjets"].denom, 100.0);
    assert_eq!(mu.types["zmm"].denom, 50.0);
    assert_eq!(mu.combined_num, mu.types["wjets"].num);
    assert!(mu.combined_denom >= mu.combined_num);
    assert!((mu.combined_eff - mu.combined_num / mu.combined_denom).abs() < 1e-12);
    for ch in mu.types.values() {
        assert!(ch.ndof >= 1);
        assert!(ch.chi2_ndf.is_finite());
    }
    assert!([0, 3, 4].contains(&mu.fit_status));
    assert_eq!(mu.raw_func, "scale*TMath::Landau(jetPt,mu,sigma,0)+offset");
    assert!(mu.fitted_func.contains("TMath::Landau(VAR,"));
}

#[test]
fn all_channels_excluded_is_insufficient_data() {
    let mut source = MemorySource::new();
    insert_channel(&mut source, "singlemu.root", "mu", 10.0);
    let mut catalog = BTreeMap::new();
    catalog.insert(
        "mu".to_string(),
        object(vec![("wjets", scenario(FileRole::SingleMu, "mu", true))]),
    );

    let err = run_combine(&config(catalog, PathBuf::from("unused.json")), &mut source).unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(err.message().contains("'mu'"));
}

#[test]
fn missing_histogram_is_an_input_error() {
    let mut source = MemorySource::new();
    let mut catalog = BTreeMap::new();
    catalog.insert(
        "mu".to_string(),
        object(vec![("wjets", scenario(FileRole::SingleMu, "mu", false))]),
    );

    let err = run_combine(&config(catalog, PathBuf::from("unused.json")), &mut source).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.message().contains("2011AB_mu_data_num"));
}

#[test]
fn json_round_trip_and_generated_weights() {
    let dir = tempfile::tempdir().unwrap();
    let json = dir.path().join("fake_rates.json");
    let (mut source, catalog) = two_channel_setup();
    let cfg = config(catalog, json.clone());
    let out = run_combine(&cfg, &mut source).unwrap();

    write_fake_rates_json(&json, &out.fake_rates).unwrap();
    let back = read_fake_rates_json(&json).unwrap();
    assert_eq!(back, out.fake_rates);

    let set = FunctionSet::from_fake_rates(&back).unwrap();
    let eff: f64 = format!("{:.6}", back["mu"].combined_eff).parse().unwrap();
    let w = set.eval("weight_mu_flat", 30.0, 0.3).unwrap();
    assert!((w - eff / (1.0 - eff)).abs() < 1e-12);

    let text = render_macro(&set, chrono::Utc::now());
    assert!(text.contains("float fakerate_mu(float pt, float) {"));
    assert!(text.contains("float weight_mu_flat(float pt, float eta) {"));
}

#[test]
fn summary_lists_objects_and_exclusions() {
    let (mut source, catalog) = two_channel_setup();
    let cfg = config(catalog, PathBuf::from("unused.json"));
    let out = run_combine(&cfg, &mut source).unwrap();

    let text = format_run_summary(&out, &cfg);
    assert!(text.contains("Data set: 2011AB"));
    assert!(text.contains("[mu] Landau + offset"));
    assert!(text.contains("wjets"));
    assert!(text.contains("(excluded)"));
}

#[test]
fn plots_are_written_per_object_and_channel() {
    let dir = tempfile::tempdir().unwrap();
    let (mut source, catalog) = two_channel_setup();
    let cfg = config(catalog, PathBuf::from("unused.json"));
    let out = run_combine(&cfg, &mut source).unwrap();

    let plot_dir = dir.path().join("plots");
    let written = vh_fakerates::plot::render_object_plots(&plot_dir, &out.objects[0]).unwrap();
    // Three combined images plus two per channel.
    assert_eq!(written.len(), 3 + 2 * 2);
    assert!(plot_dir.join("mu_combined_eff_roofit.svg").exists());
    assert!(plot_dir.join("mu_zmm_eff_lin.svg").exists());
}

#[test]
fn rebinning_drops_trailing_partial_groups() {
    let mut source = MemorySource::new();
    let num = insert_binned(&mut source, "singlemu.root", "mu", 20.0, 20, &TRUTH);

    let mut config = object(vec![(
        "wjets",
        ChannelScenario {
            rebin: 3,
            ..scenario(FileRole::SingleMu, "mu", false)
        },
    )]);
    config.rebin = 3;
    let mut catalog = BTreeMap::new();
    catalog.insert("mu".to_string(), config);

    let out = run_combine(&config_for(catalog), &mut source).unwrap();
    let mu = &out.fake_rates["mu"];

    // 20 bins grouped by 3: six groups, the last two bins are dropped.
    assert_eq!(mu.combined_denom, 18.0 * 20.0);
    assert_eq!(mu.combined_num, num[..18].iter().sum::<f64>());
    // Channel integrals are taken before rebinning.
    assert_eq!(mu.types["wjets"].denom, 20.0 * 20.0);
    assert_eq!(mu.types["wjets"].num, num.iter().sum::<f64>());

    let object = &out.objects[0];
    assert_eq!(object.combined_denom.n_bins(), 6);
    assert_eq!(object.combined_eff.points.len(), 6);
    assert_eq!(object.channels[0].efficiency.points.len(), 6);
    assert_eq!(object.combined_denom.integral(), mu.combined_denom);
}

#[test]
fn eta_split_objects_feed_eta_dependent_functions() {
    let barrel_truth = [2.0, 15.0, 3.0, 0.02];
    let endcap_truth = [4.0, 20.0, 4.0, 0.05];
    let mut source = MemorySource::new();
    insert_binned(&mut source, "singlemu.root", "mu", 50.0, 10, &TRUTH);
    insert_binned(&mut source, "singlemu.root", "mu_barrel", 50.0, 10, &barrel_truth);
    insert_binned(&mut source, "singlemu.root", "mu_endcap", 50.0, 10, &endcap_truth);

    let mut base = BTreeMap::new();
    base.insert(
        "mu".to_string(),
        object(vec![("wjets", scenario(FileRole::SingleMu, "mu", false))]),
    );
    let catalog = with_eta_split(base);
    assert_eq!(catalog.len(), 3);

    let out = run_combine(&config_for(catalog), &mut source).unwrap();
    let set = FunctionSet::from_fake_rates(&out.fake_rates).unwrap();
    assert_eq!(
        set.names(),
        vec![
            "fakerate_mu",
            "fakerate_mu_flat",
            "fakerate_mu_eta",
            "fakerate_mu_eta_flat",
            "weight_mu",
            "weight_mu_flat",
            "weight_mu_eta",
            "weight_mu_eta_flat",
        ]
    );

    let flat = |name: &str| -> f64 { format!("{:.6}", out.fake_rates[name].combined_eff).parse().unwrap() };
    assert_eq!(set.eval("fakerate_mu_eta_flat", 30.0, 0.5), Some(flat("mu_barrel")));
    assert_eq!(set.eval("fakerate_mu_eta_flat", 30.0, -2.0), Some(flat("mu_endcap")));
    assert_ne!(flat("mu_barrel"), flat("mu_endcap"));

    let barrel = set.eval("fakerate_mu_eta", 30.0, 1.0).unwrap();
    let endcap = set.eval("fakerate_mu_eta", 30.0, 1.44).unwrap();
    assert_eq!(set.eval("fakerate_mu_eta", 30.0, -1.0), Some(barrel));
    assert_ne!(barrel, endcap);
}

#[test]
fn empty_combined_denominator_is_insufficient_data() {
    let mut source = MemorySource::new();
    insert_channel(&mut source, "singlemu.root", "mu", 0.0);
    let mut catalog = BTreeMap::new();
    catalog.insert(
        "mu".to_string(),
        object(vec![("wjets", scenario(FileRole::SingleMu, "mu", false))]),
    );

    let err = run_combine(&config_for(catalog), &mut source).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

fn config_for(catalog: ObjectCatalog) -> CombineConfig {
    config(catalog, PathBuf::from("unused.json"))
}
