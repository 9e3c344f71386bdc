//! Terminal summary of a `combine` run.
//!
//! Formatting lives here so the pipeline returns plain data and the output
//! layout can change without touching the fits.

use std::fmt::Write as _;

use crate::app::pipeline::{CombineOutput, ObjectOutput};
use crate::domain::CombineConfig;

/// Format the full run summary: inputs, then one block per object.
pub fn format_run_summary(output: &CombineOutput, config: &CombineConfig) -> String {
    let mut out = String::new();

    out.push_str("=== fakerates - fake-rate combination ===\n");
    let _ = writeln!(out, "Data set: {}", config.data_set);
    let _ = writeln!(out, "Single muon: {}", config.files.singlemu.display());
    let _ = writeln!(out, "Trilepton: {}", config.files.trilepton.display());
    let _ = writeln!(out, "Objects: {}", output.objects.len());

    for object in &output.objects {
        out.push('\n');
        out.push_str(&format_object(object));
    }

    let failed: Vec<&str> = output
        .objects
        .iter()
        .filter(|o| !o.likelihood.status.is_converged())
        .map(|o| o.name.as_str())
        .collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "\nNot converged: {}", failed.join(", "));
    }
    out
}

/// One object's block: combined counts, fit parameters and the channel table.
pub fn format_object(object: &ObjectOutput) -> String {
    let r = &object.result;
    let mut out = String::new();

    let _ = writeln!(out, "[{}] {}", object.name, object.config.function.display_name());
    let _ = writeln!(
        out,
        "  combined: num={:.0} denom={:.0} eff={:.4}",
        r.combined_num, r.combined_denom, r.combined_eff
    );
    let _ = writeln!(
        out,
        "  least squares: chi2={:.3} points={} status={}",
        object.least_squares.chi2, object.least_squares.n_points, object.least_squares.status
    );
    let _ = writeln!(
        out,
        "  likelihood: scale={:.4e} mu={:.4e} sigma={:.4e} offset={:.4e} nll={:.3} status={}",
        r.vars.scale, r.vars.mu, r.vars.sigma, r.vars.offset, object.likelihood.nll, r.fit_status
    );

    let _ = writeln!(
        out,
        "  {:<24} {:>10} {:>10} {:>5} {:>9}",
        "channel", "num", "denom", "ndof", "chi2/ndf"
    );
    for (name, ch) in &r.types {
        let excluded = object
            .config
            .scenarios
            .get(name)
            .is_some_and(|s| s.exclude);
        let _ = writeln!(
            out,
            "  {:<24} {:>10.0} {:>10.0} {:>5} {:>9.2}{}",
            name,
            ch.num,
            ch.denom,
            ch.ndof,
            ch.chi2_ndf,
            if excluded { "  (excluded)" } else { "" }
        );
    }
    out
}
