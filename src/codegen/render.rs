//! C++ rendering of a `FunctionSet` into the `fake_rates.C` macro.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::codegen::{ETA_BOUNDARY, FunctionBody, FunctionDef, FunctionSet, OUT_OF_BOUNDS, RateExpr};
use crate::error::AppError;

const WEIGHT_BANNER: &str = "\
// ############################################################################
// Corresponding weight functions #############################################
// ############################################################################
";

/// Render the full macro text.
pub fn render_macro(set: &FunctionSet, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("// Fake rate functions used to weight events in the VH analysis.\n");
    let _ = writeln!(
        out,
        "// This file was auto-generated by fakerates {} on {}.",
        env!("CARGO_PKG_VERSION"),
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out.push_str("#include \"TMath.h\"\n#include <iostream>\n\n");

    let mut banner_written = false;
    for def in &set.functions {
        if matches!(def.body, FunctionBody::Weight { .. }) && !banner_written {
            out.push('\n');
            out.push_str(WEIGHT_BANNER);
            banner_written = true;
        }
        out.push_str(&render_function(def));
        out.push('\n');
    }
    out
}

fn signature(def: &FunctionDef) -> String {
    let pt = if def.uses_pt() { "float pt" } else { "float" };
    let eta = if def.uses_eta() { "float eta" } else { "float" };
    format!("float {}({pt}, {eta})", def.name)
}

/// Render one function definition.
pub fn render_function(def: &FunctionDef) -> String {
    let mut out = signature(def);
    out.push_str(" {\n");
    match &def.body {
        FunctionBody::Rate(expr) => {
            let _ = writeln!(out, "    return {};", expr.source());
        }
        FunctionBody::EtaSplit { barrel, endcap } => {
            out.push_str(&branch(&format!("std::abs(eta) < {ETA_BOUNDARY}"), barrel));
            out.push_str(&branch(&format!("std::abs(eta) >= {ETA_BOUNDARY}"), endcap));
            let _ = writeln!(
                out,
                "    std::cerr << \"Warning out of bounds in function {}\" << std::endl;",
                def.name
            );
            let _ = writeln!(out, "    return {OUT_OF_BOUNDS:.0};");
        }
        FunctionBody::Weight { rate } => {
            let _ = writeln!(out, "    float fakerate = {rate}(pt, eta);");
            out.push_str("    float result = fakerate/(1. - fakerate);\n");
            out.push_str("    return result;\n");
        }
    }
    out.push_str("}\n");
    out
}

fn branch(condition: &str, expr: &RateExpr) -> String {
    format!(
        "    if ({condition}) {{\n        return {};\n    }}\n",
        expr.source()
    )
}

/// Write the macro text to `path`.
pub fn write_macro(path: &Path, text: &str) -> Result<(), AppError> {
    fs::write(path, text)
        .map_err(|e| AppError::new(2, format!("Failed to write macro '{}': {e}", path.display())))
}
