//! SVG diagnostic plots of efficiencies and fitted curves.
//!
//! For every object:
//!
//! - `<obj>_combined_eff.svg` / `<obj>_combined_eff_lin.svg`: combined
//!   efficiency with the least-squares curve (log / linear y)
//! - `<obj>_combined_eff_roofit.svg`: likelihood curve plus the curves with
//!   `scale` ×1.1 and ×0.9
//! - `<obj>_<channel>_eff.svg` / `_eff_lin.svg`: each channel against the
//!   least-squares curve, with its `χ²/NDF`

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;

use crate::app::pipeline::ObjectOutput;
use crate::error::AppError;
use crate::hist::EfficiencyGraph;

const SIZE: (u32, u32) = (800, 600);
const Y_MIN: f64 = 1e-3;
const Y_MAX: f64 = 1.0;
const X_MAX: f64 = 100.0;
const CURVE_SAMPLES: usize = 200;

const FIT_COLOR: RGBColor = RGBColor(220, 20, 20);
const VARIATION_COLOR: RGBColor = RGBColor(30, 60, 220);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum YScale {
    Log,
    Linear,
}

struct Curve {
    points: Vec<(f64, f64)>,
    color: RGBColor,
    legend: Option<String>,
}

struct Panel<'a> {
    graph: &'a EfficiencyGraph,
    curves: Vec<Curve>,
    label_lines: Vec<String>,
}

/// Translate the ROOT TLatex subset used in labels into plain Unicode.
pub fn latex_to_unicode(text: &str) -> String {
    let mut out = text
        .replace("#rightarrow", "→")
        .replace("#chi", "χ")
        .replace("#mu", "μ")
        .replace("#nu", "ν")
        .replace("#tau", "τ")
        .replace("^{2}", "²");
    out.retain(|c| c != '{' && c != '}');
    out
}

fn sample_curve(x_max: f64, f: impl Fn(f64) -> f64) -> Vec<(f64, f64)> {
    (0..=CURVE_SAMPLES)
        .map(|i| {
            let x = x_max * i as f64 / CURVE_SAMPLES as f64;
            (x, f(x))
        })
        .collect()
}

fn x_max(graph: &EfficiencyGraph) -> f64 {
    graph.x_range().map_or(X_MAX, |(_, hi)| hi.max(X_MAX))
}

/// Write every image for `object` into `dir`, creating it when missing.
pub fn render_object_plots(dir: &Path, object: &ObjectOutput) -> Result<Vec<PathBuf>, AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create plot directory '{}': {e}", dir.display())))?;

    let label = latex_to_unicode(&object.config.label);
    let fit_label = latex_to_unicode(&object.config.fit_label);
    let ls = &object.least_squares;
    let ml = &object.likelihood;
    let mut written = Vec::new();

    let xm = x_max(&object.combined_eff);
    let combined = Panel {
        graph: &object.combined_eff,
        curves: vec![Curve {
            points: sample_curve(xm, |x| ls.eval(x)),
            color: FIT_COLOR,
            legend: Some(fit_label.clone()),
        }],
        label_lines: vec![label.clone(), "All channels".to_string()],
    };
    written.push(draw(dir, &format!("{}_combined_eff.svg", object.name), &combined, YScale::Log)?);
    written.push(draw(dir, &format!("{}_combined_eff_lin.svg", object.name), &combined, YScale::Linear)?);

    let roofit = Panel {
        graph: &object.combined_eff,
        curves: vec![
            Curve {
                points: sample_curve(xm, |x| ml.eval(x)),
                color: FIT_COLOR,
                legend: Some("Likelihood fit".to_string()),
            },
            Curve {
                points: sample_curve(xm, |x| ml.eval_scaled(x, 1.1)),
                color: VARIATION_COLOR,
                legend: Some("scale ×1.1 / ×0.9".to_string()),
            },
            Curve {
                points: sample_curve(xm, |x| ml.eval_scaled(x, 0.9)),
                color: VARIATION_COLOR,
                legend: None,
            },
        ],
        label_lines: vec![label.clone(), "All channels".to_string()],
    };
    written.push(draw(dir, &format!("{}_combined_eff_roofit.svg", object.name), &roofit, YScale::Log)?);

    for channel in &object.channels {
        let xm = x_max(&channel.efficiency);
        let panel = Panel {
            graph: &channel.efficiency,
            curves: vec![Curve {
                points: sample_curve(xm, |x| ls.eval(x)),
                color: FIT_COLOR,
                legend: Some(fit_label.clone()),
            }],
            label_lines: vec![
                label.clone(),
                latex_to_unicode(&channel.scenario.title),
                format!("χ²/NDF = {:.1}", channel.chi2_ndf),
            ],
        };
        let stem = format!("{}_{}", object.name, channel.name);
        written.push(draw(dir, &format!("{stem}_eff.svg"), &panel, YScale::Log)?);
        written.push(draw(dir, &format!("{stem}_eff_lin.svg"), &panel, YScale::Linear)?);
    }

    Ok(written)
}

fn draw(dir: &Path, file_name: &str, panel: &Panel, scale: YScale) -> Result<PathBuf, AppError> {
    let path = dir.join(file_name);
    debug!("Writing {}", path.display());
    draw_panel(&path, panel, scale)
        .map_err(|e| AppError::new(2, format!("Failed to draw '{}': {e}", path.display())))?;
    Ok(path)
}

fn draw_panel(path: &Path, panel: &Panel, scale: YScale) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let xm = x_max(panel.graph);
    let mut builder = ChartBuilder::on(&root);
    builder
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 45);

    match scale {
        YScale::Log => {
            let mut chart = builder.build_cartesian_2d(0.0..xm, (Y_MIN..Y_MAX).log_scale())?;
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_desc("Jet pT [GeV]")
                .y_desc("Fake rate")
                .y_label_formatter(&|v| format!("{v:.0e}"))
                .draw()?;
            draw_contents(&mut chart, panel, scale)?;
        }
        YScale::Linear => {
            let mut chart = builder.build_cartesian_2d(0.0..xm, 0.0..Y_MAX)?;
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_desc("Jet pT [GeV]")
                .y_desc("Fake rate")
                .y_label_formatter(&|v| format!("{v:.2}"))
                .draw()?;
            draw_contents(&mut chart, panel, scale)?;
        }
    }

    // Label box in the upper right corner.
    let (x0, y0) = (560, 40);
    let line_height = 20;
    let height = 10 + line_height * panel.label_lines.len() as i32;
    root.draw(&Rectangle::new([(x0, y0), (x0 + 220, y0 + height)], WHITE.filled()))?;
    root.draw(&Rectangle::new([(x0, y0), (x0 + 220, y0 + height)], BLACK.stroke_width(1)))?;
    for (i, line) in panel.label_lines.iter().enumerate() {
        root.draw(&Text::new(
            line.clone(),
            (x0 + 8, y0 + 6 + line_height * i as i32),
            ("sans-serif", 15).into_font(),
        ))?;
    }

    root.present()?;
    Ok(())
}

fn draw_contents<'a, Y>(
    chart: &mut ChartContext<'a, SVGBackend<'a>, Cartesian2d<RangedCoordf64, Y>>,
    panel: &Panel,
    scale: YScale,
) -> Result<(), Box<dyn Error>>
where
    Y: Ranged<ValueType = f64>,
{
    let floor = match scale {
        YScale::Log => Y_MIN,
        YScale::Linear => 0.0,
    };
    let clip = |y: f64| y.clamp(floor, Y_MAX);

    chart.draw_series(panel.graph.points.iter().filter(|p| p.y > floor || scale == YScale::Linear).map(|p| {
        ErrorBar::new_vertical(p.x, clip(p.y - p.eyl), clip(p.y), clip(p.y + p.eyh), BLACK.filled(), 6)
    }))?;
    chart.draw_series(
        panel
            .graph
            .points
            .iter()
            .filter(|p| p.y > floor || scale == YScale::Linear)
            .map(|p| PathElement::new(vec![(p.x - p.ex, clip(p.y)), (p.x + p.ex, clip(p.y))], BLACK.stroke_width(1))),
    )?;

    let mut has_legend = false;
    for curve in &panel.curves {
        let color = curve.color;
        let points: Vec<(f64, f64)> = curve
            .points
            .iter()
            .filter(|&&(_, y)| y.is_finite() && y > floor && y <= Y_MAX)
            .copied()
            .collect();
        let anno = chart.draw_series(LineSeries::new(points, color.stroke_width(3)))?;
        if let Some(legend) = &curve.legend {
            has_legend = true;
            anno.label(legend.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
        }
    }

    if has_legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(&WHITE.mix(0.9))
            .border_style(&BLACK)
            .draw()?;
    }
    Ok(())
}
