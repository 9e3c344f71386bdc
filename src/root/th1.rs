//! TH1D / TH1F deserialization.
//!
//! Streamed layout (fields this reader needs are marked `*`):
//! ```text
//! TH1D | TH1F
//!   TH1
//!     TNamed (name*, title*)
//!     TAttLine, TAttFill, TAttMarker      skipped via byte count
//!     fNcells*
//!     fXaxis* (nbins, xmin, xmax, xbins)
//!     fYaxis, fZaxis                      skipped
//!     fBarOffset .. fNormFactor           scalars
//!     fContour (TArrayD)
//!     fSumw2* (TArrayD)
//!     fOption, fFunctions, fBuffer, ...   skipped to the TH1 end
//!   TArrayD | TArrayF                     bin contents*, with under/overflow
//! ```

use super::error::{Result, RootError};
use super::rbuffer::RBuffer;
use crate::hist::Histogram;

/// Decode a histogram payload given its class name.
pub fn read_histogram(payload: &[u8], class_name: &str) -> Result<Histogram> {
    match class_name {
        "TH1D" => read_th1(payload, Precision::Double),
        "TH1F" => read_th1(payload, Precision::Float),
        other => Err(RootError::UnsupportedClass(other.to_string())),
    }
}

#[derive(Debug, Clone, Copy)]
enum Precision {
    Double,
    Float,
}

struct Axis {
    n_bins: usize,
    x_min: f64,
    x_max: f64,
    edges: Vec<f64>,
}

struct Th1Base {
    name: String,
    title: String,
    n_cells: usize,
    axis: Axis,
    sumw2: Option<Vec<f64>>,
}

fn read_th1(payload: &[u8], precision: Precision) -> Result<Histogram> {
    let mut r = RBuffer::new(payload);
    let (version, _end) = r.read_version()?;
    if version < 1 {
        return Err(RootError::Deserialization(format!("unsupported TH1 class version {version}")));
    }

    let base = read_th1_base(&mut r)?;

    let n = r.read_u32()? as usize;
    if n != base.n_cells {
        return Err(RootError::Deserialization(format!(
            "bin array has {n} cells but fNcells is {}",
            base.n_cells
        )));
    }
    let raw = match precision {
        Precision::Double => r.read_array_f64(n)?,
        Precision::Float => r.read_array_f32(n)?.into_iter().map(f64::from).collect(),
    };

    build_histogram(base, &raw)
}

fn read_th1_base(r: &mut RBuffer) -> Result<Th1Base> {
    let (th1_version, th1_end) = r.read_version()?;

    let (name, title) = r.read_tnamed()?;
    skip_object(r)?; // TAttLine
    skip_object(r)?; // TAttFill
    skip_object(r)?; // TAttMarker

    let n_cells = r.read_i32()?;
    if n_cells < 2 {
        return Err(RootError::Deserialization(format!("invalid fNcells {n_cells}")));
    }

    let axis = read_axis(r)?;
    skip_object(r)?; // fYaxis
    skip_object(r)?; // fZaxis

    let _bar_offset = r.read_i16()?;
    let _bar_width = r.read_i16()?;
    r.skip(5 * 8)?; // fEntries, fTsumw, fTsumw2, fTsumwx, fTsumwx2
    if th1_version >= 2 {
        r.skip(2 * 8)?; // fMaximum, fMinimum
    }
    if th1_version >= 3 {
        r.skip(8)?; // fNormFactor
    }

    let n_contour = r.read_u32()? as usize;
    r.skip(n_contour * 8)?;

    let n_sumw2 = r.read_u32()? as usize;
    let sumw2 = if n_sumw2 > 0 {
        Some(r.read_array_f64(n_sumw2)?)
    } else {
        None
    };

    // Everything after fSumw2 (option, functions, buffer, error options) is skipped.
    match th1_end {
        Some(end) => r.set_pos(end),
        None => {
            return Err(RootError::Deserialization(
                "TH1 without byte count is not supported".into(),
            ));
        }
    }

    Ok(Th1Base {
        name,
        title,
        n_cells: n_cells as usize,
        axis,
        sumw2,
    })
}

fn read_axis(r: &mut RBuffer) -> Result<Axis> {
    let (_version, end) = r.read_version()?;
    let (_name, _title) = r.read_tnamed()?;
    skip_object(r)?; // TAttAxis

    let n_bins = r.read_i32()?;
    let x_min = r.read_f64()?;
    let x_max = r.read_f64()?;
    let n_edges = r.read_u32()? as usize;
    let edges = if n_edges > 0 {
        r.read_array_f64(n_edges)?
    } else {
        Vec::new()
    };

    if let Some(end) = end {
        r.set_pos(end);
    }
    if n_bins < 1 {
        return Err(RootError::Deserialization(format!("invalid axis bin count {n_bins}")));
    }

    Ok(Axis {
        n_bins: n_bins as usize,
        x_min,
        x_max,
        edges,
    })
}

/// Skip an embedded object written with a byte-count header.
fn skip_object(r: &mut RBuffer) -> Result<()> {
    let (_version, end) = r.read_version()?;
    match end {
        Some(end) => {
            r.set_pos(end);
            Ok(())
        }
        None => Err(RootError::Deserialization(
            "embedded object without byte count".into(),
        )),
    }
}

fn build_histogram(base: Th1Base, raw: &[f64]) -> Result<Histogram> {
    let n = base.axis.n_bins;
    if base.n_cells != n + 2 {
        return Err(RootError::Deserialization(format!(
            "fNcells {} does not match {n} bins plus under/overflow",
            base.n_cells
        )));
    }

    let edges = if base.axis.edges.len() == n + 1 {
        base.axis.edges.clone()
    } else {
        let width = (base.axis.x_max - base.axis.x_min) / n as f64;
        (0..=n).map(|i| base.axis.x_min + i as f64 * width).collect()
    };

    let sumw2 = base.sumw2.map(|sw2| {
        if sw2.len() == base.n_cells {
            sw2[1..=n].to_vec()
        } else {
            sw2
        }
    });

    Ok(Histogram {
        name: base.name,
        title: base.title,
        edges,
        contents: raw[1..=n].to_vec(),
        sumw2,
    })
}
