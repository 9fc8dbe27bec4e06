//! flattening of [PredictionResult]s into a single `.xlsx` worksheet with one
//! row per fragment

use std::path::Path;

use log::debug;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};

use crate::{Fragment, PredictionResult, Result};

pub const SHEET_NAME: &str = "Predictions";

pub const HEADERS: [&str; 10] = [
    "ID",
    "SMILES",
    "InChiKey",
    "Formula",
    "PMass",
    "Energy Level",
    "m/z",
    "Intensity",
    "Fragment ID",
    "Annotation",
];

pub const MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const COLUMN_WIDTH: f64 = 15.0;

/// A single data row: the molecule-level fields of `result` plus one of its
/// fragments, if it has any.
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    pub result: &'a PredictionResult,
    pub fragment: Option<&'a Fragment>,
}

/// the rows of the exported sheet, excluding the header. a result without
/// fragments still gets a row of its own so that it shows up in the output
pub fn rows(results: &[PredictionResult]) -> impl Iterator<Item = Row<'_>> {
    results.iter().flat_map(|result| {
        let frags: Vec<_> = if result.fragments.is_empty() {
            vec![None]
        } else {
            result.fragments.iter().map(Some).collect()
        };
        frags.into_iter().map(move |fragment| Row { result, fragment })
    })
}

fn write_row(sheet: &mut Worksheet, row: u32, data: Row) -> Result<()> {
    let r = data.result;
    let molecule = [
        Some(&r.id),
        r.smiles.as_ref(),
        r.inchikey.as_ref(),
        r.formula.as_ref(),
        r.parent_mass.as_ref(),
    ];
    for (col, s) in (0..).zip(molecule) {
        if let Some(s) = s {
            sheet.write_string(row, col, s)?;
        }
    }
    if let Some(f) = data.fragment {
        sheet.write_number(row, 5, f.energy_level as f64)?;
        sheet.write_number(row, 6, f.mz)?;
        sheet.write_number(row, 7, f.intensity)?;
        sheet.write_number(row, 8, f.fragment_id as f64)?;
        sheet.write_string(row, 9, &f.annotation)?;
    }
    Ok(())
}

fn build(results: &[PredictionResult]) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xE0E0E0))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    for (col, h) in (0..).zip(HEADERS) {
        sheet.write_string_with_format(0, col, h, &header)?;
        sheet.set_column_width(col, COLUMN_WIDTH)?;
    }

    let mut nrows = 0;
    for (row, data) in (1..).zip(rows(results)) {
        write_row(sheet, row, data)?;
        nrows += 1;
    }
    debug!("wrote {nrows} rows for {} results", results.len());

    Ok(workbook)
}

/// write `results` to a new workbook at `path`
pub fn export(results: &[PredictionResult], path: impl AsRef<Path>) -> Result<()> {
    build(results)?.save(path.as_ref())?;
    Ok(())
}

/// like [export] but returns the bytes of the workbook instead of writing them
/// to a file
pub fn export_to_buffer(results: &[PredictionResult]) -> Result<Vec<u8>> {
    Ok(build(results)?.save_to_buffer()?)
}
