use std::{path::Path, sync::Arc};

use askama::Template;
use axum::{
    extract::{Form, Multipart, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{Html, IntoResponse, Response},
};
use cfmwrap::{
    export::{export_to_buffer, MIME_TYPE},
    load_molecules, parse_str, Molecule,
};
use log::{debug, info};
use serde::Deserialize;

use crate::{error::ApiError, templates::Index, AppState};

pub(crate) async fn healthz() -> &'static str {
    "OK\n"
}

pub(crate) async fn index(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, ApiError> {
    let page = Index {
        prob_thresh: state.prob_thresh,
        max_upload_mib: state.max_upload_bytes >> 20,
    }
    .render()
    .map_err(|e| ApiError::Internal(format!("failed to render index: {e}")))?;
    Ok(Html(page))
}

/// resolve the `prob_thresh` request parameter, falling back to `default` when
/// it's missing or empty
fn prob_thresh(given: Option<&str>, default: f64) -> Result<f64, ApiError> {
    let Some(s) = given.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    match s.parse::<f64>() {
        Ok(p) if (0.0..=1.0).contains(&p) => Ok(p),
        _ => Err(ApiError::BadRequest(format!(
            "Invalid 'prob_thresh' parameter: {s}"
        ))),
    }
}

/// the name of the workbook returned for an upload named `upload`
fn result_filename(upload: Option<&str>) -> String {
    upload
        .and_then(|name| Path::new(name).file_stem())
        .map(|stem| format!("{}_results.xlsx", stem.to_string_lossy()))
        .unwrap_or_else(|| "cfm_predictions.xlsx".to_owned())
}

#[derive(Deserialize)]
pub(crate) struct PredictForm {
    smiles: Option<String>,
    prob_thresh: Option<String>,
}

/// predict a single SMILES and return the raw `cfm-predict` output
pub(crate) async fn predict(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PredictForm>,
) -> Result<Response, ApiError> {
    let smiles = form
        .smiles
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("Missing 'smiles' parameter".to_owned())
        })?;
    // each input line is one molecule, so a line break would smuggle in more
    if smiles.contains(['\n', '\r']) {
        return Err(ApiError::BadRequest(
            "Invalid 'smiles' parameter: contains a line break".to_owned(),
        ));
    }
    let prob = prob_thresh(form.prob_thresh.as_deref(), state.prob_thresh)?;

    info!("predicting {smiles} with prob_thresh {prob}");
    let out = state
        .predictor
        .predict(&[Molecule::new("M1", smiles)], prob)
        .await?;

    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], out).into_response())
}

#[derive(Deserialize)]
pub(crate) struct BatchQuery {
    prob_thresh: Option<String>,
}

/// predict every molecule in the uploaded `file` and return the results as a
/// workbook
pub(crate) async fn predict_batch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BatchQuery>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let prob = prob_thresh(query.prob_thresh.as_deref(), state.prob_thresh)?;

    let bad = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("Parse form failed: {e}"))
    };
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await.map_err(bad)?;
        upload = Some((filename, bytes));
        break;
    }
    let Some((filename, bytes)) = upload else {
        return Err(ApiError::BadRequest("Missing 'file' upload".to_owned()));
    };

    let mols = load_molecules(&String::from_utf8_lossy(&bytes))?;
    info!(
        "predicting {} molecules from {} with prob_thresh {prob}",
        mols.len(),
        filename.as_deref().unwrap_or("<unnamed>"),
    );

    let out = state.predictor.predict(&mols, prob).await?;
    let results = parse_str(&out);
    debug!("parsed {} results", results.len());
    let xlsx = export_to_buffer(&results)?;

    let headers = [
        (CONTENT_TYPE, MIME_TYPE.to_owned()),
        (
            CONTENT_DISPOSITION,
            format!(
                "attachment; filename={}",
                result_filename(filename.as_deref())
            ),
        ),
    ];
    Ok((headers, xlsx).into_response())
}
