use axum::{
    extract::Query,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum::extract::multipart::Multipart;
use log::info;
use std::time::Instant;

use crate::config::ConversionConfig;
use crate::convert::{self, ConversionOutcome, LookupTable};
use crate::io::CsvProvider;
use crate::projection::CrsDescriptor;
use crate::types::Value;
use crate::Error;
use super::models::*;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Descriptor(_)
        | Error::MissingColumn(_)
        | Error::Config(_)
        | Error::Csv(_)
        | Error::Workbook(_)
        | Error::UnsupportedFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Descriptors naming server-side files are not accepted over HTTP
fn reject_file_reference(raw: &str) -> Result<(), ApiError> {
    let names_file = raw.split('+').any(|part| {
        let part = part.trim().to_ascii_lowercase();
        part.ends_with(".wkt") || part.ends_with(".prj")
    });
    if names_file {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("File-based CRS descriptors are not accepted: {}", raw),
        ));
    }
    Ok(())
}

/// Checks every text value that may reach the resolver
fn reject_file_values<'a, I>(values: I) -> Result<(), ApiError>
where
    I: IntoIterator<Item = &'a Value>,
{
    for value in values {
        if let Value::Text(text) = value {
            reject_file_reference(text)?;
        }
    }
    Ok(())
}

fn parse_flag(text: &str) -> bool {
    matches!(text.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub async fn resolve_descriptor(
    Query(req): Query<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    reject_file_reference(&req.srs)?;

    let descriptor = CrsDescriptor::resolve_str(&req.srs, req.expand)
        .map_err(|e| api_error(status_for(&e), format!("Failed to resolve: {}", e)))?;

    Ok(Json(ResolveResponse {
        input: req.srs,
        display: descriptor.as_ref().map(|d| d.to_string()),
        epsg: descriptor.as_ref().and_then(|d| d.epsg_code()),
        descriptor,
    }))
}

pub async fn convert_upload(mut multipart: Multipart) -> Result<Response, ApiError> {
    let start = Instant::now();
    let mut form = ConvertForm::default();

    let bad_request = |e: axum::extract::multipart::MultipartError| {
        api_error(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {}", e))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => form.file = Some(field.bytes().await.map_err(bad_request)?.to_vec()),
            "lookup" => form.lookup = Some(field.bytes().await.map_err(bad_request)?.to_vec()),
            "x" => form.x = field.text().await.map_err(bad_request)?,
            "y" => form.y = field.text().await.map_err(bad_request)?,
            "z" => form.z = field.text().await.map_err(bad_request)?,
            "srs_input" => form.srs_input = field.text().await.map_err(bad_request)?,
            "srs_output" => form.srs_output = field.text().await.map_err(bad_request)?,
            "srs_column" => form.srs_column = field.text().await.map_err(bad_request)?,
            "convert_clock_to_decimal" => {
                form.convert_clock_to_decimal = parse_flag(&field.text().await.map_err(bad_request)?)
            }
            "convert_lookup" => {
                form.convert_lookup = parse_flag(&field.text().await.map_err(bad_request)?)
            }
            _ => {}
        }
    }

    reject_file_reference(&form.srs_input)?;
    reject_file_reference(&form.srs_output)?;
    if form.file.is_none() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing file"));
    }
    if form.srs_output.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing srs_output parameter"));
    }

    let (body, rows, converted) = process_conversion(&form)?;

    info!(
        "converted {} of {} rows in {:.2} ms",
        converted,
        rows,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV.to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"converted.csv\"".to_string(),
            ),
            (HeaderName::from_static("x-converted-rows"), converted.to_string()),
        ],
        body,
    )
        .into_response())
}

/// Runs the conversion synchronously; returns the CSV body, row count and
/// converted row count
///
/// In lookup mode the CRS column values and the lookup table's values are
/// descriptors too, so they pass the same file check as the form fields.
fn process_conversion(form: &ConvertForm) -> Result<(Vec<u8>, usize, usize), ApiError> {
    let failed = |e: Error| api_error(status_for(&e), format!("Failed to convert: {}", e));
    let csv = CsvProvider::default();
    let mut rows = csv
        .read_from(form.file.as_deref().unwrap_or_default())
        .map_err(failed)?;

    let lookup = match &form.lookup {
        Some(bytes) if form.convert_lookup => Some(
            csv.read_from(bytes.as_slice())
                .and_then(|table| LookupTable::from_rows(&table))
                .map_err(failed)?,
        ),
        _ => None,
    };

    if form.convert_lookup {
        if let Some(column) = rows.column_index(&form.srs_column) {
            reject_file_values(&rows.distinct(column))?;
        }
        if let Some(lookup) = &lookup {
            reject_file_values(lookup.values())?;
        }
    }

    let config = ConversionConfig {
        x: form.x.clone(),
        y: form.y.clone(),
        z: form.z.clone(),
        convert_clock_to_decimal: form.convert_clock_to_decimal,
        convert_lookup: form.convert_lookup,
        srs_column: form.srs_column.clone(),
        srs_input: form.srs_input.clone(),
        srs_output: form.srs_output.clone(),
        ..Default::default()
    };

    let report = convert::convert_rows(&mut rows, &config, lookup.as_ref()).map_err(failed)?;
    let converted = match &report.outcome {
        ConversionOutcome::Global(summary) => summary.transformed,
        ConversionOutcome::Lookup(groups) => groups.converted_rows(),
    };

    let mut body = Vec::with_capacity(rows.len() * 40);
    csv.write_to(&rows, &mut body).map_err(failed)?;
    Ok((body, rows.len(), converted))
}
