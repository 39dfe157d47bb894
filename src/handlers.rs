// src/handlers.rs
use crate::config::SheetConfig;
use crate::errors::ContactSheetError;
use crate::models::{ContactSheet, SheetInput, UploadedFile};
use crate::services::PageMove;
use crate::AppState;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{Error, HttpResponse, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use log::{debug, info};
use serde::Deserialize;
use uuid::Uuid;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/sessions", web::post().to(create_session))
            .route("/sheets/quick", web::post().to(quick_sheet))
            .route("/sessions/{session_id}", web::get().to(get_session))
            .route("/sessions/{session_id}", web::delete().to(delete_session))
            .route("/sessions/{session_id}/load-more", web::post().to(load_more))
            .route(
                "/sessions/{session_id}/records/{record_id}/reject",
                web::post().to(reject_record),
            )
            .route(
                "/sessions/{session_id}/records/{record_id}/select",
                web::post().to(select_record),
            )
            .route(
                "/sessions/{session_id}/records/{record_id}/thumbnail",
                web::get().to(record_thumbnail),
            )
            .route("/sessions/{session_id}/confirm", web::post().to(confirm))
            .route("/sessions/{session_id}/reset", web::post().to(reset))
            .route("/sessions/{session_id}/page", web::post().to(change_page))
            .route("/sessions/{session_id}/export", web::get().to(export_sheet)),
    );
}

#[derive(Debug, Deserialize)]
pub struct LoadMoreRequest {
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStep {
    Next,
    Prev,
}

#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub offset: Option<usize>,
    pub step: Option<PageStep>,
}

/// Collect the intake form: one of `csv`, `urls` or repeated `files`, plus an
/// optional JSON `config` part.
async fn read_sheet_form(
    mut payload: Multipart,
) -> Result<(SheetInput, Option<SheetConfig>), Error> {
    let mut csv = None;
    let mut urls = String::new();
    let mut files = Vec::new();
    let mut config = None;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .map(|f| f.to_string());
        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut data = BytesMut::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "csv" => csv = Some(data.to_vec()),
            "urls" => {
                urls.push_str(&String::from_utf8_lossy(&data));
                urls.push('\n');
            }
            "files" => files.push(UploadedFile {
                filename: filename.unwrap_or_else(|| format!("upload-{}", files.len())),
                content_type,
                data: data.to_vec(),
            }),
            "config" => {
                let parsed: SheetConfig = serde_json::from_slice(&data).map_err(|e| {
                    ContactSheetError::Validation(format!("Invalid config: {}", e))
                })?;
                config = Some(parsed);
            }
            other => debug!("Ignoring form field {}", other),
        }
    }

    let input = if let Some(csv) = csv {
        SheetInput::Tabular(csv)
    } else if !urls.trim().is_empty() {
        SheetInput::UrlList(urls)
    } else if !files.is_empty() {
        SheetInput::Uploads(files)
    } else {
        return Err(ContactSheetError::InputEmpty.into());
    };

    Ok((input, config))
}

fn png_download(sheet: ContactSheet) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(sheet.mime)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", sheet.filename),
        ))
        .body(sheet.data)
}

pub async fn create_session(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (input, config) = read_sheet_form(payload).await?;

    let (session, view) = data
        .driver
        .start(input, config.unwrap_or_default())
        .await?;
    data.sessions.save(&session).await?;

    info!("Created session {}", session.id);
    Ok(HttpResponse::Created().json(&view))
}

pub async fn quick_sheet(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (input, config) = read_sheet_form(payload).await?;
    let config = config.unwrap_or_else(SheetConfig::lean);

    let sheet = data.driver.quick_sheet(input, &config).await?;
    Ok(png_download(sheet))
}

pub async fn get_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.load(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(data.driver.view(&session)))
}

pub async fn delete_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    data.sessions.delete(&session_id).await?;
    info!("Deleted session {}", session_id);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn load_more(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: Option<web::Json<LoadMoreRequest>>,
) -> Result<HttpResponse, Error> {
    let mut session = data.sessions.load(&path.into_inner()).await?;
    let count = body
        .and_then(|b| b.count)
        .unwrap_or(session.config.batch_size);

    let view = data.driver.on_load_more(&mut session, count).await;
    data.sessions.save(&session).await?;
    Ok(HttpResponse::Ok().json(&view))
}

pub async fn reject_record(
    path: web::Path<(Uuid, String)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (session_id, record_id) = path.into_inner();
    let mut session = data.sessions.load(&session_id).await?;

    let view = data.driver.on_reject(&mut session, &record_id)?;
    data.sessions.save(&session).await?;
    Ok(HttpResponse::Ok().json(&view))
}

pub async fn select_record(
    path: web::Path<(Uuid, String)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (session_id, record_id) = path.into_inner();
    let mut session = data.sessions.load(&session_id).await?;

    let view = data.driver.on_select(&mut session, &record_id)?;
    data.sessions.save(&session).await?;
    Ok(HttpResponse::Ok().json(&view))
}

pub async fn record_thumbnail(
    path: web::Path<(Uuid, String)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (session_id, record_id) = path.into_inner();
    let session = data.sessions.load(&session_id).await?;

    let png = data.driver.thumbnail(&session, &record_id).await?;
    Ok(HttpResponse::Ok().content_type("image/png").body(png))
}

pub async fn confirm(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut session = data.sessions.load(&path.into_inner()).await?;

    let view = data.driver.on_confirm(&mut session)?;
    data.sessions.save(&session).await?;
    Ok(HttpResponse::Ok().json(&view))
}

pub async fn reset(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut session = data.sessions.load(&path.into_inner()).await?;

    let view = data.driver.on_reset(&mut session);
    data.sessions.save(&session).await?;
    Ok(HttpResponse::Ok().json(&view))
}

pub async fn change_page(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<PageRequest>,
) -> Result<HttpResponse, Error> {
    let page = match (body.offset, body.step) {
        (Some(offset), _) => PageMove::To(offset),
        (None, Some(PageStep::Next)) => PageMove::Next,
        (None, Some(PageStep::Prev)) => PageMove::Prev,
        (None, None) => {
            return Err(ContactSheetError::Validation(
                "Provide either \"offset\" or \"step\"".to_string(),
            )
            .into());
        }
    };

    let mut session = data.sessions.load(&path.into_inner()).await?;
    let view = data.driver.on_page(&mut session, page);
    data.sessions.save(&session).await?;
    Ok(HttpResponse::Ok().json(&view))
}

pub async fn export_sheet(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.load(&path.into_inner()).await?;

    let sheet = data.driver.on_export(&session).await?;
    info!(
        "Exported session {} ({} bytes)",
        session.id,
        sheet.data.len()
    );
    Ok(png_download(sheet))
}
