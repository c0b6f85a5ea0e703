use crate::{
    config::Config,
    errors::ApiError,
    links::{remove_file_logged, Links, NewUpload, PolicyFields, UploadPolicy},
    templates::{render, LandingTemplate, SuccessTemplate, UploadTemplate},
};
use actix_files::NamedFile;
use actix_multipart::{Field, Multipart};
use actix_web::http::header::{
    self, Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
    HeaderValue,
};
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::TryStreamExt as _;
use sanitize_filename::sanitize;
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use super::{html, see_other};

const SNIFF_LEN: usize = 8192;

pub async fn landing() -> HttpResponse {
    html(render(&LandingTemplate))
}

pub async fn upload_form() -> HttpResponse {
    html(render(&UploadTemplate))
}

/// An upload streamed into a temp file inside the uploads directory. The
/// temp file is removed on drop unless it was persisted.
pub struct SavedFile {
    pub storage_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: usize,
    tmp: NamedTempFile,
}

impl SavedFile {
    /// Moves the bytes to `path`, never replacing an existing file.
    fn persist(self, path: &Path) -> Result<(), ApiError> {
        self.tmp.persist_noclobber(path).map(|_| ()).map_err(|e| {
            log::error!("failed to store upload path={} err={}", path.display(), e.error);
            ApiError::Internal
        })
    }
}

async fn drain(field: &mut Field) -> Result<(), ApiError> {
    while field
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("upload read error".into()))?
        .is_some()
    {}
    Ok(())
}

async fn read_text(field: &mut Field) -> Result<String, ApiError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("upload read error".into()))?
    {
        buf.extend_from_slice(&chunk);
        if buf.len() > 256 {
            return Err(ApiError::BadRequest("form field too long".into()));
        }
    }
    String::from_utf8(buf).map_err(|_| ApiError::BadRequest("invalid form field".into()))
}

/// Streams one file part to disk. A part without a file name (the browser
/// sends one when nothing was picked) yields `None`.
pub async fn save_multipart_file(
    cfg: &Config,
    links: &Links,
    field: &mut Field,
) -> Result<Option<SavedFile>, ApiError> {
    let original = field
        .content_disposition()
        .and_then(|cd| cd.get_filename().map(|s| s.to_string()))
        .unwrap_or_default();
    if original.is_empty() {
        drain(field).await?;
        return Ok(None);
    }
    let declared = field
        .content_type()
        .map(|m| m.to_string())
        .filter(|m| !m.is_empty());

    let mut saved = SavedFile {
        storage_name: links.storage_name_for(&original),
        original_name: original,
        mime_type: String::new(),
        size: 0,
        tmp: NamedTempFile::new_in(links.uploads_dir())?,
    };

    let mut head: Vec<u8> = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("upload read error".into()))?
    {
        saved.size += chunk.len();
        if saved.size > cfg.max_upload_size {
            return Err(ApiError::BadRequest("file too large".into()));
        }
        if head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }
        saved.tmp.write_all(&chunk)?;
    }
    saved.tmp.as_file().sync_all()?;

    saved.mime_type = declared
        .or_else(|| infer::get(&head).map(|t| t.mime_type().to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(Some(saved))
}

pub async fn upload_file(
    cfg: web::Data<Config>,
    links: web::Data<Links>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut fields = PolicyFields::default();
    let mut saved: Option<SavedFile> = None;
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("invalid multipart".into()))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" if saved.is_none() => {
                saved = save_multipart_file(&cfg, &links, &mut field).await?;
            }
            "expire_value" => fields.expire_value = Some(read_text(&mut field).await?),
            "expire_unit" => fields.expire_unit = Some(read_text(&mut field).await?),
            "max_downloads_option" => {
                fields.max_downloads_option = Some(read_text(&mut field).await?)
            }
            "max_downloads" => fields.max_downloads = Some(read_text(&mut field).await?),
            _ => drain(&mut field).await?,
        }
    }

    let saved = saved.ok_or(ApiError::BadRequest("No file was uploaded.".into()))?;
    let policy = UploadPolicy::from_fields(&fields)?;
    let upload = NewUpload {
        storage_name: saved.storage_name.clone(),
        original_name: saved.original_name.clone(),
        mime_type: saved.mime_type.clone(),
    };
    let size = saved.size;
    let path = links.storage_path(&upload.storage_name);
    saved.persist(&path)?;
    let record = links.register(upload, &policy).inspect_err(|_| {
        remove_file_logged(&path);
    })?;

    log::info!(
        "upload storage_name={} original_name={:?} mime_type={:?} size={} expires_at={:?} max_downloads={:?}",
        record.storage_name,
        record.original_name,
        record.mime_type,
        size,
        record.expires_at,
        record.max_downloads
    );
    Ok(see_other(&format!(
        "/success?file={}",
        urlencoding::encode(&record.storage_name)
    )))
}

#[derive(Deserialize)]
pub struct SuccessQuery {
    pub file: Option<String>,
}

pub async fn success_page(
    req: HttpRequest,
    cfg: web::Data<Config>,
    query: web::Query<SuccessQuery>,
) -> HttpResponse {
    let Some(name) = query.file.as_deref().filter(|n| !n.is_empty()) else {
        return see_other("/app");
    };
    let base = match &cfg.public_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let info = req.connection_info();
            format!("{}://{}", info.scheme(), info.host())
        }
    };
    let link = format!("{}/f/{}", base, urlencoding::encode(name));
    html(render(&SuccessTemplate { link: &link }))
}

/// Content type to send for a stored, client-declared mime string.
pub fn response_mime(declared: &str) -> mime::Mime {
    declared
        .parse::<mime::Mime>()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

/// Types a browser can show by itself are served inline.
pub fn disposition_for(m: &mime::Mime) -> DispositionType {
    let top = m.type_();
    let previewable = top == mime::IMAGE
        || top == mime::VIDEO
        || top == mime::TEXT
        || m.essence_str() == "application/pdf";
    if previewable {
        DispositionType::Inline
    } else {
        DispositionType::Attachment
    }
}

pub fn filename_params(original: &str) -> Vec<DispositionParam> {
    let mut safe = sanitize(original);
    if safe.is_empty() {
        safe = "download".to_string();
    }
    let mut params = vec![DispositionParam::Filename(safe.clone())];
    if !safe.is_ascii() {
        params.push(DispositionParam::FilenameExt(ExtendedValue {
            charset: Charset::Ext(String::from("UTF-8")),
            language_tag: None,
            value: safe.into_bytes(),
        }));
    }
    params
}

pub async fn serve_file(
    req: HttpRequest,
    links: web::Data<Links>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let storage_name = path.into_inner();
    let record = links.resolve(&storage_name)?;

    let content_type = response_mime(&record.mime_type);
    let disposition = ContentDisposition {
        disposition: disposition_for(&content_type),
        parameters: filename_params(&record.original_name),
    };
    let named = NamedFile::open_async(&record.storage_path)
        .await
        .map_err(|e| {
            log::error!(
                "serve failed after charging storage_name={} err={e}",
                record.storage_name
            );
            ApiError::NotFound
        })?
        .use_last_modified(true)
        .set_content_type(content_type)
        .set_content_disposition(disposition);

    let mut resp = named.into_response(&req);
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_static("sandbox"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    Ok(resp)
}
