//! askama templates for the browser-facing pages. Templates under
//! `templates/` are `.html`, so every interpolated value is escaped.

use askama::Template;

use crate::links::{FileRow, Overview};
use crate::models::file::LinkStatus;

pub fn render<T: Template>(tpl: &T) -> String {
    tpl.render().unwrap_or_else(|e| {
        log::error!("template render failed: {e}");
        "Template error".to_string()
    })
}

#[derive(Template)]
#[template(path = "landing.html")]
pub struct LandingTemplate;

#[derive(Template)]
#[template(path = "upload.html")]
pub struct UploadTemplate;

#[derive(Template)]
#[template(path = "success.html")]
pub struct SuccessTemplate<'a> {
    pub link: &'a str,
}

#[derive(Template)]
#[template(path = "upload_failed.html")]
pub struct UploadFailedTemplate<'a> {
    pub message: &'a str,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate<'a> {
    pub error: Option<&'a str>,
}

/// One admin table row, already formatted for display.
pub struct AdminRow {
    pub storage_name: String,
    pub href: String,
    pub original_name: String,
    pub mime_type: String,
    pub uploaded: String,
    pub expires: String,
    pub download_count: u32,
    pub limit: String,
    pub status_label: &'static str,
    pub status_class: &'static str,
}

impl From<&FileRow> for AdminRow {
    fn from(row: &FileRow) -> Self {
        let r = &row.record;
        AdminRow {
            storage_name: r.storage_name.clone(),
            href: urlencoding::encode(&r.storage_name).into_owned(),
            original_name: r.original_name.clone(),
            mime_type: r.mime_type.clone(),
            uploaded: r.uploaded_at.format("%Y-%m-%d").to_string(),
            expires: r
                .expires_at
                .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "never".to_string()),
            download_count: r.download_count,
            limit: r
                .max_downloads
                .map(|m| m.to_string())
                .unwrap_or_else(|| "∞".to_string()),
            status_label: row.status.label(),
            status_class: match row.status {
                LinkStatus::Active => "status-active",
                LinkStatus::Expired => "status-expired",
                LinkStatus::LimitReached => "status-limit",
            },
        }
    }
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminTemplate<'a> {
    pub username: &'a str,
    pub total_files: usize,
    pub total_downloads: u64,
    pub active_links: usize,
    pub rows: Vec<AdminRow>,
}

impl<'a> AdminTemplate<'a> {
    pub fn new(username: &'a str, overview: &Overview) -> Self {
        AdminTemplate {
            username,
            total_files: overview.total_files,
            total_downloads: overview.total_downloads,
            active_links: overview.active_links,
            rows: overview.rows.iter().map(AdminRow::from).collect(),
        }
    }
}
