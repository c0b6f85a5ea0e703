use crate::links::Links;
use actix_web::{HttpResponse, web};

pub async fn health_check(links: web::Data<Links>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "health": true,
        "version": env!("CARGO_PKG_VERSION"),
        "files": links.file_count(),
    }))
}
