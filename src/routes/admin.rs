use actix_web::{HttpResponse, web};

use crate::{
    auth::AdminSession,
    links::Links,
    templates::{render, AdminTemplate},
};

use super::{html, see_other};

pub async fn admin_page(session: AdminSession, links: web::Data<Links>) -> HttpResponse {
    let overview = links.overview();
    html(render(&AdminTemplate::new(&session.username, &overview)))
}

pub async fn delete_file(
    session: AdminSession,
    links: web::Data<Links>,
    path: web::Path<String>,
) -> HttpResponse {
    let storage_name = path.into_inner();
    let removed = links.delete(&storage_name);
    log::info!(
        "AdminAction: delete_file admin={} storage_name={} removed={}",
        session.username,
        storage_name,
        removed
    );
    see_other("/admin")
}
