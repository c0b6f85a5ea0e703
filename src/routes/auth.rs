use crate::{
    auth::{self, AdminCredentials, AdminSession},
    config::Config,
    errors::ApiError,
    templates::{render, LoginTemplate},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use super::{html, see_other};

pub async fn login_page(req: HttpRequest) -> HttpResponse {
    if AdminSession::from_http(&req).is_ok() {
        return see_other("/admin");
    }
    html(render(&LoginTemplate { error: None }))
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

pub async fn authenticate(
    cfg: web::Data<Config>,
    creds: web::Data<AdminCredentials>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, ApiError> {
    if !creds.check(&form.username, &form.password) {
        log::warn!("AdminAction: login_failed username={:?}", form.username);
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth::create_session_token(&creds.username, &cfg)?;
    log::info!("AdminAction: login username={}", creds.username);
    Ok(HttpResponse::SeeOther()
        .insert_header((actix_web::http::header::LOCATION, "/admin"))
        .cookie(auth::session_cookie(token, &cfg))
        .finish())
}

pub async fn logout() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((actix_web::http::header::LOCATION, "/login"))
        .cookie(auth::removal_cookie())
        .finish()
}
