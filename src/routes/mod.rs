pub mod admin;
pub mod auth;
pub mod files;
pub mod health;

use actix_web::http::header;
use actix_web::{HttpResponse, web};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(files::landing))
        .route("/app", web::get().to(files::upload_form))
        .route("/upload", web::post().to(files::upload_file))
        .route("/success", web::get().to(files::success_page))
        .route("/f/{storage_name}", web::get().to(files::serve_file))
        .route("/login", web::get().to(auth::login_page))
        .route("/auth", web::post().to(auth::authenticate))
        .route("/logout", web::get().to(auth::logout))
        .route("/admin", web::get().to(admin::admin_page))
        .route("/delete/{storage_name}", web::get().to(admin::delete_file))
        .route("/health", web::get().to(health::health_check));
}

pub(crate) fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

pub(crate) fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, AdminCredentials, SESSION_COOKIE};
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::links::Links;
    use crate::store::{JsonFileStore, RecordStore};
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    const BOUNDARY: &str = "----droplinkTestBoundary";

    struct TestEnv {
        dir: tempfile::TempDir,
        clock: Arc<ManualClock>,
        store: Arc<JsonFileStore>,
        cfg: Config,
        links: web::Data<Links>,
        creds: web::Data<AdminCredentials>,
    }

    fn test_env() -> TestEnv {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config {
            uploads_dir: dir.path().join("uploads").to_string_lossy().into_owned(),
            store_path: dir.path().join("data.json").to_string_lossy().into_owned(),
            session_secret: Some("route-test-secret".into()),
            max_upload_size: 1024,
            ..Config::default()
        };
        cfg.prepare_dirs().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
        ));
        let store = Arc::new(JsonFileStore::open(&cfg.store_path).unwrap());
        let links = web::Data::new(Links::new(
            store.clone(),
            clock.clone(),
            cfg.uploads_path(),
            cfg.name_bytes,
        ));
        let creds = web::Data::new(AdminCredentials::new(
            "admin",
            hash_password("correct horse").unwrap(),
        ));
        TestEnv {
            dir,
            clock,
            store,
            cfg,
            links,
            creds,
        }
    }

    macro_rules! app {
        ($env:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($env.cfg.clone()))
                    .app_data($env.links.clone())
                    .app_data($env.creds.clone())
                    .configure(configure),
            )
            .await
        };
    }

    fn multipart(file: Option<(&str, &str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    fn storage_name_from(location: &str) -> String {
        location
            .strip_prefix("/success?file=")
            .expect("redirect to success page")
            .to_string()
    }

    fn uploaded_files(env: &TestEnv) -> usize {
        std::fs::read_dir(env.dir.path().join("uploads")).unwrap().count()
    }

    #[actix_web::test]
    async fn upload_then_download_round_trip() {
        let env = test_env();
        let app = app!(env);

        let body = multipart(
            Some(("notes.txt", "text/plain", &b"hello droplink"[..])),
            &[
                ("expire_value", "1"),
                ("expire_unit", "unlimited"),
                ("max_downloads", "unlimited"),
            ],
        );
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        let name = storage_name_from(location);
        assert!(name.ends_with(".txt"));
        assert_eq!(uploaded_files(&env), 1);
        assert!(env.dir.path().join("uploads").join(&name).is_file());

        for expected in 1..=3u32 {
            let req = test::TestRequest::get().uri(&format!("/f/{name}")).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let disposition = resp
                .headers()
                .get(header::CONTENT_DISPOSITION)
                .unwrap()
                .to_str()
                .unwrap()
                .to_string();
            assert!(disposition.starts_with("inline"), "{disposition}");
            assert!(disposition.contains("notes.txt"));
            assert!(resp
                .headers()
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/plain"));
            assert_eq!(
                resp.headers().get(header::CONTENT_SECURITY_POLICY).unwrap(),
                "sandbox"
            );
            assert_eq!(
                resp.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
                "nosniff"
            );
            assert_eq!(test::read_body(resp).await, &b"hello droplink"[..]);
            assert_eq!(env.store.load()[&name].download_count, expected);
        }
    }

    #[actix_web::test]
    async fn download_limit_then_gone() {
        let env = test_env();
        let app = app!(env);

        let body = multipart(
            Some(("archive.zip", "application/zip", &b"PK\x03\x04data"[..])),
            &[("expire_unit", "unlimited"), ("max_downloads", "2")],
        );
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        let name = storage_name_from(resp.headers().get(header::LOCATION).unwrap().to_str().unwrap());

        for _ in 0..2 {
            let req = test::TestRequest::get().uri(&format!("/f/{name}")).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let disposition = resp.headers().get(header::CONTENT_DISPOSITION).unwrap();
            assert!(disposition.to_str().unwrap().starts_with("attachment"));
        }

        let req = test::TestRequest::get().uri(&format!("/f/{name}")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("download limit"));
        assert_eq!(uploaded_files(&env), 0);

        let req = test::TestRequest::get().uri(&format!("/f/{name}")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn time_limited_link_expires() {
        let env = test_env();
        let app = app!(env);

        let body = multipart(
            Some(("clip.mp4", "video/mp4", &b"...."[..])),
            &[
                ("expire_value", "1"),
                ("expire_unit", "minutes"),
                ("max_downloads_option", "unlimited"),
            ],
        );
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        let name = storage_name_from(resp.headers().get(header::LOCATION).unwrap().to_str().unwrap());

        env.clock.advance(Duration::seconds(30));
        let req = test::TestRequest::get().uri(&format!("/f/{name}")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        env.clock.advance(Duration::seconds(31));
        let req = test::TestRequest::get().uri(&format!("/f/{name}")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("expired"));
        assert!(env.store.load().is_empty());
    }

    #[actix_web::test]
    async fn upload_without_file_is_rejected() {
        let env = test_env();
        let app = app!(env);

        let body = multipart(None, &[("expire_unit", "days"), ("expire_value", "2")]);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("No file was uploaded."));

        // browsers send an empty file part when nothing was picked
        let body = multipart(Some(("", "application/octet-stream", &b""[..])), &[]);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(env.store.load().is_empty());
    }

    #[actix_web::test]
    async fn rejected_upload_leaves_no_file_behind() {
        let env = test_env();
        let app = app!(env);

        let body = multipart(
            Some(("a.txt", "text/plain", &b"abc"[..])),
            &[("expire_unit", "fortnights")],
        );
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(uploaded_files(&env), 0);

        let big = vec![b'x'; 2048];
        let body = multipart(Some(("big.bin", "application/octet-stream", &big[..])), &[]);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(uploaded_files(&env), 0);
        assert!(env.store.load().is_empty());
    }

    #[actix_web::test]
    async fn unknown_link_is_not_found() {
        let env = test_env();
        let app = app!(env);
        let req = test::TestRequest::get().uri("/f/deadbe.png").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn success_page_shows_escaped_link() {
        let mut env = test_env();
        env.cfg.public_url = Some("https://drop.example.org/".into());
        let app = app!(env);
        let req = test::TestRequest::get()
            .uri("/success?file=ab12cd.txt")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains("drop.example.org"));
        assert!(body.contains("ab12cd.txt"));
        assert!(!body.contains("drop.example.org//f"));
    }

    #[actix_web::test]
    async fn admin_pages_require_login() {
        let env = test_env();
        let app = app!(env);
        for uri in ["/admin", "/delete/ab12cd.txt"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");
        }

        let req = test::TestRequest::get()
            .uri("/admin")
            .cookie(Cookie::new(SESSION_COOKIE, "forged"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[actix_web::test]
    async fn wrong_password_is_unauthorized() {
        let env = test_env();
        let app = app!(env);
        let req = test::TestRequest::post()
            .uri("/auth")
            .set_form([("username", "admin"), ("password", "wrong")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.response().cookies().next().is_none());
    }

    #[actix_web::test]
    async fn admin_session_lists_and_deletes() {
        let env = test_env();
        let app = app!(env);

        let mut names = Vec::new();
        for (file, max) in [("one.txt", "unlimited"), ("two.png", "1")] {
            let body = multipart(
                Some((file, "text/plain", &b"data"[..])),
                &[("expire_unit", "unlimited"), ("max_downloads", max)],
            );
            let resp = test::call_service(&app, upload_request(body).to_request()).await;
            names.push(storage_name_from(
                resp.headers().get(header::LOCATION).unwrap().to_str().unwrap(),
            ));
            env.clock.advance(Duration::seconds(1));
        }
        for name in [&names[0], &names[0], &names[1]] {
            let req = test::TestRequest::get().uri(&format!("/f/{name}")).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = test::TestRequest::post()
            .uri("/auth")
            .set_form([("username", "admin"), ("password", "correct horse")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/admin");
        let token = resp
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .expect("session cookie")
            .value()
            .to_string();
        let session = || Cookie::new(SESSION_COOKIE, token.clone());

        let req = test::TestRequest::get().uri("/login").cookie(session()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/admin");

        let req = test::TestRequest::get().uri("/admin").cookie(session()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(page.contains("Total files: 2"));
        assert!(page.contains("Total downloads: 3"));
        assert!(page.contains("Active links: 1"));
        assert!(page.contains("Limit reached"));

        for _ in 0..2 {
            let req = test::TestRequest::get()
                .uri(&format!("/delete/{}", names[0]))
                .cookie(session())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
            assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/admin");
            assert!(!env.store.load().contains_key(&names[0]));
        }
        assert_eq!(uploaded_files(&env), 1);

        let req = test::TestRequest::get().uri("/logout").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");
        let cleared = resp.response().cookies().find(|c| c.name() == SESSION_COOKIE);
        assert_eq!(cleared.map(|c| c.value().to_string()), Some(String::new()));
    }

    #[actix_web::test]
    async fn health_reports_file_count() {
        let env = test_env();
        let app = app!(env);
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["health"], true);
        assert_eq!(body["files"], 0);
    }
}
