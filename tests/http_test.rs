//! HTTP surface tests, driving the router in-process.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chemical_api::{
    combine, range_filter, router, serialize, AppState, Credential, MemoryStore, NewChemical,
    SchemaRegistry, Settings,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn settings() -> Settings {
    Settings {
        admin: Credential::new("admin", "secret"),
        ..Settings::default()
    }
}

fn app_with(records: Vec<NewChemical>) -> Router {
    let settings = settings();
    let store = Arc::new(MemoryStore::with_records(records));
    router(
        AppState::new(&settings, SchemaRegistry::default(), store),
        &settings.cache,
    )
}

fn app() -> Router {
    app_with(vec![
        chemical("GaAs", 1.42, "Grey"),
        chemical("GaN", 3.4, "Yellow"),
        chemical("Si", 1.1, "Grey"),
    ])
}

fn chemical(formula: &str, band_gap: f64, color: &str) -> NewChemical {
    NewChemical {
        formula: formula.into(),
        band_gap,
        color: color.into(),
    }
}

fn admin() -> String {
    Credential::new("admin", "secret").to_basic_header()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, auth: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn where_uri(filter: &str) -> String {
    let mut uri = String::from("/chemicals?where=");
    for byte in filter.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => uri.push(byte as char),
            _ => uri.push_str(&format!("%{:02X}", byte)),
        }
    }
    uri
}

mod reads {
    use super::*;

    #[tokio::test]
    async fn index_is_public() {
        let (status, body) = send(app(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["_links"]["child"][0]["href"], "chemicals");
    }

    #[tokio::test]
    async fn api_docs_describe_schema() {
        let (status, body) = send(app(), get("/api-docs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "Chemical API");
        assert!(body["definitions"]["chemical"].is_object());
        assert!(body["paths"]["/chemicals"]["post"].is_object());
    }

    #[tokio::test]
    async fn list_reports_total() {
        let (status, body) = send(app(), get("/chemicals")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["_meta"]["total"], 3);
        assert_eq!(body["_meta"]["page"], 1);
        assert_eq!(body["_items"].as_array().unwrap().len(), 3);
        assert_eq!(body["_items"][0]["formula"], "GaAs");
    }

    #[tokio::test]
    async fn list_with_band_gap_filter() {
        let filter = combine(range_filter("band_gap", Some(0.0), Some(3.0)).unwrap()).unwrap();
        let (status, body) = send(app(), get(&where_uri(&serialize(&filter)))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["_meta"]["total"], 2);
        let formulas: Vec<&str> = body["_items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["formula"].as_str().unwrap())
            .collect();
        assert_eq!(formulas, vec!["GaAs", "Si"]);
    }

    #[tokio::test]
    async fn empty_where_lists_everything() {
        for filter in ["{}", r#"{"$and":[]}"#] {
            let (status, body) = send(app(), get(&where_uri(filter))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["_meta"]["total"], 3);
        }
    }

    #[tokio::test]
    async fn paging_keeps_total() {
        let (status, body) = send(app(), get("/chemicals?page=2&max_results=2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["_meta"]["total"], 3);
        assert_eq!(body["_meta"]["max_results"], 2);
        assert_eq!(body["_items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blacklisted_operator_is_bad_request() {
        let (status, body) = send(app(), get(&where_uri(r#"{"$where":"sleep(100)"}"#))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["_status"], "ERR");
    }

    #[tokio::test]
    async fn malformed_filter_is_bad_request() {
        let (status, _) = send(app(), get(&where_uri("{not json"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_numeric_page_is_bad_request() {
        let (status, _) = send(app(), get("/chemicals?page=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let (status, body) = send(app(), get("/chemicals/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["_error"]["code"], 404);
    }

    #[tokio::test]
    async fn responses_carry_cache_headers() {
        let response = app().oneshot(get("/chemicals")).await.unwrap();
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "max-age=20"
        );
        let expires = response.headers().get(header::EXPIRES).unwrap();
        assert!(expires.to_str().unwrap().ends_with(" GMT"));
    }
}

mod writes {
    use super::*;

    const VALID: &str = r#"{"formula":"Kr1Pt0N1T3","band_gap":1e6,"color":"Green"}"#;

    #[tokio::test]
    async fn invalid_auth_is_unauthorized() {
        let wrong = Credential::new("admin", "wrong").to_basic_header();
        let response = app()
            .oneshot(post("/chemicals", Some(&wrong), VALID))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn missing_auth_is_unauthorized() {
        let (status, _) = send(app(), post("/chemicals", None, VALID)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_auth_header_is_unauthorized() {
        let (status, _) = send(app(), post("/chemicals", Some("Basic %%%"), VALID)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn no_body_is_bad_request() {
        let (status, _) = send(app(), post("/chemicals", Some(&admin()), "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_record_is_unprocessable() {
        let (status, body) = send(app(), post("/chemicals", Some(&admin()), "{}")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let issues = body["_issues"].as_object().unwrap();
        let fields: Vec<&str> = issues.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["formula", "band_gap", "color"]);
        assert_eq!(issues["formula"], "required field");
    }

    #[tokio::test]
    async fn create_then_filter_excludes_it() {
        let app = app_with(Vec::new());

        let (status, body) = send(app.clone(), post("/chemicals", Some(&admin()), VALID)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["_status"], "OK");
        assert_eq!(body["formula"], "Kr1Pt0N1T3");
        let id = body["_id"].as_str().unwrap().to_string();

        let (status, body) = send(app.clone(), get(&format!("/chemicals/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["color"], "Green");

        let filter = combine(range_filter("band_gap", Some(0.0), Some(3.0)).unwrap()).unwrap();
        let (_, body) = send(app, get(&where_uri(&serialize(&filter)))).await;
        assert_eq!(body["_meta"]["total"], 0);
    }

    #[tokio::test]
    async fn patch_and_delete_item() {
        let app = app_with(Vec::new());
        let (_, body) = send(app.clone(), post("/chemicals", Some(&admin()), VALID)).await;
        let uri = format!("/chemicals/{}", body["_id"].as_str().unwrap());

        let patch = Request::patch(&uri)
            .header(header::AUTHORIZATION, admin())
            .body(Body::from(json!({ "color": "Blue" }).to_string()))
            .unwrap();
        let (status, body) = send(app.clone(), patch).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["color"], "Blue");
        assert_eq!(body["band_gap"], 1e6);

        let anonymous = Request::delete(&uri).body(Body::empty()).unwrap();
        let (status, _) = send(app.clone(), anonymous).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let delete = Request::delete(&uri)
            .header(header::AUTHORIZATION, admin())
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app.clone(), delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_collection() {
        let app = app();
        let delete = Request::delete("/chemicals")
            .header(header::AUTHORIZATION, admin())
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app.clone(), delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(app, get("/chemicals")).await;
        assert_eq!(body["_meta"]["total"], 0);
    }

    #[tokio::test]
    async fn unrouted_method_not_allowed() {
        let patch = Request::patch("/chemicals")
            .header(header::AUTHORIZATION, admin())
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(app(), patch).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["_status"], "ERR");
        assert_eq!(body["_error"]["code"], 405);
    }

    #[tokio::test]
    async fn unknown_route_has_error_envelope() {
        let (status, body) = send(app(), get("/elements")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["_status"], "ERR");
        assert_eq!(body["_error"]["code"], 404);
    }
}
