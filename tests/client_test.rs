//! Client tests against a mock server.

#![cfg(feature = "remote")]

use chemical_api::{ChemicalClient, ClientError, Credential, NewChemical};
use mockito::Matcher;

fn meta(total: u64) -> String {
    format!(r#"{{"_items":[],"_meta":{{"page":1,"max_results":25,"total":{}}}}}"#, total)
}

#[test]
fn band_gap_query_sends_conjunction() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/chemicals")
        .match_query(Matcher::UrlEncoded(
            "where".into(),
            r#"{"$and":[{"band_gap":{"$gt":0.0}},{"band_gap":{"$lt":3.0}}]}"#.into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(meta(7))
        .create();

    let client = ChemicalClient::with_base_url(server.url()).unwrap();
    let total = client.query_by_band_gap(Some(0.0), Some(3.0)).unwrap();

    assert_eq!(total, 7);
    mock.assert();
}

#[test]
fn single_bound_is_sent_unwrapped() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/chemicals")
        .match_query(Matcher::UrlEncoded(
            "where".into(),
            r#"{"band_gap":{"$lt":3.0}}"#.into(),
        ))
        .with_status(200)
        .with_body(meta(2))
        .create();

    let client = ChemicalClient::with_base_url(server.url()).unwrap();
    assert_eq!(client.query_by_band_gap(None, Some(3.0)).unwrap(), 2);
    mock.assert();
}

#[test]
fn no_bounds_sends_no_filter() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/chemicals")
        .match_query(Matcher::Missing)
        .with_status(200)
        .with_body(meta(40))
        .create();

    let client = ChemicalClient::with_base_url(server.url()).unwrap();
    assert_eq!(client.query_by_band_gap(None, None).unwrap(), 40);
    mock.assert();
}

#[test]
fn element_and_band_gap_query() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/chemicals")
        .match_query(Matcher::UrlEncoded(
            "where".into(),
            r#"{"$and":[{"band_gap":{"$gt":0.0}},{"band_gap":{"$lt":3.0}},{"formula":{"$regex":"Ga"}}]}"#
                .into(),
        ))
        .with_status(200)
        .with_body(meta(3))
        .create();

    let client = ChemicalClient::with_base_url(server.url()).unwrap();
    let total = client
        .query_by_element_and_band_gap("Ga", Some(0.0), Some(3.0))
        .unwrap();

    assert_eq!(total, 3);
    mock.assert();
}

#[test]
fn missing_total_is_error() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/chemicals")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"_items":[]}"#)
        .create();

    let client = ChemicalClient::with_base_url(server.url()).unwrap();
    let err = client.query_by_element("Ga").unwrap_err();
    assert!(matches!(err, ClientError::MissingTotal { .. }));
}

#[test]
fn post_sends_basic_auth() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/chemicals")
        .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
        .match_body(Matcher::Json(serde_json::json!({
            "formula": "Kr1Pt0N1T3",
            "band_gap": 1e6,
            "color": "Green"
        })))
        .with_status(201)
        .with_body(r#"{"_status":"OK","_id":"abc"}"#)
        .create();

    let client = ChemicalClient::with_base_url(server.url()).unwrap();
    let chemical = NewChemical {
        formula: "Kr1Pt0N1T3".into(),
        band_gap: 1e6,
        color: "Green".into(),
    };
    let body = client
        .post_chemical(&chemical, &Credential::new("admin", "secret"))
        .unwrap();

    assert_eq!(body["_id"], "abc");
    mock.assert();
}

#[test]
fn rejected_post_reports_status() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/chemicals")
        .with_status(401)
        .with_body(r#"{"_status":"ERR"}"#)
        .create();

    let client = ChemicalClient::with_base_url(server.url()).unwrap();
    let chemical = NewChemical {
        formula: "H2O".into(),
        band_gap: 1.2,
        color: "Clear".into(),
    };
    let err = client
        .post_chemical(&chemical, &Credential::new("admin", "wrong"))
        .unwrap_err();

    match err {
        ClientError::Status { status, .. } => assert_eq!(status, 401),
        other => panic!("expected status error, got {:?}", other),
    }
    assert_eq!(
        ClientError::MissingTotal { url: String::new() }.exit_code(),
        1
    );
}
