use crate::api::api_error::APIError;
use crate::api::auth::Authorized;
use crate::api::model::NameserverUpdate;
use crate::api::server::AppState;
use crate::error::Error;
use crate::rules::{Nameserver, RuleMap, Rules};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

type Select<V> = fn(&mut Rules) -> &mut RuleMap<V>;

pub(super) fn new(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .route(
            "/api/v1/nameservers",
            get(get_nameservers)
                .post(add_nameservers)
                .put(replace_nameservers),
        )
        .route("/api/v1/nameservers/:address", delete(delete_nameserver))
        .route(
            "/api/v1/servers",
            get(get_servers).post(merge_servers).put(replace_servers),
        )
        .route("/api/v1/servers/:suffix", delete(delete_server))
        .route(
            "/api/v1/domains",
            get(get_domains).post(merge_domains).put(replace_domains),
        )
        .route("/api/v1/domains/:suffix", delete(delete_domain))
        .route(
            "/api/v1/hosts",
            get(get_hosts).post(merge_hosts).put(replace_hosts),
        )
        .route("/api/v1/hosts/:pattern", delete(delete_host))
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/config/save", post(save_config))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api.timeout))
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

#[allow(clippy::unused_async)]
async fn get_nameservers(State(state): State<AppState>) -> Json<Vec<Nameserver>> {
    Json(state.rules.snapshot().rules().nameservers.clone())
}

async fn add_nameservers(
    State(state): State<AppState>,
    _: Authorized,
    WithRejection(Json(update), _): WithRejection<Json<NameserverUpdate>, APIError>,
) -> Result<Json<Vec<Nameserver>>, APIError> {
    update_nameservers(&state, |nameservers| update.clone().add_to(nameservers))
}

async fn replace_nameservers(
    State(state): State<AppState>,
    _: Authorized,
    WithRejection(Json(update), _): WithRejection<Json<NameserverUpdate>, APIError>,
) -> Result<Json<Vec<Nameserver>>, APIError> {
    update_nameservers(&state, |nameservers| update.clone().replace(nameservers))
}

async fn delete_nameserver(
    State(state): State<AppState>,
    _: Authorized,
    Path(address): Path<String>,
) -> Result<Json<Vec<Nameserver>>, APIError> {
    let not_found = || Error::NotFound(address.clone());
    let target: Nameserver = address.parse().map_err(|_| not_found())?;
    let table = state.rules.update(|table| {
        table.modify(|rules| {
            if !rules.nameservers.contains(&target) {
                return Err(not_found());
            }
            rules.nameservers.retain(|ns| *ns != target);
            Ok(())
        })
    })?;
    tracing::info!("removed nameserver {target}");
    Ok(Json(table.rules().nameservers.clone()))
}

fn update_nameservers<F>(state: &AppState, f: F) -> Result<Json<Vec<Nameserver>>, APIError>
where
    F: Fn(&mut Vec<Nameserver>),
{
    let table = state.rules.update(|table| {
        table.modify(|rules| {
            f(&mut rules.nameservers);
            Ok(())
        })
    })?;
    let nameservers = table.rules().nameservers.clone();
    tracing::info!("nameservers updated: {nameservers:?}");
    Ok(Json(nameservers))
}

#[allow(clippy::unused_async)]
async fn get_servers(State(state): State<AppState>) -> Json<RuleMap<Nameserver>> {
    show(&state, |rules| &mut rules.servers)
}

async fn merge_servers(
    State(state): State<AppState>,
    _: Authorized,
    WithRejection(Json(body), _): WithRejection<Json<RuleMap<Nameserver>>, APIError>,
) -> Result<Json<RuleMap<Nameserver>>, APIError> {
    merge(&state, "servers", body, |rules| &mut rules.servers)
}

async fn replace_servers(
    State(state): State<AppState>,
    _: Authorized,
    WithRejection(Json(body), _): WithRejection<Json<RuleMap<Nameserver>>, APIError>,
) -> Result<Json<RuleMap<Nameserver>>, APIError> {
    replace(&state, "servers", body, |rules| &mut rules.servers)
}

async fn delete_server(
    State(state): State<AppState>,
    _: Authorized,
    Path(suffix): Path<String>,
) -> Result<Json<RuleMap<Nameserver>>, APIError> {
    remove(&state, "servers", &suffix, |rules| &mut rules.servers)
}

#[allow(clippy::unused_async)]
async fn get_domains(State(state): State<AppState>) -> Json<RuleMap<String>> {
    show(&state, |rules| &mut rules.domains)
}

async fn merge_domains(
    State(state): State<AppState>,
    _: Authorized,
    WithRejection(Json(body), _): WithRejection<Json<RuleMap<String>>, APIError>,
) -> Result<Json<RuleMap<String>>, APIError> {
    merge(&state, "domains", body, |rules| &mut rules.domains)
}

async fn replace_domains(
    State(state): State<AppState>,
    _: Authorized,
    WithRejection(Json(body), _): WithRejection<Json<RuleMap<String>>, APIError>,
) -> Result<Json<RuleMap<String>>, APIError> {
    replace(&state, "domains", body, |rules| &mut rules.domains)
}

async fn delete_domain(
    State(state): State<AppState>,
    _: Authorized,
    Path(suffix): Path<String>,
) -> Result<Json<RuleMap<String>>, APIError> {
    remove(&state, "domains", &suffix, |rules| &mut rules.domains)
}

#[allow(clippy::unused_async)]
async fn get_hosts(State(state): State<AppState>) -> Json<RuleMap<String>> {
    show(&state, |rules| &mut rules.hosts)
}

async fn merge_hosts(
    State(state): State<AppState>,
    _: Authorized,
    WithRejection(Json(body), _): WithRejection<Json<RuleMap<String>>, APIError>,
) -> Result<Json<RuleMap<String>>, APIError> {
    merge(&state, "hosts", body, |rules| &mut rules.hosts)
}

async fn replace_hosts(
    State(state): State<AppState>,
    _: Authorized,
    WithRejection(Json(body), _): WithRejection<Json<RuleMap<String>>, APIError>,
) -> Result<Json<RuleMap<String>>, APIError> {
    replace(&state, "hosts", body, |rules| &mut rules.hosts)
}

async fn delete_host(
    State(state): State<AppState>,
    _: Authorized,
    Path(pattern): Path<String>,
) -> Result<Json<RuleMap<String>>, APIError> {
    remove(&state, "hosts", &pattern, |rules| &mut rules.hosts)
}

#[allow(clippy::unused_async)]
async fn get_config(State(state): State<AppState>) -> Json<Rules> {
    Json(state.rules.snapshot().rules().clone())
}

async fn save_config(
    State(state): State<AppState>,
    _: Authorized,
) -> Result<Json<Rules>, APIError> {
    let table = state.rules.snapshot();
    state.config.save_rules(table.rules()).await?;
    tracing::info!("saved rules to config file");
    Ok(Json(table.rules().clone()))
}

fn show<V: Clone>(state: &AppState, select: Select<V>) -> Json<RuleMap<V>> {
    let mut rules = state.rules.snapshot().rules().clone();
    Json(std::mem::take(select(&mut rules)))
}

fn merge<V: Clone>(
    state: &AppState,
    resource: &str,
    body: RuleMap<V>,
    select: Select<V>,
) -> Result<Json<RuleMap<V>>, APIError> {
    let table = state.rules.update(|table| {
        table.modify(|rules| {
            select(rules).merge(body.clone());
            Ok(())
        })
    })?;
    tracing::info!("{resource}: merged {} entries", body.len());
    Ok(Json(std::mem::take(select(&mut table.rules().clone()))))
}

fn replace<V: Clone>(
    state: &AppState,
    resource: &str,
    body: RuleMap<V>,
    select: Select<V>,
) -> Result<Json<RuleMap<V>>, APIError> {
    let table = state.rules.update(|table| {
        table.modify(|rules| {
            *select(rules) = body.clone();
            Ok(())
        })
    })?;
    tracing::info!("{resource}: replaced with {} entries", body.len());
    Ok(Json(std::mem::take(select(&mut table.rules().clone()))))
}

fn remove<V: Clone>(
    state: &AppState,
    resource: &str,
    key: &str,
    select: Select<V>,
) -> Result<Json<RuleMap<V>>, APIError> {
    let table = state.rules.update(|table| {
        table.modify(|rules| {
            select(rules)
                .remove(key)
                .map(drop)
                .ok_or_else(|| Error::NotFound(key.to_string()))
        })
    })?;
    tracing::info!("{resource}: removed \"{key}\"");
    Ok(Json(std::mem::take(select(&mut table.rules().clone()))))
}

#[cfg(test)]
mod tests {
    use super::new;
    use crate::api::server::AppState;
    use crate::config::Config;
    use crate::rules::RuleStore;
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEYED: &str = r#"{
        "nameservers": ["10.0.0.1"],
        "hosts": { "devlocal": "127.0.0.1" },
        "domains": { "dev": "127.0.0.1" },
        "api": { "enabled": true, "key": "sekrit" }
    }"#;

    fn app(config: &str) -> (Router, RuleStore) {
        let config = Config::try_from_slice(config.as_bytes()).unwrap();
        let rules = RuleStore::new(config.rule_table().unwrap());
        let state = AppState {
            config: Arc::new(config),
            rules: rules.clone(),
        };
        (new(state), rules)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            req = req.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        let req = match body {
            Some(body) => req
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_check() {
        let (app, _) = app(KEYED);
        let (status, body) = send(&app, Method::GET, "/healthcheck", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": "healthy"}));
    }

    #[tokio::test]
    async fn reads_need_no_key() {
        let (app, _) = app(KEYED);
        let (status, body) = send(&app, Method::GET, "/api/v1/hosts", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"devlocal": "127.0.0.1"}));

        let (status, body) = send(&app, Method::GET, "/api/v1/config", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nameservers"], json!(["10.0.0.1"]));
        assert_eq!(body["fallback_timeout"], json!(350));
    }

    #[tokio::test]
    async fn mutations_need_key() {
        let (app, rules) = app(KEYED);
        let body = Some(json!({"corp": "10.9.9.9"}));
        for key in [None, Some("wrong")] {
            let (status, _) = send(&app, Method::POST, "/api/v1/domains", key, body.clone()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        assert!(rules.snapshot().rules().domains.get("corp").is_none());

        let (status, body) =
            send(&app, Method::POST, "/api/v1/domains", Some("sekrit"), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"dev": "127.0.0.1", "corp": "10.9.9.9"}));
        assert_eq!(
            rules.snapshot().rules().domains.get("corp").map(String::as_str),
            Some("10.9.9.9")
        );
    }

    #[tokio::test]
    async fn no_key_configured_allows_mutation() {
        let (app, _) = app(r#"{"nameservers":["10.0.0.1"]}"#);
        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/v1/servers",
            None,
            Some(json!({"corp": "10.1.1.1:5353"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"corp": "10.1.1.1:5353"}));
    }

    #[tokio::test]
    async fn nameserver_post_put_delete() {
        let (app, rules) = app(KEYED);
        let key = Some("sekrit");

        let (_, body) = send(&app, Method::POST, "/api/v1/nameservers", key, Some(json!(["10.0.0.2"]))).await;
        assert_eq!(body, json!(["10.0.0.1", "10.0.0.2"]));

        let (_, body) = send(&app, Method::POST, "/api/v1/nameservers", key, Some(json!("10.0.0.3"))).await;
        assert_eq!(body, json!(["10.0.0.3", "10.0.0.1", "10.0.0.2"]));
        assert_eq!(rules.snapshot().default_nameserver().to_string(), "10.0.0.3");

        let (status, body) =
            send(&app, Method::DELETE, "/api/v1/nameservers/10.0.0.1", key, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["10.0.0.3", "10.0.0.2"]));

        let (status, _) =
            send(&app, Method::DELETE, "/api/v1/nameservers/10.0.0.1", key, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app, Method::PUT, "/api/v1/nameservers", key, Some(json!("10.0.0.4:5300"))).await;
        assert_eq!(body, json!(["10.0.0.4:5300"]));
    }

    #[tokio::test]
    async fn nameservers_never_empty() {
        let (app, rules) = app(KEYED);
        let key = Some("sekrit");
        let (status, _) = send(&app, Method::PUT, "/api/v1/nameservers", key, Some(json!([]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&app, Method::DELETE, "/api/v1/nameservers/10.0.0.1", key, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(rules.snapshot().rules().nameservers.len(), 1);
    }

    #[tokio::test]
    async fn bad_bodies() {
        let (app, _) = app(KEYED);
        let key = Some("sekrit");
        let (status, _) = send(&app, Method::PUT, "/api/v1/hosts", key, Some(json!(["a"]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::POST, "/api/v1/nameservers", key, Some(json!({"a": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, Method::POST, "/api/v1/hosts", key, Some(json!({"/(/": "10.0.0.1"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid host pattern"));
    }

    #[tokio::test]
    async fn host_merge_and_delete() {
        let (app, rules) = app(KEYED);
        let key = Some("sekrit");
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/v1/hosts",
            key,
            Some(json!({"gateway": "10.0.0.1", "devlocal": "gateway"})),
        )
        .await;
        assert_eq!(body, json!({"devlocal": "gateway", "gateway": "10.0.0.1"}));
        assert_eq!(
            rules.snapshot().rules().hosts.keys().collect::<Vec<_>>(),
            ["devlocal", "gateway"]
        );

        let (status, body) = send(&app, Method::DELETE, "/api/v1/hosts/gateway", key, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"devlocal": "gateway"}));

        let (status, _) = send(&app, Method::DELETE, "/api/v1/hosts/gateway", key, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn save_needs_config_file() {
        let (app, _) = app(KEYED);
        let (status, _) =
            send(&app, Method::POST, "/api/v1/config/save", Some("sekrit"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
