use crate::api::routes;
use crate::config::SharedConfig;
use crate::rules::RuleStore;
use std::future::Future;

#[derive(Clone)]
pub(super) struct AppState {
    pub config: SharedConfig,
    pub rules: RuleStore,
}

/// Bind the admin API to [`ApiConfig::bind_addr`][`crate::config::ApiConfig::bind_addr`],
/// returning a future that serves it.
///
/// # Errors
///
/// Returns an error if the address can't be bound.
pub fn new(
    config: SharedConfig,
    rules: RuleStore,
) -> hyper::Result<impl Future<Output = hyper::Result<()>>> {
    let server = axum::Server::try_bind(&config.api.bind_addr)?;
    Ok(server.serve(routes::new(AppState { config, rules }).into_make_service()))
}
