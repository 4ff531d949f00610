//! HTTP API for inspecting and changing the running rules.
//!
//! Every change is applied to a copy of the current [`RuleTable`][crate::rules::RuleTable] and
//! published atomically; queries already being resolved finish with the table they started
//! with. Changes are not written to the config file unless
//! [`/api/v1/config/save`](#apiv1configsave-post) is called.
//!
//! # Authentication
//!
//! When [`ApiConfig::key`][`crate::config::ApiConfig::key`] is set, every `POST`, `PUT` and
//! `DELETE` must present it, either as a bearer token or as the username of basic credentials:
//!
//! ```bash
//! ❯ curl -H 'Authorization: Bearer XXXX' ...
//! ❯ curl -u XXXX: ...
//! ```
//!
//! Otherwise HTTP 401 (Unauthorized) is returned. `GET` requests are never authenticated.
//!
//! # API Endpoints
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the service is operational.
//!
//! ## `/api/v1/nameservers` (GET, POST, PUT)
//!
//!   The default nameservers, as a JSON list. The first is also the fallback nameserver.
//!
//!   `POST` a list to append to the nameservers, or a single string to make it the new first
//!   nameserver. `PUT` a list or a single string to replace the nameservers.
//!
//!   ```bash
//!   ❯ curl --json '"10.0.0.53"' -H 'Authorization: Bearer XXXX' \
//!       http://localhost:5959/api/v1/nameservers
//!   ["10.0.0.53","8.8.8.8"]
//!   ```
//!
//!   Changes that would leave no nameservers return HTTP 400 (Bad Request).
//!
//! ## `/api/v1/nameservers/{address}` (DELETE)
//!
//!   Remove a nameserver. Returns HTTP 404 (Not Found) if it isn't configured.
//!
//! ## `/api/v1/servers`, `/api/v1/domains`, `/api/v1/hosts` (GET, POST, PUT)
//!
//!   The per-domain nameservers, domain answers and host answers, as JSON objects in
//!   declaration order.
//!
//!   `POST` an object to merge it in: existing keys keep their place and take the new value, new
//!   keys are added at the end. `PUT` an object to replace the whole table.
//!
//!   ```bash
//!   ❯ curl --json '{"devlocal":"127.0.0.1"}' -H 'Authorization: Bearer XXXX' \
//!       http://localhost:5959/api/v1/hosts
//!   {"devlocal":"127.0.0.1"}
//!   ```
//!
//!   Bodies that aren't objects, invalid nameserver addresses and host patterns that aren't
//!   valid regular expressions return HTTP 400 (Bad Request).
//!
//! ## `/api/v1/servers/{suffix}`, `/api/v1/domains/{suffix}`, `/api/v1/hosts/{pattern}` (DELETE)
//!
//!   Remove one entry. Returns HTTP 404 (Not Found) if it doesn't exist.
//!
//! ## `/api/v1/config` (GET)
//!
//!   All of the current rules.
//!
//! ## `/api/v1/config/save` (POST)
//!
//!   Write the current rules to the config file the proxy was started with, leaving the other
//!   settings as they are.

mod api_error;
mod auth;
mod model;
mod routes;
pub mod server;

pub use server::new;
