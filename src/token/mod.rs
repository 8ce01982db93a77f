//! Token acquisition under the supported grant flows.
//!
//! # Flows
//!
//! | Flow | Selected when | Endpoint |
//! |---|---|---|
//! | client credentials | `as_app` | `{login}/{tenant}/oauth2/v2.0/token` |
//! | operator refresh | default | `{login}/{tenant}/oauth2/v2.0/token` |
//! | cross-application | app id and refresh token both given | `{login}/{tenant}/oauth2/v2.0/token` |
//! | classic refresh | classic APIs | `{login}/{tenant}/oauth2/token` |
//!
//! The `exchangeonline` scope alias swaps in the Exchange Online application
//! and the Exchange refresh token.
//!
//! Tokens are reused per (tenant, flow, scope) until they come within the
//! configured grace period of expiry. Concurrent requests for the same key
//! share one upstream call.

mod cache;
mod provider;
mod request;
mod set;

pub use provider::TokenProvider;
pub use request::{
    Audience, DEFAULT_GRAPH_SCOPE, EXCHANGE_APP_ID, EXCHANGE_SCOPE, EXCHANGE_SCOPE_ALIAS,
    GrantFlow, GraphTokenParams, TokenRequest,
};
pub use set::{AUTHORIZATION, TokenSet};
