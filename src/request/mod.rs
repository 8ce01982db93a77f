//! Authenticated, paginated request execution.
//!
//! [`Transport`] owns the HTTP side: tokens, headers, cursors and outcome
//! normalisation. [`GraphExecutor`] puts the authorization gate and the audit
//! trail in front of it and is what request handlers call.
//!
//! # Request lifecycle
//!
//! ```text
//! Start ─► Denied
//!   │
//!   ▼
//! Authorized ─► TokenUnavailable
//!   │
//!   ▼
//! Fetching ─► page appended ─► Fetching
//!   │
//!   ├─► Exhausted (Completed)
//!   └─► upstream error ─► Exhausted (Partial / Failed)
//! ```

mod dto;
mod executor;
mod outcome;
mod transport;

pub use dto::{
    CLASSIC_ADMIN_RESOURCE, ClassicRequest, EXCHANGE_RESOURCE, ExoCommand, GraphRequest,
    TEAMS_APPLICATION_ID, TEAMS_RESOURCE,
};
pub use executor::{ACCESS_DENIED_MESSAGE, GraphExecutor};
pub use outcome::{RequestOutcome, UpstreamFailure, flatten_pages};
pub use reqwest::Method;
pub use transport::{CLASSIC_NEXT_LINK, EXCHANGE_ANCHOR_MAILBOX, ODATA_NEXT_LINK, Transport};
