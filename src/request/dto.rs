//! Typed request descriptions.

use serde::Serialize;
use serde_json::{Map, Value};

/// Resource of the classic admin center.
pub const CLASSIC_ADMIN_RESOURCE: &str = "https://admin.microsoft.com";

/// Resource of the Teams admin API.
pub const TEAMS_RESOURCE: &str = "48ac35b8-9aa8-4d74-927d-1f4a14a0b239";

/// Application id header value expected by the Teams admin API.
pub const TEAMS_APPLICATION_ID: &str = "045268c0-445e-4ac1-9157-d58f67b167d9";

/// Resource of Exchange Online.
pub const EXCHANGE_RESOURCE: &str = "https://outlook.office365.com";

/// A Graph call against one tenant.
///
/// ```rust
/// use partner_graph::request::GraphRequest;
///
/// let request = GraphRequest::new("https://graph.microsoft.com/v1.0/users", "contoso.com")
///     .as_app()
///     .single_page();
/// assert!(request.is_single_page());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRequest {
    pub(crate) uri: String,
    pub(crate) tenant: String,
    pub(crate) scope: Option<String>,
    pub(crate) as_app: bool,
    pub(crate) single_page: bool,
    pub(crate) actor: Option<String>,
}

impl GraphRequest {
    /// `uri` may be absolute or a path (`/v1.0/users`) under the Graph base.
    pub fn new(uri: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            tenant: tenant.into(),
            scope: None,
            as_app: false,
            single_page: false,
            actor: None,
        }
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn as_app(mut self) -> Self {
        self.as_app = true;
        self
    }

    /// Do not follow `@odata.nextLink`.
    pub fn single_page(mut self) -> Self {
        self.single_page = true;
        self
    }

    /// User recorded in audit entries.
    pub fn on_behalf_of(mut self, username: impl Into<String>) -> Self {
        self.actor = Some(username.into());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn is_single_page(&self) -> bool {
        self.single_page
    }
}

/// A call to a classic (non-Graph) admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicRequest {
    pub(crate) uri: String,
    pub(crate) tenant: String,
    pub(crate) resource: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) single_page: bool,
    pub(crate) actor: Option<String>,
}

impl ClassicRequest {
    /// Request against the admin center resource. `uri` may be a path under
    /// the classic admin base.
    pub fn new(uri: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            tenant: tenant.into(),
            resource: CLASSIC_ADMIN_RESOURCE.to_string(),
            headers: Vec::new(),
            single_page: false,
            actor: None,
        }
    }

    /// Request against the Teams admin API.
    pub fn teams(uri: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self::new(uri, tenant)
            .resource(TEAMS_RESOURCE)
            .header("x-ms-tnm-applicationid", TEAMS_APPLICATION_ID)
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Extra header; `Authorization` is ignored.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Do not follow `NextLink`.
    pub fn single_page(mut self) -> Self {
        self.single_page = true;
        self
    }

    pub fn on_behalf_of(mut self, username: impl Into<String>) -> Self {
        self.actor = Some(username.into());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}

/// An Exchange Online cmdlet invocation.
///
/// Serializes to `{"CmdletInput":{"CmdletName":..,"Parameters":{..}}}`.
///
/// ```rust
/// use partner_graph::request::ExoCommand;
///
/// let command = ExoCommand::new("Get-Mailbox").parameter("ResultSize", "Unlimited");
/// let body = serde_json::to_value(&command).unwrap();
/// assert_eq!(body["CmdletInput"]["CmdletName"], "Get-Mailbox");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExoCommand {
    #[serde(rename = "CmdletInput")]
    cmdlet_input: CmdletInput,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct CmdletInput {
    #[serde(rename = "CmdletName")]
    cmdlet_name: String,
    #[serde(rename = "Parameters", skip_serializing_if = "Map::is_empty")]
    parameters: Map<String, Value>,
}

impl ExoCommand {
    pub fn new(cmdlet_name: impl Into<String>) -> Self {
        Self {
            cmdlet_input: CmdletInput {
                cmdlet_name: cmdlet_name.into(),
                parameters: Map::new(),
            },
        }
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cmdlet_input
            .parameters
            .insert(name.into(), value.into());
        self
    }

    pub fn cmdlet_name(&self) -> &str {
        &self.cmdlet_input.cmdlet_name
    }
}
