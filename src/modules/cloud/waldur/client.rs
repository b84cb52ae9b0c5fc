//! Blocking HTTP client for the Waldur REST API.
//!
//! Resources are addressed by URL. Lookups accept either a UUID (fetched
//! directly) or an exact name (listed with `name_exact` and required to match
//! exactly one object). Mutating calls can block until the affected resource
//! reaches a terminal state.

use super::{
    ClientError, ClientResult, CreateSecurityGroup, ResourceState, SecurityGroup,
    SecurityGroupClient, SecurityGroupRule, Tenant, WaitOptions, SECURITY_GROUP, TENANT,
};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use url::Url;

const TENANTS_ENDPOINT: &str = "openstack-tenants/";
const SECURITY_GROUPS_ENDPOINT: &str = "openstack-security-groups/";

/// Default timeout in seconds for a single HTTP request
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Transport options for [`HttpWaldurClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub request_timeout: Duration,
    pub validate_certs: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            validate_certs: true,
        }
    }
}

#[derive(Serialize)]
struct CreatePayload<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    rules: &'a [SecurityGroupRule],
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a [String]>,
}

#[derive(Serialize)]
struct DescriptionPayload<'a> {
    name: &'a str,
    description: &'a str,
}

fn parse_url(raw: &str) -> ClientResult<Url> {
    Url::parse(raw).map_err(|source| ClientError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Parse a URL that further paths get joined onto, so it must end in `/`.
fn parse_base_url(raw: &str) -> ClientResult<Url> {
    if raw.ends_with('/') {
        parse_url(raw)
    } else {
        parse_url(&format!("{}/", raw))
    }
}

fn join(base: &Url, path: &str) -> ClientResult<Url> {
    base.join(path).map_err(|source| ClientError::InvalidUrl {
        url: format!("{}{}", base, path),
        source,
    })
}

fn is_uuid(value: &str) -> bool {
    uuid::Uuid::parse_str(value).is_ok()
}

/// Whether another poll after `interval` still fits before the timeout.
fn poll_again(start: Instant, wait: &WaitOptions) -> bool {
    start
        .elapsed()
        .checked_add(wait.interval)
        .is_some_and(|next| next <= wait.timeout)
}

/// Waldur API client
pub struct HttpWaldurClient {
    api_url: Url,
    access_token: String,
    http: Client,
}

impl HttpWaldurClient {
    pub fn new(api_url: &str, access_token: impl Into<String>) -> ClientResult<Self> {
        Self::with_options(api_url, access_token, &HttpOptions::default())
    }

    pub fn with_options(
        api_url: &str,
        access_token: impl Into<String>,
        options: &HttpOptions,
    ) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(options.request_timeout)
            .connect_timeout(options.request_timeout / 2)
            .danger_accept_invalid_certs(!options.validate_certs)
            .build()?;

        Ok(Self {
            api_url: parse_base_url(api_url)?,
            access_token: access_token.into(),
            http,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Send a request, turning non-2xx responses into [`ClientError::Api`]
    fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request
            .header(header::AUTHORIZATION, format!("token {}", self.access_token))
            .header(header::ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            body
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn get<T: DeserializeOwned>(&self, url: Url, query: &[(&str, &str)]) -> ClientResult<T> {
        tracing::debug!("GET {} {:?}", url, query);
        Self::decode(self.send(self.http.get(url).query(query))?)
    }

    /// Fetch a single object by UUID, or by exact name among the filtered list.
    fn get_resource<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        kind: &'static str,
        identifier: &str,
        filters: &[(&str, &str)],
    ) -> ClientResult<T> {
        let base = join(&self.api_url, endpoint)?;

        if is_uuid(identifier) {
            let url = join(&base, &format!("{}/", identifier))?;
            return self.get(url, &[]).map_err(|e| {
                if e.is_not_found() {
                    ClientError::NotFound {
                        kind,
                        identifier: identifier.to_string(),
                    }
                } else {
                    e
                }
            });
        }

        let mut query = vec![("name_exact", identifier)];
        query.extend_from_slice(filters);
        let mut objects: Vec<T> = self.get(base, &query)?;

        match objects.len() {
            0 => Err(ClientError::NotFound {
                kind,
                identifier: identifier.to_string(),
            }),
            1 => Ok(objects.remove(0)),
            _ => Err(ClientError::MultipleObjectsReturned {
                kind,
                identifier: identifier.to_string(),
            }),
        }
    }

    /// Look up a tenant by UUID or name, optionally scoped to a project.
    pub fn get_tenant(&self, tenant: &str, project: Option<&str>) -> ClientResult<Tenant> {
        let filters: Vec<(&str, &str)> = match project {
            Some(p) if is_uuid(p) => vec![("project_uuid", p)],
            Some(p) => vec![("project_name", p)],
            None => Vec::new(),
        };
        self.get_resource(TENANTS_ENDPOINT, TENANT, tenant, &filters)
    }

    fn fetch_security_group(&self, url: &str) -> ClientResult<SecurityGroup> {
        self.get(parse_url(url)?, &[])
    }

    /// Poll a security group until it is `OK`, fails, or the timeout passes.
    fn wait_for_security_group(
        &self,
        url: &str,
        wait: &WaitOptions,
    ) -> ClientResult<SecurityGroup> {
        let start = Instant::now();

        loop {
            let group = self.fetch_security_group(url)?;
            match group.resource_state() {
                Some(ResourceState::Ok) | None => return Ok(group),
                Some(ResourceState::Erred) => {
                    return Err(ClientError::Erred {
                        kind: SECURITY_GROUP,
                        identifier: group.name,
                    })
                }
                Some(ResourceState::InProgress(state)) => {
                    tracing::debug!("Security group '{}' is {}", group.name, state);
                }
            }

            if !poll_again(start, wait) {
                return Err(ClientError::Timeout {
                    kind: SECURITY_GROUP,
                    identifier: group.name,
                    timeout: wait.timeout,
                });
            }
            std::thread::sleep(wait.interval);
        }
    }

    /// Poll a security group until the API no longer knows it.
    fn wait_for_deletion(&self, group: &SecurityGroup, wait: &WaitOptions) -> ClientResult<()> {
        let start = Instant::now();

        loop {
            match self.fetch_security_group(&group.url) {
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
                Ok(current) if current.resource_state() == Some(ResourceState::Erred) => {
                    return Err(ClientError::Erred {
                        kind: SECURITY_GROUP,
                        identifier: group.name.clone(),
                    })
                }
                Ok(_) => {}
            }

            if !poll_again(start, wait) {
                return Err(ClientError::Timeout {
                    kind: SECURITY_GROUP,
                    identifier: group.name.clone(),
                    timeout: wait.timeout,
                });
            }
            std::thread::sleep(wait.interval);
        }
    }
}

impl SecurityGroupClient for HttpWaldurClient {
    fn get_security_group(&self, tenant: &str, identifier: &str) -> ClientResult<SecurityGroup> {
        let tenant = self.get_tenant(tenant, None)?;
        self.get_resource(
            SECURITY_GROUPS_ENDPOINT,
            SECURITY_GROUP,
            identifier,
            &[("tenant_uuid", tenant.uuid.as_str())],
        )
    }

    fn create_security_group(&self, request: &CreateSecurityGroup) -> ClientResult<SecurityGroup> {
        let tenant = self.get_tenant(&request.tenant, request.project.as_deref())?;
        let url = join(&parse_base_url(&tenant.url)?, "create_security_group/")?;

        let payload = CreatePayload {
            name: &request.name,
            description: request.description.as_deref(),
            rules: &request.rules,
            tags: request.tags.as_deref(),
        };

        tracing::info!(
            "Creating security group '{}' in tenant '{}' with {} rule(s)",
            request.name,
            tenant.name,
            request.rules.len()
        );
        let group: SecurityGroup = Self::decode(self.send(self.http.post(url).json(&payload))?)?;

        if request.wait.wait {
            self.wait_for_security_group(&group.url, &request.wait)
        } else {
            Ok(group)
        }
    }

    fn update_security_group_description(
        &self,
        group: &SecurityGroup,
        description: &str,
    ) -> ClientResult<()> {
        let payload = DescriptionPayload {
            name: &group.name,
            description,
        };

        tracing::info!("Updating description of security group '{}'", group.name);
        self.send(self.http.put(parse_url(&group.url)?).json(&payload))?;
        Ok(())
    }

    fn update_security_group_rules(
        &self,
        group: &SecurityGroup,
        rules: &[SecurityGroupRule],
        wait: &WaitOptions,
    ) -> ClientResult<()> {
        let url = join(&parse_base_url(&group.url)?, "set_rules/")?;

        tracing::info!(
            "Replacing rules of security group '{}' with {} rule(s)",
            group.name,
            rules.len()
        );
        self.send(self.http.post(url).json(rules))?;

        if wait.wait {
            self.wait_for_security_group(&group.url, wait)?;
        }
        Ok(())
    }

    fn delete_security_group(&self, group: &SecurityGroup, wait: &WaitOptions) -> ClientResult<()> {
        tracing::info!("Deleting security group '{}'", group.name);
        match self.send(self.http.delete(parse_url(&group.url)?)) {
            Ok(_) => {}
            // Already gone
            Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(())
            }
            Err(e) => return Err(e),
        }

        if wait.wait {
            self.wait_for_deletion(group, wait)?;
        }
        Ok(())
    }
}
