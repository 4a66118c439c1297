//! The TeamCity REST client: request executor plus the API operations.
//!
//! # Design
//! `TeamCityClient` holds the host, the credentials and an injected
//! [`Transport`], and nothing else. Every operation is one round-trip:
//! [`TeamCityClient::build_request`] produces the `HttpRequest` without I/O,
//! [`TeamCityClient::execute`] sends it, and
//! [`TeamCityClient::execute_into`] decodes the body into the caller's type.
//! Status codes are not interpreted except where a missing entity maps to
//! `ApiError::NotFound`.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    Build, BuildPage, CancelBuildOptions, CancelBuildRequest, Change, ChangePage, PropertyList,
    QueueBuildRequest,
};

const REST_ROOT: &str = "/httpAuth/app/rest";
const SEARCH_FIELDS: &str = "count,build(*,tags(tag),triggered(*),properties(property))";

/// Synchronous client for a TeamCity server.
///
/// Cheap to share: operations take `&self` and keep no state between calls,
/// so one client can serve many threads when `T` is a pooling transport.
#[derive(Clone)]
pub struct TeamCityClient<T = UreqTransport> {
    host: String,
    username: String,
    password: String,
    transport: T,
}

impl TeamCityClient<UreqTransport> {
    /// A client backed by a default [`UreqTransport`].
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self::with_transport(host, username, password, UreqTransport::default())
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_transport(
            &config.host,
            &config.username,
            &config.password,
            UreqTransport::new(config.timeout),
        )
    }
}

impl<T: Transport> TeamCityClient<T> {
    /// `host` is a bare authority such as `tc.example.com:8111`; a leading
    /// scheme or trailing `/` is dropped. Requests always go over HTTPS.
    pub fn with_transport(host: &str, username: &str, password: &str, transport: T) -> Self {
        let host = host
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        Self {
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            transport,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Queue a build of `build_type_id`.
    ///
    /// A non-empty `branch_name` is sent as `refs/heads/<branch_name>`.
    pub fn queue_build(
        &self,
        build_type_id: &str,
        branch_name: &str,
        properties: &HashMap<String, String>,
    ) -> Result<Build, ApiError> {
        let payload = QueueBuildRequest::new(build_type_id, branch_name, properties);
        let mut build: Build = self.execute_into(
            HttpMethod::Post,
            &format!("{REST_ROOT}/buildQueue"),
            Some(&payload),
        )?;
        build.normalize();
        Ok(build)
    }

    /// Search builds with a server-side locator such as
    /// `buildType:Proj_Build,branch:main`. The locator is sent verbatim.
    pub fn search_builds(&self, locator: &str) -> Result<Vec<Build>, ApiError> {
        let path = format!("{REST_ROOT}/builds/?locator={locator}&fields={SEARCH_FIELDS}");
        let page: Option<BuildPage> = self.execute_into(HttpMethod::Get, &path, None::<&()>)?;

        let mut builds = page.unwrap_or_default().build;
        for build in &mut builds {
            build.normalize();
        }
        Ok(builds)
    }

    pub fn get_build(&self, build_id: &str) -> Result<Build, ApiError> {
        let path = format!("{REST_ROOT}/builds/id:{build_id}");
        let response = self.send(HttpMethod::Get, &path, None::<&()>)?;
        if response.status == 404 {
            return Err(ApiError::NotFound("build"));
        }

        let mut build = decode_optional::<Build>(&response.body)?.ok_or(ApiError::NotFound("build"))?;
        build.normalize();
        Ok(build)
    }

    /// Fetch the fully resolved parameter set of a build.
    pub fn get_build_properties(&self, build_id: &str) -> Result<HashMap<String, String>, ApiError> {
        let path = format!("{REST_ROOT}/builds/id:{build_id}/resulting-properties");
        let list: Option<PropertyList> = self.execute_into(HttpMethod::Get, &path, None::<&()>)?;
        Ok(list.unwrap_or_default().into_map())
    }

    /// Fetch the changes listed at `path`, usually a build's `changes_href`.
    pub fn get_changes(&self, path: &str) -> Result<Vec<Change>, ApiError> {
        let response = self.send(HttpMethod::Get, path, None::<&()>)?;
        if response.status == 404 {
            return Err(ApiError::NotFound("changes"));
        }

        let page: ChangePage = decode(&response.body)?;
        page.change.ok_or(ApiError::NotFound("changes"))
    }

    /// Cancel a build and put it back into the queue.
    pub fn cancel_build(&self, build_id: i64, comment: &str) -> Result<(), ApiError> {
        self.cancel_build_with(build_id, comment, true)
    }

    /// Cancel a build; `read_into_queue` controls whether it is re-queued.
    pub fn cancel_build_with(
        &self,
        build_id: i64,
        comment: &str,
        read_into_queue: bool,
    ) -> Result<(), ApiError> {
        let payload = CancelBuildRequest {
            build_cancel_request: CancelBuildOptions {
                comment: comment.to_string(),
                read_into_queue,
            },
        };
        self.execute(
            HttpMethod::Post,
            &format!("{REST_ROOT}/id:{build_id}"),
            Some(&payload),
        )
        .map(|_| ())
    }

    /// Build the request for `method` on the server-relative `path`.
    pub fn build_request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<HttpRequest, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        let body = match body {
            Some(payload) => {
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(serde_json::to_string(payload).map_err(ApiError::Serialization)?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method,
            url: format!(
                "https://{}:{}@{}{path}",
                self.username, self.password, self.host
            ),
            headers,
            body,
        })
    }

    /// Send a request and return the raw response body.
    pub fn execute<B>(&self, method: HttpMethod, path: &str, body: Option<&B>) -> Result<Vec<u8>, ApiError>
    where
        B: Serialize + ?Sized,
    {
        Ok(self.send(method, path, body)?.body)
    }

    /// Send a request and decode the response body as `R`.
    pub fn execute_into<B, R>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send(method, path, body)?;
        decode(&response.body)
    }

    fn send<B>(&self, method: HttpMethod, path: &str, body: Option<&B>) -> Result<HttpResponse, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.build_request(method, path, body)?;
        debug!(method = %method, url = %request.redacted_url(), "sending request");

        let response = self.transport.send(request)?;
        debug!(status = response.status, bytes = response.body.len(), "received response");
        Ok(response)
    }
}

impl<T> fmt::Debug for TeamCityClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeamCityClient")
            .field("host", &self.host)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn decode<R: DeserializeOwned>(body: &[u8]) -> Result<R, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::decode(e, body))
}

/// Like [`decode`], but an empty body or JSON `null` yields `None`.
fn decode_optional<R: DeserializeOwned>(body: &[u8]) -> Result<Option<R>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    decode(body)
}
