use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug)]
pub struct QueuedBuild {
    pub id: i64,
    pub build_type_id: String,
    pub branch_name: Option<String>,
    pub state: String,
    pub status: Option<String>,
    pub status_text: Option<String>,
    pub number: Option<i64>,
    pub triggered_by: String,
    pub properties: Vec<Property>,
}

impl QueuedBuild {
    /// The TeamCity JSON representation. Flags are sent as strings and the
    /// build number as an integer, the way some server versions do.
    pub fn to_json(&self) -> Value {
        let default_branch = if self.branch_name.is_none() { "true" } else { "false" };
        let mut build = json!({
            "id": self.id,
            "buildTypeId": self.build_type_id,
            "state": self.state,
            "defaultBranch": default_branch,
            "personal": "false",
            "href": format!("/httpAuth/app/rest/builds/id:{}", self.id),
            "tags": {"count": 1, "tag": [{"name": "mock"}]},
            "triggered": {"type": "user", "user": {"username": self.triggered_by}},
            "properties": {"count": self.properties.len(), "property": self.properties},
            "changes": {"href": changes_href(self.id)},
        });
        if let Some(branch) = &self.branch_name {
            build["branchName"] = json!(branch);
        }
        if let Some(status) = &self.status {
            build["status"] = json!(status);
        }
        if let Some(text) = &self.status_text {
            build["statusText"] = json!(text);
        }
        if let Some(number) = self.number {
            build["number"] = json!(number);
        }
        build
    }

    /// What `resulting-properties` reports: the posted parameters plus the
    /// ones the server injects itself.
    pub fn resulting_properties(&self) -> Vec<Property> {
        let mut props = vec![Property {
            name: "teamcity.build.id".to_string(),
            value: self.id.to_string(),
        }];
        props.extend(self.properties.iter().cloned());
        props
    }
}

pub fn changes_href(build_id: i64) -> String {
    format!("/httpAuth/app/rest/changes?locator=build:(id:{build_id})")
}

#[derive(Debug)]
pub struct Server {
    next_id: i64,
    builds: BTreeMap<i64, QueuedBuild>,
}

pub type Db = Arc<RwLock<Server>>;

#[derive(Clone)]
struct AppState {
    db: Db,
    username: Arc<str>,
    expected_auth: Arc<str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueBuildRequest {
    #[serde(default)]
    pub build_type_id: String,
    pub branch_name: Option<String>,
    #[serde(default)]
    pub properties: PropertyList,
}

#[derive(Default, Deserialize)]
pub struct PropertyList {
    #[serde(default)]
    pub property: Vec<Property>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBuildRequest {
    pub build_cancel_request: CancelOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOptions {
    pub comment: String,
    #[serde(default)]
    pub read_into_queue: bool,
}

#[derive(Deserialize)]
pub struct LocatorQuery {
    #[serde(default)]
    pub locator: String,
}

/// A fake TeamCity accepting basic auth for `username` / `password`.
pub fn app(username: &str, password: &str) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Server {
            next_id: 1,
            builds: BTreeMap::new(),
        })),
        username: Arc::from(username),
        expected_auth: Arc::from(format!(
            "Basic {}",
            BASE64.encode(format!("{username}:{password}"))
        )),
    };

    Router::new()
        .route("/httpAuth/app/rest/buildQueue", post(queue_build))
        .route("/httpAuth/app/rest/builds/", get(search_builds))
        .route("/httpAuth/app/rest/builds/{locator}", get(get_build))
        .route(
            "/httpAuth/app/rest/builds/{locator}/resulting-properties",
            get(get_resulting_properties),
        )
        .route("/httpAuth/app/rest/changes", get(get_changes))
        .route("/httpAuth/app/rest/{locator}", post(cancel_build))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
        .with_state(state)
}

pub async fn run(listener: TcpListener, username: &str, password: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(username, password)).await
}

async fn require_basic_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == &*state.expected_auth);
    if !authorized {
        debug!(uri = %request.uri(), "rejecting unauthenticated request");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    next.run(request).await
}

/// Parse an `id:<n>` locator.
fn build_id(locator: &str) -> Option<i64> {
    locator.strip_prefix("id:")?.parse().ok()
}

/// Whether `build` satisfies every known `dimension:value` pair of a
/// comma-separated locator. Unknown dimensions are ignored.
fn matches_locator(build: &QueuedBuild, locator: &str) -> bool {
    locator
        .split(',')
        .filter_map(|dimension| dimension.split_once(':'))
        .all(|(key, value)| match key {
            "id" => value.parse::<i64>().is_ok_and(|id| id == build.id),
            "buildType" => build.build_type_id == value,
            "state" => value == "any" || build.state == value,
            _ => true,
        })
}

async fn queue_build(
    State(state): State<AppState>,
    Json(input): Json<QueueBuildRequest>,
) -> Json<Value> {
    let mut server = state.db.write().await;
    let id = server.next_id;
    server.next_id += 1;

    let build = QueuedBuild {
        id,
        build_type_id: input.build_type_id,
        branch_name: input.branch_name,
        state: "queued".to_string(),
        status: None,
        status_text: None,
        number: None,
        triggered_by: state.username.to_string(),
        properties: input.properties.property,
    };
    info!(id, build_type = %build.build_type_id, "queued build");
    let body = build.to_json();
    server.builds.insert(id, build);
    Json(body)
}

async fn search_builds(
    State(state): State<AppState>,
    Query(query): Query<LocatorQuery>,
) -> Json<Value> {
    let server = state.db.read().await;
    let builds: Vec<Value> = server
        .builds
        .values()
        .filter(|b| matches_locator(b, &query.locator))
        .map(QueuedBuild::to_json)
        .collect();

    if builds.is_empty() {
        return Json(json!({"count": 0}));
    }
    Json(json!({"count": builds.len(), "build": builds}))
}

async fn get_build(State(state): State<AppState>, Path(locator): Path<String>) -> Response {
    let server = state.db.read().await;
    match build_id(&locator).and_then(|id| server.builds.get(&id)) {
        Some(build) => Json(build.to_json()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_resulting_properties(
    State(state): State<AppState>,
    Path(locator): Path<String>,
) -> Response {
    let server = state.db.read().await;
    match build_id(&locator).and_then(|id| server.builds.get(&id)) {
        Some(build) => {
            let props = build.resulting_properties();
            Json(json!({"count": props.len(), "property": props})).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// One synthetic change per build; unknown builds get a list without the
/// `change` key, as TeamCity does for empty results.
async fn get_changes(State(state): State<AppState>, Query(query): Query<LocatorQuery>) -> Json<Value> {
    let server = state.db.read().await;
    let build = query
        .locator
        .strip_prefix("build:(")
        .and_then(|rest| rest.strip_suffix(')'))
        .and_then(build_id)
        .and_then(|id| server.builds.get(&id));

    match build {
        Some(build) => Json(json!({
            "count": 1,
            "change": [{
                "id": build.id * 100,
                "version": format!("rev-{}", build.id),
                "username": build.triggered_by,
                "href": format!("/httpAuth/app/rest/changes/id:{}", build.id * 100),
            }],
        })),
        None => Json(json!({"count": 0})),
    }
}

async fn cancel_build(
    State(state): State<AppState>,
    Path(locator): Path<String>,
    Json(input): Json<CancelBuildRequest>,
) -> StatusCode {
    let mut server = state.db.write().await;
    let Some(build) = build_id(&locator).and_then(|id| server.builds.get_mut(&id)) else {
        return StatusCode::NOT_FOUND;
    };

    let options = input.build_cancel_request;
    build.status_text = Some(format!("Canceled: {}", options.comment));
    if options.read_into_queue {
        build.state = "queued".to_string();
    } else {
        build.state = "finished".to_string();
        build.status = Some("UNKNOWN".to_string());
        build.number = Some(build.id);
    }
    info!(id = build.id, requeued = options.read_into_queue, "canceled build");
    StatusCode::OK
}
