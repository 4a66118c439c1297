//! Full build lifecycle against the mock TeamCity server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every client
//! operation over real HTTP through `UreqTransport`. The mock speaks plain
//! HTTP, so the test transport downgrades the scheme before delegating; the
//! credential handling and header plumbing are the production ones.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use teamcity_core::{
    ApiError, HttpRequest, HttpResponse, TeamCityClient, Transport, TransportError, UreqTransport,
};

const USER: &str = "bob";
const PASSWORD: &str = "s3cret";

struct PlainHttp(UreqTransport);

impl Transport for PlainHttp {
    fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, TransportError> {
        request.url = request.url.replacen("https://", "http://", 1);
        self.0.send(request)
    }
}

fn start_mock_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, USER, PASSWORD).await
        })
        .unwrap();
    });

    addr
}

fn client(addr: SocketAddr, password: &str) -> TeamCityClient<PlainHttp> {
    TeamCityClient::with_transport(
        &addr.to_string(),
        USER,
        password,
        PlainHttp(UreqTransport::new(Duration::from_secs(5))),
    )
}

#[test]
fn build_lifecycle() {
    let addr = start_mock_server();
    let client = client(addr, PASSWORD);

    // Step 1: search — nothing queued yet.
    let builds = client.search_builds("buildType:Proj_Build").unwrap();
    assert!(builds.is_empty(), "expected no builds");

    // Step 2: queue a build on a branch with one parameter.
    let props = HashMap::from([("env.GREETING".to_string(), "hello".to_string())]);
    let queued = client.queue_build("Proj_Build", "feature", &props).unwrap();
    assert_eq!(queued.build_type_id, "Proj_Build");
    assert_eq!(queued.state.as_deref(), Some("queued"));
    assert_eq!(queued.branch_name.as_deref(), Some("refs/heads/feature"));
    assert!(!queued.default_branch);
    assert_eq!(queued.tags, vec!["mock"]);
    assert_eq!(queued.properties["env.GREETING"], "hello");
    let id = queued.id;

    // Step 3: queue a second build on the default branch.
    let other = client.queue_build("Proj_Build", "", &HashMap::new()).unwrap();
    assert!(other.default_branch);
    assert!(other.branch_name.is_none());

    // Step 4: search finds both, normalized.
    let builds = client.search_builds("buildType:Proj_Build").unwrap();
    assert_eq!(builds.len(), 2);
    assert_eq!(builds[0], queued);

    // Step 5: get by id.
    let fetched = client.get_build(&id.to_string()).unwrap();
    assert_eq!(fetched, queued);

    // Step 6: resulting properties include the server's own.
    let resolved = client.get_build_properties(&id.to_string()).unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved["env.GREETING"], "hello");
    assert_eq!(resolved["teamcity.build.id"], id.to_string());

    // Step 7: follow the build's changes link.
    let href = fetched.changes_href.as_deref().expect("changes href");
    let changes = client.get_changes(href).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].version.as_deref(), Some(format!("rev-{id}").as_str()));

    // Step 8: cancel and re-queue.
    client.cancel_build(id, "superseded").unwrap();
    let requeued = client.get_build(&id.to_string()).unwrap();
    assert_eq!(requeued.state.as_deref(), Some("queued"));
    assert_eq!(requeued.status_text.as_deref(), Some("Canceled: superseded"));

    // Step 9: cancel for good; the number arrives as an integer on the wire.
    client.cancel_build_with(other.id, "not needed", false).unwrap();
    let finished = client.get_build(&other.id.to_string()).unwrap();
    assert_eq!(finished.state.as_deref(), Some("finished"));
    assert_eq!(finished.number, Some(other.id.to_string()));

    // Step 10: unknown builds are NotFound, not decode errors.
    let err = client.get_build("9999").unwrap_err();
    assert!(matches!(err, ApiError::NotFound("build")));

    let err = client
        .get_changes("/httpAuth/app/rest/changes?locator=build:(id:9999)")
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound("changes")));
}

#[test]
fn wrong_password_surfaces_as_decode_error() {
    let addr = start_mock_server();
    let client = client(addr, "wrong");

    let err = client.get_build_properties("1").unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }), "got {err:?}");
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr, PASSWORD).search_builds("state:any").unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "got {err:?}");
}
