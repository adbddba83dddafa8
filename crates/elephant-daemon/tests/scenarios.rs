//! End-to-end scenarios over a real socket.
//!
//! Each test boots an isolated daemon on a socket in a temp directory,
//! registers purpose-built test providers, and speaks the wire protocol
//! through the proto client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::time::timeout;

use elephant_core::provider::{Activation, Provider, QueryContext};
use elephant_core::Registry;
use elephant_daemon::{Server, ServerConfig, Service, Subscriptions};
use elephant_proto::messages::{
    ActivateRequest, Item, ItemType, MenuRequest, ProviderStateRequest, ProviderStateResponse,
    QueryRequest, SubscribeRequest, SubscribeResponse,
};
use elephant_proto::{Client, Format, RequestType, ResponseFrame, Status, decode_payload};

// =========================================================================
// Harness
// =========================================================================

struct TestDaemon {
    subscriptions: Arc<Subscriptions>,
    socket: std::path::PathBuf,
    _dir: TempDir,
}

async fn spawn_daemon(providers: Vec<Arc<dyn Provider>>) -> TestDaemon {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("elephant.sock");

    let subscriptions = Subscriptions::new();
    let registry = Arc::new(Registry::build(providers, &[]));
    let service = Service::new(registry, Arc::clone(&subscriptions));

    let server = Server::bind(ServerConfig::new(&socket)).unwrap();
    tokio::spawn(async move {
        let _ = server.run(service).await;
    });

    TestDaemon {
        subscriptions,
        socket,
        _dir: dir,
    }
}

async fn connect(daemon: &TestDaemon) -> Client {
    Client::connect(&daemon.socket).await.unwrap()
}

async fn next(client: &mut Client) -> ResponseFrame {
    timeout(Duration::from_secs(2), client.next_frame())
        .await
        .expect("timed out waiting for a frame")
        .expect("connection closed unexpectedly")
        .expect("protocol error")
}

fn query(providers: &[&str], query: &str, maxresults: i32) -> QueryRequest {
    QueryRequest {
        providers: providers.iter().map(|p| (*p).to_string()).collect(),
        query: query.to_string(),
        maxresults,
        exactsearch: false,
    }
}

fn item(provider: &str, identifier: &str, text: &str, score: i32) -> Item {
    Item {
        identifier: identifier.to_string(),
        text: text.to_string(),
        provider: provider.to_string(),
        score,
        r#type: ItemType::Regular as i32,
        ..Default::default()
    }
}

// =========================================================================
// Test providers
// =========================================================================

/// Fixed result set, any query.
struct Fixture {
    items: Vec<Item>,
}

#[async_trait]
impl Provider for Fixture {
    fn name(&self) -> &'static str {
        "apps"
    }

    fn name_pretty(&self) -> String {
        "Apps".to_string()
    }

    fn doc(&self) -> String {
        String::new()
    }

    async fn query(
        &self,
        _ctx: &QueryContext,
        _query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        self.items.clone()
    }

    async fn activate(&self, _activation: Activation<'_>) {}
}

fn fixture() -> Arc<dyn Provider> {
    Arc::new(Fixture {
        items: vec![
            item("apps", "b.desktop", "beta", 40),
            item("apps", "a.desktop", "alpha", 90),
            item("apps", "c.desktop", "gamma", 40),
            item("apps", "d.desktop", "delta", 10),
            item("apps", "e.desktop", "epsilon", 70),
        ],
    })
}

/// Always empty.
struct Void;

#[async_trait]
impl Provider for Void {
    fn name(&self) -> &'static str {
        "void"
    }

    fn name_pretty(&self) -> String {
        "Void".to_string()
    }

    fn doc(&self) -> String {
        String::new()
    }

    async fn query(
        &self,
        _ctx: &QueryContext,
        _query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        Vec::new()
    }

    async fn activate(&self, _activation: Activation<'_>) {}
}

/// Returns a placeholder and pushes the solved item a moment later.
struct SlowSolver;

#[async_trait]
impl Provider for SlowSolver {
    fn name(&self) -> &'static str {
        "calc"
    }

    fn name_pretty(&self) -> String {
        "Calc".to_string()
    }

    fn doc(&self) -> String {
        String::new()
    }

    async fn query(
        &self,
        ctx: &QueryContext,
        query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        let mut placeholder = item("calc", query, "calculating...", 100);
        placeholder.subtext = query.to_string();

        let ctx = ctx.clone();
        let mut solved = placeholder.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            solved.text = "4".to_string();
            ctx.update_item(&solved).await;
        });

        vec![placeholder]
    }

    async fn activate(&self, _activation: Activation<'_>) {}
}

/// Records activations.
struct Recorder {
    count: AtomicU32,
    last_identifier: std::sync::Mutex<String>,
}

#[async_trait]
impl Provider for Recorder {
    fn name(&self) -> &'static str {
        "exec"
    }

    fn name_pretty(&self) -> String {
        "Exec".to_string()
    }

    fn doc(&self) -> String {
        String::new()
    }

    async fn query(
        &self,
        _ctx: &QueryContext,
        _query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        Vec::new()
    }

    async fn activate(&self, activation: Activation<'_>) {
        self.count.fetch_add(1, Ordering::SeqCst);
        *self.last_identifier.lock().unwrap() = activation.identifier.to_string();
    }
}

/// Stands in for the menus provider in state tests.
struct MenuStub;

#[async_trait]
impl Provider for MenuStub {
    fn name(&self) -> &'static str {
        "menus"
    }

    fn name_pretty(&self) -> String {
        "Menus".to_string()
    }

    fn doc(&self) -> String {
        String::new()
    }

    async fn query(
        &self,
        _ctx: &QueryContext,
        _query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        Vec::new()
    }

    async fn activate(&self, _activation: Activation<'_>) {}

    fn state(&self, _provider_key: &str) -> ProviderStateResponse {
        ProviderStateResponse {
            provider: String::new(),
            states: vec!["open".to_string()],
            actions: vec!["menus:parent".to_string()],
        }
    }
}

/// Result set that changes on every query.
struct Ticker {
    polls: AtomicU32,
}

#[async_trait]
impl Provider for Ticker {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn name_pretty(&self) -> String {
        "Clock".to_string()
    }

    fn doc(&self) -> String {
        String::new()
    }

    async fn query(
        &self,
        _ctx: &QueryContext,
        _query: &str,
        _single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        let tick = self.polls.fetch_add(1, Ordering::SeqCst);
        vec![item("clock", "now", &format!("tick {tick}"), 1)]
    }

    async fn activate(&self, _activation: Activation<'_>) {}
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn query_streams_ranked_items_then_done_then_end_of_stream() {
    let daemon = spawn_daemon(vec![fixture()]).await;
    let mut client = connect(&daemon).await;

    client
        .send(RequestType::Query, Format::Json, &query(&["apps"], "", 0))
        .await
        .unwrap();

    let mut scores = Vec::new();
    loop {
        let frame = next(&mut client).await;
        match frame.status {
            Status::QueryItem => {
                let item: Item = decode_payload(Format::Json, &frame.payload).unwrap();
                assert_eq!(item.provider, "apps");
                scores.push(item.score);
            }
            Status::Done => break,
            other => panic!("unexpected status before Done: {other:?}"),
        }
    }

    assert_eq!(scores, vec![90, 70, 40, 40, 10], "ranked, ties by text");
    assert_eq!(next(&mut client).await.status, Status::EndOfStream);
}

#[tokio::test]
async fn unknown_provider_yields_only_the_terminators() {
    let daemon = spawn_daemon(vec![fixture()]).await;
    let mut client = connect(&daemon).await;

    client
        .send(
            RequestType::Query,
            Format::Json,
            &query(&["nonexistent"], "anything", 0),
        )
        .await
        .unwrap();

    assert_eq!(next(&mut client).await.status, Status::Done);
    assert_eq!(next(&mut client).await.status, Status::EndOfStream);
}

#[tokio::test]
async fn empty_provider_list_stays_silent() {
    let daemon = spawn_daemon(vec![fixture()]).await;
    let mut client = connect(&daemon).await;

    client
        .send(RequestType::Query, Format::Json, &query(&[], "x", 0))
        .await
        .unwrap();

    let silence = timeout(Duration::from_millis(200), client.next_frame()).await;
    assert!(silence.is_err(), "no frames expected");
}

#[tokio::test]
async fn zero_item_provider_still_speaks_once() {
    let daemon = spawn_daemon(vec![Arc::new(Void)]).await;
    let mut client = connect(&daemon).await;

    client
        .send(RequestType::Query, Format::Json, &query(&["void"], "x", 0))
        .await
        .unwrap();

    assert_eq!(next(&mut client).await.status, Status::QueryItemEmpty);
    assert_eq!(next(&mut client).await.status, Status::Done);
    assert_eq!(next(&mut client).await.status, Status::EndOfStream);
}

#[tokio::test]
async fn maxresults_truncates_after_ranking() {
    let daemon = spawn_daemon(vec![fixture()]).await;
    let mut client = connect(&daemon).await;

    client
        .send(RequestType::Query, Format::Json, &query(&["apps"], "", 2))
        .await
        .unwrap();

    let mut items = Vec::new();
    loop {
        let frame = next(&mut client).await;
        match frame.status {
            Status::QueryItem => {
                items.push(decode_payload::<Item>(Format::Json, &frame.payload).unwrap());
            }
            Status::Done => break,
            other => panic!("unexpected status: {other:?}"),
        }
    }

    // The two best survive the central truncation.
    assert_eq!(
        items.iter().map(|i| i.score).collect::<Vec<_>>(),
        vec![90, 70]
    );
}

#[tokio::test]
async fn responses_reuse_the_request_format() {
    let daemon = spawn_daemon(vec![fixture()]).await;
    let mut client = connect(&daemon).await;

    client
        .send(
            RequestType::Query,
            Format::Protobuf,
            &query(&["apps"], "", 1),
        )
        .await
        .unwrap();

    let frame = next(&mut client).await;
    assert_eq!(frame.status, Status::QueryItem);

    let item: Item = decode_payload(Format::Protobuf, &frame.payload).unwrap();
    assert_eq!(item.identifier, "a.desktop");
}

#[tokio::test]
async fn event_subscription_receives_namespaced_notifications() {
    let daemon = spawn_daemon(vec![]).await;

    let mut subscriber = connect(&daemon).await;
    subscriber
        .send(
            RequestType::Subscribe,
            Format::Json,
            &SubscribeRequest {
                provider: "bluetooth".to_string(),
                query: String::new(),
                interval: 0,
            },
        )
        .await
        .unwrap();

    // The subscribe frame races the notify below; wait for the table.
    for _ in 0..50 {
        if !daemon.subscriptions.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut notifier = connect(&daemon).await;
    notifier
        .send(
            RequestType::MenuNotify,
            Format::Json,
            &MenuRequest {
                menu: "bluetooth:connect".to_string(),
            },
        )
        .await
        .unwrap();

    let frame = next(&mut subscriber).await;
    assert_eq!(frame.status, Status::SUBSCRIPTION_UPDATE);

    let update: SubscribeResponse = decode_payload(Format::Json, &frame.payload).unwrap();
    assert_eq!(update.value, "bluetooth:connect");
}

#[tokio::test]
async fn menu_notify_pivots_menu_subscribers() {
    let daemon = spawn_daemon(vec![]).await;

    let mut subscriber = connect(&daemon).await;
    subscriber
        .send(
            RequestType::Subscribe,
            Format::Json,
            &SubscribeRequest {
                provider: "menus".to_string(),
                query: String::new(),
                interval: 0,
            },
        )
        .await
        .unwrap();

    for _ in 0..50 {
        if !daemon.subscriptions.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut notifier = connect(&daemon).await;
    notifier
        .send(
            RequestType::MenuNotify,
            Format::Json,
            &MenuRequest {
                menu: "bookmarks".to_string(),
            },
        )
        .await
        .unwrap();

    let frame = next(&mut subscriber).await;
    let update: SubscribeResponse = decode_payload(Format::Json, &frame.payload).unwrap();
    assert_eq!(update.value, "menus:bookmarks");
}

#[tokio::test]
async fn interval_subscription_fires_on_change_only_and_reaps_dead_clients() {
    let daemon = spawn_daemon(vec![
        Arc::new(Ticker {
            polls: AtomicU32::new(0),
        }),
        fixture(),
    ])
    .await;

    // A provider whose results never change stays quiet.
    let mut quiet = connect(&daemon).await;
    quiet
        .send(
            RequestType::Subscribe,
            Format::Json,
            &SubscribeRequest {
                provider: "apps".to_string(),
                query: String::new(),
                interval: 20,
            },
        )
        .await
        .unwrap();

    let silence = timeout(Duration::from_millis(200), quiet.next_frame()).await;
    assert!(silence.is_err(), "unchanged results must not emit");

    // A changing provider fires.
    let mut live = connect(&daemon).await;
    live.send(
        RequestType::Subscribe,
        Format::Json,
        &SubscribeRequest {
            provider: "clock".to_string(),
            query: String::new(),
            interval: 20,
        },
    )
    .await
    .unwrap();

    let frame = next(&mut live).await;
    assert_eq!(frame.status, Status::SUBSCRIPTION_UPDATE);

    // Kill both clients; the next attempted writes reap the table.
    drop(live);
    drop(quiet);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(daemon.subscriptions.len(), 1, "only the quiet sub survives");
}

#[tokio::test]
async fn async_update_replaces_the_placeholder_item() {
    let daemon = spawn_daemon(vec![Arc::new(SlowSolver)]).await;
    let mut client = connect(&daemon).await;

    client
        .send(
            RequestType::Query,
            Format::Json,
            &query(&["calc"], "2+2", 0),
        )
        .await
        .unwrap();

    let first = next(&mut client).await;
    assert_eq!(first.status, Status::QueryItem);
    let placeholder: Item = decode_payload(Format::Json, &first.payload).unwrap();
    assert_eq!(placeholder.text, "calculating...");

    assert_eq!(next(&mut client).await.status, Status::Done);
    assert_eq!(next(&mut client).await.status, Status::EndOfStream);

    // The solved item arrives on the still-open stream.
    let update = next(&mut client).await;
    assert_eq!(update.status, Status::QueryItem);
    let solved: Item = decode_payload(Format::Json, &update.payload).unwrap();
    assert_eq!(solved.identifier, placeholder.identifier);
    assert_eq!(solved.text, "4");
}

#[tokio::test]
async fn activation_round_trips_identifiers_and_signals_completion() {
    let recorder = Arc::new(Recorder {
        count: AtomicU32::new(0),
        last_identifier: std::sync::Mutex::new(String::new()),
    });
    let daemon = spawn_daemon(vec![Arc::clone(&recorder) as Arc<dyn Provider>]).await;
    let mut client = connect(&daemon).await;

    let identifier = "π/∆:weird\u{1F600} bytes";
    client
        .send(
            RequestType::Activate,
            Format::Json,
            &ActivateRequest {
                provider: "exec".to_string(),
                identifier: identifier.to_string(),
                action: "start".to_string(),
                query: "we".to_string(),
                arguments: String::new(),
                single: true,
            },
        )
        .await
        .unwrap();

    let frame = next(&mut client).await;
    assert_eq!(frame.status, Status::ActivationFinished);
    assert!(frame.payload.is_empty());

    assert_eq!(recorder.count.load(Ordering::SeqCst), 1);
    assert_eq!(*recorder.last_identifier.lock().unwrap(), identifier);
}

#[tokio::test]
async fn state_preserves_the_menu_qualified_key() {
    let daemon = spawn_daemon(vec![Arc::new(MenuStub)]).await;
    let mut client = connect(&daemon).await;

    client
        .send(
            RequestType::ProviderState,
            Format::Json,
            &ProviderStateRequest {
                provider: "menus:bookmarks".to_string(),
            },
        )
        .await
        .unwrap();

    let frame = next(&mut client).await;
    assert_eq!(frame.status, Status::StateItem);

    let state: ProviderStateResponse = decode_payload(Format::Json, &frame.payload).unwrap();
    assert_eq!(state.provider, "menus:bookmarks");
    assert_eq!(state.actions, vec!["menus:parent"]);

    assert_eq!(next(&mut client).await.status, Status::Done);
}

#[tokio::test]
async fn undecodable_payload_drops_the_frame_but_keeps_the_connection() {
    let daemon = spawn_daemon(vec![fixture()]).await;
    let mut client = connect(&daemon).await;

    // Raw garbage in a well-formed frame: dropped without an answer.
    client
        .send_raw(RequestType::Query, Format::Json, b"not a request")
        .await
        .unwrap();

    let silence = timeout(Duration::from_millis(200), client.next_frame()).await;
    assert!(silence.is_err());

    // The connection still serves a valid query afterwards.
    client
        .send(RequestType::Query, Format::Json, &query(&["apps"], "", 1))
        .await
        .unwrap();

    assert_eq!(next(&mut client).await.status, Status::QueryItem);
}
