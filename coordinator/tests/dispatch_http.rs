//! End-to-end tests of the dispatch endpoint over real HTTP

use fanout_coordinator::display::NullDisplay;
use fanout_coordinator::{dispatch, CommandDispatcher, CommandStore, DataDir, SharedStore};
use fanout_shared::Snapshot;
use reqwest::StatusCode;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestCoordinator {
    url: String,
    store: SharedStore,
    _shutdown: oneshot::Sender<()>,
}

async fn start(data: &TempDir) -> TestCoordinator {
    let dir = DataDir::open(data.path()).unwrap();
    let store = CommandStore::open(dir, Box::new(NullDisplay::default())).unwrap();
    let dispatcher = CommandDispatcher::new(store);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let serving = dispatcher.clone();
    tokio::spawn(async move {
        dispatch::serve(listener, serving, async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    TestCoordinator {
        url,
        store: dispatcher.store(),
        _shutdown: shutdown_tx,
    }
}

#[tokio::test]
async fn test_empty_queue_polls_return_no_content() {
    let data = tempfile::tempdir().unwrap();
    let coordinator = start(&data).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let response = client.get(&coordinator.url).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    coordinator.store.lock().await.add("echo hi").unwrap();
    let response = client.get(&coordinator.url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_echo_hi_round_trip() {
    let data = tempfile::tempdir().unwrap();
    let coordinator = start(&data).await;
    let client = reqwest::Client::new();
    coordinator.store.lock().await.add("echo hi").unwrap();

    let response = client.get(&coordinator.url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["id"], 0);
    assert_eq!(body["text"], "echo hi");
    assert!(body["start_time"].is_null());
    assert!(coordinator.store.lock().await.get(0).unwrap().is_running());

    let report = Snapshot {
        id: 0,
        text: "echo hi".into(),
        exit_code: Some(0),
        stdout: Some("hi\n".into()),
        stderr: Some(String::new()),
        start_time: Some(1_700_000_000.0),
        end_time: Some(1_700_000_000.2),
    };
    let response = client
        .post(&coordinator.url)
        .json(&report)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let store = coordinator.store.lock().await;
    let cmd = store.get(0).unwrap();
    assert!(cmd.is_terminal());
    assert_eq!(cmd.exit_code, Some(0));
    assert_eq!(cmd.stdout, "hi\n");
}

#[tokio::test]
async fn test_concurrent_polls_single_winner() {
    let data = tempfile::tempdir().unwrap();
    let coordinator = start(&data).await;
    let client = reqwest::Client::new();
    coordinator.store.lock().await.add("hostname").unwrap();

    let polls = (0..12).map(|_| client.get(&coordinator.url).send());
    let responses = futures::future::join_all(polls).await;

    let winners = responses
        .into_iter()
        .map(|r| r.unwrap().status())
        .filter(|status| *status == StatusCode::OK)
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_unknown_id_is_accepted_and_ignored() {
    let data = tempfile::tempdir().unwrap();
    let coordinator = start(&data).await;
    let client = reqwest::Client::new();
    coordinator.store.lock().await.add("true").unwrap();

    let response = client
        .post(&coordinator.url)
        .body(r#"{"id": 42, "text": "ghost", "exit_code": 0, "stdout": "", "stderr": "",
                  "start_time": 1.0, "end_time": 2.0}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let mut store = coordinator.store.lock().await;
    assert_eq!(store.len(), 1);
    assert!(store.get(0).unwrap().is_choosable());
    assert_eq!(store.add("next").unwrap(), 43);
}

#[tokio::test]
async fn test_malformed_report_is_rejected() {
    let data = tempfile::tempdir().unwrap();
    let coordinator = start(&data).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&coordinator.url)
        .body("{\"id\": 0, \"end_time\": 3.0}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().contains("Invalid report"));
}

#[tokio::test]
async fn test_state_survives_coordinator_restart() {
    let data = tempfile::tempdir().unwrap();
    let client = reqwest::Client::new();

    let before = {
        let coordinator = start(&data).await;
        {
            let mut store = coordinator.store.lock().await;
            store.add("echo a").unwrap();
            store.add("sleep 1000").unwrap();
        }
        client.get(&coordinator.url).send().await.unwrap();
        client
            .post(&coordinator.url)
            .body(r#"{"id": 0, "text": "echo a", "exit_code": 0, "stdout": "a\n",
                      "stderr": "", "start_time": 5.0, "end_time": 6.0}"#)
            .send()
            .await
            .unwrap();
        client.get(&coordinator.url).send().await.unwrap();
        let commands = coordinator.store.lock().await.commands().to_vec();
        commands
    };

    let coordinator = start(&data).await;
    let store = coordinator.store.lock().await;
    assert_eq!(store.commands(), before.as_slice());
    assert!(store.get(1).unwrap().is_running());
    drop(store);

    // The orphaned command is not handed out again
    let response = client.get(&coordinator.url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
