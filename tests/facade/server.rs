use std::{sync::Arc, time::Duration};

use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
};
use tokio_util::sync::CancellationToken;
use treasury_tap::{
    access::AccessGateway,
    server::{ServerContext, TreasuryServer},
};

use crate::support::{FINANCE, GOVERNOR, harness, temp_dir};

async fn connect(path: &std::path::Path) -> UnixStream {
    for _ in 0..100 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server did not start listening at {}", path.display());
}

#[tokio::test]
async fn given_ndjson_client_when_driving_the_tap_then_responses_mirror_the_facade() {
    let h = harness();
    let dir = temp_dir("server");
    let socket_path = dir.join("treasury.sock");

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(ServerContext {
        gateway: AccessGateway::new(h.policy.clone()),
        facade: h.facade.clone(),
        custody: h.custody.clone(),
    });
    let server = TreasuryServer::new(socket_path.clone());
    let task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.run(ctx, shutdown).await })
    };

    let stream = connect(&socket_path).await;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let requests = [
        json!({
            "type": "add_collateral_asset",
            "caller": GOVERNOR,
            "asset_id": "dai",
            "curve": {"virtual_supply": 1000, "virtual_balance": 1000, "reserve_ratio": 200000},
            "tap_rate": 100
        }),
        json!({"type": "deposit", "caller": "mallory", "asset_id": "dai", "amount": 5}),
        json!({"type": "deposit", "caller": GOVERNOR, "asset_id": "dai", "amount": 10000}),
        json!({"type": "update_tap_floor", "caller": GOVERNOR, "asset_id": "dai", "floor": 10}),
        json!({"type": "withdraw", "caller": "mallory", "asset_id": "dai"}),
        json!({"type": "available_balance", "asset_id": "dai"}),
    ];
    let mut responses = Vec::new();
    for request in &requests {
        write_half
            .write_all(format!("{request}\n").as_bytes())
            .await
            .expect("request should be written");
        let line = lines
            .next_line()
            .await
            .expect("response should be readable")
            .expect("server should answer");
        responses.push(serde_json::from_str::<Value>(&line).expect("response is json"));
    }

    assert_eq!(responses[0]["ok"]["tap_rate"], 100);
    assert_eq!(responses[1]["error"]["kind"], "permission_denied");
    assert_eq!(responses[2]["ok"], 10000);
    assert_eq!(responses[3]["ok"], Value::Null);
    assert_eq!(responses[4]["error"]["kind"], "permission_denied");
    assert_eq!(responses[5]["ok"], 10000);

    h.clock.advance(2 * 86_400);
    let withdraw = json!({"type": "withdraw", "caller": FINANCE, "asset_id": "dai"});
    write_half
        .write_all(format!("{withdraw}\n").as_bytes())
        .await
        .expect("withdraw should be written");
    let line = lines.next_line().await.expect("readable").expect("answer");
    let withdrawn: Value = serde_json::from_str(&line).expect("json");
    assert_eq!(withdrawn["ok"]["amount"], 200);

    write_half
        .write_all(b"{\"type\":\"mint\"}\n")
        .await
        .expect("garbage should be written");
    let line = lines.next_line().await.expect("readable").expect("answer");
    let rejected: Value = serde_json::from_str(&line).expect("json");
    assert_eq!(rejected["error"]["kind"], "invalid_request");

    write_half
        .write_all(b"{\"type\":\"shutdown\"}\n")
        .await
        .expect("shutdown should be written");
    let line = lines.next_line().await.expect("readable").expect("answer");
    assert_eq!(serde_json::from_str::<Value>(&line).expect("json"), json!({"ok": null}));

    task.await
        .expect("server task should join")
        .expect("server should stop cleanly");
    assert!(shutdown.is_cancelled());
    assert!(!socket_path.exists());

    let _ = std::fs::remove_dir_all(&dir);
}
