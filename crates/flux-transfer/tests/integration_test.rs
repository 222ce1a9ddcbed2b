use flux_transfer::{
    CancellationToken, MeasurementOption, MemoryStreamContext, Payload, Transfer, TransferError,
};
use serde_json::json;
use std::sync::Arc;

async fn setup(namespace: &str) -> (MemoryStreamContext, Transfer) {
    let ctx = MemoryStreamContext::new();
    let transfer = Transfer::new(namespace, Arc::new(ctx.clone())).await.unwrap();
    (ctx, transfer)
}

#[tokio::test]
async fn test_cpu_measurement_scenario() {
    let (_ctx, transfer) = setup("factory").await;

    transfer
        .set("cpu", &MeasurementOption::new("cpu", "cpu load"))
        .await
        .unwrap();

    let result = transfer.get("cpu").await.unwrap();
    assert_eq!(result.option.measurement, "cpu");
    assert_eq!(result.option.description, "cpu load");
    assert_eq!(result.info.config.name, "factory:logs:cpu");
    assert!(result
        .info
        .config
        .subjects
        .contains(&"factory.logs.cpu".to_string()));
}

#[tokio::test]
async fn test_publish_thousand_payloads() {
    let (_ctx, transfer) = setup("factory").await;
    transfer
        .set("cpu", &MeasurementOption::new("cpu", "cpu load"))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    for i in 0..1000 {
        let payload = Payload::new()
            .with_tag("host", format!("edge-{:02}", i % 10))
            .with_field("usage", i as f64 / 1000.0);
        transfer.publish(&cancel, "cpu", &payload).await.unwrap();
    }

    let result = transfer.get("cpu").await.unwrap();
    assert_eq!(result.info.state.messages, 1000);
    assert_eq!(result.info.state.first_sequence, 1);
    assert_eq!(result.info.state.last_sequence, 1000);
}

#[tokio::test]
async fn test_concurrent_publish() {
    let (_ctx, transfer) = setup("factory").await;
    transfer
        .set("mem", &MeasurementOption::new("mem", "memory"))
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..10 {
        let transfer = transfer.clone();
        handles.push(tokio::spawn(async move {
            let payload = Payload::new().with_field("index", i);
            transfer
                .publish(&CancellationToken::new(), "mem", &payload)
                .await
                .unwrap()
        }));
    }

    let mut sequences = vec![];
    for handle in handles {
        sequences.push(handle.await.unwrap().sequence);
    }
    sequences.sort();
    assert_eq!(sequences, (1..=10).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_remove_then_get_is_not_found() {
    let (ctx, transfer) = setup("factory").await;
    transfer
        .set("disk", &MeasurementOption::new("disk", "disk io"))
        .await
        .unwrap();

    transfer.remove("disk").await.unwrap();

    let err = transfer.get("disk").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(ctx.stream_names().await.is_empty());
    assert!(transfer.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_never_written_is_not_found() {
    let (_ctx, transfer) = setup("factory").await;
    assert!(matches!(
        transfer.get("nothing").await,
        Err(TransferError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_publish_without_set_fails_without_hanging() {
    let (_ctx, transfer) = setup("factory").await;

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        transfer.publish(&CancellationToken::new(), "cpu", &Payload::new()),
    )
    .await
    .expect("publish must not hang");

    assert!(matches!(result, Err(TransferError::Backend(_))));
}

#[tokio::test]
async fn test_workqueue_delivers_each_message_once() {
    let (ctx, transfer) = setup("factory").await;
    transfer
        .set("temp", &MeasurementOption::new("temp", "温度"))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    for value in [20.5, 21.0, 21.5] {
        let payload = Payload::new()
            .with_tag("车间", "三号")
            .with_field("value", value);
        transfer.publish(&cancel, "temp", &payload).await.unwrap();
    }

    let first = ctx.fetch("factory:logs:temp", 2).await.unwrap();
    let second = ctx.fetch("factory:logs:temp", 2).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);

    let last: Payload = serde_json::from_slice(&second[0].payload).unwrap();
    assert_eq!(last.tags["车间"], "三号");
    assert_eq!(last.fields["value"], json!(21.5));

    let result = transfer.get("temp").await.unwrap();
    assert_eq!(result.info.state.messages, 0);
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let ctx = MemoryStreamContext::new();
    let north = Transfer::new("north", Arc::new(ctx.clone())).await.unwrap();
    let south = Transfer::new("south", Arc::new(ctx.clone())).await.unwrap();

    north
        .set("cpu", &MeasurementOption::new("cpu", "north cpu"))
        .await
        .unwrap();
    south
        .set("cpu", &MeasurementOption::new("cpu", "south cpu"))
        .await
        .unwrap();

    assert_eq!(north.get("cpu").await.unwrap().option.description, "north cpu");
    assert_eq!(south.get("cpu").await.unwrap().option.description, "south cpu");

    north.remove("cpu").await.unwrap();
    assert!(north.get("cpu").await.unwrap_err().is_not_found());
    assert!(south.get("cpu").await.is_ok());
}

#[tokio::test]
async fn test_list_measurements() {
    let (_ctx, transfer) = setup("factory").await;
    for key in ["mem", "cpu", "disk"] {
        transfer
            .set(key, &MeasurementOption::new(key, ""))
            .await
            .unwrap();
    }

    assert_eq!(
        transfer.list().await.unwrap(),
        vec!["cpu".to_string(), "disk".to_string(), "mem".to_string()]
    );
}
