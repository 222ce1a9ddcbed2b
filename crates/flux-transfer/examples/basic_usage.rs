use flux_transfer::{
    init_logging, CancellationToken, LoggingConfig, MeasurementOption, MemoryStreamContext,
    Payload, Transfer, TransferConfig, TransferOptions,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TransferConfig::load("config/transfer.toml")?;

    // 初始化日志
    init_logging(&LoggingConfig {
        level: "info,flux_transfer=debug".to_string(),
        ..config.logging.clone()
    })?;

    println!("🚀 FLUX Transfer Example\n");

    let ctx = MemoryStreamContext::new();
    let transfer = Transfer::with_options(
        config.namespace.clone(),
        Arc::new(ctx.clone()),
        TransferOptions::from(&config.transfer),
    )
    .await?;

    // 1. 注册测量
    transfer
        .set("cpu", &MeasurementOption::new("cpu", "cpu load"))
        .await?;
    println!("  ✓ Measurement registered: {}", transfer.stream_name("cpu"));

    // 2. 发布载荷
    let cancel = CancellationToken::new();
    for core in 0..4 {
        let payload = Payload::new()
            .with_tag("host", "edge-01")
            .with_tag("core", core.to_string())
            .with_field("usage", 0.25 * core as f64);
        let ack = transfer.publish(&cancel, "cpu", &payload).await?;
        println!("  ✓ Published to {} (seq {})", ack.stream, ack.sequence);
    }

    // 3. 查询
    let info = transfer.get("cpu").await?;
    println!(
        "\n📊 {} -> {} messages on {:?}",
        info.option.measurement, info.info.state.messages, info.info.config.subjects
    );

    // 4. 消费
    let messages = ctx.fetch(&transfer.stream_name("cpu"), 10).await?;
    println!("📥 Consumed {} messages", messages.len());

    // 5. 移除
    transfer.remove("cpu").await?;
    println!("🗑  Measurement removed");

    Ok(())
}
