use std::collections::HashSet;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adspend_analyzer::config::Config;
use adspend_analyzer::models::MetricRecord;
use adspend_analyzer::services::{
    ExecutionProcessor, FileAuditSink, HttpLlmClient, PipelineService,
};
use adspend_analyzer::observability;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration first
    let (config, args) = Config::load()?;

    // Initialize logging
    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);

    let registry = tracing_subscriber::registry().with(log_filter);

    // Add file logging if configured
    let _guard;
    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name =
            log_path.file_name().and_then(|n| n.to_str()).unwrap_or("meridian.log");
        // Remove .log extension if present (rolling appender adds date suffix)
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _guard = Some(guard);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        _guard = None;
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!("Meridian starting up");
    tracing::info!("Configuration loaded successfully");

    let input_path = args
        .input
        .as_deref()
        .ok_or("no input file given; pass --input <records.json>")?;
    let records = load_records(input_path)?;
    tracing::info!(count = records.len(), path = input_path, "records loaded");

    let llm_client = Arc::new(HttpLlmClient::new(config.llm.clone())?);
    let tracer = observability::tracer(true);
    let pipeline = PipelineService::new(config.clone(), llm_client, tracer);
    pipeline.init().await?;

    let report = pipeline.run_analysis(&records).await;

    if args.execute {
        let audit = Arc::new(FileAuditSink::new(&config.audit.dir));
        let processor = ExecutionProcessor::new(config.execution.dry_run, audit);
        let approved: Option<HashSet<String>> = None;
        let batch = processor
            .execute_batch(
                &report.recommendations.recommendations,
                approved.as_ref(),
                &args.tenant,
            )
            .await;
        println!("{}", serde_json::to_string_pretty(&batch)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    pipeline.shutdown().await;
    Ok(())
}

fn load_records(path: &str) -> Result<Vec<MetricRecord>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path, e))?;
    let records: Vec<MetricRecord> = serde_json::from_str(&raw)
        .map_err(|e| format!("failed to parse {}: {}", path, e))?;
    Ok(records)
}
