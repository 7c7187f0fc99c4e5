use std::sync::Arc;

use inbox_pilot::brand::BrandProfile;
use inbox_pilot::config::TriageConfig;
use inbox_pilot::connectors::ConnectorHub;
use inbox_pilot::llm::{LlmBackend, LlmConfig, LlmProvider, create_provider};
use inbox_pilot::review::{AppState, ReviewQueue, inbox_routes, spawn_expiry_task};
use inbox_pilot::triage::{LlmClassifier, LlmDrafter, TriageOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Backend selection: anthropic (default) or openai
    let backend: LlmBackend = std::env::var("INBOX_PILOT_BACKEND")
        .unwrap_or_else(|_| "anthropic".to_string())
        .parse()?;

    let (key_var, default_model) = match backend {
        LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", "claude-sonnet-4-20250514"),
        LlmBackend::OpenAi => ("OPENAI_API_KEY", "gpt-4o-mini"),
    };

    let api_key = std::env::var(key_var).unwrap_or_else(|_| {
        eprintln!("Error: {} not set", key_var);
        eprintln!("  export {}=...", key_var);
        std::process::exit(1);
    });

    let model =
        std::env::var("INBOX_PILOT_MODEL").unwrap_or_else(|_| default_model.to_string());

    let port: u16 = std::env::var("INBOX_PILOT_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let triage_config = TriageConfig::from_env();

    // Brand profile: JSON file, or a default to start from
    let brand = match std::env::var("INBOX_PILOT_BRAND_FILE") {
        Ok(path) => BrandProfile::from_file(std::path::Path::new(&path)).unwrap_or_else(|e| {
            eprintln!("Error: Failed to load brand profile from {}: {}", path, e);
            std::process::exit(1);
        }),
        Err(_) => BrandProfile::default(),
    };

    eprintln!("📬 inbox-pilot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!("   Brand: {} ({} facts)", brand.business_name, brand.facts.len());
    eprintln!("   Inbox API: http://0.0.0.0:{}/api/messages", port);
    eprintln!("   Card API:  http://0.0.0.0:{}/api/cards", port);
    eprintln!("   Card WS:   ws://0.0.0.0:{}/ws\n", port);

    // LLM provider behind the capability traits
    let llm_config = LlmConfig {
        backend,
        api_key: secrecy::SecretString::from(api_key),
        model,
        base_url: std::env::var("INBOX_PILOT_BASE_URL").ok(),
    };
    let llm: Arc<dyn LlmProvider> = create_provider(&llm_config);

    let classifier = Arc::new(LlmClassifier::new(llm.clone()));
    let drafter = Arc::new(LlmDrafter::new(llm).with_follow_up(triage_config.follow_up));
    let orchestrator = Arc::new(TriageOrchestrator::new(
        classifier,
        drafter,
        triage_config.clone(),
    ));

    // Review queue + expiry sweep
    let queue = ReviewQueue::new();
    let _expiry_handle = spawn_expiry_task(queue.clone());

    let state = AppState {
        queue,
        orchestrator,
        brand: Arc::new(tokio::sync::RwLock::new(brand)),
        connectors: Arc::new(ConnectorHub::new()),
        card_expire_minutes: triage_config.card_expire_minutes,
    };

    let app = inbox_routes(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port, "inbox-pilot server started");
    axum::serve(listener, app).await?;

    Ok(())
}
