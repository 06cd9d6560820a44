use anyhow::Context;
use clap::{Parser, Subcommand};
use courier_config::load as load_config;
use courier_database::{NewMessage, ParticipantRepository, ParticipantRole};
use courier_gateway::{build_router, GatewayState};
use courier_messaging::{MessageService, NullEventSink, ThreadService};
use courier_runtime::{telemetry, BackendServices};
use sqlx::Row;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "courier-backend")]
#[command(about = "Courier messaging backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Dump threads and messages from the database
    DumpData,
    /// Seed the database with demo participants and a conversation
    SeedData,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::DumpData => dump_data().await,
        Commands::SeedData => seed_data().await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Courier backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::new(services.db_pool.clone(), &config.realtime);
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(courier_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn dump_data() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let threads = sqlx::query(
        r#"
        SELECT id, public_id, participant_low, participant_high, booking_ref, archived, created_at
        FROM threads
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch threads")?;

    println!("=== THREADS ===");
    if threads.is_empty() {
        println!("No threads found in database");
    } else {
        println!(
            "{:<5} {:<26} {:<16} {:<16} {:<14} {:<9} {:<25}",
            "ID", "Public ID", "Low", "High", "Booking", "Archived", "Created At"
        );
        println!("{}", "-".repeat(115));

        for thread in &threads {
            let id: i64 = thread.get("id");
            let public_id: String = thread.get("public_id");
            let low: String = thread.get("participant_low");
            let high: String = thread.get("participant_high");
            let booking_ref: Option<String> = thread.get("booking_ref");
            let archived: bool = thread.get("archived");
            let created_at: String = thread.get("created_at");

            println!(
                "{:<5} {:<26} {:<16} {:<16} {:<14} {:<9} {:<25}",
                id,
                public_id,
                low,
                high,
                booking_ref.as_deref().unwrap_or("NULL"),
                archived,
                created_at
            );
        }
    }

    let messages = sqlx::query(
        r#"
        SELECT public_id, thread_public_id, seq, sender_id, status, body, created_at
        FROM messages
        ORDER BY thread_id ASC, seq ASC
        "#,
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch messages")?;

    println!();
    println!("=== MESSAGES ===");
    if messages.is_empty() {
        println!("No messages found in database");
    } else {
        println!(
            "{:<26} {:<26} {:<5} {:<16} {:<10} {:<40}",
            "Public ID", "Thread", "Seq", "Sender", "Status", "Body"
        );
        println!("{}", "-".repeat(125));

        for message in &messages {
            let public_id: String = message.get("public_id");
            let thread_public_id: String = message.get("thread_public_id");
            let seq: i64 = message.get("seq");
            let sender_id: String = message.get("sender_id");
            let status: String = message.get("status");
            let body: String = message.get("body");

            println!(
                "{:<26} {:<26} {:<5} {:<16} {:<10} {:<40}",
                public_id,
                thread_public_id,
                seq,
                sender_id,
                status,
                body.chars().take(40).collect::<String>()
            );
        }
    }

    Ok(())
}

async fn seed_data() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let participants = ParticipantRepository::new(services.db_pool.clone());
    participants
        .upsert("demo-customer", "Demo Customer", ParticipantRole::Customer)
        .await
        .context("failed to seed customer")?;
    participants
        .upsert("demo-provider", "Demo Provider", ParticipantRole::Provider)
        .await
        .context("failed to seed provider")?;

    let threads = ThreadService::new(services.db_pool.clone());
    let thread = threads
        .resolve_thread("demo-customer", "demo-provider", Some("demo-booking"))
        .await
        .context("failed to seed thread")?;

    let messages = MessageService::new(
        services.db_pool.clone(),
        Arc::new(NullEventSink),
        config.realtime.append_retries,
    );
    messages
        .append(
            &thread.public_id,
            "demo-customer",
            &NewMessage::text("Hi, is Saturday still available?"),
        )
        .await
        .context("failed to seed message")?;
    messages
        .append(
            &thread.public_id,
            "demo-provider",
            &NewMessage::text("Saturday morning works, see you then."),
        )
        .await
        .context("failed to seed message")?;

    info!(thread_id = %thread.public_id, "seeded demo conversation");
    println!("Seeded demo conversation in thread {}", thread.public_id);

    Ok(())
}
