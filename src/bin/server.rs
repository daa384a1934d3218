use std::{fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;

#[cfg(debug_assertions)]
use tower_livereload::LiveReloadLayer;

use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use clinic_accounts::{
    AppState, GatewayConfig, HttpGateway, PaginationConfig, Role, Session, build_router,
    graceful_shutdown,
};

/// The web console for a doctor's payments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the clinic's REST API, e.g. "https://clinic.example.com/api".
    #[arg(long, env = "CLINIC_BACKEND_URL")]
    backend_url: String,

    /// The doctor whose payments are shown.
    #[arg(long, env = "CLINIC_DOCTOR_ID")]
    doctor_id: String,

    /// The role of the signed-in user.
    #[arg(long, value_enum, default_value_t = Role::Doctor)]
    role: Role,

    /// Bearer token sent to the clinic backend.
    #[arg(long, env = "CLINIC_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// The port to serve the console from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Canonical name of the timezone dates are shown in.
    #[arg(long, default_value = "Asia/Kolkata")]
    timezone: String,

    /// Rows shown per page.
    #[arg(long, default_value_t = 20)]
    page_size: u64,

    /// Payments requested per backend page.
    #[arg(long, default_value_t = 100)]
    backend_page_size: u64,

    /// The most backend pages read for one table.
    #[arg(long, default_value_t = 50)]
    max_backend_pages: u64,

    /// Seconds to wait for the backend before giving up on a request.
    #[arg(long, default_value_t = 10)]
    request_timeout_secs: u64,

    /// File that debug logs are appended to.
    #[arg(long, default_value = "debug.log")]
    log_file: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(&args.log_file);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let gateway = HttpGateway::new(
        &args.backend_url,
        args.api_token,
        Duration::from_secs(args.request_timeout_secs),
    )
    .expect("Could not create the backend client");

    let state = AppState::new(
        Arc::new(gateway),
        GatewayConfig {
            page_size: args.backend_page_size,
            max_pages: args.max_backend_pages,
        },
        Session::new(&args.doctor_id, args.role),
        &args.timezone,
        PaginationConfig {
            page_size: args.page_size,
            ..Default::default()
        },
    )
    .expect("Could not create app state");

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    #[cfg(debug_assertions)]
    let router = router.layer(LiveReloadLayer::new());

    tracing::info!(
        "HTTP server listening on {} for doctor {} ({})",
        addr,
        args.doctor_id,
        args.backend_url
    );
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Server stopped unexpectedly");
}

fn setup_logging(log_path: &str) {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where they are handled, so skip the default 5xx logging.
        .on_failure(());

    router.layer(tracing_layer)
}
