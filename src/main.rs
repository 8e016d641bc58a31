use std::net::SocketAddr;
use std::sync::Arc;

use sidekiq_auth::{
    boards::{BoardArena, BoardRepository},
    cache::create_redis_pool,
    create_router,
    grpc::{auth::auth_service_server::AuthServiceServer, AuthServiceImpl, GrpcPeopleClient},
    init_tracing, shutdown_telemetry, AppState, Config,
};
use tonic::transport::{Identity, Server as TonicServer, ServerTlsConfig};
use tracing::{error, info, warn};

fn fail(message: &str, detail: impl std::fmt::Display) -> ! {
    error!(error = %detail, "{message}");
    shutdown_telemetry();
    std::process::exit(1);
}

fn load_boards(config: &Config) -> BoardArena {
    let Some(path) = config.access.boards_seed_path.as_deref() else {
        return BoardArena::new();
    };

    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail("Failed to read board seed file", format!("{path}: {e}")));
    BoardArena::from_json(&raw)
        .unwrap_or_else(|e| fail("Failed to parse board seed file", format!("{path}: {e}")))
}

fn grpc_tls(config: &Config) -> Option<ServerTlsConfig> {
    if !config.grpc.tls_enabled() {
        return None;
    }
    let cert_path = config.grpc.tls_cert_path.as_deref().unwrap_or_default();
    let key_path = config.grpc.tls_key_path.as_deref().unwrap_or_default();

    let cert = std::fs::read_to_string(cert_path)
        .unwrap_or_else(|e| fail("Failed to read gRPC TLS certificate", e));
    let key =
        std::fs::read_to_string(key_path).unwrap_or_else(|e| fail("Failed to read gRPC TLS key", e));
    Some(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    init_tracing(&config);

    info!(
        service = "sidekiq-auth",
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting server"
    );

    for issue in config.validate_for_production() {
        warn!(issue = %issue, "Configuration warning");
    }

    let people = GrpcPeopleClient::connect_lazy(&config.people.url)
        .unwrap_or_else(|e| fail("Invalid People service URL", e));
    info!(people_url = %config.people.url, "People client configured");

    let arena = load_boards(&config);
    info!(boards = arena.len().await, "Board store ready");
    let boards: Arc<dyn BoardRepository> = Arc::new(arena);

    let redis_pool = create_redis_pool(&config.redis);
    if redis_pool.is_none() {
        warn!("REDIS_URL not set, permission cache is process-local");
    }

    let state = AppState::new(&config, Arc::new(people), boards, redis_pool);
    let app = create_router(state.clone(), &config);

    let http_addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| fail("Failed to bind HTTP server", format!("{http_addr}: {e}")));

    info!(
        http_address = %http_addr,
        docs_url = %format!("http://{}/swagger-ui", http_addr),
        "HTTP server ready"
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let http_server = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
        }
    };

    let grpc_server = if config.grpc.enabled {
        let grpc_addr: SocketAddr = config
            .grpc_addr()
            .parse()
            .unwrap_or_else(|e| fail("Invalid gRPC address", e));
        let tls_config = grpc_tls(&config);

        info!(
            grpc_address = %grpc_addr,
            tls = tls_config.is_some(),
            "gRPC server ready"
        );

        let mut builder = TonicServer::builder();
        if let Some(tls) = tls_config {
            builder = builder
                .tls_config(tls)
                .unwrap_or_else(|e| fail("Invalid gRPC TLS configuration", e));
        }

        let auth_service = AuthServiceImpl::new(state.validator.clone());
        let mut shutdown_rx = shutdown_tx.subscribe();
        Some(async move {
            builder
                .add_service(AuthServiceServer::new(auth_service))
                .serve_with_shutdown(grpc_addr, async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
        })
    } else {
        None
    };

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        result = async {
            match grpc_server {
                Some(server) => server.await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!(error = %e, "gRPC server error");
            }
        }
        _ = ctrl_c => {}
    }

    let _ = shutdown_tx.send(());

    shutdown_telemetry();

    info!("Server shutdown complete");
}
