use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{spawn_sweeper, RevocationLedger, SessionAuthority, SweeperHandle, TokenCodec, TokenPolicy};
use crate::configuration::Settings;
use crate::logger::LoggerMiddleware;
use crate::middleware::AuthorizationGate;
use crate::routes::{
    get_profile, health_check, json_error_handler, login, logout, not_found, refresh, register,
    update_profile,
};
use crate::store::UserStore;

pub fn run(
    listener: TcpListener,
    authority: web::Data<SessionAuthority>,
    store: Arc<dyn UserStore>,
    gate: AuthorizationGate,
) -> Result<Server, std::io::Error> {
    let store: web::Data<dyn UserStore> = web::Data::from(store);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())      // Standard logging
            .wrap(LoggerMiddleware)       // Custom logging

            // Shared state
            .app_data(store.clone())
            .app_data(authority.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))

            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/user")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    // Gated: every request carries an AuthorizationVerdict
                    .service(
                        web::resource("/{email}/profile")
                            .wrap(gate.clone())
                            .route(web::get().to(get_profile))
                            .route(web::put().to(update_profile)),
                    ),
            )
            .default_service(web::to(not_found))
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// A bound server plus the revocation sweeper whose lifetime it owns
pub struct Application {
    port: u16,
    server: Server,
    sweeper: SweeperHandle,
}

impl Application {
    pub async fn build(settings: Settings, store: Arc<dyn UserStore>) -> Result<Self, std::io::Error> {
        settings.jwt.validate().map_err(|e| {
            tracing::error!("Invalid JWT configuration: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
        })?;

        let address = format!("{}:{}", settings.application.host, settings.application.port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();
        tracing::info!("Server listening on: {}:{}", settings.application.host, port);

        let development = settings.application.environment.is_development();
        if !development {
            tracing::info!("Production mode: longExpiry login requests are ignored");
        }

        let codec = TokenCodec::new(&settings.jwt);
        let ledger = Arc::new(RevocationLedger::new());
        let policy = TokenPolicy::from_settings(&settings.jwt, development);

        let authority = web::Data::new(SessionAuthority::new(
            store.clone(),
            codec.clone(),
            ledger.clone(),
            policy,
        ));
        let gate = AuthorizationGate::new(codec, ledger.clone());

        let sweep_interval = settings.sweep_interval();
        tracing::info!(seconds = sweep_interval.as_secs(), "Starting revocation sweeper");
        let sweeper = spawn_sweeper(ledger, sweep_interval);

        let server = run(listener, authority, store, gate)?;

        Ok(Self { port, server, sweeper })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until the server stops, then stop the sweeper.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        let Application { server, sweeper, .. } = self;
        let result = server.await;
        sweeper.shutdown().await;
        result
    }
}
