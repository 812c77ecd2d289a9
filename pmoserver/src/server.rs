//! # Module Server - API de haut niveau pour Axum
//!
//! Ce module cache la configuration du routage Axum derrière quelques
//! méthodes d'enregistrement.
//!
//! - 🚀 **Routes JSON simples** : `add_route()`
//! - 🎯 **Handlers avec état** : SSE et autres via `add_handler_with_state()`
//! - 🧩 **Sous-routers** : protocoles complets montés par `add_router()`
//! - ⚡ **Arrêt gracieux** : Ctrl+C

use crate::logs::{LogState, LoggingOptions, create_logs_router, init_logging, log_dump, log_sse};
use anyhow::{Context, Result};
use axum::handler::Handler;
use axum::routing::get;
use axum::{Json, Router};
use pmoconfig::get_config;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::RwLock, task::JoinHandle};
use tracing::{error, info};

const DEFAULT_SERVER_NAME: &str = "PMOSoap-Server";

/// Info serveur sérialisable
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// Serveur principal
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    log_state: Option<LogState>,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `base_url` - Hôte annoncé (ex: "localhost")
    /// * `http_port` - Port HTTP à écouter
    ///
    /// # Exemple
    ///
    /// ```rust
    /// # use pmoserver::Server;
    /// let server = Server::new("MyAPI", "localhost", 3000);
    /// assert_eq!(server.info().http_port, 3000);
    /// ```
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            log_state: None,
        }
    }

    pub fn new_configured() -> Self {
        ServerBuilder::new_configured().build()
    }

    async fn mount(&mut self, path: &str, route: Router) {
        let mut r = self.router.write().await;
        *r = if path == "/" || path.is_empty() {
            std::mem::take(&mut *r).merge(route)
        } else {
            let normalized = format!("/{}", path.trim_start_matches('/'));
            std::mem::take(&mut *r).nest(&normalized, route)
        };
    }

    /// Ajoute une route JSON dynamique
    ///
    /// La closure fournie est appelée à chaque requête GET sur `path`.
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// # use pmoserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let mut server = Server::new("Test", "localhost", 3000);
    /// server.add_route("/api/status", || async {
    ///     serde_json::json!({"status": "online"})
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = move || {
            let f = f.clone();
            async move { Json(f().await) }
        };

        self.mount(path, Router::new().route("/", get(handler))).await;
    }

    /// Ajoute un handler GET avec état
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route("/", get(handler)).with_state(state);
        self.mount(path, route).await;
    }

    /// Ajoute un sous-router au serveur
    ///
    /// - Si `path` est "/", merge directement au router principal
    /// - Sinon, nest le router sous le chemin donné
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        self.mount(path, sub_router).await;
    }

    /// Copie du router courant (utile pour les tests en `oneshot`)
    pub async fn router(&self) -> Router {
        self.router.read().await.clone()
    }

    /// Démarre le serveur HTTP
    ///
    /// Le port est lié avant de rendre la main ; Ctrl+C déclenche l'arrêt.
    ///
    /// # Errors
    ///
    /// Échoue si le port ne peut pas être lié.
    pub async fn start(&mut self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Cannot bind {}", addr))?;

        info!(
            "🚀 Server {} running at http://{}:{}",
            self.name, self.base_url, self.http_port
        );

        let router = self.router().await;
        let server_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router.into_make_service()).await {
                error!("❌ HTTP server stopped: {}", e);
            }
        });

        let shutdown_task = tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => info!("Ctrl+C reçu, arrêt gracieux"),
                Err(e) => error!("❌ Cannot listen for Ctrl+C: {}", e),
            }
        });

        self.join_handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = server_task => {},
                _ = shutdown_task => {},
            }
        }));

        Ok(())
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Récupère les infos du serveur
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port: self.http_port,
        }
    }

    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }

    /// Initialise le logging et enregistre les routes de logs
    ///
    /// Routes : `/log-sse`, `/log-dump` et `/api/log_setup`.
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// # use pmoserver::{ServerBuilder, logs::LoggingOptions};
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// let mut server = ServerBuilder::new_configured().build();
    /// server.init_logging(LoggingOptions::from_config()).await?;
    /// server.start().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn init_logging(&mut self, options: LoggingOptions) -> Result<()> {
        let log_state = init_logging(options)?;
        self.attach_logs(log_state).await;
        Ok(())
    }

    /// Enregistre les routes de logs sur un `LogState` existant
    pub async fn attach_logs(&mut self, log_state: LogState) {
        self.add_handler_with_state("/log-sse", log_sse, log_state.clone())
            .await;
        self.add_handler_with_state("/log-dump", log_dump, log_state.clone())
            .await;
        self.add_router("/api", create_logs_router(log_state.clone()))
            .await;

        self.log_state = Some(log_state);
    }
}

/// Builder pattern
pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
}

impl ServerBuilder {
    /// Crée un nouveau builder
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
        }
    }

    /// Builder initialisé depuis `host.base_url` et `host.http_port`
    pub fn new_configured() -> Self {
        let config = get_config();
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            base_url: config.get_base_url(),
            http_port: config.get_http_port(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Construit le serveur
    ///
    /// ```rust
    /// # use pmoserver::ServerBuilder;
    /// let server = ServerBuilder::new("MyAPI", "localhost", 3000)
    ///     .http_port(3001)
    ///     .build();
    /// assert_eq!(server.info().http_port, 3001);
    /// ```
    pub fn build(self) -> Server {
        Server::new(self.name, self.base_url, self.http_port)
    }
}
