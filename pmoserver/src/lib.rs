//! # pmoserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate fournit une abstraction simple pour monter des routes et des
//! sous-routers Axum, démarrer l'écoute HTTP et exposer les logs du processus.
//! Elle ne connaît aucun protocole : les crates métier (comme `pmosoap`)
//! s'y branchent par un trait d'extension.
//!
//! ## Fonctionnalités
//!
//! - 🚀 **API de haut niveau** : routes JSON, handlers avec état, sous-routers
//! - 📡 **Server-Sent Events (SSE)** : logs en temps réel via `/log-sse`
//! - 🔧 **Niveau de log ajustable** : `/api/log_setup`
//! - ⚡ **Arrêt gracieux** : Ctrl+C
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use pmoserver::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new("MyServer", "localhost", 8080).build();
//!     server.init_logging(LoggingOptions::default()).await?;
//!
//!     server.add_route("/api/status", || async {
//!         serde_json::json!({"status": "ok"})
//!     }).await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, LoggingOptions, SseLayer, log_dump, log_sse};
pub use server::{Server, ServerBuilder, ServerInfo};
