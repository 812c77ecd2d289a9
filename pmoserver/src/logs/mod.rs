//! Journalisation : buffer circulaire, flux SSE et niveau ajustable à chaud.
//!
//! [`init_logging`] installe le subscriber global (filtre rechargeable,
//! [`SseLayer`], console optionnelle). Le [`LogState`] retourné alimente
//! les routes `/log-sse`, `/log-dump` et `/api/log_setup`.

mod sselayer;

pub use sselayer::SseLayer;

use std::{
    collections::VecDeque,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use anyhow::{Result, anyhow};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use pmoconfig::get_config;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const LEVELS: [&str; 5] = ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"];

/// Représente une entrée de log
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub level: String,
    pub target: String,
    pub message: String,
}

type ReloadHandle = reload::Handle<LevelFilter, Registry>;

/// Buffer circulaire partagé
#[derive(Clone)]
pub struct LogState {
    buffer: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
    tx: broadcast::Sender<LogEntry>,
    max_level: Arc<RwLock<Level>>,
    reload_handle: Option<Arc<ReloadHandle>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LogState {
    /// État sans filtre global rattaché (le niveau ne filtre que l'affichage)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            tx: broadcast::channel(1000).0,
            max_level: Arc::new(RwLock::new(Level::TRACE)),
            reload_handle: None,
        }
    }

    fn with_reload_handle(mut self, handle: ReloadHandle, level: Level) -> Self {
        self.reload_handle = Some(Arc::new(handle));
        *write(&self.max_level) = level;
        self
    }

    pub fn set_max_level(&self, level: Level) {
        *write(&self.max_level) = level;

        if let Some(handle) = &self.reload_handle {
            let filter = LevelFilter::from_level(level);
            if let Err(e) = handle.reload(filter) {
                eprintln!("❌ Failed to reload log level filter: {}", e);
            }
        }
    }

    pub fn get_max_level(&self) -> Level {
        *read(&self.max_level)
    }

    fn push(&self, entry: LogEntry) {
        {
            let mut buf = write(&self.buffer);
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(entry.clone());
        }
        let _ = self.tx.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    pub fn dump(&self) -> Vec<LogEntry> {
        read(&self.buffer).iter().cloned().collect()
    }
}

/// Query params pour /log-sse
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub error: Option<bool>,
    #[serde(default)]
    pub warn: Option<bool>,
    #[serde(default)]
    pub info: Option<bool>,
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub trace: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Handler SSE : l'historique filtré, puis les nouvelles entrées
pub async fn log_sse(
    State(state): State<LogState>,
    Query(params): Query<LogQuery>,
) -> impl IntoResponse {
    let mut rx = state.subscribe();
    let history = state.dump();

    let stream = async_stream::stream! {
        let current_level = state.get_max_level();
        for entry in history {
            if !is_level_allowed(&entry.level, current_level) || !filter_entry(&entry, &params) {
                continue;
            }
            if let Ok(json) = serde_json::to_string(&entry) {
                yield Ok::<_, axum::Error>(Event::default().data(json));
            }
        }

        while let Ok(entry) = rx.recv().await {
            if !is_level_allowed(&entry.level, state.get_max_level()) || !filter_entry(&entry, &params) {
                continue;
            }
            if let Ok(json) = serde_json::to_string(&entry) {
                yield Ok::<_, axum::Error>(Event::default().data(json));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handler REST (dump JSON du buffer)
pub async fn log_dump(State(state): State<LogState>) -> impl IntoResponse {
    Json(state.dump())
}

/// Un log est autorisé si son niveau est au moins aussi grave que `max_level`
fn is_level_allowed(log_level: &str, max_level: Level) -> bool {
    match string_to_level(log_level) {
        Some(level) => level <= max_level,
        None => false,
    }
}

/// Filtrage par niveaux demandés et par mot-clé
fn filter_entry(entry: &LogEntry, q: &LogQuery) -> bool {
    let lvl = entry.level.to_lowercase();
    let flags = [
        ("error", q.error),
        ("warn", q.warn),
        ("info", q.info),
        ("debug", q.debug),
        ("trace", q.trace),
    ];

    // si aucun flag → tout est autorisé
    let any_flag = flags.iter().any(|(_, f)| f.unwrap_or(false));
    let mut allowed = !any_flag
        || flags
            .iter()
            .any(|(name, f)| f.unwrap_or(false) && lvl == *name);

    if let Some(search) = &q.search {
        allowed &= entry.message.contains(search) || entry.target.contains(search);
    }

    allowed
}

/// Options d'initialisation du système de logging
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Capacité du buffer circulaire (nombre d'entrées conservées)
    pub buffer_capacity: usize,
    /// Niveau minimum retenu au démarrage
    pub min_level: Level,
    /// Activer la sortie vers stderr/stdout
    pub enable_console: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            min_level: Level::INFO,
            enable_console: true,
        }
    }
}

impl LoggingOptions {
    /// Lit `host.logger.*` dans la configuration globale
    pub fn from_config() -> Self {
        let config = get_config();
        let defaults = Self::default();

        Self {
            buffer_capacity: config
                .get_log_cache_size()
                .unwrap_or(defaults.buffer_capacity),
            min_level: config
                .get_log_min_level()
                .ok()
                .and_then(|l| string_to_level(&l))
                .unwrap_or(defaults.min_level),
            enable_console: config
                .get_log_enable_console()
                .unwrap_or(defaults.enable_console),
        }
    }
}

/// Initialise le système de logging avec SSE et optionnellement la console
///
/// # Errors
///
/// Échoue si un subscriber global est déjà installé.
///
/// # Exemple
/// ```rust,no_run
/// use pmoserver::logs::{init_logging, LoggingOptions};
///
/// let log_state = init_logging(LoggingOptions::from_config())?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logging(options: LoggingOptions) -> Result<LogState> {
    let (filter, reload_handle) = reload::Layer::new(LevelFilter::from_level(options.min_level));

    let log_state = LogState::new(options.buffer_capacity)
        .with_reload_handle(reload_handle, options.min_level);

    // Le filtre passe avant le SseLayer
    let subscriber = Registry::default()
        .with(filter)
        .with(SseLayer::new(log_state.clone()));

    let installed = if options.enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| anyhow!("Cannot install tracing subscriber: {}", e))?;

    Ok(log_state)
}

/// Request body pour la configuration du logging
#[derive(Debug, Deserialize)]
pub struct LogSetupRequest {
    pub level: String,
}

/// Response pour la configuration du logging
#[derive(Debug, Serialize)]
pub struct LogSetupResponse {
    pub current_level: String,
    pub available_levels: Vec<String>,
}

impl LogSetupResponse {
    fn new(level: Level) -> Self {
        Self {
            current_level: level_to_string(level),
            available_levels: LEVELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// GET /api/log_setup
pub async fn log_setup_get(State(state): State<LogState>) -> impl IntoResponse {
    Json(LogSetupResponse::new(state.get_max_level()))
}

/// POST /api/log_setup
pub async fn log_setup_post(
    State(state): State<LogState>,
    Json(payload): Json<LogSetupRequest>,
) -> impl IntoResponse {
    let Some(level) = string_to_level(&payload.level) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Invalid log level. Must be one of: {}", LEVELS.join(", "))
            })),
        )
            .into_response();
    };

    state.set_max_level(level);
    tracing::info!("🔧 Log level changed to: {}", level_to_string(level));

    (StatusCode::OK, Json(LogSetupResponse::new(level))).into_response()
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

fn level_to_string(level: Level) -> String {
    level.as_str().to_string()
}

/// Crée le router de l'API de gestion des logs
pub fn create_logs_router(log_state: LogState) -> Router {
    Router::new()
        .route("/log_setup", get(log_setup_get).post(log_setup_post))
        .with_state(log_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: &str, target: &str, message: &str) -> LogEntry {
        LogEntry {
            timestamp: SystemTime::now(),
            level: level.to_string(),
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_level_allowed() {
        assert!(is_level_allowed("ERROR", Level::WARN));
        assert!(is_level_allowed("warn", Level::WARN));
        assert!(!is_level_allowed("INFO", Level::WARN));
        assert!(is_level_allowed("TRACE", Level::TRACE));
        assert!(!is_level_allowed("VERBOSE", Level::TRACE));
    }

    #[test]
    fn test_filter_entry() {
        let info = entry("INFO", "pmosoap::dispatch", "🧼 SOAP request Echo");
        let error = entry("ERROR", "pmosoap::dispatch", "💥 operation panicked");

        let all = LogQuery::default();
        assert!(filter_entry(&info, &all));
        assert!(filter_entry(&error, &all));

        let errors_only = LogQuery {
            error: Some(true),
            ..LogQuery::default()
        };
        assert!(!filter_entry(&info, &errors_only));
        assert!(filter_entry(&error, &errors_only));

        let search = LogQuery {
            search: Some("Echo".to_string()),
            ..LogQuery::default()
        };
        assert!(filter_entry(&info, &search));
        assert!(!filter_entry(&error, &search));
    }

    #[test]
    fn test_buffer_is_circular() {
        let state = LogState::new(2);
        for message in ["a", "b", "c"] {
            state.push(entry("INFO", "t", message));
        }
        let messages: Vec<String> = state.dump().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, ["b", "c"]);
    }

    #[tokio::test]
    async fn test_push_is_broadcast() {
        let state = LogState::new(4);
        let mut rx = state.subscribe();
        state.push(entry("WARN", "t", "hello"));
        assert_eq!(rx.recv().await.unwrap().message, "hello");
    }

    #[test]
    fn test_level_round_trip() {
        assert_eq!(string_to_level(" warning "), Some(Level::WARN));
        assert_eq!(string_to_level("nope"), None);
        assert_eq!(level_to_string(Level::DEBUG), "DEBUG");

        let state = LogState::new(1);
        state.set_max_level(Level::ERROR);
        assert_eq!(state.get_max_level(), Level::ERROR);
    }
}
