use anyhow::Result;
use pmoserver::{ServerBuilder, logs::LoggingOptions};
use pmosoap::operation;
use pmosoap::operations::{OperationError, OperationOutput, OperationRegistry};
use pmosoap::{SoapConfigExt, SoapServerExt};
use tracing::info;

/// Opérations de démonstration exposées par le binaire
fn demo_registry() -> Result<OperationRegistry> {
    let mut registry = OperationRegistry::new();

    registry.register(
        "Echo",
        operation!(|request| {
            let text: String = request.arg("Text")?;
            Ok(request.respond([("Text", text)]))
        }),
    )?;

    registry.register(
        "Add",
        operation!(|request| {
            let a: i64 = request.arg("a")?;
            let b: i64 = request.arg("b")?;
            let sum = a
                .checked_add(b)
                .ok_or_else(|| OperationError::failed("Integer overflow"))?;
            Ok(OperationOutput::response("Add", [("sum", sum)]))
        }),
    )?;

    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    // ========== PHASE 1 : Infrastructure ==========
    let config = pmoconfig::get_config();
    let mut server = ServerBuilder::new_configured().build();
    server.init_logging(LoggingOptions::from_config()).await?;
    info!("📁 Configuration loaded from {}", config.directory());

    // ========== PHASE 2 : Opérations SOAP ==========
    info!("🧼 Registering SOAP operations...");
    let dispatcher = server.register_soap_endpoint(demo_registry()?).await?;

    let actions: Vec<String> = dispatcher
        .registry()
        .actions()
        .into_iter()
        .map(String::from)
        .collect();
    let endpoint = config.get_soap_endpoint()?;
    server
        .add_route("/info", move || {
            let actions = actions.clone();
            let endpoint = endpoint.clone();
            async move {
                serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "soap_endpoint": endpoint,
                    "operations": actions,
                })
            }
        })
        .await;

    // ========== PHASE 3 : Démarrage du serveur ==========
    info!("🌐 Starting HTTP server...");
    server.start().await?;

    info!("✅ PMOSoap is ready!");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    Ok(())
}
