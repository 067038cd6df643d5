//! End-to-end handshake against an in-process HTTP JSON-RPC server that answers the way the
//! ctags language server does: Go's JSON-RPC codec, untagged Go structs, so every member is in
//! PascalCase, zero values are sent rather than omitted, and `error` is always present.
use assert_matches::assert_matches;
use axum::{extract::State, routing::post, Json, Router};
use lsprpc_jsonrpc::lsp::{self, InitializeParams, TextDocumentSync, TextDocumentSyncKind};
use lsprpc_jsonrpc::{ClientConfig, ClientError, Framing, IdStyle, JsonRpcClient, TcpTransport};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

type Received = Arc<Mutex<Vec<Value>>>;

async fn handle(State(received): State<Received>, Json(request): Json<Value>) -> Json<Value> {
    received.lock().unwrap().push(request.clone());

    let id = request["id"].clone();
    let response = match request["method"].as_str() {
        Some("initialize") => json!({
            "id": id,
            "result": initialize_result(),
            "error": null
        }),
        Some(method) => json!({
            "id": id,
            "result": null,
            "error": format!("rpc: can't find method {}", method)
        }),
        None => json!({
            "id": null,
            "result": null,
            "error": "rpc: invalid request"
        }),
    };

    Json(response)
}

fn initialize_result() -> Value {
    json!({
        "Capabilities": {
            "TextDocumentSync": 0,
            "HoverProvider": true,
            "CompletionProvider": {"ResolveProvider": false, "TriggerCharacters": null},
            "SignatureHelpProvider": {"TriggerCharacters": null},
            "DefinitionProvider": true,
            "ReferencesProvider": true,
            "DocumentHighlightProvider": false,
            "DocumentSymbolProvider": true,
            "WorkspaceSymbolProvider": false,
            "CodeActionProvider": false,
            "CodeLensProvider": {"ResolveProvider": false},
            "DocumentFormattingProvider": false,
            "DocumentRangeFormattingProvider": false,
            "DocumentOnTypeFormattingProvider": {"FirstTriggerCharacter": "", "MoreTriggerCharacter": null},
            "RenameProvider": false
        }
    })
}

async fn spawn_server() -> (SocketAddr, Received) {
    let received = Received::default();
    let app = Router::new()
        .route("/", post(handle))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    (addr, received)
}

fn config_for(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        ..Default::default()
    }
}

#[tokio::test]
async fn initialize_handshake_over_http() -> anyhow::Result<()> {
    let (addr, received) = spawn_server().await;
    let client = JsonRpcClient::http(&config_for(addr))?;

    let result = client.initialize(&InitializeParams::default()).await?;

    let capabilities = result.capabilities;
    assert_eq!(
        capabilities.text_document_sync,
        Some(TextDocumentSync::Kind(TextDocumentSyncKind::None))
    );
    assert!(capabilities.provides_hover());
    assert!(capabilities.provides_definition());
    assert!(capabilities.provides_references());
    assert!(capabilities.provides_document_symbols());
    assert!(!capabilities.provides_rename());

    let received = received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["method"], "initialize");
    assert_eq!(
        received[0]["params"],
        json!([{"processId": 1, "rootPath": "/", "capabilities": {}}])
    );
    assert!(received[0]["id"].is_string(), "default ids are UUID strings");

    Ok(())
}

#[tokio::test]
async fn untyped_initialize_returns_result_unchanged() -> anyhow::Result<()> {
    let (addr, _received) = spawn_server().await;
    let client = JsonRpcClient::http(&config_for(addr))?;

    let result = client
        .call(lsp::INITIALIZE, &InitializeParams::default())
        .await?;

    assert_eq!(result, initialize_result());

    Ok(())
}

#[tokio::test]
async fn unknown_method_over_http() -> anyhow::Result<()> {
    let (addr, _received) = spawn_server().await;
    let client = JsonRpcClient::http(&ClientConfig {
        id_style: IdStyle::Sequential,
        ..config_for(addr)
    })?;

    let error = client.call("textDocument/frobnicate", json!({})).await.unwrap_err();

    assert_matches!(error, ClientError::Rpc { .. });
    assert_eq!(
        error.remote_error().map(|e| e.message()),
        Some("rpc: can't find method textDocument/frobnicate".to_string())
    );

    Ok(())
}

#[tokio::test]
async fn nothing_listening() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = JsonRpcClient::http(&config_for(addr)).unwrap();

    let error = client
        .initialize(&InitializeParams::default())
        .await
        .unwrap_err();

    assert_matches!(error, ClientError::Transport(ref e) if e.is_connect());

    let error = TcpTransport::connect_tcp(addr, Framing::ContentLength)
        .await
        .unwrap_err();
    assert!(error.is_connect(), "expected connect error, got {:?}", error);
}
