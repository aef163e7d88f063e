//! Main event loop for the LSP server.
//!
//! Messages are handled one at a time to completion. Notifications update
//! the VFS and republish diagnostics; requests read the analysis of the
//! current document version from the [`DocumentCache`].

use crate::config::ServerConfig;
use crate::db::DocumentCache;
use crate::handlers::completion::handle_completion;
use crate::handlers::definition::handle_goto_definition;
use crate::handlers::diagnostics::analysis_to_diagnostics;
use crate::handlers::document_highlight::handle_document_highlight;
use crate::handlers::hover::handle_hover;
use crate::handlers::references::handle_references;
use crate::handlers::rename::{handle_prepare_rename, handle_rename};
use crate::handlers::symbols::handle_document_symbols;
use crate::vfs::Vfs;
use crossbeam_channel::{Receiver, Sender};
use lsp_types::notification::{
    DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, Exit, Initialized,
    Notification, PublishDiagnostics,
};
use lsp_types::request::{
    Completion, DocumentHighlightRequest, DocumentSymbolRequest, GotoDefinition, HoverRequest,
    Initialize, PrepareRenameRequest, References, Rename, Request, Shutdown,
};
use lsp_types::{
    CompletionParams, DocumentHighlightParams, DocumentSymbolParams, GotoDefinitionParams,
    HoverParams, InitializeParams, PublishDiagnosticsParams, ReferenceParams, RenameParams,
    TextDocumentPositionParams, Uri,
};
use parking_lot::RwLock;
use std::sync::Arc;
use webpipe_index::DocumentAnalysis;

/// State managed by the main loop.
pub struct MainLoopState {
    /// Virtual file system for open documents.
    pub vfs: Arc<RwLock<Vfs>>,
    /// Sender for outgoing LSP messages.
    pub sender: Sender<lsp_server::Message>,
    /// Analyses keyed by document and version.
    pub cache: DocumentCache,
    /// Server settings.
    pub config: ServerConfig,
    /// Whether shutdown was requested.
    pub shutdown_requested: bool,
    /// Whether the client sent `exit`.
    pub exit_requested: bool,
}

impl MainLoopState {
    /// Create a new main loop state.
    pub fn new(sender: Sender<lsp_server::Message>, config: ServerConfig) -> Self {
        Self {
            vfs: Arc::new(RwLock::new(Vfs::new())),
            sender,
            cache: DocumentCache::new(config.cache_config()),
            config,
            shutdown_requested: false,
            exit_requested: false,
        }
    }

    /// Text and analysis of the current version of a document.
    ///
    /// When the rebuild fails the last good analysis is used.
    fn document_data(&mut self, uri: &Uri) -> Option<(String, Arc<DocumentAnalysis>)> {
        let (text, version) = self.vfs.read().snapshot(uri)?;
        match self.cache.get(uri.as_str(), version, &text) {
            Ok(analysis) => Some((text, analysis)),
            Err(e) => {
                tracing::warn!("{}", e);
                e.previous().cloned().map(|analysis| (text, analysis))
            }
        }
    }

    /// Handle an LSP message.
    pub fn handle_message(&mut self, msg: lsp_server::Message) {
        match msg {
            lsp_server::Message::Request(req) => self.handle_request(req),
            lsp_server::Message::Notification(notif) => self.handle_notification(notif),
            lsp_server::Message::Response(_resp) => {
                // We don't send requests to the client
            }
        }
    }

    /// Handle an LSP request (expects response).
    fn handle_request(&mut self, req: lsp_server::Request) {
        let id = req.id.clone();

        let result = if self.shutdown_requested && req.method != Shutdown::METHOD {
            Err("Server is shutting down".to_string())
        } else {
            match req.method.as_str() {
                Initialize::METHOD => self.handle_initialize(req),
                Shutdown::METHOD => {
                    self.shutdown_requested = true;
                    Ok(serde_json::Value::Null)
                }
                Completion::METHOD => self.handle_completion_request(req),
                GotoDefinition::METHOD => self.handle_goto_definition_request(req),
                References::METHOD => self.handle_references_request(req),
                HoverRequest::METHOD => self.handle_hover_request(req),
                DocumentSymbolRequest::METHOD => self.handle_document_symbols_request(req),
                DocumentHighlightRequest::METHOD => self.handle_document_highlight_request(req),
                PrepareRenameRequest::METHOD => self.handle_prepare_rename_request(req),
                Rename::METHOD => self.handle_rename_request(req),
                _ => {
                    tracing::warn!("Unhandled request: {}", req.method);
                    Err(format!("Unhandled request: {}", req.method))
                }
            }
        };

        let response = match result {
            Ok(value) => lsp_server::Response::new_ok(id, value),
            Err(msg) => {
                // Use MethodNotFound only for truly unknown methods,
                // InternalError for handler failures
                let error_code = if msg.starts_with("Unhandled request") {
                    lsp_server::ErrorCode::MethodNotFound
                } else {
                    lsp_server::ErrorCode::InternalError
                };
                lsp_server::Response::new_err(id, error_code as i32, msg)
            }
        };

        self.send(lsp_server::Message::Response(response));
    }

    /// Handle the initialize request.
    fn handle_initialize(&mut self, req: lsp_server::Request) -> Result<serde_json::Value, String> {
        let _params: InitializeParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        serde_json::to_value(crate::server::initialize_result()).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/completion request.
    fn handle_completion_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<serde_json::Value, String> {
        let params: CompletionParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position.text_document.uri;
        let response = self
            .document_data(uri)
            .and_then(|(text, analysis)| handle_completion(&params, &text, &analysis));

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/definition request.
    fn handle_goto_definition_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<serde_json::Value, String> {
        let params: GotoDefinitionParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position_params.text_document.uri;
        let response = self
            .document_data(uri)
            .and_then(|(text, analysis)| handle_goto_definition(&params, &text, &analysis, uri));

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/references request.
    fn handle_references_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<serde_json::Value, String> {
        let params: ReferenceParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position.text_document.uri;
        let engine = self.config.template_engine.clone();
        let response = self.document_data(uri).and_then(|(text, analysis)| {
            handle_references(&params, &text, &analysis, uri, &engine)
        });

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/hover request.
    fn handle_hover_request(&mut self, req: lsp_server::Request) -> Result<serde_json::Value, String> {
        let params: HoverParams = serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position_params.text_document.uri;
        let response = self
            .document_data(uri)
            .and_then(|(text, analysis)| handle_hover(&params, &text, &analysis));

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/documentSymbol request.
    fn handle_document_symbols_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<serde_json::Value, String> {
        let params: DocumentSymbolParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document.uri;
        let response = self
            .document_data(uri)
            .and_then(|(text, analysis)| handle_document_symbols(&params, &text, &analysis));

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/documentHighlight request.
    fn handle_document_highlight_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<serde_json::Value, String> {
        let params: DocumentHighlightParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position_params.text_document.uri;
        let engine = self.config.template_engine.clone();
        let response = self.document_data(uri).and_then(|(text, analysis)| {
            handle_document_highlight(&params, &text, &analysis, &engine)
        });

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/prepareRename request.
    fn handle_prepare_rename_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<serde_json::Value, String> {
        let params: TextDocumentPositionParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document.uri;
        let response = self
            .document_data(uri)
            .and_then(|(text, analysis)| handle_prepare_rename(&params, &text, &analysis));

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/rename request.
    fn handle_rename_request(&mut self, req: lsp_server::Request) -> Result<serde_json::Value, String> {
        let params: RenameParams = serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position.text_document.uri;
        let engine = self.config.template_engine.clone();
        let response = match self.document_data(uri) {
            Some((text, analysis)) => handle_rename(&params, &text, &analysis, &engine)?,
            None => None,
        };

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle an LSP notification (no response expected).
    fn handle_notification(&mut self, notif: lsp_server::Notification) {
        match notif.method.as_str() {
            DidOpenTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidOpenTextDocumentParams>(notif.params)
                {
                    self.on_did_open(params);
                }
            }
            DidChangeTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidChangeTextDocumentParams>(notif.params)
                {
                    self.on_did_change(params);
                }
            }
            DidCloseTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidCloseTextDocumentParams>(notif.params)
                {
                    self.on_did_close(params);
                }
            }
            Initialized::METHOD => {
                tracing::info!("Client initialized");
            }
            Exit::METHOD => {
                tracing::info!("Exit notification received");
                self.exit_requested = true;
            }
            _ => {
                tracing::debug!("Unhandled notification: {}", notif.method);
            }
        }
    }

    /// Handle textDocument/didOpen notification.
    fn on_did_open(&mut self, params: lsp_types::DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let text = params.text_document.text;
        let version = params.text_document.version;

        tracing::info!("Document opened: {}", uri.as_str());

        self.vfs.write().open(uri.clone(), &text, version);
        self.publish_diagnostics(&uri, version, &text);
    }

    /// Handle textDocument/didChange notification.
    fn on_did_change(&mut self, params: lsp_types::DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // For full sync, take the last change (which is the full content)
        if let Some(change) = params.content_changes.into_iter().last() {
            let text = change.text;

            tracing::debug!("Document changed: {} (version {})", uri.as_str(), version);

            self.vfs.write().update(&uri, &text, version);
            self.publish_diagnostics(&uri, version, &text);
        }
    }

    /// Handle textDocument/didClose notification.
    fn on_did_close(&mut self, params: lsp_types::DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;

        tracing::info!("Document closed: {}", uri.as_str());

        self.vfs.write().close(&uri);
        self.cache.invalidate(uri.as_str());

        self.send_diagnostics(&uri, None, vec![]);
    }

    /// Analyze a document version and publish the full diagnostic set.
    ///
    /// A failed analysis publishes an empty set for this pass.
    fn publish_diagnostics(&mut self, uri: &Uri, version: i32, text: &str) {
        if !self.config.diagnostics.enabled {
            return;
        }

        let diagnostics = match self.cache.get(uri.as_str(), version, text) {
            Ok(analysis) => analysis_to_diagnostics(&analysis, text),
            Err(e) => {
                tracing::warn!("{}", e);
                Vec::new()
            }
        };

        tracing::debug!(
            "Publishing {} diagnostics for {}",
            diagnostics.len(),
            uri.as_str()
        );

        self.send_diagnostics(uri, Some(version), diagnostics);
    }

    /// Send diagnostics to the client.
    fn send_diagnostics(
        &self,
        uri: &Uri,
        version: Option<i32>,
        diagnostics: Vec<lsp_types::Diagnostic>,
    ) {
        let params = PublishDiagnosticsParams {
            uri: uri.clone(),
            diagnostics,
            version,
        };

        let notif = lsp_server::Notification::new(PublishDiagnostics::METHOD.to_string(), params);

        self.send(lsp_server::Message::Notification(notif));
    }

    /// Send a message to the client.
    fn send(&self, msg: lsp_server::Message) {
        if let Err(e) = self.sender.send(msg) {
            tracing::error!("Failed to send message: {}", e);
        }
    }
}

/// Run the main event loop until the client exits or disconnects.
pub fn run_main_loop(
    receiver: Receiver<lsp_server::Message>,
    sender: Sender<lsp_server::Message>,
    config: ServerConfig,
) {
    let mut state = MainLoopState::new(sender, config);

    tracing::info!("Main loop started");

    for msg in receiver {
        state.handle_message(msg);
        if state.exit_requested {
            break;
        }
    }

    tracing::info!("Main loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use lsp_server::{Message, RequestId};
    use serde_json::json;

    const URI: &str = "file:///test.wp";
    const SOURCE: &str = "pipeline foo = |> jq: `.`\nGET /x |> pipeline: foo\n";

    fn state() -> (MainLoopState, Receiver<Message>) {
        let (sender, receiver) = unbounded();
        (MainLoopState::new(sender, ServerConfig::default()), receiver)
    }

    fn notify(state: &mut MainLoopState, method: &str, params: serde_json::Value) {
        state.handle_message(Message::Notification(lsp_server::Notification::new(
            method.to_string(),
            params,
        )));
    }

    fn request(
        state: &mut MainLoopState,
        receiver: &Receiver<Message>,
        method: &str,
        params: serde_json::Value,
    ) -> lsp_server::Response {
        state.handle_message(Message::Request(lsp_server::Request::new(
            RequestId::from(1),
            method.to_string(),
            params,
        )));
        match receiver.try_recv() {
            Ok(Message::Response(response)) => response,
            other => panic!("expected response, got {other:?}"),
        }
    }

    fn open(state: &mut MainLoopState, text: &str, version: i32) {
        notify(
            state,
            DidOpenTextDocument::METHOD,
            json!({ "textDocument": { "uri": URI, "languageId": "webpipe", "version": version, "text": text } }),
        );
    }

    fn published(receiver: &Receiver<Message>) -> PublishDiagnosticsParams {
        match receiver.try_recv() {
            Ok(Message::Notification(n)) if n.method == PublishDiagnostics::METHOD => {
                serde_json::from_value(n.params).expect("diagnostics params")
            }
            other => panic!("expected diagnostics, got {other:?}"),
        }
    }

    #[test]
    fn test_open_publishes_diagnostics() {
        let (mut state, receiver) = state();
        open(&mut state, "GET /x |> pipeline: missing\n", 1);

        let params = published(&receiver);
        assert_eq!(params.version, Some(1));
        assert_eq!(params.diagnostics.len(), 1);
        assert_eq!(params.diagnostics[0].message, "Unknown pipeline 'missing'");
    }

    #[test]
    fn test_change_republishes_full_set() {
        let (mut state, receiver) = state();
        open(&mut state, "GET /x |> pipeline: missing\n", 1);
        published(&receiver);

        notify(
            &mut state,
            DidChangeTextDocument::METHOD,
            json!({
                "textDocument": { "uri": URI, "version": 2 },
                "contentChanges": [{ "text": SOURCE }]
            }),
        );
        let params = published(&receiver);
        assert_eq!(params.version, Some(2));
        assert!(params.diagnostics.is_empty());
        assert_eq!(state.cache.builds(), 2);
    }

    #[test]
    fn test_requests_reuse_cached_analysis() {
        let (mut state, receiver) = state();
        open(&mut state, SOURCE, 1);
        published(&receiver);

        let position = json!({ "textDocument": { "uri": URI }, "position": { "line": 1, "character": 21 } });
        let definition = request(&mut state, &receiver, GotoDefinition::METHOD, position.clone());
        assert!(definition.error.is_none());
        let location = definition.result.expect("definition result");
        assert_eq!(location["range"]["start"], json!({ "line": 0, "character": 9 }));

        let hover = request(&mut state, &receiver, HoverRequest::METHOD, position);
        assert!(hover.result.is_some_and(|v| !v.is_null()));

        assert_eq!(state.cache.builds(), 1);
    }

    #[test]
    fn test_references_request() {
        let (mut state, receiver) = state();
        open(&mut state, SOURCE, 1);
        published(&receiver);

        let params = json!({
            "textDocument": { "uri": URI },
            "position": { "line": 0, "character": 10 },
            "context": { "includeDeclaration": false }
        });
        let response = request(&mut state, &receiver, References::METHOD, params);
        let locations = response.result.expect("references");
        assert_eq!(locations.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_request_for_unknown_document_is_null() {
        let (mut state, receiver) = state();
        let params = json!({ "textDocument": { "uri": URI }, "position": { "line": 0, "character": 0 } });
        let response = request(&mut state, &receiver, HoverRequest::METHOD, params);
        assert_eq!(response.result, Some(serde_json::Value::Null));
    }

    #[test]
    fn test_invalid_rename_is_an_error() {
        let (mut state, receiver) = state();
        open(&mut state, SOURCE, 1);
        published(&receiver);

        let params = json!({
            "textDocument": { "uri": URI },
            "position": { "line": 0, "character": 10 },
            "newName": "not valid"
        });
        let response = request(&mut state, &receiver, Rename::METHOD, params);
        let error = response.error.expect("rename error");
        assert_eq!(error.code, lsp_server::ErrorCode::InternalError as i32);
    }

    #[test]
    fn test_close_clears_diagnostics_and_cache() {
        let (mut state, receiver) = state();
        open(&mut state, SOURCE, 1);
        published(&receiver);

        notify(
            &mut state,
            DidCloseTextDocument::METHOD,
            json!({ "textDocument": { "uri": URI } }),
        );
        let params = published(&receiver);
        assert!(params.diagnostics.is_empty());
        assert!(state.cache.is_empty());
        assert_eq!(state.vfs.read().uris().count(), 0);
    }

    #[test]
    fn test_unknown_request_and_shutdown() {
        let (mut state, receiver) = state();
        let response = request(&mut state, &receiver, "custom/unknown", json!(null));
        let error = response.error.expect("method not found");
        assert_eq!(error.code, lsp_server::ErrorCode::MethodNotFound as i32);

        let response = request(&mut state, &receiver, Shutdown::METHOD, json!(null));
        assert_eq!(response.result, Some(serde_json::Value::Null));
        assert!(state.shutdown_requested);

        notify(&mut state, Exit::METHOD, json!(null));
        assert!(state.exit_requested);
    }
}
