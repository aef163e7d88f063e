//! Main LSP server implementation.

use crate::config::ServerConfig;
use crate::main_loop::run_main_loop;
use lsp_server::Connection;
use lsp_types::{
    CompletionOptions, HoverProviderCapability, InitializeParams, InitializeResult, OneOf,
    RenameOptions, ServerCapabilities, ServerInfo, TextDocumentSyncCapability,
    TextDocumentSyncKind,
};

/// Name reported to clients.
pub const SERVER_NAME: &str = "wp-lsp";

/// The LSP server.
pub struct Server {
    /// Connection to the LSP client.
    connection: Connection,
    /// Initialize parameters from client.
    init_params: InitializeParams,
    /// Settings from `initializationOptions`.
    config: ServerConfig,
}

impl Server {
    /// Create a new LSP server from a connection.
    ///
    /// Invalid initialization options are logged and replaced by defaults.
    pub fn new(connection: Connection, init_params: InitializeParams) -> Self {
        let config = ServerConfig::from_init_options(init_params.initialization_options.clone())
            .unwrap_or_else(|e| {
                tracing::warn!("{}; using default settings", e);
                ServerConfig::default()
            });
        Self {
            connection,
            init_params,
            config,
        }
    }

    /// Run the server's main loop.
    pub fn run(self) {
        tracing::info!("Starting webpipe language server v{}", crate::VERSION);

        if let Some(folders) = &self.init_params.workspace_folders {
            if let Some(folder) = folders.first() {
                tracing::info!("Workspace root: {}", folder.uri.as_str());
            }
        }
        tracing::debug!("Settings: {:?}", self.config);

        let (sender, receiver) = (self.connection.sender, self.connection.receiver);
        run_main_loop(receiver, sender, self.config);

        tracing::info!("Server shutdown complete");
    }
}

/// Capabilities advertised during initialization.
pub fn capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![
                ":".to_string(), // `|> pg:`
                " ".to_string(), // After keywords
                ".".to_string(), // `mock pg.`
                ">".to_string(), // `{{>` and `|>`
            ]),
            ..Default::default()
        }),
        definition_provider: Some(OneOf::Left(true)),
        references_provider: Some(OneOf::Left(true)),
        document_highlight_provider: Some(OneOf::Left(true)),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        rename_provider: Some(OneOf::Right(RenameOptions {
            prepare_provider: Some(true),
            work_done_progress_options: Default::default(),
        })),
        ..Default::default()
    }
}

/// The initialize response body.
pub fn initialize_result() -> InitializeResult {
    InitializeResult {
        capabilities: capabilities(),
        server_info: Some(ServerInfo {
            name: SERVER_NAME.to_string(),
            version: Some(crate::VERSION.to_string()),
        }),
    }
}

/// Start the LSP server using stdio transport.
pub fn start_stdio() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!("Starting LSP server on stdio");

    let (connection, io_threads) = Connection::stdio();

    // Wait for initialize request
    let (id, params) = connection.initialize_start()?;
    let init_params: InitializeParams = serde_json::from_value(params)?;

    connection.initialize_finish(id, serde_json::to_value(initialize_result())?)?;

    tracing::info!("LSP initialized successfully");

    let server = Server::new(connection, init_params);
    server.run();

    // Wait for IO threads to finish
    io_threads.join()?;

    Ok(())
}
