//! Payloads of the Language Server Protocol `initialize` handshake.
//!
//! Only what's needed to perform the handshake and read back what the server can do.  Every
//! server capability is optional so that the sparse answers real servers give still decode.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// The method name of the handshake request
pub const INITIALIZE: &str = "initialize";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// The process Id of the parent process that started the server.
    pub process_id: Option<u32>,

    /// The root path of the workspace.  `None` if no folder is open.
    pub root_path: Option<String>,

    /// The capabilities provided by the client (editor)
    pub capabilities: ClientCapabilities,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            process_id: Some(1),
            root_path: Some("/".to_string()),
            capabilities: ClientCapabilities::default(),
        }
    }
}

/// Client capabilities aren't interpreted here, just passed along.  The default serializes as
/// `{}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// What the server answers to `initialize`.
///
/// Servers built on Go's `encoding/json` without field tags (the ctags server among them) spell
/// every member in PascalCase and send zero values instead of omitting members, so every field
/// here also accepts that spelling and tolerates `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// The capabilities the language server provides.
    #[serde(default, alias = "Capabilities", deserialize_with = "null_as_default")]
    pub capabilities: ServerCapabilities,

    /// Members not modeled above, like `serverInfo`
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The `data` a server attaches to an error response to `initialize`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeError {
    /// Whether the client should retry the `initialize` request after showing the error message
    #[serde(default, alias = "Retry")]
    pub retry: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    #[serde(default, alias = "TextDocumentSync", skip_serializing_if = "Option::is_none")]
    pub text_document_sync: Option<TextDocumentSync>,
    #[serde(default, alias = "HoverProvider", skip_serializing_if = "Option::is_none")]
    pub hover_provider: Option<Provider>,
    #[serde(default, alias = "CompletionProvider", skip_serializing_if = "Option::is_none")]
    pub completion_provider: Option<CompletionOptions>,
    #[serde(default, alias = "SignatureHelpProvider", skip_serializing_if = "Option::is_none")]
    pub signature_help_provider: Option<SignatureHelpOptions>,
    #[serde(default, alias = "DefinitionProvider", skip_serializing_if = "Option::is_none")]
    pub definition_provider: Option<Provider>,
    #[serde(default, alias = "ReferencesProvider", skip_serializing_if = "Option::is_none")]
    pub references_provider: Option<Provider>,
    #[serde(default, alias = "DocumentHighlightProvider", skip_serializing_if = "Option::is_none")]
    pub document_highlight_provider: Option<Provider>,
    #[serde(default, alias = "DocumentSymbolProvider", skip_serializing_if = "Option::is_none")]
    pub document_symbol_provider: Option<Provider>,
    #[serde(default, alias = "WorkspaceSymbolProvider", skip_serializing_if = "Option::is_none")]
    pub workspace_symbol_provider: Option<Provider>,
    #[serde(default, alias = "CodeActionProvider", skip_serializing_if = "Option::is_none")]
    pub code_action_provider: Option<Provider>,
    #[serde(default, alias = "CodeLensProvider", skip_serializing_if = "Option::is_none")]
    pub code_lens_provider: Option<CodeLensOptions>,
    #[serde(default, alias = "DocumentFormattingProvider", skip_serializing_if = "Option::is_none")]
    pub document_formatting_provider: Option<Provider>,
    #[serde(
        default,
        alias = "DocumentRangeFormattingProvider",
        skip_serializing_if = "Option::is_none"
    )]
    pub document_range_formatting_provider: Option<Provider>,
    #[serde(
        default,
        alias = "DocumentOnTypeFormattingProvider",
        skip_serializing_if = "Option::is_none"
    )]
    pub document_on_type_formatting_provider: Option<DocumentOnTypeFormattingOptions>,
    #[serde(default, alias = "RenameProvider", skip_serializing_if = "Option::is_none")]
    pub rename_provider: Option<Provider>,

    /// Capabilities not modeled above
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ServerCapabilities {
    pub fn provides_hover(&self) -> bool {
        Provider::enabled(&self.hover_provider)
    }

    pub fn provides_definition(&self) -> bool {
        Provider::enabled(&self.definition_provider)
    }

    pub fn provides_references(&self) -> bool {
        Provider::enabled(&self.references_provider)
    }

    pub fn provides_document_symbols(&self) -> bool {
        Provider::enabled(&self.document_symbol_provider)
    }

    pub fn provides_rename(&self) -> bool {
        Provider::enabled(&self.rename_provider)
    }
}

/// Most `*Provider` capabilities are either a flag or, in newer protocol versions, an options
/// object whose presence means the feature is supported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Provider {
    Flag(bool),
    Options(Map<String, Value>),
}

impl Provider {
    pub fn is_enabled(&self) -> bool {
        match self {
            Provider::Flag(enabled) => *enabled,
            Provider::Options(_) => true,
        }
    }

    fn enabled(provider: &Option<Provider>) -> bool {
        provider.as_ref().is_some_and(Provider::is_enabled)
    }
}

/// `textDocumentSync` is either a bare [`TextDocumentSyncKind`] or an options object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextDocumentSync {
    Kind(TextDocumentSyncKind),
    Options(TextDocumentSyncOptions),
}

/// Defines how the host (editor) should sync document changes to the language server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TextDocumentSyncKind {
    None = 0,

    /// Documents are synced by always sending the full content of the document.
    Full = 1,

    /// Documents are synced by sending the full content on open.  After that only incremental
    /// updates to the document are sent.
    Incremental = 2,
}

impl TryFrom<u8> for TextDocumentSyncKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Full),
            2 => Ok(Self::Incremental),
            other => Err(format!("unknown text document sync kind {}", other)),
        }
    }
}

impl From<TextDocumentSyncKind> for u8 {
    fn from(kind: TextDocumentSyncKind) -> Self {
        kind as u8
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentSyncOptions {
    #[serde(default, alias = "OpenClose", skip_serializing_if = "Option::is_none")]
    pub open_close: Option<bool>,
    #[serde(default, alias = "Change", skip_serializing_if = "Option::is_none")]
    pub change: Option<TextDocumentSyncKind>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    /// The server provides support to resolve additional information for a completion item.
    #[serde(default, alias = "ResolveProvider", deserialize_with = "null_as_default")]
    pub resolve_provider: bool,

    /// The characters that trigger completion automatically.
    #[serde(
        default,
        alias = "TriggerCharacters",
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub trigger_characters: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureHelpOptions {
    #[serde(
        default,
        alias = "TriggerCharacters",
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub trigger_characters: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeLensOptions {
    #[serde(default, alias = "ResolveProvider", deserialize_with = "null_as_default")]
    pub resolve_provider: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOnTypeFormattingOptions {
    /// A character on which formatting should be triggered, like `}`.
    #[serde(default, alias = "FirstTriggerCharacter", deserialize_with = "null_as_default")]
    pub first_trigger_character: String,

    #[serde(
        default,
        alias = "MoreTriggerCharacter",
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub more_trigger_character: Vec<String>,
}

/// Go encodes nil slices and pointers as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_params_match_handshake() {
        let params = serde_json::to_value(InitializeParams::default()).unwrap();

        assert_eq!(
            params,
            json!({"processId": 1, "rootPath": "/", "capabilities": {}})
        );
    }

    #[test]
    fn decode_sparse_capabilities() {
        let result: InitializeResult = serde_json::from_value(json!({
            "capabilities": {
                "textDocumentSync": 1,
                "hoverProvider": true,
                "definitionProvider": true,
                "referencesProvider": true,
                "documentSymbolProvider": true,
                "experimental": {"ctags": true}
            }
        }))
        .unwrap();

        let capabilities = result.capabilities;
        assert_eq!(
            capabilities.text_document_sync,
            Some(TextDocumentSync::Kind(TextDocumentSyncKind::Full))
        );
        assert_eq!(capabilities.hover_provider, Some(Provider::Flag(true)));
        assert!(capabilities.provides_definition());
        assert!(!capabilities.provides_rename());
        assert_eq!(capabilities.rename_provider, None);
        assert_eq!(capabilities.completion_provider, None);
        assert_eq!(capabilities.other.get("experimental"), Some(&json!({"ctags": true})));
    }

    #[test]
    fn decode_sync_options_and_nested_options() {
        let capabilities: ServerCapabilities = serde_json::from_value(json!({
            "textDocumentSync": {"openClose": true, "change": 2},
            "completionProvider": {"resolveProvider": true, "triggerCharacters": ["."]},
            "documentOnTypeFormattingProvider": {"firstTriggerCharacter": "}"}
        }))
        .unwrap();

        assert_eq!(
            capabilities.text_document_sync,
            Some(TextDocumentSync::Options(TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::Incremental),
            }))
        );
        assert_eq!(
            capabilities.completion_provider,
            Some(CompletionOptions {
                resolve_provider: true,
                trigger_characters: vec![".".to_string()],
            })
        );
        assert_eq!(
            capabilities
                .document_on_type_formatting_provider
                .unwrap()
                .first_trigger_character,
            "}"
        );
    }

    /// Everything Go's `encoding/json` writes for the ctags server's answer, zero values and all
    #[test]
    fn decode_untagged_go_struct() {
        let result: InitializeResult = serde_json::from_value(json!({
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
                "DocumentOnTypeFormattingProvider": {
                    "FirstTriggerCharacter": "",
                    "MoreTriggerCharacter": null
                },
                "RenameProvider": false
            }
        }))
        .unwrap();

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
        assert_eq!(capabilities.completion_provider, Some(CompletionOptions::default()));
        assert_eq!(
            capabilities.document_on_type_formatting_provider,
            Some(DocumentOnTypeFormattingOptions::default())
        );
        assert!(capabilities.other.is_empty());
        assert!(result.other.is_empty());
    }

    #[test]
    fn decode_provider_options_and_extra_members() {
        let result: InitializeResult = serde_json::from_value(json!({
            "capabilities": {
                "hoverProvider": {"workDoneProgress": true},
                "renameProvider": {"prepareProvider": true}
            },
            "serverInfo": {"name": "ctags", "version": "0.1"}
        }))
        .unwrap();

        assert!(result.capabilities.provides_hover());
        assert!(result.capabilities.provides_rename());
        assert_eq!(
            result.other.get("serverInfo"),
            Some(&json!({"name": "ctags", "version": "0.1"}))
        );
    }

    #[test]
    fn missing_or_null_capabilities_decode_as_empty() {
        let empty: InitializeResult = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.capabilities, ServerCapabilities::default());

        let null: InitializeResult =
            serde_json::from_value(json!({"Capabilities": null})).unwrap();
        assert_eq!(null.capabilities, ServerCapabilities::default());
    }

    #[test]
    fn reject_unknown_sync_kind() {
        assert!(serde_json::from_value::<TextDocumentSyncKind>(json!(7)).is_err());
    }
}
