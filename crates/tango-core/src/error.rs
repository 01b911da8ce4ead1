use thiserror::Error;

/// An issue reported by a schema validator, surfaced verbatim in a 422 response body.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Issue {
    pub path: Vec<String>,
    pub message: String,
}

/// The shared error taxonomy for both the server dispatcher and the client transport.
///
/// Routing and content errors map to the HTTP statuses in spec §7; validation issues
/// carry the schema's reported list; everything else propagates to a 500 (server) or
/// a `Transport` failure (client).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("RPC method not found")]
    RouteNotFound,

    #[error("{method} not allowed for rpcType {rpc_type}")]
    RpcTypeMismatch { method: String, rpc_type: String },

    #[error("Unsupported Media Type")]
    UnsupportedMediaType,

    #[error("{0}")]
    BadRequest(String),

    #[error("validation failed")]
    Validation(Vec<Issue>),

    #[error("make the last stage return without calling next")]
    PipelineExhausted,

    #[error("duplicate route: {0}")]
    DuplicateRoute(String),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("msgpack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("invalid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("internal server error")]
    Internal,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("aborted")]
    Aborted,

    #[error("server responded {status}")]
    ServerError {
        status: u16,
        body: Option<serde_json::Value>,
    },

    #[error("unexpected empty response")]
    UnexpectedEmptyResponse,
}

pub type Result<T> = std::result::Result<T, Error>;
