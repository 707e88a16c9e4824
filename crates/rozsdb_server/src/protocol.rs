//! Wire format.
//!
//! Every message in both directions is a frame:
//!
//! ```text
//! +----------------+---------------------------+
//! | length: u32 BE | payload: UTF-8 JSON       |
//! +----------------+---------------------------+
//! ```
//!
//! Requests:
//!
//! ```json
//! {"user": "root=secret", "action": "find", "database": "app",
//!  "collection": "users", "object": {"where": "name", "value": "alice"}}
//! ```
//!
//! Responses:
//!
//! ```json
//! {"status": "success", "message": "..."}
//! ```

use crate::error::{ServerError, ServerResult};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Request operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Hydrate a collection and confirm access.
    Connect,
    /// Insert or replace a document.
    InsertOrUpdate,
    /// Equality query on one field.
    Find,
    /// Every document.
    FindAll,
    /// One document by id.
    FindById,
    /// Remove a document.
    Delete,
    /// Evict a collection now.
    Close,
}

impl Action {
    /// Parses an action name, ignoring ASCII case.
    pub fn parse(name: &str) -> Option<Self> {
        let action = match name.to_ascii_lowercase().as_str() {
            "connection" | "connect" => Self::Connect,
            "insertorupdate" => Self::InsertOrUpdate,
            "find" => Self::Find,
            "findall" => Self::FindAll,
            "findbyid" => Self::FindById,
            "delete" => Self::Delete,
            "close" => Self::Close,
            _ => return None,
        };
        Some(action)
    }

    /// Returns true if the action changes stored state.
    pub fn is_write(self) -> bool {
        matches!(self, Self::InsertOrUpdate | Self::Delete | Self::Close)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connection",
            Self::InsertOrUpdate => "insertorupdate",
            Self::Find => "find",
            Self::FindAll => "findall",
            Self::FindById => "findbyid",
            Self::Delete => "delete",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// Action-specific arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestObject {
    /// Document id.
    #[serde(default)]
    pub id: Option<String>,
    /// Document body: JSON text, or an inline object.
    #[serde(default)]
    pub data: Option<Value>,
    /// Field name for `find`.
    #[serde(default, rename = "where")]
    pub field: Option<String>,
    /// Target value for `find`.
    #[serde(default)]
    pub value: Option<Value>,
}

impl RequestObject {
    /// Returns the document body as JSON text.
    pub fn data_text(&self) -> ServerResult<String> {
        match &self.data {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(value @ Value::Object(_)) => Ok(value.to_string()),
            Some(_) => Err(ServerError::InvalidRequest(
                "'data' must be a JSON object or JSON text".into(),
            )),
            None => Err(ServerError::InvalidRequest("missing 'data'".into())),
        }
    }
}

/// A decoded request frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Request {
    /// `username=password` credential.
    #[serde(default)]
    pub user: Option<String>,
    /// Operation name.
    #[serde(default)]
    pub action: String,
    /// Target database.
    #[serde(default)]
    pub database: Option<String>,
    /// Target collection.
    #[serde(default)]
    pub collection: Option<String>,
    /// Operation arguments.
    #[serde(default)]
    pub object: Option<RequestObject>,
}

impl Request {
    /// Decodes a frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRequest`] if the payload is not a JSON
    /// request object.
    pub fn decode(payload: &[u8]) -> ServerResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| ServerError::InvalidRequest(format!("Invalid request: {e}")))
    }

    /// Returns the arguments object, or an error naming the action.
    pub fn object(&self) -> ServerResult<&RequestObject> {
        self.object.as_ref().ok_or_else(|| {
            ServerError::InvalidRequest(format!("missing 'object' for {}", self.action))
        })
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The request succeeded.
    Success,
    /// The request failed; the message says why.
    Error,
}

/// A response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Outcome.
    pub status: Status,
    /// Payload or error text.
    pub message: String,
}

impl Response {
    /// Creates a success response.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }

    /// Returns true for success responses.
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Serializes the envelope into a frame.
    pub fn to_frame(&self) -> ServerResult<Bytes> {
        encode_frame(&serde_json::to_vec(self)?)
    }
}

/// Prefixes `payload` with its length.
///
/// # Errors
///
/// Returns [`ServerError::MalformedFrame`] if the payload does not fit the
/// 32-bit length header.
pub fn encode_frame(payload: &[u8]) -> ServerResult<Bytes> {
    let len = frame_len(payload.len())?;
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Converts a payload length into the header value.
fn frame_len(len: usize) -> ServerResult<u32> {
    u32::try_from(len).map_err(|_| {
        ServerError::MalformedFrame(format!("payload of {len} bytes exceeds the frame header"))
    })
}

/// Reads one frame payload.
///
/// Returns `Ok(None)` when the peer closes the connection between frames.
///
/// # Errors
///
/// Returns [`ServerError::MalformedFrame`] if the declared length exceeds
/// `max_len` or the payload is cut short.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> ServerResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(ServerError::MalformedFrame(format!(
            "frame of {len} bytes exceeds limit of {max_len}"
        )));
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(Some(payload)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(
            ServerError::MalformedFrame(format!("expected {len} payload bytes")),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Writes one frame and flushes.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Formats encoded blobs as `[a, b, c]`.
pub fn format_blob_list<I, S>(blobs: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<String> = blobs
        .into_iter()
        .map(|blob| blob.as_ref().to_owned())
        .collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names() {
        assert_eq!(Action::parse("connection"), Some(Action::Connect));
        assert_eq!(Action::parse("connect"), Some(Action::Connect));
        assert_eq!(Action::parse("FindById"), Some(Action::FindById));
        assert_eq!(Action::parse("drop"), None);
        assert!(Action::Delete.is_write());
        assert!(!Action::FindAll.is_write());
        assert_eq!(Action::InsertOrUpdate.to_string(), "insertorupdate");
    }

    #[test]
    fn decode_request() {
        let payload = br#"{"user":"a=b","action":"find","database":"d","collection":"c",
            "object":{"where":"name","value":"x"}}"#;
        let request = Request::decode(payload).unwrap();
        assert_eq!(request.user.as_deref(), Some("a=b"));
        let object = request.object().unwrap();
        assert_eq!(object.field.as_deref(), Some("name"));
        assert_eq!(object.value, Some(Value::from("x")));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            Request::decode(b"nope"),
            Err(ServerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn data_as_text_or_object() {
        let text: RequestObject = serde_json::from_str(r#"{"data":"{\"a\":1}"}"#).unwrap();
        assert_eq!(text.data_text().unwrap(), r#"{"a":1}"#);

        let inline: RequestObject = serde_json::from_str(r#"{"data":{"a":1}}"#).unwrap();
        assert_eq!(inline.data_text().unwrap(), r#"{"a":1}"#);

        let bad: RequestObject = serde_json::from_str(r#"{"data":5}"#).unwrap();
        assert!(bad.data_text().is_err());
        assert!(RequestObject::default().data_text().is_err());
    }

    #[test]
    fn response_is_escaped_json() {
        let response = Response::error(r#"bad "quote""#);
        let frame = response.to_frame().unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - FRAME_HEADER_LEN);

        let decoded: Response = serde_json::from_slice(&frame[FRAME_HEADER_LEN..]).unwrap();
        assert_eq!(decoded, response);
        assert!(!decoded.is_success());
    }

    #[test]
    fn blob_list_format() {
        assert_eq!(format_blob_list(Vec::<String>::new()), "[]");
        assert_eq!(format_blob_list(["a", "b"]), "[a, b]");
    }

    #[test]
    fn frame_length_must_fit_header() {
        assert_eq!(frame_len(0).unwrap(), 0);
        assert_eq!(frame_len(u32::MAX as usize).unwrap(), u32::MAX);
        assert!(matches!(
            frame_len(u32::MAX as usize + 1),
            Err(ServerError::MalformedFrame(_))
        ));
    }

    #[tokio::test]
    async fn read_frames_from_stream() {
        let mut bytes = encode_frame(b"hello").unwrap().to_vec();
        bytes.extend_from_slice(&encode_frame(b"").unwrap());
        let mut reader = bytes.as_slice();

        assert_eq!(read_frame(&mut reader, 64).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(read_frame(&mut reader, 64).await.unwrap(), Some(Vec::new()));
        assert_eq!(read_frame(&mut reader, 64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_and_truncated_frames() {
        let frame = encode_frame(&[0u8; 100]).unwrap();
        let mut reader = &frame[..];
        assert!(matches!(
            read_frame(&mut reader, 10).await,
            Err(ServerError::MalformedFrame(_))
        ));

        let mut truncated = &frame[..50];
        assert!(matches!(
            read_frame(&mut truncated, 1024).await,
            Err(ServerError::MalformedFrame(_))
        ));
    }
}
