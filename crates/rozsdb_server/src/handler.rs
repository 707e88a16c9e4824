//! Request dispatch.
//!
//! Handlers are synchronous; the server runs them on the blocking pool.

use crate::auth::{Authorizer, IpGate, Permission};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::protocol::{format_blob_list, Action, Request, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rozsdb_core::{Collection, Engine, ObjectId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reply to a successful `connection` request.
pub const CONNECTED: &str = "CONNECTED";
/// Reply to a successful `close` request.
pub const CLOSED: &str = "CLOSED";
/// Base64-encoded in the reply to a successful `delete`.
pub const DELETED: &str = "DELETED";

/// Context shared by every connection.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Storage engine.
    pub engine: Arc<Engine>,
    /// Credential checks.
    pub authorizer: Arc<dyn Authorizer>,
    /// Connection admission.
    pub ip_gate: Arc<dyn IpGate>,
    requests: AtomicU64,
    failures: AtomicU64,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(
        config: ServerConfig,
        engine: Arc<Engine>,
        authorizer: Arc<dyn Authorizer>,
        ip_gate: Arc<dyn IpGate>,
    ) -> Self {
        Self {
            config,
            engine,
            authorizer,
            ip_gate,
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Number of requests handled.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Number of requests answered with an error.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Handler for decoded requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Returns the shared context.
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.context
    }

    /// Decodes and handles one frame payload.
    ///
    /// Never fails: every error becomes an error envelope.
    pub fn handle_frame(&self, payload: &[u8]) -> Response {
        self.context.requests.fetch_add(1, Ordering::Relaxed);
        match Request::decode(payload).and_then(|request| self.handle(&request)) {
            Ok(message) => Response::success(message),
            Err(e) => {
                self.context.failures.fetch_add(1, Ordering::Relaxed);
                match &e {
                    ServerError::Core(core) if !core.is_not_found() => {
                        warn!(error = %e, "request failed");
                    }
                    _ => debug!(error = %e, "request rejected"),
                }
                Response::error(e.client_message())
            }
        }
    }

    /// Authenticates, authorizes and executes a request.
    ///
    /// Returns the success message.
    pub fn handle(&self, request: &Request) -> ServerResult<String> {
        let credential = request.user.as_deref().ok_or_else(ServerError::unknown_user)?;
        if !self.context.authorizer.authenticate(credential) {
            return Err(ServerError::unknown_user());
        }

        let action = Action::parse(&request.action).ok_or_else(|| {
            ServerError::InvalidRequest(format!("Unknown action: {}", request.action))
        })?;
        let permission = if action.is_write() {
            Permission::Write
        } else {
            Permission::Read
        };
        if !self.context.authorizer.authorize(credential, permission) {
            return Err(ServerError::missing_permission(permission));
        }

        let collection = self.collection(request)?;
        debug!(
            %action,
            database = request.database.as_deref().unwrap_or_default(),
            collection = collection.name(),
            "handling request"
        );

        match action {
            Action::Connect => Ok(CONNECTED.into()),
            Action::InsertOrUpdate => {
                let object = request.object()?;
                let id = object.id.as_deref().map(ObjectId::parse).transpose()?;
                let data = object.data_text()?;
                let frame = collection.insert_or_update(id, &data)?;
                Ok(STANDARD.encode(frame))
            }
            Action::Find => {
                let object = request.object()?;
                let field = object
                    .field
                    .as_deref()
                    .ok_or_else(|| ServerError::InvalidRequest("missing 'where'".into()))?;
                let value = object
                    .value
                    .as_ref()
                    .ok_or_else(|| ServerError::InvalidRequest("missing 'value'".into()))?;
                let frames = collection.find(field, value)?;
                Ok(format_blob_list(frames.iter().map(|f| STANDARD.encode(f))))
            }
            Action::FindAll => {
                let frames = collection.find_all()?;
                Ok(format_blob_list(frames.iter().map(|f| STANDARD.encode(f))))
            }
            Action::FindById => {
                let id = Self::object_id(request)?;
                collection
                    .find_by_id(&id)?
                    .map(|frame| STANDARD.encode(frame))
                    .ok_or(ServerError::NotFound)
            }
            Action::Delete => {
                let id = Self::object_id(request)?;
                if collection.delete(&id)? {
                    Ok(STANDARD.encode(DELETED))
                } else {
                    Err(ServerError::NotFound)
                }
            }
            Action::Close => {
                collection.close()?;
                Ok(CLOSED.into())
            }
        }
    }

    fn collection(&self, request: &Request) -> ServerResult<Arc<Collection>> {
        let database = request
            .database
            .as_deref()
            .ok_or_else(|| ServerError::InvalidRequest("missing 'database'".into()))?;
        let collection = request
            .collection
            .as_deref()
            .ok_or_else(|| ServerError::InvalidRequest("missing 'collection'".into()))?;
        Ok(self.context.engine.collection(database, collection)?)
    }

    fn object_id(request: &Request) -> ServerResult<ObjectId> {
        let raw = request
            .object()?
            .id
            .as_deref()
            .ok_or_else(|| ServerError::InvalidRequest("missing 'id'".into()))?;
        Ok(ObjectId::parse(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{IpAllowList, UserPermission, UserRegistry};
    use crate::protocol::Status;
    use rozsdb_codec::Document;
    use rozsdb_core::{Config, Services};
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        handler: RequestHandler,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let services = Arc::new(Services::manual(Config::default()));
        let engine = Arc::new(Engine::open_with_services(dir.path(), services).unwrap());
        engine.create_database("app").unwrap();

        let users = UserRegistry::new()
            .with_user("root", "pw", &[UserPermission::Admin])
            .with_user("reader", "pw", &[UserPermission::Read])
            .with_user("writer", "pw", &[UserPermission::Write]);
        let context = HandlerContext::new(
            ServerConfig::default(),
            engine,
            Arc::new(users),
            Arc::new(IpAllowList::allow_all()),
        );
        Fixture {
            _dir: dir,
            handler: RequestHandler::new(Arc::new(context)),
        }
    }

    fn send(handler: &RequestHandler, request: serde_json::Value) -> Response {
        handler.handle_frame(request.to_string().as_bytes())
    }

    fn request(user: &str, action: &str, object: serde_json::Value) -> serde_json::Value {
        json!({
            "user": user,
            "action": action,
            "database": "app",
            "collection": "users",
            "object": object,
        })
    }

    fn decode_doc(encoded: &str) -> Document {
        Document::from_frame(&STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn connect_and_crud() {
        let f = fixture();
        let h = &f.handler;

        let connected = send(h, request("root=pw", "connection", json!({})));
        assert_eq!(connected, Response::success(CONNECTED));

        let inserted = send(
            h,
            request("root=pw", "insertorupdate", json!({"data": r#"{"name":"a"}"#})),
        );
        assert!(inserted.is_success());
        let doc = decode_doc(&inserted.message);
        let id = doc.id().unwrap().to_owned();

        let found = send(h, request("root=pw", "findbyid", json!({"id": id})));
        assert_eq!(decode_doc(&found.message).get("name"), Some(&json!("a")));

        let by_field = send(h, request("root=pw", "find", json!({"where": "name", "value": "a"})));
        assert!(by_field.message.starts_with('[') && by_field.message.ends_with(']'));
        assert!(!by_field.message.contains(", "));

        let deleted = send(h, request("root=pw", "delete", json!({"id": id})));
        assert_eq!(deleted, Response::success(STANDARD.encode(DELETED)));

        let again = send(h, request("root=pw", "delete", json!({"id": id})));
        assert_eq!(again, Response::error("Not found"));

        let missing = send(h, request("root=pw", "findbyid", json!({"id": id})));
        assert_eq!(missing, Response::error("Not found"));

        let all = send(h, request("root=pw", "findall", json!({})));
        assert_eq!(all, Response::success("[]"));

        let closed = send(h, request("root=pw", "close", json!({})));
        assert_eq!(closed, Response::success(CLOSED));
    }

    #[test]
    fn update_keeps_id() {
        let f = fixture();
        let h = &f.handler;
        let object = json!({"id": "fixed", "data": {"v": 1}});
        send(h, request("root=pw", "insertorupdate", object));
        let object = json!({"id": "fixed", "data": {"v": 2}});
        send(h, request("root=pw", "insertorupdate", object));

        let all = send(h, request("root=pw", "findall", json!({})));
        let inner = all.message.trim_start_matches('[').trim_end_matches(']');
        let docs: Vec<Document> = inner.split(", ").map(decode_doc).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("v"), Some(&json!(2)));
    }

    #[test]
    fn unauthenticated_requests() {
        let f = fixture();
        let h = &f.handler;

        let wrong = send(h, request("root=nope", "findall", json!({})));
        assert_eq!(wrong, Response::error("Unauthorized: User is not authorized"));

        let anonymous = send(h, json!({"action": "findall", "database": "app", "collection": "c"}));
        assert_eq!(anonymous.status, Status::Error);
        assert_eq!(h.context().failures(), 2);
    }

    #[test]
    fn permissions_are_separate() {
        let f = fixture();
        let h = &f.handler;

        let write = send(h, request("reader=pw", "insertorupdate", json!({"data": "{}"})));
        assert_eq!(write, Response::error("Unauthorized: missing permission 'write'"));

        let read = send(h, request("writer=pw", "findall", json!({})));
        assert_eq!(read, Response::error("Unauthorized: missing permission 'read'"));

        let ok = send(h, request("writer=pw", "insertorupdate", json!({"data": "{}"})));
        assert!(ok.is_success());
    }

    #[test]
    fn request_errors() {
        let f = fixture();
        let h = &f.handler;

        assert_eq!(
            h.handle_frame(b"not json").status,
            Status::Error
        );

        let unknown = send(h, request("root=pw", "drop", json!({})));
        assert_eq!(unknown, Response::error("Unknown action: drop"));

        let mut no_db = request("root=pw", "findall", json!({}));
        no_db["database"] = json!("missing");
        assert_eq!(send(h, no_db), Response::error("Database not found"));

        let bad_data = send(h, request("root=pw", "insertorupdate", json!({"data": "[1]"})));
        assert_eq!(bad_data.status, Status::Error);

        let no_where = send(h, request("root=pw", "find", json!({"value": 1})));
        assert_eq!(no_where, Response::error("missing 'where'"));

        let mut bad_name = request("root=pw", "findall", json!({}));
        bad_name["collection"] = json!("..");
        assert_eq!(send(h, bad_name).status, Status::Error);
    }
}
