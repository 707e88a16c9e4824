//! End-to-end tests over real sockets.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rozsdb_codec::Document;
use rozsdb_core::{Config, Engine, Services};
use rozsdb_server::protocol::{encode_frame, read_frame, write_frame};
use rozsdb_server::{
    IpAllowList, IpGate, Response, RozsServer, ServerConfig, UserPermission, UserRegistry,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    server: Arc<RozsServer>,
    stop: Option<oneshot::Sender<()>>,
    _dir: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn start(config: ServerConfig, ip_gate: Arc<dyn IpGate>) -> TestServer {
    let dir = TempDir::new().unwrap();
    let services = Arc::new(Services::manual(Config::default()));
    let engine = Arc::new(Engine::open_with_services(dir.path(), services).unwrap());
    engine.create_database("app").unwrap();

    let users = UserRegistry::new()
        .with_user("root", "secret", &[UserPermission::Admin])
        .with_user("guest", "guest", &[UserPermission::Read]);
    let server = Arc::new(RozsServer::new(config, engine, Arc::new(users), ip_gate));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(Arc::clone(&server).serve(listener, async {
        let _ = stopped.await;
    }));

    TestServer {
        addr,
        server,
        stop: Some(stop),
        _dir: dir,
    }
}

async fn start_default() -> TestServer {
    start(ServerConfig::default(), Arc::new(IpAllowList::new(["127.0.0.1"]))).await
}

async fn call(stream: &mut TcpStream, request: Value) -> Response {
    write_frame(stream, &encode_frame(request.to_string().as_bytes()).unwrap())
        .await
        .unwrap();
    receive(stream).await.unwrap()
}

async fn receive(stream: &mut TcpStream) -> Option<Response> {
    read_frame(stream, 1 << 20)
        .await
        .unwrap()
        .map(|payload| serde_json::from_slice(&payload).unwrap())
}

fn request(user: &str, action: &str, object: Value) -> Value {
    json!({
        "user": user,
        "action": action,
        "database": "app",
        "collection": "people",
        "object": object,
    })
}

fn decode_list(message: &str) -> Vec<Document> {
    let inner = message.trim_start_matches('[').trim_end_matches(']');
    if inner.is_empty() {
        return Vec::new();
    }
    inner
        .split(", ")
        .map(|b64| Document::from_frame(&STANDARD.decode(b64).unwrap()).unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn crud_over_one_connection() {
    let server = start_default().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let connected = call(&mut stream, request("root=secret", "connection", json!({}))).await;
    assert_eq!(connected, Response::success("CONNECTED"));

    for name in ["ana", "bo", "ana"] {
        let object = json!({"data": json!({"name": name}).to_string()});
        let reply = call(&mut stream, request("root=secret", "insertorupdate", object)).await;
        assert!(reply.is_success(), "{reply:?}");
    }

    let found = call(
        &mut stream,
        request("root=secret", "find", json!({"where": "name", "value": "ana"})),
    )
    .await;
    let docs = decode_list(&found.message);
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d.get("name") == Some(&json!("ana"))));

    let all = call(&mut stream, request("root=secret", "findall", json!({}))).await;
    assert_eq!(decode_list(&all.message).len(), 3);

    let id = docs[0].id().unwrap().to_owned();
    let deleted = call(&mut stream, request("root=secret", "delete", json!({"id": id}))).await;
    assert_eq!(deleted, Response::success(STANDARD.encode("DELETED")));

    let gone = call(&mut stream, request("root=secret", "findbyid", json!({"id": id}))).await;
    assert_eq!(gone, Response::error("Not found"));

    let closed = call(&mut stream, request("root=secret", "close", json!({}))).await;
    assert_eq!(closed, Response::success("CLOSED"));

    let after_close = call(&mut stream, request("root=secret", "findall", json!({}))).await;
    assert_eq!(decode_list(&after_close.message).len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthorized_keeps_connection_open() {
    let server = start_default().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let denied = call(&mut stream, request("root=wrong", "findall", json!({}))).await;
    assert_eq!(denied, Response::error("Unauthorized: User is not authorized"));

    let read_only = call(
        &mut stream,
        request("guest=guest", "insertorupdate", json!({"data": "{}"})),
    )
    .await;
    assert_eq!(
        read_only,
        Response::error("Unauthorized: missing permission 'write'")
    );

    let allowed = call(&mut stream, request("guest=guest", "findall", json!({}))).await;
    assert_eq!(allowed, Response::success("[]"));
}

#[tokio::test(flavor = "multi_thread")]
async fn disallowed_address_is_rejected() {
    let server = start(
        ServerConfig::default(),
        Arc::new(IpAllowList::new(["10.1.2.3"])),
    )
    .await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let rejection = receive(&mut stream).await.unwrap();
    assert_eq!(
        rejection,
        Response::error("Security Error: This ip is not allowed in this database.")
    );
    assert!(receive(&mut stream).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn full_server_rejects_extra_clients() {
    let config = ServerConfig::default().with_max_clients(1);
    let server = start(config, Arc::new(IpAllowList::allow_all())).await;

    let mut first = TcpStream::connect(server.addr).await.unwrap();
    let ok = call(&mut first, request("root=secret", "connection", json!({}))).await;
    assert!(ok.is_success());
    assert_eq!(server.server.active_clients(), 1);

    let mut second = TcpStream::connect(server.addr).await.unwrap();
    let rejection = receive(&mut second).await.unwrap();
    assert_eq!(rejection, Response::error("Server is full"));
    assert!(receive(&mut second).await.is_none());

    let still_served = call(&mut first, request("root=secret", "findall", json!({}))).await;
    assert!(still_served.is_success());
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_frame_closes_connection() {
    let config = ServerConfig::default().with_max_frame_len(16);
    let server = start(config, Arc::new(IpAllowList::allow_all())).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    // Header only: the server must reject before waiting for the payload.
    write_frame(&mut stream, &1000u32.to_be_bytes()).await.unwrap();

    let reply = receive(&mut stream).await.unwrap();
    assert!(!reply.is_success());
    assert!(reply.message.contains("exceeds limit"));
    assert!(receive(&mut stream).await.is_none());
}
