use actix_web::http::StatusCode;
use awc::error::WsClientError;
use awc::Client;

use super::support::{start_chat_server, token_for, MemoryStore};

fn rejected_status(result: Result<impl Sized, WsClientError>) -> StatusCode {
    match result {
        Err(WsClientError::InvalidResponseStatus(status)) => status,
        Err(other) => panic!("unexpected handshake error: {other}"),
        Ok(_) => panic!("handshake unexpectedly accepted"),
    }
}

#[actix_rt::test]
async fn upgrade_is_refused_before_registration() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let server = start_chat_server(store).await.expect("start chat server");
    let client = Client::new();

    let missing = client.ws(server.ws_url(42)).connect().await;
    assert_eq!(rejected_status(missing), StatusCode::UNAUTHORIZED);

    let garbage = client
        .ws(server.ws_url(42))
        .bearer_auth("not-a-jwt")
        .connect()
        .await;
    assert_eq!(rejected_status(garbage), StatusCode::UNAUTHORIZED);

    let outsider = client
        .ws(server.ws_url(42))
        .bearer_auth(token_for(3))
        .connect()
        .await;
    assert_eq!(rejected_status(outsider), StatusCode::FORBIDDEN);

    let unknown = client
        .ws(server.ws_url(7))
        .bearer_auth(token_for(1))
        .connect()
        .await;
    assert_eq!(rejected_status(unknown), StatusCode::NOT_FOUND);

    server.wait_for_sessions(0).await;
    server.handle.stop(true).await;
}

#[actix_rt::test]
async fn query_token_is_accepted() {
    let store = MemoryStore::new();
    store.seed_conversation(42, 1, 2);
    let server = start_chat_server(store).await.expect("start chat server");

    let url = format!("{}?token={}", server.ws_url(42), token_for(2));
    let (response, _conn) = Client::new().ws(url).connect().await.expect("upgrade");
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
    server.wait_for_sessions(1).await;

    server.handle.stop(true).await;
}
