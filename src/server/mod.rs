//! Chatbot backend: the endpoints the form bridge talks to, plus the
//! ordering surface (menu, recommendations, orders, bills).

pub mod routes;
pub mod session;

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::store::{SharedStore, Store};
use session::Sessions;

#[derive(Clone)]
pub struct AppState {
    store: SharedStore,
    sessions: Arc<Mutex<Sessions>>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store: store.into_shared(),
            sessions: Arc::new(Mutex::new(Sessions::default())),
        }
    }

    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().expect("store mutex poisoned")
    }

    pub fn sessions(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().expect("sessions mutex poisoned")
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(routes::register))
        .route("/login", post(routes::login))
        .route("/logout", get(routes::logout).post(routes::logout))
        .route("/chat", post(routes::chat))
        .route("/menu", get(routes::menu))
        .route("/recommend", post(routes::recommend))
        .route("/order", post(routes::order))
        .route("/order_history", get(routes::order_history))
        .route("/latest_bill", get(routes::latest_bill))
        .with_state(state)
}

pub async fn serve(addr: &str, store: Store) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(AppState::new(store))).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpTransport;
    use crate::bridge::{ids, FormBridge, Page, SubmitEvent, Transport};
    use crate::bridge::testing::FakePage;
    use crate::store::sample_menu;
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn spawn_server() -> String {
        let mut store = Store::open_in_memory().unwrap();
        store.seed_menu(&sample_menu()).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(AppState::new(store))).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn body(reply: &crate::bridge::Reply) -> Value {
        serde_json::from_str(&reply.body).unwrap()
    }

    async fn logged_in(base: &str, username: &str) -> HttpTransport {
        let transport = HttpTransport::new(base).unwrap();
        let credentials = json!({ "username": username, "password": "pw" });
        transport.post_json("/register", credentials.clone()).await.unwrap();
        let reply = transport.post_json("/login", credentials).await.unwrap();
        assert_eq!(reply.status, 200);
        transport
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_blanks() {
        let base = spawn_server().await;
        let transport = HttpTransport::new(&base).unwrap();

        let reply = transport
            .post_json("/register", json!({ "username": "ana", "password": "pw" }))
            .await
            .unwrap();
        assert_eq!(reply.status, 201);
        assert_eq!(body(&reply)["message"], "Registration successful!");

        let reply = transport
            .post_json("/register", json!({ "username": "ana", "password": "pw2" }))
            .await
            .unwrap();
        assert_eq!(reply.status, 400);
        assert_eq!(body(&reply)["message"], "Username already exists!");

        let reply = transport
            .post_json("/register", json!({ "username": "", "password": "pw" }))
            .await
            .unwrap();
        assert_eq!(reply.status, 400);
        assert_eq!(body(&reply)["message"], "Username and password are required!");
    }

    #[tokio::test]
    async fn test_bridge_against_live_server() {
        let base = spawn_server().await;
        let transport = Arc::new(HttpTransport::new(&base).unwrap());
        let bridge = FormBridge::new(transport.clone());
        let mut page = FakePage::new()
            .with_value(ids::REGISTER_USERNAME, "ana")
            .with_value(ids::REGISTER_PASSWORD, "secret")
            .with_value(ids::LOGIN_USERNAME, "ana")
            .with_value(ids::LOGIN_PASSWORD, "wrong");

        bridge
            .submit_registration(&mut page, &mut SubmitEvent::new())
            .await
            .apply(&mut page);
        assert_eq!(page.alerts, vec!["Registration successful!"]);

        bridge
            .submit_login(&mut page, &mut SubmitEvent::new())
            .await
            .apply(&mut page);
        assert_eq!(page.alerts[1], "Error: Invalid username or password.");
        assert!(page.is_visible(ids::LOGIN));

        page.set_value(ids::LOGIN_PASSWORD, "secret");
        bridge
            .submit_login(&mut page, &mut SubmitEvent::new())
            .await
            .apply(&mut page);
        assert_eq!(page.alerts[2], "Login successful!");
        assert!(page.is_visible(ids::CHAT_CONTAINER));

        page.set_value(ids::USER_INPUT, "order plain naan");
        bridge.send_chat_message(&mut page).unwrap().await.apply(&mut page);
        assert_eq!(
            page.transcript(),
            vec![
                "You: order plain naan",
                "Bot: You have ordered: plain naan. Total cost: $2.60",
            ]
        );

        // The session cookie from /login rides along on later requests.
        let reply = transport
            .post_json("/order", json!({ "items": ["Plain Naan"], "quantities": [2] }))
            .await
            .unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(body(&reply)["total_cost"], 5.2);

        let reply = transport.get("/order_history").await.unwrap();
        assert_eq!(body(&reply)["order_history"][0]["item"], "Plain Naan");

        let reply = transport.get("/latest_bill").await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(body(&reply)["total_cost"], 5.2);
    }

    #[tokio::test]
    async fn test_protected_routes_need_a_session() {
        let base = spawn_server().await;
        let transport = HttpTransport::new(&base).unwrap();

        let reply = transport
            .post_json("/order", json!({ "items": ["Plain Naan"], "quantities": [1] }))
            .await
            .unwrap();
        assert_eq!(reply.status, 401);
        assert_eq!(body(&reply)["message"], "Unauthorized");

        let reply = transport.get("/latest_bill").await.unwrap();
        assert_eq!(reply.status, 401);

        let reply = transport.get("/menu").await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(body(&reply)["unique_items"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let base = spawn_server().await;
        let transport = HttpTransport::new(&base).unwrap();
        let credentials = json!({ "username": "bo", "password": "pw" });

        transport.post_json("/register", credentials.clone()).await.unwrap();
        let reply = transport.post_json("/login", credentials).await.unwrap();
        assert_eq!(reply.status, 200);

        let reply = transport.get("/latest_bill").await.unwrap();
        assert_eq!(reply.status, 404);
        assert_eq!(body(&reply)["message"], "No bills found.");

        transport.get("/logout").await.unwrap();
        let reply = transport.get("/latest_bill").await.unwrap();
        assert_eq!(reply.status, 401);
    }

    #[tokio::test]
    async fn test_recommend_needs_selected_item() {
        let base = spawn_server().await;
        let transport = logged_in(&base, "cy").await;

        let reply = transport.post_json("/recommend", json!({})).await.unwrap();
        assert_eq!(reply.status, 400);
        assert_eq!(body(&reply)["message"], "Selected item is required");

        let reply = transport
            .post_json("/recommend", json!({ "selected_item": "Plain Naan" }))
            .await
            .unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(
            body(&reply)["recommendations"],
            json!(["Pilau Rice", "Plain Naan", "Chicken Tikka Masala", "Mango Chutney"])
        );
    }

    #[tokio::test]
    async fn test_chat_without_message_is_bad_request() {
        let base = spawn_server().await;
        let transport = HttpTransport::new(&base).unwrap();

        let reply = transport.post_json("/chat", json!({})).await.unwrap();
        assert_eq!(reply.status, 400);
        assert_eq!(body(&reply)["message"], "Message is required");
    }

    #[tokio::test]
    async fn test_order_needs_items_and_quantities() {
        let base = spawn_server().await;
        let transport = logged_in(&base, "di").await;

        let reply = transport
            .post_json("/order", json!({ "items": [], "quantities": [] }))
            .await
            .unwrap();
        assert_eq!(reply.status, 400);
        assert_eq!(body(&reply)["message"], "Items and quantities are required");

        let reply = transport
            .post_json("/order", json!({ "items": ["Pilau Rice"] }))
            .await
            .unwrap();
        assert_eq!(reply.status, 400);

        let reply = transport.get("/order_history").await.unwrap();
        assert_eq!(body(&reply)["order_history"], json!([]));
    }

    #[tokio::test]
    async fn test_second_login_ends_first_session() {
        let base = spawn_server().await;
        let first = logged_in(&base, "ed").await;

        let second = HttpTransport::new(&base).unwrap();
        let reply = second
            .post_json("/login", json!({ "username": "ed", "password": "pw" }))
            .await
            .unwrap();
        assert_eq!(reply.status, 200);

        assert_eq!(second.get("/latest_bill").await.unwrap().status, 404);
        assert_eq!(first.get("/latest_bill").await.unwrap().status, 401);
    }
}
