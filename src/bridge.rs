//! Form bridge between the page and the chatbot backend.
//!
//! Each user action runs in two phases. The synchronous phase reads the form
//! fields and applies the immediate page effects, then hands back a `Pending`
//! future that performs the request. When that future resolves, its
//! [`Outcome`] is applied to the page. The page never crosses an await, so
//! whoever drives the UI stays its only writer.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::BridgeError;

/// Element IDs shared by the HTML page and the terminal page.
pub mod ids {
    pub const USER_INPUT: &str = "userInput";
    pub const CHAT: &str = "chat";
    pub const REGISTER_USERNAME: &str = "registerUsername";
    pub const REGISTER_PASSWORD: &str = "registerPassword";
    pub const REGISTER_FORM: &str = "registerForm";
    pub const LOGIN_USERNAME: &str = "loginUsername";
    pub const LOGIN_PASSWORD: &str = "loginPassword";
    pub const LOGIN_FORM: &str = "loginForm";
    pub const CHAT_CONTAINER: &str = "chat-container";
    pub const REGISTRATION: &str = "registration";
    pub const LOGIN: &str = "login";

    /// Input fields owned by a form, in tab order.
    pub fn form_fields(form_id: &str) -> &'static [&'static str] {
        match form_id {
            REGISTER_FORM => &[REGISTER_USERNAME, REGISTER_PASSWORD],
            LOGIN_FORM => &[LOGIN_USERNAME, LOGIN_PASSWORD],
            _ => &[],
        }
    }
}

pub const CHAT_PATH: &str = "/chat";
pub const REGISTER_PATH: &str = "/register";
pub const LOGIN_PATH: &str = "/login";

/// The document: element lookup and the handful of mutations the bridge needs.
pub trait Page {
    /// Current value of an input element. Unknown IDs read as empty.
    fn value(&self, id: &str) -> String;
    fn set_value(&mut self, id: &str, value: &str);
    /// Append one line of text to a transcript element.
    fn append_line(&mut self, id: &str, line: &str);
    /// Clear every field of a form.
    fn reset_form(&mut self, form_id: &str);
    fn set_visible(&mut self, id: &str, visible: bool);
    /// Blocking alert. The page decides how to block.
    fn alert(&mut self, message: &str);
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    /// Any 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BridgeError> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turn a non-OK reply into the error carried by its `{message}` body.
    pub fn into_error(self) -> BridgeError {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
        }

        match serde_json::from_str::<ErrorBody>(&self.body) {
            Ok(ErrorBody { message: Some(message) }) => BridgeError::Rejected {
                status: self.status,
                message,
            },
            Ok(_) => BridgeError::Status(self.status),
            Err(e) => BridgeError::Decode(e),
        }
    }
}

/// JSON-over-HTTP POST. Only connection-level failures are errors; any HTTP
/// status comes back as a [`Reply`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, path: &str, body: Value) -> Result<Reply, BridgeError>;
}

/// A form submission. The terminal page clears a form whose submission was
/// not prevented, the way a browser navigates away from it.
#[derive(Debug, Default)]
pub struct SubmitEvent {
    default_prevented: bool,
}

impl SubmitEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

#[derive(Debug, Serialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ChatReply {
    reply: String,
}

#[derive(Deserialize)]
struct MessageReply {
    message: String,
}

/// Result of one request, waiting to be applied to the page.
#[derive(Debug)]
pub enum Outcome {
    Chat(Result<String, BridgeError>),
    Registration(Result<String, BridgeError>),
    Login(Result<(), BridgeError>),
}

impl Outcome {
    pub fn apply(self, page: &mut dyn Page) {
        match self {
            Outcome::Chat(Ok(reply)) => {
                page.append_line(ids::CHAT, &format!("Bot: {}", reply));
            }
            Outcome::Chat(Err(err)) => {
                tracing::error!("chat request failed: {}", err);
            }
            Outcome::Registration(Ok(message)) => {
                page.alert(&message);
                page.reset_form(ids::REGISTER_FORM);
            }
            Outcome::Login(Ok(())) => {
                page.alert("Login successful!");
                page.reset_form(ids::LOGIN_FORM);
                page.set_visible(ids::CHAT_CONTAINER, true);
                page.set_visible(ids::REGISTRATION, false);
                page.set_visible(ids::LOGIN, false);
            }
            Outcome::Registration(Err(err)) | Outcome::Login(Err(err)) => {
                tracing::warn!("form submission failed: {}", err);
                page.alert(&format!("Error: {}", err));
            }
        }
    }
}

/// A request in flight. Owns everything it needs, so it can be spawned.
pub type Pending = BoxFuture<'static, Outcome>;

#[derive(Clone)]
pub struct FormBridge {
    transport: Arc<dyn Transport>,
}

impl FormBridge {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Echo the chat input into the transcript and send it.
    ///
    /// Returns `None` without touching the page when the input is blank.
    pub fn send_chat_message(&self, page: &mut dyn Page) -> Option<Pending> {
        let text = page.value(ids::USER_INPUT);
        if text.trim().is_empty() {
            return None;
        }

        page.append_line(ids::CHAT, &format!("You: {}", text));
        let pending = chat(Arc::clone(&self.transport), text)
            .map(Outcome::Chat)
            .boxed();
        page.set_value(ids::USER_INPUT, "");

        Some(pending)
    }

    pub fn submit_registration(&self, page: &mut dyn Page, event: &mut SubmitEvent) -> Pending {
        event.prevent_default();
        let credentials = Credentials {
            username: page.value(ids::REGISTER_USERNAME),
            password: page.value(ids::REGISTER_PASSWORD),
        };

        register(Arc::clone(&self.transport), credentials)
            .map(Outcome::Registration)
            .boxed()
    }

    pub fn submit_login(&self, page: &mut dyn Page, event: &mut SubmitEvent) -> Pending {
        event.prevent_default();
        let credentials = Credentials {
            username: page.value(ids::LOGIN_USERNAME),
            password: page.value(ids::LOGIN_PASSWORD),
        };

        login(Arc::clone(&self.transport), credentials)
            .map(Outcome::Login)
            .boxed()
    }
}

async fn chat(transport: Arc<dyn Transport>, message: String) -> Result<String, BridgeError> {
    let reply = transport
        .post_json(CHAT_PATH, json!({ "message": message }))
        .await?;

    if !reply.is_ok() {
        return Err(BridgeError::Status(reply.status));
    }

    Ok(reply.json::<ChatReply>()?.reply)
}

async fn register(
    transport: Arc<dyn Transport>,
    credentials: Credentials,
) -> Result<String, BridgeError> {
    let reply = transport
        .post_json(REGISTER_PATH, serde_json::to_value(&credentials)?)
        .await?;

    if !reply.is_ok() {
        return Err(reply.into_error());
    }

    Ok(reply.json::<MessageReply>()?.message)
}

async fn login(transport: Arc<dyn Transport>, credentials: Credentials) -> Result<(), BridgeError> {
    let reply = transport
        .post_json(LOGIN_PATH, serde_json::to_value(&credentials)?)
        .await?;

    if !reply.is_ok() {
        return Err(reply.into_error());
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::{FakePage, FakeTransport};
    use super::*;

    fn bridge(transport: &Arc<FakeTransport>) -> FormBridge {
        FormBridge::new(transport.clone())
    }

    #[tokio::test]
    async fn test_blank_chat_is_a_no_op() {
        let transport = FakeTransport::replying(200, json!({ "reply": "hi" }));
        let mut page = FakePage::new().with_value(ids::USER_INPUT, "   \t ");

        assert!(bridge(&transport).send_chat_message(&mut page).is_none());
        assert!(page.transcript().is_empty());
        assert_eq!(page.value(ids::USER_INPUT), "   \t ");
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_echoes_before_reply_and_clears_input() {
        let transport = FakeTransport::replying(200, json!({ "reply": "hi" }));
        let mut page = FakePage::new().with_value(ids::USER_INPUT, "hello");

        let pending = bridge(&transport).send_chat_message(&mut page).unwrap();
        assert_eq!(page.transcript(), vec!["You: hello"]);
        assert_eq!(page.value(ids::USER_INPUT), "");

        pending.await.apply(&mut page);
        assert_eq!(page.transcript(), vec!["You: hello", "Bot: hi"]);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].0, CHAT_PATH);
        assert_eq!(requests[0].1, json!({ "message": "hello" }));
    }

    #[tokio::test]
    async fn test_chat_failure_leaves_only_user_line() {
        let transport = FakeTransport::replying(500, json!({ "message": "boom" }));
        let mut page = FakePage::new().with_value(ids::USER_INPUT, "menu");

        let pending = bridge(&transport).send_chat_message(&mut page).unwrap();
        let outcome = pending.await;
        assert!(matches!(outcome, Outcome::Chat(Err(BridgeError::Status(500)))));
        outcome.apply(&mut page);

        assert_eq!(page.transcript(), vec!["You: menu"]);
        assert!(page.alerts.is_empty());
        assert_eq!(page.value(ids::USER_INPUT), "");
    }

    #[tokio::test]
    async fn test_chat_network_failure_is_silent() {
        let transport = FakeTransport::failing("connection refused");
        let mut page = FakePage::new().with_value(ids::USER_INPUT, "bill");

        let pending = bridge(&transport).send_chat_message(&mut page).unwrap();
        pending.await.apply(&mut page);

        assert_eq!(page.transcript(), vec!["You: bill"]);
        assert!(page.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_registration_success_alerts_and_resets() {
        let transport =
            FakeTransport::replying(201, json!({ "message": "Registration successful!" }));
        let mut page = FakePage::new()
            .with_value(ids::REGISTER_USERNAME, "ana")
            .with_value(ids::REGISTER_PASSWORD, "pw");
        let mut event = SubmitEvent::new();

        let pending = bridge(&transport).submit_registration(&mut page, &mut event);
        assert!(event.default_prevented());
        pending.await.apply(&mut page);

        assert_eq!(page.alerts, vec!["Registration successful!"]);
        assert_eq!(page.resets, vec![ids::REGISTER_FORM]);
        assert_eq!(page.value(ids::REGISTER_USERNAME), "");

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].0, REGISTER_PATH);
        assert_eq!(requests[0].1, json!({ "username": "ana", "password": "pw" }));
    }

    #[tokio::test]
    async fn test_registration_rejection_keeps_form() {
        let transport = FakeTransport::replying(400, json!({ "message": "user exists" }));
        let mut page = FakePage::new()
            .with_value(ids::REGISTER_USERNAME, "ana")
            .with_value(ids::REGISTER_PASSWORD, "pw");

        bridge(&transport)
            .submit_registration(&mut page, &mut SubmitEvent::new())
            .await
            .apply(&mut page);

        assert_eq!(page.alerts.len(), 1);
        assert!(page.alerts[0].contains("user exists"));
        assert!(page.resets.is_empty());
        assert_eq!(page.value(ids::REGISTER_USERNAME), "ana");
    }

    #[tokio::test]
    async fn test_registration_network_failure_alerts_with_prefix() {
        let transport = FakeTransport::failing("connection refused");
        let mut page = FakePage::new();

        bridge(&transport)
            .submit_registration(&mut page, &mut SubmitEvent::new())
            .await
            .apply(&mut page);

        assert_eq!(page.alerts, vec!["Error: connection refused"]);
    }

    #[tokio::test]
    async fn test_login_success_switches_panels() {
        let transport = FakeTransport::replying(200, json!({ "message": "Login successful!" }));
        let mut page = FakePage::new()
            .with_value(ids::LOGIN_USERNAME, "ana")
            .with_value(ids::LOGIN_PASSWORD, "pw");

        bridge(&transport)
            .submit_login(&mut page, &mut SubmitEvent::new())
            .await
            .apply(&mut page);

        assert_eq!(page.alerts, vec!["Login successful!"]);
        assert_eq!(page.resets, vec![ids::LOGIN_FORM]);
        assert!(page.is_visible(ids::CHAT_CONTAINER));
        assert!(!page.is_visible(ids::REGISTRATION));
        assert!(!page.is_visible(ids::LOGIN));
    }

    #[tokio::test]
    async fn test_login_failure_leaves_panels_alone() {
        let transport =
            FakeTransport::replying(401, json!({ "message": "Invalid username or password." }));
        let mut page = FakePage::new()
            .with_value(ids::LOGIN_USERNAME, "ana")
            .with_value(ids::LOGIN_PASSWORD, "nope");

        bridge(&transport)
            .submit_login(&mut page, &mut SubmitEvent::new())
            .await
            .apply(&mut page);

        assert_eq!(page.alerts, vec!["Error: Invalid username or password."]);
        assert!(page.resets.is_empty());
        assert!(!page.is_visible(ids::CHAT_CONTAINER));
        assert!(page.is_visible(ids::REGISTRATION));
        assert!(page.is_visible(ids::LOGIN));
    }

    #[test]
    fn test_error_body_without_message_falls_back_to_status() {
        let reply = Reply {
            status: 503,
            body: "{}".to_string(),
        };
        assert!(matches!(reply.into_error(), BridgeError::Status(503)));

        let reply = Reply {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert!(matches!(reply.into_error(), BridgeError::Decode(_)));
    }
}
