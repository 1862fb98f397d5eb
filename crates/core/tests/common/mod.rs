//! Scriptable in-process transport for session tests.
//!
//! Each transport call is recorded and, when an instruction is installed for
//! it, answered by emitting events through an [`Emitter`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use blpapi::protocol::{
	EventType, ResponseRoute, response_route, service_for_security, subscription_events,
};
use blpapi::{
	CorrelationId, Identity, Session, SessionOptions, SubscriptionRecord, Transport,
	TransportError, TransportEvent, TransportParts, TransportResult,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// Awaits `future`, failing the test if it takes longer than [`TIMEOUT`].
pub async fn within<F: Future>(future: F) -> F::Output {
	tokio::time::timeout(TIMEOUT, future)
		.await
		.expect("timed out")
}

/// Polls `condition` until it holds, failing the test after [`TIMEOUT`].
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
	within(async {
		while !condition() {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
}

/// Sends events into the session under test.
#[derive(Clone)]
pub struct Emitter {
	tx: Arc<Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>>,
}

impl Emitter {
	pub fn emit(&self, event: TransportEvent) {
		if let Some(tx) = self.tx.lock().as_ref() {
			let _ = tx.send(event);
		}
	}

	/// Closes the event channel without a termination event.
	pub fn close(&self) {
		self.tx.lock().take();
	}

	pub fn session_started(&self) {
		self.emit(TransportEvent::new("SessionStarted").data(json!("Session Started.")));
	}

	pub fn session_startup_failure(&self) {
		self.emit(
			TransportEvent::new("SessionStartupFailure")
				.data(json!({"reason": {"description": "Session Fail to Start."}})),
		);
	}

	pub fn session_terminated(&self) {
		self.emit(TransportEvent::new("SessionTerminated").data(json!("Session Terminated.")));
	}

	pub fn service_opened(&self, cid: CorrelationId) {
		self.emit(TransportEvent::new("ServiceOpened").correlated(cid));
	}

	pub fn service_open_failure(&self, uri: &str, cid: CorrelationId) {
		self.emit(
			TransportEvent::new("ServiceOpenFailure")
				.correlated(cid)
				.data(json!({"reason": {"description": format!("{uri} Service Fail to Open.")}})),
		);
	}

	pub fn partial_response(&self, response: &str, cid: CorrelationId) {
		self.emit(
			TransportEvent::new(response)
				.correlated(cid)
				.event_type(EventType::PartialResponse)
				.message_type(response)
				.data(json!("TestData")),
		);
	}

	pub fn final_response(&self, response: &str, cid: CorrelationId) {
		self.emit(
			TransportEvent::new(response)
				.correlated(cid)
				.event_type(EventType::Response)
				.message_type(response)
				.data(json!("FinalTestData")),
		);
	}

	pub fn token_success(&self, cid: CorrelationId) {
		self.emit(
			TransportEvent::new("TokenGenerationSuccess")
				.correlated(cid)
				.message_type("TokenGenerationSuccess")
				.data(json!({"token": "abcdefghijklmn"})),
		);
	}

	pub fn token_failure(&self, cid: CorrelationId) {
		self.emit(
			TransportEvent::new("TokenGenerationFailure")
				.correlated(cid)
				.data(json!({"reason": {"description": "Fail to generate token."}})),
		);
	}

	pub fn authorization_success(&self, cid: CorrelationId) {
		self.emit(
			TransportEvent::new("AuthorizationSuccess")
				.correlated(cid)
				.event_type(EventType::Response)
				.message_type("AuthorizationSuccess"),
		);
	}

	pub fn authorization_failure(&self, cid: CorrelationId) {
		self.emit(
			TransportEvent::new("AuthorizationFailure")
				.correlated(cid)
				.data(json!({"reason": {"description": "Fail to authorize."}})),
		);
	}

	pub fn subscription_data(&self, event: &str, cid: CorrelationId) {
		self.emit(TransportEvent::new(event).correlated(cid).data(json!("TestData")));
	}
}

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
	Start,
	Stop,
	Destroy,
	OpenService { uri: String, cid: CorrelationId },
	Request {
		uri: String,
		name: String,
		cid: CorrelationId,
		identity: Option<Identity>,
		label: Option<String>,
	},
	Subscribe {
		records: Vec<SubscriptionRecord>,
		identity: Option<Identity>,
		label: Option<String>,
	},
	Unsubscribe {
		records: Vec<SubscriptionRecord>,
		label: Option<String>,
	},
	GenerateToken { cid: CorrelationId },
	CreateIdentity,
	SendAuthorization { token: String, cid: CorrelationId },
}

type Script = Box<dyn Fn(&Emitter) + Send + Sync>;
type CidScript = Box<dyn Fn(&Emitter, CorrelationId) + Send + Sync>;
type NamedScript = Box<dyn Fn(&Emitter, &str, CorrelationId) + Send + Sync>;
type SubscribeScript = Box<dyn Fn(&Emitter, &[(String, CorrelationId)]) + Send + Sync>;

/// How the mock answers each call. Calls without an instruction only get
/// recorded.
#[derive(Default)]
pub struct Instructions {
	pub on_start: Option<Script>,
	pub on_stop: Option<Script>,
	/// Receives the service URI
	pub on_open_service: Option<NamedScript>,
	/// Receives the name of the event the response arrives on
	pub on_request: Option<NamedScript>,
	pub on_generate_token: Option<CidScript>,
	/// Receives the token
	pub on_send_authorization_request: Option<NamedScript>,
	/// Receives every (event name, correlation id) pair the batch will emit on
	pub on_subscribe: Option<SubscribeScript>,
}

impl Instructions {
	/// Every call succeeds; requests answer with a single final response.
	pub fn happy() -> Self {
		Self {
			on_start: Some(Box::new(Emitter::session_started)),
			on_stop: Some(Box::new(Emitter::session_terminated)),
			on_open_service: Some(Box::new(|emitter: &Emitter, _uri: &str, cid| {
				emitter.service_opened(cid)
			})),
			on_request: Some(Box::new(|emitter: &Emitter, response: &str, cid| {
				emitter.final_response(response, cid)
			})),
			on_generate_token: Some(Box::new(Emitter::token_success)),
			on_send_authorization_request: Some(Box::new(|emitter: &Emitter, _token: &str, cid| {
				emitter.authorization_success(cid)
			})),
			on_subscribe: None,
		}
	}
}

pub struct MockTransport {
	emitter: Emitter,
	instructions: Instructions,
	calls: Mutex<Vec<Call>>,
	failures: Mutex<HashMap<&'static str, TransportError>>,
}

impl MockTransport {
	pub fn emitter(&self) -> &Emitter {
		&self.emitter
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	/// Makes every call to `method` fail with `error` until cleared.
	pub fn fail_on(&self, method: &'static str, error: TransportError) {
		self.failures.lock().insert(method, error);
	}

	pub fn clear_failure(&self, method: &'static str) {
		self.failures.lock().remove(method);
	}

	pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
		self.calls.lock().iter().filter(|call| matches(call)).count()
	}

	pub fn opens(&self) -> Vec<(String, CorrelationId)> {
		self.calls
			.lock()
			.iter()
			.filter_map(|call| match call {
				Call::OpenService { uri, cid } => Some((uri.clone(), *cid)),
				_ => None,
			})
			.collect()
	}

	pub fn requests(&self) -> Vec<CorrelationId> {
		self.calls
			.lock()
			.iter()
			.filter_map(|call| match call {
				Call::Request { cid, .. } => Some(*cid),
				_ => None,
			})
			.collect()
	}

	fn record(&self, method: &'static str, call: Call) -> TransportResult<()> {
		self.calls.lock().push(call);
		match self.failures.lock().get(method) {
			Some(error) => Err(error.clone()),
			None => Ok(()),
		}
	}
}

impl Transport for MockTransport {
	fn start(&self) -> TransportResult<()> {
		self.record("start", Call::Start)?;
		if let Some(script) = &self.instructions.on_start {
			script(&self.emitter);
		}
		Ok(())
	}

	fn stop(&self) -> TransportResult<()> {
		self.record("stop", Call::Stop)?;
		if let Some(script) = &self.instructions.on_stop {
			script(&self.emitter);
		}
		Ok(())
	}

	fn destroy(&self) -> TransportResult<()> {
		self.record("destroy", Call::Destroy)
	}

	fn open_service(&self, uri: &str, cid: CorrelationId) -> TransportResult<()> {
		self.record(
			"open_service",
			Call::OpenService {
				uri: uri.to_string(),
				cid,
			},
		)?;
		if let Some(script) = &self.instructions.on_open_service {
			script(&self.emitter, uri, cid);
		}
		Ok(())
	}

	fn request(
		&self,
		uri: &str,
		request_name: &str,
		_payload: &Value,
		cid: CorrelationId,
		identity: Option<&Identity>,
		label: Option<&str>,
	) -> TransportResult<()> {
		self.record(
			"request",
			Call::Request {
				uri: uri.to_string(),
				name: request_name.to_string(),
				cid,
				identity: identity.cloned(),
				label: label.map(str::to_string),
			},
		)?;
		let response = match response_route(request_name) {
			Some(ResponseRoute::Stream(response)) => response,
			Some(ResponseRoute::Outcome { success, .. }) => success,
			None => panic!("Invalid request name: {request_name}"),
		};
		if let Some(script) = &self.instructions.on_request {
			script(&self.emitter, response, cid);
		}
		Ok(())
	}

	fn subscribe(
		&self,
		subscriptions: &[SubscriptionRecord],
		identity: Option<&Identity>,
		label: Option<&str>,
	) -> TransportResult<()> {
		self.record(
			"subscribe",
			Call::Subscribe {
				records: subscriptions.to_vec(),
				identity: identity.cloned(),
				label: label.map(str::to_string),
			},
		)?;
		let pairs: Vec<(String, CorrelationId)> = subscriptions
			.iter()
			.flat_map(|record| {
				let events = subscription_events(service_for_security(&record.security))
					.expect("Invalid service name.");
				events
					.iter()
					.map(move |event| (event.to_string(), record.correlation))
			})
			.collect();
		if let Some(script) = &self.instructions.on_subscribe {
			script(&self.emitter, &pairs);
		}
		Ok(())
	}

	fn unsubscribe(&self, subscriptions: &[SubscriptionRecord], label: Option<&str>) -> TransportResult<()> {
		self.record(
			"unsubscribe",
			Call::Unsubscribe {
				records: subscriptions.to_vec(),
				label: label.map(str::to_string),
			},
		)
	}

	fn generate_token(&self, cid: CorrelationId) -> TransportResult<()> {
		self.record("generate_token", Call::GenerateToken { cid })?;
		if let Some(script) = &self.instructions.on_generate_token {
			script(&self.emitter, cid);
		}
		Ok(())
	}

	fn create_identity(&self) -> TransportResult<Identity> {
		self.record("create_identity", Call::CreateIdentity)?;
		Ok(Identity::from_handle(json!({"seat": 1})))
	}

	fn send_authorization_request(
		&self,
		token: &str,
		_identity: &Identity,
		cid: CorrelationId,
	) -> TransportResult<()> {
		self.record(
			"send_authorization_request",
			Call::SendAuthorization {
				token: token.to_string(),
				cid,
			},
		)?;
		if let Some(script) = &self.instructions.on_send_authorization_request {
			script(&self.emitter, token, cid);
		}
		Ok(())
	}
}

/// Builds a session over a fresh mock transport.
pub fn session_with(instructions: Instructions) -> (Session, Arc<MockTransport>) {
	init_tracing();
	let (tx, rx) = mpsc::unbounded_channel();
	let mock = Arc::new(MockTransport {
		emitter: Emitter {
			tx: Arc::new(Mutex::new(Some(tx))),
		},
		instructions,
		calls: Mutex::new(Vec::new()),
		failures: Mutex::new(HashMap::new()),
	});
	let transport: Arc<dyn Transport> = mock.clone();
	let session = Session::new(SessionOptions::default(), TransportParts::new(transport, rx));
	(session, mock)
}

/// Builds and starts a session that answers every call successfully.
pub async fn started_session() -> (Session, Arc<MockTransport>) {
	started_session_with(Instructions::happy()).await
}

pub async fn started_session_with(instructions: Instructions) -> (Session, Arc<MockTransport>) {
	let (session, mock) = session_with(instructions);
	within(session.start()).await.expect("session should start");
	(session, mock)
}
