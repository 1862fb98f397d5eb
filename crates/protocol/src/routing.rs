//! Static routing tables.
//!
//! Request names map to the events that carry their responses, and service
//! URIs map to the events emitted for subscriptions on that service. Names
//! follow section A of the BLPAPI Developer's Guide.

/// Service used for authentication and authorization.
pub const AUTH_SERVICE: &str = "//blp/apiauth";

/// Service assumed for securities without a `//blp/<name>` prefix.
pub const DEFAULT_SUBSCRIPTION_SERVICE: &str = "//blp/mktdata";

/// Request name used for token generation.
pub const TOKEN_GENERATION_REQUEST: &str = "TokenGenerationRequest";

/// Request name used for authorization.
pub const AUTHORIZATION_REQUEST: &str = "AuthorizationRequest";

/// How responses to a request arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseRoute {
	/// Zero or more partial chunks then one final chunk, all on one event name.
	Stream(&'static str),
	/// Exactly one event, either the success or the failure name.
	Outcome {
		success: &'static str,
		failure: &'static str,
	},
}

impl ResponseRoute {
	/// Event names that must be listened to for this route.
	pub fn event_names(&self) -> Vec<&'static str> {
		match *self {
			ResponseRoute::Stream(name) => vec![name],
			ResponseRoute::Outcome { success, failure } => vec![success, failure],
		}
	}
}

const OUTCOME_PAIRS: &[[&str; 2]] = &[
	["TokenGenerationSuccess", "TokenGenerationFailure"],
	["AuthorizationSuccess", "AuthorizationFailure"],
];

const STREAM_ROUTES: &[(&str, &str)] = &[
	// //blp/refdata
	("HistoricalDataRequest", "HistoricalDataResponse"),
	("IntradayTickRequest", "IntradayTickResponse"),
	("IntradayBarRequest", "IntradayBarResponse"),
	("ReferenceDataRequest", "ReferenceDataResponse"),
	("PortfolioDataRequest", "PortfolioDataResponse"),
	("BeqsRequest", "BeqsResponse"),
	// //blp/apiflds
	("FieldInfoRequest", "fieldResponse"),
	("FieldSearchRequest", "fieldResponse"),
	("CategorizedFieldSearchRequest", "categorizedFieldResponse"),
	// //blp/instruments
	("instrumentListRequest", "InstrumentListResponse"),
	("curveListRequest", "CurveListResponse"),
	("govtListRequest", "GovtListResponse"),
	// //blp/tasvc
	("studyRequest", "studyResponse"),
];

const SUBSCRIPTION_EVENTS: &[(&str, &[&str])] = &[
	("//blp/mktdata", &["MarketDataEvents"]),
	("//blp/mktvwap", &["MarketDataEvents"]),
	(
		"//blp/mktbar",
		&["MarketBarStart", "MarketBarUpdate", "MarketBarEnd"],
	),
	("//blp/pagedata", &["PageUpdate"]),
];

/// Looks up how responses to `request_name` are delivered.
pub fn response_route(request_name: &str) -> Option<ResponseRoute> {
	if let Some(&(_, response)) = STREAM_ROUTES.iter().find(|(req, _)| *req == request_name) {
		return Some(ResponseRoute::Stream(response));
	}
	let pair = match request_name {
		TOKEN_GENERATION_REQUEST => &OUTCOME_PAIRS[0],
		AUTHORIZATION_REQUEST => &OUTCOME_PAIRS[1],
		_ => return None,
	};
	Some(ResponseRoute::Outcome {
		success: pair[0],
		failure: pair[1],
	})
}

/// Looks up the events emitted for subscriptions on `service`.
pub fn subscription_events(service: &str) -> Option<&'static [&'static str]> {
	SUBSCRIPTION_EVENTS
		.iter()
		.find(|(uri, _)| *uri == service)
		.map(|(_, events)| *events)
}

/// Derives the service a security subscribes through.
///
/// A security of the form `//blp/<lowercase letters>...` names its service
/// explicitly; anything else goes to [`DEFAULT_SUBSCRIPTION_SERVICE`].
pub fn service_for_security(security: &str) -> &str {
	const PREFIX: &str = "//blp/";
	let Some(rest) = security.strip_prefix(PREFIX) else {
		return DEFAULT_SUBSCRIPTION_SERVICE;
	};
	let name_len = rest.bytes().take_while(u8::is_ascii_lowercase).count();
	if name_len == 0 {
		return DEFAULT_SUBSCRIPTION_SERVICE;
	}
	&security[..PREFIX.len() + name_len]
}
