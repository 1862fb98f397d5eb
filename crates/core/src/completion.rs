//! Completion-callback adapter for legacy call sites.
//!
//! Every asynchronous session operation has exactly one future-producing
//! implementation. Call sites that prefer a callback go through [`attach`],
//! which runs the future to completion and hands its result to the callback
//! once.

use std::future::Future;

use blpapi_runtime::Result;

/// Drives `future` on the current runtime and invokes `callback` with its
/// result.
pub fn attach<T, F, C>(future: F, callback: C)
where
	F: Future<Output = Result<T>> + Send + 'static,
	C: FnOnce(Result<T>) + Send + 'static,
	T: Send + 'static,
{
	tokio::spawn(async move {
		callback(future.await);
	});
}

#[cfg(test)]
mod tests {
	use blpapi_runtime::Error;
	use tokio::sync::oneshot;

	use super::*;

	#[tokio::test]
	async fn test_callback_receives_success() {
		let (tx, rx) = oneshot::channel();
		attach(async { Ok(42) }, move |result| {
			let _ = tx.send(result);
		});
		assert_eq!(rx.await.unwrap().unwrap(), 42);
	}

	#[tokio::test]
	async fn test_callback_receives_failure() {
		let (tx, rx) = oneshot::channel();
		attach(async { Err::<(), _>(Error::SessionTerminated) }, move |result| {
			let _ = tx.send(result);
		});
		assert!(rx.await.unwrap().unwrap_err().is_session_terminated());
	}
}
