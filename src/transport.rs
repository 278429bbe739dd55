use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::sync::{mpsc, oneshot};

use crate::error::FreeCadError;

const TRANSPORT_QUEUE_CAPACITY: usize = 64;

/// Single-connection HTTP worker. Requests are queued and posted one at a time,
/// so the remote endpoint never sees two calls from this process concurrently.
#[derive(Debug)]
pub(crate) struct Transport {
    request_tx: mpsc::Sender<TransportRequest>,
}

#[derive(Debug)]
struct TransportRequest {
    body: String,
    response_tx: oneshot::Sender<Result<String, FreeCadError>>,
}

impl Transport {
    /// Must be called from within a tokio runtime.
    pub(crate) fn connect(endpoint: &str, timeout: Duration) -> Result<Self, FreeCadError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FreeCadError::Connection {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            })?;

        let (request_tx, mut request_rx) =
            mpsc::channel::<TransportRequest>(TRANSPORT_QUEUE_CAPACITY);

        let endpoint = endpoint.to_string();
        tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                let response = http_roundtrip(&http, &endpoint, request.body, timeout).await;
                let _ = request.response_tx.send(response);
            }
            tracing::debug!(endpoint = %endpoint, "transport worker stopped");
        });

        Ok(Self { request_tx })
    }

    pub(crate) async fn roundtrip(&self, body: String) -> Result<String, FreeCadError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.request_tx
            .send(TransportRequest { body, response_tx })
            .await
            .map_err(|_| FreeCadError::TransportClosed)?;

        response_rx.await.map_err(|_| FreeCadError::TransportClosed)?
    }
}

async fn http_roundtrip(
    http: &reqwest::Client,
    endpoint: &str,
    body: String,
    timeout: Duration,
) -> Result<String, FreeCadError> {
    let response = http
        .post(endpoint)
        .header(CONTENT_TYPE, "text/xml")
        .body(body)
        .send()
        .await
        .map_err(|err| map_send_error(err, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FreeCadError::HttpStatus {
            status: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|err| map_receive_error(err, timeout))
}

fn map_send_error(error: reqwest::Error, timeout: Duration) -> FreeCadError {
    if error.is_timeout() {
        return FreeCadError::Timeout { timeout };
    }

    FreeCadError::TransportSend {
        reason: error.to_string(),
    }
}

fn map_receive_error(error: reqwest::Error, timeout: Duration) -> FreeCadError {
    if error.is_timeout() {
        return FreeCadError::Timeout { timeout };
    }

    FreeCadError::TransportReceive {
        reason: error.to_string(),
    }
}
