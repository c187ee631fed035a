//! HTTP client for a remote rendezvous server.
//!
//! Join and submit requests are held open by the server until the other
//! participant arrives, so the underlying client has no request timeout of
//! its own unless one is configured.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::commitment::Commitment;
use crate::error::RendezvousError;
use crate::peer::Rendezvous;
use crate::protocol::{Health, Verdict, HEALTH_PATH, JOIN_PATH, NEW_ROOM_PATH, SUBMIT_PATH};
use crate::room_id::RoomId;

/// Errors that can occur while talking to the server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Rendezvous(#[from] RendezvousError),

    #[error("unexpected status {0} from server")]
    UnexpectedStatus(StatusCode),

    #[error("unrecognized response from server: {0:?}")]
    UnexpectedBody(String),
}

/// Client for a rendezvous server reachable at `base_url`.
#[derive(Debug, Clone)]
pub struct RendezvousClient {
    client: Client,
    base_url: String,
}

impl RendezvousClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Use a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the server's health document.
    pub async fn health(&self) -> Result<Health, ClientError> {
        let response = self.get(HEALTH_PATH).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response),
            Err(e) if e.is_timeout() => Err(RendezvousError::Timeout.into()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Map the statuses every held endpoint shares.
fn held_failure(room_id: &RoomId, status: StatusCode) -> ClientError {
    match status {
        StatusCode::NOT_FOUND => RendezvousError::NotFound(*room_id).into(),
        StatusCode::IM_A_TEAPOT => RendezvousError::NotReady(*room_id).into(),
        // Hosting platforms answer a request held too long with 503 or 504.
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            RendezvousError::Timeout.into()
        }
        other => ClientError::UnexpectedStatus(other),
    }
}

impl Rendezvous for RendezvousClient {
    type Error = ClientError;

    async fn create_room(&self) -> Result<RoomId, Self::Error> {
        let response = self.get(NEW_ROOM_PATH).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::UnexpectedStatus(status));
        }

        let body = response.text().await?;
        RoomId::parse(body.trim()).map_err(|_| ClientError::UnexpectedBody(body))
    }

    async fn join(&self, room_id: &RoomId) -> Result<(), Self::Error> {
        let response = self.get(&format!("{JOIN_PATH}/{room_id}")).await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            status => Err(held_failure(room_id, status)),
        }
    }

    async fn submit(&self, room_id: &RoomId, commitment: &Commitment) -> Result<Verdict, Self::Error> {
        let response = self
            .get(&format!("{SUBMIT_PATH}/{room_id}/{commitment}"))
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(held_failure(room_id, status));
        }

        let body = response.text().await?;
        Verdict::from_wire(&body).ok_or(ClientError::UnexpectedBody(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = RendezvousClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_held_failure_mapping() {
        let room_id = RoomId::parse("ABCDEFGH").unwrap();

        assert!(matches!(
            held_failure(&room_id, StatusCode::NOT_FOUND),
            ClientError::Rendezvous(RendezvousError::NotFound(id)) if id == room_id
        ));
        assert!(matches!(
            held_failure(&room_id, StatusCode::IM_A_TEAPOT),
            ClientError::Rendezvous(RendezvousError::NotReady(_))
        ));
        assert!(matches!(
            held_failure(&room_id, StatusCode::SERVICE_UNAVAILABLE),
            ClientError::Rendezvous(RendezvousError::Timeout)
        ));
        assert!(matches!(
            held_failure(&room_id, StatusCode::INTERNAL_SERVER_ERROR),
            ClientError::UnexpectedStatus(StatusCode::INTERNAL_SERVER_ERROR)
        ));
    }
}
