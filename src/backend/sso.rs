use crate::{
    backend::utils::{
        config::GlitchConfigSso,
        error::{BackendError, BackendResult},
    },
    common::{
        newtypes::Uid,
        sso::{AuthSnapshot, SsoEnvelope, SsoMessage, SSO_SECRET_HEADER},
    },
};
use log::{debug, warn};
use moka::{
    ops::compute::{CompResult, Op},
    sync::Cache,
};
use reqwest::Client;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tokio::{
    sync::{broadcast, oneshot},
    time::timeout,
};
use uuid::Uuid;

/// Where sibling sites receive messages.
pub const SSO_INBOX_PATH: &str = "/api/v1/sso/inbox";

/// Snapshots of users without any sign-in activity for this long are dropped.
const SNAPSHOT_IDLE: Duration = Duration::from_secs(60 * 60 * 24);
const MAX_SNAPSHOTS: u64 = 100_000;

type PendingRequests = HashMap<Uuid, oneshot::Sender<Option<AuthSnapshot>>>;

/// Shares sign-in state between all open tabs of this site and its sibling sites.
///
/// Local tabs subscribe to a broadcast channel. Sibling sites receive every local change over
/// http, and can ask for the current state of a user. Such requests carry a unique id, which
/// the answer repeats, so that concurrent requests never get mixed up.
pub struct SsoHub {
    conf: GlitchConfigSso,
    client: Client,
    updates: broadcast::Sender<AuthSnapshot>,
    latest: Cache<Uid, AuthSnapshot>,
    pending: Mutex<PendingRequests>,
}

impl SsoHub {
    pub fn new(conf: GlitchConfigSso, client: Client) -> Self {
        let (updates, _) = broadcast::channel(64);
        SsoHub {
            conf,
            client,
            updates,
            latest: Cache::builder()
                .max_capacity(MAX_SNAPSHOTS)
                .time_to_idle(SNAPSHOT_IDLE)
                .build(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthSnapshot> {
        self.updates.subscribe()
    }

    pub fn latest(&self, uid: &Uid) -> Option<AuthSnapshot> {
        self.latest.get(uid)
    }

    /// Drops the stored state of a deleted account.
    pub fn forget(&self, uid: &Uid) {
        self.latest.invalidate(uid);
    }

    pub fn is_sibling(&self, origin: &str) -> bool {
        self.conf.sibling_origins.iter().any(|o| o == origin)
    }

    /// Incoming messages must carry the shared secret. Without a configured secret all
    /// messages are rejected.
    pub fn verify_secret(&self, secret: Option<&str>) -> bool {
        match (&self.conf.shared_secret, secret) {
            (Some(expected), Some(secret)) => expected == secret,
            _ => false,
        }
    }

    /// Applies a local sign-in change and relays it to all siblings.
    pub fn publish(&self, snapshot: AuthSnapshot) {
        if !self.apply(snapshot.clone()) {
            return;
        }
        for origin in &self.conf.sibling_origins {
            let envelope = SsoEnvelope {
                origin: self.conf.origin.clone(),
                message: SsoMessage::AuthUpdate {
                    snapshot: snapshot.clone(),
                },
            };
            self.spawn_send(origin.clone(), envelope);
        }
    }

    /// Stores the snapshot and notifies local subscribers. Snapshots which are older than
    /// the stored one are ignored, returns false in that case.
    fn apply(&self, snapshot: AuthSnapshot) -> bool {
        let Some(uid) = snapshot.uid.clone() else {
            return false;
        };
        let result = self.latest.entry(uid).and_compute_with(|stored| match stored {
            Some(stored) if stored.value().timestamp > snapshot.timestamp => Op::Nop,
            _ => Op::Put(snapshot.clone()),
        });
        if matches!(result, CompResult::Unchanged(_) | CompResult::StillNone(_)) {
            return false;
        }
        // Fails only if there are no subscribers
        let _ = self.updates.send(snapshot);
        true
    }

    /// Asks a sibling site for the sign-in state of a user. Returns `None` if the sibling
    /// doesnt answer in time.
    pub async fn request_status(
        &self,
        origin: &str,
        uid: &Uid,
    ) -> BackendResult<Option<AuthSnapshot>> {
        if !self.is_sibling(origin) {
            return Err(BackendError::bad_request(format!(
                "Unknown origin {origin}"
            )));
        }
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending_requests().insert(request_id, tx);

        let envelope = SsoEnvelope {
            origin: self.conf.origin.clone(),
            message: SsoMessage::StatusRequest {
                request_id,
                uid: uid.clone(),
            },
        };
        self.spawn_send(origin.to_string(), envelope);

        let res = timeout(self.request_timeout(), rx).await;
        self.pending_requests().remove(&request_id);
        match res {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(_)) => Ok(None),
            Err(_) => {
                debug!("Status request {request_id} to {origin} timed out");
                Ok(None)
            }
        }
    }

    /// Handles a message from a sibling site. Updates are applied locally but not relayed
    /// again, which would cause loops between siblings.
    pub fn receive(&self, envelope: SsoEnvelope) {
        match envelope.message {
            SsoMessage::AuthUpdate { snapshot } => {
                self.apply(snapshot);
            }
            SsoMessage::StatusRequest { request_id, uid } => {
                if !self.is_sibling(&envelope.origin) {
                    warn!("Ignoring status request from unknown origin {}", envelope.origin);
                    return;
                }
                let response = SsoEnvelope {
                    origin: self.conf.origin.clone(),
                    message: SsoMessage::StatusResponse {
                        request_id,
                        snapshot: self.latest(&uid),
                    },
                };
                self.spawn_send(envelope.origin, response);
            }
            SsoMessage::StatusResponse {
                request_id,
                snapshot,
            } => {
                let sender = self.pending_requests().remove(&request_id);
                match sender {
                    Some(sender) => {
                        let _ = sender.send(snapshot);
                    }
                    None => debug!("No pending status request {request_id}"),
                }
            }
        }
    }

    fn pending_requests(&self) -> std::sync::MutexGuard<'_, PendingRequests> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.conf.request_timeout_ms)
    }

    /// Delivery is fire-and-forget, failures are only logged.
    fn spawn_send(&self, origin: String, envelope: SsoEnvelope) {
        let client = self.client.clone();
        let secret = self.conf.shared_secret.clone().unwrap_or_default();
        let request_timeout = self.request_timeout();
        tokio::spawn(async move {
            let url = format!("{}{SSO_INBOX_PATH}", origin.trim_end_matches('/'));
            let res = client
                .post(&url)
                .header(SSO_SECRET_HEADER, secret)
                .timeout(request_timeout)
                .json(&envelope)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            if let Err(e) = res {
                warn!("Failed to deliver sso message to {url}: {e}");
            }
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use pretty_assertions::assert_eq;

    fn hub(siblings: Vec<String>) -> SsoHub {
        let conf = GlitchConfigSso {
            origin: "http://localhost:8131".to_string(),
            sibling_origins: siblings,
            shared_secret: Some("secret".to_string()),
            request_timeout_ms: 100,
        };
        SsoHub::new(conf, Client::new())
    }

    fn snapshot(uid: &str, signed_in: bool) -> AuthSnapshot {
        let mut snapshot = AuthSnapshot::signed_out(&Uid::from(uid));
        snapshot.is_signed_in = signed_in;
        snapshot
    }

    #[tokio::test]
    async fn test_update_reaches_subscribers() -> anyhow::Result<()> {
        let hub = hub(vec![]);
        let mut rx = hub.subscribe();
        hub.publish(snapshot("u1", true));
        let received = rx.recv().await?;
        assert_eq!(Some(Uid::from("u1")), received.uid);
        assert!(hub.latest(&Uid::from("u1")).is_some_and(|s| s.is_signed_in));
        Ok(())
    }

    #[tokio::test]
    async fn test_older_snapshot_is_ignored() {
        let hub = hub(vec![]);
        let newer = snapshot("u1", false);
        let mut older = snapshot("u1", true);
        older.timestamp = newer.timestamp - ChronoDuration::seconds(5);
        hub.receive(SsoEnvelope {
            origin: "x".to_string(),
            message: SsoMessage::AuthUpdate { snapshot: newer },
        });
        hub.receive(SsoEnvelope {
            origin: "x".to_string(),
            message: SsoMessage::AuthUpdate { snapshot: older },
        });
        assert!(hub.latest(&Uid::from("u1")).is_some_and(|s| !s.is_signed_in));
    }

    #[tokio::test]
    async fn test_request_status_unknown_origin() {
        let hub = hub(vec![]);
        let res = hub
            .request_status("https://evil.example", &Uid::from("u1"))
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_request_status_timeout() -> BackendResult<()> {
        // nothing listens on this port, so there is never an answer
        let hub = hub(vec!["http://127.0.0.1:9".to_string()]);
        let started = Utc::now();
        let res = hub
            .request_status("http://127.0.0.1:9", &Uid::from("u1"))
            .await?;
        assert_eq!(None, res);
        assert!(Utc::now() - started >= ChronoDuration::milliseconds(90));
        assert!(hub.pending_requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_responses_matched_by_id() -> anyhow::Result<()> {
        let hub = hub(vec![]);
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        let (id1, id2) = (Uuid::new_v4(), Uuid::new_v4());
        hub.pending_requests().insert(id1, tx1);
        hub.pending_requests().insert(id2, tx2);

        hub.receive(SsoEnvelope {
            origin: "x".to_string(),
            message: SsoMessage::StatusResponse {
                request_id: id2,
                snapshot: Some(snapshot("u2", true)),
            },
        });
        hub.receive(SsoEnvelope {
            origin: "x".to_string(),
            message: SsoMessage::StatusResponse {
                request_id: id1,
                snapshot: None,
            },
        });
        assert_eq!(None, rx1.await?);
        assert_eq!(Some(Uid::from("u2")), rx2.await?.and_then(|s| s.uid));
        Ok(())
    }

    #[test]
    fn test_forget() {
        let hub = hub(vec![]);
        hub.publish(snapshot("u1", true));
        hub.publish(snapshot("u2", true));
        hub.forget(&Uid::from("u1"));
        assert_eq!(None, hub.latest(&Uid::from("u1")));
        assert!(hub.latest(&Uid::from("u2")).is_some());
    }

    #[test]
    fn test_verify_secret() {
        let hub = hub(vec![]);
        assert!(hub.verify_secret(Some("secret")));
        assert!(!hub.verify_secret(Some("wrong")));
        assert!(!hub.verify_secret(None));
    }
}
