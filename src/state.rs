//! Data model owned exclusively by the hub: clients, channels, memberships,
//! and the nickname registry.
//!
//! Grounded on `user_state.rs`'s `User`/`UserStatus` and
//! `channels_models.rs`'s `IrcChannel`, but stripped of the
//! `Arc<RwLock<_>>`/`DashMap`/`DashSet` wrapping those files use: the hub is
//! the sole mutator of these tables, so there is exactly one writer and it
//! never yields mid-mutation. Plain owned collections are sufficient and
//! simpler.

use std::net::SocketAddr;

use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot};

use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

/// The single-character member prefix used in NAMES replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberMode {
    Operator,
    Normal,
}

impl MemberMode {
    pub fn prefix_char(&self) -> &'static str {
        match self {
            MemberMode::Operator => "@",
            MemberMode::Normal => "",
        }
    }
}

/// One connected client, as tracked by the hub.
pub struct ClientRecord {
    pub id: ClientId,
    pub addr: SocketAddr,
    pub nickname: Option<String>,
    pub user: Option<String>,
    pub realname: Option<String>,
    pub vhost: Option<String>,
    pub registered: bool,
    pub outbound: mpsc::Sender<Message>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl ClientRecord {
    pub fn new(
        id: ClientId,
        addr: SocketAddr,
        outbound: mpsc::Sender<Message>,
        close_tx: oneshot::Sender<()>,
    ) -> Self {
        ClientRecord {
            id,
            addr,
            nickname: None,
            user: None,
            realname: None,
            vhost: None,
            registered: false,
            outbound,
            close_tx: Some(close_tx),
        }
    }

    /// Signals the connection endpoint to tear down its socket (e.g. after a
    /// QUIT). A no-op if already requested or the endpoint is already gone.
    pub fn request_close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Host part of the mask: the vhost override if set, else the remote IP.
    pub fn host(&self) -> String {
        self.vhost.clone().unwrap_or_else(|| self.addr.ip().to_string())
    }

    /// `nick!user@host`, using the recorded nick/user or a placeholder if
    /// either is still unset (only possible before registration completes).
    pub fn mask(&self) -> String {
        format!(
            "{}!{}@{}",
            self.display_nick(),
            self.user.as_deref().unwrap_or("*"),
            self.host()
        )
    }

    /// The client's current nick, or `"*"` if none has been assigned yet —
    /// the shape every numeric reply's target parameter uses pre-registration.
    pub fn display_nick(&self) -> &str {
        self.nickname.as_deref().unwrap_or("*")
    }

    /// Best-effort, non-fatal send: a full or closed outbound channel just
    /// means this client misses the message rather than stalling the hub.
    pub fn send(&self, message: Message) {
        let _ = self.outbound.try_send(message);
    }
}

/// One channel, as tracked by the hub. Members are kept in join order.
pub struct ChannelRecord {
    pub display_name: String,
    pub members: IndexMap<ClientId, MemberMode>,
}

impl ChannelRecord {
    pub fn new(display_name: String, creator: ClientId) -> Self {
        let mut members = IndexMap::new();
        members.insert(creator, MemberMode::Operator);
        ChannelRecord {
            display_name,
            members,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record() -> (ClientRecord, oneshot::Receiver<()>) {
        let (outbound, _rx) = mpsc::channel(1);
        let (close_tx, close_rx) = oneshot::channel();
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        (ClientRecord::new(ClientId(0), addr, outbound, close_tx), close_rx)
    }

    #[test]
    fn mask_falls_back_to_remote_ip_and_star_user() {
        let (client, _close_rx) = new_record();
        assert_eq!(client.mask(), "*!*@127.0.0.1");
    }

    #[test]
    fn mask_prefers_vhost_and_recorded_nick_user() {
        let (mut client, _close_rx) = new_record();
        client.nickname = Some("alice".into());
        client.user = Some("alice".into());
        client.vhost = Some("cloaked.example".into());
        assert_eq!(client.mask(), "alice!alice@cloaked.example");
    }

    #[test]
    fn request_close_is_idempotent() {
        let (mut client, mut close_rx) = new_record();
        client.request_close();
        client.request_close();
        assert!(close_rx.try_recv().is_ok());
    }

    #[test]
    fn channel_record_assigns_operator_to_creator() {
        let channel = ChannelRecord::new("#x".into(), ClientId(7));
        assert_eq!(channel.members.get(&ClientId(7)), Some(&MemberMode::Operator));
        assert!(!channel.is_empty());
    }
}
