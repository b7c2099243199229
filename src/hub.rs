//! Single-consumer dispatcher: the hub is the sole owner and mutator of the
//! nickname registry, channel table, and membership list.
//!
//! Grounded on `handlers/request.rs`'s dispatch-by-command idea and the
//! per-command bodies in `handlers/{registration,channels,messages,
//! miscellanneous}.rs` — restructured as direct match-on-verb dispatch
//! against one event queue (replacing the teacher's chained
//! try-next-parser fallback, which doesn't fit a design where one parsed
//! message is routed exactly once) and with fan-out done by the hub
//! synchronously writing to each member's own outbound channel rather than
//! a broadcast/fan-out primitive, so that delivery order to a given
//! recipient always matches the hub's own event-processing order.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use indexmap::IndexMap;
use log::info;
use tokio::sync::{mpsc, oneshot};

pub use crate::state::ClientId;

use crate::config::Config;
use crate::errors::IrcError;
use crate::message::{Command, Message};
use crate::replies::Reply;
use crate::state::{ChannelRecord, ClientRecord, MemberMode};
use crate::validate;

const HUB_QUEUE_SIZE: usize = 256;

pub type HubSender = mpsc::Sender<Event>;

/// Events the hub consumes, one at a time, to completion.
pub enum Event {
    NewClient {
        addr: SocketAddr,
        outbound: mpsc::Sender<Message>,
        close_tx: oneshot::Sender<()>,
        reply: oneshot::Sender<ClientId>,
    },
    LostClient(ClientId),
    Message(ClientId, Result<Message, IrcError>),
}

pub struct Hub {
    server_name: String,
    server_version: String,
    motd: Vec<String>,
    next_id: u64,
    clients: HashMap<ClientId, ClientRecord>,
    nicknames: HashMap<String, ClientId>,
    channels: IndexMap<String, ChannelRecord>,
    memberships: HashMap<ClientId, HashSet<String>>,
}

impl Hub {
    /// Spawns the hub's event loop as its own task and returns a sender
    /// endpoints and listeners use to submit events to it.
    pub fn spawn(config: Config, motd: Vec<String>) -> HubSender {
        let (tx, rx) = mpsc::channel(HUB_QUEUE_SIZE);
        let mut hub = Hub {
            server_name: config.server.name,
            server_version: config.server.version,
            motd,
            next_id: 0,
            clients: HashMap::new(),
            nicknames: HashMap::new(),
            channels: IndexMap::new(),
            memberships: HashMap::new(),
        };
        tokio::spawn(async move { hub.run(rx).await });
        tx
    }

    async fn run(&mut self, mut rx: mpsc::Receiver<Event>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::NewClient {
                addr,
                outbound,
                close_tx,
                reply,
            } => {
                let id = ClientId(self.next_id);
                self.next_id += 1;
                self.clients
                    .insert(id, ClientRecord::new(id, addr, outbound, close_tx));
                self.memberships.insert(id, HashSet::new());
                let _ = reply.send(id);
            }
            Event::LostClient(id) => self.handle_lost_client(id),
            Event::Message(id, parsed) => self.handle_message(id, parsed),
        }
    }

    /// Best-effort cleanup: removes the client from the nickname
    /// registry (if present) and every channel it belonged to, dropping any
    /// channel left with no members.
    fn handle_lost_client(&mut self, id: ClientId) {
        let Some(client) = self.clients.remove(&id) else {
            return;
        };

        if let Some(nick) = &client.nickname {
            let lower = nick.to_lowercase();
            if self.nicknames.get(&lower) == Some(&id) {
                self.nicknames.remove(&lower);
            }
        }

        if let Some(channel_names) = self.memberships.remove(&id) {
            for name in channel_names {
                if let Some(channel) = self.channels.get_mut(&name) {
                    channel.members.shift_remove(&id);
                    if channel.is_empty() {
                        self.channels.shift_remove(&name);
                    }
                }
            }
        }

        info!("client {id:?} disconnected ({})", client.addr);
    }

    fn handle_message(&mut self, id: ClientId, parsed: Result<Message, IrcError>) {
        if !self.clients.contains_key(&id) {
            return;
        }
        let result = match parsed {
            Ok(message) => self.dispatch(id, message),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.send_error(id, err);
        }
    }

    fn dispatch(&mut self, id: ClientId, message: Message) -> Result<(), IrcError> {
        let Command::Verb(verb) = &message.command else {
            return Err(IrcError::UnknownCommand {
                command: message.command.to_string(),
            });
        };

        match verb.as_str() {
            "NICK" => self.handle_nick(id, message.params),
            "USER" => self.handle_user(id, message.params),
            "PRIVMSG" => self.handle_privmsg(id, message.params),
            "NOTICE" => self.handle_notice(id, message.params),
            "JOIN" => self.handle_join(id, message.params),
            "PART" => self.handle_part(id, message.params),
            "QUIT" => self.handle_quit(id, message.params),
            "PING" => self.handle_ping(id, message.params),
            "CAP" => Ok(()),
            other => Err(IrcError::UnknownCommand {
                command: other.to_string(),
            }),
        }
    }

    // -- registration -----------------------------------------------------

    fn handle_nick(&mut self, id: ClientId, params: Vec<String>) -> Result<(), IrcError> {
        require_params("NICK", &params, 1)?;
        let requested = &params[0];
        let validated = validate::validate_nickname(requested).map_err(|err| {
            log::debug!("rejecting nickname {requested:?}: {err:?}");
            IrcError::ErroneousNick {
                nick: requested.clone(),
            }
        })?;
        let lower = validated.to_lowercase();

        let current = self.clients[&id].nickname.clone();
        if current.as_deref().map(str::to_lowercase).as_deref() == Some(lower.as_str()) {
            return Ok(()); // idempotent: reasserting your own nick is a no-op
        }

        if let Some(holder) = self.nicknames.get(&lower) {
            if *holder != id {
                return Err(IrcError::NicknameInUse { nick: validated });
            }
        }

        let had_prior_nick = current.is_some();
        let old_mask = self.clients[&id].mask();

        if let Some(old) = &current {
            self.nicknames.remove(&old.to_lowercase());
        }
        self.nicknames.insert(lower, id);
        self.clients.get_mut(&id).unwrap().nickname = Some(validated.clone());

        if had_prior_nick {
            let visibility = self.visibility_set(id);
            let change = Message {
                prefix: Some(old_mask),
                command: Command::Verb("NICK".to_string()),
                params: vec![validated],
            };
            self.broadcast_to(&visibility, change);
        } else if self.clients[&id].user.is_some() {
            self.complete_registration(id);
        }

        Ok(())
    }

    fn handle_user(&mut self, id: ClientId, params: Vec<String>) -> Result<(), IrcError> {
        require_params("USER", &params, 4)?;
        let client = self.clients.get_mut(&id).unwrap();
        client.user = Some(params[0].clone());
        client.realname = Some(params[3].clone());
        if client.nickname.is_some() {
            self.complete_registration(id);
        }
        Ok(())
    }

    fn complete_registration(&mut self, id: ClientId) {
        self.clients.get_mut(&id).unwrap().registered = true;
        let mask = self.clients[&id].mask();
        let motd = self.motd.clone();

        self.send_reply(id, Reply::Welcome { mask: &mask });
        self.send_reply(
            id,
            Reply::YourHost {
                servername: &self.server_name.clone(),
                version: &self.server_version.clone(),
            },
        );
        self.send_reply(id, Reply::Created);
        self.send_reply(
            id,
            Reply::MyInfo {
                servername: &self.server_name.clone(),
                version: &self.server_version.clone(),
            },
        );
        self.send_reply(
            id,
            Reply::ISupport {
                network: &self.server_name.clone(),
            },
        );
        self.send_reply(
            id,
            Reply::MotdStart {
                servername: &self.server_name.clone(),
            },
        );
        for line in &motd {
            self.send_reply(id, Reply::Motd { line });
        }
        self.send_reply(id, Reply::EndOfMotd);

        info!("client {id:?} registered as {}", self.clients[&id].display_nick());
    }

    // -- messaging ----------------------------------------------------------

    fn handle_privmsg(&mut self, id: ClientId, params: Vec<String>) -> Result<(), IrcError> {
        self.require_registered(id)?;
        require_params("PRIVMSG", &params, 2)?;
        self.forward_channel_message(id, "PRIVMSG", &params[0], &params[1]);
        Ok(())
    }

    /// NOTICE never raises automatic error replies back to the sender,
    /// so failures here are swallowed rather than propagated.
    fn handle_notice(&mut self, id: ClientId, params: Vec<String>) -> Result<(), IrcError> {
        if self.require_registered(id).is_err() || params.len() < 2 {
            return Ok(());
        }
        self.forward_channel_message(id, "NOTICE", &params[0], &params[1]);
        Ok(())
    }

    /// Forwards to every other member of `target` if it names a channel the
    /// sender belongs to. Any other case (unknown target, a nickname, a
    /// channel the sender isn't in) is silently dropped, never an error;
    /// this applies identically to NOTICE.
    fn forward_channel_message(&self, id: ClientId, command: &str, target: &str, text: &str) {
        let lower = validate::normalize_key(target);
        let Some(channel) = self.channels.get(&lower) else {
            return;
        };
        if !channel.members.contains_key(&id) {
            return;
        }

        let mask = self.clients[&id].mask();
        let message = Message {
            prefix: Some(mask),
            command: Command::Verb(command.to_string()),
            params: vec![channel.display_name.clone(), text.to_string()],
        };
        for member_id in channel.members.keys() {
            if *member_id == id {
                continue;
            }
            if let Some(client) = self.clients.get(member_id) {
                client.send(message.clone());
            }
        }
    }

    // -- channels -------------------------------------------------------

    fn handle_join(&mut self, id: ClientId, params: Vec<String>) -> Result<(), IrcError> {
        self.require_registered(id)?;
        require_params("JOIN", &params, 1)?;
        let raw = &params[0];
        let validated = validate::validate_channel_name(raw).map_err(|err| {
            log::debug!("rejecting channel name {raw:?}: {err:?}");
            IrcError::NoSuchChannel { channel: raw.clone() }
        })?;
        let lower = validate::normalize_key(&validated);

        if self.channels.contains_key(&lower) {
            self.channels
                .get_mut(&lower)
                .unwrap()
                .members
                .entry(id)
                .or_insert(MemberMode::Normal);
        } else {
            self.channels.insert(lower.clone(), ChannelRecord::new(validated.clone(), id));
        }
        self.memberships.entry(id).or_default().insert(lower.clone());

        let mask = self.clients[&id].mask();
        let join_msg = Message {
            prefix: Some(mask),
            command: Command::Verb("JOIN".to_string()),
            params: vec![validated.clone()],
        };
        let member_ids: Vec<ClientId> = self.channels[&lower].members.keys().copied().collect();
        self.broadcast_to(&member_ids, join_msg);

        let names: Vec<String> = self.channels[&lower]
            .members
            .iter()
            .map(|(member_id, mode)| {
                let nick = self.clients.get(member_id).map_or("?", ClientRecord::display_nick);
                format!("{}{}", mode.prefix_char(), nick)
            })
            .collect();
        self.send_reply(
            id,
            Reply::NamReply {
                channel: &validated,
                names: &names,
            },
        );
        self.send_reply(id, Reply::EndOfNames { channel: &validated });

        Ok(())
    }

    /// If the client isn't a member of the named channel, fails
    /// `NOSUCHCHANNEL` (403) — the source leaves `PART` unimplemented, so
    /// this behaviour is this crate's own addition.
    fn handle_part(&mut self, id: ClientId, params: Vec<String>) -> Result<(), IrcError> {
        self.require_registered(id)?;
        require_params("PART", &params, 1)?;
        let raw = &params[0];
        let lower = validate::normalize_key(raw);

        let is_member = self
            .channels
            .get(&lower)
            .is_some_and(|channel| channel.members.contains_key(&id));
        if !is_member {
            return Err(IrcError::NoSuchChannel { channel: raw.clone() });
        }

        let display_name = self.channels[&lower].display_name.clone();
        let member_ids: Vec<ClientId> = self.channels[&lower].members.keys().copied().collect();
        let mask = self.clients[&id].mask();
        let part_msg = Message {
            prefix: Some(mask),
            command: Command::Verb("PART".to_string()),
            params: vec![display_name],
        };
        self.broadcast_to(&member_ids, part_msg);

        let channel = self.channels.get_mut(&lower).unwrap();
        channel.members.shift_remove(&id);
        if channel.is_empty() {
            self.channels.shift_remove(&lower);
        }
        if let Some(set) = self.memberships.get_mut(&id) {
            set.remove(&lower);
        }

        Ok(())
    }

    /// Announces the quit to the visibility set and asks the connection
    /// endpoint to close. Membership/registry cleanup happens exactly once,
    /// when the resulting `LOST_CLIENT` arrives — `QUIT` only announces.
    fn handle_quit(&mut self, id: ClientId, params: Vec<String>) -> Result<(), IrcError> {
        let Some(client) = self.clients.get(&id) else {
            return Ok(());
        };
        let mask = client.mask();
        let reason = params.first().cloned().unwrap_or_default();

        let mut visibility = self.visibility_set(id);
        visibility.retain(|rid| *rid != id);
        let quit_msg = Message {
            prefix: Some(mask),
            command: Command::Verb("QUIT".to_string()),
            params: vec![reason],
        };
        self.broadcast_to(&visibility, quit_msg);

        self.clients.get_mut(&id).unwrap().request_close();
        Ok(())
    }

    fn handle_ping(&mut self, id: ClientId, _params: Vec<String>) -> Result<(), IrcError> {
        let Some(client) = self.clients.get(&id) else {
            return Ok(());
        };
        let pong = Message {
            prefix: Some(self.server_name.clone()),
            command: Command::Verb("PONG".to_string()),
            params: vec![self.server_name.clone()],
        };
        client.send(pong);
        Ok(())
    }

    // -- shared helpers ---------------------------------------------------

    fn require_registered(&self, id: ClientId) -> Result<(), IrcError> {
        match self.clients.get(&id) {
            Some(client) if client.registered => Ok(()),
            _ => Err(IrcError::NotRegistered),
        }
    }

    /// The union of members of every channel `id` belongs to, plus `id`
    /// itself — the set of clients who should see something `id` does.
    fn visibility_set(&self, id: ClientId) -> Vec<ClientId> {
        let mut set = HashSet::new();
        set.insert(id);
        if let Some(channel_names) = self.memberships.get(&id) {
            for name in channel_names {
                if let Some(channel) = self.channels.get(name) {
                    set.extend(channel.members.keys().copied());
                }
            }
        }
        set.into_iter().collect()
    }

    fn broadcast_to(&self, recipients: &[ClientId], message: Message) {
        for rid in recipients {
            if let Some(client) = self.clients.get(rid) {
                client.send(message.clone());
            }
        }
    }

    fn send_reply(&self, id: ClientId, reply: Reply<'_>) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        let target = client.display_nick().to_string();
        client.send(reply.into_message(&self.server_name, &target));
    }

    /// Converts a handler error into its numeric reply. The single place
    /// this conversion happens, so every handler can just return `Err`.
    fn send_error(&self, id: ClientId, err: IrcError) {
        match err {
            IrcError::NeedMoreParams { command } => {
                self.send_reply(id, Reply::NeedMoreParams { command: &command })
            }
            IrcError::NotRegistered => self.send_reply(id, Reply::NotRegistered),
            IrcError::UnknownCommand { command } => {
                self.send_reply(id, Reply::UnknownCommand { command: &command })
            }
            IrcError::NicknameInUse { nick } => self.send_reply(id, Reply::NicknameInUse { nick: &nick }),
            IrcError::ErroneousNick { nick } => {
                self.send_reply(id, Reply::ErroneousNickname { nick: &nick })
            }
            IrcError::NoSuchChannel { channel } => {
                self.send_reply(id, Reply::NoSuchChannel { channel: &channel })
            }
            IrcError::IncorrectEncoding => self.send_reply(id, Reply::IncorrectEncoding),
            // A line the codec couldn't parse at all; there's no command
            // name to report, so this degrades to a generic UNKNOWNCOMMAND.
            IrcError::Malformed => self.send_reply(id, Reply::UnknownCommand { command: "*" }),
        }
    }
}

fn require_params(command: &str, params: &[String], min: usize) -> Result<(), IrcError> {
    if params.len() < min {
        Err(IrcError::NeedMoreParams {
            command: command.to_string(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    fn test_config() -> Config {
        Config::default()
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    async fn spawn_client(hub: &HubSender, port: u16) -> DuplexStream {
        let (server_side, client_side) = duplex(4096);
        let hub = hub.clone();
        tokio::spawn(async move { client::run(server_side, addr(port), hub, 512).await });
        client_side
    }

    async fn read_line(stream: &mut DuplexStream) -> String {
        let mut byte = [0u8; 1];
        let mut line = Vec::new();
        loop {
            let n = stream.read(&mut byte).await.unwrap();
            assert!(n > 0, "stream closed before a full line arrived");
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        String::from_utf8(line).unwrap().trim_end_matches('\r').to_string()
    }

    async fn register(stream: &mut DuplexStream, nick: &str) {
        let line = format!("NICK {nick}\r\nUSER {nick} 0 * :{nick} Example\r\n");
        stream.write_all(line.as_bytes()).await.unwrap();
        for _ in 0..7 {
            read_line(stream).await; // 001..005, 375, 376 (empty motd: no 372 lines)
        }
    }

    #[tokio::test]
    async fn registration_emits_the_full_welcome_sequence() {
        let hub = Hub::spawn(test_config(), vec!["hello there".to_string()]);
        let mut conn = spawn_client(&hub, 1).await;
        conn.write_all(b"NICK alice\r\nUSER alice 0 * :Alice\r\n")
            .await
            .unwrap();

        assert!(read_line(&mut conn).await.starts_with(":irc.example.org 001 alice :Welcome"));
        assert!(read_line(&mut conn).await.contains(" 002 "));
        assert!(read_line(&mut conn).await.contains(" 003 "));
        assert!(read_line(&mut conn).await.contains(" 004 "));
        assert!(read_line(&mut conn).await.contains(" 005 "));
        assert!(read_line(&mut conn).await.contains(" 375 "));
        assert_eq!(read_line(&mut conn).await, ":irc.example.org 372 alice :- hello there");
        assert!(read_line(&mut conn).await.contains(" 376 "));
    }

    #[tokio::test]
    async fn nick_collision_reports_to_the_second_client() {
        let hub = Hub::spawn(test_config(), vec![]);
        let mut a = spawn_client(&hub, 10).await;
        register(&mut a, "bob").await;

        let mut b = spawn_client(&hub, 11).await;
        b.write_all(b"NICK bob\r\n").await.unwrap();
        assert_eq!(
            read_line(&mut b).await,
            ":irc.example.org 433 * bob :Nickname already in use"
        );
    }

    #[tokio::test]
    async fn nick_is_idempotent_for_the_holder() {
        let hub = Hub::spawn(test_config(), vec![]);
        let mut alice = spawn_client(&hub, 15).await;
        register(&mut alice, "alice").await;

        alice.write_all(b"NICK alice\r\n").await.unwrap();
        alice.write_all(b"PING probe\r\n").await.unwrap();
        // no NICK/error line should precede the PONG — the repeat NICK was a no-op
        let reply = read_line(&mut alice).await;
        assert!(reply.starts_with("PONG") || reply.contains("PONG"));
    }

    #[tokio::test]
    async fn join_reports_names_and_end_of_names() {
        let hub = Hub::spawn(test_config(), vec![]);
        let mut alice = spawn_client(&hub, 20).await;
        register(&mut alice, "alice").await;

        alice.write_all(b"JOIN #x\r\n").await.unwrap();
        assert!(read_line(&mut alice).await.starts_with(":alice!alice@127.0.0.1 JOIN #x"));
        assert_eq!(read_line(&mut alice).await, ":irc.example.org 353 alice = #x @alice");
        assert_eq!(read_line(&mut alice).await, ":irc.example.org 366 alice #x :End of /NAMES");
    }

    #[tokio::test]
    async fn privmsg_reaches_the_other_member_only() {
        let hub = Hub::spawn(test_config(), vec![]);
        let mut alice = spawn_client(&hub, 30).await;
        register(&mut alice, "alice").await;
        alice.write_all(b"JOIN #x\r\n").await.unwrap();
        for _ in 0..3 {
            read_line(&mut alice).await;
        }

        let mut bob = spawn_client(&hub, 31).await;
        register(&mut bob, "bob").await;
        bob.write_all(b"JOIN #x\r\n").await.unwrap();
        for _ in 0..3 {
            read_line(&mut bob).await;
        }
        assert!(read_line(&mut alice).await.starts_with(":bob!bob@127.0.0.1 JOIN #x"));

        alice.write_all(b"PRIVMSG #x :hello world\r\n").await.unwrap();
        assert_eq!(
            read_line(&mut bob).await,
            ":alice!alice@127.0.0.1 PRIVMSG #x :hello world"
        );
    }

    #[tokio::test]
    async fn nick_change_fans_out_to_every_shared_channel_member() {
        let hub = Hub::spawn(test_config(), vec![]);
        let mut alice = spawn_client(&hub, 40).await;
        register(&mut alice, "alice").await;
        alice.write_all(b"JOIN #x\r\n").await.unwrap();
        for _ in 0..3 {
            read_line(&mut alice).await;
        }

        let mut bob = spawn_client(&hub, 41).await;
        register(&mut bob, "bob").await;
        bob.write_all(b"JOIN #x\r\n").await.unwrap();
        for _ in 0..3 {
            read_line(&mut bob).await;
        }
        read_line(&mut alice).await; // alice sees bob's JOIN

        alice.write_all(b"NICK allie\r\n").await.unwrap();
        assert_eq!(read_line(&mut alice).await, ":alice!alice@127.0.0.1 NICK allie");
        assert_eq!(read_line(&mut bob).await, ":alice!alice@127.0.0.1 NICK allie");
    }

    #[tokio::test]
    async fn unregistered_privmsg_is_rejected_and_not_routed() {
        let hub = Hub::spawn(test_config(), vec![]);
        let mut conn = spawn_client(&hub, 50).await;
        conn.write_all(b"PRIVMSG #x :hi\r\n").await.unwrap();
        assert_eq!(
            read_line(&mut conn).await,
            ":irc.example.org 451 * :You are not registered."
        );
    }

    #[tokio::test]
    async fn part_of_a_channel_not_joined_is_an_error() {
        let hub = Hub::spawn(test_config(), vec![]);
        let mut alice = spawn_client(&hub, 60).await;
        register(&mut alice, "alice").await;

        alice.write_all(b"PART #nope\r\n").await.unwrap();
        assert_eq!(
            read_line(&mut alice).await,
            ":irc.example.org 403 alice #nope :No such channel"
        );
    }

    #[tokio::test]
    async fn part_announces_to_remaining_members_and_drops_empty_channel() {
        let hub = Hub::spawn(test_config(), vec![]);
        let mut alice = spawn_client(&hub, 70).await;
        register(&mut alice, "alice").await;
        alice.write_all(b"JOIN #x\r\n").await.unwrap();
        for _ in 0..3 {
            read_line(&mut alice).await;
        }

        alice.write_all(b"PART #x\r\n").await.unwrap();
        assert!(read_line(&mut alice).await.starts_with(":alice!alice@127.0.0.1 PART #x"));

        // the channel was dropped; re-joining creates it fresh with alice as operator
        alice.write_all(b"JOIN #x\r\n").await.unwrap();
        read_line(&mut alice).await; // JOIN echo
        assert_eq!(read_line(&mut alice).await, ":irc.example.org 353 alice = #x @alice");
    }

    #[tokio::test]
    async fn unknown_command_is_reported() {
        let hub = Hub::spawn(test_config(), vec![]);
        let mut conn = spawn_client(&hub, 80).await;
        conn.write_all(b"BOGUS a b c\r\n").await.unwrap();
        assert_eq!(
            read_line(&mut conn).await,
            ":irc.example.org 421 * BOGUS :Unknown command"
        );
    }
}
