use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::codec::{read_frame, write_frame};
use crate::database::models::{Message, UserRecord};
use crate::database::registry::{Registration, Scope, UserRegistry};
use crate::utils::clock;
use crate::utils::config::Config;
use crate::utils::constants::MAX_FRAME_LEN;
use crate::utils::enums::{Command, LoginReply};
use crate::utils::errors::{FrameError, RelayError, Result};
use crate::utils::logger::audit;
use crate::utils::types::ConnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_name_len: usize,
    pub max_body_len: usize,
    pub idle_timeout: Option<Duration>,
}

impl From<&Config> for SessionLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_name_len: config.max_name_len,
            max_body_len: config.max_body_len,
            idle_timeout: config.idle_timeout(),
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Active,
    Closed,
}

/// One client connection, from the login frame to teardown.
#[derive(Debug)]
pub struct Session<S> {
    stream: S,
    conn: ConnId,
    registry: Arc<UserRegistry>,
    limits: SessionLimits,
    state: SessionState,
    clock: fn() -> String,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        conn: ConnId,
        registry: Arc<UserRegistry>,
        limits: SessionLimits,
    ) -> Self {
        Self {
            stream,
            conn,
            registry,
            limits,
            state: SessionState::Connecting,
            clock: clock::now,
        }
    }

    /// Replaces the source of message timestamps.
    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drives the connection until the client exits, hangs up, idles out or breaks the protocol.
    /// A rejected login is a normal end and returns `Ok`.
    pub async fn run(mut self) -> Result<()> {
        self.state = SessionState::Authenticating;
        let user = match self.authenticate().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.close().await;
                return Ok(());
            }
            Err(e) => {
                self.close().await;
                return Err(e);
            }
        };

        self.state = SessionState::Active;
        let result = self.serve(&user).await;

        //Teardown is the same whether the client sent exit or vanished
        user.lock().await.release(self.conn);
        match &result {
            Ok(()) => audit(user.name(), "exits"),
            Err(e) => audit(user.name(), format_args!("connection lost ({})", e)),
        }
        self.close().await;
        result
    }

    async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
        self.state = SessionState::Closed;
    }

    async fn next_frame(&mut self) -> Result<String> {
        match self.limits.idle_timeout {
            Some(limit) => match timeout(limit, read_frame(&mut self.stream)).await {
                Ok(frame) => Ok(frame?),
                Err(_) => Err(RelayError::IdleTimeout(limit)),
            },
            None => Ok(read_frame(&mut self.stream).await?),
        }
    }

    async fn reply(&mut self, content: &str) -> Result<()> {
        write_frame(&mut self.stream, content).await?;
        Ok(())
    }

    async fn read_name(&mut self) -> Result<String> {
        let name = self.next_frame().await?;
        if name.is_empty() || name.len() > self.limits.max_name_len || name.contains('\n') {
            return Err(FrameError::Protocol(format!("invalid user name {:?}", name)).into());
        }
        Ok(name)
    }

    async fn read_body(&mut self) -> Result<String> {
        let body = self.next_frame().await?;
        if body.len() > self.limits.max_body_len || body.contains('\n') {
            return Err(FrameError::Protocol(format!(
                "message body of {} bytes rejected",
                body.len()
            ))
            .into());
        }
        Ok(body)
    }

    //Returns the caller's record, bound to this connection, or None after the client was told "E".
    async fn authenticate(&mut self) -> Result<Option<Arc<UserRecord>>> {
        let name = self.read_name().await?;

        let user = match self.registry.register_if_absent(&name, Some(self.conn)).await {
            Ok(Registration::Created(record)) => {
                audit(&name, "Connection by unknown user");
                Some(record)
            }
            Ok(Registration::Existing(record)) => {
                let bound = record.lock().await.bind(self.conn);
                if bound {
                    audit(&name, "Connection by known user");
                    Some(record)
                } else {
                    audit(&name, "duplicate log in, force out");
                    None
                }
            }
            Err(RelayError::RegistryFull { capacity }) => {
                warn!("Registry full ({} users), refusing {}", capacity, name);
                audit(&name, "refused, user registry is full");
                None
            }
            Err(e) => return Err(e),
        };

        match user {
            Some(user) => {
                if let Err(e) = self.reply(LoginReply::Accepted.as_wire()).await {
                    user.lock().await.release(self.conn);
                    return Err(e);
                }
                Ok(Some(user))
            }
            None => {
                self.reply(LoginReply::Rejected.as_wire()).await?;
                Ok(None)
            }
        }
    }

    async fn serve(&mut self, user: &Arc<UserRecord>) -> Result<()> {
        loop {
            let frame = self.next_frame().await?;
            let command = match frame.parse::<Command>() {
                Ok(command) => command,
                Err(_) => {
                    debug!("{} sent unknown command {:?}", self.conn, frame);
                    continue;
                }
            };
            if command == Command::Exit {
                return Ok(());
            }
            self.dispatch(command, user).await?;
        }
    }

    async fn dispatch(&mut self, command: Command, user: &Arc<UserRecord>) -> Result<()> {
        let me = user.name();

        match command {
            Command::ListKnown => {
                let names = self.registry.known_names().await;
                self.reply(&render_lines(&names)).await?;
                audit(me, "displays all known users");
            }
            Command::ListConnected => {
                let names = self.registry.connected_names().await;
                self.reply(&render_lines(&names)).await?;
                audit(me, "displays all connected users");
            }
            Command::SendTo => {
                let recipient = self.read_name().await?;
                let body = self.read_body().await?;
                let timestamp = (self.clock)();
                match self.registry.resolve_recipient(&recipient).await {
                    Ok(record) => {
                        let message = Message::new(me, &timestamp, &body);
                        UserRegistry::deliver(&record, message).await;
                        audit(me, format_args!("posts a message for {}", recipient));
                    }
                    Err(RelayError::RegistryFull { .. }) => {
                        warn!(
                            "Message from {} to unknown user {} rejected, registry full",
                            me, recipient
                        );
                        audit(
                            me,
                            format_args!("message for {} rejected, registry full", recipient),
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
            Command::SendConnected => {
                let body = self.read_body().await?;
                let message = Message::new(me, &(self.clock)(), &body);
                let delivery = self.registry.broadcast(&message, Scope::Connected).await;
                debug!("{:?}", delivery);
                audit(me, "posts a message for currently connected users");
            }
            Command::SendAll => {
                let body = self.read_body().await?;
                let message = Message::new(me, &(self.clock)(), &body);
                let delivery = self.registry.broadcast(&message, Scope::Everyone).await;
                debug!("{:?}", delivery);
                audit(me, "posts a message for all known users");
            }
            Command::Fetch => {
                let (messages, left) = {
                    let mut state = user.lock().await;
                    let messages = state.mailbox.drain_within(MAX_FRAME_LEN);
                    (messages, state.mailbox.len())
                };
                if left > 0 {
                    info!("{} messages for {} held back for the next fetch", left, me);
                }
                self.reply(&render_lines(&messages)).await?;
                audit(me, "gets messages");
            }
            Command::Exit => {}
        }
        Ok(())
    }
}

//One item per line, each newline terminated. Stops at the last whole line that fits in a frame.
pub fn render_lines<T: ToString>(items: &[T]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let line = item.to_string();
        if out.len() + line.len() + 1 > MAX_FRAME_LEN {
            warn!("Response truncated, {} of {} lines sent", i, items.len());
            break;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{read_frame, write_frame};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::io::duplex;
    use tokio::time::{sleep, Duration};
    use tracing_test::traced_test;

    fn registry() -> Arc<UserRegistry> {
        Arc::new(UserRegistry::new(100, 10))
    }

    #[test]
    fn render_lines_stops_at_frame_limit() {
        assert_eq!(render_lines::<String>(&[]), "");
        assert_eq!(render_lines(&["a", "b"]), "a\nb\n");

        let names: Vec<String> = (0..20).map(|i| format!("{:079}", i)).collect();
        let out = render_lines(&names);
        assert_eq!(out.len(), 960);
        assert_eq!(out.lines().count(), 12);
    }

    static BODY_SENT: AtomicBool = AtomicBool::new(false);

    fn stamp_by_progress() -> String {
        if BODY_SENT.load(Ordering::SeqCst) {
            "after body".to_string()
        } else {
            "before body".to_string()
        }
    }

    #[tokio::test]
    async fn message_is_stamped_when_its_body_arrives() {
        let registry = registry();
        let (mut client, server) = duplex(1024);
        let session =
            Session::new(server, ConnId(1), Arc::clone(&registry), SessionLimits::default())
                .with_clock(stamp_by_progress);
        let handle = tokio::spawn(session.run());

        write_frame(&mut client, "Alice").await.unwrap();
        assert_eq!(read_frame(&mut client).await.unwrap(), "S");
        write_frame(&mut client, "3").await.unwrap();
        write_frame(&mut client, "Bob").await.unwrap();
        //Let the session sit waiting on the body frame
        sleep(Duration::from_millis(50)).await;
        BODY_SENT.store(true, Ordering::SeqCst);
        write_frame(&mut client, "late hello").await.unwrap();
        write_frame(&mut client, "7").await.unwrap();
        assert!(handle.await.unwrap().is_ok());

        let bob = registry.get(1).await.unwrap();
        let queued = bob.lock().await.mailbox.drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].timestamp, "after body");
    }

    #[tokio::test]
    async fn login_then_exit_releases_binding() {
        let registry = registry();
        let (mut client, server) = duplex(1024);
        let session =
            Session::new(server, ConnId(1), Arc::clone(&registry), SessionLimits::default());
        assert_eq!(session.state(), SessionState::Connecting);
        let handle = tokio::spawn(session.run());

        write_frame(&mut client, "Alice").await.unwrap();
        assert_eq!(read_frame(&mut client).await.unwrap(), "S");
        write_frame(&mut client, "1").await.unwrap();
        assert_eq!(read_frame(&mut client).await.unwrap(), "Alice\n");
        write_frame(&mut client, "7").await.unwrap();

        assert!(handle.await.unwrap().is_ok());
        let alice = registry.get(0).await.unwrap();
        assert_eq!(alice.lock().await.active, None);
    }

    #[tokio::test]
    async fn unknown_commands_are_ignored() {
        let registry = registry();
        let (mut client, server) = duplex(1024);
        let session = Session::new(server, ConnId(1), registry, SessionLimits::default());
        let handle = tokio::spawn(session.run());

        write_frame(&mut client, "Bob").await.unwrap();
        assert_eq!(read_frame(&mut client).await.unwrap(), "S");
        write_frame(&mut client, "9").await.unwrap();
        write_frame(&mut client, "hello").await.unwrap();
        write_frame(&mut client, "2").await.unwrap();
        assert_eq!(read_frame(&mut client).await.unwrap(), "Bob\n");
        write_frame(&mut client, "7").await.unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn idle_connection_times_out() {
        let registry = registry();
        let limits = SessionLimits {
            idle_timeout: Some(Duration::from_millis(50)),
            ..SessionLimits::default()
        };
        let (mut client, server) = duplex(1024);
        let session = Session::new(server, ConnId(3), Arc::clone(&registry), limits);
        let handle = tokio::spawn(session.run());

        write_frame(&mut client, "Sleepy").await.unwrap();
        assert_eq!(read_frame(&mut client).await.unwrap(), "S");

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RelayError::IdleTimeout(_))));
        let sleepy = registry.get(0).await.unwrap();
        assert_eq!(sleepy.lock().await.active, None);
        assert!(matches!(
            read_frame(&mut client).await,
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn overlong_body_is_a_protocol_error() {
        let registry = registry();
        let (mut client, server) = duplex(1024);
        let session =
            Session::new(server, ConnId(1), Arc::clone(&registry), SessionLimits::default());
        let handle = tokio::spawn(session.run());

        write_frame(&mut client, "Alice").await.unwrap();
        assert_eq!(read_frame(&mut client).await.unwrap(), "S");
        write_frame(&mut client, "5").await.unwrap();
        write_frame(&mut client, &"x".repeat(80)).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(RelayError::Frame(FrameError::Protocol(_)))
        ));
        let alice = registry.get(0).await.unwrap();
        let state = alice.lock().await;
        assert_eq!(state.active, None);
        assert!(state.mailbox.is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn duplicate_login_is_refused_and_audited() {
        let registry = registry();
        registry
            .register_if_absent("Alice", Some(ConnId(1)))
            .await
            .unwrap();
        let (mut client, server) = duplex(64);
        let session =
            Session::new(server, ConnId(2), Arc::clone(&registry), SessionLimits::default());

        let client_side = async {
            write_frame(&mut client, "Alice").await.unwrap();
            read_frame(&mut client).await.unwrap()
        };
        let (result, reply) = tokio::join!(session.run(), client_side);

        assert!(result.is_ok());
        assert_eq!(reply, "E");
        assert!(logs_contain("Alice, duplicate log in, force out"));
        let alice = registry.get(0).await.unwrap();
        assert_eq!(alice.lock().await.active, Some(ConnId(1)));
    }

    #[tokio::test]
    async fn empty_login_name_is_rejected() {
        let registry = registry();
        let (mut client, server) = duplex(64);
        let session =
            Session::new(server, ConnId(1), Arc::clone(&registry), SessionLimits::default());
        let handle = tokio::spawn(session.run());

        write_frame(&mut client, "").await.unwrap();
        assert!(handle.await.unwrap().is_err());
        assert_eq!(registry.snapshot_count().await, 0);
    }
}
