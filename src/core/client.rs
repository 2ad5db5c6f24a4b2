use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::core::codec::{read_frame, write_frame};
use crate::utils::enums::{Command, LoginReply};
use crate::utils::errors::{RelayError, Result};

/// Client side of the relay protocol. Each method is one request and, for the queries, its reply.
#[derive(Debug)]
pub struct RelayClient<S = TcpStream> {
    stream: S,
}

impl RelayClient<TcpStream> {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to {}", stream.peer_addr()?);
        Ok(Self::new(stream))
    }
}

impl<S> RelayClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub async fn login(&mut self, name: &str) -> Result<LoginReply> {
        write_frame(&mut self.stream, name).await?;
        let reply = read_frame(&mut self.stream).await?;
        reply
            .parse::<LoginReply>()
            .map_err(|_| RelayError::UnexpectedReply(reply))
    }

    async fn request(&mut self, command: Command, args: &[&str]) -> Result<Option<String>> {
        debug!("Sending command {}", command);
        write_frame(&mut self.stream, command.as_wire()).await?;
        for arg in args {
            write_frame(&mut self.stream, arg).await?;
        }
        if command.has_response() {
            Ok(Some(read_frame(&mut self.stream).await?))
        } else {
            Ok(None)
        }
    }

    async fn query(&mut self, command: Command) -> Result<String> {
        Ok(self.request(command, &[]).await?.unwrap_or_default())
    }

    pub async fn known_users(&mut self) -> Result<Vec<String>> {
        Ok(split_lines(&self.query(Command::ListKnown).await?))
    }

    pub async fn connected_users(&mut self) -> Result<Vec<String>> {
        Ok(split_lines(&self.query(Command::ListConnected).await?))
    }

    pub async fn send_to(&mut self, recipient: &str, body: &str) -> Result<()> {
        self.request(Command::SendTo, &[recipient, body]).await?;
        Ok(())
    }

    pub async fn send_connected(&mut self, body: &str) -> Result<()> {
        self.request(Command::SendConnected, &[body]).await?;
        Ok(())
    }

    pub async fn send_all(&mut self, body: &str) -> Result<()> {
        self.request(Command::SendAll, &[body]).await?;
        Ok(())
    }

    /// Drains the mailbox. Returns the raw block, one `sender, time, body` line per message.
    pub async fn fetch_messages(&mut self) -> Result<String> {
        self.query(Command::Fetch).await
    }

    pub async fn exit(mut self) -> Result<()> {
        self.request(Command::Exit, &[]).await?;
        let _ = self.stream.shutdown().await;
        Ok(())
    }

    //Escape hatch for exercising the server with arbitrary frames
    pub async fn send_raw(&mut self, content: &str) -> Result<()> {
        write_frame(&mut self.stream, content).await?;
        Ok(())
    }

    pub async fn recv_raw(&mut self) -> Result<String> {
        Ok(read_frame(&mut self.stream).await?)
    }
}

pub fn split_lines(block: &str) -> Vec<String> {
    block.lines().map(str::to_string).collect()
}
