//! Interactive menu for the `chat` subcommand. One menu choice becomes one request to the relay.

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, Lines};

use crate::core::client::{split_lines, RelayClient};
use crate::utils::constants::{DEFAULT_MAX_BODY_LEN, DEFAULT_MAX_NAME_LEN};
use crate::utils::enums::{Command, LoginReply};

pub struct Shell<I, O> {
    input: Lines<I>,
    output: O,
}

impl<I, O> Shell<I, O>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    pub fn new(input: I, output: O) -> Self {
        Self {
            input: input.lines(),
            output,
        }
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    //None once stdin is closed
    async fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        self.say(text).await?;
        Ok(self.input.next_line().await?)
    }

    async fn show_menu(&mut self) -> Result<()> {
        let mut menu = String::from("\n");
        for command in Command::ALL {
            menu.push_str(&format!("{}. {}\n", command.as_wire(), command.describe()));
        }
        self.say(&menu).await
    }

    pub async fn run<S>(mut self, mut client: RelayClient<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let name = loop {
            match self.prompt("Enter your name: ").await? {
                Some(name) if !name.trim().is_empty() => {
                    break clip(name.trim(), DEFAULT_MAX_NAME_LEN)
                }
                Some(_) => continue,
                None => return Ok(()),
            }
        };
        if client.login(&name).await.context("log in failed")? == LoginReply::Rejected {
            self.say("User already log in!\n").await?;
            bail!("{} is already logged in", name);
        }

        loop {
            self.show_menu().await?;
            let line = match self.prompt("Enter your choice: ").await? {
                Some(line) => line,
                None => break,
            };
            let choice = match line.trim().chars().next() {
                Some(c) => c,
                None => continue,
            };
            let command = match choice.to_string().parse::<Command>() {
                Ok(command) => command,
                Err(_) => {
                    self.say(&format!("{}, Invalid command, retry!\n", choice)).await?;
                    continue;
                }
            };

            match command {
                Command::ListKnown => {
                    let names = client.known_users().await?;
                    self.say(&numbered("\nKnown users:\n", "", &names)).await?;
                }
                Command::ListConnected => {
                    let names = client.connected_users().await?;
                    self.say(&numbered("\nCurrently connected users:\n", "", &names)).await?;
                }
                Command::SendTo => {
                    let Some(recipient) = self.prompt("Enter recipient's name: ").await? else {
                        break;
                    };
                    let recipient = clip(recipient.trim(), DEFAULT_MAX_NAME_LEN);
                    if recipient.is_empty() {
                        self.say("Recipient name can't be empty\n").await?;
                        continue;
                    }
                    let Some(body) = self.prompt("Enter a message: ").await? else {
                        break;
                    };
                    client.send_to(&recipient, &clip(&body, DEFAULT_MAX_BODY_LEN)).await?;
                }
                Command::SendConnected | Command::SendAll => {
                    let Some(body) = self.prompt("Enter a message: ").await? else {
                        break;
                    };
                    let body = clip(&body, DEFAULT_MAX_BODY_LEN);
                    if command == Command::SendConnected {
                        client.send_connected(&body).await?;
                    } else {
                        client.send_all(&body).await?;
                    }
                }
                Command::Fetch => {
                    let block = client.fetch_messages().await?;
                    let lines = split_lines(&block);
                    if lines.is_empty() {
                        self.say("\nYour messages:\n  No messages.\n").await?;
                    } else {
                        self.say(&numbered("\nYour messages:\n", "From ", &lines)).await?;
                    }
                }
                Command::Exit => break,
            }
        }

        client.exit().await?;
        Ok(())
    }
}

fn numbered(header: &str, prefix: &str, lines: &[String]) -> String {
    let mut out = String::from(header);
    for (i, line) in lines.iter().enumerate() {
        out.push_str(&format!("  {}. {}{}\n", i + 1, prefix, line));
    }
    out
}

//Cuts at a char boundary so the frame never exceeds what the server accepts
fn clip(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
