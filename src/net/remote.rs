//! Talking to other machines: HTTP downloads and SMTP mail.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{Message, SmtpTransport, Transport};
use tempfile::Builder;
use tracing::{debug, warn};

use crate::error::SyError;
use crate::{path, Result};

/// Port used when none is given.
pub const DEFAULT_MAIL_PORT: u16 = 25;

const DEFAULT_MAIL_HOST: &str = "localhost";
const DEFAULT_MAIL_TIMEOUT: Duration = Duration::from_secs(60);

/// Download `url` to `target`.
///
/// The body is written to a temporary file next to `target` and renamed
/// into place once complete, so a failed transfer leaves no partial file.
/// Returns the number of bytes written.
///
/// ```no_run
/// # async fn demo() -> sy::Result<()> {
/// sy::net::download("https://example.org/pkg.tar.gz", "/tmp/pkg.tar.gz").await?;
/// # Ok(())
/// # }
/// ```
pub async fn download(url: &str, target: impl AsRef<Path>) -> Result<u64> {
    let client = reqwest::Client::builder().build()?;
    download_with(&client, url, target).await
}

/// [`download`] with a caller-supplied client (proxy, TLS or timeout
/// settings).
pub async fn download_with(
    client: &reqwest::Client,
    url: &str,
    target: impl AsRef<Path>,
) -> Result<u64> {
    let target = target.as_ref();
    let mut response = client.get(url).send().await?.error_for_status()?;

    let dir = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = Builder::new().prefix(".download").tempfile_in(dir)?;

    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        tmp.write_all(&chunk)?;
        written += chunk.len() as u64;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;

    debug!(url, target = %target.display(), bytes = written, "downloaded");
    Ok(written)
}

/// A plain-text mail with optional file attachments, sent over SMTP.
///
/// ```no_run
/// use sy::net::Mail;
///
/// Mail::new(["ops@example.org"], "backup failed", "see attached log")
///     .attach("/var/log/backup.log")
///     .send()?;
/// # Ok::<(), sy::SyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Mail {
    to: Vec<String>,
    subject: String,
    body: String,
    sender: Option<String>,
    attachments: Vec<PathBuf>,
    host: String,
    port: u16,
    timeout: Duration,
}

impl Mail {
    /// Create a mail to `to` with a subject and body.
    pub fn new<I, S>(to: I, subject: impl Into<String>, body: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            to: to.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            body: body.into(),
            sender: None,
            attachments: Vec::new(),
            host: DEFAULT_MAIL_HOST.to_string(),
            port: DEFAULT_MAIL_PORT,
            timeout: DEFAULT_MAIL_TIMEOUT,
        }
    }

    /// Set the From address. Defaults to `<user>@<hostname>`.
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Attach a file. Paths that are not regular files are skipped with a
    /// warning when the message is built.
    pub fn attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    /// Set the mail server.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the mail server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the SMTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the MIME message without sending it.
    pub fn message(&self) -> Result<Message> {
        if self.to.is_empty() {
            return Err(SyError::Mail("no recipients".to_string()));
        }
        let sender = match self.sender {
            Some(ref sender) => sender.clone(),
            None => default_sender()?,
        };

        let mut builder = Message::builder()
            .from(mailbox(&sender)?)
            .subject(self.subject.as_str());
        for to in &self.to {
            builder = builder.to(mailbox(to)?);
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(self.body.clone()));
        for path in &self.attachments {
            if !path.is_file() {
                warn!(path = %path.display(), "attachment is not a file");
                continue;
            }
            parts = parts.singlepart(attachment(path)?);
        }
        builder.multipart(parts).map_err(mail_error)
    }

    /// Build and deliver the mail.
    pub fn send(&self) -> Result<()> {
        let message = self.message()?;
        let mailer = SmtpTransport::builder_dangerous(self.host.as_str())
            .port(self.port)
            .timeout(Some(self.timeout))
            .build();
        mailer.send(&message).map_err(mail_error)?;
        debug!(to = ?self.to, subject = %self.subject, host = %self.host, "mail sent");
        Ok(())
    }
}

fn default_sender() -> Result<String> {
    let user = path::current_user()?;
    let host = hostname::get()?;
    Ok(format!("{user}@{}", host.to_string_lossy()))
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| SyError::Mail(format!("bad address {address:?}: {e}")))
}

fn attachment(path: &Path) -> Result<SinglePart> {
    let content = fs::read(path)?;
    let content_type = if std::str::from_utf8(&content).is_ok() {
        ContentType::TEXT_PLAIN
    } else {
        ContentType::parse("application/octet-stream")
            .map_err(|_| SyError::Mail("invalid content type".to_string()))?
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Attachment::new(name).body(content, content_type))
}

fn mail_error(e: impl std::fmt::Display) -> SyError {
    SyError::Mail(e.to_string())
}
