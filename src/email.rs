//! Email collaborator: named HTML templates rendered by literal `{{key}}`
//! substitution, handed to a pluggable transport.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::SmtpConfig,
    error::{ConfigError, EmailError},
};

/// EmailOptions
///
/// What a caller asks to send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailOptions {
    pub to: String,
    pub subject: String,
    /// Template name, resolved to `<dir>/<template>.html`.
    pub template: String,
    pub variables: BTreeMap<String, Value>,
}

impl EmailOptions {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            template: template.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// OutgoingEmail
///
/// A fully rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// TemplateStore
///
/// Loads templates from a directory on disk.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolves `name` to `<dir>/<name>.html`. Names are single path
    /// components; anything that could leave the directory is rejected.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, EmailError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(EmailError::InvalidTemplateName(name.to_string()));
        }

        Ok(self.dir.join(format!("{name}.html")))
    }

    pub async fn load(&self, name: &str) -> Result<String, EmailError> {
        let path = self.path_for(name)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(EmailError::TemplateNotFound {
                name: name.to_string(),
                path,
            });
        }

        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

/// Stringifies a template variable: strings verbatim, everything else in its
/// JSON text form.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// render_template
///
/// Replaces every `{{key}}` with the stringified value of `key` in a single
/// left-to-right pass. Inserted values are never scanned again, so a value
/// that itself contains `{{other}}` comes out literally. Placeholders without
/// a matching variable are left as they are.
pub fn render_template(template: &str, variables: &BTreeMap<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let inner = &rest[start + 2..];

        let found = inner
            .find("}}")
            .and_then(|end| variables.get(&inner[..end]).map(|value| (end, value)));

        match found {
            Some((end, value)) => {
                out.push_str(&stringify(value));
                rest = &inner[end + 2..];
            }
            // Step over one brace only, so `{{{key}}}` still finds `{{key}}`.
            None => {
                out.push('{');
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// MailTransport
///
/// Delivery contract. The service only renders; a transport only delivers.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

#[async_trait]
impl<T: MailTransport + ?Sized> MailTransport for Arc<T> {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        (**self).deliver(email).await
    }
}

/// SmtpTransport
///
/// Delivers through an SMTP relay with STARTTLS, authenticating when
/// credentials are configured.
#[derive(Clone)]
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Builds the relay client. No connection is made until the first send.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, ConfigError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ConfigError::Smtp(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let message = build_message(&email)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// build_message
///
/// Turns a rendered email into an HTML MIME message.
pub fn build_message(email: &OutgoingEmail) -> Result<Message, EmailError> {
    Message::builder()
        .from(parse_mailbox(&email.from)?)
        .to(parse_mailbox(&email.to)?)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())
        .map_err(|e| EmailError::Message(e.to_string()))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| EmailError::InvalidAddress {
            address: address.to_string(),
            message: e.to_string(),
        })
}

/// MockTransport
///
/// Records every delivered message in memory, or fails every delivery when
/// built with `new_failing`.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    should_fail: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            sent: Arc::default(),
            should_fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        if self.should_fail {
            return Err(EmailError::Transport("mock transport failure".to_string()));
        }

        self.sent
            .lock()
            .map_err(|_| EmailError::Transport("mock transport poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}

/// The service as held in application state, over a type-erased transport.
pub type Mailer = EmailService<Arc<dyn MailTransport>>;

/// EmailService
///
/// Renders a named template with the caller's variables (plus `currentYear`)
/// and hands the result to the transport.
pub struct EmailService<T: MailTransport> {
    templates: TemplateStore,
    transport: T,
    from: String,
}

impl<T: MailTransport> EmailService<T> {
    pub fn new(templates: TemplateStore, transport: T, from: impl Into<String>) -> Self {
        Self {
            templates,
            transport,
            from: from.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Renders `options.template` without sending it.
    pub async fn render(&self, options: &EmailOptions) -> Result<String, EmailError> {
        let template = self.templates.load(&options.template).await?;

        let mut variables = options.variables.clone();
        variables.insert("currentYear".to_string(), Value::from(Utc::now().year()));

        Ok(render_template(&template, &variables))
    }

    /// send_email
    ///
    /// # Errors
    /// `EmailError::TemplateNotFound` for an unknown template, or whatever the
    /// transport reports. Failures are logged and returned to the caller.
    pub async fn send_email(&self, options: EmailOptions) -> Result<(), EmailError> {
        let result = self.try_send(&options).await;

        match &result {
            Ok(()) => tracing::info!(to = %options.to, template = %options.template, "email sent"),
            Err(e) => tracing::error!(to = %options.to, error = %e, "failed to send email"),
        }

        result
    }

    async fn try_send(&self, options: &EmailOptions) -> Result<(), EmailError> {
        let html = self.render(options).await?;

        self.transport
            .deliver(OutgoingEmail {
                from: self.from.clone(),
                to: options.to.clone(),
                subject: options.subject.clone(),
                html,
            })
            .await
    }
}
