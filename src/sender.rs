use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Config;
use crate::models::Company;

/// Outbound mail collaborator. The campaign treats every failure the
/// same way (record as error, continue), so the variants only need to
/// carry a readable message.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Erreur authentification Gmail – vérifiez le mot de passe d'application")]
    AuthenticationFailed,
    #[error("Email refusé par le serveur : {0}")]
    RecipientRejected(String),
    #[error("{0}")]
    Other(String),
}

pub trait MailSender {
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> Result<(), SendError>;
}

/// Sender for the dry-run path. The runner never invokes it there,
/// but the seam still wants a value.
pub struct NoopSender;

impl MailSender for NoopSender {
    fn send(
        &self,
        _to: &str,
        _subject: &str,
        _body: &str,
        _attachment: Option<&Path>,
    ) -> Result<(), SendError> {
        Ok(())
    }
}

/// SMTP implementation over implicit TLS (port 465), Gmail app
/// password auth.
pub struct SmtpSender {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(config: &Config) -> Result<Self> {
        let from: Mailbox = config
            .gmail_address
            .parse()
            .with_context(|| format!("Invalid sender address: {}", config.gmail_address))?;
        let credentials = Credentials::new(config.gmail_address.clone(), config.app_password()?);
        let transport = SmtpTransport::relay(&config.smtp_server)
            .with_context(|| format!("Failed to set up SMTP relay: {}", config.smtp_server))?
            .credentials(credentials)
            .build();
        Ok(Self { transport, from })
    }

    fn build_message(
        &self,
        to: &Mailbox,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> Result<Message, SendError> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject);

        let message = match attachment {
            Some(path) => {
                let bytes = fs::read(path)
                    .map_err(|e| SendError::Other(format!("Pièce jointe illisible : {e}")))?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "CV.pdf".to_string());
                let content_type = ContentType::parse("application/pdf")
                    .map_err(|e| SendError::Other(e.to_string()))?;
                let cv_part = Attachment::new(filename).body(bytes, content_type);
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(body.to_string()))
                        .singlepart(cv_part),
                )
            }
            None => builder.singlepart(SinglePart::plain(body.to_string())),
        };

        message.map_err(|e| SendError::Other(e.to_string()))
    }
}

impl MailSender for SmtpSender {
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> Result<(), SendError> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|_| SendError::RecipientRejected(to.to_string()))?;
        let message = self.build_message(&to_mailbox, subject, body, attachment)?;
        self.transport
            .send(&message)
            .map(|_| ())
            .map_err(|e| map_smtp_error(to, e))
    }
}

fn map_smtp_error(to: &str, err: lettre::transport::smtp::Error) -> SendError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    // Gmail answers 535 on bad app passwords, 550/553 on bad recipients.
    if lower.contains("535") || lower.contains("authent") || lower.contains("credential") {
        SendError::AuthenticationFailed
    } else if lower.contains("550") || lower.contains("553") || lower.contains("recipient") {
        SendError::RecipientRejected(to.to_string())
    } else {
        SendError::Other(msg)
    }
}

/// The CV attachment path, if the file is present. A missing CV is not
/// fatal: the mail just goes out without it.
pub fn attachment_path(config: &Config) -> Option<PathBuf> {
    let path = config.cv_path();
    path.exists().then_some(path)
}

// --- Message text ---

pub fn generate_subject(config: &Config) -> String {
    format!(
        "Candidature spontanée – {} – {}",
        config.position, config.candidate_name
    )
}

pub fn generate_body(config: &Config, company: &Company) -> String {
    let name = non_empty(&company.name, "l'entreprise");
    let sector = non_empty(&company.sector, "l'informatique");
    let city = non_empty(&company.city, "votre région");
    let reason = if company.reason.trim().is_empty() {
        format!("votre expertise dans {sector} et votre présence à {city}")
    } else {
        company.reason.trim().to_string()
    };

    let mut body = format!(
        "Madame, Monsieur,\n\n\
         Je me permets de vous adresser ma candidature spontanée pour un poste de \
         {} au sein de {name}.\n\n\
         Ce qui m'attire particulièrement chez {name} : {reason}. \
         Vos activités correspondent exactement à l'environnement technique dans lequel \
         je souhaite évoluer et progresser.\n\n\
         Je serais très heureux de vous rencontrer pour vous présenter ma motivation.",
        config.position
    );
    if !config.portfolio_url.is_empty() {
        body.push_str(&format!(
            "\nMon portfolio est disponible à l'adresse : {}",
            config.portfolio_url
        ));
    }
    body.push_str(&format!(
        "\n\nDans l'attente de votre réponse, veuillez agréer, Madame, Monsieur, \
         l'expression de mes salutations les plus respectueuses.\n\n\
         {}\n",
        config.candidate_name
    ));
    body
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { fallback } else { trimmed }
}
