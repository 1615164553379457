use anyhow::{Context, Result, anyhow};
use mailparse::MailHeaderMap;
use regex::Regex;

use crate::classify::classify;
use crate::config::Config;
use crate::models::MessageSummary;
use crate::store::{Tracker, should_rescan_reply};

/// Inbox search filter for the reply scan.
#[derive(Debug, Clone, Copy)]
pub struct FetchQuery {
    /// Only messages newer than this many days; None scans everything.
    pub since_days: Option<u32>,
}

/// Inbound mail collaborator: returns one summary per message,
/// newest-first ordering not guaranteed.
pub trait MailFetcher {
    fn search(&self, query: &FetchQuery) -> Result<Vec<MessageSummary>>;
}

#[derive(Debug, Default)]
pub struct ScanStats {
    pub messages: usize,
    pub updated: usize,
    pub new_replies: usize,
}

/// Matches fetched messages against contacted companies, classifies
/// them and updates the tracker. Records that already carry a reply
/// are left alone unless `force_all` is set, so a hand-corrected
/// classification is never overwritten by accident.
pub fn scan_replies(
    tracker: &mut Tracker,
    fetcher: &dyn MailFetcher,
    query: &FetchQuery,
    force_all: bool,
) -> Result<ScanStats> {
    let mut stats = ScanStats::default();

    let contacted = tracker.contacted_index();
    if contacted.is_empty() {
        println!("Aucune candidature envoyée dans le tracker.");
        return Ok(stats);
    }

    let messages = fetcher.search(query)?;
    stats.messages = messages.len();

    for message in &messages {
        let Some(&index) = contacted.get(&message.sender_email) else {
            continue;
        };
        if !should_rescan_reply(&tracker.records()[index], force_all) {
            continue;
        }

        let classification = classify(&message.subject, &message.body_snippet);
        let first_time = tracker.apply_reply(
            index,
            classification,
            &message.date,
            &message.subject,
            &message.body_snippet,
        );

        let record = &tracker.records()[index];
        println!("{}", record.company_name);
        println!("   De: {}", message.sender_email);
        println!("   Objet: {}", message.subject);
        println!("   Type: {}\n", classification.label());

        stats.updated += 1;
        if first_time {
            stats.new_replies += 1;
        }
    }

    if stats.updated > 0 {
        tracker.save()?;
    }
    Ok(stats)
}

/// IMAP implementation of the fetcher, Gmail app-password auth.
pub struct ImapFetcher {
    server: String,
    port: u16,
    username: String,
    password: String,
}

impl ImapFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            server: config.imap_server.clone(),
            port: config.imap_port,
            username: config.gmail_address.clone(),
            password: config.app_password()?,
        })
    }
}

impl MailFetcher for ImapFetcher {
    fn search(&self, query: &FetchQuery) -> Result<Vec<MessageSummary>> {
        let tls = native_tls::TlsConnector::builder().build()?;

        let addr = (self.server.as_str(), self.port);
        let tcp = std::net::TcpStream::connect(addr)
            .context("Failed to connect to IMAP server")?;
        tcp.set_read_timeout(Some(std::time::Duration::from_secs(30)))?;
        tcp.set_write_timeout(Some(std::time::Duration::from_secs(30)))?;
        let tls_stream = tls.connect(&self.server, tcp)?;

        let client = imap::Client::new(tls_stream);
        let mut session = client
            .login(&self.username, &self.password)
            .map_err(|e| anyhow!("Login failed: {}", e.0))?;

        session.select("INBOX")?;

        let imap_query = match query.since_days {
            Some(days) => {
                let since = chrono::Local::now() - chrono::Duration::days(days as i64);
                format!("SINCE {}", since.format("%d-%b-%Y"))
            }
            None => "ALL".to_string(),
        };

        let message_ids = session.search(&imap_query)?;

        let mut summaries = Vec::new();
        for id in message_ids {
            let messages = session.fetch(id.to_string(), "RFC822")?;
            for message in messages.iter() {
                if let Some(raw) = message.body() {
                    match parse_message(raw) {
                        Ok(summary) => summaries.push(summary),
                        Err(e) => eprintln!("  Error parsing message {id}: {e}"),
                    }
                }
            }
        }

        session.logout()?;
        Ok(summaries)
    }
}

fn parse_message(raw: &[u8]) -> Result<MessageSummary> {
    let parsed = mailparse::parse_mail(raw)?;

    let from = parsed.headers.get_first_value("From").unwrap_or_default();
    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
    let date_header = parsed.headers.get_first_value("Date").unwrap_or_default();

    let body: String = get_text_body(&parsed)?.chars().take(500).collect();

    Ok(MessageSummary {
        sender_email: extract_address(&from)?,
        subject,
        date: format_date(&date_header),
        body_snippet: body,
    })
}

/// Pulls the bare address out of a From header like
/// `"Acme RH" <rh@acme.fr>`.
fn extract_address(from: &str) -> Result<String> {
    let re = Regex::new(r"<(.+?)>")?;
    let addr = match re.captures(from) {
        Some(caps) => caps[1].to_string(),
        None => from.to_string(),
    };
    Ok(addr.trim().to_lowercase())
}

fn format_date(header: &str) -> String {
    match mailparse::dateparse(header) {
        Ok(epoch) => chrono::DateTime::from_timestamp(epoch, 0)
            .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()),
        Err(_) => chrono::Local::now().format("%Y-%m-%d %H:%M").to_string(),
    }
}

fn get_text_body(parsed: &mailparse::ParsedMail) -> Result<String> {
    if parsed.subparts.is_empty() {
        return Ok(parsed.get_body()?);
    }

    // Multipart: prefer plain text, the classifier works on raw text.
    for part in &parsed.subparts {
        let content_type = part
            .headers
            .get_first_value("Content-Type")
            .unwrap_or_default();
        if content_type.contains("text/plain") {
            return Ok(part.get_body()?);
        }
    }

    if let Some(part) = parsed.subparts.first() {
        return Ok(part.get_body()?);
    }

    Err(anyhow!("No message body found"))
}
