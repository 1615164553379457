use anyhow::{Context, Result};
use chrono::Local;
use rand::Rng;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::models::Company;
use crate::sender::{self, MailSender};
use crate::store::Tracker;

#[derive(Debug, Default, PartialEq)]
pub struct RunStats {
    pub sent: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// One pass over the target list. Each attempt is recorded and the
/// tracker saved before moving on, so an interruption loses at most
/// the in-flight send. Send failures are recorded and the run
/// continues; only a persistence failure aborts.
///
/// In dry-run mode everything happens except the SMTP call and the
/// inter-send pause - records are still appended and saved.
pub fn run_campaign(
    tracker: &mut Tracker,
    companies: &[Company],
    mail_sender: &dyn MailSender,
    config: &Config,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<RunStats> {
    let mut stats = RunStats::default();
    let attachment = sender::attachment_path(config);
    let subject = sender::generate_subject(config);

    for (i, company) in companies.iter().enumerate() {
        if let Some(max) = limit {
            if stats.sent >= max {
                println!("\nLimite de {max} envois atteinte.");
                break;
            }
        }

        let email = company.email_key();
        let name = if company.name.trim().is_empty() {
            format!("Entreprise {}", i + 1)
        } else {
            company.name.trim().to_string()
        };

        if email.is_empty() {
            println!("[{}] {name} – pas d'email, ignorée", i + 1);
            stats.skipped += 1;
            continue;
        }

        if tracker.already_contacted(&email) {
            println!("[{}] {name} – déjà contactée, ignorée", i + 1);
            stats.skipped += 1;
            continue;
        }

        let body = sender::generate_body(config, company);
        let outcome = if dry_run {
            println!("[{}] [DRY RUN] À : {email} – Objet : {subject}", i + 1);
            Ok(())
        } else {
            println!("[{}] Envoi à {name} ({email})...", i + 1);
            mail_sender
                .send(&email, &subject, &body, attachment.as_deref())
                .map_err(|e| e.to_string())
        };

        match &outcome {
            Ok(()) => {
                println!("    envoyé");
                stats.sent += 1;
            }
            Err(message) => {
                println!("    échec : {message}");
                stats.errors += 1;
            }
        }
        tracker.record_attempt(company, outcome, Local::now());
        tracker
            .save()
            .context("Failed to persist the tracker, aborting the run")?;

        // Randomized pause between real sends, Gmail throttles bulk
        // senders. None after the last target or in dry-run.
        if !dry_run && i < companies.len() - 1 {
            let upper = config.delay_max.max(config.delay_min);
            let delay = rand::thread_rng().gen_range(config.delay_min..=upper);
            println!("    attente {delay}s avant le prochain envoi...");
            thread::sleep(Duration::from_secs(delay));
        }
    }

    Ok(stats)
}
