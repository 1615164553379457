mod campaign;
mod classify;
mod config;
mod models;
mod replies;
mod sender;
mod source;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use campaign::{RunStats, run_campaign};
use config::Config;
use replies::{FetchQuery, ImapFetcher, scan_replies};
use sender::{NoopSender, SmtpSender};
use store::Tracker;

#[derive(Parser)]
#[command(name = "relance")]
#[command(about = "Candidature outreach - send applications, track replies, plan follow-ups")]
struct Cli {
    /// Path to the config file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dry run over a source list - no sends, no delay
    Test {
        /// CSV or JSON company list
        source: PathBuf,
    },

    /// Send applications to every new target in the source list
    Send {
        /// CSV or JSON company list
        source: PathBuf,

        /// Stop after this many successful sends
        limit: Option<usize>,
    },

    /// List candidatures due for a follow-up
    Relances,

    /// Campaign statistics
    Stats,

    /// Scan the inbox for replies and classify them
    Replies {
        /// Number of days to look back
        #[arg(short, long, default_value = "14")]
        days: u32,

        /// Re-scan every message, including already-recorded replies
        #[arg(long)]
        all: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path)?;
    let mut tracker = Tracker::open(&config.tracker_path())?;

    match cli.command {
        Commands::Test { source } => {
            let companies = source::load_companies(&source)?;
            println!("Mode : DRY RUN (test)\n");
            let stats = run_campaign(&mut tracker, &companies, &NoopSender, &config, true, None)?;
            print_summary(&stats, &tracker);
        }

        Commands::Send { source, limit } => {
            config.validate_credentials()?;
            let companies = source::load_companies(&source)?;
            let smtp = SmtpSender::new(&config)?;
            println!("Mode : ENVOI RÉEL\n");
            let stats = run_campaign(&mut tracker, &companies, &smtp, &config, false, limit)?;
            print_summary(&stats, &tracker);
        }

        Commands::Relances => {
            let today = chrono::Local::now().format("%Y-%m-%d").to_string();
            let due = tracker.due_for_follow_up(&today);
            if due.is_empty() {
                println!("Aucune relance nécessaire aujourd'hui.");
            } else {
                println!("{} candidature(s) à relancer :\n", due.len());
                for c in due {
                    println!(
                        "  • {} ({}) – envoyé le {}",
                        c.company_name, c.contact_email, c.sent_at
                    );
                }
            }
        }

        Commands::Stats => {
            let stats = tracker.stats();
            if stats.total == 0 {
                println!("Aucune candidature enregistrée.");
            } else {
                println!("Total candidatures  : {}", stats.total);
                println!("Envoyées            : {}", stats.sent);
                println!("Réponses reçues     : {}", stats.replied);
                match stats.reply_rate() {
                    Some(rate) => println!("Taux de réponse     : {rate:.1}%"),
                    None => println!("Taux de réponse     : -"),
                }
                println!("Erreurs             : {}", stats.errors);
            }
        }

        Commands::Replies { days, all } => {
            config.validate_credentials()?;
            let fetcher = ImapFetcher::new(&config)?;
            let query = FetchQuery {
                since_days: if all { None } else { Some(days) },
            };
            println!("Recherche des réponses (derniers {days} jours)...\n");
            let stats = scan_replies(&mut tracker, &fetcher, &query, all)?;
            if stats.updated > 0 {
                println!("Tracker mis à jour !");
                println!("   Nouvelles réponses : {}", stats.new_replies);
                println!("   Total mis à jour   : {}", stats.updated);
            } else {
                println!("Aucune nouvelle réponse détectée.");
            }
        }
    }

    Ok(())
}

fn print_summary(stats: &RunStats, tracker: &Tracker) {
    println!("\nRÉSUMÉ DE LA CAMPAGNE");
    println!("  Envoyés  : {}", stats.sent);
    println!("  Ignorés  : {}", stats.skipped);
    println!("  Erreurs  : {}", stats.errors);
    println!("  Tracker  : {}", tracker.path().display());
}
