use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{Candidature, Classification, Company, Status};

/// Persisted tracker: every outreach attempt ever made, in insertion
/// order, stored as a single JSON document. Callers load the whole
/// document, mutate in memory, and save it back; there is no partial
/// update API. Not safe for concurrent writers - at most one process
/// should run a campaign or reply scan against a given file.
pub struct Tracker {
    doc: TrackerDoc,
    path: PathBuf,
}

#[derive(Default, Serialize, Deserialize)]
struct TrackerDoc {
    candidatures: Vec<Candidature>,
}

#[derive(Debug, Default, PartialEq)]
pub struct TrackerStats {
    pub total: usize,
    pub sent: usize,
    pub replied: usize,
    pub errors: usize,
}

impl TrackerStats {
    /// Replies over records still counted as sent, in percent.
    /// None when nothing has been sent.
    pub fn reply_rate(&self) -> Option<f64> {
        if self.sent == 0 {
            None
        } else {
            Some(self.replied as f64 / self.sent as f64 * 100.0)
        }
    }
}

impl Tracker {
    /// Opens the tracker at `path`. A missing file is an empty tracker,
    /// never an error.
    pub fn open(path: &Path) -> Result<Self> {
        let doc = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read tracker: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Tracker is not valid JSON: {}", path.display()))?
        } else {
            TrackerDoc::default()
        };
        Ok(Self {
            doc,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "relance") {
            proj_dirs.data_dir().join("candidatures.json")
        } else {
            PathBuf::from("candidatures.json")
        }
    }

    /// Rewrites the whole document. Write-to-temp-then-rename: a crash
    /// mid-write leaves the previous document intact, never a truncated
    /// one. Non-ASCII text is kept as-is (no \u escapes).
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes())
            .with_context(|| format!("Failed to write tracker: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace tracker: {}", self.path.display()))?;
        Ok(())
    }

    pub fn records(&self) -> &[Candidature] {
        &self.doc.candidatures
    }

    // --- Lifecycle ---

    /// Appends a record for one attempt. `outcome` is Ok for a
    /// delivered email, Err with the failure reason otherwise. The
    /// follow-up date is set to now + 14 days on every record, error
    /// ones included.
    pub fn record_attempt(
        &mut self,
        company: &Company,
        outcome: Result<(), String>,
        now: DateTime<Local>,
    ) -> &Candidature {
        let (status, error_detail) = match outcome {
            Ok(()) => (Status::Sent, String::new()),
            Err(reason) => (Status::Error, reason),
        };
        let record = Candidature {
            id: self.doc.candidatures.len() as u64 + 1,
            sent_at: now.format("%Y-%m-%d %H:%M").to_string(),
            company_name: company.name.trim().to_string(),
            contact_email: company.email_key(),
            city: company.city.trim().to_string(),
            sector: company.sector.trim().to_string(),
            status,
            error_detail,
            follow_up_due: (now + Duration::days(14)).format("%Y-%m-%d").to_string(),
            reply_received_at: String::new(),
            reply_notes: String::new(),
            reply_seen: false,
        };
        self.doc.candidatures.push(record);
        self.doc.candidatures.last().unwrap()
    }

    /// Records still waiting on an answer whose follow-up date has
    /// passed. `today` is "YYYY-MM-DD"; ISO dates compare
    /// lexicographically so a plain string compare is enough.
    pub fn due_for_follow_up(&self, today: &str) -> Vec<&Candidature> {
        self.doc
            .candidatures
            .iter()
            .filter(|c| {
                c.status == Status::Sent
                    && c.reply_received_at.is_empty()
                    && c.follow_up_due.as_str() <= today
            })
            .collect()
    }

    /// Stores a classified reply on the record at `index`. Returns true
    /// when this reply had not been counted before (first discovery),
    /// false on a rescan of an already-known reply.
    pub fn apply_reply(
        &mut self,
        index: usize,
        classification: Classification,
        received_at: &str,
        subject: &str,
        body: &str,
    ) -> bool {
        let record = &mut self.doc.candidatures[index];
        record.status = classification.status();
        record.reply_received_at = format!("Reçu le {received_at}");
        let snippet: String = body.chars().take(300).collect();
        record.reply_notes = format!("{subject}\n\n{snippet}...");
        if record.reply_seen {
            false
        } else {
            record.reply_seen = true;
            true
        }
    }

    // --- Dedup ---

    /// True when any record for this address (case-insensitive) ended
    /// in something other than `error`. A failed send never blocks a
    /// retry.
    pub fn already_contacted(&self, email: &str) -> bool {
        let key = email.trim().to_lowercase();
        self.doc
            .candidatures
            .iter()
            .any(|c| c.contact_email == key && c.status != Status::Error)
    }

    /// Lookup index for the reply scan: lowercase contact email to
    /// record position. Later records win when an address was retried.
    pub fn contacted_index(&self) -> HashMap<String, usize> {
        let mut map = HashMap::new();
        for (i, c) in self.doc.candidatures.iter().enumerate() {
            if !c.contact_email.is_empty() {
                map.insert(c.contact_email.clone(), i);
            }
        }
        map
    }

    // --- Stats ---

    pub fn stats(&self) -> TrackerStats {
        let mut stats = TrackerStats {
            total: self.doc.candidatures.len(),
            ..Default::default()
        };
        for c in &self.doc.candidatures {
            if c.status == Status::Sent {
                stats.sent += 1;
            }
            if c.status == Status::Error {
                stats.errors += 1;
            }
            if !c.reply_received_at.is_empty() {
                stats.replied += 1;
            }
        }
        stats
    }
}

/// Whether the reply scan should look at this record again. Once a
/// reply is recorded the record is skipped unless a full rescan is
/// forced, so a manually corrected classification survives later runs.
pub fn should_rescan_reply(record: &Candidature, force_all: bool) -> bool {
    force_all || record.reply_received_at.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn company(name: &str, email: &str) -> Company {
        Company {
            name: name.to_string(),
            email: email.to_string(),
            city: "Nantes".to_string(),
            sector: "informatique".to_string(),
            reason: String::new(),
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    fn empty_tracker(dir: &tempfile::TempDir) -> Tracker {
        Tracker::open(&dir.path().join("candidatures.json")).unwrap()
    }

    #[test]
    fn missing_file_is_empty_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = empty_tracker(&dir);
        assert!(tracker.records().is_empty());
    }

    #[test]
    fn record_attempt_sets_follow_up_even_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = empty_tracker(&dir);

        tracker.record_attempt(&company("Acme", "RH@Acme.fr"), Ok(()), now());
        tracker.record_attempt(
            &company("Bidule", "contact@bidule.fr"),
            Err("Email refusé par le serveur".to_string()),
            now(),
        );

        let records = tracker.records();
        assert_eq!(records[0].id, 1);
        assert_eq!(records[0].status, Status::Sent);
        assert_eq!(records[0].contact_email, "rh@acme.fr");
        assert_eq!(records[0].sent_at, "2026-03-01 09:30");
        assert_eq!(records[0].follow_up_due, "2026-03-15");
        assert!(records[0].error_detail.is_empty());

        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].status, Status::Error);
        assert_eq!(records[1].error_detail, "Email refusé par le serveur");
        // Errored attempts keep a follow-up date too.
        assert_eq!(records[1].follow_up_due, "2026-03-15");
    }

    #[test]
    fn already_contacted_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = empty_tracker(&dir);
        tracker.record_attempt(&company("Acme", "rh@acme.fr"), Ok(()), now());

        assert!(tracker.already_contacted("rh@acme.fr"));
        assert!(tracker.already_contacted("RH@ACME.FR"));
        assert!(!tracker.already_contacted("autre@acme.fr"));
    }

    #[test]
    fn error_record_does_not_block_retry() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = empty_tracker(&dir);
        tracker.record_attempt(
            &company("Acme", "rh@acme.fr"),
            Err("timeout".to_string()),
            now(),
        );

        assert!(!tracker.already_contacted("rh@acme.fr"));

        tracker.record_attempt(&company("Acme", "rh@acme.fr"), Ok(()), now());
        assert!(tracker.already_contacted("rh@acme.fr"));
    }

    #[test]
    fn due_for_follow_up_filters_on_status_reply_and_date() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = empty_tracker(&dir);
        tracker.record_attempt(&company("Due", "due@a.fr"), Ok(()), now());
        tracker.record_attempt(&company("Erreur", "err@a.fr"), Err("x".to_string()), now());
        tracker.record_attempt(&company("Répondu", "rep@a.fr"), Ok(()), now());
        let idx = tracker.contacted_index()["rep@a.fr"];
        tracker.apply_reply(
            idx,
            Classification::Neutral,
            "2026-03-05 10:00",
            "Re: Candidature",
            "Bien reçu",
        );

        // Due date == today is included.
        let due = tracker.due_for_follow_up("2026-03-15");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].contact_email, "due@a.fr");

        // Before the due date, nothing.
        assert!(tracker.due_for_follow_up("2026-03-14").is_empty());

        // A reply excludes the record regardless of date.
        assert!(
            tracker
                .due_for_follow_up("2027-01-01")
                .iter()
                .all(|c| c.contact_email != "rep@a.fr")
        );
    }

    #[test]
    fn apply_reply_reports_first_discovery_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = empty_tracker(&dir);
        tracker.record_attempt(&company("Acme", "rh@acme.fr"), Ok(()), now());

        let first = tracker.apply_reply(
            0,
            Classification::Positive,
            "2026-03-04 14:02",
            "Entretien",
            "Nous souhaitons vous recevoir",
        );
        assert!(first);

        let record = &tracker.records()[0];
        assert_eq!(record.status, Status::ReplyPositive);
        assert_eq!(record.reply_received_at, "Reçu le 2026-03-04 14:02");
        assert!(record.reply_notes.starts_with("Entretien\n\n"));
        assert!(record.reply_seen);

        // Rescan of the same record is not a new discovery.
        let again = tracker.apply_reply(
            0,
            Classification::Positive,
            "2026-03-04 14:02",
            "Entretien",
            "Nous souhaitons vous recevoir",
        );
        assert!(!again);
    }

    #[test]
    fn should_rescan_only_unanswered_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = empty_tracker(&dir);
        tracker.record_attempt(&company("Acme", "rh@acme.fr"), Ok(()), now());

        assert!(should_rescan_reply(&tracker.records()[0], false));

        tracker.apply_reply(0, Classification::Neutral, "2026-03-04 14:02", "Re", "ok");
        assert!(!should_rescan_reply(&tracker.records()[0], false));
        assert!(should_rescan_reply(&tracker.records()[0], true));
    }

    #[test]
    fn save_load_round_trip_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidatures.json");
        let mut tracker = Tracker::open(&path).unwrap();
        tracker.record_attempt(&company("Société Générale", "rh@sté.fr"), Ok(()), now());
        tracker.save().unwrap();

        let first = fs::read(&path).unwrap();
        // Accents survive the encoding.
        assert!(String::from_utf8(first.clone()).unwrap().contains("Société"));

        let reloaded = Tracker::open(&path).unwrap();
        reloaded.save().unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidatures.json");
        let mut tracker = Tracker::open(&path).unwrap();
        tracker.record_attempt(&company("Acme", "rh@acme.fr"), Ok(()), now());
        tracker.save().unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["candidatures.json"]);
    }

    #[test]
    fn stats_counts_follow_status_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = empty_tracker(&dir);
        tracker.record_attempt(&company("A", "a@a.fr"), Ok(()), now());
        tracker.record_attempt(&company("B", "b@b.fr"), Ok(()), now());
        tracker.record_attempt(&company("C", "c@c.fr"), Err("x".to_string()), now());
        tracker.apply_reply(1, Classification::Negative, "2026-03-05 08:00", "Re", "non");

        let stats = tracker.stats();
        assert_eq!(stats.total, 3);
        // The replied record left the sent count when its status flipped.
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.replied, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.reply_rate(), Some(100.0));
    }
}
