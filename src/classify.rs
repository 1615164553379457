use crate::models::Classification;

// Keyword tallies over the lowercased subject + body. Substring
// containment, not word boundaries: "rh" matches inside longer words
// too. Intentionally coarse; ambiguous replies land on neutral and get
// triaged by hand.

const POSITIVE_KEYWORDS: &[&str] = &[
    "entretien",
    "rdv",
    "rendez-vous",
    "rencontrer",
    "disponible",
    "intéressé",
    "profil",
    "cv",
    "curriculum",
    "poste",
    "alternance",
    "planning",
    "interview",
    "échange",
    "discuter",
    "présenter",
    "proposition",
    "opportunité",
    "candidature retenue",
    "suite favorable",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "malheureusement",
    "regret",
    "ne correspond pas",
    "ne convient pas",
    "ne sommes pas en mesure",
    "autre profil",
    "autre candidat",
    "déjà pourvu",
    "clos",
    "refus",
    "ne pas donner suite",
    "ne retenons pas",
    "profil ne correspond pas",
];

/// Classifies a reply from its subject and body.
///
/// Decision order matters: negative wins only when it both outnumbers
/// the positive hits and reaches two of them; then the same rule for
/// positive; everything else (ties, low signal) is neutral.
pub fn classify(subject: &str, body: &str) -> Classification {
    let text = format!("{subject} {body}").to_lowercase();

    let pos_count = POSITIVE_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();
    let neg_count = NEGATIVE_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();

    if neg_count > pos_count && neg_count >= 2 {
        Classification::Negative
    } else if pos_count > neg_count && pos_count >= 2 {
        Classification::Positive
    } else {
        Classification::Neutral
    }
}
