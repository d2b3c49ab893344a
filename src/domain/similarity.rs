//! Duplicate screening for newly filed complaints
//!
//! Descriptions are compared with TF-IDF weighted cosine similarity fitted on
//! the pair being compared (smoothed IDF, L2-normalised vectors, English stop
//! words removed, tokens of two or more word characters).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use super::{haversine_m, Complaint, ComplaintId, ReviewFlag};

/// At or above this score a complaint is linked as a duplicate.
pub const DUPLICATE_THRESHOLD: f64 = 0.75;
/// At or above this score a complaint is flagged for review.
pub const POSSIBLE_THRESHOLD: f64 = 0.6;
/// Only complaints within this radius are candidates.
pub const CANDIDATE_RADIUS_M: f64 = 100.0;
/// Only complaints filed within this many days are candidates.
pub const CANDIDATE_WINDOW_DAYS: i64 = 7;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "amoungst",
    "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere",
    "are", "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "bill", "both", "bottom", "but", "by", "call", "can", "cannot", "cant", "co", "con",
    "could", "couldnt", "cry", "de", "describe", "detail", "do", "done", "down", "due", "during",
    "each", "eg", "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc",
    "even", "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
    "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty", "found",
    "four", "from", "front", "full", "further", "get", "give", "go", "had", "has", "hasnt", "have",
    "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself",
    "him", "himself", "his", "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed",
    "interest", "into", "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least",
    "less", "ltd", "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more",
    "moreover", "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely",
    "neither", "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor",
    "not", "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed", "seeming",
    "seems", "serious", "several", "she", "should", "show", "side", "since", "sincere", "six",
    "sixty", "so", "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
    "still", "such", "system", "take", "ten", "than", "that", "the", "their", "them", "themselves",
    "then", "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon",
    "these", "they", "thick", "thin", "third", "this", "those", "though", "three", "through",
    "throughout", "thru", "thus", "to", "together", "too", "top", "toward", "towards", "twelve",
    "twenty", "two", "un", "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well",
    "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
    "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet",
    "you", "your", "yours", "yourself", "yourselves",
];

fn tokenize(text: &str) -> Vec<String> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .filter(|t| !stop.contains(t.as_str()))
        .collect()
}

fn tfidf_vector(tokens: &[String], idf: &HashMap<&str, f64>) -> HashMap<String, f64> {
    let mut tf: HashMap<String, f64> = HashMap::new();
    for t in tokens {
        *tf.entry(t.clone()).or_default() += 1.0;
    }
    for (term, weight) in tf.iter_mut() {
        *weight *= idf.get(term.as_str()).copied().unwrap_or(1.0);
    }
    let norm = tf.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for weight in tf.values_mut() {
            *weight /= norm;
        }
    }
    tf
}

/// Cosine similarity of two texts in `0.0..=1.0`.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let docs = [&ta, &tb];
    let n = docs.len() as f64;
    let mut df: HashMap<&str, f64> = HashMap::new();
    for doc in docs {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for term in unique {
            *df.entry(term).or_default() += 1.0;
        }
    }
    let idf: HashMap<&str, f64> = df
        .into_iter()
        .map(|(term, d)| (term, ((1.0 + n) / (1.0 + d)).ln() + 1.0))
        .collect();

    let va = tfidf_vector(&ta, &idf);
    let vb = tfidf_vector(&tb, &idf);
    let dot: f64 = va
        .iter()
        .filter_map(|(term, w)| vb.get(term).map(|w2| w * w2))
        .sum();
    dot.clamp(0.0, 1.0)
}

/// Result of screening a new complaint against recent nearby ones.
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateVerdict {
    Unique,
    Flagged {
        flag: ReviewFlag,
        parent: ComplaintId,
        score: f64,
    },
}

impl DuplicateVerdict {
    pub fn flag(&self) -> Option<ReviewFlag> {
        match self {
            DuplicateVerdict::Unique => None,
            DuplicateVerdict::Flagged { flag, .. } => Some(*flag),
        }
    }

    pub fn parent(&self) -> Option<ComplaintId> {
        match self {
            DuplicateVerdict::Unique => None,
            DuplicateVerdict::Flagged { parent, .. } => Some(*parent),
        }
    }
}

/// Whether `other` is eligible to be the parent of a complaint filed at the
/// given place and time. Confirmed duplicates never are; possible duplicates
/// keep their link for review but stay in the pool.
pub fn is_candidate(other: &Complaint, latitude: f64, longitude: f64, now: DateTime<Utc>) -> bool {
    other.review_flag != Some(ReviewFlag::Duplicate)
        && other.created_at >= now - Duration::days(CANDIDATE_WINDOW_DAYS)
        && haversine_m(latitude, longitude, other.latitude, other.longitude) <= CANDIDATE_RADIUS_M
}

/// Screen a description against candidate complaints.
pub fn detect_duplicate(description: &str, candidates: &[Complaint]) -> DuplicateVerdict {
    let best = candidates
        .iter()
        .map(|c| (c.id, text_similarity(description, &c.description)))
        .fold(None::<(ComplaintId, f64)>, |best, (id, score)| match best {
            Some((_, s)) if s >= score => best,
            _ => Some((id, score)),
        });

    match best {
        Some((parent, score)) if score >= DUPLICATE_THRESHOLD => DuplicateVerdict::Flagged {
            flag: ReviewFlag::Duplicate,
            parent,
            score,
        },
        Some((parent, score)) if score >= POSSIBLE_THRESHOLD => DuplicateVerdict::Flagged {
            flag: ReviewFlag::PossibleDuplicate,
            parent,
            score,
        },
        _ => DuplicateVerdict::Unique,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComplaintStatus, PriorityLevel, UserId};

    fn complaint(id: i64, description: &str, lat: f64, lng: f64, age_days: i64) -> Complaint {
        let created = Utc::now() - Duration::days(age_days);
        Complaint {
            id: ComplaintId(id),
            title: "t".into(),
            description: description.into(),
            issue_type: "pothole".into(),
            image: "x.png".into(),
            latitude: lat,
            longitude: lng,
            area: "1".into(),
            status: ComplaintStatus::Pending,
            upvote_count: 0,
            created_by: UserId(1),
            officer_id: None,
            proof: None,
            priority_score: 0.0,
            priority_level: PriorityLevel::Low,
            duplicate_of: None,
            review_flag: None,
            created_at: created,
            updated_at: created,
            resolved_at: None,
            verified_at: None,
        }
    }

    #[test]
    fn identical_text_is_fully_similar() {
        let s = text_similarity("Large pothole causing traffic", "large pothole causing TRAFFIC");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_text_is_dissimilar() {
        assert_eq!(text_similarity("garbage pile", "broken streetlight"), 0.0);
        assert_eq!(text_similarity("the a an", "pothole"), 0.0);
    }

    #[test]
    fn detects_duplicate_and_unique() {
        let existing = vec![
            complaint(1, "Garbage not collected for a week", 12.9, 77.6, 1),
            complaint(2, "Large pothole causing traffic on 5th", 12.9, 77.6, 1),
        ];
        let verdict = detect_duplicate("Large pothole causing traffic on 5th", &existing);
        assert_eq!(verdict.flag(), Some(ReviewFlag::Duplicate));
        assert_eq!(verdict.parent(), Some(ComplaintId(2)));

        assert_eq!(
            detect_duplicate("Streetlight flickering at night", &existing),
            DuplicateVerdict::Unique
        );
        assert_eq!(detect_duplicate("anything", &[]), DuplicateVerdict::Unique);
    }

    #[test]
    fn candidates_are_recent_nearby_and_not_duplicates() {
        let now = Utc::now();
        assert!(is_candidate(&complaint(1, "x", 12.9, 77.6, 1), 12.9, 77.6, now));
        assert!(!is_candidate(&complaint(1, "x", 12.9, 77.6, 8), 12.9, 77.6, now));
        assert!(!is_candidate(&complaint(1, "x", 12.91, 77.6, 1), 12.9, 77.6, now));

        let mut linked = complaint(1, "x", 12.9, 77.6, 1);
        linked.duplicate_of = Some(ComplaintId(9));
        linked.review_flag = Some(ReviewFlag::Duplicate);
        assert!(!is_candidate(&linked, 12.9, 77.6, now));
    }

    #[test]
    fn possible_duplicates_remain_candidates() {
        let now = Utc::now();
        let mut flagged = complaint(3, "Streetlight flickering at night", 12.9, 77.6, 1);
        flagged.duplicate_of = Some(ComplaintId(9));
        flagged.review_flag = Some(ReviewFlag::PossibleDuplicate);
        assert!(is_candidate(&flagged, 12.9, 77.6, now));

        let verdict = detect_duplicate("Streetlight flickering at night", &[flagged]);
        assert_eq!(verdict.flag(), Some(ReviewFlag::Duplicate));
        assert_eq!(verdict.parent(), Some(ComplaintId(3)));
    }

    #[test]
    fn common_english_stop_words_are_ignored() {
        let s = text_similarity(
            "garbage dumped behind market since last week still",
            "garbage dumped market week",
        );
        assert!((s - 1.0).abs() < 1e-9);
    }
}
