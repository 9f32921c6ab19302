use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One member of the agent's fixed emotion family.
///
/// Emotions are the attributes the signal classifier can map a sensor
/// snapshot onto.  The catalogue is closed: there is no way to add a member
/// at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Excitement,
    Calm,
    Sadness,
}

impl Emotion {
    /// All emotion catalogue members, in stable order.
    pub const ALL: [Emotion; 4] = [
        Emotion::Joy,
        Emotion::Excitement,
        Emotion::Calm,
        Emotion::Sadness,
    ];

    /// Stable symbolic name, used as the snapshot key.
    pub fn name(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Excitement => "excitement",
            Emotion::Calm => "calm",
            Emotion::Sadness => "sadness",
        }
    }

    /// Marker glyph prepended to a styled response once the emotion has been
    /// unlocked.
    pub fn glyph(&self) -> &'static str {
        match self {
            Emotion::Joy => "(^o^)",
            Emotion::Excitement => "(!!)",
            Emotion::Calm => "(-.-)",
            Emotion::Sadness => "(;_;)",
        }
    }
}

/// One member of the agent's fixed personality-trait family.
///
/// Each trait corresponds 1:1 to a built-in modulation unit; consulting the
/// unit is the exposure signal that can eventually unlock the trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trait {
    Empathy,
    Humor,
    Formality,
    Enthusiasm,
}

impl Trait {
    /// All trait catalogue members, in stable order.
    pub const ALL: [Trait; 4] = [
        Trait::Empathy,
        Trait::Humor,
        Trait::Formality,
        Trait::Enthusiasm,
    ];

    /// Stable symbolic name, used as the snapshot key and the modulation
    /// unit name.
    pub fn name(&self) -> &'static str {
        match self {
            Trait::Empathy => "empathy",
            Trait::Humor => "humor",
            Trait::Formality => "formality",
            Trait::Enthusiasm => "enthusiasm",
        }
    }
}

/// A member of the full attribute catalogue: two disjoint families, emotions
/// and traits.
///
/// Every attribute carries per-member mutable unlock state in the
/// `UnlockLedger`; the catalogue itself is closed and never extended at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Emotion(Emotion),
    Trait(Trait),
}

impl Attribute {
    /// Every catalogue member, emotions first, in stable order.
    pub fn all() -> impl Iterator<Item = Attribute> {
        Emotion::ALL
            .into_iter()
            .map(Attribute::Emotion)
            .chain(Trait::ALL.into_iter().map(Attribute::Trait))
    }

    /// Stable symbolic name (unique across both families).
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Emotion(e) => e.name(),
            Attribute::Trait(t) => t.name(),
        }
    }

    /// Resolve a symbolic name back to the catalogue member.
    ///
    /// Returns `None` for names outside the fixed catalogue.
    pub fn from_name(name: &str) -> Option<Attribute> {
        Attribute::all().find(|a| a.name() == name)
    }
}

/// Ordered relationship classification derived from interaction counters.
///
/// `Recognized < Familiar < Friend`.  The tier is a pure function of the
/// identity record's counters, recomputed on read and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierLabel {
    Recognized,
    Familiar,
    Friend,
}

impl TierLabel {
    /// Marker prefix the modulation chain prepends ahead of all transforms.
    ///
    /// `Recognized` identities (and unknown callers) get no marker.
    pub fn marker_prefix(&self) -> Option<&'static str> {
        match self {
            TierLabel::Friend => Some("friend_"),
            TierLabel::Familiar => Some("familiar_"),
            TierLabel::Recognized => None,
        }
    }
}

impl std::fmt::Display for TierLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierLabel::Recognized => write!(f, "Recognized"),
            TierLabel::Familiar => write!(f, "Familiar"),
            TierLabel::Friend => write!(f, "Friend"),
        }
    }
}

/// One-way derived identifier for a capture payload.
///
/// A fingerprint is a hex-encoded collision-resistant digest of the raw
/// perceptual input and is never reversible to it.  The raw payload is never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-derived digest string.
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of one identity record, with the tier already derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipView {
    pub fingerprint: Fingerprint,
    pub tier: TierLabel,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub encounter_count: u64,
    pub positive_interactions: u64,
    pub display_name: Option<String>,
    pub context_label: Option<String>,
    pub preferences: BTreeMap<String, String>,
    pub pinned: bool,
}

/// Metadata accompanying a camera capture request.
///
/// The policy gate refuses any capture whose `consent` flag is absent or
/// false, regardless of the other fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Explicit subject consent.  `None` means consent was never asked.
    pub consent: Option<bool>,
    /// Free-form descriptive fields (camera id, location label, …).
    /// Values are content-checked by the gate like any other text.
    pub fields: BTreeMap<String, String>,
}

impl CaptureMetadata {
    /// Metadata with the consent flag set and a single descriptive field.
    pub fn consented(field: &str, value: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), value.to_string());
        Self {
            consent: Some(true),
            fields,
        }
    }
}

/// Global error type spanning policy rejections, ruleset tampering, missing
/// entities, collaborator failures, and persistence faults.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum KindredError {
    /// Content failed a policy check.  Recoverable: the pipeline substitutes
    /// a user-visible fallback and the cycle completes normally.
    #[error("Policy Rejection: {reason}")]
    PolicyRejection { reason: String },

    /// The policy ruleset no longer matches its construction-time hash.
    /// Fatal and unrecoverable: once raised, no gate call in any caller may
    /// proceed.
    #[error("Policy ruleset integrity check failed; refusing all further checks")]
    TamperDetected,

    /// An unknown fingerprint, sensor, camera, or modulation unit was named.
    #[error("Not Found: {0}")]
    NotFound(String),

    /// The classification collaborator failed.  Recoverable: the cycle
    /// degrades to "no styling" and identity labels keep their old value.
    #[error("Classification Unavailable: {0}")]
    ClassificationUnavailable(String),

    /// A sensor or camera driver failed mid-read.
    #[error("Sensor Fault on {sensor}: {details}")]
    SensorFault { sensor: String, details: String },

    /// A snapshot could not be loaded or written.  Structurally invalid
    /// snapshot content fails loudly rather than dropping records.
    #[error("Persistence Error: {0}")]
    Persistence(String),

    /// An unexpected internal failure (e.g. a poisoned lock).  Caught at the
    /// cycle boundary and surfaced as a generic error string.
    #[error("Internal Error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_names_are_unique() {
        let names: Vec<&str> = Attribute::all().map(|a| a.name()).collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }

    #[test]
    fn attribute_from_name_roundtrip() {
        for attr in Attribute::all() {
            assert_eq!(Attribute::from_name(attr.name()), Some(attr));
        }
        assert_eq!(Attribute::from_name("stoicism"), None);
    }

    #[test]
    fn attribute_serialization_roundtrip() {
        let attr = Attribute::Trait(Trait::Humor);
        let json = serde_json::to_string(&attr).unwrap();
        let back: Attribute = serde_json::from_str(&json).unwrap();
        assert_eq!(attr, back);
    }

    #[test]
    fn tier_ordering_matches_progression() {
        assert!(TierLabel::Recognized < TierLabel::Familiar);
        assert!(TierLabel::Familiar < TierLabel::Friend);
    }

    #[test]
    fn tier_marker_prefixes() {
        assert_eq!(TierLabel::Friend.marker_prefix(), Some("friend_"));
        assert_eq!(TierLabel::Familiar.marker_prefix(), Some("familiar_"));
        assert_eq!(TierLabel::Recognized.marker_prefix(), None);
    }

    #[test]
    fn every_emotion_has_a_distinct_glyph() {
        let glyphs: Vec<&str> = Emotion::ALL.iter().map(|e| e.glyph()).collect();
        let mut deduped = glyphs.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(glyphs.len(), deduped.len());
    }

    #[test]
    fn capture_metadata_consented_helper() {
        let meta = CaptureMetadata::consented("camera", "front_rgb");
        assert_eq!(meta.consent, Some(true));
        assert_eq!(meta.fields.get("camera").map(String::as_str), Some("front_rgb"));
    }

    #[test]
    fn kindred_error_display() {
        let err = KindredError::PolicyRejection {
            reason: "violent content".to_string(),
        };
        assert!(err.to_string().contains("violent content"));

        let err2 = KindredError::SensorFault {
            sensor: "ambient_light".to_string(),
            details: "read failed".to_string(),
        };
        assert!(err2.to_string().contains("ambient_light"));
    }

    #[test]
    fn fingerprint_display_matches_inner() {
        let fp = Fingerprint::new("abc123");
        assert_eq!(fp.to_string(), "abc123");
        assert_eq!(fp.as_str(), "abc123");
    }
}
