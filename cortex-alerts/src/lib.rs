//! Conflict/decay/match alerting, persistent watch queries, and webhook
//! delivery for the alerts created along the way.

mod conflicts;
mod decay;
mod repository;
mod watches;
mod webhook;

pub use conflicts::{check_conflicts_for_fact, get_attribute_conflicts, raise_conflict_alert, ConflictReport};
pub use decay::{check_decay_alerts, decay_digest, DecayDigestEntry, DecayThresholds};
pub use repository::{AlertRepository, NewAlert};
pub use watches::{check_watches_for_memory, score_watch};
pub use webhook::{alert_payload, batch_payload, resolve_url, ReqwestWebhookTransport, WebhookNotifier, WebhookOutcome, WebhookTransport};
