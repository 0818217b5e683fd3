use crate::error::SurveyError;
use crate::pricing::PricingConfiguration;
use crate::ProcessOutput;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Proof that a processing run was started. Only the newest ticket issued
/// for an upload can commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTicket {
    upload_id: String,
    seq: u64,
}

impl RunTicket {
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    Applied { seq: u64 },
    /// A newer run started after this one (or the upload was retired);
    /// the output was discarded.
    Superseded { seq: u64, latest: Option<u64> },
}

impl CommitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommitOutcome::Applied { .. })
    }
}

#[derive(Default)]
struct Slot {
    latest_ticket: u64,
    committed_seq: u64,
    committed: Option<Arc<ProcessOutput>>,
}

#[derive(Default)]
struct Inner {
    // Global so tickets stay unique across retire and re-upload.
    next_seq: u64,
    uploads: HashMap<String, Slot>,
}

/// Per-upload processed results. Readers get a whole snapshot, never a mix
/// of two runs.
#[derive(Default)]
pub struct ResultStore {
    inner: Mutex<Inner>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, SurveyError> {
        self.inner
            .lock()
            .map_err(|e| SurveyError::Store(format!("result store lock poisoned: {e}")))
    }

    /// Start a run for an upload. Any earlier outstanding ticket for the
    /// same upload is superseded.
    pub fn begin(&self, upload_id: &str) -> Result<RunTicket, SurveyError> {
        let mut inner = self.lock()?;
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner
            .uploads
            .entry(upload_id.to_string())
            .or_default()
            .latest_ticket = seq;
        tracing::debug!(upload = upload_id, seq, "processing run started");
        Ok(RunTicket {
            upload_id: upload_id.to_string(),
            seq,
        })
    }

    /// Replace the upload's snapshot if `ticket` is still the newest.
    pub fn commit(
        &self,
        ticket: &RunTicket,
        output: ProcessOutput,
    ) -> Result<CommitOutcome, SurveyError> {
        let mut inner = self.lock()?;
        let Some(slot) = inner.uploads.get_mut(&ticket.upload_id) else {
            tracing::info!(upload = %ticket.upload_id, seq = ticket.seq, "run discarded, upload retired");
            return Ok(CommitOutcome::Superseded {
                seq: ticket.seq,
                latest: None,
            });
        };
        if slot.latest_ticket != ticket.seq {
            tracing::info!(
                upload = %ticket.upload_id,
                seq = ticket.seq,
                latest = slot.latest_ticket,
                "run discarded, superseded by a newer run"
            );
            return Ok(CommitOutcome::Superseded {
                seq: ticket.seq,
                latest: Some(slot.latest_ticket),
            });
        }
        slot.committed = Some(Arc::new(output));
        slot.committed_seq = ticket.seq;
        tracing::debug!(upload = %ticket.upload_id, seq = ticket.seq, "run committed");
        Ok(CommitOutcome::Applied { seq: ticket.seq })
    }

    /// Latest committed snapshot for an upload.
    pub fn get(&self, upload_id: &str) -> Result<Option<Arc<ProcessOutput>>, SurveyError> {
        let inner = self.lock()?;
        Ok(inner
            .uploads
            .get(upload_id)
            .and_then(|slot| slot.committed.clone()))
    }

    /// Drop everything stored for an upload. Outstanding runs will be
    /// discarded on commit.
    pub fn retire(&self, upload_id: &str) -> Result<bool, SurveyError> {
        let mut inner = self.lock()?;
        Ok(inner.uploads.remove(upload_id).is_some())
    }

    /// Recompute costs for the committed records under a new configuration.
    /// Results of the previous configuration version are replaced.
    ///
    /// Fails with `RepriceConflict` while a processing run for the upload is
    /// outstanding, or when the snapshot changed while costs were computed.
    /// Repricing never supersedes a processing run.
    pub fn reprice(
        &self,
        upload_id: &str,
        config: &PricingConfiguration,
    ) -> Result<CommitOutcome, SurveyError> {
        let (snapshot, base_seq) = {
            let inner = self.lock()?;
            let Some((slot, committed)) = inner
                .uploads
                .get(upload_id)
                .and_then(|slot| slot.committed.clone().map(|c| (slot, c)))
            else {
                return Err(SurveyError::Store(format!(
                    "no processed result for upload '{upload_id}'"
                )));
            };
            if slot.latest_ticket != slot.committed_seq {
                return Err(reprice_conflict(upload_id, "a processing run is in flight"));
            }
            (committed, slot.committed_seq)
        };

        let repriced = snapshot.repriced(config);

        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let Some(slot) = inner.uploads.get_mut(upload_id) else {
            return Err(reprice_conflict(upload_id, "upload retired during repricing"));
        };
        if slot.committed_seq != base_seq || slot.latest_ticket != base_seq {
            return Err(reprice_conflict(
                upload_id,
                "a processing run started during repricing",
            ));
        }
        inner.next_seq += 1;
        let seq = inner.next_seq;
        slot.latest_ticket = seq;
        slot.committed_seq = seq;
        slot.committed = Some(Arc::new(repriced));
        tracing::debug!(upload = upload_id, seq, version = config.version, "result repriced");
        Ok(CommitOutcome::Applied { seq })
    }
}

fn reprice_conflict(upload_id: &str, reason: &str) -> SurveyError {
    tracing::info!(upload = upload_id, reason, "reprice refused");
    SurveyError::RepriceConflict {
        upload_id: upload_id.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditBundle;

    fn output(tag: &str) -> ProcessOutput {
        ProcessOutput {
            records: Vec::new(),
            pricing: None,
            audit: AuditBundle::new(tag),
        }
    }

    #[test]
    fn test_commit_and_get() {
        let store = ResultStore::new();
        let ticket = store.begin("u1").unwrap();
        assert!(store.get("u1").unwrap().is_none());
        assert!(store.commit(&ticket, output("a")).unwrap().is_applied());
        assert_eq!(store.get("u1").unwrap().unwrap().audit.code_table, "a");
    }

    #[test]
    fn test_superseded_run_never_visible() {
        let store = ResultStore::new();
        let slow = store.begin("u1").unwrap();
        let fast = store.begin("u1").unwrap();

        assert!(store.commit(&fast, output("fast")).unwrap().is_applied());
        let outcome = store.commit(&slow, output("slow")).unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Superseded {
                seq: slow.seq(),
                latest: Some(fast.seq())
            }
        );
        assert_eq!(store.get("u1").unwrap().unwrap().audit.code_table, "fast");
    }

    #[test]
    fn test_uploads_are_independent() {
        let store = ResultStore::new();
        let a = store.begin("a").unwrap();
        let b = store.begin("b").unwrap();
        assert!(store.commit(&a, output("a")).unwrap().is_applied());
        assert!(store.commit(&b, output("b")).unwrap().is_applied());
        assert_eq!(store.get("a").unwrap().unwrap().audit.code_table, "a");
    }

    #[test]
    fn test_retire_discards_in_flight_run() {
        let store = ResultStore::new();
        let first = store.begin("u1").unwrap();
        store.commit(&first, output("a")).unwrap();

        let in_flight = store.begin("u1").unwrap();
        assert!(store.retire("u1").unwrap());
        assert!(store.get("u1").unwrap().is_none());
        assert!(!store.commit(&in_flight, output("b")).unwrap().is_applied());

        // A re-upload under the same id does not revive the old ticket.
        let _fresh = store.begin("u1").unwrap();
        assert!(!store.commit(&in_flight, output("c")).unwrap().is_applied());
    }

    #[test]
    fn test_reprice_requires_committed_result() {
        let store = ResultStore::new();
        assert!(matches!(
            store.reprice("missing", &flat_pricing()),
            Err(SurveyError::Store(_))
        ));
    }

    fn flat_pricing() -> PricingConfiguration {
        crate::pricing::parse_pricing_str(
            r#"{ "name": "flat", "comparison": "length",
                 "ranges": [{ "label": "A", "start": 0, "end": 100 }], "values": [1] }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_reprice_refused_while_reprocess_in_flight() {
        let store = ResultStore::new();
        let first = store.begin("u1").unwrap();
        store.commit(&first, output("old survey")).unwrap();

        let fresh = store.begin("u1").unwrap();
        match store.reprice("u1", &flat_pricing()) {
            Err(SurveyError::RepriceConflict { upload_id, .. }) => assert_eq!(upload_id, "u1"),
            other => panic!("expected RepriceConflict, got {other:?}"),
        }

        assert!(store.commit(&fresh, output("new survey")).unwrap().is_applied());
        let snapshot = store.get("u1").unwrap().unwrap();
        assert_eq!(snapshot.audit.code_table, "new survey");
        assert!(snapshot.pricing.is_none());

        // Once the run has landed the same reprice goes through.
        assert!(store.reprice("u1", &flat_pricing()).unwrap().is_applied());
        let snapshot = store.get("u1").unwrap().unwrap();
        assert_eq!(snapshot.audit.code_table, "new survey");
        assert!(snapshot.pricing.is_some());
    }

    #[test]
    fn test_run_started_after_reprice_still_commits() {
        let store = ResultStore::new();
        let first = store.begin("u1").unwrap();
        store.commit(&first, output("a")).unwrap();
        let CommitOutcome::Applied { seq: repriced } = store.reprice("u1", &flat_pricing()).unwrap()
        else {
            panic!("reprice of a settled upload should apply");
        };

        let next = store.begin("u1").unwrap();
        assert!(next.seq() > repriced);
        assert!(store.commit(&next, output("b")).unwrap().is_applied());
        assert_eq!(store.get("u1").unwrap().unwrap().audit.code_table, "b");
    }

    #[test]
    fn test_concurrent_runs_leave_one_whole_snapshot() {
        let store = ResultStore::new();
        let tickets: Vec<RunTicket> = (0..8).map(|_| store.begin("u1").unwrap()).collect();
        let newest = tickets.last().unwrap().seq();

        std::thread::scope(|scope| {
            for ticket in &tickets {
                let store = &store;
                scope.spawn(move || {
                    store
                        .commit(ticket, output(&ticket.seq().to_string()))
                        .unwrap();
                });
            }
        });

        let snapshot = store.get("u1").unwrap().unwrap();
        assert_eq!(snapshot.audit.code_table, newest.to_string());
    }
}
