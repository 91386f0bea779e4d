//! Contact enrichment: one bulk job, falling back to one-by-one lookups

use crate::core::{Contact, EnrichmentRequest, EnrichmentResult};
use crate::execution::errors::StageError;
use crate::execution::poller::{BulkJobPoller, JobError, PollConfig};
use crate::providers::ContactEnricher;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Enriched contacts plus how they were obtained
#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutcome {
    pub contacts: Vec<Contact>,
    pub used_fallback: bool,
    /// Results matched back to a contact
    pub matched: usize,
    /// Results whose key matched no submitted contact
    pub dropped: usize,
}

impl EnrichmentOutcome {
    pub fn with_email(&self) -> usize {
        self.contacts.iter().filter(|c| c.has_email()).count()
    }
}

/// Enrich `contacts` and return them with emails and phones filled in
///
/// The bulk job is submitted once. Only when that submission fails is each
/// request sent through [`ContactEnricher::enrich_one`], sequentially, with
/// per-record errors logged and skipped. A failed or timed-out bulk job is an
/// error for the whole stage.
pub async fn enrich_contacts(
    enricher: Arc<dyn ContactEnricher>,
    poll: PollConfig,
    mut contacts: Vec<Contact>,
) -> Result<EnrichmentOutcome, StageError> {
    let (requests, index) = build_requests(&contacts);
    if requests.is_empty() {
        warn!("No contact has a complete name and company, nothing to enrich");
        return Ok(EnrichmentOutcome {
            contacts,
            ..Default::default()
        });
    }
    info!("Enriching {} of {} contacts", requests.len(), contacts.len());

    let poller = BulkJobPoller::new(enricher.clone(), poll);
    let (results, used_fallback) = match poller.submit(&requests).await {
        Ok(job_id) => (poller.finish(job_id).await?.results, false),
        Err(JobError::SubmissionFailed(reason)) => {
            warn!("Bulk enrichment unavailable ({}), enriching one by one", reason);
            (enrich_one_by_one(enricher.as_ref(), &requests).await, true)
        }
        Err(e) => return Err(e.into()),
    };

    let mut matched = 0;
    let mut dropped = 0;
    for result in &results {
        match result.key().and_then(|key| index.get(&key).copied()) {
            Some(position) => {
                contacts[position].apply_enrichment(result);
                matched += 1;
            }
            None => {
                debug!(
                    "Dropping enrichment result for {} {} at {}: no matching contact",
                    result.first_name, result.last_name, result.company
                );
                dropped += 1;
            }
        }
    }
    info!(
        "Enrichment matched {} results, dropped {}",
        matched, dropped
    );

    Ok(EnrichmentOutcome {
        contacts,
        used_fallback,
        matched,
        dropped,
    })
}

/// Requests for every contact with a full name and company, and the key index
///
/// Two contacts with the same key collide; the first one wins.
fn build_requests(contacts: &[Contact]) -> (Vec<EnrichmentRequest>, HashMap<String, usize>) {
    let mut requests = Vec::new();
    let mut index = HashMap::new();

    for (position, contact) in contacts.iter().enumerate() {
        let Some(request) = contact.enrichment_request() else {
            debug!("Not enriching {}: missing name part or company", contact.name);
            continue;
        };
        let Some(key) = request.key() else {
            continue;
        };
        if index.contains_key(&key) {
            warn!(
                "Duplicate contact {} at {}, enriching only the first",
                contact.name, contact.company_name
            );
            continue;
        }
        index.insert(key, position);
        requests.push(request);
    }

    (requests, index)
}

async fn enrich_one_by_one(
    enricher: &dyn ContactEnricher,
    requests: &[EnrichmentRequest],
) -> Vec<EnrichmentResult> {
    let mut results = Vec::with_capacity(requests.len());
    for request in requests {
        match enricher.enrich_one(request).await {
            Ok(result) => results.push(result),
            Err(e) => warn!(
                "Enrichment failed for {} {}: {}",
                request.first_name, request.last_name, e
            ),
        }
    }
    results
}
