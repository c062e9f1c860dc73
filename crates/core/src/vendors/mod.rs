//! Concurrent vendor fan-out for one part request.
//!
//! One task per (vendor, OEM candidate). Each task retries on its own with a per-call
//! timeout; the whole part is bounded by a separate deadline. A vendor that fails never
//! fails the part, it is reported as unavailable instead.

pub mod adapters;

use std::collections::BTreeSet;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, warn};

use crate::collaborators::VendorSource;
use crate::config::VendorConfig;
use crate::domain::offer::VendorOffer;
use crate::domain::parts::PartRequest;
use crate::errors::{CollaboratorError, EstimateError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VendorQueryPolicy {
    pub call_timeout: Duration,
    pub part_timeout: Duration,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for VendorQueryPolicy {
    fn default() -> Self {
        Self::from(&VendorConfig::default())
    }
}

impl From<&VendorConfig> for VendorQueryPolicy {
    fn from(config: &VendorConfig) -> Self {
        Self {
            call_timeout: config.call_timeout(),
            part_timeout: config.part_timeout(),
            max_retries: config.max_retries,
            base_delay_ms: config.retry_backoff_ms,
            max_delay_ms: config.max_backoff_ms,
        }
    }
}

impl VendorQueryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    fn call_timeout_ms(&self) -> u64 {
        u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// A vendor query that exhausted its retries or was cut off by the part deadline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorFailure {
    pub vendor_id: String,
    pub oem_number: String,
    pub attempts: u32,
    pub reason: String,
}

impl From<VendorFailure> for EstimateError {
    fn from(failure: VendorFailure) -> Self {
        EstimateError::VendorUnavailable {
            vendor_id: failure.vendor_id,
            oem_number: failure.oem_number,
            attempts: failure.attempts,
            reason: failure.reason,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedOffer {
    pub vendor_id: String,
    pub oem_number: String,
    pub reason: String,
}

/// Everything the fan-out learned about one part.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartPricing {
    pub offers: Vec<VendorOffer>,
    pub failures: Vec<VendorFailure>,
    pub rejected: Vec<RejectedOffer>,
    pub responded: BTreeSet<String>,
    pub deadline_exceeded: bool,
}

impl PartPricing {
    /// Vendors that did not answer a single query for this part.
    pub fn unavailable_vendors(&self) -> BTreeSet<&str> {
        self.failures
            .iter()
            .map(|failure| failure.vendor_id.as_str())
            .filter(|vendor_id| !self.responded.contains(*vendor_id))
            .collect()
    }

    pub fn flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = self
            .unavailable_vendors()
            .into_iter()
            .map(|vendor_id| format!("vendor_unavailable: {vendor_id}"))
            .collect();
        flags.extend(self.rejected.iter().map(|rejected| {
            format!(
                "invalid_offer: {} {} ({})",
                rejected.vendor_id, rejected.oem_number, rejected.reason
            )
        }));
        flags
    }
}

struct RegisteredVendor {
    source: Arc<dyn VendorSource>,
    limiter: Option<DefaultDirectRateLimiter>,
}

type QueryOutcome = (String, String, Result<Vec<VendorOffer>, VendorFailure>);

pub struct VendorPricingAggregator {
    vendors: Vec<Arc<RegisteredVendor>>,
    policy: VendorQueryPolicy,
}

impl VendorPricingAggregator {
    pub fn new(sources: Vec<Arc<dyn VendorSource>>, config: &VendorConfig) -> Self {
        let quota = config.requests_per_second.and_then(NonZeroU32::new).map(Quota::per_second);
        let vendors = sources
            .into_iter()
            .map(|source| {
                Arc::new(RegisteredVendor { source, limiter: quota.map(RateLimiter::direct) })
            })
            .collect();
        Self { vendors, policy: VendorQueryPolicy::from(config) }
    }

    pub fn with_policy(mut self, policy: VendorQueryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn vendor_ids(&self) -> Vec<&str> {
        self.vendors.iter().map(|vendor| vendor.source.vendor_id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }

    /// Queries every vendor for every OEM candidate of the part and waits for all of them,
    /// or for the part deadline, whichever comes first.
    pub async fn price_part(&self, request: &PartRequest) -> PartPricing {
        let deadline = Instant::now() + self.policy.part_timeout;
        let mut join_set = JoinSet::new();
        let mut pending: Vec<(String, String, Arc<AtomicU32>)> = Vec::new();

        for oem_number in request.oem_numbers() {
            for vendor in &self.vendors {
                let vendor = Arc::clone(vendor);
                let policy = self.policy.clone();
                let oem = oem_number.clone();
                let attempts = Arc::new(AtomicU32::new(0));
                pending.push((
                    vendor.source.vendor_id().to_owned(),
                    oem_number.clone(),
                    Arc::clone(&attempts),
                ));
                join_set.spawn(async move {
                    query_with_retry(&vendor, &oem, &policy, &attempts).await
                });
            }
        }

        let mut pricing = PartPricing::default();
        loop {
            match timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok((vendor_id, oem_number, outcome)))) => {
                    pending.retain(|(id, oem, _)| !(id == &vendor_id && oem == &oem_number));
                    match outcome {
                        Ok(offers) => {
                            pricing.responded.insert(vendor_id.clone());
                            accept_offers(&mut pricing, offers);
                        }
                        Err(failure) => pricing.failures.push(failure),
                    }
                }
                Ok(Some(Err(join_error))) => {
                    warn!(
                        event_name = "vendor.task_failed",
                        error = %join_error,
                        "vendor query task did not complete"
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    join_set.abort_all();
                    pricing.deadline_exceeded = true;
                    break;
                }
            }
        }

        let deadline_reason = if pricing.deadline_exceeded {
            format!("part deadline of {} ms exceeded", self.policy.part_timeout.as_millis())
        } else {
            "query task aborted".to_owned()
        };
        for (vendor_id, oem_number, attempts) in pending {
            warn!(
                event_name = "vendor.unavailable",
                vendor_id = %vendor_id,
                oem_number = %oem_number,
                reason = %deadline_reason,
                "vendor query did not finish"
            );
            pricing.failures.push(VendorFailure {
                vendor_id,
                oem_number,
                attempts: attempts.load(Ordering::Relaxed),
                reason: deadline_reason.clone(),
            });
        }

        pricing.offers.sort_by(|left, right| {
            (&left.vendor_id, &left.oem_number, left.price)
                .cmp(&(&right.vendor_id, &right.oem_number, right.price))
        });
        pricing.failures.sort_by(|left, right| {
            (&left.vendor_id, &left.oem_number).cmp(&(&right.vendor_id, &right.oem_number))
        });
        pricing
    }
}

fn accept_offers(pricing: &mut PartPricing, offers: Vec<VendorOffer>) {
    for offer in offers {
        let problem = if offer.price <= Decimal::ZERO {
            Some(format!("non-positive price {}", offer.price))
        } else if !offer.warehouse_distance_miles.is_finite()
            || offer.warehouse_distance_miles < 0.0
        {
            Some(format!("invalid distance {}", offer.warehouse_distance_miles))
        } else {
            None
        };

        match problem {
            Some(reason) => pricing.rejected.push(RejectedOffer {
                vendor_id: offer.vendor_id,
                oem_number: offer.oem_number,
                reason,
            }),
            None => pricing.offers.push(offer),
        }
    }
}

async fn query_with_retry(
    vendor: &RegisteredVendor,
    oem_number: &str,
    policy: &VendorQueryPolicy,
    attempts: &AtomicU32,
) -> QueryOutcome {
    let vendor_id = vendor.source.vendor_id().to_owned();
    let mut last_error = CollaboratorError::Unavailable("no attempt made".to_owned());

    for attempt in 0..=policy.max_retries {
        if let Some(limiter) = &vendor.limiter {
            limiter.until_ready().await;
        }
        attempts.store(attempt + 1, Ordering::Relaxed);

        let result = match timeout(policy.call_timeout, vendor.source.query(oem_number)).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(policy.call_timeout_ms())),
        };

        match result {
            Ok(offers) => {
                debug!(
                    event_name = "vendor.responded",
                    vendor_id = %vendor_id,
                    oem_number,
                    attempt = attempt + 1,
                    offers = offers.len(),
                    "vendor answered"
                );
                return (vendor_id, oem_number.to_owned(), Ok(offers));
            }
            Err(error) if error.is_retryable() && attempt < policy.max_retries => {
                debug!(
                    event_name = "vendor.retry",
                    vendor_id = %vendor_id,
                    oem_number,
                    attempt = attempt + 1,
                    error = %error,
                    "retrying vendor query"
                );
                last_error = error;
                sleep(policy.backoff(attempt)).await;
            }
            Err(error) => {
                last_error = error;
                break;
            }
        }
    }

    let attempts = attempts.load(Ordering::Relaxed);
    warn!(
        event_name = "vendor.unavailable",
        vendor_id = %vendor_id,
        oem_number,
        attempts,
        error = %last_error,
        "vendor marked unavailable for part"
    );
    let failure = VendorFailure {
        vendor_id: vendor_id.clone(),
        oem_number: oem_number.to_owned(),
        attempts,
        reason: last_error.to_string(),
    };
    (vendor_id, oem_number.to_owned(), Err(failure))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::{VendorPricingAggregator, VendorQueryPolicy};
    use crate::collaborators::{CollaboratorResult, VendorSource};
    use crate::config::VendorConfig;
    use crate::domain::offer::{StockStatus, VendorOffer};
    use crate::domain::parts::{OemCandidate, PartRequest};
    use crate::errors::CollaboratorError;

    fn offer(vendor_id: &str, oem_number: &str, cents: i64, miles: f64) -> VendorOffer {
        VendorOffer {
            vendor_id: vendor_id.to_owned(),
            vendor_name: vendor_id.to_owned(),
            oem_number: oem_number.to_owned(),
            brand: "Bosch".to_owned(),
            brand_tier: None,
            price: Decimal::new(cents, 2),
            stock_status: StockStatus::InStock,
            stock_quantity: None,
            warehouse_distance_miles: miles,
            delivery_option: None,
            warranty_term: None,
            raw_description: "Ceramic pad set".to_owned(),
        }
    }

    fn request(oem_numbers: &[&str]) -> PartRequest {
        let candidate = |oem: &&str| OemCandidate {
            oem_number: (*oem).to_owned(),
            description: "Front brake pad set".to_owned(),
            brand: None,
            brand_tier: None,
        };
        PartRequest {
            description: "Front brake pad set".to_owned(),
            primary: candidate(&oem_numbers[0]),
            alternates: oem_numbers[1..].iter().map(candidate).collect(),
            position: None,
            quantity: 1,
        }
    }

    struct ScriptedVendor {
        id: String,
        script: Mutex<VecDeque<CollaboratorResult<Vec<VendorOffer>>>>,
        calls: AtomicU32,
    }

    impl ScriptedVendor {
        fn new(id: &str, script: Vec<CollaboratorResult<Vec<VendorOffer>>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_owned(),
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl VendorSource for ScriptedVendor {
        fn vendor_id(&self) -> &str {
            &self.id
        }

        fn vendor_name(&self) -> &str {
            &self.id
        }

        async fn query(&self, _oem_number: &str) -> CollaboratorResult<Vec<VendorOffer>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().expect("script lock").pop_front();
            next.unwrap_or_else(|| {
                Err(CollaboratorError::Unavailable("script exhausted".to_owned()))
            })
        }
    }

    struct StalledVendor;

    #[async_trait]
    impl VendorSource for StalledVendor {
        fn vendor_id(&self) -> &str {
            "stalled"
        }

        fn vendor_name(&self) -> &str {
            "Stalled Parts"
        }

        async fn query(&self, _oem_number: &str) -> CollaboratorResult<Vec<VendorOffer>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let vendor = ScriptedVendor::new(
            "worldpac",
            vec![
                Err(CollaboratorError::Unavailable("502".to_owned())),
                Err(CollaboratorError::Timeout(5000)),
                Ok(vec![offer("worldpac", "45022-TVA-A01", 8999, 12.0)]),
            ],
        );
        let aggregator = VendorPricingAggregator::new(
            vec![vendor.clone() as Arc<dyn VendorSource>],
            &VendorConfig::default(),
        );

        let pricing = aggregator.price_part(&request(&["45022-TVA-A01"])).await;

        assert_eq!(vendor.calls.load(Ordering::SeqCst), 3);
        assert_eq!(pricing.offers.len(), 1);
        assert!(pricing.failures.is_empty());
        assert!(pricing.flags().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_vendor_is_flagged_without_failing_others() {
        let failing = ScriptedVendor::new("ssf", Vec::new());
        let healthy = ScriptedVendor::new(
            "worldpac",
            vec![Ok(vec![offer("worldpac", "45022-TVA-A01", 8999, 12.0)])],
        );
        let aggregator = VendorPricingAggregator::new(
            vec![failing.clone() as Arc<dyn VendorSource>, healthy],
            &VendorConfig::default(),
        );

        let pricing = aggregator.price_part(&request(&["45022-TVA-A01"])).await;

        assert_eq!(failing.calls.load(Ordering::SeqCst), 4);
        assert_eq!(pricing.offers.len(), 1);
        assert_eq!(pricing.failures.len(), 1);
        assert_eq!(pricing.failures[0].attempts, 4);
        assert_eq!(pricing.flags(), vec!["vendor_unavailable: ssf".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_not_retried() {
        let vendor = ScriptedVendor::new(
            "ssf",
            vec![Err(CollaboratorError::Malformed("missing unit_price_cents".to_owned()))],
        );
        let aggregator = VendorPricingAggregator::new(
            vec![vendor.clone() as Arc<dyn VendorSource>],
            &VendorConfig::default(),
        );

        let pricing = aggregator.price_part(&request(&["45022-TVA-A01"])).await;

        assert_eq!(vendor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pricing.failures[0].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn part_deadline_bounds_a_stalled_vendor() {
        let healthy = ScriptedVendor::new(
            "worldpac",
            vec![Ok(vec![offer("worldpac", "45022-TVA-A01", 8999, 12.0)])],
        );
        let policy = VendorQueryPolicy {
            call_timeout: Duration::from_secs(60),
            part_timeout: Duration::from_secs(10),
            ..VendorQueryPolicy::default()
        };
        let aggregator = VendorPricingAggregator::new(
            vec![healthy as Arc<dyn VendorSource>, Arc::new(StalledVendor)],
            &VendorConfig::default(),
        )
        .with_policy(policy);

        let started = tokio::time::Instant::now();
        let pricing = aggregator.price_part(&request(&["45022-TVA-A01"])).await;

        assert!(started.elapsed() <= Duration::from_secs(11));
        assert!(pricing.deadline_exceeded);
        assert_eq!(pricing.offers.len(), 1);
        assert_eq!(pricing.failures[0].vendor_id, "stalled");
        assert_eq!(pricing.failures[0].attempts, 1);
        assert_eq!(pricing.flags(), vec!["vendor_unavailable: stalled".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn every_oem_candidate_is_queried_and_bad_offers_rejected() {
        let vendor = ScriptedVendor::new(
            "worldpac",
            vec![
                Ok(vec![offer("worldpac", "A-1", 8999, 12.0)]),
                Ok(vec![offer("worldpac", "B-2", 0, 5.0), offer("worldpac", "B-2", 7000, -1.0)]),
            ],
        );
        let aggregator = VendorPricingAggregator::new(
            vec![vendor.clone() as Arc<dyn VendorSource>],
            &VendorConfig::default(),
        );

        let pricing = aggregator.price_part(&request(&["A-1", "B-2"])).await;

        assert_eq!(vendor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(pricing.offers.len(), 1);
        assert_eq!(pricing.rejected.len(), 2);
        assert!(pricing.unavailable_vendors().is_empty());
    }
}
