//! Address geocoding for the member map.
//!
//! Coordinates are filled in lazily while the directory or map is rendered. Calls are
//! throttled by one last-call timestamp shared by every account (kept in the store's
//! key/value state) and each account has a failure counter. At
//! [`FAILURE_THRESHOLD`] failures a standing admin notice is raised and the account is
//! skipped until [`GeocodeService::reset_failures`] clears the counter. Failures below
//! the threshold are silent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use store::{AccountId, Geocode, MemberAccount, MemberRepository, MemberStore, Notice, StoreError};

/// Store key holding the RFC 3339 time of the last outbound lookup.
pub const LAST_CALL_KEY: &str = "geocode_last_call";
pub const FAILURE_THRESHOLD: u32 = 3;

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the address is well-formed but unknown.
    async fn geocode(&self, address: &str) -> Result<Option<Geocode>, String>;
}

pub struct GeocodeService {
    geocoder: Arc<dyn Geocoder>,
    min_interval: Duration,
}

impl GeocodeService {
    pub fn new(geocoder: Arc<dyn Geocoder>, min_interval: Duration) -> Self {
        Self {
            geocoder,
            min_interval,
        }
    }

    fn wants_lookup(account: &MemberAccount) -> bool {
        account.profile.geocode.is_none()
            && account.profile.geocode_failures < FAILURE_THRESHOLD
            && account.profile.address_line().is_some()
    }

    async fn may_call<S: MemberStore>(
        &self,
        repo: &MemberRepository<S>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let last = repo
            .store()
            .get_value(LAST_CALL_KEY)
            .await?
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc));
        Ok(last.map_or(true, |last| now - last >= self.min_interval))
    }

    /// Look up coordinates for accounts that lack them, as far as the throttle allows.
    /// Updated accounts are written back and also patched in `accounts`.
    pub async fn fill_missing<S: MemberStore>(
        &self,
        repo: &MemberRepository<S>,
        accounts: &mut [MemberAccount],
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut filled = 0;
        for account in accounts.iter_mut().filter(|a| Self::wants_lookup(a)) {
            if !self.may_call(repo, now).await? {
                tracing::debug!(account = account.id, "geocode throttled");
                break;
            }
            repo.store()
                .set_value(LAST_CALL_KEY, &now.to_rfc3339())
                .await?;

            let Some(address) = account.profile.address_line() else {
                continue;
            };
            match self.geocoder.geocode(&address).await {
                Ok(Some(geocode)) => {
                    tracing::info!(account = account.id, lat = geocode.lat, lng = geocode.lng, "geocoded");
                    account.profile.geocode = Some(geocode);
                    account.profile.geocode_failures = 0;
                    repo.store().update_account(account).await?;
                    filled += 1;
                }
                outcome => {
                    account.profile.geocode_failures += 1;
                    tracing::warn!(
                        account = account.id,
                        failures = account.profile.geocode_failures,
                        error = ?outcome.err(),
                        "geocode failed"
                    );
                    repo.store().update_account(account).await?;
                    if account.profile.geocode_failures == FAILURE_THRESHOLD {
                        let message = format!(
                            "The address of {} ({}) could not be located on the map. Correct the address, then reset its geocoding.",
                            account.profile.company_name, address
                        );
                        repo.store()
                            .push_notice(Notice::warning(message).standing())
                            .await?;
                    }
                }
            }
        }
        Ok(filled)
    }

    /// Allow an account to be looked up again.
    pub async fn reset_failures<S: MemberStore>(
        &self,
        repo: &MemberRepository<S>,
        id: AccountId,
    ) -> Result<(), StoreError> {
        let mut account = repo
            .store()
            .account(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", id)))?;
        account.profile.geocode_failures = 0;
        account.profile.geocode = None;
        repo.store().update_account(&account).await
    }
}

#[cfg(feature = "server")]
pub use self::google::GoogleGeocoder;

#[cfg(feature = "server")]
mod google {
    use reqwest::Client;
    use serde::Deserialize;

    use super::*;

    const ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

    #[derive(Debug, Deserialize)]
    struct Response {
        status: String,
        #[serde(default)]
        error_message: Option<String>,
        #[serde(default)]
        results: Vec<Candidate>,
    }

    #[derive(Debug, Deserialize)]
    struct Candidate {
        geometry: Geometry,
    }

    #[derive(Debug, Deserialize)]
    struct Geometry {
        location: Geocode,
    }

    /// Google Maps geocoding API client.
    #[derive(Debug)]
    pub struct GoogleGeocoder {
        client: Client,
        api_key: String,
    }

    impl GoogleGeocoder {
        pub fn new(api_key: impl Into<String>) -> Self {
            Self {
                client: Client::new(),
                api_key: api_key.into(),
            }
        }
    }

    #[async_trait]
    impl Geocoder for GoogleGeocoder {
        async fn geocode(&self, address: &str) -> Result<Option<Geocode>, String> {
            let response: Response = self
                .client
                .get(ENDPOINT)
                .query(&[("address", address), ("key", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| e.to_string())?
                .json()
                .await
                .map_err(|e| e.to_string())?;

            match response.status.as_str() {
                "OK" => Ok(response.results.into_iter().next().map(|r| r.geometry.location)),
                "ZERO_RESULTS" => Ok(None),
                status => Err(response.error_message.unwrap_or_else(|| status.to_string())),
            }
        }
    }
}
