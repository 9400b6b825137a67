//! Aquacell update source
//!
//! The refresh token captured by the config flow is reused until it is
//! 30 days old. After that the source logs in with email and password and
//! keeps the renewed token for the rest of its life; the stored Connection
//! Config is left untouched.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ha_registries::{DeviceIdentifier, DeviceInfo};
use ha_update_coordinator::{Snapshot, UpdateSource};
use tracing::debug;

use super::api::{AquacellApi, AquacellError, Softener};
use super::{AquacellConfig, Brand, DOMAIN};

pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 30;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SoftenerSource {
    api: Box<dyn AquacellApi>,
    email: String,
    password: String,
    brand: Brand,
    refresh_token: String,
    token_created: DateTime<Utc>,
}

impl SoftenerSource {
    pub fn new(api: Box<dyn AquacellApi>, config: &AquacellConfig) -> Self {
        Self {
            api,
            email: config.email.clone(),
            password: config.password.clone(),
            brand: config.brand,
            refresh_token: config.refresh_token.clone(),
            token_created: DateTime::from_timestamp(config.refresh_token_creation_time, 0)
                .unwrap_or_default(),
        }
    }

    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.token_created + chrono::Duration::days(REFRESH_TOKEN_EXPIRY_DAYS)
    }

    async fn renew_token(&mut self) -> Result<(), AquacellError> {
        debug!("Attempting to renew refresh token");
        self.refresh_token = self.api.authenticate(&self.email, &self.password).await?;
        self.token_created = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for SoftenerSource {
    type Key = String;
    type Value = Softener;
    type Error = AquacellError;

    async fn authenticate(&mut self) -> Result<(), AquacellError> {
        let login = async {
            if self.token_expired(Utc::now()) {
                self.renew_token().await
            } else {
                self.api.authenticate_refresh(&self.refresh_token).await
            }
        };
        tokio::time::timeout(REQUEST_TIMEOUT, login)
            .await
            .map_err(|_| AquacellError::Timeout)?
    }

    async fn fetch(&mut self) -> Result<BTreeMap<String, Softener>, AquacellError> {
        let softeners = tokio::time::timeout(REQUEST_TIMEOUT, self.api.get_all_softeners())
            .await
            .map_err(|_| AquacellError::Timeout)??;
        Ok(softeners
            .into_iter()
            .map(|softener| (softener.dsn.clone(), softener))
            .collect())
    }

    fn child_devices(&self, snapshot: &Snapshot<String, Softener>) -> Vec<DeviceInfo> {
        snapshot
            .iter()
            .map(|(dsn, softener)| {
                DeviceInfo::new(DeviceIdentifier::new(DOMAIN, dsn))
                    .with_name(&softener.name)
                    .with_manufacturer(self.brand.manufacturer())
                    .with_model("Softener")
                    .with_sw_version(&softener.fw_version)
            })
            .collect()
    }
}
