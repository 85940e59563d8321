use crate::clients::rdb::{parse_instantaneous_values, parse_site_metadata};
use crate::config::Settings;
use crate::error::{ProcessingError, Result};
use crate::models::{GaugeObservation, SiteMetadata};
use crate::utils::constants::{AGENCY_CODE, DEFAULT_PARAMETER_CODE, IV_SERVICE_URL, SITE_SERVICE_URL};
use crate::utils::time::month_end;
use chrono::NaiveDate;
use reqwest::Client;
use tracing::debug;

/// Client for the USGS site and instantaneous-values services.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct WaterServicesClient {
    client: Client,
    site_base_url: String,
    iv_base_url: String,
    parameter_code: String,
}

impl WaterServicesClient {
    pub fn new() -> Result<Self> {
        Self::with_base_urls(SITE_SERVICE_URL, IV_SERVICE_URL)
    }

    pub fn with_base_urls(site_base_url: &str, iv_base_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .user_agent(concat!("hydroprep/", env!("CARGO_PKG_VERSION")))
                .build()?,
            site_base_url: site_base_url.to_string(),
            iv_base_url: iv_base_url.to_string(),
            parameter_code: DEFAULT_PARAMETER_CODE.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(
            Self::with_base_urls(&settings.site_service_url, &settings.iv_service_url)?
                .with_parameter_code(&settings.parameter_code),
        )
    }

    pub fn with_parameter_code(mut self, parameter_code: &str) -> Self {
        self.parameter_code = parameter_code.to_string();
        self
    }

    pub fn site_url(&self, station_id: &str) -> String {
        format!("{}?format=rdb&sites={}", self.site_base_url, station_id)
    }

    /// Query for one calendar month, midnight to the last millisecond in HST.
    pub fn monthly_url(&self, station_id: &str, month: NaiveDate) -> String {
        format!(
            "{}?sites={}&agencyCd={}&startDT={}T00:00:00.000-10:00&endDT={}T23:59:59.999-10:00&parameterCd={}&format=rdb",
            self.iv_base_url,
            station_id,
            AGENCY_CODE,
            month.format("%Y-%m-%d"),
            month_end(month).format("%Y-%m-%d"),
            self.parameter_code
        )
    }

    pub async fn fetch_site_metadata(&self, station_id: &str) -> Result<Option<SiteMetadata>> {
        let body = self.get_text(&self.site_url(station_id)).await?;
        Ok(parse_site_metadata(&body))
    }

    pub async fn fetch_month(
        &self,
        station_id: &str,
        month: NaiveDate,
    ) -> Result<Vec<GaugeObservation>> {
        let body = self.get_text(&self.monthly_url(station_id, month)).await?;
        parse_instantaneous_values(&body, station_id)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ProcessingError::ServiceStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!(url, bytes = body.len(), "Fetched response");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::parse_month;
    use pretty_assertions::assert_eq;

    fn client() -> WaterServicesClient {
        WaterServicesClient::with_base_urls("https://site.test/", "https://iv.test/").unwrap()
    }

    #[test]
    fn test_site_url() {
        assert_eq!(
            client().site_url("16103000"),
            "https://site.test/?format=rdb&sites=16103000"
        );
    }

    #[test]
    fn test_monthly_url_covers_whole_month() {
        let url = client().monthly_url("16103000", parse_month("2024-02").unwrap());

        assert_eq!(
            url,
            "https://iv.test/?sites=16103000&agencyCd=USGS\
             &startDT=2024-02-01T00:00:00.000-10:00\
             &endDT=2024-02-29T23:59:59.999-10:00\
             &parameterCd=00065&format=rdb"
        );
    }

    #[test]
    fn test_parameter_code_override() {
        let url = client()
            .with_parameter_code("00060")
            .monthly_url("16103000", parse_month("2023-12").unwrap());

        assert!(url.contains("parameterCd=00060"));
        assert!(url.contains("endDT=2023-12-31T23:59:59.999-10:00"));
    }
}
