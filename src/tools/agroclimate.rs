//! 农业气候工具：NASA POWER 气候学接口，返回某坐标的长期月平均温度、降雨、湿度、风速、日照辐射

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tools::registry::required_f64;
use crate::tools::{Tool, ToolError};

/// NASA POWER 参数：气温、修正降水、相对湿度、风速、地表短波辐射
const PARAMETERS: &str = "T2M,PRECTOTCORR,RH2M,WS2M,ALLSKY_SFC_SW_DWN";

/// 月份（JAN..DEC, ANN）→ 数值
pub type MonthlySeries = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgroClimate {
    #[serde(rename = "temperature_C")]
    pub temperature_c: MonthlySeries,
    pub rainfall_mm: MonthlySeries,
    pub humidity_percent: MonthlySeries,
    pub wind_speed_mps: MonthlySeries,
    #[serde(rename = "solar_radiation_kWh_m2_day")]
    pub solar_radiation_kwh_m2_day: MonthlySeries,
}

#[derive(Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Deserialize)]
struct PowerProperties {
    parameter: PowerParameters,
}

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct PowerParameters {
    T2M: MonthlySeries,
    PRECTOTCORR: MonthlySeries,
    RH2M: MonthlySeries,
    WS2M: MonthlySeries,
    ALLSKY_SFC_SW_DWN: MonthlySeries,
}

impl From<PowerParameters> for AgroClimate {
    fn from(p: PowerParameters) -> Self {
        Self {
            temperature_c: p.T2M,
            rainfall_mm: p.PRECTOTCORR,
            humidity_percent: p.RH2M,
            wind_speed_mps: p.WS2M,
            solar_radiation_kwh_m2_day: p.ALLSKY_SFC_SW_DWN,
        }
    }
}

pub struct AgroClimateClient {
    client: Client,
    base_url: String,
}

impl AgroClimateClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    pub async fn overview(&self, lat: f64, lon: f64) -> Result<AgroClimate, ToolError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("parameters", PARAMETERS.to_string()),
                ("community", "AG".to_string()),
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("format", "JSON".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::Status {
                status: status.as_u16(),
                detail: resp.text().await.unwrap_or_default(),
            });
        }

        let body: PowerResponse = resp.json().await?;
        Ok(body.properties.parameter.into())
    }
}

/// get_agroclimate_overview(lat, lon)
pub struct AgroClimateTool {
    client: AgroClimateClient,
}

impl AgroClimateTool {
    pub fn new(client: AgroClimateClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for AgroClimateTool {
    fn name(&self) -> &str {
        "get_agroclimate_overview"
    }

    fn description(&self) -> &str {
        "Retrieves long-term monthly agro-climatic conditions (temperature, rainfall, humidity, \
         wind speed, solar radiation) for the given latitude and longitude."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "lat": { "type": "number", "description": "Latitude of the location" },
                "lon": { "type": "number", "description": "Longitude of the location" }
            },
            "required": ["lat", "lon"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let lat = required_f64(&args, "lat")?;
        let lon = required_f64(&args, "lon")?;

        let output = match self.client.overview(lat, lon).await {
            Ok(climate) => json!({
                "status": "success",
                "location_details": { "latitude": lat, "longitude": lon },
                "agro_climate": climate,
                "notes": "Values represent long-term monthly climatology averages for this location."
            }),
            Err(e) => {
                tracing::warn!(lat, lon, "agroclimate lookup failed: {}", e);
                json!({
                    "status": "failed",
                    "error": e.to_string(),
                    "notes": "Check latitude, longitude, or network connectivity."
                })
            }
        };
        Ok(output.to_string())
    }
}
