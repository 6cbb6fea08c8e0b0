//! Outbound control frames for the Vybe live endpoint
//!
//! Inbound frames have no fixed schema and stay as `serde_json::Value`.

use serde::Serialize;
use serde_json::Value;

use crate::dex::Dex;

/// Market wildcard: all markets of the program
pub const ALL_MARKETS: &str = "*";

/// `{"type":"configure","filters":{...}}`
#[derive(Debug, Clone, Serialize)]
pub struct ConfigureFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub filters: Filters,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    pub trades: Vec<TradeFilter>,
    pub transfers: Vec<Value>,
    pub oracle_prices: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeFilter {
    pub program_id: String,
    pub market_id: String,
}

impl ConfigureFrame {
    /// Trades on every market of one venue, no transfers or oracle prices
    pub fn trades_for(dex: Dex) -> Self {
        Self {
            frame_type: "configure",
            filters: Filters {
                trades: vec![TradeFilter {
                    program_id: dex.program_id().to_string(),
                    market_id: ALL_MARKETS.to_string(),
                }],
                transfers: Vec::new(),
                oracle_prices: Vec::new(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
