use alloy_primitives::{Address, B256};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::{decode_hex_data, parse_quantity_u64};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    /// false when the transaction was reverted
    pub status: bool,
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Build from an `eth_getTransactionReceipt` result object.
    pub fn from_json(v: &serde_json::Value) -> Result<Receipt> {
        let field = |name: &str| {
            v.get(name)
                .and_then(|f| f.as_str())
                .ok_or_else(|| Error::invalid_response(format!("receipt without {}", name)))
        };

        let transaction_hash = parse_b256(field("transactionHash")?)?;
        let block_number = parse_quantity_u64(field("blockNumber")?)?;
        let gas_used = v
            .get("gasUsed")
            .and_then(|g| g.as_str())
            .map(parse_quantity_u64)
            .transpose()?
            .unwrap_or(0);
        // Pre-byzantium receipts carry no status; treat them as successful.
        let status = match v.get("status").and_then(|s| s.as_str()) {
            Some(s) => parse_quantity_u64(s)? == 1,
            None => true,
        };

        let mut logs = Vec::new();
        if let Some(entries) = v.get("logs").and_then(|l| l.as_array()) {
            for entry in entries {
                logs.push(Log::from_json(entry)?);
            }
        }

        Ok(Receipt {
            transaction_hash,
            block_number,
            gas_used,
            status,
            logs,
        })
    }

    pub fn logs_with_topic(&self, topic: B256) -> impl Iterator<Item = &Log> {
        self.logs
            .iter()
            .filter(move |log| log.topics.first() == Some(&topic))
    }
}

impl Log {
    pub fn from_json(v: &serde_json::Value) -> Result<Log> {
        let address = v
            .get("address")
            .and_then(|a| a.as_str())
            .ok_or_else(|| Error::invalid_response("log without address"))?
            .parse::<Address>()
            .map_err(|e| Error::invalid_response(format!("bad log address: {}", e)))?;

        let mut topics = Vec::new();
        if let Some(values) = v.get("topics").and_then(|t| t.as_array()) {
            for topic in values {
                let text = topic
                    .as_str()
                    .ok_or_else(|| Error::invalid_response("topic is not a string"))?;
                topics.push(parse_b256(text)?);
            }
        }

        let data = match v.get("data").and_then(|d| d.as_str()) {
            Some(d) => decode_hex_data(d)?,
            None => Vec::new(),
        };

        Ok(Log {
            address,
            topics,
            data,
        })
    }
}

pub fn parse_b256(value: &str) -> Result<B256> {
    value
        .parse::<B256>()
        .map_err(|e| Error::invalid_response(format!("bad hash {}: {}", value, e)))
}
