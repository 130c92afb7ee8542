use poolscope_types::{hex_payload_len, parse_quantity, parse_quantity_u64};
use serde::Deserialize;
use serde_json::Value;

/// Loosely typed scalar as the collector writes it: hex strings, plain
/// numbers, or whatever the node returned.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Other(Value),
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_text(&self) -> Option<String> {
        match self {
            Scalar::Text(s) => Some(s.clone()),
            Scalar::Number(n) => Some(n.to_string()),
            Scalar::Other(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::Text(s) => parse_quantity_u64(s),
            Scalar::Number(n) => n.as_u64(),
            Scalar::Other(_) => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Scalar::Text(s) => parse_quantity(s),
            Scalar::Number(n) => n.as_u64().map(u128::from),
            Scalar::Other(_) => None,
        }
    }
}

/// Leaf transaction object of `txpool_content`.
///
/// Every field is optional so that a partially populated leaf still decodes;
/// missing required fields are reported by the mapper.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTransaction {
    #[serde(default)]
    pub hash: Option<Scalar>,
    #[serde(default)]
    pub from: Option<Scalar>,
    #[serde(default)]
    pub to: Option<Scalar>,
    #[serde(default)]
    pub nonce: Option<Scalar>,
    #[serde(default, rename = "type")]
    pub tx_type: Option<Scalar>,
    #[serde(default)]
    pub gas: Option<Scalar>,
    #[serde(default)]
    pub gas_price: Option<Scalar>,
    #[serde(default)]
    pub max_fee_per_gas: Option<Scalar>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<Scalar>,
    #[serde(default)]
    pub value: Option<Scalar>,
    #[serde(default)]
    pub input: Option<Scalar>,
    #[serde(default, alias = "authorization_list")]
    pub authorization_list: Option<AuthorizationList>,
    #[serde(default, alias = "authorization_count")]
    pub authorization_count: Option<Scalar>,
}

impl RawTransaction {
    pub fn input_size_bytes(&self) -> u64 {
        self.input
            .as_ref()
            .and_then(Scalar::as_text)
            .and_then(hex_payload_len)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum AuthorizationList {
    Entries(Vec<RawAuthorization>),
    Other(Value),
}

/// One entry of an EIP-7702 `authorizationList`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawAuthorization {
    #[serde(default, alias = "chain_id")]
    pub chain_id: Option<Scalar>,
    #[serde(default)]
    pub address: Option<Scalar>,
    #[serde(default)]
    pub nonce: Option<Scalar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_transaction_tolerates_odd_field_types() {
        let raw: RawTransaction = serde_json::from_str(
            r#"{"hash":"0xabc","nonce":7,"gas":{"weird":true},"type":"0x4",
                "authorizationList":"not-a-list","input":"0xa9059cbb"}"#,
        )
        .unwrap();

        assert_eq!(raw.hash.as_ref().and_then(Scalar::as_text), Some("0xabc"));
        assert_eq!(raw.nonce.as_ref().and_then(Scalar::as_u64), Some(7));
        assert_eq!(raw.gas.as_ref().and_then(Scalar::as_u64), None);
        assert_eq!(raw.tx_type.as_ref().and_then(Scalar::as_u64), Some(4));
        assert!(matches!(
            raw.authorization_list,
            Some(AuthorizationList::Other(_))
        ));
        assert_eq!(raw.input_size_bytes(), 4);
    }

    #[test]
    fn test_authorization_entries_decode() {
        let raw: RawTransaction = serde_json::from_str(
            r#"{"authorizationList":[{"chainId":"0x1","address":"0xdead","nonce":"0x0"}]}"#,
        )
        .unwrap();

        let Some(AuthorizationList::Entries(entries)) = raw.authorization_list else {
            panic!("expected entries");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].chain_id.as_ref().and_then(Scalar::as_u64), Some(1));
        assert_eq!(entries[0].nonce.as_ref().and_then(Scalar::as_u64), Some(0));
    }
}
