//! Command and notify payloads (§4.6, §6). Each type converts to/from the
//! epee `Value::Object` tree by hand; this keeps the wire crate small
//! while still round-tripping the real portable-storage format.

use cn_epee_encoding::Value;
use cn_types::Hash;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` had the wrong type")]
    WrongType(&'static str),
}

type Fields = IndexMap<String, Value>;

fn get_u64(fields: &Fields, name: &'static str) -> Result<u64, WireError> {
    match fields.get(name) {
        Some(Value::U64(v)) => Ok(*v),
        Some(Value::U32(v)) => Ok(u64::from(*v)),
        Some(_) => Err(WireError::WrongType(name)),
        None => Err(WireError::MissingField(name)),
    }
}

fn get_u32(fields: &Fields, name: &'static str) -> Result<u32, WireError> {
    match fields.get(name) {
        Some(Value::U32(v)) => Ok(*v),
        Some(Value::U64(v)) => Ok(*v as u32),
        Some(_) => Err(WireError::WrongType(name)),
        None => Err(WireError::MissingField(name)),
    }
}

fn get_bytes(fields: &Fields, name: &'static str) -> Result<Vec<u8>, WireError> {
    match fields.get(name) {
        Some(Value::Bytes(b)) => Ok(b.to_vec()),
        Some(_) => Err(WireError::WrongType(name)),
        None => Err(WireError::MissingField(name)),
    }
}

fn get_hash(fields: &Fields, name: &'static str) -> Result<Hash, WireError> {
    let bytes = get_bytes(fields, name)?;
    let arr: [u8; 32] = bytes.try_into().map_err(|_| WireError::WrongType(name))?;
    Ok(Hash(arr))
}

fn get_seq(fields: &Fields, name: &'static str) -> Result<Vec<Value>, WireError> {
    match fields.get(name) {
        Some(Value::Seq(items)) => Ok(items.clone()),
        Some(_) => Err(WireError::WrongType(name)),
        None => Ok(Vec::new()),
    }
}

/// `basic_node_data` (§4.6 handshake).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicNodeData {
    pub network_id: [u8; 16],
    pub version: u8,
    pub local_time: u64,
    pub my_port: u32,
    pub peer_id: u64,
}

impl BasicNodeData {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("network_id".into(), Value::Bytes(self.network_id.to_vec().into()));
        fields.insert("version".into(), Value::U32(u32::from(self.version)));
        fields.insert("local_time".into(), Value::U64(self.local_time));
        fields.insert("my_port".into(), Value::U32(self.my_port));
        fields.insert("peer_id".into(), Value::U64(self.peer_id));
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        let network_id_bytes = get_bytes(fields, "network_id")?;
        let network_id: [u8; 16] = network_id_bytes
            .try_into()
            .map_err(|_| WireError::WrongType("network_id"))?;
        Ok(Self {
            network_id,
            version: get_u32(fields, "version")? as u8,
            local_time: get_u64(fields, "local_time")?,
            my_port: get_u32(fields, "my_port")?,
            peer_id: get_u64(fields, "peer_id")?,
        })
    }
}

/// `CORE_SYNC_DATA` (§4.6 handshake/timed-sync).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreSyncData {
    pub current_height: u64,
    pub top_block_hash: Hash,
    pub cumulative_difficulty: u64,
}

impl CoreSyncData {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("current_height".into(), Value::U64(self.current_height));
        fields.insert(
            "top_id".into(),
            Value::Bytes(self.top_block_hash.as_bytes().to_vec().into()),
        );
        fields.insert(
            "cumulative_difficulty".into(),
            Value::U64(self.cumulative_difficulty),
        );
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        Ok(Self {
            current_height: get_u64(fields, "current_height")?,
            top_block_hash: get_hash(fields, "top_id")?,
            cumulative_difficulty: get_u64(fields, "cumulative_difficulty")?,
        })
    }
}

macro_rules! wrapped_payload {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $(pub $field: $ty),*
        }
    };
}

wrapped_payload!(HandshakeRequest {
    node_data: BasicNodeData,
    payload_data: CoreSyncData,
});

impl HandshakeRequest {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("node_data".into(), Value::Object(self.node_data.to_fields()));
        fields.insert(
            "payload_data".into(),
            Value::Object(self.payload_data.to_fields()),
        );
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        let node_data = match fields.get("node_data") {
            Some(Value::Object(obj)) => BasicNodeData::from_fields(obj)?,
            _ => return Err(WireError::MissingField("node_data")),
        };
        let payload_data = match fields.get("payload_data") {
            Some(Value::Object(obj)) => CoreSyncData::from_fields(obj)?,
            _ => return Err(WireError::MissingField("payload_data")),
        };
        Ok(Self {
            node_data,
            payload_data,
        })
    }
}

fn peerlist_to_seq(list: &[cn_types::PeerlistEntry]) -> Value {
    Value::Seq(
        list.iter()
            .map(|entry| {
                let mut fields = Fields::new();
                let mut addr = Vec::new();
                match entry.address.ip {
                    std::net::IpAddr::V4(v4) => addr.extend_from_slice(&v4.octets()),
                    std::net::IpAddr::V6(v6) => addr.extend_from_slice(&v6.octets()),
                }
                fields.insert("adr".into(), Value::Bytes(addr.into()));
                fields.insert("port".into(), Value::U32(u32::from(entry.address.port)));
                fields.insert("id".into(), Value::U64(entry.peer_id));
                fields.insert("last_seen".into(), Value::U64(entry.last_seen));
                Value::Object(fields)
            })
            .collect(),
    )
}

fn peerlist_from_seq(fields: &Fields, name: &'static str) -> Result<Vec<cn_types::PeerlistEntry>, WireError> {
    get_seq(fields, name)?
        .into_iter()
        .map(|value| match value {
            Value::Object(obj) => {
                let addr_bytes = get_bytes(&obj, "adr")?;
                let ip = match addr_bytes.len() {
                    4 => std::net::IpAddr::V4(std::net::Ipv4Addr::new(
                        addr_bytes[0],
                        addr_bytes[1],
                        addr_bytes[2],
                        addr_bytes[3],
                    )),
                    16 => {
                        let arr: [u8; 16] = addr_bytes.try_into().map_err(|_| WireError::WrongType("adr"))?;
                        std::net::IpAddr::V6(arr.into())
                    }
                    _ => return Err(WireError::WrongType("adr")),
                };
                Ok(cn_types::PeerlistEntry {
                    address: cn_types::NetworkAddress {
                        ip,
                        port: get_u32(&obj, "port")? as u16,
                    },
                    peer_id: get_u64(&obj, "id")?,
                    last_seen: get_u64(&obj, "last_seen")?,
                })
            }
            _ => Err(WireError::WrongType(name)),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub node_data: BasicNodeData,
    pub payload_data: CoreSyncData,
    /// A short peer-list head, handed over as part of the handshake reply
    /// (§4.6, §4.8 `getPeerlistHead`).
    pub local_peerlist_new: Vec<cn_types::PeerlistEntry>,
}

impl HandshakeResponse {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("node_data".into(), Value::Object(self.node_data.to_fields()));
        fields.insert(
            "payload_data".into(),
            Value::Object(self.payload_data.to_fields()),
        );
        fields.insert("local_peerlist_new".into(), peerlist_to_seq(&self.local_peerlist_new));
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        let node_data = match fields.get("node_data") {
            Some(Value::Object(obj)) => BasicNodeData::from_fields(obj)?,
            _ => return Err(WireError::MissingField("node_data")),
        };
        let payload_data = match fields.get("payload_data") {
            Some(Value::Object(obj)) => CoreSyncData::from_fields(obj)?,
            _ => return Err(WireError::MissingField("payload_data")),
        };
        Ok(Self {
            node_data,
            payload_data,
            local_peerlist_new: peerlist_from_seq(fields, "local_peerlist_new")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedSyncRequest {
    pub payload_data: CoreSyncData,
}

impl TimedSyncRequest {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            "payload_data".into(),
            Value::Object(self.payload_data.to_fields()),
        );
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        let payload_data = match fields.get("payload_data") {
            Some(Value::Object(obj)) => CoreSyncData::from_fields(obj)?,
            _ => return Err(WireError::MissingField("payload_data")),
        };
        Ok(Self { payload_data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedSyncResponse {
    pub payload_data: CoreSyncData,
    pub local_peerlist_new: Vec<cn_types::PeerlistEntry>,
}

impl TimedSyncResponse {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            "payload_data".into(),
            Value::Object(self.payload_data.to_fields()),
        );
        fields.insert("local_peerlist_new".into(), peerlist_to_seq(&self.local_peerlist_new));
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        let payload_data = match fields.get("payload_data") {
            Some(Value::Object(obj)) => CoreSyncData::from_fields(obj)?,
            _ => return Err(WireError::MissingField("payload_data")),
        };
        Ok(Self {
            payload_data,
            local_peerlist_new: peerlist_from_seq(fields, "local_peerlist_new")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingResponse {
    pub status: bool,
    pub peer_id: u64,
}

impl PingResponse {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("status".into(), Value::Bool(self.status));
        fields.insert("peer_id".into(), Value::U64(self.peer_id));
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        let status = matches!(fields.get("status"), Some(Value::Bool(true)));
        Ok(Self {
            status,
            peer_id: get_u64(fields, "peer_id")?,
        })
    }
}

/// `NOTIFY_NEW_BLOCK` (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyNewBlock {
    pub block_bytes: Vec<u8>,
    pub transactions_bytes: Vec<Vec<u8>>,
    pub current_blockchain_height: u64,
}

impl NotifyNewBlock {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("block".into(), Value::Bytes(self.block_bytes.clone().into()));
        fields.insert(
            "txs".into(),
            Value::Seq(
                self.transactions_bytes
                    .iter()
                    .map(|b| Value::Bytes(b.clone().into()))
                    .collect(),
            ),
        );
        fields.insert(
            "current_blockchain_height".into(),
            Value::U64(self.current_blockchain_height),
        );
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        let block_bytes = get_bytes(fields, "block")?;
        let transactions_bytes = get_seq(fields, "txs")?
            .into_iter()
            .map(|v| match v {
                Value::Bytes(b) => Ok(b.to_vec()),
                _ => Err(WireError::WrongType("txs")),
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            block_bytes,
            transactions_bytes,
            current_blockchain_height: get_u64(fields, "current_blockchain_height")?,
        })
    }
}

fn hashes_to_seq(hashes: &[Hash]) -> Value {
    Value::Seq(hashes.iter().map(|h| Value::Bytes(h.as_bytes().to_vec().into())).collect())
}

fn hashes_from_seq(fields: &Fields, name: &'static str) -> Result<Vec<Hash>, WireError> {
    get_seq(fields, name)?
        .into_iter()
        .map(|v| match v {
            Value::Bytes(b) => {
                let arr: [u8; 32] = b.to_vec().try_into().map_err(|_| WireError::WrongType(name))?;
                Ok(Hash(arr))
            }
            _ => Err(WireError::WrongType(name)),
        })
        .collect()
}

fn blobs_to_seq(blobs: &[Vec<u8>]) -> Value {
    Value::Seq(blobs.iter().map(|b| Value::Bytes(b.clone().into())).collect())
}

fn blobs_from_seq(fields: &Fields, name: &'static str) -> Result<Vec<Vec<u8>>, WireError> {
    get_seq(fields, name)?
        .into_iter()
        .map(|v| match v {
            Value::Bytes(b) => Ok(b.to_vec()),
            _ => Err(WireError::WrongType(name)),
        })
        .collect()
}

/// `NOTIFY_NEW_TRANSACTIONS` (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyNewTransactions {
    pub transactions_bytes: Vec<Vec<u8>>,
}

impl NotifyNewTransactions {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("txs".into(), blobs_to_seq(&self.transactions_bytes));
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        Ok(Self {
            transactions_bytes: blobs_from_seq(fields, "txs")?,
        })
    }
}

/// `NOTIFY_REQUEST_GET_OBJECTS` (§4.6 sync FSM).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestGetObjects {
    pub blocks: Vec<Hash>,
}

impl RequestGetObjects {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("blocks".into(), hashes_to_seq(&self.blocks));
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        Ok(Self {
            blocks: hashes_from_seq(fields, "blocks")?,
        })
    }
}

/// `NOTIFY_RESPONSE_GET_OBJECTS` (§4.4 `getBlocks`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseGetObjects {
    pub blocks: Vec<cn_types::RawBlock>,
    pub missed_ids: Vec<Hash>,
    pub current_blockchain_height: u64,
}

impl ResponseGetObjects {
    pub fn to_fields(&self) -> Fields {
        use cn_types::Encode;
        let mut fields = Fields::new();
        fields.insert(
            "blocks".into(),
            Value::Seq(
                self.blocks
                    .iter()
                    .map(|b| Value::Bytes(b.to_bytes().into()))
                    .collect(),
            ),
        );
        fields.insert("missed_ids".into(), hashes_to_seq(&self.missed_ids));
        fields.insert(
            "current_blockchain_height".into(),
            Value::U64(self.current_blockchain_height),
        );
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        use cn_types::Decode;
        let blocks = get_seq(fields, "blocks")?
            .into_iter()
            .map(|v| match v {
                Value::Bytes(b) => {
                    cn_types::RawBlock::from_bytes(&b).map_err(|_| WireError::WrongType("blocks"))
                }
                _ => Err(WireError::WrongType("blocks")),
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            blocks,
            missed_ids: hashes_from_seq(fields, "missed_ids")?,
            current_blockchain_height: get_u64(fields, "current_blockchain_height")?,
        })
    }
}

/// `NOTIFY_REQUEST_CHAIN`: a sparse, logarithmically-spaced locator of
/// main-chain hashes (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestChain {
    pub block_ids: Vec<Hash>,
}

impl RequestChain {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("block_ids".into(), hashes_to_seq(&self.block_ids));
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        Ok(Self {
            block_ids: hashes_from_seq(fields, "block_ids")?,
        })
    }
}

/// `NOTIFY_RESPONSE_CHAIN_ENTRY`: common-ancestor height plus a run of
/// hashes forward (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseChainEntry {
    pub start_height: u64,
    pub total_height: u64,
    pub block_ids: Vec<Hash>,
}

impl ResponseChainEntry {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("start_height".into(), Value::U64(self.start_height));
        fields.insert("total_height".into(), Value::U64(self.total_height));
        fields.insert("m_block_ids".into(), hashes_to_seq(&self.block_ids));
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        Ok(Self {
            start_height: get_u64(fields, "start_height")?,
            total_height: get_u64(fields, "total_height")?,
            block_ids: hashes_from_seq(fields, "m_block_ids")?,
        })
    }
}

/// `NOTIFY_REQUEST_TX_POOL`: requests the peer's mempool membership minus
/// the hashes we already hold (§4.6, `PoolSyncRequired` state).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTxPool {
    pub tx_hashes: Vec<Hash>,
}

impl RequestTxPool {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("txs".into(), hashes_to_seq(&self.tx_hashes));
        fields
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, WireError> {
        Ok(Self {
            tx_hashes: hashes_from_seq(fields, "txs")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_node_data_round_trips_through_fields() {
        let data = BasicNodeData {
            network_id: [7; 16],
            version: 1,
            local_time: 123,
            my_port: 8080,
            peer_id: 99,
        };
        let fields = data.to_fields();
        assert_eq!(BasicNodeData::from_fields(&fields).unwrap(), data);
    }

    #[test]
    fn handshake_request_round_trips() {
        let req = HandshakeRequest {
            node_data: BasicNodeData {
                network_id: [1; 16],
                version: 1,
                local_time: 10,
                my_port: 0,
                peer_id: 5,
            },
            payload_data: CoreSyncData {
                current_height: 10,
                top_block_hash: Hash::ZERO,
                cumulative_difficulty: 100,
            },
        };
        let fields = req.to_fields();
        assert_eq!(HandshakeRequest::from_fields(&fields).unwrap(), req);
    }

    #[test]
    fn handshake_response_round_trips_with_peerlist() {
        let resp = HandshakeResponse {
            node_data: BasicNodeData {
                network_id: [2; 16],
                version: 1,
                local_time: 20,
                my_port: 18080,
                peer_id: 9,
            },
            payload_data: CoreSyncData {
                current_height: 50,
                top_block_hash: Hash::ZERO,
                cumulative_difficulty: 500,
            },
            local_peerlist_new: vec![cn_types::PeerlistEntry {
                address: cn_types::NetworkAddress {
                    ip: "1.2.3.4".parse().unwrap(),
                    port: 18080,
                },
                peer_id: 1,
                last_seen: 1000,
            }],
        };
        let fields = resp.to_fields();
        assert_eq!(HandshakeResponse::from_fields(&fields).unwrap(), resp);
    }

    #[test]
    fn chain_entry_round_trips() {
        let entry = ResponseChainEntry {
            start_height: 10,
            total_height: 20,
            block_ids: vec![Hash::ZERO, Hash([1; 32])],
        };
        let fields = entry.to_fields();
        assert_eq!(ResponseChainEntry::from_fields(&fields).unwrap(), entry);
    }

    #[test]
    fn request_tx_pool_round_trips() {
        let req = RequestTxPool {
            tx_hashes: vec![Hash([3; 32])],
        };
        let fields = req.to_fields();
        assert_eq!(RequestTxPool::from_fields(&fields).unwrap(), req);
    }

    #[test]
    fn response_get_objects_round_trips() {
        let resp = ResponseGetObjects {
            blocks: vec![cn_types::RawBlock {
                block_bytes: vec![1, 2, 3],
                transactions_bytes: vec![vec![4, 5]],
            }],
            missed_ids: vec![Hash([9; 32])],
            current_blockchain_height: 42,
        };
        let fields = resp.to_fields();
        assert_eq!(ResponseGetObjects::from_fields(&fields).unwrap(), resp);
    }
}
