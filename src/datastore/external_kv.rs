//! External-KV datastore backend: a Redis-backed store where each
//! `(kind, address)` maps to an external key via a loaded address map,
//! grounded in the Python `RedisDatastore`.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};

use crate::encoding::{encode_words, Encoding, RegisterValue};
use crate::error::Error;
use crate::frame::{Address, ObjectKind, Quantity, Response};

use super::{Datastore, DatastoreError, SeedValue};

/// One entry of the address-map document: which external key backs a given
/// `(kind, address)`, and - for registers - how to interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressMapEntry {
    pub key: String,
    #[serde(default)]
    pub encoding: Option<String>,
    /// 1-indexed, most-significant-word-first selector into a multi-word
    /// value sharing `key` with other addresses. The Python source is
    /// ambiguous about whether this is 0- or 1-indexed; this implementation
    /// treats it as 1-indexed, matching how `struct.pack` output is sliced
    /// in `RedisDatastore.read` (`value[(part - 1) * 2 : part * 2]`).
    #[serde(default)]
    pub part: Option<u32>,
    #[serde(default)]
    pub initial_value: Option<serde_json::Value>,
}

/// The address-map document as loaded from JSON: kind name -> address
/// string -> entry.
pub type AddressMapDocument = HashMap<String, HashMap<String, AddressMapEntry>>;

type TypedAddressMap = HashMap<ObjectKind, HashMap<Address, AddressMapEntry>>;

const KNOWN_KINDS: [&str; 4] = [
    "coils",
    "discrete_inputs",
    "holding_registers",
    "input_registers",
];

fn verify_and_typed(mut document: AddressMapDocument) -> TypedAddressMap {
    for key in document.keys() {
        if !KNOWN_KINDS.contains(&key.as_str()) {
            log::warn!("address map contains non-standard key {key}");
        }
    }
    let mut typed = TypedAddressMap::new();
    for kind in ObjectKind::all() {
        let entries = document.remove(kind.name()).unwrap_or_default();
        let mut by_address = HashMap::with_capacity(entries.len());
        for (address_str, entry) in entries {
            if let Ok(address) = address_str.parse::<Address>() {
                by_address.insert(address, entry);
            } else {
                log::warn!("ignoring non-numeric address {address_str:?} for {kind}");
            }
        }
        typed.insert(kind, by_address);
    }
    typed
}

/// Redis-backed datastore. Connects lazily over a multiplexed async
/// connection, as `EvanL1-VoltageEMS`'s Redis-backed services do.
pub struct ExternalKvDatastore {
    address_map: RwLock<TypedAddressMap>,
    connection: Mutex<redis::aio::MultiplexedConnection>,
}

impl ExternalKvDatastore {
    pub async fn connect(redis_url: &str, address_map: AddressMapDocument) -> Result<Self, Error> {
        let client =
            redis::Client::open(redis_url).map_err(|e| Error::Config(e.to_string()))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            address_map: RwLock::new(verify_and_typed(address_map)),
            connection: Mutex::new(connection),
        })
    }

    /// Write every address-map entry's `initial_value` to its backing key.
    pub async fn apply_initial_values(&self) -> Result<(), DatastoreError> {
        let address_map = self.address_map.read().await;
        let mut connection = self.connection.lock().await;
        for entries in address_map.values() {
            for entry in entries.values() {
                let Some(initial_value) = &entry.initial_value else {
                    continue;
                };
                let value_str = json_scalar_to_string(initial_value);
                connection
                    .set::<_, _, ()>(&entry.key, value_str)
                    .await
                    .map_err(|e| DatastoreError::BackendFailure(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn entry_for(&self, kind: ObjectKind, address: Address) -> Option<AddressMapEntry> {
        self.address_map
            .read()
            .await
            .get(&kind)
            .and_then(|m| m.get(&address))
            .cloned()
    }
}

fn json_scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Datastore for ExternalKvDatastore {
    async fn read(
        &self,
        kind: ObjectKind,
        first_address: Address,
        quantity: Quantity,
    ) -> Result<Response, DatastoreError> {
        if kind.is_bit_kind() {
            let mut bits = Vec::with_capacity(quantity as usize);
            for i in 0..quantity {
                let address = first_address.wrapping_add(i);
                let entry = self
                    .entry_for(kind, address)
                    .await
                    .ok_or(DatastoreError::NotFound)?;
                let raw = self.get_raw(&entry.key).await?;
                bits.push(parse_bool(&raw)?);
            }
            Ok(Response::Bits(bits))
        } else {
            let mut words = Vec::with_capacity(quantity as usize);
            for i in 0..quantity {
                let address = first_address.wrapping_add(i);
                let entry = self
                    .entry_for(kind, address)
                    .await
                    .ok_or(DatastoreError::NotFound)?;
                let encoding_tag = entry
                    .encoding
                    .as_deref()
                    .ok_or_else(|| DatastoreError::BackendFailure("missing encoding".to_owned()))?;
                let encoding = Encoding::from_tag(encoding_tag)
                    .map_err(|e| DatastoreError::BackendFailure(e.to_string()))?;
                let raw = self.get_raw(&entry.key).await?;
                let value = parse_register_value(encoding, &raw)?;
                let all_words = encode_words(encoding, value)
                    .map_err(|e| DatastoreError::BackendFailure(e.to_string()))?;
                let word_index = entry.part.map(|p| (p.saturating_sub(1)) as usize).unwrap_or(0);
                let word = *all_words
                    .get(word_index)
                    .ok_or_else(|| DatastoreError::BackendFailure("part out of range".to_owned()))?;
                words.push(word);
            }
            Ok(Response::Words(words))
        }
    }

    async fn write(
        &self,
        kind: ObjectKind,
        address: Address,
        value: SeedValue,
    ) -> Result<(), DatastoreError> {
        let key = {
            let entry = self.entry_for(kind, address).await;
            match entry {
                Some(entry) => entry.key,
                None => {
                    // auto-vivification: an unmapped address gets a
                    // synthetic key, matching the Python source's
                    // `KeyError` fallback in `RedisDatastore.write`.
                    let key = format!("{kind}:{address}");
                    let encoding = match value {
                        SeedValue::Register(_, encoding) => Some(encoding.tag().to_string()),
                        SeedValue::Bit(_) => None,
                    };
                    self.address_map.write().await.entry(kind).or_default().insert(
                        address,
                        AddressMapEntry {
                            key: key.clone(),
                            encoding,
                            part: None,
                            initial_value: None,
                        },
                    );
                    key
                }
            }
        };

        let value_str = match value {
            SeedValue::Bit(bit) => bit.to_string(),
            SeedValue::Register(register_value, _) => match register_value {
                RegisterValue::Int(v) => v.to_string(),
                RegisterValue::UInt(v) => v.to_string(),
                RegisterValue::Float(v) => v.to_string(),
            },
        };
        let mut connection = self.connection.lock().await;
        connection
            .set::<_, _, ()>(&key, value_str)
            .await
            .map_err(|e| DatastoreError::BackendFailure(e.to_string()))
    }

    async fn dump(&self) -> serde_json::Value {
        let address_map = self.address_map.read().await;
        let mut out = serde_json::Map::new();
        for (kind, entries) in address_map.iter() {
            let entries_json: HashMap<String, serde_json::Value> = entries
                .iter()
                .map(|(address, entry)| {
                    (
                        address.to_string(),
                        json!({"key": entry.key, "encoding": entry.encoding, "part": entry.part}),
                    )
                })
                .collect();
            out.insert(kind.name().to_owned(), json!(entries_json));
        }
        serde_json::Value::Object(out)
    }
}

impl ExternalKvDatastore {
    async fn get_raw(&self, key: &str) -> Result<String, DatastoreError> {
        let mut connection = self.connection.lock().await;
        let raw: Option<String> = connection
            .get(key)
            .await
            .map_err(|e| DatastoreError::BackendFailure(e.to_string()))?;
        raw.ok_or_else(|| {
            log::warn!("key {key} not found in external-kv backend");
            DatastoreError::NotFound
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool, DatastoreError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(DatastoreError::BackendFailure(format!(
            "not a boolean: {other:?}"
        ))),
    }
}

fn parse_register_value(encoding: Encoding, raw: &str) -> Result<RegisterValue, DatastoreError> {
    let parse_err = |_| DatastoreError::BackendFailure(format!("not a number: {raw:?}"));
    match encoding {
        Encoding::I16 | Encoding::I32 => Ok(RegisterValue::Int(raw.parse().map_err(parse_err)?)),
        Encoding::U16 | Encoding::U32 => Ok(RegisterValue::UInt(raw.parse().map_err(parse_err)?)),
        Encoding::F16 | Encoding::F32 | Encoding::F64 => {
            Ok(RegisterValue::Float(raw.parse().map_err(parse_err)?))
        }
    }
}
