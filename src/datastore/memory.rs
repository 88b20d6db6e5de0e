//! In-memory datastore backend: four independent address-keyed maps, one
//! per object kind, held behind a `RwLock` so many connections can read
//! concurrently while a seed call or a rare write blocks them briefly.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;

use crate::encoding::encode_words;
use crate::frame::{Address, ObjectKind, Quantity, Response};

use super::{Datastore, DatastoreError, SeedValue};

/// Backed by plain `HashMap`s, matching the Python `DictDatastore`'s four
/// always-present dicts. Unlike the Python original, a multi-word write
/// splits its value across one map entry per consecutive address instead of
/// storing the whole encoded value under the first address - the Python
/// source's `write()` computes per-chunk byte slices but then falls through
/// to the single-address assignment below the loop, silently discarding the
/// split; this implementation keeps the split.
#[derive(Debug, Default)]
pub struct InMemoryDatastore {
    coils: RwLock<HashMap<Address, bool>>,
    discrete_inputs: RwLock<HashMap<Address, bool>>,
    holding_registers: RwLock<HashMap<Address, [u8; 2]>>,
    input_registers: RwLock<HashMap<Address, [u8; 2]>>,
}

impl InMemoryDatastore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all four kind maps in place, without replacing them.
    pub async fn empty(&self) {
        self.coils.write().await.clear();
        self.discrete_inputs.write().await.clear();
        self.holding_registers.write().await.clear();
        self.input_registers.write().await.clear();
    }

    fn bit_map(&self, kind: ObjectKind) -> &RwLock<HashMap<Address, bool>> {
        match kind {
            ObjectKind::Coils => &self.coils,
            ObjectKind::DiscreteInputs => &self.discrete_inputs,
            ObjectKind::HoldingRegisters | ObjectKind::InputRegisters => {
                unreachable!("bit_map called for a register kind")
            }
        }
    }

    fn word_map(&self, kind: ObjectKind) -> &RwLock<HashMap<Address, [u8; 2]>> {
        match kind {
            ObjectKind::HoldingRegisters => &self.holding_registers,
            ObjectKind::InputRegisters => &self.input_registers,
            ObjectKind::Coils | ObjectKind::DiscreteInputs => {
                unreachable!("word_map called for a bit kind")
            }
        }
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn read(
        &self,
        kind: ObjectKind,
        first_address: Address,
        quantity: Quantity,
    ) -> Result<Response, DatastoreError> {
        let addresses = (0..quantity).map(|i| first_address.wrapping_add(i));
        if kind.is_bit_kind() {
            let map = self.bit_map(kind).read().await;
            let mut bits = Vec::with_capacity(quantity as usize);
            for address in addresses {
                bits.push(*map.get(&address).ok_or(DatastoreError::NotFound)?);
            }
            Ok(Response::Bits(bits))
        } else {
            let map = self.word_map(kind).read().await;
            let mut words = Vec::with_capacity(quantity as usize);
            for address in addresses {
                words.push(*map.get(&address).ok_or(DatastoreError::NotFound)?);
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
        match (kind.is_bit_kind(), value) {
            (true, SeedValue::Bit(bit)) => {
                self.bit_map(kind).write().await.insert(address, bit);
                Ok(())
            }
            (false, SeedValue::Register(register_value, encoding)) => {
                let words = encode_words(encoding, register_value)
                    .map_err(|e| DatastoreError::BackendFailure(e.to_string()))?;
                let mut map = self.word_map(kind).write().await;
                for (i, word) in words.into_iter().enumerate() {
                    map.insert(address.wrapping_add(i as u16), word);
                }
                Ok(())
            }
            _ => Err(DatastoreError::BackendFailure(
                "value kind does not match object kind".to_owned(),
            )),
        }
    }

    async fn dump(&self) -> serde_json::Value {
        let coils = self.coils.read().await;
        let discrete_inputs = self.discrete_inputs.read().await;
        let holding_registers = self.holding_registers.read().await;
        let input_registers = self.input_registers.read().await;
        json!({
            "coils": coils.iter().map(|(a, v)| (a.to_string(), *v)).collect::<HashMap<_, _>>(),
            "discrete_inputs": discrete_inputs.iter().map(|(a, v)| (a.to_string(), *v)).collect::<HashMap<_, _>>(),
            "holding_registers": holding_registers.iter().map(|(a, v)| (a.to_string(), u16::from_be_bytes(*v))).collect::<HashMap<_, _>>(),
            "input_registers": input_registers.iter().map(|(a, v)| (a.to_string(), u16::from_be_bytes(*v))).collect::<HashMap<_, _>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Encoding, RegisterValue};

    #[tokio::test]
    async fn read_unmapped_address_is_not_found() {
        let store = InMemoryDatastore::new();
        let err = store.read(ObjectKind::Coils, 0, 1).await.unwrap_err();
        assert_eq!(err, DatastoreError::NotFound);
    }

    #[tokio::test]
    async fn write_then_read_single_coil() {
        let store = InMemoryDatastore::new();
        store
            .write(ObjectKind::Coils, 0, SeedValue::Bit(true))
            .await
            .unwrap();
        let response = store.read(ObjectKind::Coils, 0, 1).await.unwrap();
        assert_eq!(response, Response::Bits(vec![true]));
    }

    #[tokio::test]
    async fn multi_word_write_splits_across_consecutive_addresses() {
        let store = InMemoryDatastore::new();
        store
            .write(
                ObjectKind::HoldingRegisters,
                10,
                SeedValue::Register(RegisterValue::UInt(0x0001_0002), Encoding::U32),
            )
            .await
            .unwrap();
        let response = store.read(ObjectKind::HoldingRegisters, 10, 2).await.unwrap();
        assert_eq!(
            response,
            Response::Words(vec![[0x00, 0x01], [0x00, 0x02]])
        );
    }

    #[tokio::test]
    async fn read_past_the_written_range_is_not_found() {
        let store = InMemoryDatastore::new();
        store
            .write(ObjectKind::Coils, 0, SeedValue::Bit(true))
            .await
            .unwrap();
        let err = store.read(ObjectKind::Coils, 0, 2).await.unwrap_err();
        assert_eq!(err, DatastoreError::NotFound);
    }

    #[tokio::test]
    async fn empty_clears_all_four_kind_maps() {
        let store = InMemoryDatastore::new();
        store
            .write(ObjectKind::Coils, 0, SeedValue::Bit(true))
            .await
            .unwrap();
        store
            .write(
                ObjectKind::HoldingRegisters,
                0,
                SeedValue::Register(RegisterValue::UInt(7), Encoding::U16),
            )
            .await
            .unwrap();

        store.empty().await;

        assert_eq!(
            store.read(ObjectKind::Coils, 0, 1).await.unwrap_err(),
            DatastoreError::NotFound
        );
        assert_eq!(
            store
                .read(ObjectKind::HoldingRegisters, 0, 1)
                .await
                .unwrap_err(),
            DatastoreError::NotFound
        );
    }
}
