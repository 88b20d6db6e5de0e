//! Public seed API: load values into a [`Datastore`] before or while a
//! server is running, grounded in the Python source's
//! `set_coil`/`set_coils`/etc. convenience methods and their `_set_value`
//! validation.

use crate::datastore::{Datastore, SeedValue};
use crate::encoding::{Encoding, RegisterValue};
use crate::error::{Error, Result};
use crate::frame::{Address, ObjectKind};

/// A handle for writing values into a datastore's four object kinds.
///
/// Holds only a borrow, not ownership: callers typically keep an
/// `Arc<dyn Datastore>` around, pass one clone to [`crate::server::Server::bind`],
/// and build a `Seed` from the other to preload or update values while the
/// server runs.
pub struct Seed<'a> {
    datastore: &'a dyn Datastore,
}

impl<'a> Seed<'a> {
    #[must_use]
    pub fn new(datastore: &'a dyn Datastore) -> Self {
        Self { datastore }
    }

    pub async fn set_coil(&self, address: u32, value: bool) -> Result<()> {
        self.set_bit(ObjectKind::Coils, address, value).await
    }

    pub async fn set_coils(&self, start_address: u32, values: &[bool]) -> Result<()> {
        self.set_bits(ObjectKind::Coils, start_address, values).await
    }

    pub async fn set_discrete_input(&self, address: u32, value: bool) -> Result<()> {
        self.set_bit(ObjectKind::DiscreteInputs, address, value).await
    }

    pub async fn set_discrete_inputs(&self, start_address: u32, values: &[bool]) -> Result<()> {
        self.set_bits(ObjectKind::DiscreteInputs, start_address, values)
            .await
    }

    pub async fn set_input_register(&self, address: u32, value: f64, encoding: &str) -> Result<()> {
        self.set_register(ObjectKind::InputRegisters, address, value, encoding)
            .await
    }

    pub async fn set_input_registers(
        &self,
        start_address: u32,
        values: &[f64],
        encoding: &str,
    ) -> Result<()> {
        self.set_registers(ObjectKind::InputRegisters, start_address, values, encoding)
            .await
    }

    pub async fn set_holding_register(&self, address: u32, value: f64, encoding: &str) -> Result<()> {
        self.set_register(ObjectKind::HoldingRegisters, address, value, encoding)
            .await
    }

    pub async fn set_holding_registers(
        &self,
        start_address: u32,
        values: &[f64],
        encoding: &str,
    ) -> Result<()> {
        self.set_registers(ObjectKind::HoldingRegisters, start_address, values, encoding)
            .await
    }

    /// A snapshot of the backend's current contents.
    pub async fn dump(&self) -> serde_json::Value {
        self.datastore.dump().await
    }

    async fn set_bit(&self, kind: ObjectKind, address: u32, value: bool) -> Result<()> {
        let address = validate_address(address)?;
        self.datastore
            .write(kind, address, SeedValue::Bit(value))
            .await
            .map_err(|e| Error::Config(e.to_string()))
    }

    async fn set_bits(&self, kind: ObjectKind, start_address: u32, values: &[bool]) -> Result<()> {
        for (i, &value) in values.iter().enumerate() {
            self.set_bit(kind, start_address + i as u32, value).await?;
        }
        Ok(())
    }

    async fn set_register(&self, kind: ObjectKind, address: u32, value: f64, encoding: &str) -> Result<()> {
        let address = validate_address(address)?;
        let encoding = validate_seed_encoding(encoding)?;
        let register_value = register_value_from_f64(encoding, value);
        self.datastore
            .write(kind, address, SeedValue::Register(register_value, encoding))
            .await
            .map_err(|e| Error::Config(e.to_string()))
    }

    async fn set_registers(
        &self,
        kind: ObjectKind,
        start_address: u32,
        values: &[f64],
        encoding: &str,
    ) -> Result<()> {
        let parsed_encoding = validate_seed_encoding(encoding)?;
        let step = parsed_encoding.word_count() as u32;
        let mut address = start_address;
        for &value in values {
            self.set_register(kind, address, value, encoding).await?;
            address += step;
        }
        Ok(())
    }
}

fn validate_address(address: u32) -> Result<Address> {
    Address::try_from(address).map_err(|_| Error::InvalidAddress(address))
}

/// Only `{h, H, e, f}` are accepted by the seed API, matching the Python
/// source's `_set_value` - wider encodings (`i`, `I`, `d`) are reachable only
/// through the external-KV backend's own address-map configuration.
fn validate_seed_encoding(tag: &str) -> Result<Encoding> {
    match tag {
        "h" => Ok(Encoding::I16),
        "H" => Ok(Encoding::U16),
        "e" => Ok(Encoding::F16),
        "f" => Ok(Encoding::F32),
        _ => Err(Error::InvalidEncoding(tag.to_owned())),
    }
}

fn register_value_from_f64(encoding: Encoding, value: f64) -> RegisterValue {
    match encoding {
        Encoding::I16 | Encoding::I32 => RegisterValue::Int(value as i64),
        Encoding::U16 | Encoding::U32 => RegisterValue::UInt(value as u64),
        Encoding::F16 | Encoding::F32 | Encoding::F64 => RegisterValue::Float(value),
    }
}
