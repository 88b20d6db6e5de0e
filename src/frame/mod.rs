//! Protocol-level types: object kinds, requests/responses, exceptions.

pub mod tcp;

use std::fmt;

/// A Modbus function code, as carried on the wire.
pub(crate) type FunctionCode = u8;

/// A Modbus protocol address, `0..=65535`.
pub type Address = u16;

/// Number of elements to read, `0..=65535`.
pub type Quantity = u16;

/// One of the four Modbus object kinds this server exposes.
///
/// Each kind has its own independent address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Coils,
    DiscreteInputs,
    HoldingRegisters,
    InputRegisters,
}

impl ObjectKind {
    /// Map an incoming read function code to the object kind it addresses.
    ///
    /// Only the four read function codes are recognized; everything else
    /// (including the write codes 5/6/15/16) is rejected upstream with
    /// exception 1 before this is consulted.
    #[must_use]
    pub(crate) fn from_function_code(code: FunctionCode) -> Option<Self> {
        match code {
            0x01 => Some(Self::Coils),
            0x02 => Some(Self::DiscreteInputs),
            0x03 => Some(Self::HoldingRegisters),
            0x04 => Some(Self::InputRegisters),
            _ => None,
        }
    }

    #[must_use]
    pub(crate) fn read_function_code(self) -> FunctionCode {
        match self {
            Self::Coils => 0x01,
            Self::DiscreteInputs => 0x02,
            Self::HoldingRegisters => 0x03,
            Self::InputRegisters => 0x04,
        }
    }

    /// `true` for the two single-bit kinds, `false` for the two register kinds.
    #[must_use]
    pub fn is_bit_kind(self) -> bool {
        matches!(self, Self::Coils | Self::DiscreteInputs)
    }

    /// Inclusive maximum quantity a single read request may ask for.
    #[must_use]
    pub(crate) fn max_quantity(self) -> Quantity {
        if self.is_bit_kind() {
            2000
        } else {
            125
        }
    }

    /// `true` if `quantity` is within `1..=max_quantity()`.
    #[must_use]
    pub(crate) fn quantity_in_range(self, quantity: Quantity) -> bool {
        quantity >= 1 && quantity <= self.max_quantity()
    }

    /// Canonical lowercase name, as used in address-map documents.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Coils => "coils",
            Self::DiscreteInputs => "discrete_inputs",
            Self::HoldingRegisters => "holding_registers",
            Self::InputRegisters => "input_registers",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "coils" => Some(Self::Coils),
            "discrete_inputs" => Some(Self::DiscreteInputs),
            "holding_registers" => Some(Self::HoldingRegisters),
            "input_registers" => Some(Self::InputRegisters),
            _ => None,
        }
    }

    /// All four kinds, in a stable order; used to build empty backend maps.
    #[must_use]
    pub(crate) const fn all() -> [Self; 4] {
        [
            Self::Coils,
            Self::DiscreteInputs,
            Self::HoldingRegisters,
            Self::InputRegisters,
        ]
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A read request, already validated to be one of the four supported kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub kind: ObjectKind,
    pub address: Address,
    pub quantity: Quantity,
}

/// The data of a successful read.
///
/// Bit kinds return one boolean per address; register kinds return one
/// already-serialized big-endian word per address. This mirrors the
/// datastore's `read` contract: the datastore, not the codec, owns the
/// conversion from a possibly-wide numeric value to 16-bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Bits(Vec<bool>),
    Words(Vec<[u8; 2]>),
}

/// A server-side Modbus exception, restricted to the four codes this system
/// emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    SlaveDeviceFailure = 0x04,
}

impl Exception {
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::SlaveDeviceFailure => "Slave device failure",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for Exception {}

/// A server exception response, tied to the function code that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: Exception,
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modbus function {}: {}", self.function, self.exception)
    }
}

impl std::error::Error for ExceptionResponse {}
