//! BLE attack catalogue

use bleshock_attack::AttackStrategy;
use bleshock_core::{
    AttackDescriptor, AttackId, AttackParams, Error, ParamDescriptor, ParameterType, Result,
};

use super::attack::{KeySizeOverflowAttack, SequentialAttAttack};

/// Attack ID of [`KeySizeOverflowAttack`]
pub const KEY_SIZE_OVERFLOW: AttackId = AttackId(0);

/// Attack ID of [`SequentialAttAttack`]
pub const SEQUENTIAL_ATT: AttackId = AttackId(1);

/// Catalogue of BLE attacks
#[derive(Debug, Clone)]
pub struct BleProtocol {
    attacks: Vec<AttackDescriptor>,
}

impl BleProtocol {
    pub fn new() -> Self {
        Self {
            attacks: vec![
                AttackDescriptor {
                    id: KEY_SIZE_OVERFLOW,
                    shortname: "key-size-overflow",
                    name: "SM Key Size Overflow",
                    description: "Pairing request with an out-of-range max key size, then a zeroed LL_ENC_REQ",
                    parameters: vec![
                        ParamDescriptor::new("max_key_size", ParameterType::U8)
                            .with_description("Maximum encryption key size in the pairing request")
                            .with_default(KeySizeOverflowAttack::DEFAULT_MAX_KEY_SIZE.to_string()),
                        ParamDescriptor::new("io_capability", ParameterType::U8)
                            .with_description("IO capability")
                            .with_default("4".to_string()),
                        ParamDescriptor::new("auth_req", ParameterType::U8)
                            .with_description("AuthReq flags")
                            .with_default(format!("0x{:02x}", KeySizeOverflowAttack::DEFAULT_AUTH_REQ)),
                        ParamDescriptor::new("key_distribution", ParameterType::U8)
                            .with_description("Initiator and responder key distribution")
                            .with_default(format!(
                                "0x{:02x}",
                                KeySizeOverflowAttack::DEFAULT_KEY_DISTRIBUTION
                            )),
                    ],
                },
                AttackDescriptor {
                    id: SEQUENTIAL_ATT,
                    shortname: "sequential-att",
                    name: "Sequential ATT Requests",
                    description: "Back-to-back ATT MTU exchange requests without waiting for a response",
                    parameters: vec![
                        ParamDescriptor::new("mtu", ParameterType::U16)
                            .with_description("Client RX MTU in each request")
                            .with_default(SequentialAttAttack::DEFAULT_MTU.to_string()),
                        ParamDescriptor::new("requests", ParameterType::U8)
                            .with_description("Requests per burst")
                            .with_default(SequentialAttAttack::DEFAULT_REQUESTS.to_string()),
                    ],
                },
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        "Bluetooth Low Energy"
    }

    pub fn shortname(&self) -> &'static str {
        "ble"
    }

    pub fn attacks(&self) -> &[AttackDescriptor] {
        &self.attacks
    }

    /// Look an attack up by numeric ID or short name
    pub fn find(&self, key: &str) -> Option<&AttackDescriptor> {
        match key.parse::<u8>() {
            Ok(id) => self.attacks.iter().find(|a| a.id == AttackId(id)),
            Err(_) => self
                .attacks
                .iter()
                .find(|a| a.shortname.eq_ignore_ascii_case(key)),
        }
    }

    /// Instantiate an attack strategy
    pub fn build(&self, key: &str, params: &AttackParams) -> Result<Box<dyn AttackStrategy>> {
        let descriptor = self
            .find(key)
            .ok_or_else(|| Error::NotFound(format!("attack '{}'", key)))?;
        params.check_known(&descriptor.parameters)?;

        match descriptor.id {
            KEY_SIZE_OVERFLOW => Ok(Box::new(KeySizeOverflowAttack::from_params(params)?)),
            SEQUENTIAL_ATT => Ok(Box::new(SequentialAttAttack::from_params(params)?)),
            id => Err(Error::NotFound(format!("attack id {}", id))),
        }
    }
}

impl Default for BleProtocol {
    fn default() -> Self {
        Self::new()
    }
}
