//! Wire messages exchanged with the display firmware.
//!
//! These are hand-derived prost structs rather than build-script output: the
//! firmware's protobuf schema is the wire contract, so the field numbers
//! below must never change.

/// Host → display envelope.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToSplitflap {
    #[prost(uint32, tag = "1")]
    pub nonce: u32,
    #[prost(oneof = "to_splitflap::Payload", tags = "2, 3")]
    pub payload: Option<to_splitflap::Payload>,
}

pub mod to_splitflap {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        SplitflapConfig(super::SplitflapConfig),
        #[prost(message, tag = "3")]
        RequestState(super::RequestState),
    }
}

/// Display → host envelope.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FromSplitflap {
    #[prost(oneof = "from_splitflap::Payload", tags = "1, 2, 3, 4, 5")]
    pub payload: Option<from_splitflap::Payload>,
}

pub mod from_splitflap {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        SplitflapState(super::SplitflapState),
        #[prost(message, tag = "2")]
        Log(super::Log),
        #[prost(message, tag = "3")]
        Ack(super::Ack),
        #[prost(message, tag = "4")]
        SupervisorState(super::SupervisorState),
        #[prost(message, tag = "5")]
        GeneralState(super::GeneralState),
    }
}

/// Full desired configuration, one entry per module.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SplitflapConfig {
    #[prost(message, repeated, tag = "1")]
    pub modules: Vec<ModuleConfig>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ModuleConfig {
    #[prost(uint32, tag = "1")]
    pub target_flap_index: u32,
    /// Incrementing this commands a re-seek even with an unchanged target.
    /// Wraps at 256.
    #[prost(uint32, tag = "2")]
    pub movement_nonce: u32,
    /// Reserved; not driven by this daemon.
    #[prost(uint32, tag = "3")]
    pub reset_nonce: u32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RequestState {}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Ack {
    #[prost(uint32, tag = "1")]
    pub nonce: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Log {
    #[prost(string, tag = "1")]
    pub msg: String,
}

/// Reported position and health of every module.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SplitflapState {
    #[prost(message, repeated, tag = "1")]
    pub modules: Vec<ModuleState>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ModuleState {
    #[prost(enumeration = "ModuleStatus", tag = "1")]
    pub state: i32,
    #[prost(uint32, tag = "2")]
    pub flap_index: u32,
    #[prost(bool, tag = "3")]
    pub moving: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
#[repr(i32)]
pub enum ModuleStatus {
    Normal = 0,
    LookForHome = 1,
    SensorError = 2,
    Panic = 3,
}

/// Firmware-wide information. Only the character set matters to this
/// daemon; other fields are skipped as unknowns by prost.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GeneralState {
    #[prost(bytes = "vec", tag = "1")]
    pub flap_character_set: Vec<u8>,
}

/// Chainlink supervisor board heartbeat. Accepted and dropped.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SupervisorState {
    #[prost(uint32, tag = "1")]
    pub uptime_millis: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_to_splitflap_round_trip() {
        let msg = ToSplitflap {
            nonce: 42,
            payload: Some(to_splitflap::Payload::SplitflapConfig(SplitflapConfig {
                modules: vec![
                    ModuleConfig {
                        target_flap_index: 7,
                        movement_nonce: 3,
                        reset_nonce: 0,
                    };
                    4
                ],
            })),
        };
        let bytes = msg.encode_to_vec();
        let back = ToSplitflap::decode(bytes.as_slice()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_ack_round_trip() {
        let msg = FromSplitflap {
            payload: Some(from_splitflap::Payload::Ack(Ack { nonce: 300 })),
        };
        let back = FromSplitflap::decode(msg.encode_to_vec().as_slice()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_module_status_enum_values() {
        // pinned by the firmware schema
        assert_eq!(ModuleStatus::Normal as i32, 0);
        assert_eq!(ModuleStatus::LookForHome as i32, 1);
        assert_eq!(ModuleStatus::SensorError as i32, 2);
        assert_eq!(ModuleStatus::Panic as i32, 3);
    }
}
