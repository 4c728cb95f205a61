//! Console model catalog

use serde::{Deserialize, Serialize};
use std::fmt;

/// OSC port used by every X32/M32 variant
pub const X32_PORT: u16 = 10023;

/// OSC port used by every Wing variant
pub const WING_PORT: u16 = 2222;

/// Console hardware lineage sharing one control-protocol convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    #[serde(rename = "X32/M32")]
    X32M32,
    #[serde(rename = "Wing")]
    Wing,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::X32M32 => "X32/M32",
            Family::Wing => "Wing",
        }
    }

    /// Default OSC port for this family
    pub fn default_port(&self) -> u16 {
        match self {
            Family::X32M32 => X32_PORT,
            Family::Wing => WING_PORT,
        }
    }

    /// Model assumed when only the family is known
    pub fn default_model(&self) -> ConsoleModel {
        match self {
            Family::X32M32 => ConsoleModel::X32,
            Family::Wing => ConsoleModel::Wing,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known console models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsoleModel {
    // Midas M32 series
    #[serde(rename = "M32")]
    M32,
    #[serde(rename = "M32R")]
    M32R,
    #[serde(rename = "M32C")]
    M32C,
    #[serde(rename = "M32_LIVE")]
    M32Live,

    // Behringer X32 series
    #[serde(rename = "X32")]
    X32,
    #[serde(rename = "X32_COMPACT")]
    X32Compact,
    #[serde(rename = "X32_PRODUCER")]
    X32Producer,
    #[serde(rename = "X32_RACK")]
    X32Rack,
    #[serde(rename = "X32_CORE")]
    X32Core,

    // Behringer Wing series
    #[serde(rename = "WING")]
    Wing,
    #[serde(rename = "WING_RACK")]
    WingRack,
    #[serde(rename = "WING_COMPACT")]
    WingCompact,
}

impl ConsoleModel {
    pub const ALL: [ConsoleModel; 12] = [
        ConsoleModel::M32,
        ConsoleModel::M32R,
        ConsoleModel::M32C,
        ConsoleModel::M32Live,
        ConsoleModel::X32,
        ConsoleModel::X32Compact,
        ConsoleModel::X32Producer,
        ConsoleModel::X32Rack,
        ConsoleModel::X32Core,
        ConsoleModel::Wing,
        ConsoleModel::WingRack,
        ConsoleModel::WingCompact,
    ];

    /// Wire identifier, also used as the prefix of device ids
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleModel::M32 => "M32",
            ConsoleModel::M32R => "M32R",
            ConsoleModel::M32C => "M32C",
            ConsoleModel::M32Live => "M32_LIVE",
            ConsoleModel::X32 => "X32",
            ConsoleModel::X32Compact => "X32_COMPACT",
            ConsoleModel::X32Producer => "X32_PRODUCER",
            ConsoleModel::X32Rack => "X32_RACK",
            ConsoleModel::X32Core => "X32_CORE",
            ConsoleModel::Wing => "WING",
            ConsoleModel::WingRack => "WING_RACK",
            ConsoleModel::WingCompact => "WING_COMPACT",
        }
    }

    /// Marketing name of the product
    pub fn product_name(&self) -> &'static str {
        match self {
            ConsoleModel::M32 => "Midas M32",
            ConsoleModel::M32R => "Midas M32R",
            ConsoleModel::M32C => "Midas M32C",
            ConsoleModel::M32Live => "Midas M32 LIVE",
            ConsoleModel::X32 => "Behringer X32",
            ConsoleModel::X32Compact => "Behringer X32 Compact",
            ConsoleModel::X32Producer => "Behringer X32 Producer",
            ConsoleModel::X32Rack => "Behringer X32 Rack",
            ConsoleModel::X32Core => "Behringer X32 Core",
            ConsoleModel::Wing => "Behringer Wing",
            ConsoleModel::WingRack => "Behringer Wing Rack",
            ConsoleModel::WingCompact => "Behringer Wing Compact",
        }
    }

    pub fn family(&self) -> Family {
        match self {
            ConsoleModel::Wing | ConsoleModel::WingRack | ConsoleModel::WingCompact => {
                Family::Wing
            }
            _ => Family::X32M32,
        }
    }

    pub fn default_port(&self) -> u16 {
        self.family().default_port()
    }

    /// Number of input channels on the surface
    pub fn max_channels(&self) -> u8 {
        match self {
            ConsoleModel::Wing | ConsoleModel::WingRack => 48,
            // Compact has fewer channels
            ConsoleModel::WingCompact => 40,
            _ => 32,
        }
    }
}

impl fmt::Display for ConsoleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
