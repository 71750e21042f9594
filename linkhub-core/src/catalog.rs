//! Static capability catalog for LINK child devices
//!
//! A child device is identified by a device-type code and, for composite
//! coolers, a secondary cooler-type code. Resolution is a two-step lookup:
//! [`DeviceKind::from_code`] first, then [`DeviceKind::resolve`] with the
//! cooler type, which yields the LED geometry and sensor capabilities.

use serde::{Deserialize, Serialize};

/// LED geometry of a child device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    /// Display name of the model
    pub name: &'static str,
    /// Canvas size (width, height)
    pub size: (u32, u32),
    /// LED positions (x, y) in logical order
    pub led_positions: &'static [(u32, u32)],
    /// Logical LED index to physical transmit slot
    pub led_map: &'static [usize],
}

impl Geometry {
    /// Number of LEDs the device transmits
    pub fn led_count(&self) -> usize {
        self.led_map.len()
    }

    /// LED names, numbered from 1
    pub fn led_names(&self) -> Vec<String> {
        (1..=self.led_positions.len())
            .map(|index| format!("LED {}", index))
            .collect()
    }
}

/// Device-type codes reported in the child device table
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    QxFan = 1,
    LxFan = 2,
    RxMaxFan = 3,
    RxMaxPwmFan = 4,
    LsAdapter = 5,
    LinkLcd = 6,
    LinkAio = 7,
    Xc7RgbElite = 9,
    Xg3Hybrid = 10,
    Xd5Elite = 12,
    Xg7Rgb = 13,
    Xd5EliteLcd = 14,
    RxFan = 15,
    VrmFan = 16,
    TitanAio = 17,
    RxPwmFan = 19,
    Xd6Elite = 25,
}

/// Sub-models of the composite cooler kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AioModel {
    H100i,
    H115i,
    H150i,
    H170i,
    Titan240,
    Titan280,
    Titan360,
    Titan240White,
    Titan360White,
}

/// A fully resolved catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub kind: DeviceKind,
    /// Set for composite coolers
    pub model: Option<AioModel>,
    /// `None` for LED strip adapters, whose LEDs live on a channel
    pub geometry: Option<&'static Geometry>,
    /// Consumes a temperature probe slot
    pub probe: bool,
    /// Consumes an RPM slot
    pub rpm: bool,
}

impl Resolved {
    /// Composite coolers carry the pump an LCD cap attaches to
    pub fn is_pump(&self) -> bool {
        self.model.is_some()
    }
}

impl DeviceKind {
    pub fn from_code(code: u8) -> Option<Self> {
        let kind = match code {
            1 => DeviceKind::QxFan,
            2 => DeviceKind::LxFan,
            3 => DeviceKind::RxMaxFan,
            4 => DeviceKind::RxMaxPwmFan,
            5 => DeviceKind::LsAdapter,
            6 => DeviceKind::LinkLcd,
            7 => DeviceKind::LinkAio,
            9 => DeviceKind::Xc7RgbElite,
            10 => DeviceKind::Xg3Hybrid,
            12 => DeviceKind::Xd5Elite,
            13 => DeviceKind::Xg7Rgb,
            14 => DeviceKind::Xd5EliteLcd,
            15 => DeviceKind::RxFan,
            16 => DeviceKind::VrmFan,
            17 => DeviceKind::TitanAio,
            19 => DeviceKind::RxPwmFan,
            25 => DeviceKind::Xd6Elite,
            _ => return None,
        };
        Some(kind)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the kind needs a cooler type to resolve its geometry
    pub fn is_composite(self) -> bool {
        matches!(self, DeviceKind::LinkAio | DeviceKind::TitanAio)
    }

    /// Temperature probe capability
    pub fn has_probe(self) -> bool {
        matches!(
            self,
            DeviceKind::QxFan
                | DeviceKind::LinkAio
                | DeviceKind::Xg3Hybrid
                | DeviceKind::Xd5Elite
                | DeviceKind::Xd5EliteLcd
                | DeviceKind::VrmFan
                | DeviceKind::TitanAio
                | DeviceKind::Xd6Elite
        )
    }

    /// RPM sensor capability
    pub fn has_rpm(self) -> bool {
        !matches!(
            self,
            DeviceKind::LsAdapter
                | DeviceKind::LinkLcd
                | DeviceKind::Xc7RgbElite
                | DeviceKind::Xg7Rgb
        )
    }

    /// Second lookup step
    ///
    /// Returns `None` when a composite kind is given a cooler type the
    /// catalog does not know.
    pub fn resolve(self, cooler_type: u8) -> Option<Resolved> {
        let (model, geometry) = if self.is_composite() {
            let model = AioModel::from_codes(self, cooler_type)?;
            (Some(model), Some(model.geometry()))
        } else {
            (None, self.geometry())
        };

        Some(Resolved {
            kind: self,
            model,
            geometry,
            probe: self.has_probe(),
            rpm: self.has_rpm(),
        })
    }

    fn geometry(self) -> Option<&'static Geometry> {
        let geometry = match self {
            DeviceKind::QxFan => &QX_FAN,
            DeviceKind::LxFan => &LX_FAN,
            DeviceKind::RxMaxFan => &RX_MAX_FAN,
            DeviceKind::RxMaxPwmFan => &RX_MAX_PWM_FAN,
            DeviceKind::LinkLcd => &LINK_LCD,
            DeviceKind::Xc7RgbElite => &XC7_RGB_ELITE,
            DeviceKind::Xg3Hybrid => &XG3_HYBRID,
            DeviceKind::Xd5Elite | DeviceKind::Xd5EliteLcd => &XD5_ELITE,
            DeviceKind::Xg7Rgb => &XG7_RGB,
            DeviceKind::RxFan => &RX_FAN,
            DeviceKind::VrmFan => &VRM_FAN,
            DeviceKind::RxPwmFan => &RX_PWM_FAN,
            DeviceKind::Xd6Elite => &XD6_ELITE,
            DeviceKind::LsAdapter | DeviceKind::LinkAio | DeviceKind::TitanAio => return None,
        };
        Some(geometry)
    }
}

impl AioModel {
    /// Resolve the sub-model of a composite kind
    pub fn from_codes(kind: DeviceKind, cooler_type: u8) -> Option<Self> {
        let model = match (kind, cooler_type) {
            (DeviceKind::LinkAio, 0 | 4) => AioModel::H100i,
            (DeviceKind::LinkAio, 1) => AioModel::H115i,
            (DeviceKind::LinkAio, 2 | 5) => AioModel::H150i,
            (DeviceKind::LinkAio, 3) => AioModel::H170i,
            (DeviceKind::TitanAio, 0) => AioModel::Titan240,
            (DeviceKind::TitanAio, 1) => AioModel::Titan280,
            (DeviceKind::TitanAio, 2) => AioModel::Titan360,
            (DeviceKind::TitanAio, 4) => AioModel::Titan240White,
            (DeviceKind::TitanAio, 5) => AioModel::Titan360White,
            _ => return None,
        };
        Some(model)
    }

    pub fn geometry(self) -> &'static Geometry {
        match self {
            AioModel::H100i => &AIO_H100I,
            AioModel::H115i => &AIO_H115I,
            AioModel::H150i => &AIO_H150I,
            AioModel::H170i => &AIO_H170I,
            AioModel::Titan240 => &TITAN_240,
            AioModel::Titan280 => &TITAN_280,
            AioModel::Titan360 => &TITAN_360,
            AioModel::Titan240White => &TITAN_240_WHITE,
            AioModel::Titan360White => &TITAN_360_WHITE,
        }
    }
}

// Geometry tables

static SEQUENTIAL: [usize; 34] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27, 28, 29, 30, 31, 32, 33,
];

const QX_POSITIONS: [(u32, u32); 34] = [
    (2, 1), (3, 0), (4, 1), (5, 2), (6, 3), (5, 4), (4, 5), (3, 6), (2, 5), (1, 4), (0, 3), (1, 2),
    (4, 1), (3, 0), (2, 1), (1, 2), (0, 3), (1, 4), (2, 5), (3, 6), (4, 5), (5, 4), (6, 3), (5, 2),
    (4, 2), (5, 3), (4, 4), (2, 4), (1, 3), (2, 2), (3, 2), (2, 3), (3, 4), (4, 3),
];

const LX_POSITIONS: [(u32, u32); 18] = [
    (2, 0), (4, 0), (5, 1), (6, 2), (6, 6), (5, 7), (4, 8), (2, 8), (1, 7), (0, 6), (0, 2), (1, 1),
    (3, 2), (4, 3), (4, 5), (3, 6), (2, 5), (2, 3),
];

const RX_POSITIONS: [(u32, u32); 8] = [
    (1, 0), (2, 0), (3, 1), (3, 2), (2, 3), (1, 3), (0, 2), (0, 1),
];

const AIO_POSITIONS: [(u32, u32); 20] = [
    (6, 4), (5, 5), (4, 6), (3, 6), (2, 6), (1, 5), (0, 4), (0, 3), (0, 2), (1, 1),
    (2, 0), (3, 0), (4, 0), (5, 1), (6, 2), (6, 3), (3, 2), (4, 3), (3, 4), (2, 3),
];

const TITAN_POSITIONS: [(u32, u32); 20] = [
    (5, 14), (3, 13), (2, 11), (1, 9), (0, 7), (1, 5), (2, 3), (3, 1), (5, 0), (7, 1),
    (8, 3), (9, 5), (10, 7), (9, 9), (8, 11), (7, 13), (5, 8), (4, 7), (5, 6), (6, 7),
];

const RING_24_POSITIONS: [(u32, u32); 24] = [
    (6, 16), (4, 15), (2, 14), (1, 12), (0, 10), (0, 8), (0, 6), (1, 4), (2, 2), (4, 1),
    (6, 0), (8, 0), (10, 0), (12, 1), (14, 2), (15, 4), (16, 6), (16, 8), (16, 10), (15, 12),
    (14, 14), (12, 15), (10, 16), (8, 16),
];

const XG3_POSITIONS: [(u32, u32); 18] = [
    (4, 0), (6, 1), (7, 3), (8, 5), (7, 7), (6, 9), (4, 10), (2, 9), (1, 7), (0, 5), (1, 3), (2, 1),
    (5, 3), (6, 5), (5, 7), (3, 7), (2, 5), (3, 3),
];

const RESERVOIR_POSITIONS: [(u32, u32); 22] = [
    (5, 0), (6, 0),
    (4, 1), (7, 1),
    (3, 2), (8, 2),
    (2, 3), (9, 3),
    (1, 4), (10, 4),
    (0, 5), (11, 5),
    (1, 6), (10, 6),
    (2, 7), (9, 7),
    (3, 8), (8, 8),
    (4, 9), (7, 9),
    (5, 10), (6, 10),
];

// Left column transmits bottom up after the right column
const RESERVOIR_MAP: [usize; 22] = [
    0, 1, 21, 2, 20, 3, 19, 4, 18, 5, 17, 6, 16, 7, 15, 8, 14, 9, 13, 10, 12, 11,
];

const XG7_POSITIONS: [(u32, u32); 16] = [
    (15, 0), (14, 0), (13, 0), (12, 0), (11, 0), (10, 0), (9, 0), (8, 0), (7, 0), (6, 0),
    (5, 0), (4, 0), (3, 0), (2, 0), (1, 0), (0, 0),
];

static QX_FAN: Geometry = Geometry {
    name: "QX Fan",
    size: (7, 7),
    led_positions: &QX_POSITIONS,
    led_map: SEQUENTIAL.split_at(34).0,
};

static LX_FAN: Geometry = Geometry {
    name: "LX Fan",
    size: (7, 9),
    led_positions: &LX_POSITIONS,
    led_map: SEQUENTIAL.split_at(18).0,
};

static RX_FAN: Geometry = Geometry {
    name: "RX Fan",
    size: (4, 4),
    led_positions: &RX_POSITIONS,
    led_map: SEQUENTIAL.split_at(8).0,
};

static RX_MAX_FAN: Geometry = Geometry {
    name: "RX MAX Fan",
    size: (4, 4),
    led_positions: &RX_POSITIONS,
    led_map: SEQUENTIAL.split_at(8).0,
};

static RX_PWM_FAN: Geometry = Geometry {
    name: "RX PWM Fan",
    size: (1, 1),
    led_positions: &[],
    led_map: &[],
};

static RX_MAX_PWM_FAN: Geometry = Geometry {
    name: "RX MAX PWM Fan",
    size: (1, 1),
    led_positions: &[],
    led_map: &[],
};

static VRM_FAN: Geometry = Geometry {
    name: "LINK VRM Fan",
    size: (1, 1),
    led_positions: &[],
    led_map: &[],
};

static AIO_H100I: Geometry = Geometry {
    name: "LINK H100i",
    size: (7, 7),
    led_positions: &AIO_POSITIONS,
    led_map: SEQUENTIAL.split_at(20).0,
};

static AIO_H115I: Geometry = Geometry {
    name: "LINK H115I",
    size: (7, 7),
    led_positions: &AIO_POSITIONS,
    led_map: SEQUENTIAL.split_at(20).0,
};

static AIO_H150I: Geometry = Geometry {
    name: "LINK H150i",
    size: (7, 7),
    led_positions: &AIO_POSITIONS,
    led_map: SEQUENTIAL.split_at(20).0,
};

static AIO_H170I: Geometry = Geometry {
    name: "LINK H170i",
    size: (7, 7),
    led_positions: &AIO_POSITIONS,
    led_map: SEQUENTIAL.split_at(20).0,
};

static TITAN_240: Geometry = Geometry {
    name: "LINK Titan 240 RX",
    size: (11, 15),
    led_positions: &TITAN_POSITIONS,
    led_map: SEQUENTIAL.split_at(20).0,
};

static TITAN_280: Geometry = Geometry {
    name: "LINK Titan 280 RX",
    size: (11, 15),
    led_positions: &TITAN_POSITIONS,
    led_map: SEQUENTIAL.split_at(20).0,
};

static TITAN_360: Geometry = Geometry {
    name: "LINK Titan 360 RX",
    size: (11, 15),
    led_positions: &TITAN_POSITIONS,
    led_map: SEQUENTIAL.split_at(20).0,
};

static TITAN_240_WHITE: Geometry = Geometry {
    name: "LINK Titan 240 RX White",
    size: (11, 15),
    led_positions: &TITAN_POSITIONS,
    led_map: SEQUENTIAL.split_at(20).0,
};

static TITAN_360_WHITE: Geometry = Geometry {
    name: "LINK Titan 360 RX White",
    size: (11, 15),
    led_positions: &TITAN_POSITIONS,
    led_map: SEQUENTIAL.split_at(20).0,
};

static LINK_LCD: Geometry = Geometry {
    name: "LINK LCD",
    size: (17, 17),
    led_positions: &RING_24_POSITIONS,
    led_map: SEQUENTIAL.split_at(24).0,
};

static XC7_RGB_ELITE: Geometry = Geometry {
    name: "LINK XC7 RGB Elite",
    size: (17, 17),
    led_positions: &RING_24_POSITIONS,
    led_map: SEQUENTIAL.split_at(24).0,
};

static XG3_HYBRID: Geometry = Geometry {
    name: "LINK XG3 HYBRID",
    size: (17, 17),
    led_positions: &XG3_POSITIONS,
    led_map: SEQUENTIAL.split_at(18).0,
};

static XD5_ELITE: Geometry = Geometry {
    name: "LINK XD5 Elite",
    size: (17, 17),
    led_positions: &RESERVOIR_POSITIONS,
    led_map: &RESERVOIR_MAP,
};

static XD6_ELITE: Geometry = Geometry {
    name: "LINK XD6 Elite",
    size: (17, 17),
    led_positions: &RESERVOIR_POSITIONS,
    led_map: &RESERVOIR_MAP,
};

static XG7_RGB: Geometry = Geometry {
    name: "LINK XG7 RGB",
    size: (16, 2),
    led_positions: &XG7_POSITIONS,
    led_map: SEQUENTIAL.split_at(16).0,
};

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: [u8; 17] = [1, 2, 3, 4, 5, 6, 7, 9, 10, 12, 13, 14, 15, 16, 17, 19, 25];

    #[test]
    fn test_kind_codes_roundtrip() {
        for code in ALL_CODES {
            let kind = DeviceKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(DeviceKind::from_code(8), None);
        assert_eq!(DeviceKind::from_code(0), None);
    }

    #[test]
    fn test_every_geometry_is_consistent() {
        for code in ALL_CODES {
            let kind = DeviceKind::from_code(code).unwrap();
            let cooler_types: &[u8] = if kind.is_composite() {
                &[0, 1, 2, 3, 4, 5]
            } else {
                &[0]
            };

            for &cooler in cooler_types {
                let Some(resolved) = kind.resolve(cooler) else {
                    continue;
                };
                let Some(geometry) = resolved.geometry else {
                    assert_eq!(kind, DeviceKind::LsAdapter);
                    continue;
                };

                assert_eq!(
                    geometry.led_positions.len(),
                    geometry.led_map.len(),
                    "{} positions and map disagree",
                    geometry.name
                );
                for &slot in geometry.led_map {
                    assert!(slot < geometry.led_count(), "{} slot out of range", geometry.name);
                }
                for &(x, y) in geometry.led_positions {
                    assert!(x < geometry.size.0 && y < geometry.size.1, "{}", geometry.name);
                }
            }
        }
    }

    #[test]
    fn test_aio_sub_models() {
        let resolved = DeviceKind::LinkAio.resolve(5).unwrap();
        assert_eq!(resolved.model, Some(AioModel::H150i));
        assert_eq!(resolved.geometry.unwrap().name, "LINK H150i");
        assert!(resolved.is_pump());
        assert!(resolved.probe && resolved.rpm);

        assert_eq!(
            DeviceKind::TitanAio.resolve(4).unwrap().geometry.unwrap().name,
            "LINK Titan 240 RX White"
        );
    }

    #[test]
    fn test_unknown_cooler_type_does_not_resolve() {
        assert!(DeviceKind::LinkAio.resolve(9).is_none());
        assert!(DeviceKind::TitanAio.resolve(3).is_none());
    }

    #[test]
    fn test_capabilities() {
        let qx = DeviceKind::QxFan.resolve(0).unwrap();
        assert!(qx.probe && qx.rpm);
        assert!(!qx.is_pump());

        let lx = DeviceKind::LxFan.resolve(0).unwrap();
        assert!(!lx.probe && lx.rpm);

        let lcd = DeviceKind::LinkLcd.resolve(0).unwrap();
        assert!(!lcd.probe && !lcd.rpm);
        assert_eq!(lcd.geometry.unwrap().led_count(), 24);

        let adapter = DeviceKind::LsAdapter.resolve(0).unwrap();
        assert!(adapter.geometry.is_none());
        assert!(!adapter.probe && !adapter.rpm);
    }

    #[test]
    fn test_reservoir_map_is_a_permutation() {
        let mut slots = RESERVOIR_MAP.to_vec();
        slots.sort_unstable();
        assert_eq!(slots, (0..22).collect::<Vec<_>>());
    }

    #[test]
    fn test_led_names() {
        let names = XG7_RGB.led_names();
        assert_eq!(names.len(), 16);
        assert_eq!(names[0], "LED 1");
        assert_eq!(names[15], "LED 16");
        assert!(RX_PWM_FAN.led_names().is_empty());
    }
}
