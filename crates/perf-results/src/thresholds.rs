//! Minimum acceptable throughput per link speed and packet size.
//!
//! The built-in table is reference data for 10K-flow offload runs. A replacement
//! can be loaded from JSON so that re-baselining does not touch evaluator code:
//!
//! ```json
//! { "10": { "64": 2490513, "1514": 733376 }, "100": { "1514": 5451593 } }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::ResultsError;

/// NIC speed tier in Gbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkSpeed {
    Gbps10,
    Gbps25,
    Gbps40,
    Gbps50,
    Gbps100,
}

impl LinkSpeed {
    pub const ALL: [LinkSpeed; 5] = [
        LinkSpeed::Gbps10,
        LinkSpeed::Gbps25,
        LinkSpeed::Gbps40,
        LinkSpeed::Gbps50,
        LinkSpeed::Gbps100,
    ];

    pub fn gbps(self) -> u32 {
        match self {
            LinkSpeed::Gbps10 => 10,
            LinkSpeed::Gbps25 => 25,
            LinkSpeed::Gbps40 => 40,
            LinkSpeed::Gbps50 => 50,
            LinkSpeed::Gbps100 => 100,
        }
    }
}

impl TryFrom<i64> for LinkSpeed {
    type Error = ResultsError;

    fn try_from(gbps: i64) -> Result<Self, Self::Error> {
        LinkSpeed::ALL
            .into_iter()
            .find(|speed| i64::from(speed.gbps()) == gbps)
            .ok_or_else(|| ResultsError::UnsupportedLinkSpeed(gbps.to_string()))
    }
}

impl fmt::Display for LinkSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Gbps", self.gbps())
    }
}

/// Packet size in bytes -> minimum packets per second.
pub type Tier = BTreeMap<u32, i64>;

const BUILTIN: [(LinkSpeed, [(u32, i64); 7]); 5] = [
    (
        LinkSpeed::Gbps10,
        [
            (64, 2_490_513),
            (128, 2_400_604),
            (256, 2_256_274),
            (512, 2_114_661),
            (768, 1_427_664),
            (1024, 1_077_586),
            (1514, 733_376),
        ],
    ),
    (
        LinkSpeed::Gbps25,
        [
            (64, 9_637_204),
            (128, 6_508_473),
            (256, 4_000_375),
            (512, 3_693_513),
            (768, 3_462_503),
            (1024, 2_671_544),
            (1514, 1_819_386),
        ],
    ),
    (
        LinkSpeed::Gbps40,
        [
            (64, 10_217_438),
            (128, 9_092_933),
            (256, 8_657_281),
            (512, 6_536_093),
            (768, 5_280_149),
            (1024, 4_024_205),
            (1514, 2_619_575),
        ],
    ),
    (
        LinkSpeed::Gbps50,
        [
            (64, 26_067_795),
            (128, 23_473_241),
            (256, 18_772_297),
            (512, 10_476_825),
            (768, 7_083_181),
            (1024, 5_347_950),
            (1514, 3_640_232),
        ],
    ),
    (
        LinkSpeed::Gbps100,
        [
            (64, 26_899_051),
            (128, 24_033_668),
            (256, 18_772_297),
            (512, 13_542_611),
            (768, 9_978_782),
            (1024, 7_948_678),
            (1514, 5_451_593),
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdTable {
    tiers: BTreeMap<LinkSpeed, Tier>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThresholdTable {
    pub fn builtin() -> Self {
        let tiers = BUILTIN
            .iter()
            .map(|(speed, sizes)| (*speed, sizes.iter().copied().collect()))
            .collect();
        Self { tiers }
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, ResultsError> {
        let file = File::open(path.as_ref())?;
        Self::from_json_reader(BufReader::new(file))
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ResultsError> {
        let raw: BTreeMap<String, BTreeMap<String, i64>> = serde_json::from_reader(reader)?;

        let mut tiers = BTreeMap::new();
        for (speed_key, sizes) in raw {
            let gbps: i64 = speed_key.trim().parse().map_err(|_| {
                ResultsError::Thresholds(format!("link speed `{speed_key}` is not an integer"))
            })?;
            let speed = LinkSpeed::try_from(gbps)
                .map_err(|_| ResultsError::Thresholds(format!("unknown link speed `{gbps}`")))?;
            if sizes.is_empty() {
                return Err(ResultsError::Thresholds(format!(
                    "no packet sizes configured for {speed}"
                )));
            }

            let mut tier = Tier::new();
            for (size_key, minimum) in sizes {
                let size: u32 = size_key.trim().parse().map_err(|_| {
                    ResultsError::Thresholds(format!(
                        "packet size `{size_key}` for {speed} is not an integer"
                    ))
                })?;
                tier.insert(size, minimum);
            }
            tiers.insert(speed, tier);
        }

        Ok(Self { tiers })
    }

    pub fn tier(&self, speed: LinkSpeed) -> Option<&Tier> {
        self.tiers.get(&speed)
    }

    pub fn minimum(&self, speed: LinkSpeed, packet_size: u32) -> Option<i64> {
        self.tier(speed)?.get(&packet_size).copied()
    }

    /// Packet sizes with a threshold at `speed`, ascending.
    pub fn packet_sizes(&self, speed: LinkSpeed) -> impl Iterator<Item = u32> + '_ {
        self.tier(speed).into_iter().flat_map(|tier| tier.keys().copied())
    }

    pub fn speeds(&self) -> impl Iterator<Item = LinkSpeed> + '_ {
        self.tiers.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_speed_with_the_standard_sizes() {
        let table = ThresholdTable::builtin();
        for speed in LinkSpeed::ALL {
            let sizes: Vec<u32> = table.packet_sizes(speed).collect();
            assert_eq!(sizes, vec![64, 128, 256, 512, 768, 1024, 1514], "{speed}");
        }
        assert_eq!(table.minimum(LinkSpeed::Gbps100, 1514), Some(5_451_593));
        assert_eq!(table.minimum(LinkSpeed::Gbps10, 64), Some(2_490_513));
        assert_eq!(table.minimum(LinkSpeed::Gbps10, 9000), None);
    }

    #[test]
    fn link_speed_from_gbps() {
        assert_eq!(LinkSpeed::try_from(40).unwrap(), LinkSpeed::Gbps40);
        assert!(matches!(
            LinkSpeed::try_from(17),
            Err(ResultsError::UnsupportedLinkSpeed(raw)) if raw == "17"
        ));
    }

    #[test]
    fn json_override_replaces_the_table() {
        let json = r#"{ "25": { "64": 100, "9000": 5 } }"#;
        let table = ThresholdTable::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(table.speeds().collect::<Vec<_>>(), vec![LinkSpeed::Gbps25]);
        assert_eq!(table.packet_sizes(LinkSpeed::Gbps25).collect::<Vec<_>>(), vec![64, 9000]);
        assert_eq!(table.tier(LinkSpeed::Gbps10), None);
    }

    #[test]
    fn json_rejects_unknown_speeds_and_bad_sizes() {
        let err = ThresholdTable::from_json_reader(r#"{ "17": { "64": 1 } }"#.as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("unknown link speed `17`"), "{err}");

        let err = ThresholdTable::from_json_reader(r#"{ "10": { "jumbo": 1 } }"#.as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("packet size `jumbo`"), "{err}");

        let err = ThresholdTable::from_json_reader(r#"{ "10": {} }"#.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("no packet sizes"), "{err}");
    }
}
