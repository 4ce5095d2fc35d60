//! Pick the analysis path for a results archive from its file name.
//!
//! Archive names carry the datapath family (`dpdk`, `kernel`, `tc`) and either a
//! layer marker (`l2`, `l3`) or, for TC, `flower` for the flow-offload throughput
//! run. Families are checked in that order and the first hit wins, so a name is
//! classified exactly once.

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datapath {
    Dpdk,
    Kernel,
    TcFlower,
}

impl Datapath {
    fn marker(self) -> &'static str {
        match self {
            Datapath::Dpdk => "dpdk",
            Datapath::Kernel => "kernel",
            Datapath::TcFlower => "tc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    L2,
    L3,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::L2 => "l2",
            Layer::L3 => "l3",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an archive name did not select any analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// None of `dpdk`, `kernel` or `tc` appears in the name.
    UnknownFamily,
    /// The family matched but no usable layer (or `flower`) marker followed.
    NoLayerMarker(Datapath),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::UnknownFamily => {
                f.write_str("name does not contain a dpdk, kernel or tc marker")
            }
            IgnoreReason::NoLayerMarker(Datapath::TcFlower) => {
                f.write_str("tc archive name does not contain l2, l3 or flower")
            }
            IgnoreReason::NoLayerMarker(datapath) => write!(
                f,
                "{} archive name does not contain l2 or l3",
                datapath.marker()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveRoute {
    /// Generic result table, checked for non-positive values.
    PacketForwarding { datapath: Datapath, layer: Layer },
    /// 10K-flow TC flower throughput, checked against the threshold table.
    FlowOffload,
    Ignored(IgnoreReason),
}

const FAMILIES: [Datapath; 3] = [Datapath::Dpdk, Datapath::Kernel, Datapath::TcFlower];
const REFERENCE_FLOW_COUNTS: [&str; 5] = ["1000000", "100000", "10000", "1000", "10"];

/// Classify an archive by its file name (not its full path).
pub fn classify_archive(file_name: &str) -> ArchiveRoute {
    let Some(datapath) = FAMILIES
        .into_iter()
        .find(|datapath| file_name.contains(datapath.marker()))
    else {
        return ArchiveRoute::Ignored(IgnoreReason::UnknownFamily);
    };

    if file_name.contains("l2") {
        ArchiveRoute::PacketForwarding {
            datapath,
            layer: Layer::L2,
        }
    } else if file_name.contains("l3") {
        ArchiveRoute::PacketForwarding {
            datapath,
            layer: Layer::L3,
        }
    } else if datapath == Datapath::TcFlower && file_name.contains("flower") {
        ArchiveRoute::FlowOffload
    } else {
        ArchiveRoute::Ignored(IgnoreReason::NoLayerMarker(datapath))
    }
}

/// The archive's file name up to its first `.`; results live under this directory.
pub fn archive_base_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let base = file_name.split('.').next().unwrap_or(file_name);
    (!base.is_empty()).then(|| base.to_string())
}

impl ArchiveRoute {
    pub fn is_ignored(self) -> bool {
        matches!(self, ArchiveRoute::Ignored(_))
    }

    /// Path of the CSV results entry inside the archive.
    pub fn results_entry(self, base: &str) -> Option<String> {
        let layer = match self {
            ArchiveRoute::PacketForwarding { layer, .. } => layer,
            ArchiveRoute::FlowOffload => Layer::L3,
            ArchiveRoute::Ignored(_) => return None,
        };
        Some(format!("{base}/test_results_{layer}.csv"))
    }

    /// Companion plots produced next to a packet-forwarding result table.
    pub fn reference_images(self) -> Vec<String> {
        let ArchiveRoute::PacketForwarding { layer, .. } = self else {
            return Vec::new();
        };
        let mut images = vec![
            format!("test_p2v2p_all_{layer}_ref.png"),
            format!("test_p2v2p_all_{layer}.png"),
        ];
        images.extend(
            REFERENCE_FLOW_COUNTS
                .iter()
                .map(|flows| format!("test_p2v2p_{flows}_{layer}.png")),
        );
        images
    }

    /// Archive path of the plot embedded under the result table.
    pub fn embedded_image(self, base: &str) -> Option<String> {
        self.reference_images()
            .get(1)
            .map(|image| format!("{base}/{image}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_then_layer() {
        assert_eq!(
            classify_archive("ovs_dpdk_pvp_l3.tar.gz"),
            ArchiveRoute::PacketForwarding {
                datapath: Datapath::Dpdk,
                layer: Layer::L3
            }
        );
        assert_eq!(
            classify_archive("kernel_l2_run.tar.xz"),
            ArchiveRoute::PacketForwarding {
                datapath: Datapath::Kernel,
                layer: Layer::L2
            }
        );
    }

    #[test]
    fn flower_only_counts_for_tc() {
        assert_eq!(classify_archive("tc_flower_10k.tar.gz"), ArchiveRoute::FlowOffload);
        assert_eq!(
            classify_archive("dpdk_flower.tar.gz"),
            ArchiveRoute::Ignored(IgnoreReason::NoLayerMarker(Datapath::Dpdk))
        );
    }

    #[test]
    fn layer_markers_win_over_flower() {
        assert_eq!(
            classify_archive("tc_flower_l3.tar.gz"),
            ArchiveRoute::PacketForwarding {
                datapath: Datapath::TcFlower,
                layer: Layer::L3
            }
        );
    }

    #[test]
    fn earlier_family_wins() {
        assert_eq!(
            classify_archive("dpdk_vs_kernel_l2.tgz"),
            ArchiveRoute::PacketForwarding {
                datapath: Datapath::Dpdk,
                layer: Layer::L2
            }
        );
    }

    #[test]
    fn unknown_names_are_ignored_explicitly() {
        let route = classify_archive("results.tar.gz");
        assert_eq!(route, ArchiveRoute::Ignored(IgnoreReason::UnknownFamily));
        assert!(route.is_ignored());
        assert_eq!(route.results_entry("results"), None);
    }

    #[test]
    fn entries_and_images() {
        let route = classify_archive("dpdk_l2.tar.gz");
        assert_eq!(
            route.results_entry("dpdk_l2").as_deref(),
            Some("dpdk_l2/test_results_l2.csv")
        );
        assert_eq!(
            route.embedded_image("dpdk_l2").as_deref(),
            Some("dpdk_l2/test_p2v2p_all_l2.png")
        );
        assert_eq!(route.reference_images().len(), 7);
        assert_eq!(route.reference_images()[6], "test_p2v2p_10_l2.png");

        assert_eq!(
            ArchiveRoute::FlowOffload.results_entry("tc_flower").as_deref(),
            Some("tc_flower/test_results_l3.csv")
        );
        assert_eq!(ArchiveRoute::FlowOffload.embedded_image("tc_flower"), None);
    }

    #[test]
    fn base_name_drops_every_extension() {
        assert_eq!(
            archive_base_name(Path::new("/tmp/runs/dpdk_l2.tar.gz")).as_deref(),
            Some("dpdk_l2")
        );
        assert_eq!(archive_base_name(Path::new("kernel_l3")).as_deref(), Some("kernel_l3"));
        assert_eq!(archive_base_name(Path::new(".hidden.tar")), None);
    }
}
