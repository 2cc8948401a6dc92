//! Add-On Catalog - Preconditions Declared Once
//!
//! Every add-on carries its capability family, the sub-toggle that gates its
//! column, and its film precondition in a single table. Resolver and validator
//! both read from here; nothing re-derives these rules per call.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::compatibility::ResolvedService;
use crate::toggles::{Capability, FeatureToggleSet, SubToggle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddOn {
    ReturnUnsleeved,
    ReturnSleeved,
    ReturnMounted,
    Push1,
    Push2,
    Push3,
    Pull1,
    Pull2,
    Pull3,
    JpegScans,
    RawScans,
    ScannerA,
    ScannerB,
    ScannerC,
    ScannerD,
    ScanResA,
    ScanResB,
    ScanResC,
    ScanOptionB,
    ScanOptionC,
    PrintSizeA,
    PrintSizeB,
    PrintSizeC,
    PrintOptionB,
    PrintOptionC,
}

/// Film-level precondition of an add-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilmRule {
    Any,
    NotPreMounted,
    SlideNotPreMounted,
}

#[derive(Debug, Clone, Copy)]
pub struct AddOnSpec {
    pub add_on: AddOn,
    pub label: &'static str,
    /// `None` for return options, which belong to every service.
    pub family: Option<Capability>,
    pub toggle: Option<SubToggle>,
    pub film: FilmRule,
    /// Default behaviour of the capability: never priced, never toggled.
    pub read_only: bool,
}

const fn spec(
    add_on: AddOn,
    label: &'static str,
    family: Option<Capability>,
    toggle: Option<SubToggle>,
    film: FilmRule,
    read_only: bool,
) -> AddOnSpec {
    AddOnSpec { add_on, label, family, toggle, film, read_only }
}

const DEV: Option<Capability> = Some(Capability::Dev);
const SCAN: Option<Capability> = Some(Capability::Scan);
const PRINT: Option<Capability> = Some(Capability::Print);

/// Indexed by `AddOn as usize`.
const TABLE: [AddOnSpec; 25] = [
    spec(AddOn::ReturnUnsleeved, "Return unsleeved", None, None, FilmRule::Any, true),
    spec(AddOn::ReturnSleeved, "Return sleeved", None, None, FilmRule::NotPreMounted, false),
    spec(AddOn::ReturnMounted, "Return mounted", None, None, FilmRule::SlideNotPreMounted, false),
    spec(AddOn::Push1, "Push +1", DEV, None, FilmRule::Any, false),
    spec(AddOn::Push2, "Push +2", DEV, None, FilmRule::Any, false),
    spec(AddOn::Push3, "Push +3", DEV, None, FilmRule::Any, false),
    spec(AddOn::Pull1, "Pull -1", DEV, None, FilmRule::Any, false),
    spec(AddOn::Pull2, "Pull -2", DEV, None, FilmRule::Any, false),
    spec(AddOn::Pull3, "Pull -3", DEV, None, FilmRule::Any, false),
    spec(AddOn::JpegScans, "JPEG scans", SCAN, None, FilmRule::Any, true),
    spec(AddOn::RawScans, "Raw scans", SCAN, Some(SubToggle::RawScans), FilmRule::Any, false),
    spec(AddOn::ScannerA, "Scanner A", SCAN, None, FilmRule::Any, true),
    spec(AddOn::ScannerB, "Scanner B", SCAN, Some(SubToggle::ScannerB), FilmRule::Any, false),
    spec(AddOn::ScannerC, "Scanner C", SCAN, Some(SubToggle::ScannerC), FilmRule::Any, false),
    spec(AddOn::ScannerD, "Scanner D", SCAN, Some(SubToggle::ScannerD), FilmRule::Any, false),
    spec(AddOn::ScanResA, "Scan resolution A", SCAN, None, FilmRule::Any, true),
    spec(AddOn::ScanResB, "Scan resolution B", SCAN, Some(SubToggle::ScanResB), FilmRule::Any, false),
    spec(AddOn::ScanResC, "Scan resolution C", SCAN, Some(SubToggle::ScanResC), FilmRule::Any, false),
    spec(AddOn::ScanOptionB, "Scan option B", SCAN, Some(SubToggle::ScanOptionB), FilmRule::Any, false),
    spec(AddOn::ScanOptionC, "Scan option C", SCAN, Some(SubToggle::ScanOptionC), FilmRule::Any, false),
    spec(AddOn::PrintSizeA, "Print size A", PRINT, None, FilmRule::Any, true),
    spec(AddOn::PrintSizeB, "Print size B", PRINT, Some(SubToggle::PrintSizeB), FilmRule::Any, false),
    spec(AddOn::PrintSizeC, "Print size C", PRINT, Some(SubToggle::PrintSizeC), FilmRule::Any, false),
    spec(AddOn::PrintOptionB, "Print option B", PRINT, Some(SubToggle::PrintOptionB), FilmRule::Any, false),
    spec(AddOn::PrintOptionC, "Print option C", PRINT, Some(SubToggle::PrintOptionC), FilmRule::Any, false),
];

impl AddOn {
    pub const ALL: [AddOn; 25] = [
        AddOn::ReturnUnsleeved,
        AddOn::ReturnSleeved,
        AddOn::ReturnMounted,
        AddOn::Push1,
        AddOn::Push2,
        AddOn::Push3,
        AddOn::Pull1,
        AddOn::Pull2,
        AddOn::Pull3,
        AddOn::JpegScans,
        AddOn::RawScans,
        AddOn::ScannerA,
        AddOn::ScannerB,
        AddOn::ScannerC,
        AddOn::ScannerD,
        AddOn::ScanResA,
        AddOn::ScanResB,
        AddOn::ScanResC,
        AddOn::ScanOptionB,
        AddOn::ScanOptionC,
        AddOn::PrintSizeA,
        AddOn::PrintSizeB,
        AddOn::PrintSizeC,
        AddOn::PrintOptionB,
        AddOn::PrintOptionC,
    ];

    pub fn spec(self) -> &'static AddOnSpec {
        &TABLE[self as usize]
    }

    /// Field name used on the wire and in error reports.
    pub fn name(self) -> &'static str {
        match self {
            AddOn::ReturnUnsleeved => "returnUnsleeved",
            AddOn::ReturnSleeved => "returnSleeved",
            AddOn::ReturnMounted => "returnMounted",
            AddOn::Push1 => "push1",
            AddOn::Push2 => "push2",
            AddOn::Push3 => "push3",
            AddOn::Pull1 => "pull1",
            AddOn::Pull2 => "pull2",
            AddOn::Pull3 => "pull3",
            AddOn::JpegScans => "jpegScans",
            AddOn::RawScans => "rawScans",
            AddOn::ScannerA => "scannerA",
            AddOn::ScannerB => "scannerB",
            AddOn::ScannerC => "scannerC",
            AddOn::ScannerD => "scannerD",
            AddOn::ScanResA => "scanResA",
            AddOn::ScanResB => "scanResB",
            AddOn::ScanResC => "scanResC",
            AddOn::ScanOptionB => "scanOptionB",
            AddOn::ScanOptionC => "scanOptionC",
            AddOn::PrintSizeA => "printSizeA",
            AddOn::PrintSizeB => "printSizeB",
            AddOn::PrintSizeC => "printSizeC",
            AddOn::PrintOptionB => "printOptionB",
            AddOn::PrintOptionC => "printOptionC",
        }
    }

    pub fn is_read_only(self) -> bool {
        self.spec().read_only
    }

    /// Add-ons a lab can switch on and price.
    pub fn optional() -> impl Iterator<Item = AddOn> {
        Self::ALL.into_iter().filter(|a| !a.is_read_only())
    }
}

impl fmt::Display for AddOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a field may not be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotIncluded(Capability),
    CapabilityDisabled(Capability),
    SubToggleDisabled(&'static str),
    PreMountedNotSleevable,
    PreMountedNotMountable,
    NotSlide,
    ReadOnly(&'static str),
}

impl Denial {
    pub fn message(&self) -> String {
        match self {
            Denial::NotIncluded(c) => {
                format!("This service does not include {}.", c.activity().to_lowercase())
            }
            Denial::CapabilityDisabled(Capability::Dev) => "Developing is not currently enabled.".to_string(),
            Denial::CapabilityDisabled(c) => format!("{} is not enabled.", c.activity()),
            Denial::SubToggleDisabled(label) => format!("{} is not enabled.", label),
            Denial::PreMountedNotSleevable => "Mounted film cannot be sleeved.".to_string(),
            Denial::PreMountedNotMountable => "Mounted film cannot be re-mounted.".to_string(),
            Denial::NotSlide => "Only slide film may be mounted.".to_string(),
            Denial::ReadOnly(label) => {
                format!("{} is included with the service and cannot be changed.", label)
            }
        }
    }
}

impl AddOnSpec {
    /// Column rule: offerable by this lab at all, independent of any row.
    pub fn column_allowed(&self, toggles: &FeatureToggleSet) -> bool {
        if self.read_only {
            return true;
        }
        self.lab_denial(toggles).is_none()
    }

    /// Cell rule: structural check against one service, first failure wins.
    ///
    /// Read-only cells only require the service to include their family.
    pub fn check(&self, service: &ResolvedService<'_>, toggles: &FeatureToggleSet) -> Result<(), Denial> {
        let caps = &service.service_type.included_capabilities;
        if let Some(family) = self.family {
            if !family.included_in(caps) {
                return Err(Denial::NotIncluded(family));
            }
        }
        if self.read_only {
            return Ok(());
        }
        if let Some(denial) = self.lab_denial(toggles) {
            return Err(denial);
        }

        let pre_mounted = service.film_size.is_pre_mounted;
        match self.film {
            FilmRule::Any => Ok(()),
            FilmRule::NotPreMounted if pre_mounted => Err(Denial::PreMountedNotSleevable),
            FilmRule::NotPreMounted => Ok(()),
            FilmRule::SlideNotPreMounted if !service.film_type.is_e6 => Err(Denial::NotSlide),
            FilmRule::SlideNotPreMounted if pre_mounted => Err(Denial::PreMountedNotMountable),
            FilmRule::SlideNotPreMounted => Ok(()),
        }
    }

    fn lab_denial(&self, toggles: &FeatureToggleSet) -> Option<Denial> {
        let family = self.family?;
        if !toggles.capability_enabled(family) {
            return Some(Denial::CapabilityDisabled(family));
        }
        match self.toggle {
            Some(toggle) if !toggles.sub_enabled(toggle) => Some(Denial::SubToggleDisabled(self.label)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::{CompatibilityGraph, ServiceId};
    use crate::reference::ReferenceData;
    use std::collections::BTreeSet;

    #[test]
    fn test_table_is_indexed_by_discriminant() {
        for (i, add_on) in AddOn::ALL.iter().enumerate() {
            assert_eq!(TABLE[i].add_on, *add_on);
            assert_eq!(*add_on as usize, i);
        }
    }

    #[test]
    fn test_wire_name_matches_serde() {
        for add_on in AddOn::ALL {
            let json = serde_json::to_string(&add_on).unwrap();
            assert_eq!(json, format!("\"{}\"", add_on.name()));
        }
    }

    #[test]
    fn test_sub_toggles_match_family() {
        for add_on in AddOn::ALL {
            let spec = add_on.spec();
            if let Some(toggle) = spec.toggle {
                assert_eq!(Some(toggle.parent()), spec.family, "{}", add_on);
            }
        }
    }

    fn switch_off(toggles: &mut FeatureToggleSet, toggle: SubToggle) {
        let flag = match toggle {
            SubToggle::RawScans => &mut toggles.scan.raw_scans,
            SubToggle::ScannerB => &mut toggles.scan.scanner_b,
            SubToggle::ScannerC => &mut toggles.scan.scanner_c,
            SubToggle::ScannerD => &mut toggles.scan.scanner_d,
            SubToggle::ScanResB => &mut toggles.scan.scan_res_b,
            SubToggle::ScanResC => &mut toggles.scan.scan_res_c,
            SubToggle::ScanOptionB => &mut toggles.scan.scan_option_b,
            SubToggle::ScanOptionC => &mut toggles.scan.scan_option_c,
            SubToggle::PrintSizeB => &mut toggles.print.print_size_b,
            SubToggle::PrintSizeC => &mut toggles.print.print_size_c,
            SubToggle::PrintOptionB => &mut toggles.print.print_option_b,
            SubToggle::PrintOptionC => &mut toggles.print.print_option_c,
        };
        *flag = false;
    }

    #[test]
    fn test_each_sub_toggle_gates_only_its_own_add_on() {
        let graph = CompatibilityGraph::build(ReferenceData::standard()).unwrap();
        // Every capability, slide film, not pre-mounted: all add-ons allowed
        let service = graph.resolve(&ServiceId::new("devScanPrint", "e6", "35mm")).unwrap();
        let mut seen = BTreeSet::new();

        for add_on in AddOn::optional() {
            let Some(toggle) = add_on.spec().toggle else { continue };
            assert!(seen.insert(format!("{:?}", toggle)), "{:?} gates two add-ons", toggle);

            let mut toggles = FeatureToggleSet::all_enabled();
            switch_off(&mut toggles, toggle);
            assert!(!toggles.sub_enabled(toggle));

            for other in AddOn::ALL {
                let spec = other.spec();
                if other == add_on {
                    assert_eq!(spec.check(&service, &toggles), Err(Denial::SubToggleDisabled(spec.label)));
                    assert!(!spec.column_allowed(&toggles), "{}", other);
                } else {
                    assert_eq!(spec.check(&service, &toggles), Ok(()), "{} with {:?} off", other, toggle);
                    assert!(spec.column_allowed(&toggles), "{} with {:?} off", other, toggle);
                }
            }
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn test_read_only_columns_always_allowed() {
        let toggles = FeatureToggleSet::default();
        for add_on in AddOn::ALL.into_iter().filter(|a| a.is_read_only()) {
            assert!(add_on.spec().column_allowed(&toggles));
        }
        assert!(!AddOn::RawScans.spec().column_allowed(&toggles));
        assert!(!AddOn::Push1.spec().column_allowed(&toggles));
        assert!(AddOn::ReturnSleeved.spec().column_allowed(&toggles));
    }

    #[test]
    fn test_column_needs_parent_and_sub_toggle() {
        let mut toggles = FeatureToggleSet::default();
        toggles.scan.scanner_b = true;
        assert!(!AddOn::ScannerB.spec().column_allowed(&toggles));
        toggles.scan.is_enabled = true;
        assert!(AddOn::ScannerB.spec().column_allowed(&toggles));
        assert!(!AddOn::ScannerC.spec().column_allowed(&toggles));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Denial::CapabilityDisabled(Capability::Scan).message(),
            "Scanning is not enabled."
        );
        assert_eq!(
            Denial::CapabilityDisabled(Capability::Dev).message(),
            "Developing is not currently enabled."
        );
        assert_eq!(
            Denial::NotIncluded(Capability::Print).message(),
            "This service does not include printing."
        );
        assert_eq!(Denial::SubToggleDisabled("Scanner B").message(), "Scanner B is not enabled.");
    }
}
