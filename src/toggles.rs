//! Feature Toggle Set - Per-Lab Capability Switches
//!
//! Sub-options are only live while their parent capability is enabled.

use serde::{Deserialize, Serialize};

use crate::reference::Capabilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Dev,
    Scan,
    Print,
}

impl Capability {
    pub fn included_in(self, caps: &Capabilities) -> bool {
        match self {
            Capability::Dev => caps.dev,
            Capability::Scan => caps.scan,
            Capability::Print => caps.print,
        }
    }

    /// Gerund used in user-facing messages.
    pub fn activity(self) -> &'static str {
        match self {
            Capability::Dev => "Developing",
            Capability::Scan => "Scanning",
            Capability::Print => "Printing",
        }
    }
}

/// Sub-options nested under scan or print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubToggle {
    RawScans,
    ScannerB,
    ScannerC,
    ScannerD,
    ScanResB,
    ScanResC,
    ScanOptionB,
    ScanOptionC,
    PrintSizeB,
    PrintSizeC,
    PrintOptionB,
    PrintOptionC,
}

impl SubToggle {
    pub fn parent(self) -> Capability {
        match self {
            SubToggle::PrintSizeB
            | SubToggle::PrintSizeC
            | SubToggle::PrintOptionB
            | SubToggle::PrintOptionC => Capability::Print,
            _ => Capability::Scan,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevToggles {
    #[serde(default)]
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanToggles {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub raw_scans: bool,
    #[serde(default)]
    pub scanner_b: bool,
    #[serde(default)]
    pub scanner_c: bool,
    #[serde(default)]
    pub scanner_d: bool,
    #[serde(default)]
    pub scan_res_b: bool,
    #[serde(default)]
    pub scan_res_c: bool,
    #[serde(default)]
    pub scan_option_b: bool,
    #[serde(default)]
    pub scan_option_c: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintToggles {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub print_size_b: bool,
    #[serde(default)]
    pub print_size_c: bool,
    #[serde(default)]
    pub print_option_b: bool,
    #[serde(default)]
    pub print_option_c: bool,
}

/// Everything defaults to off; a new lab opts in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggleSet {
    #[serde(default)]
    pub dev: DevToggles,
    #[serde(default)]
    pub scan: ScanToggles,
    #[serde(default)]
    pub print: PrintToggles,
}

impl FeatureToggleSet {
    pub fn capability_enabled(&self, capability: Capability) -> bool {
        match capability {
            Capability::Dev => self.dev.is_enabled,
            Capability::Scan => self.scan.is_enabled,
            Capability::Print => self.print.is_enabled,
        }
    }

    /// Raw flag of a sub-option, ignoring its parent.
    pub fn sub_flag(&self, toggle: SubToggle) -> bool {
        match toggle {
            SubToggle::RawScans => self.scan.raw_scans,
            SubToggle::ScannerB => self.scan.scanner_b,
            SubToggle::ScannerC => self.scan.scanner_c,
            SubToggle::ScannerD => self.scan.scanner_d,
            SubToggle::ScanResB => self.scan.scan_res_b,
            SubToggle::ScanResC => self.scan.scan_res_c,
            SubToggle::ScanOptionB => self.scan.scan_option_b,
            SubToggle::ScanOptionC => self.scan.scan_option_c,
            SubToggle::PrintSizeB => self.print.print_size_b,
            SubToggle::PrintSizeC => self.print.print_size_c,
            SubToggle::PrintOptionB => self.print.print_option_b,
            SubToggle::PrintOptionC => self.print.print_option_c,
        }
    }

    /// A sub-option is live only while its parent is on.
    pub fn sub_enabled(&self, toggle: SubToggle) -> bool {
        self.capability_enabled(toggle.parent()) && self.sub_flag(toggle)
    }

    /// Whether the lab can run every capability the service includes.
    pub fn supports(&self, caps: &Capabilities) -> bool {
        [Capability::Dev, Capability::Scan, Capability::Print]
            .into_iter()
            .all(|c| !c.included_in(caps) || self.capability_enabled(c))
    }

    /// Everything on. Mostly useful for fixtures and demo labs.
    pub fn all_enabled() -> Self {
        Self {
            dev: DevToggles { is_enabled: true },
            scan: ScanToggles {
                is_enabled: true,
                raw_scans: true,
                scanner_b: true,
                scanner_c: true,
                scanner_d: true,
                scan_res_b: true,
                scan_res_c: true,
                scan_option_b: true,
                scan_option_c: true,
            },
            print: PrintToggles {
                is_enabled: true,
                print_size_b: true,
                print_size_c: true,
                print_option_b: true,
                print_option_c: true,
            },
        }
    }
}
