//! Film Lab Core - Service Compatibility and Pricing Engine
//!
//! # Ground Rules
//! 1. The compatibility graph is the only source of services
//! 2. Allowance is derived, never stored
//! 3. Disabling is always legal
//! 4. A row is applied whole or not at all
//! 5. Rows never depend on each other
//! 6. The engine computes, the caller persists

pub mod reference;
pub mod compatibility;
pub mod toggles;
pub mod addons;
pub mod lab;
pub mod allowance;
pub mod validation;
pub mod config;
pub mod hashing;
pub mod pipeline;

pub use reference::{Capabilities, FilmSize, FilmType, ReferenceData, ServiceType};
pub use compatibility::{CompatibilityGraph, GraphError, Service, ServiceId};
pub use toggles::{Capability, FeatureToggleSet, SubToggle};
pub use addons::{AddOn, Denial};
pub use lab::{AddOnState, Lab, LabOffering};
pub use allowance::{AllowanceResolver, Cell, Columns, MatrixRow, PricingMatrix};
pub use validation::{ProposedAddOn, ProposedOffering, RowError, UpdateOutcome};
pub use config::{EngineConfig, PricePolicy};
pub use hashing::{canonical_json, catalog_revision};
pub use pipeline::{OfferingEngine, EngineError, parse_batch};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_REFERENCE_VERSION: &str = "1.0.0";
