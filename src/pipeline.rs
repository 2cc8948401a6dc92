//! Offering Engine - Single Entry Point
//!
//! CRITICAL: apply_update MUST call validate_update internally. No bypass.

use thiserror::Error;

use crate::allowance::{AllowanceResolver, PricingMatrix, UnknownService};
use crate::compatibility::{CompatibilityGraph, GraphError, Service};
use crate::config::EngineConfig;
use crate::hashing::catalog_revision;
use crate::lab::Lab;
use crate::reference::ReferenceData;
use crate::toggles::FeatureToggleSet;
use crate::validation::{ConfigurationValidator, ProposedOffering, UpdateOutcome};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Reference data inconsistent: {0}")]
    Graph(#[from] GraphError),

    #[error("Lab catalog inconsistent: {0}")]
    UnknownService(#[from] UnknownService),

    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Binds the compatibility graph to the resolver and validator.
///
/// Holds no per-lab state; one engine serves every lab.
pub struct OfferingEngine {
    graph: CompatibilityGraph,
    config: EngineConfig,
}

impl OfferingEngine {
    pub fn new(reference: ReferenceData, config: EngineConfig) -> Result<Self, EngineError> {
        let graph = CompatibilityGraph::build(reference)?;
        Ok(Self { graph, config })
    }

    pub fn graph(&self) -> &CompatibilityGraph {
        &self.graph
    }

    /// Every sellable service.
    pub fn services(&self) -> Vec<&Service> {
        self.graph.all_valid_services()
    }

    pub fn provision_lab(&self, name: &str, owner_id: &str, toggles: FeatureToggleSet) -> Lab {
        Lab::provision(&self.graph, name, owner_id, toggles)
    }

    /// Read-only matrix of what the lab may offer and what it currently does.
    pub fn pricing_matrix(&self, lab: &Lab) -> Result<PricingMatrix, EngineError> {
        let resolver = AllowanceResolver::new(&self.graph, &lab.toggles);
        Ok(PricingMatrix {
            revision: catalog_revision(lab)?,
            columns: resolver.columns(),
            rows: resolver.matrix_rows(lab)?,
        })
    }

    /// Validate a batch against the lab snapshot without touching it.
    ///
    /// This is the ONLY validation entry point.
    pub fn validate_update(
        &self,
        lab: &Lab,
        batch: &[ProposedOffering],
    ) -> Result<UpdateOutcome, EngineError> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let base_revision = catalog_revision(lab)?;
        let verdict = ConfigurationValidator::new(&self.graph, &self.config.pricing)
            .validate(lab, batch)?;

        Ok(UpdateOutcome {
            base_revision,
            accepted: verdict.accepted,
            errors: verdict.errors,
        })
    }

    pub fn validate_update_json(&self, lab: &Lab, payload: &str) -> Result<UpdateOutcome, EngineError> {
        let batch = parse_batch(payload)?;
        self.validate_update(lab, &batch)
    }

    /// Validate, then write accepted rows into the lab.
    ///
    /// CRITICAL: This ALWAYS calls validate_update internally. Rejected rows
    /// keep their stored state; accepted rows land in submission order.
    pub fn apply_update(
        &self,
        lab: &mut Lab,
        batch: &[ProposedOffering],
    ) -> Result<UpdateOutcome, EngineError> {
        // MANDATORY: Validation is always called. This is non-negotiable.
        let outcome = self.validate_update(lab, batch)?;
        let applied = lab.apply(&outcome.accepted);
        tracing::info!(lab = %lab.id, applied, rejected = outcome.errors.len(), "offering batch applied");
        Ok(outcome)
    }
}

/// Parse a JSON batch. Unknown add-ons or fields make the whole batch malformed.
pub fn parse_batch(payload: &str) -> Result<Vec<ProposedOffering>, EngineError> {
    serde_json::from_str(payload).map_err(|e| EngineError::MalformedBatch(e.to_string()))
}
