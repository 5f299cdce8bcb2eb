//! Filter application over an observation store

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use species_filter_core::{
    ApplyAllResponse, ApplyReport, FailedUpdate, Filter, Observation, Predicate,
};
use species_filter_storage::ObservationStorage;
use std::sync::Arc;
use uuid::Uuid;

use crate::ApplyError;

/// How a run reacts to a failed write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Stop at the first failure; earlier updates stay persisted
    #[default]
    StopOnError,
    /// Record failures in the report and keep going
    ContinueOnError,
    /// On the first failure, restore every observation already updated
    AllOrNothing,
}

/// Applies filters to the observations held by a store
pub struct RuleApplier {
    observations: Arc<dyn ObservationStorage>,
}

impl RuleApplier {
    pub fn new(observations: Arc<dyn ObservationStorage>) -> Self {
        Self { observations }
    }

    /// Apply a filter and return the number of observations updated.
    ///
    /// Updates are persisted one at a time as matches are read. If a write
    /// fails the run stops there, the updates before it remain, and the
    /// error reports how many were applied. The filter's `enabled` flag is
    /// not checked; see [`RuleApplier::apply_enabled`].
    pub async fn apply(&self, filter: &Filter) -> Result<usize, ApplyError> {
        self.apply_with(filter, ApplyMode::StopOnError)
            .await
            .map(|report| report.updated)
    }

    /// Apply a filter, reacting to failed writes according to `mode`
    pub async fn apply_with(
        &self,
        filter: &Filter,
        mode: ApplyMode,
    ) -> Result<ApplyReport, ApplyError> {
        filter.validate()?;

        let predicate = Predicate::for_filter(filter);
        let mut report = ApplyReport::new(filter.id);

        if filter.is_noop() {
            report.matched = self
                .observations
                .count(&predicate)
                .await
                .map_err(|e| ApplyError::read(0, e))?;
            tracing::warn!(
                "Filter '{}' updates {} to itself, skipping {} matches",
                filter,
                filter.species,
                report.matched
            );
            return Ok(report);
        }

        if predicate.is_unscoped() {
            tracing::info!(
                "Filter '{}' has no location, applying to every {} observation",
                filter,
                filter.species
            );
        }
        tracing::info!("Applying filter '{}' ({:?}): {}", filter, mode, predicate);

        let mut matches = self
            .observations
            .find(&predicate)
            .await
            .map_err(|e| ApplyError::read(0, e))?;

        // Updated records and their original species, kept only for AllOrNothing
        let mut undo: Vec<(Observation, String)> = Vec::new();

        while let Some(next) = matches.next().await {
            let mut observation = match next {
                Ok(observation) => observation,
                Err(e) => {
                    if mode == ApplyMode::AllOrNothing {
                        return Err(self.revert(undo, e.to_string()).await);
                    }
                    return Err(ApplyError::read(report.updated, e));
                }
            };

            report.matched += 1;
            let id = observation.id;
            let original =
                std::mem::replace(&mut observation.species, filter.update_species.clone());

            match self.observations.update(observation).await {
                Ok(saved) => {
                    report.updated += 1;
                    tracing::debug!(
                        "Observation {} updated from {} to {}",
                        id,
                        original,
                        saved.species
                    );
                    if mode == ApplyMode::AllOrNothing {
                        undo.push((saved, original));
                    }
                }
                Err(e) => match mode {
                    ApplyMode::StopOnError => {
                        tracing::warn!(
                            "Filter '{}' stopped after {} updates: observation {}: {}",
                            filter,
                            report.updated,
                            id,
                            e
                        );
                        return Err(ApplyError::write(report.updated, id, e));
                    }
                    ApplyMode::ContinueOnError => {
                        tracing::warn!("Failed to update observation {}: {}", id, e);
                        report.failed.push(FailedUpdate {
                            observation_id: id,
                            error: e.to_string(),
                        });
                    }
                    ApplyMode::AllOrNothing => {
                        let cause = format!("observation {}: {}", id, e);
                        return Err(self.revert(undo, cause).await);
                    }
                },
            }
        }

        tracing::info!(
            "Filter '{}' updated {} of {} matching observations",
            filter,
            report.updated,
            report.matched
        );

        Ok(report)
    }

    /// Apply each enabled filter in order, skipping disabled ones
    pub async fn apply_enabled(&self, filters: &[Filter]) -> Result<ApplyAllResponse, ApplyError> {
        let mut response = ApplyAllResponse {
            reports: Vec::new(),
            skipped: 0,
            updated: 0,
        };

        for filter in filters {
            if !filter.enabled {
                tracing::debug!("Skipping disabled filter '{}'", filter);
                response.skipped += 1;
                continue;
            }
            let report = self.apply_with(filter, ApplyMode::StopOnError).await?;
            response.updated += report.updated;
            response.reports.push(report);
        }

        Ok(response)
    }

    /// Restore the original species of already updated observations
    async fn revert(&self, undo: Vec<(Observation, String)>, cause: String) -> ApplyError {
        let mut reverted = 0;
        let mut unreverted: Vec<Uuid> = Vec::new();

        for (mut observation, original) in undo.into_iter().rev() {
            let id = observation.id;
            observation.species = original;
            match self.observations.update(observation).await {
                Ok(_) => reverted += 1,
                Err(e) => {
                    tracing::error!("Failed to restore observation {}: {}", id, e);
                    unreverted.push(id);
                }
            }
        }

        tracing::warn!(
            "Rolled back {} updates ({} could not be restored): {}",
            reverted,
            unreverted.len(),
            cause
        );

        ApplyError::RolledBack {
            reverted,
            unreverted,
            cause,
        }
    }
}
