//! Residual analysis: find where the current model fails worst.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Entity, EvidenceEntity, LinearModel, TargetTransform};

/// The `k` entities with the largest absolute residual.
///
/// `targets` are in the model's native scale. Residuals are ranked by
/// `|predicted - actual|` in that scale; ties keep input order. `abs_diff`
/// is reported in the original scale via `transform`.
pub fn worst_predictions(
    entities: &[Entity],
    model: &LinearModel,
    inputs: &[Vec<f64>],
    targets: &[f64],
    k: usize,
    transform: TargetTransform,
) -> DomainResult<Vec<EvidenceEntity>> {
    if inputs.len() != entities.len() || targets.len() != entities.len() {
        return Err(DomainError::DimensionMismatch {
            context: "entities vs inputs/targets".to_string(),
            expected: entities.len(),
            actual: if inputs.len() == entities.len() {
                targets.len()
            } else {
                inputs.len()
            },
        });
    }

    let predictions = model.predict(inputs)?;

    let mut residuals: Vec<EvidenceEntity> = entities
        .iter()
        .zip(predictions)
        .zip(targets)
        .map(|((entity, predicted), &actual)| EvidenceEntity {
            entity: entity.clone(),
            actual,
            predicted,
            abs_diff: (transform.inverse(predicted) - transform.inverse(actual)).abs(),
            signed_delta: predicted - actual,
        })
        .collect();

    // sort_by is stable: equal magnitudes keep their input order
    residuals.sort_by(|a, b| b.signed_delta.abs().total_cmp(&a.signed_delta.abs()));
    residuals.truncate(k);
    Ok(residuals)
}

/// Split evidence into (under-predicted, over-predicted), preserving order.
///
/// Exact fits (`signed_delta == 0`) belong to neither side.
pub fn partition_by_sign(evidence: &[EvidenceEntity]) -> (Vec<EvidenceEntity>, Vec<EvidenceEntity>) {
    let under = evidence
        .iter()
        .filter(|e| e.is_under_predicted())
        .cloned()
        .collect();
    let over = evidence
        .iter()
        .filter(|e| e.is_over_predicted())
        .cloned()
        .collect();
    (under, over)
}
