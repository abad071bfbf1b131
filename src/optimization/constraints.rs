use super::types::OptimizationConstraint;
use crate::simulation::ParameterMap;

/// Hard equality constraints accept values within this distance
pub const EQUALITY_TOLERANCE: f64 = 1e-6;

/// Metric value by name, falling back to the quality sub-metric `quality_<name>`
pub fn resolve_metric(metrics: &ParameterMap, name: &str) -> Option<f64> {
    metrics
        .get(name)
        .or_else(|| metrics.get(&format!("quality_{}", name)))
        .copied()
}

impl OptimizationConstraint {
    /// Distance of `value` from the feasible region (0 when satisfied)
    pub fn violation(&self, value: f64) -> f64 {
        let mut violation = 0.0;
        if let Some(min) = self.min_value {
            violation += (min - value).max(0.0);
        }
        if let Some(max) = self.max_value {
            violation += (value - max).max(0.0);
        }
        if let Some(target) = self.equals_value {
            let distance = (value - target).abs();
            if !self.is_hard_constraint || distance > EQUALITY_TOLERANCE {
                violation += distance;
            }
        }
        violation
    }

    /// Value the constraint applies to: an output metric, else an input parameter
    fn lookup(&self, metrics: &ParameterMap, parameters: &ParameterMap) -> Option<f64> {
        resolve_metric(metrics, &self.parameter).or_else(|| parameters.get(&self.parameter).copied())
    }
}

/// Summed constraint violations of one evaluated point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConstraintReport {
    /// Sum of hard violations (unweighted)
    pub hard_violation: f64,
    /// Sum of weighted soft violations
    pub soft_penalty: f64,
}

impl ConstraintReport {
    pub fn is_feasible(&self) -> bool {
        self.hard_violation == 0.0
    }

    pub fn penalty(&self, hard_multiplier: f64) -> f64 {
        hard_multiplier * self.hard_violation + self.soft_penalty
    }
}

/// Check every constraint. Constraints naming an unknown variable are ignored.
pub fn check_constraints(
    constraints: &[OptimizationConstraint],
    metrics: &ParameterMap,
    parameters: &ParameterMap,
) -> ConstraintReport {
    let mut report = ConstraintReport::default();
    for constraint in constraints {
        let Some(value) = constraint.lookup(metrics, parameters) else {
            continue;
        };
        let violation = constraint.violation(value);
        if constraint.is_hard_constraint {
            report.hard_violation += violation;
        } else {
            report.soft_penalty += constraint.weight * violation;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, f64)]) -> ParameterMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_range_violation() {
        let c = OptimizationConstraint::range("pressure", Some(80.0), Some(120.0));
        assert_eq!(c.violation(100.0), 0.0);
        assert_eq!(c.violation(70.0), 10.0);
        assert_eq!(c.violation(125.0), 5.0);
    }

    #[test]
    fn test_equality_tolerance_only_for_hard() {
        let mut hard = OptimizationConstraint::range("x", None, None);
        hard.equals_value = Some(1.0);
        assert_eq!(hard.violation(1.0 + 1e-7), 0.0);
        assert!((hard.violation(1.5) - 0.5).abs() < 1e-12);

        let soft = hard.clone().soft(2.0);
        assert!(soft.violation(1.0 + 1e-7) > 0.0);
    }

    #[test]
    fn test_report_splits_hard_and_soft() {
        let constraints = vec![
            OptimizationConstraint::range("energy_consumption", None, Some(100.0)),
            OptimizationConstraint::range("temperature", Some(200.0), None).soft(0.5),
            OptimizationConstraint::range("not_a_variable", Some(0.0), Some(1.0)),
        ];
        let metrics = map(&[("energy_consumption", 130.0)]);
        let parameters = map(&[("temperature", 190.0)]);

        let report = check_constraints(&constraints, &metrics, &parameters);
        assert_eq!(report.hard_violation, 30.0);
        assert_eq!(report.soft_penalty, 5.0);
        assert!(!report.is_feasible());
        assert_eq!(report.penalty(1000.0), 30_005.0);
    }

    #[test]
    fn test_metrics_take_precedence_and_quality_prefix_resolves() {
        let metrics = map(&[("quality_score", 0.4), ("quality_strength", 0.9)]);
        let parameters = map(&[("score", 10.0)]);

        assert_eq!(resolve_metric(&metrics, "score"), Some(0.4));
        assert_eq!(resolve_metric(&metrics, "quality_strength"), Some(0.9));
        assert_eq!(resolve_metric(&metrics, "missing"), None);

        let c = OptimizationConstraint::range("score", Some(0.5), None);
        let report = check_constraints(&[c], &metrics, &parameters);
        assert!((report.hard_violation - 0.1).abs() < 1e-12);
    }
}
