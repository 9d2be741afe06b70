//! Deterministic well-mixed SIR curves for comparing against network runs.
//!
//! With `N = s + i + r`:
//!
//! ```text
//! ds/dt = -beta * s * i / N
//! di/dt =  beta * s * i / N - gamma * i
//! dr/dt =  gamma * i
//! ```
use serde::Serialize;

use crate::error::SirError;
use crate::parameters::Parameters;

/// One sample of the ODE solution.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct OdePoint {
    pub t: f64,
    pub s: f64,
    pub i: f64,
    pub r: f64,
}

impl OdePoint {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.s + self.i + self.r
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExactSir {
    /// Contact rate times transmission chance.
    pub beta: f64,
    pub gamma: f64,
}

impl ExactSir {
    #[must_use]
    pub fn new(beta: f64, gamma: f64) -> Self {
        ExactSir { beta, gamma }
    }

    /// Uses the per-turn infection and recovery probabilities as rates.
    #[must_use]
    pub fn from_parameters(parameters: &Parameters) -> Self {
        ExactSir::new(
            parameters.infection_probability,
            parameters.recovery_probability,
        )
    }

    /// Returns `(ds, di, dr)`. An empty population does not change.
    #[must_use]
    pub fn derivative(&self, s: f64, i: f64, r: f64) -> (f64, f64, f64) {
        let n = s + i + r;
        if n <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let infections = self.beta * s * i / n;
        let recoveries = self.gamma * i;
        (-infections, infections - recoveries, recoveries)
    }

    /// Integrates from `initial` (taken at `t = 0`) to `t_end` with classical RK4.
    /// The final step is shortened so the last point lands on `t_end`.
    pub fn solve(
        &self,
        initial: (f64, f64, f64),
        t_end: f64,
        dt: f64,
    ) -> Result<Vec<OdePoint>, SirError> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(SirError::ConfigurationError(format!(
                "dt must be positive and finite, got {dt}"
            )));
        }
        if !(t_end >= 0.0 && t_end.is_finite()) {
            return Err(SirError::ConfigurationError(format!(
                "t_end must be non-negative and finite, got {t_end}"
            )));
        }

        let (s, i, r) = initial;
        let mut point = OdePoint { t: 0.0, s, i, r };
        let mut points = vec![point];
        while point.t < t_end {
            let h = dt.min(t_end - point.t);
            point = self.rk4_step(point, h);
            points.push(point);
        }
        Ok(points)
    }

    fn rk4_step(&self, p: OdePoint, h: f64) -> OdePoint {
        let k1 = self.derivative(p.s, p.i, p.r);
        let k2 = self.derivative(
            p.s + h / 2.0 * k1.0,
            p.i + h / 2.0 * k1.1,
            p.r + h / 2.0 * k1.2,
        );
        let k3 = self.derivative(
            p.s + h / 2.0 * k2.0,
            p.i + h / 2.0 * k2.1,
            p.r + h / 2.0 * k2.2,
        );
        let k4 = self.derivative(p.s + h * k3.0, p.i + h * k3.1, p.r + h * k3.2);
        OdePoint {
            t: p.t + h,
            s: p.s + h / 6.0 * (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0),
            i: p.i + h / 6.0 * (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1),
            r: p.r + h / 6.0 * (k1.2 + 2.0 * k2.2 + 2.0 * k3.2 + k4.2),
        }
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;
    use crate::parameters::ParametersBuilder;

    #[test]
    fn population_is_conserved() {
        let model = ExactSir::new(0.1, 0.1);
        let points = model.solve((100.0, 1.0, 0.0), 100.0, 0.1).unwrap();
        for point in &points {
            assert_relative_eq!(point.total(), 101.0, epsilon = 1e-9);
            assert!(point.s >= 0.0 && point.i >= 0.0 && point.r >= 0.0);
        }
        let last = points.last().unwrap();
        assert_relative_eq!(last.t, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn pure_recovery_decays_exponentially() {
        let model = ExactSir::new(0.0, 0.5);
        let points = model.solve((0.0, 10.0, 0.0), 4.0, 0.01).unwrap();
        let last = points.last().unwrap();
        assert_relative_eq!(last.i, 10.0 * (-0.5f64 * 4.0).exp(), epsilon = 1e-8);
        assert_relative_eq!(last.r, 10.0 - last.i, epsilon = 1e-8);
    }

    #[test]
    fn susceptibles_only_decrease() {
        let model = ExactSir::new(0.4, 0.1);
        let points = model.solve((99.0, 1.0, 0.0), 50.0, 0.5).unwrap();
        for pair in points.windows(2) {
            assert!(pair[1].s <= pair[0].s);
            assert!(pair[1].r >= pair[0].r);
        }
    }

    #[test]
    fn short_final_step_and_zero_horizon() {
        let model = ExactSir::new(0.1, 0.1);
        let points = model.solve((10.0, 1.0, 0.0), 1.0, 0.3).unwrap();
        assert_eq!(points.len(), 5);
        assert_relative_eq!(points[4].t, 1.0, epsilon = 1e-12);

        let points = model.solve((10.0, 1.0, 0.0), 0.0, 0.3).unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn invalid_step_size() {
        let model = ExactSir::new(0.1, 0.1);
        assert!(matches!(
            model.solve((1.0, 1.0, 0.0), 1.0, 0.0),
            Err(SirError::ConfigurationError(_))
        ));
        assert!(matches!(
            model.solve((1.0, 1.0, 0.0), -1.0, 0.1),
            Err(SirError::ConfigurationError(_))
        ));
    }

    #[test]
    fn empty_population_is_stationary() {
        assert_eq!(ExactSir::new(1.0, 1.0).derivative(0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
    }

    #[test]
    fn rates_come_from_parameters() {
        let parameters = ParametersBuilder::default()
            .infection_probability(0.3)
            .recovery_probability(0.2)
            .build()
            .unwrap();
        assert_eq!(ExactSir::from_parameters(&parameters), ExactSir::new(0.3, 0.2));
    }
}
