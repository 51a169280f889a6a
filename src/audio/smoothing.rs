use crate::error::PipelineError;

/// Frame-to-frame exponential blend: `state += (new - state) / smoothness`.
///
/// `smoothness` of 1 follows the input exactly; larger values react slower.
#[derive(Debug, Clone)]
pub struct Smoother {
    state: Vec<f32>,
    smoothness: f32,
}

impl Smoother {
    pub fn new(len: usize, smoothness: f32) -> Result<Self, PipelineError> {
        if !smoothness.is_finite() || smoothness < 1.0 {
            return Err(PipelineError::invalid(format!(
                "smoothness must be a finite value >= 1 (got {})",
                smoothness
            )));
        }
        Ok(Self {
            state: vec![0.0; len],
            smoothness,
        })
    }

    /// Blend one frame in. A wrong-sized frame is rejected before any state
    /// changes.
    pub fn update(&mut self, values: &[f32]) -> Result<&[f32], PipelineError> {
        if values.len() != self.state.len() {
            return Err(PipelineError::SizeMismatch {
                expected: self.state.len(),
                actual: values.len(),
            });
        }

        for (state, &target) in self.state.iter_mut().zip(values) {
            *state += (target - *state) / self.smoothness;
        }
        Ok(&self.state)
    }

    pub fn values(&self) -> &[f32] {
        &self.state
    }

    /// Back to all zeros; the length is kept.
    pub fn reset(&mut self) {
        self.state.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_constant_input() {
        let target = [1.0, 0.5, 0.0, 0.75];
        let mut smoother = Smoother::new(4, 6.0).unwrap();
        for _ in 0..200 {
            smoother.update(&target).unwrap();
        }
        for (v, t) in smoother.values().iter().zip(target) {
            assert!((v - t).abs() < 1e-5, "{} did not converge to {}", v, t);
        }
    }

    #[test]
    fn approaches_monotonically_without_overshoot() {
        for smoothness in [1.0f32, 1.5, 6.0, 40.0] {
            let mut smoother = Smoother::new(2, smoothness).unwrap();
            // Start above one target and below the other
            smoother.update(&[2.0, -2.0]).unwrap();
            let target = [0.5f32, 0.5];
            let mut prev = smoother.values().to_vec();

            for _ in 0..100 {
                let next = smoother.update(&target).unwrap().to_vec();
                for i in 0..2 {
                    let before = (prev[i] - target[i]).abs();
                    let after = (next[i] - target[i]).abs();
                    assert!(after <= before);
                    // Stays on the side it started from
                    assert!((next[i] - target[i]) * (prev[i] - target[i]) >= 0.0);
                }
                prev = next;
            }
        }
    }

    #[test]
    fn factor_one_tracks_input() {
        let mut smoother = Smoother::new(3, 1.0).unwrap();
        assert_eq!(smoother.update(&[0.1, 0.2, 0.3]).unwrap(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn size_mismatch_leaves_state_untouched() {
        let mut smoother = Smoother::new(3, 2.0).unwrap();
        smoother.update(&[1.0, 1.0, 1.0]).unwrap();
        let before = smoother.values().to_vec();

        assert_eq!(
            smoother.update(&[1.0, 1.0]),
            Err(PipelineError::SizeMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(smoother.values(), before.as_slice());
    }

    #[test]
    fn reset_clears_levels_and_keeps_length() {
        let mut smoother = Smoother::new(3, 2.0).unwrap();
        smoother.update(&[1.0, 1.0, 1.0]).unwrap();
        smoother.update(&[1.0, 1.0, 1.0]).unwrap();

        smoother.reset();
        assert_eq!(smoother.values(), &[0.0, 0.0, 0.0]);

        // Next frame blends from zero again
        assert_eq!(smoother.update(&[1.0, 0.5, 0.0]).unwrap(), &[0.5, 0.25, 0.0]);
    }

    #[test]
    fn rejects_factor_below_one() {
        assert!(Smoother::new(4, 0.5).is_err());
        assert!(Smoother::new(4, f32::NAN).is_err());
    }
}
