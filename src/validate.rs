//! Check the arrays against a scalar replay of the same kernels
use crate::element::StreamElement;
use crate::kernels::{Kernel, StreamArrays};

/// How far one array is from its expected value
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayCheck {
    pub name: &'static str,

    /// Value every element should hold
    pub expected: f64,

    /// Mean absolute difference to `expected`
    pub avg_abs_err: f64,

    /// `avg_abs_err / |expected|`
    pub rel_err: f64,

    /// Elements whose own relative error exceeds the tolerance
    pub mismatches: usize,
}

impl ArrayCheck {
    #[must_use]
    pub fn passed(&self, epsilon: f64) -> bool {
        self.rel_err <= epsilon
    }
}

/// Result of checking all three arrays
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub epsilon: f64,
    pub arrays: [ArrayCheck; 3],
}

impl Validation {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.arrays.iter().all(|check| check.passed(self.epsilon))
    }

    /// Checks of the arrays that failed
    #[must_use]
    pub fn failures(&self) -> Vec<ArrayCheck> {
        self.arrays
            .iter()
            .filter(|check| !check.passed(self.epsilon))
            .cloned()
            .collect()
    }
}

/// The values `a`, `b` and `c` hold after initialisation, the doubling pass
/// and `ntimes` iterations of `kernels`
#[must_use]
pub fn expected_values<T: StreamElement>(kernels: &[Kernel], ntimes: usize, scalar: T) -> [T; 3] {
    let mut arrays = StreamArrays {
        a: vec![T::from_f64(1.0)],
        b: vec![T::from_f64(2.0)],
        c: vec![T::from_f64(0.0)],
    };

    arrays.a[0] = T::from_f64(2.0) * arrays.a[0];

    for _ in 0..ntimes {
        for kernel in kernels {
            kernel.run_serial(&mut arrays, scalar);
        }
    }

    [arrays.a[0], arrays.b[0], arrays.c[0]]
}

/// Compare every element of `arrays` with the replayed values
#[must_use]
pub fn check<T: StreamElement>(
    arrays: &StreamArrays<T>,
    kernels: &[Kernel],
    ntimes: usize,
    scalar: T,
) -> Validation {
    let [a, b, c] = expected_values(kernels, ntimes, scalar);

    Validation {
        epsilon: T::EPSILON,
        arrays: [
            check_array("a", &arrays.a, a),
            check_array("b", &arrays.b, b),
            check_array("c", &arrays.c, c),
        ],
    }
}

#[allow(clippy::cast_precision_loss)]
fn check_array<T: StreamElement>(name: &'static str, values: &[T], expected: T) -> ArrayCheck {
    let expected = expected.to_f64();

    // Relative errors are measured against 1 when the expected value is 0
    let scale = if expected == 0.0 { 1.0 } else { expected.abs() };

    let mut total_err = 0.0;
    let mut mismatches = 0;

    for value in values {
        let err = (value.to_f64() - expected).abs();
        total_err += err;

        if err / scale > T::EPSILON {
            mismatches += 1;
        }
    }

    let avg_abs_err = if values.is_empty() {
        0.0
    } else {
        total_err / values.len() as f64
    };

    ArrayCheck {
        name,
        expected,
        avg_abs_err,
        rel_err: avg_abs_err / scale,
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::chunk_len;
    use rand::Rng;

    fn run(kernels: &[Kernel], len: usize, ntimes: usize) -> StreamArrays<f64> {
        let chunk = chunk_len(len, 4);
        let mut arrays = StreamArrays::new(len, chunk);
        arrays.double_a(chunk);

        for _ in 0..ntimes {
            for kernel in kernels {
                kernel.run(&mut arrays, 3.0, chunk);
            }
        }

        arrays
    }

    #[test]
    fn test_triad_expected_values() {
        // a = 2 + 3 * 0 after any number of triads
        assert_eq!(expected_values(&[Kernel::Triad], 10, 3.0f64), [2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_stream_expected_values() {
        // One iteration: c = 2, b = 6, c = 8, a = 6 + 24
        assert_eq!(expected_values(&Kernel::ALL, 1, 3.0f64), [30.0, 6.0, 8.0]);
    }

    #[test]
    fn test_untouched_results_pass() {
        for kernels in [&[Kernel::Triad][..], &Kernel::ALL[..]] {
            let arrays = run(kernels, 5000, 10);
            let validation = check(&arrays, kernels, 10, 3.0);

            assert!(validation.passed(), "{validation:?}");
            assert!(validation.failures().is_empty());
        }
    }

    #[test]
    fn test_perturbed_results_fail() {
        let mut arrays = run(&Kernel::ALL, 5000, 10);
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let index = rng.gen_range(0..arrays.len());
            arrays.b[index] *= 1.0 + 1.0e-6;
        }

        let validation = check(&arrays, &Kernel::ALL, 10, 3.0);
        assert!(!validation.passed());

        let failures = validation.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "b");
        assert!(failures[0].mismatches > 0 && failures[0].mismatches <= 100);
    }

    #[test]
    fn test_wrong_iteration_count_fails() {
        let arrays = run(&Kernel::ALL, 100, 5);
        assert!(!check(&arrays, &Kernel::ALL, 6, 3.0).passed());
    }

    #[test]
    fn test_f32_tolerance() {
        let chunk = chunk_len(1000, 2);
        let mut arrays = StreamArrays::<f32>::new(1000, chunk);
        arrays.double_a(chunk);

        for _ in 0..10 {
            for kernel in Kernel::ALL {
                kernel.run(&mut arrays, 3.0, chunk);
            }
        }

        assert!(check(&arrays, &Kernel::ALL, 10, 3.0f32).passed());
    }
}
