//! The four STREAM kernels as fork-join parallel loops
//!
//! Every pass splits the arrays into contiguous chunks (one per worker, like a
//! static OpenMP schedule), writes each index exactly once, and returns only
//! once every chunk is finished.
use rayon::prelude::*;

use crate::element::StreamElement;

/// A STREAM kernel
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// `c = a`
    Copy,

    /// `b = scalar * c`
    Scale,

    /// `c = a + b`
    Add,

    /// `a = b + scalar * c`
    Triad,
}

impl Kernel {
    /// Every kernel in the order the full benchmark runs them
    pub const ALL: [Kernel; 4] = [Kernel::Copy, Kernel::Scale, Kernel::Add, Kernel::Triad];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Kernel::Copy => "Copy",
            Kernel::Scale => "Scale",
            Kernel::Add => "Add",
            Kernel::Triad => "Triad",
        }
    }

    /// Number of arrays read or written per element
    #[must_use]
    pub const fn arrays_touched(self) -> usize {
        match self {
            Kernel::Copy | Kernel::Scale => 2,
            Kernel::Add | Kernel::Triad => 3,
        }
    }

    /// Bytes moved by one pass over arrays of `len` elements
    #[must_use]
    pub fn bytes_moved<T: StreamElement>(self, len: usize) -> u64 {
        (self.arrays_touched() * T::size()) as u64 * len as u64
    }

    /// Run one parallel pass on the current rayon pool
    ///
    /// A `chunk` of 0 is treated as 1.
    ///
    /// # Panics
    ///
    /// If the three arrays differ in length
    pub fn run<T: StreamElement>(self, arrays: &mut StreamArrays<T>, scalar: T, chunk: usize) {
        arrays.assert_same_len();

        let chunk = chunk.max(1);
        let StreamArrays { a, b, c } = arrays;

        match self {
            Kernel::Copy => copy(c, a, chunk),
            Kernel::Scale => scale(b, c, scalar, chunk),
            Kernel::Add => add(c, a, b, chunk),
            Kernel::Triad => triad(a, b, c, scalar, chunk),
        }
    }

    /// Run one pass on the calling thread only
    ///
    /// # Panics
    ///
    /// If the three arrays differ in length
    pub fn run_serial<T: StreamElement>(self, arrays: &mut StreamArrays<T>, scalar: T) {
        arrays.assert_same_len();

        let StreamArrays { a, b, c } = arrays;

        match self {
            Kernel::Copy => c.copy_from_slice(a),
            Kernel::Scale => {
                for (b, c) in b.iter_mut().zip(c.iter()) {
                    *b = scalar * *c;
                }
            }
            Kernel::Add => {
                for ((c, a), b) in c.iter_mut().zip(a.iter()).zip(b.iter()) {
                    *c = *a + *b;
                }
            }
            Kernel::Triad => {
                for ((a, b), c) in a.iter_mut().zip(b.iter()).zip(c.iter()) {
                    *a = *b + scalar * *c;
                }
            }
        }
    }
}

/// The three benchmark arrays
#[derive(Debug, Clone, PartialEq)]
pub struct StreamArrays<T> {
    pub a: Vec<T>,
    pub b: Vec<T>,
    pub c: Vec<T>,
}

impl<T: StreamElement> StreamArrays<T> {
    /// Allocate `len` elements per array and initialise them to `a = 1, b = 2, c = 0`.
    ///
    /// Initialisation uses the same chunking as the kernels so that pages are
    /// first touched by the worker that later streams them.
    #[must_use]
    pub fn new(len: usize, chunk: usize) -> Self {
        let zero = T::from_f64(0.0);
        let mut arrays = Self {
            a: vec![zero; len],
            b: vec![zero; len],
            c: vec![zero; len],
        };

        arrays.reset(chunk);
        arrays
    }

    /// Write the initial values `a = 1, b = 2, c = 0` again
    pub fn reset(&mut self, chunk: usize) {
        fill(&mut self.a, T::from_f64(1.0), chunk);
        fill(&mut self.b, T::from_f64(2.0), chunk);
        fill(&mut self.c, T::from_f64(0.0), chunk);
    }

    /// Zipped passes would silently skip the tail of a longer array
    fn assert_same_len(&self) {
        assert!(
            self.a.len() == self.b.len() && self.b.len() == self.c.len(),
            "array lengths differ: a {}, b {}, c {}",
            self.a.len(),
            self.b.len(),
            self.c.len()
        );
    }

    /// Number of elements in each array
    #[must_use]
    pub fn len(&self) -> usize {
        self.a.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Bytes held by one array
    #[must_use]
    pub fn bytes_per_array(&self) -> usize {
        self.len() * T::size()
    }

    /// `a = 2 * a`, the pass used to estimate timer resolution against
    pub fn double_a(&mut self, chunk: usize) {
        let two = T::from_f64(2.0);
        self.a
            .par_chunks_mut(chunk.max(1))
            .for_each(|a| a.iter_mut().for_each(|a| *a = two * *a));
    }
}

/// Elements handed to each worker for a pass over `len` elements
#[must_use]
pub fn chunk_len(len: usize, threads: usize) -> usize {
    len.div_ceil(threads.max(1)).max(1)
}

fn fill<T: StreamElement>(dst: &mut [T], value: T, chunk: usize) {
    dst.par_chunks_mut(chunk.max(1)).for_each(|dst| dst.fill(value));
}

fn copy<T: StreamElement>(dst: &mut [T], src: &[T], chunk: usize) {
    dst.par_chunks_mut(chunk)
        .zip(src.par_chunks(chunk))
        .for_each(|(dst, src)| dst.copy_from_slice(src));
}

fn scale<T: StreamElement>(dst: &mut [T], src: &[T], scalar: T, chunk: usize) {
    dst.par_chunks_mut(chunk)
        .zip(src.par_chunks(chunk))
        .for_each(|(dst, src)| {
            for (dst, src) in dst.iter_mut().zip(src) {
                *dst = scalar * *src;
            }
        });
}

fn add<T: StreamElement>(dst: &mut [T], x: &[T], y: &[T], chunk: usize) {
    dst.par_chunks_mut(chunk)
        .zip(x.par_chunks(chunk))
        .zip(y.par_chunks(chunk))
        .for_each(|((dst, x), y)| {
            for ((dst, x), y) in dst.iter_mut().zip(x).zip(y) {
                *dst = *x + *y;
            }
        });
}

fn triad<T: StreamElement>(dst: &mut [T], x: &[T], y: &[T], scalar: T, chunk: usize) {
    dst.par_chunks_mut(chunk)
        .zip(x.par_chunks(chunk))
        .zip(y.par_chunks(chunk))
        .for_each(|((dst, x), y)| {
            for ((dst, x), y) in dst.iter_mut().zip(x).zip(y) {
                *dst = *x + scalar * *y;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::Rng;

    fn random_arrays(len: usize) -> StreamArrays<f64> {
        let mut rng = rand::thread_rng();
        let mut random = |len: usize| {
            (0..len)
                .map(|_| rng.gen_range(-100.0..100.0))
                .collect::<Vec<f64>>()
        };

        StreamArrays {
            a: random(len),
            b: random(len),
            c: random(len),
        }
    }

    #[test]
    fn test_init_values() {
        let arrays = StreamArrays::<f64>::new(1001, chunk_len(1001, 4));

        assert!(arrays.a.iter().all(|&a| a == 1.0));
        assert!(arrays.b.iter().all(|&b| b == 2.0));
        assert!(arrays.c.iter().all(|&c| c == 0.0));
        assert_eq!(arrays.bytes_per_array(), 1001 * 8);
    }

    #[test]
    fn test_zero_chunk_runs_as_one() {
        let mut arrays = StreamArrays::<f64>::new(10, 0);
        arrays.double_a(0);

        for kernel in Kernel::ALL {
            kernel.run(&mut arrays, 3.0, 0);
        }

        assert_eq!(arrays.a, vec![30.0; 10]);
    }

    #[test]
    #[should_panic(expected = "array lengths differ")]
    fn test_mismatched_lengths_panic() {
        let mut arrays = StreamArrays {
            a: vec![0.0f64; 8],
            b: vec![1.0; 8],
            c: vec![2.0; 5],
        };

        Kernel::Triad.run(&mut arrays, 3.0, 4);
    }

    #[test]
    fn test_chunk_len() {
        assert_eq!(chunk_len(10, 3), 4);
        assert_eq!(chunk_len(12, 3), 4);
        assert_eq!(chunk_len(3, 8), 1);
        assert_eq!(chunk_len(0, 4), 1);
        assert_eq!(chunk_len(100, 0), 100);
    }

    #[test]
    fn test_bytes_moved() {
        assert_eq!(Kernel::Copy.bytes_moved::<f64>(10), 160);
        assert_eq!(Kernel::Scale.bytes_moved::<f32>(10), 80);
        assert_eq!(Kernel::Add.bytes_moved::<f64>(10), 240);
        assert_eq!(Kernel::Triad.bytes_moved::<f64>(10), 240);
    }

    #[test]
    fn test_parallel_matches_serial() {
        for len in [1, 7, 64, 1000, 4099] {
            for threads in [1, 3, 8] {
                let chunk = chunk_len(len, threads);

                for kernel in Kernel::ALL {
                    let mut parallel = random_arrays(len);
                    let mut serial = parallel.clone();

                    kernel.run(&mut parallel, 3.0, chunk);
                    kernel.run_serial(&mut serial, 3.0);

                    assert_eq!(parallel, serial, "{kernel:?} len {len} threads {threads}");
                }
            }
        }
    }

    #[test]
    fn test_double_a() {
        let mut arrays = StreamArrays::<f32>::new(33, 5);
        arrays.double_a(5);
        assert!(arrays.a.iter().all(|&a| a == 2.0));
    }

    proptest! {
        #[test]
        fn triad_identity_holds(
            values in prop::collection::vec((-1.0e6f64..1.0e6, -1.0e6f64..1.0e6), 1..2000),
            scalar in -1.0e3f64..1.0e3,
            threads in 1usize..16,
        ) {
            let len = values.len();
            let mut arrays = StreamArrays {
                a: vec![0.0; len],
                b: values.iter().map(|(b, _)| *b).collect(),
                c: values.iter().map(|(_, c)| *c).collect(),
            };

            Kernel::Triad.run(&mut arrays, scalar, chunk_len(len, threads));

            for j in 0..len {
                prop_assert_eq!(arrays.a[j], arrays.b[j] + scalar * arrays.c[j]);
            }
        }
    }
}
