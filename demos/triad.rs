//! Bracket a hand written triad with SDE marks and region logging.
//!
//! ```text
//! sde64 -start_ssc_mark 111:repeat -stop_ssc_mark 222:repeat -mix -- \
//!     cargo run --release --example triad
//! ```
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use streamtrace::{LogMarks, SdeMarks};

const LEN: usize = 1 << 22;
const PASSES: usize = 8;

#[streamtrace::region_fn("demo_triad")]
fn triad(a: &mut [f64], b: &[f64], c: &[f64], scalar: f64) {
    a.par_iter_mut()
        .zip(b.par_iter())
        .zip(c.par_iter())
        .for_each(|((a, b), c)| *a = *b + scalar * *c);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    streamtrace::install!(SdeMarks::default(), LogMarks);

    let mut a = vec![1.0; LEN];
    let b = vec![2.0; LEN];
    let c = vec![0.5; LEN];

    for _ in 0..PASSES {
        triad(&mut a, &b, &c, 3.0);
    }

    println!("a[0] = {} after {PASSES} passes of {LEN} elements", a[0]);

    if let Some(instruments) = streamtrace::instrument::uninstall() {
        println!("{} sessions on {:?}", instruments.sessions(), instruments.names());
    }
}
