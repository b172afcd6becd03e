//! Orchestration of the full counterexample search.

use std::sync::{Arc, mpsc::Sender};

use tracing::{info, instrument};

use crate::{
    Result,
    arguments::Arguments,
    error::DetectorError,
    event::Event,
    generators::{CandidateInput, generate_inputs},
    hypotest::hypothesis_test,
    mechanism::Mechanism,
    selector::select_event,
    stats::hypergeom::{CdfBackend, HypergeometricCdf},
};

const DEFAULT_EVENT_ITERATIONS: usize = 100_000;
const DEFAULT_DETECT_ITERATIONS: usize = 500_000;
const DEFAULT_INPUT_SIZES: [usize; 2] = [5, 10];

/// One completed test: the tested budget, the resulting p-value and the
/// counterexample candidate behind it.
#[derive(Clone, Debug)]
pub struct Detection {
    epsilon: f64,
    p_value: f64,
    d1: Vec<f64>,
    d2: Vec<f64>,
    args: Arguments,
    event: Event,
}

impl Detection {
    /// Returns the tested privacy budget.
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Returns the final p-value; small values reject the budget.
    #[must_use]
    pub fn p_value(&self) -> f64 {
        self.p_value
    }

    /// Returns the first database of the counterexample candidate.
    #[must_use]
    pub fn d1(&self) -> &[f64] {
        &self.d1
    }

    /// Returns the second database of the counterexample candidate.
    #[must_use]
    pub fn d2(&self) -> &[f64] {
        &self.d2
    }

    /// Returns the arguments the mechanism ran under.
    #[must_use]
    pub fn args(&self) -> &Arguments {
        &self.args
    }

    /// Returns the selected event.
    #[must_use]
    pub fn event(&self) -> &Event {
        &self.event
    }
}

/// Configures and constructs [`Detector`] instances.
///
/// # Examples
/// ```
/// use dpcheck_core::DetectorBuilder;
///
/// let detector = DetectorBuilder::new()
///     .with_event_iterations(20_000)
///     .with_detect_iterations(100_000)
///     .with_workers(2)
///     .build()
///     .expect("builder configuration is valid");
/// drop(detector);
/// ```
#[derive(Debug)]
pub struct DetectorBuilder {
    event_iterations: usize,
    detect_iterations: usize,
    workers: usize,
    input_sizes: Vec<usize>,
    databases: Option<(Vec<f64>, Vec<f64>)>,
    event: Option<Event>,
    quiet: bool,
    cdf_backend: Option<CdfBackend>,
    progress: Option<Sender<Detection>>,
}

impl Default for DetectorBuilder {
    fn default() -> Self {
        Self {
            event_iterations: DEFAULT_EVENT_ITERATIONS,
            detect_iterations: DEFAULT_DETECT_ITERATIONS,
            workers: 0,
            input_sizes: DEFAULT_INPUT_SIZES.to_vec(),
            databases: None,
            event: None,
            quiet: false,
            cdf_backend: None,
            progress: None,
        }
    }
}

impl DetectorBuilder {
    /// Creates a builder populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the per-database sample count of the event-selection pass.
    #[must_use]
    pub fn with_event_iterations(mut self, iterations: usize) -> Self {
        self.event_iterations = iterations;
        self
    }

    /// Overrides the per-database sample count of the hypothesis test.
    #[must_use]
    pub fn with_detect_iterations(mut self, iterations: usize) -> Self {
        self.detect_iterations = iterations;
        self
    }

    /// Sets the worker pool size; `0` auto-detects the hardware parallelism
    /// and `1` keeps all work on a single pool thread.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the database sizes the input generator should cover.
    #[must_use]
    pub fn with_input_sizes(mut self, sizes: &[usize]) -> Self {
        self.input_sizes = sizes.to_vec();
        self
    }

    /// Supplies an explicit adjacent pair, bypassing the input generator.
    #[must_use]
    pub fn with_databases(mut self, d1: Vec<f64>, d2: Vec<f64>) -> Self {
        self.databases = Some((d1, d2));
        self
    }

    /// Supplies an explicit event, bypassing the search-space inference.
    #[must_use]
    pub fn with_event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }

    /// Suppresses the per-budget progress log line.
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Overrides the hypergeometric CDF backend; by default the
    /// `DPCHECK_HYPERGEOM` environment variable decides.
    #[must_use]
    pub fn with_cdf_backend(mut self, backend: CdfBackend) -> Self {
        self.cdf_backend = Some(backend);
        self
    }

    /// Registers a channel receiving each completed [`Detection`] as soon as
    /// its budget finishes.
    #[must_use]
    pub fn with_progress_channel(mut self, sender: Sender<Detection>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Validates the configuration, builds the worker pool and constructs a
    /// [`Detector`].
    ///
    /// # Errors
    /// Returns [`DetectorError::InvalidIterations`] for zero iteration
    /// counts, the generator's size errors for unusable input sizes, and
    /// [`DetectorError::WorkerPool`] when the pool cannot be spawned.
    pub fn build(self) -> Result<Detector> {
        if self.event_iterations == 0 {
            return Err(DetectorError::InvalidIterations {
                option: "event_iterations",
            });
        }
        if self.detect_iterations == 0 {
            return Err(DetectorError::InvalidIterations {
                option: "detect_iterations",
            });
        }
        if self.databases.is_none() {
            if self.input_sizes.is_empty() {
                return Err(DetectorError::NoInputSizes);
            }
            if self.input_sizes.contains(&0) {
                return Err(DetectorError::InvalidInputSize);
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("dpcheck-worker-{index}"))
            .build()
            .map_err(|error| DetectorError::WorkerPool {
                message: Arc::from(error.to_string().as_str()),
            })?;
        let cdf = self.cdf_backend.unwrap_or_else(CdfBackend::from_env);

        Ok(Detector {
            event_iterations: self.event_iterations,
            detect_iterations: self.detect_iterations,
            input_sizes: self.input_sizes,
            databases: self.databases,
            event: self.event,
            quiet: self.quiet,
            progress: self.progress,
            cdf: cdf.instantiate(),
            pool,
        })
    }
}

/// Entry point for the counterexample search.
///
/// A detector owns the worker pool every sampling pass runs on; dropping the
/// detector joins the pool, so no worker outlives it. Partial work for a
/// budget that did not finish is discarded with it.
pub struct Detector {
    event_iterations: usize,
    detect_iterations: usize,
    input_sizes: Vec<usize>,
    databases: Option<(Vec<f64>, Vec<f64>)>,
    event: Option<Event>,
    quiet: bool,
    progress: Option<Sender<Detection>>,
    cdf: Box<dyn HypergeometricCdf>,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("event_iterations", &self.event_iterations)
            .field("detect_iterations", &self.detect_iterations)
            .field("input_sizes", &self.input_sizes)
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

impl Detector {
    /// Tests the mechanism against every budget in `test_epsilons`.
    ///
    /// `default_args` is handed to the mechanism unchanged on every run —
    /// the tested budgets parameterise only the statistic — and must carry
    /// the `epsilon` key. For each budget the low-resolution selector picks
    /// the most promising (pair, event) candidate and the high-resolution
    /// tester scores it; after the first selection the candidate pair is
    /// pinned for the remaining budgets. One progress line per completed
    /// budget is emitted unless the detector is quiet.
    ///
    /// # Errors
    /// Configuration errors (missing `epsilon`, empty or invalid budget
    /// list) surface before any mechanism runs; mechanism failures and
    /// schema mismatches abort the search and propagate.
    #[instrument(
        name = "detector.detect",
        err,
        skip(self, mechanism, default_args, test_epsilons),
        fields(mechanism = %mechanism.name(), budgets = test_epsilons.len())
    )]
    pub fn detect<M: Mechanism + Sync>(
        &self,
        mechanism: &M,
        default_args: &Arguments,
        test_epsilons: &[f64],
    ) -> Result<Vec<Detection>> {
        if test_epsilons.is_empty() {
            return Err(DetectorError::NoTestEpsilons);
        }
        if let Some(&value) = test_epsilons
            .iter()
            .find(|value| !value.is_finite() || **value <= 0.0)
        {
            return Err(DetectorError::InvalidTestEpsilon { value });
        }

        let mut inputs = self.candidate_inputs(default_args)?;
        let mut detections = Vec::with_capacity(test_epsilons.len());
        for &epsilon in test_epsilons {
            let selection = self.pool.install(|| {
                select_event(
                    mechanism,
                    &inputs,
                    epsilon,
                    self.event_iterations,
                    self.event.as_ref(),
                    self.cdf.as_ref(),
                )
            })?;
            // Pin the selected pair: later budgets re-select only the event.
            if inputs.len() > 1 {
                inputs = vec![selection.input().clone()];
            }

            let outcome = self.pool.install(|| {
                hypothesis_test(
                    mechanism,
                    selection.input().d1(),
                    selection.input().d2(),
                    selection.input().args(),
                    selection.event(),
                    epsilon,
                    self.detect_iterations,
                    false,
                    self.cdf.as_ref(),
                )
            })?;

            let detection = Detection {
                epsilon,
                p_value: outcome.p_value(),
                d1: selection.input().d1().to_vec(),
                d2: selection.input().d2().to_vec(),
                args: selection.input().args().clone(),
                event: selection.event().clone(),
            };
            if !self.quiet {
                info!(
                    "Epsilon: {} | p-value: {:5.3} | Event: {}",
                    detection.epsilon, detection.p_value, detection.event
                );
            }
            if let Some(sender) = &self.progress {
                // A dropped receiver only means nobody is watching.
                let _ = sender.send(detection.clone());
            }
            detections.push(detection);
        }
        Ok(detections)
    }

    fn candidate_inputs(&self, default_args: &Arguments) -> Result<Vec<CandidateInput>> {
        match &self.databases {
            Some((d1, d2)) => {
                if !default_args.has_epsilon() {
                    return Err(DetectorError::MissingEpsilon);
                }
                Ok(vec![CandidateInput::new(
                    d1.clone(),
                    d2.clone(),
                    default_args.clone(),
                )])
            }
            None => generate_inputs(&self.input_sizes, default_args),
        }
    }
}

/// Runs a full counterexample search with default settings.
///
/// Equivalent to `DetectorBuilder::new().build()?.detect(...)`; use the
/// builder for control over iteration counts, worker pool size, explicit
/// databases or events, and progress reporting.
///
/// # Errors
/// Returns the same errors as [`DetectorBuilder::build`] and
/// [`Detector::detect`].
pub fn detect_counterexample<M: Mechanism + Sync>(
    mechanism: &M,
    default_args: &Arguments,
    test_epsilons: &[f64],
) -> Result<Vec<Detection>> {
    DetectorBuilder::new()
        .build()?
        .detect(mechanism, default_args, test_epsilons)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use rstest::rstest;

    use super::*;
    use crate::{event::Predicate, test_utils::FirstQuery};

    fn small_detector() -> DetectorBuilder {
        DetectorBuilder::new()
            .with_event_iterations(500)
            .with_detect_iterations(1_000)
            .with_workers(2)
            .with_quiet(true)
    }

    #[rstest]
    #[case::event(DetectorBuilder::new().with_event_iterations(0), "event_iterations")]
    #[case::detect(DetectorBuilder::new().with_detect_iterations(0), "detect_iterations")]
    fn zero_iterations_are_rejected(#[case] builder: DetectorBuilder, #[case] option: &str) {
        let err = builder.build().expect_err("builder must validate iterations");
        assert!(matches!(
            err,
            DetectorError::InvalidIterations { option: got } if got == option
        ));
    }

    #[test]
    fn unusable_sizes_are_rejected_unless_databases_are_explicit() {
        let err = DetectorBuilder::new()
            .with_input_sizes(&[])
            .build()
            .expect_err("empty sizes must fail");
        assert_eq!(err, DetectorError::NoInputSizes);

        DetectorBuilder::new()
            .with_input_sizes(&[])
            .with_databases(vec![1.0], vec![0.0])
            .build()
            .expect("explicit databases bypass the generator");
    }

    #[rstest]
    #[case::empty(&[], DetectorError::NoTestEpsilons)]
    #[case::negative(&[0.5, -1.0], DetectorError::InvalidTestEpsilon { value: -1.0 })]
    #[case::nan(&[f64::NAN], DetectorError::InvalidTestEpsilon { value: f64::NAN })]
    fn budget_lists_are_validated(#[case] epsilons: &[f64], #[case] expected: DetectorError) {
        let detector = small_detector().build().expect("builder must succeed");
        let args = Arguments::new().with_epsilon(0.5);
        let err = detector
            .detect(&FirstQuery, &args, epsilons)
            .expect_err("budgets must be validated");
        match (err, expected) {
            (
                DetectorError::InvalidTestEpsilon { value: got },
                DetectorError::InvalidTestEpsilon { value },
            ) => assert!(got == value || (got.is_nan() && value.is_nan())),
            (got, other) => assert_eq!(got, other),
        }
    }

    #[test]
    fn missing_epsilon_fails_before_any_run() {
        let detector = small_detector().build().expect("builder must succeed");
        let err = detector
            .detect(&FirstQuery, &Arguments::new(), &[0.5])
            .expect_err("epsilon must be present");
        assert_eq!(err, DetectorError::MissingEpsilon);
    }

    #[test]
    fn explicit_databases_and_event_drive_the_whole_pipeline() {
        let (sender, receiver) = mpsc::channel();
        let detector = small_detector()
            .with_databases(vec![1.0, 1.0, 1.0], vec![0.0, 1.0, 1.0])
            .with_event(Event::scalar(Predicate::Equals(1.0)))
            .with_progress_channel(sender)
            .build()
            .expect("builder must succeed");
        let args = Arguments::new().with_epsilon(0.5);

        let detections = detector
            .detect(&FirstQuery, &args, &[0.3, 0.6])
            .expect("detection must succeed");
        assert_eq!(detections.len(), 2);
        for detection in &detections {
            assert_eq!(detection.d1(), [1.0, 1.0, 1.0]);
            assert_eq!(detection.event(), &Event::scalar(Predicate::Equals(1.0)));
            assert!(detection.args().has_epsilon());
            // FirstQuery fully separates the pair, so every budget is
            // rejected outright.
            assert!(detection.p_value() < 0.05);
        }

        let streamed: Vec<Detection> = receiver.try_iter().collect();
        assert_eq!(streamed.len(), 2);
        assert_eq!(streamed[0].epsilon(), 0.3);
    }
}
