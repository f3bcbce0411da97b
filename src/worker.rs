// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The chaos game.
//!
//! An [`OrbitWorker`] owns a private copy of the genome, its own
//! random number generator, and a single running point.  Each step
//! picks a transform from the jump table, moves the point through the
//! transform's affine map, blends the orbit color toward the
//! transform's color, replaces the point with the weighted sum of the
//! active variations, and optionally runs the final transform.  Points
//! that blow up are thrown away and the orbit restarts somewhere
//! random; every restart discards its first [`WARMUP_ITERATIONS`]
//! samples while the orbit settles onto the attractor.
//!
//! Workers stop when a shared flag goes false.  They check it between
//! steps and never block, so stopping is prompt and leaves nothing
//! half-written.  Dropping a [`WorkerHandle`] or [`WorkerPool`] lowers
//! the flag and joins, so no thread outlives its owner.

use crossbeam::thread::ScopedJoinHandle;
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::color::ColorSet;
use crate::errors::FlameError;
use crate::genome::Genome;
use crate::histogram::{Accumulator, Histogram};
use crate::variation::BoundVariation;
use crate::vector::{apply_affine, Vector2};

/// Samples discarded after every (re)start of an orbit.
pub const WARMUP_ITERATIONS: u64 = 50;

/// What a single step of the chaos game did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// The sample went to the accumulator.
    Recorded,
    /// The orbit is still settling; nothing was recorded.
    WarmingUp,
    /// The point went non-finite and the orbit was restarted.
    Diverged,
}

/// One simulation thread's worth of state.
pub struct OrbitWorker {
    genome: Genome,
    variations: Vec<BoundVariation>,
    rng: SmallRng,
    point: Vector2,
    scratch: Vector2,
    color: ColorSet,
    iterations: u64,
}

impl OrbitWorker {
    /// Take a private copy of `genome` and seed the worker's generator.
    /// The genome is validated here, so a bad one never reaches a
    /// thread.
    pub fn new(genome: &Genome, seed: u64) -> Result<OrbitWorker, FlameError> {
        genome.validate()?;
        let genome = genome.clone_for_worker();
        let variations = genome.bind_variations()?;
        let mut worker = OrbitWorker {
            genome,
            variations,
            rng: SmallRng::seed_from_u64(seed),
            point: Vector2::zero(),
            scratch: Vector2::zero(),
            color: ColorSet::black(),
            iterations: 0,
        };
        worker.restart();
        Ok(worker)
    }

    /// The worker's own genome.
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Current orbit position.
    pub fn point(&self) -> Vector2 {
        self.point
    }

    /// Current orbit color.
    pub fn color(&self) -> ColorSet {
        self.color
    }

    /// Steps survived since the last restart.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Move the orbit to `point`.  Lets a controller seed an orbit
    /// somewhere specific; the iteration count is left alone.
    pub fn place(&mut self, point: Vector2) {
        self.point = point;
    }

    fn restart(&mut self) {
        self.point.set(
            self.rng.gen_range(-1.0, 1.0),
            self.rng.gen_range(-1.0, 1.0),
        );
        self.color = ColorSet::black();
        self.iterations = 0;
    }

    /// Run one iteration of the chaos game, reporting survivors to
    /// `sink`.
    pub fn step<A: Accumulator + ?Sized>(&mut self, sink: &A) -> Step {
        let index = self.genome.selection_table.sample(&mut self.rng);
        self.genome.current_transform_index = index as i32;

        apply_affine(&self.genome.affine_matrices[index], &self.point, &mut self.scratch);
        self.color.hit(&self.genome.transform_colors[index]);

        if self.genome.variation_enabled {
            self.point = Vector2::zero();
            for variation in &self.variations {
                let contribution = variation.apply(&self.scratch, &mut self.rng);
                self.point.add(&contribution);
            }
        } else {
            self.point = self.scratch;
        }

        if self.genome.final_transform_enabled {
            apply_affine(&self.genome.final_matrices[index], &self.point, &mut self.scratch);
            self.point = self.scratch;
            self.color.hit(&self.genome.final_colors[index]);
        }

        if !self.point.is_finite() {
            self.restart();
            return Step::Diverged;
        }

        self.iterations += 1;
        if self.iterations <= WARMUP_ITERATIONS {
            return Step::WarmingUp;
        }
        sink.hit(&self.point, &self.color);
        Step::Recorded
    }

    /// Step until `running` goes false.  Returns how many samples were
    /// recorded.
    pub fn run<A: Accumulator + ?Sized>(&mut self, running: &AtomicBool, sink: &A) -> u64 {
        let mut recorded = 0;
        while running.load(Ordering::Relaxed) {
            if self.step(sink) == Step::Recorded {
                recorded += 1;
            }
        }
        recorded
    }

    /// Start a worker on its own thread, plotting into `histogram`
    /// until `running` goes false.
    pub fn spawn(
        genome: &Genome,
        running: Arc<AtomicBool>,
        histogram: Arc<Histogram>,
        seed: u64,
    ) -> Result<WorkerHandle, FlameError> {
        let mut worker = OrbitWorker::new(genome, seed)?;
        let flag = running.clone();
        let thread = thread::Builder::new()
            .name(format!("orbit-{}", seed))
            .spawn(move || {
                debug!("orbit worker {} started", seed);
                let recorded = worker.run(&flag, &*histogram);
                debug!("orbit worker {} stopped after {} samples", seed, recorded);
                recorded
            })
            .map_err(|e| FlameError::Spawn(e.to_string()))?;
        Ok(WorkerHandle {
            running,
            thread: Some(thread),
        })
    }
}

/// Workers plot through the histogram's camera, not the genome's.  A
/// genome reframed without `Histogram::set_camera` would plot into a
/// frame nobody asked for.
fn check_framing(genome: &Genome, histogram: &Histogram) -> Result<(), FlameError> {
    if genome.camera != *histogram.camera() {
        return Err(FlameError::InvalidGeometry(format!(
            "genome camera {:?} does not match histogram camera {:?}",
            genome.camera,
            histogram.camera()
        )));
    }
    Ok(())
}

/// A running worker thread.
pub struct WorkerHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<u64>>,
}

impl WorkerHandle {
    /// Lower the shared flag, which stops every worker sharing it, and
    /// wait for this one.  Returns the samples it recorded.
    pub fn stop_and_join(self) -> Result<u64, FlameError> {
        self.running.store(false, Ordering::Relaxed);
        self.join()
    }

    fn join(mut self) -> Result<u64, FlameError> {
        self.join_thread().unwrap_or(Ok(0))
    }

    fn join_thread(&mut self) -> Option<Result<u64, FlameError>> {
        self.thread.take().map(|thread| {
            thread.join().map_err(|_| {
                warn!("orbit worker panicked");
                FlameError::WorkerPanicked
            })
        })
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        let _ = self.join_thread();
    }
}

/// A fixed set of workers sharing one flag and one histogram.
pub struct WorkerPool {
    running: Arc<AtomicBool>,
    handles: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Start `threads` workers on `genome`.  Worker `i` is seeded with
    /// `seed + i`.  The genome is checked before any thread starts.
    pub fn start(
        genome: &Genome,
        histogram: Arc<Histogram>,
        threads: usize,
        seed: u64,
    ) -> Result<WorkerPool, FlameError> {
        genome.validate()?;
        check_framing(genome, &histogram)?;
        let running = Arc::new(AtomicBool::new(true));
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            match OrbitWorker::spawn(
                genome,
                running.clone(),
                histogram.clone(),
                seed.wrapping_add(i as u64),
            ) {
                Ok(handle) => handles.push(handle),
                // Dropping the started handles stops and joins them.
                Err(e) => return Err(e),
            }
        }
        info!("started {} orbit workers", threads);
        Ok(WorkerPool { running, handles })
    }

    /// Number of workers.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if the pool has no workers.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every worker and wait for all of them.  Returns the total
    /// samples recorded.
    pub fn stop_and_join(mut self) -> Result<u64, FlameError> {
        self.running.store(false, Ordering::Relaxed);
        let mut total = 0;
        let mut failure = None;
        for handle in self.handles.drain(..) {
            match handle.join() {
                Ok(recorded) => total += recorded,
                Err(e) => failure = Some(e),
            }
        }
        match failure {
            Some(e) => Err(e),
            None => {
                info!("orbit workers stopped with {} samples", total);
                Ok(total)
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if !self.handles.is_empty() {
            debug!("joining {} orbit workers on drop", self.handles.len());
        }
    }
}

/// Run `threads` workers on scoped threads against a borrowed
/// histogram for `duration`, then stop them.  Returns the total samples
/// recorded.
pub fn run_for(
    genome: &Genome,
    histogram: &Histogram,
    threads: usize,
    seed: u64,
    duration: Duration,
) -> Result<u64, FlameError> {
    check_framing(genome, histogram)?;
    let mut workers = (0..threads)
        .map(|i| OrbitWorker::new(genome, seed.wrapping_add(i as u64)))
        .collect::<Result<Vec<_>, _>>()?;
    let running = AtomicBool::new(true);

    let totals = crossbeam::scope(|spawner| {
        let handles: Vec<ScopedJoinHandle<u64>> = workers
            .iter_mut()
            .map(|worker| {
                let running = &running;
                spawner.spawn(move |_| worker.run(running, histogram))
            })
            .collect();
        thread::sleep(duration);
        running.store(false, Ordering::Relaxed);
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| FlameError::WorkerPanicked))
            .collect::<Result<Vec<u64>, FlameError>>()
    })
    .map_err(|_| FlameError::WorkerPanicked)??;

    let total: u64 = totals.iter().sum();
    info!("{} workers recorded {} samples", threads, total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter(Cell<usize>);

    impl Accumulator for Counter {
        fn hit(&self, _point: &Vector2, _color: &ColorSet) {
            self.0.set(self.0.get() + 1);
        }
    }

    /// A genome whose maps all shrink toward the origin, so it never
    /// diverges.
    fn tame_genome() -> Genome {
        let mut g = Genome::random(3, 3, &mut SmallRng::seed_from_u64(17));
        for m in g.affine_matrices.iter_mut() {
            *m = [[0.5, 0.0, 0.1], [0.0, 0.5, -0.1]];
        }
        g.variation_enabled = false;
        g.final_transform_enabled = false;
        g
    }

    #[test]
    fn warmup_suppresses_the_first_fifty_samples() {
        let mut worker = OrbitWorker::new(&tame_genome(), 1).unwrap();
        let counter = Counter(Cell::new(0));
        for _ in 0..WARMUP_ITERATIONS {
            assert_eq!(worker.step(&counter), Step::WarmingUp);
        }
        assert_eq!(counter.0.get(), 0);
        assert_eq!(worker.step(&counter), Step::Recorded);
        assert_eq!(counter.0.get(), 1);
    }

    #[test]
    fn divergent_points_restart_the_orbit() {
        let mut worker = OrbitWorker::new(&tame_genome(), 2).unwrap();
        let counter = Counter(Cell::new(0));
        for _ in 0..80 {
            worker.step(&counter);
        }
        let before = counter.0.get();
        for &bad in &[std::f64::NAN, std::f64::INFINITY, std::f64::NEG_INFINITY] {
            worker.place(Vector2::new(bad, 0.0));
            assert_eq!(worker.step(&counter), Step::Diverged);
            let p = worker.point();
            assert!(p.is_finite());
            assert!(p.x >= -1.0 && p.x <= 1.0 && p.y >= -1.0 && p.y <= 1.0);
            assert_eq!(worker.iterations(), 0);
            assert_eq!(worker.color(), ColorSet::black());
        }
        assert_eq!(counter.0.get(), before);
    }

    #[test]
    fn disabled_variations_leave_the_affine_result() {
        let mut g = tame_genome();
        for m in g.affine_matrices.iter_mut() {
            *m = [[0.0, 0.0, 0.25], [0.0, 0.0, -0.75]];
        }
        let mut worker = OrbitWorker::new(&g, 3).unwrap();
        worker.step(&Counter(Cell::new(0)));
        assert_eq!(worker.point(), Vector2::new(0.25, -0.75));
    }

    #[test]
    fn variations_replace_the_point() {
        let mut g = tame_genome();
        for m in g.affine_matrices.iter_mut() {
            *m = [[0.0, 0.0, 0.5], [0.0, 0.0, 0.5]];
        }
        g.variation_enabled = true;
        g.active_variations = vec![0, 29];
        g.variation_weights[0] = 0.5;
        g.variation_weights[29] = 0.5;
        let mut worker = OrbitWorker::new(&g, 4).unwrap();
        worker.step(&Counter(Cell::new(0)));
        // Half linear plus half cylinder.
        let expected = Vector2::new(0.25 + 0.5 * 0.5f64.sin(), 0.5);
        let p = worker.point();
        assert!((p.x - expected.x).abs() < 1e-12);
        assert!((p.y - expected.y).abs() < 1e-12);
    }

    #[test]
    fn final_transform_runs_after_variations() {
        let mut g = tame_genome();
        for m in g.affine_matrices.iter_mut() {
            *m = [[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]];
        }
        for m in g.final_matrices.iter_mut() {
            *m = [[2.0, 0.0, 0.0], [0.0, 3.0, 0.0]];
        }
        for c in g.transform_colors.iter_mut() {
            *c = ColorSet::new(1.0, 0.0, 0.0);
        }
        for c in g.final_colors.iter_mut() {
            *c = ColorSet::new(0.0, 1.0, 0.0);
        }
        g.final_transform_enabled = true;
        let mut worker = OrbitWorker::new(&g, 5).unwrap();
        worker.step(&Counter(Cell::new(0)));
        assert_eq!(worker.point(), Vector2::new(2.0, 3.0));
        // Blended toward red, then toward the final green.
        assert_eq!(worker.color(), ColorSet::new(0.25, 0.5, 0.0));
        assert!(worker.genome().current_transform_index >= 0);
    }

    #[test]
    fn final_colors_are_skipped_when_disabled() {
        let mut g = tame_genome();
        for c in g.transform_colors.iter_mut() {
            *c = ColorSet::new(1.0, 0.0, 0.0);
        }
        for c in g.final_colors.iter_mut() {
            *c = ColorSet::new(0.0, 1.0, 0.0);
        }
        let mut worker = OrbitWorker::new(&g, 5).unwrap();
        worker.step(&Counter(Cell::new(0)));
        assert_eq!(worker.color(), ColorSet::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn color_blends_toward_the_chosen_transform() {
        let mut g = tame_genome();
        let c = ColorSet::new(1.0, 0.5, 0.25);
        for color in g.transform_colors.iter_mut() {
            *color = c;
        }
        let mut worker = OrbitWorker::new(&g, 6).unwrap();
        worker.step(&Counter(Cell::new(0)));
        assert_eq!(worker.color(), ColorSet::new(0.5, 0.25, 0.125));
    }

    #[test]
    fn bad_genomes_never_make_a_worker() {
        let mut g = tame_genome();
        g.active_variations = vec![40];
        assert!(OrbitWorker::new(&g, 0).is_err());
        let h = Arc::new(Histogram::new(4, 4, 1).unwrap());
        let flag = Arc::new(AtomicBool::new(true));
        assert!(OrbitWorker::spawn(&g, flag, h.clone(), 0).is_err());
        assert!(WorkerPool::start(&g, h, 2, 0).is_err());
    }

    #[test]
    fn spawned_workers_fill_the_histogram_until_stopped() {
        let h = Arc::new(Histogram::new(32, 32, 1).unwrap());
        let flag = Arc::new(AtomicBool::new(true));
        let handle = OrbitWorker::spawn(&tame_genome(), flag.clone(), h.clone(), 9).unwrap();
        thread::sleep(Duration::from_millis(50));
        let recorded = handle.stop_and_join().unwrap();
        assert!(!flag.load(Ordering::Relaxed));
        assert!(recorded > 0);
        assert_eq!(h.total_density(), recorded);
    }

    #[test]
    fn pools_stop_together() {
        let h = Arc::new(Histogram::new(32, 32, 1).unwrap());
        let pool = WorkerPool::start(&tame_genome(), h.clone(), 3, 100).unwrap();
        assert_eq!(pool.len(), 3);
        thread::sleep(Duration::from_millis(50));
        let recorded = pool.stop_and_join().unwrap();
        assert!(recorded > 0);
        // Racing blends never lose a visit count.
        assert_eq!(h.total_density(), recorded);
        let mut h = Arc::try_unwrap(h).ok().unwrap();
        h.reset();
        assert_eq!(h.total_density(), 0);
    }

    #[test]
    fn dropped_pools_stop_their_workers() {
        let h = Arc::new(Histogram::new(32, 32, 1).unwrap());
        let pool = WorkerPool::start(&tame_genome(), h.clone(), 2, 200).unwrap();
        thread::sleep(Duration::from_millis(30));
        drop(pool);
        // Every worker has been joined and let go of the histogram.
        assert_eq!(Arc::strong_count(&h), 1);
        let settled = h.total_density();
        assert!(settled > 0);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(h.total_density(), settled);
    }

    #[test]
    fn dropped_handles_stop_their_worker() {
        let h = Arc::new(Histogram::new(32, 32, 1).unwrap());
        let flag = Arc::new(AtomicBool::new(true));
        let handle = OrbitWorker::spawn(&tame_genome(), flag.clone(), h.clone(), 11).unwrap();
        thread::sleep(Duration::from_millis(20));
        drop(handle);
        assert!(!flag.load(Ordering::Relaxed));
        assert_eq!(Arc::strong_count(&h), 1);
    }

    #[test]
    fn workers_refuse_a_histogram_framed_differently() {
        let mut g = tame_genome();
        g.camera.x_offset = 0.5;
        let h = Histogram::new(8, 8, 1).unwrap();
        match run_for(&g, &h, 1, 0, Duration::from_millis(1)) {
            Err(FlameError::InvalidGeometry(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
        let h = Arc::new(h);
        assert!(WorkerPool::start(&g, h.clone(), 1, 0).is_err());
        assert_eq!(Arc::strong_count(&h), 1);

        let h = Histogram::new(8, 8, 1).unwrap().with_camera(g.camera).unwrap();
        assert!(run_for(&g, &h, 1, 0, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn scoped_runs_return_their_totals() {
        let h = Histogram::new(32, 32, 2).unwrap();
        let recorded = run_for(&tame_genome(), &h, 2, 7, Duration::from_millis(30)).unwrap();
        assert!(recorded > 0);
        assert_eq!(h.total_density(), recorded);
        let pixels = h.render(&tame_genome());
        assert!(pixels.iter().any(|&p| p != crate::histogram::OPAQUE_BLACK));
    }
}
