//! The phase barrier: the single synchronization point every worker thread
//! in every worker process rendezvouses at between batches, and the sample
//! ring that accumulates one timing per completed batch.
//!
//! Grounded directly in libMicro's `barrier_create`/`barrier_queue`
//! (the `pthread_mutex_t`/`pthread_cond_t` `PTHREAD_PROCESS_SHARED`
//! variant, not the `USE_SEMOP` alternative) and `update_stats`. The
//! header-plus-trailing-data layout mirrors `lithos_icc`'s
//! `RingHeader` + slot array: a fixed `#[repr(C)]` header at offset 0 of
//! an anonymous shared mapping, with a `data: [f64]` ring computed by
//! pointer arithmetic just past it, so the whole thing lives in one
//! `mbench_mmap::SharedRegion` that every forked worker inherits.

use mbench_clock::ClockCalibration;
use mbench_mmap::SharedRegion;
use std::io;
use std::mem::size_of;
use std::sync::atomic::{AtomicI32, Ordering};

/// One worker's timing for a single batch, handed to [`PhaseBarrier::queue`].
#[derive(Debug, Clone, Copy)]
pub struct SampleResult {
    pub t0_ns: i64,
    pub t1_ns: i64,
    pub count: u64,
    pub errors: u64,
}

#[repr(C)]
struct RawHeader {
    lock: libc::pthread_mutex_t,
    cv: libc::pthread_cond_t,
    /// Run/stop flag, read by workers outside the lock between batches.
    flag: AtomicI32,
    hwm: i32,
    waiters: i32,
    phase: i32,
    datasize: i32,
    batches: i64,
    count: i64,
    errors: i64,
    count0: i64,
    errors0: i64,
    t0: i64,
    t1: i64,
    starttime: i64,
    endtime: i64,
    deadline: i64,
    quant: i64,
}

/// A phase barrier shared by every thread in every worker process. Create
/// it before `fork()`-ing workers; every descendant inherits valid
/// pointers into the same `MAP_SHARED` region automatically.
pub struct PhaseBarrier {
    region: SharedRegion,
    hdr: *mut RawHeader,
    data: *mut f64,
    datasize: usize,
}

unsafe impl Send for PhaseBarrier {}
unsafe impl Sync for PhaseBarrier {}

fn check_os(call: &'static str, rc: i32) -> io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        let source = io::Error::from_raw_os_error(rc);
        Err(io::Error::new(source.kind(), format!("{call} failed: {source}")))
    }
}

impl PhaseBarrier {
    /// Allocates the shared region and initializes the `PROCESS_SHARED`
    /// mutex/condvar plus all counters. `hwm` is the number of
    /// threads-across-all-processes that must arrive before a phase trips;
    /// `datasize` is the sample ring's capacity.
    pub fn create(hwm: usize, datasize: usize) -> io::Result<Self> {
        let header_size = size_of::<RawHeader>();
        let total = header_size + datasize * size_of::<f64>();
        let region = SharedRegion::new(total)?;
        let hdr: *mut RawHeader = unsafe { region.typed_ptr(0) };
        let data: *mut f64 = unsafe { region.typed_ptr(header_size) };

        unsafe {
            let mut mattr: libc::pthread_mutexattr_t = std::mem::zeroed();
            let mut cattr: libc::pthread_condattr_t = std::mem::zeroed();
            check_os("pthread_mutexattr_init", libc::pthread_mutexattr_init(&mut mattr))?;
            check_os(
                "pthread_mutexattr_setpshared",
                libc::pthread_mutexattr_setpshared(&mut mattr, libc::PTHREAD_PROCESS_SHARED),
            )?;
            check_os("pthread_condattr_init", libc::pthread_condattr_init(&mut cattr))?;
            check_os(
                "pthread_condattr_setpshared",
                libc::pthread_condattr_setpshared(&mut cattr, libc::PTHREAD_PROCESS_SHARED),
            )?;

            std::ptr::write(
                hdr,
                RawHeader {
                    lock: std::mem::zeroed(),
                    cv: std::mem::zeroed(),
                    flag: AtomicI32::new(0),
                    hwm: hwm as i32,
                    waiters: 0,
                    phase: 0,
                    datasize: datasize as i32,
                    batches: 0,
                    count: 0,
                    errors: 0,
                    count0: 0,
                    errors0: 0,
                    t0: 0,
                    t1: 0,
                    starttime: 0,
                    endtime: 0,
                    deadline: 0,
                    quant: 0,
                },
            );

            check_os("pthread_mutex_init", libc::pthread_mutex_init(&mut (*hdr).lock, &mattr))?;
            check_os("pthread_cond_init", libc::pthread_cond_init(&mut (*hdr).cv, &cattr))?;

            for i in 0..datasize {
                data.add(i).write(0.0);
            }
        }

        Ok(Self {
            region,
            hdr,
            data,
            datasize,
        })
    }

    #[inline]
    fn hdr(&self) -> &RawHeader {
        unsafe { &*self.hdr }
    }

    pub fn start(&self, starttime_ns: i64, deadline_ns: i64) {
        unsafe {
            (*self.hdr).starttime = starttime_ns;
            (*self.hdr).deadline = deadline_ns;
        }
        self.hdr().flag.store(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.hdr().flag.load(Ordering::Relaxed) != 0
    }

    #[inline]
    pub fn stop(&self) {
        self.hdr().flag.store(0, Ordering::Relaxed);
    }

    pub fn set_endtime(&self, endtime_ns: i64) {
        unsafe {
            (*self.hdr).endtime = endtime_ns;
        }
    }

    pub fn starttime(&self) -> i64 {
        self.hdr().starttime
    }

    pub fn endtime(&self) -> i64 {
        self.hdr().endtime
    }

    pub fn deadline(&self) -> i64 {
        self.hdr().deadline
    }

    pub fn batches(&self) -> i64 {
        self.hdr().batches
    }

    pub fn total_count(&self) -> i64 {
        self.hdr().count
    }

    pub fn total_errors(&self) -> i64 {
        self.hdr().errors
    }

    pub fn quant_suspect_batches(&self) -> i64 {
        self.hdr().quant
    }

    pub fn datasize(&self) -> usize {
        self.datasize
    }

    /// Copies out the ring's currently valid entries: the first
    /// `min(batches, datasize)` slots, in ring order (not chronological
    /// order once the ring has wrapped) — exactly as libMicro's own
    /// `print_histo`/`compute_stats` read `ba_data` directly without
    /// reordering, since every downstream consumer sorts anyway.
    pub fn samples(&self) -> Vec<f64> {
        let n = (self.hdr().batches as usize).min(self.datasize);
        (0..n).map(|i| unsafe { *self.data.add(i) }).collect()
    }

    /// Records one worker's batch result and blocks until every other
    /// worker has also queued for this phase. Pass `None` on the very
    /// first call of a run if a thread needs to synchronize before timing
    /// starts without contributing a sample.
    pub fn queue(&self, sample: Option<&SampleResult>, clock: ClockCalibration, total_threads: i64) {
        unsafe {
            check_lock(libc::pthread_mutex_lock(&mut (*self.hdr).lock));

            if let Some(r) = sample {
                self.commit_locked(r, clock, total_threads);
            }

            let phase = (*self.hdr).phase;
            (*self.hdr).waiters += 1;
            if (*self.hdr).waiters == (*self.hdr).hwm {
                (*self.hdr).waiters = 0;
                (*self.hdr).phase += 1;
                check_lock(libc::pthread_cond_broadcast(&mut (*self.hdr).cv));
            }

            while (*self.hdr).phase == phase {
                check_lock(libc::pthread_cond_wait(&mut (*self.hdr).cv, &mut (*self.hdr).lock));
            }

            check_lock(libc::pthread_mutex_unlock(&mut (*self.hdr).lock));
        }
    }

    /// # Safety
    /// Caller must already hold `self.hdr.lock`.
    unsafe fn commit_locked(&self, r: &SampleResult, clock: ClockCalibration, total_threads: i64) {
        unsafe {
            let hdr = &mut *self.hdr;

            if hdr.waiters == 0 {
                hdr.t0 = r.t0_ns;
                hdr.t1 = r.t1_ns;
                hdr.count0 = 0;
                hdr.errors0 = 0;
            } else {
                if r.t0_ns < hdr.t0 {
                    hdr.t0 = r.t0_ns;
                }
                if r.t1_ns > hdr.t1 {
                    hdr.t1 = r.t1_ns;
                }
            }

            hdr.count0 += r.count as i64;
            hdr.errors0 += r.errors as i64;

            if hdr.waiters == hdr.hwm - 1 {
                let time = (hdr.t1 - hdr.t0 - clock.overhead_ns) as f64;

                if time < (100.0 * clock.resolution_ns as f64) {
                    hdr.quant += 1;
                }

                let nsecs_per_call = time / hdr.count0 as f64 * total_threads as f64;

                hdr.count += hdr.count0;
                hdr.errors += hdr.errors0;

                let idx = (hdr.batches % hdr.datasize as i64) as usize;
                self.data.add(idx).write(nsecs_per_call);

                hdr.batches += 1;
            }
        }
    }
}

fn check_lock(rc: i32) {
    assert_eq!(rc, 0, "pthread barrier primitive failed with errno {rc}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbench_clock::calibrate;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_thread_barrier_completes_every_phase() {
        let barrier = PhaseBarrier::create(1, 64).unwrap();
        barrier.start(0, 1_000_000_000);
        let clock = calibrate();

        for i in 0..5 {
            let r = SampleResult {
                t0_ns: i * 1000,
                t1_ns: i * 1000 + 500,
                count: 10,
                errors: 0,
            };
            barrier.queue(Some(&r), clock, 1);
        }

        assert_eq!(barrier.batches(), 5);
        assert_eq!(barrier.total_count(), 50);
        assert_eq!(barrier.samples().len(), 5);
    }

    #[test]
    fn multiple_threads_rendezvous_before_tripping() {
        let barrier = Arc::new(PhaseBarrier::create(4, 64).unwrap());
        barrier.start(0, 1_000_000_000);
        let clock = calibrate();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let b = Arc::clone(&barrier);
                thread::spawn(move || {
                    let r = SampleResult {
                        t0_ns: t * 10,
                        t1_ns: t * 10 + 100,
                        count: 1,
                        errors: 0,
                    };
                    b.queue(Some(&r), clock, 4);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(barrier.batches(), 1);
        assert_eq!(barrier.total_count(), 4);
    }

    #[test]
    fn ring_drops_oldest_once_full() {
        let barrier = PhaseBarrier::create(1, 4).unwrap();
        barrier.start(0, 1_000_000_000);
        let clock = calibrate();

        for i in 0..10 {
            let r = SampleResult {
                t0_ns: i * 1000,
                t1_ns: i * 1000 + 500,
                count: 1,
                errors: 0,
            };
            barrier.queue(Some(&r), clock, 1);
        }

        assert_eq!(barrier.batches(), 10);
        assert_eq!(barrier.samples().len(), 4);
    }
}
