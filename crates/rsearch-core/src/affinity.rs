//! CPU pinning for worker threads.

/// Pin the calling thread to CPU `id % ncpu`. Returns whether the OS
/// accepted the request.
pub(crate) fn pin_current_thread(id: usize) -> bool {
    let ncpu = std::thread::available_parallelism().map_or(1, |n| n.get());
    let cpu = id % ncpu;
    let ok = set_affinity(cpu);
    if ok {
        log::debug!("Worker {id} pinned to CPU {cpu}");
    } else {
        log::warn!("Failed to pin worker {id} to CPU {cpu}; continuing unpinned");
    }
    ok
}

#[cfg(target_os = "linux")]
fn set_affinity(cpu: usize) -> bool {
    // SAFETY: cpu_set_t is plain data; the set is fully initialized before use.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
    }
}

#[cfg(not(target_os = "linux"))]
fn set_affinity(_cpu: usize) -> bool {
    false
}
