#[allow(unused_imports)]
use similar_asserts::assert_eq;

mod common;

use cnx_sync::sync::{Lockable, SharedLockable, TimedLockable};
use cnx_sync::{
    current_thread_id, Mutex, MutexInterface, MutexKind, RecursiveMutex, RecursiveTimedMutex,
    SharedMutex, SharedMutexInterface, SharedTimedMutex, ThreadId, TimedMutex,
};
use std::thread;
use std::time::Duration;

fn lock_twice_from_another_thread(m: &(dyn Lockable + Sync)) -> bool {
    m.lock();
    let second = thread::scope(|s| s.spawn(|| m.try_lock()).join().unwrap());
    if second {
        m.unlock();
    }
    m.unlock();
    second
}

#[test]
fn capability_traits_are_object_safe() {
    let lockables: [&(dyn Lockable + Sync); 6] = [
        &Mutex::new(),
        &RecursiveMutex::new(),
        &TimedMutex::new(),
        &RecursiveTimedMutex::new(),
        &SharedMutex::new(),
        &SharedTimedMutex::new(),
    ];
    for m in lockables {
        assert!(!lock_twice_from_another_thread(m));
    }

    let timed: [&dyn TimedLockable; 3] = [
        &TimedMutex::new(),
        &RecursiveTimedMutex::new(),
        &SharedTimedMutex::new(),
    ];
    for m in timed {
        assert!(m.try_lock_for(Duration::from_millis(1)));
        m.unlock();
    }

    let shared: [&dyn SharedLockable; 2] = [&SharedMutex::new(), &SharedTimedMutex::new()];
    for m in shared {
        m.lock_shared();
        assert!(m.try_lock_shared());
        assert!(!m.try_lock());
        m.unlock_shared();
        m.unlock_shared();
    }
}

#[test]
fn kinds() {
    let (a, b, c) = (Mutex::new(), RecursiveMutex::new(), TimedMutex::new());
    let (d, e, f) = (
        RecursiveTimedMutex::new(),
        SharedMutex::new(),
        SharedTimedMutex::new(),
    );
    let all = [
        MutexInterface::from(&a),
        MutexInterface::from(&b),
        MutexInterface::from(&c),
        MutexInterface::from(&d),
        MutexInterface::from(&e),
        MutexInterface::from(&f),
    ];
    let kinds: Vec<_> = all.iter().map(MutexInterface::kind).collect();
    assert_eq!(
        kinds,
        vec![
            MutexKind::Mutex,
            MutexKind::RecursiveMutex,
            MutexKind::TimedMutex,
            MutexKind::RecursiveTimedMutex,
            MutexKind::SharedMutex,
            MutexKind::SharedTimedMutex,
        ]
    );
    for m in all {
        assert_eq!(m.as_timed().is_some(), m.kind().is_timed());
    }
    assert!(MutexKind::RecursiveTimedMutex.is_recursive());
    assert!(!MutexKind::TimedMutex.is_recursive());
    assert!(MutexKind::SharedTimedMutex.is_shared());
    assert!(!MutexKind::Mutex.is_shared());

    let shared = SharedMutexInterface::from(&f);
    assert!(shared.as_timed().is_some());
    assert_eq!(shared.exclusive(), MutexInterface::from(&f));
    assert_eq!(MutexInterface::from(shared), MutexInterface::from(&f));
    assert!(SharedMutexInterface::from(&e).as_timed().is_none());
}

#[test]
fn current_thread_id_is_gettid() {
    let me = current_thread_id();
    assert_eq!(me.as_raw(), unsafe { libc::gettid() });
    assert!(!me.is_null());

    let other = thread::spawn(|| (current_thread_id(), unsafe { libc::gettid() }))
        .join()
        .unwrap();
    assert_eq!(other.0.as_raw(), other.1);
    assert_ne!(other.0, me);
    assert_eq!(ThreadId::from_raw(me.as_raw()), me);
}
