//! Property-based tests for buffer and dispatch invariants.

use canbus::{AddressTable, CanError, CanFrame, Canbus, SimBus};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn incoming_set() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::hash_set(0u32..0x7FF, 1..8).prop_map(|s| s.into_iter().collect())
}

proptest! {
    #[test]
    fn test_received_frame_is_readable_and_dispatched_once(
        addresses in incoming_set(),
        pick in any::<prop::sample::Index>(),
        data in any::<[u8; 8]>(),
        locked in any::<bool>(),
    ) {
        let mut builder = AddressTable::builder();
        for &a in &addresses {
            builder = builder.incoming(a, "");
        }
        let sim = SimBus::new();
        let canbus = Canbus::new(builder.build().unwrap(), sim.attach());
        canbus.setup().unwrap();

        let target = addresses[pick.index(addresses.len())];
        let calls = Arc::new(Mutex::new(Vec::new()));
        for &a in &addresses {
            let calls = Arc::clone(&calls);
            canbus.add_callback(a, move |address, payload| {
                calls.lock().unwrap().push((address, *payload));
            }).unwrap();
        }
        canbus.get_buffer(target).unwrap().set_semaphore(locked);

        sim.inject(CanFrame::new(target, data));
        canbus.update();

        prop_assert_eq!(canbus.get_data(target), Ok(data));
        let calls = calls.lock().unwrap();
        if locked {
            prop_assert!(calls.is_empty());
        } else {
            prop_assert_eq!(calls.as_slice(), &[(target, data)]);
        }
    }

    #[test]
    fn test_unknown_addresses_never_dispatch(
        addresses in incoming_set(),
        strangers in prop::collection::vec(0u32..0x7FF, 1..16),
    ) {
        let known: HashSet<u32> = addresses.iter().copied().collect();
        let mut builder = AddressTable::builder();
        for &a in &addresses {
            builder = builder.incoming(a, "");
        }
        let sim = SimBus::new();
        let canbus = Canbus::new(builder.build().unwrap(), sim.attach_unfiltered());
        canbus.setup().unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        for &a in &addresses {
            let hits = Arc::clone(&hits);
            canbus.add_callback(a, move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            }).unwrap();
        }

        let mut unknown = 0;
        for &s in strangers.iter().filter(|s| !known.contains(s)) {
            sim.inject(CanFrame::new(s, [0xEE; 8]));
            prop_assert_eq!(canbus.get_data(s), Err(CanError::UnknownAddress(s)));
            unknown += 1;
        }
        canbus.update();

        prop_assert_eq!(hits.load(Ordering::SeqCst), 0);
        prop_assert_eq!(canbus.stats().discarded, unknown);
        for &a in &addresses {
            prop_assert_eq!(canbus.get_data(a), Ok([0; 8]));
        }
    }
}
