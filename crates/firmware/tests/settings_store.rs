//! Settings store integration tests
//!
//! Exercise the public store API on `MockFlash`: the documented usage
//! scenarios, reboots and simulated power loss at every flash operation.

use delta_control_firmware::core::settings::{
    Region, RegionId, RegionLayout, SettingsStore, StorageError, DEFAULT_LAYOUT,
};
use delta_control_firmware::platform::mock::MockFlash;
use delta_control_firmware::platform::FlashInterface;

/// Three 12-byte entries per region
const TINY: RegionLayout = RegionLayout::new(Region::new(0, 48), Region::new(48, 48));

/// Four 12-byte entries per region
const SMALL: RegionLayout = RegionLayout::new(Region::new(0, 64), Region::new(64, 64));

fn boot(flash: MockFlash, layout: RegionLayout) -> SettingsStore<MockFlash> {
    let mut store = SettingsStore::new(flash, layout);
    store.init().expect("boot failed");
    store
}

fn value(store: &mut SettingsStore<MockFlash>, key: u16) -> Option<Vec<u8>> {
    let len = store.stored_len(key).expect("lookup failed")?;
    let mut buf = vec![0u8; len];
    assert_eq!(store.fetch(key, &mut buf), len);
    Some(buf)
}

/// Simulate a reset: keep the media, drop all RAM state
fn reboot(store: SettingsStore<MockFlash>, layout: RegionLayout) -> SettingsStore<MockFlash> {
    let mut flash = store.into_flash();
    flash.restore_power();
    boot(flash, layout)
}

#[test]
fn test_three_entry_scenario() {
    let mut store = boot(MockFlash::with_geometry(128, 16), TINY);

    store.upsert(1, b"A").unwrap();
    store.upsert(2, b"BB").unwrap();
    store.upsert(1, b"C").unwrap();

    assert_eq!(value(&mut store, 1).as_deref(), Some(&b"C"[..]));
    assert_eq!(value(&mut store, 2).as_deref(), Some(&b"BB"[..]));
    assert_eq!(store.fetch(3, &mut [0u8; 8]), 0);
}

#[test]
fn test_duplicate_upsert_appends_once() {
    let mut store = boot(MockFlash::with_geometry(128, 16), TINY);

    store.upsert(5, b"same").unwrap();
    let cursor = store.append_cursor();
    let programs = store.flash().program_count();

    store.upsert(5, b"same").unwrap();

    assert_eq!(store.append_cursor(), cursor);
    assert_eq!(store.flash().program_count(), programs);
    assert_eq!(store.stats().appends, 1);
}

#[test]
fn test_values_survive_many_migrations() {
    let mut store = boot(MockFlash::with_geometry(128, 16), SMALL);

    for round in 0u8..40 {
        store.upsert(1, &[round]).unwrap();
        store.upsert(2, &[round, round]).unwrap();
    }

    let stats = store.stats();
    assert!(stats.migrations >= 10);
    // Wear is spread across both regions
    assert!(stats.erase_counts[0] >= 5 && stats.erase_counts[1] >= 5);

    assert_eq!(value(&mut store, 1), Some(vec![39]));
    assert_eq!(value(&mut store, 2), Some(vec![39, 39]));

    let mut store = reboot(store, SMALL);
    assert_eq!(value(&mut store, 1), Some(vec![39]));
    assert_eq!(value(&mut store, 2), Some(vec![39, 39]));
}

#[test]
fn test_capacity_exhausted_is_fatal_but_preserves_data() {
    let mut store = boot(MockFlash::with_geometry(128, 16), TINY);

    store.upsert(1, b"aaaa").unwrap();
    store.upsert(2, b"bbbb").unwrap();
    store.upsert(3, b"cccc").unwrap();

    // Live set (36 bytes) plus a fourth entry exceeds the 40-byte spare
    let result = store.upsert(4, b"dddd");
    assert_eq!(
        result,
        Err(StorageError::CapacityExhausted {
            required: 48,
            available: 40
        })
    );
    assert!(store.is_faulted());

    let mut store = reboot(store, TINY);
    assert_eq!(value(&mut store, 1).as_deref(), Some(&b"aaaa"[..]));
    assert_eq!(value(&mut store, 3).as_deref(), Some(&b"cccc"[..]));
    assert_eq!(value(&mut store, 4), None);
}

#[test]
fn test_default_layout_on_pico_geometry() {
    let mut store = boot(MockFlash::new(), DEFAULT_LAYOUT);

    assert_eq!(store.active_region(), Some(RegionId::A));
    assert_eq!(store.append_cursor(), Some(0x040004));

    let calibration = [0x12u8, 0x34, 0x56, 0x78, 0x9A];
    store.upsert(0x0100, &calibration).unwrap();

    let mut store = reboot(store, DEFAULT_LAYOUT);
    assert_eq!(value(&mut store, 0x0100).as_deref(), Some(&calibration[..]));
}

#[test]
fn test_corrupted_region_overrun_reported_at_boot() {
    let mut store = boot(MockFlash::with_geometry(128, 16), TINY);
    store.upsert(1, b"A").unwrap();
    let mut flash = store.into_flash();

    // Header claiming a payload longer than the region
    flash.poke_word(16, 0x0100_0002);

    let mut store = SettingsStore::new(flash, TINY);
    assert_eq!(store.init(), Err(StorageError::RegionOverrun { base: 0 }));
    assert!(store.is_faulted());
}

#[test]
fn test_garbled_successor_reported_at_boot() {
    let mut store = boot(MockFlash::with_geometry(128, 16), TINY);
    store.upsert(1, b"A").unwrap();
    store.upsert(2, b"BB").unwrap();
    let mut flash = store.into_flash();

    // Bit rot in key 1's successor word
    flash.inject_corruption(8, 4);

    let mut store = SettingsStore::new(flash, TINY);
    assert_eq!(
        store.init(),
        Err(StorageError::OutOfBounds {
            address: 0xAAAA_AAAA
        })
    );
    assert!(store.is_faulted());
    assert_eq!(store.upsert(2, b"CC"), Err(StorageError::Faulted));
}

#[test]
fn test_migration_with_hundreds_of_keys() {
    let mut store = boot(MockFlash::new(), DEFAULT_LAYOUT);

    for key in 0u16..200 {
        store.upsert(key, &key.to_le_bytes()).unwrap();
    }

    // Churn key 0 until the region fills and compacts
    let mut round = 0u16;
    while store.stats().migrations == 0 {
        round += 1;
        store.upsert(0, &round.to_le_bytes()).unwrap();
        assert!(round < 1000, "region never filled");
    }

    assert!(!store.is_faulted());
    assert_eq!(store.active_region(), Some(RegionId::B));
    assert_eq!(value(&mut store, 0), Some(round.to_le_bytes().to_vec()));
    for key in 1u16..200 {
        assert_eq!(value(&mut store, key), Some(key.to_le_bytes().to_vec()));
    }

    let mut store = reboot(store, DEFAULT_LAYOUT);
    assert_eq!(value(&mut store, 150), Some(150u16.to_le_bytes().to_vec()));
}

#[test]
fn test_boot_repair_with_hundreds_of_keys() {
    let mut store = boot(MockFlash::new(), DEFAULT_LAYOUT);
    for key in 0u16..150 {
        store.upsert(key, &key.to_le_bytes()).unwrap();
    }
    let cursor = store.append_cursor().unwrap();

    // Torn payload word past the last committed entry
    store.flash_mut().program_word(cursor + 8, 0x6161_6161).unwrap();

    let mut store = reboot(store, DEFAULT_LAYOUT);
    assert_eq!(store.stats().repairs, 1);
    assert_eq!(store.active_region(), Some(RegionId::B));
    for key in 0u16..150 {
        assert_eq!(value(&mut store, key), Some(key.to_le_bytes().to_vec()));
    }

    // Repaired media keeps booting
    let mut store = reboot(store, DEFAULT_LAYOUT);
    assert_eq!(store.stats().repairs, 0);
    assert_eq!(value(&mut store, 149), Some(149u16.to_le_bytes().to_vec()));
}

/// Run `operation` with power cut after every possible number of flash
/// operations, reboot, and hand the recovered store to `check` together
/// with whether the operation completed.
fn power_loss_sweep(
    layout: RegionLayout,
    prepare: impl Fn(&mut SettingsStore<MockFlash>),
    operation: impl Fn(&mut SettingsStore<MockFlash>) -> Result<(), StorageError>,
    check: impl Fn(&mut SettingsStore<MockFlash>, bool),
) {
    let mut baseline = boot(MockFlash::with_geometry(128, 16), layout);
    prepare(&mut baseline);
    let baseline = baseline.into_flash();

    for budget in 0.. {
        let mut store = boot(baseline.clone(), layout);
        store.flash_mut().cut_power_after(budget);

        let completed = operation(&mut store).is_ok();

        let mut store = reboot(store, layout);
        check(&mut store, completed);

        // The store stays usable after recovery
        store.upsert(9, b"post").unwrap();
        assert_eq!(value(&mut store, 9).as_deref(), Some(&b"post"[..]));

        if completed {
            break;
        }
        assert!(budget < 64, "operation never completed");
    }
}

#[test]
fn test_power_loss_during_replace() {
    power_loss_sweep(
        SMALL,
        |store| {
            store.upsert(1, b"old!").unwrap();
            store.upsert(2, b"xy").unwrap();
        },
        |store| store.upsert(1, b"new value"),
        |store, completed| {
            let v1 = value(store, 1).expect("key 1 lost");
            if completed {
                assert_eq!(v1, b"new value");
            } else {
                assert!(v1 == b"old!" || v1 == b"new value", "torn value {:?}", v1);
            }
            assert_eq!(value(store, 2).as_deref(), Some(&b"xy"[..]));
        },
    );
}

#[test]
fn test_power_loss_during_migration() {
    power_loss_sweep(
        SMALL,
        |store| {
            store.upsert(1, b"aaaa").unwrap();
            store.upsert(2, b"bbbb").unwrap();
            store.upsert(1, b"cccc").unwrap();
            store.upsert(2, b"dddd").unwrap();
        },
        // Region full: migrate, then link the copied key 1 to the new value
        |store| store.upsert(1, b"eeee"),
        |store, completed| {
            let v1 = value(store, 1).expect("key 1 lost");
            if completed {
                assert_eq!(v1, b"eeee");
            } else {
                assert!(v1 == b"cccc" || v1 == b"eeee", "torn value {:?}", v1);
            }
            assert_eq!(value(store, 2).as_deref(), Some(&b"dddd"[..]));
        },
    );
}

#[test]
fn test_power_loss_during_new_key_after_migration() {
    power_loss_sweep(
        SMALL,
        |store| {
            store.upsert(1, b"aaaa").unwrap();
            store.upsert(1, b"bbbb").unwrap();
            store.upsert(1, b"cccc").unwrap();
            store.upsert(2, b"dddd").unwrap();
        },
        |store| store.upsert(3, b"eeeeeeee"),
        |store, completed| {
            match value(store, 3) {
                Some(v3) => assert_eq!(v3, b"eeeeeeee"),
                None => assert!(!completed),
            }
            assert_eq!(value(store, 1).as_deref(), Some(&b"cccc"[..]));
            assert_eq!(value(store, 2).as_deref(), Some(&b"dddd"[..]));
        },
    );
}

#[test]
fn test_interrupted_payload_is_ignored() {
    let mut store = boot(MockFlash::with_geometry(128, 16), SMALL);
    store.upsert(1, b"first").unwrap();
    let cursor = store.append_cursor().unwrap();

    // Stream truncated mid-entry: payload words programmed, info word never
    let flash = store.flash_mut();
    flash.program_word(cursor + 8, 0x6161_6161).unwrap();

    let mut store = reboot(store, SMALL);
    let stats = store.stats();
    assert_eq!(stats.repairs, 1);
    assert_eq!(value(&mut store, 1).as_deref(), Some(&b"first"[..]));
}
