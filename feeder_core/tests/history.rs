use feeder_core::mocks::{RecordingMotor, ScriptedSensor};
use feeder_core::persistence::read_history_file;
use feeder_core::{
    FeedEvent, FeedRequest, Feeder, FeedingPersistence, FeedingStore, FilePersistence,
    HistoryCfg, MemoryPersistence, PersistedFeedings,
};
use feeder_traits::ManualClock;
use rstest::rstest;
use tempfile::tempdir;

#[rstest]
fn wraps_and_overwrites_oldest() {
    let mut store = FeedingStore::new(3);
    for i in 1..=4u64 {
        store.add_feeding(FeedEvent::new(i * 100, 1));
    }
    // Fourth record landed in slot 0, replacing the first.
    assert_eq!(store.feedings()[0], FeedEvent::new(400, 1));
    assert_eq!(store.cursor(), 1);
    assert_eq!(store.written(), 3);
    let as_ofs: Vec<u64> = store
        .sorted_by_as_of()
        .iter()
        .map(|e| e.as_of_adjusted_sec)
        .collect();
    assert_eq!(as_ofs, vec![400, 300, 200]);
}

#[rstest]
fn sorted_view_skips_unwritten_and_leaves_store_alone() {
    let mut store = FeedingStore::new(5);
    store.add_feeding(FeedEvent::new(50, 2));
    store.add_feeding(FeedEvent::new(900, 1));
    store.add_feeding(FeedEvent::new(70, 3));
    let before = store.feedings().to_vec();

    let sorted = store.sorted_by_as_of();
    assert_eq!(
        sorted,
        vec![
            FeedEvent::new(900, 1),
            FeedEvent::new(70, 3),
            FeedEvent::new(50, 2)
        ]
    );
    assert_eq!(store.feedings(), before.as_slice());
}

#[rstest]
fn empty_store_sorts_to_nothing() {
    assert!(FeedingStore::new(4).sorted_by_as_of().is_empty());
}

#[rstest]
#[case(2, 2)]
#[case(4, 0)]
#[case(usize::MAX, 0)]
fn restore_resets_out_of_range_cursor(#[case] cursor: usize, #[case] expected: usize) {
    let mut store = FeedingStore::new(4);
    store.restore(&PersistedFeedings {
        cursor,
        slots: vec![FeedEvent::new(1, 1), FeedEvent::new(2, 1)],
    });
    assert_eq!(store.cursor(), expected);
    assert_eq!(store.written(), 2);
    assert_eq!(store.capacity(), 4);
}

#[rstest]
fn restore_truncates_larger_image() {
    let mut store = FeedingStore::new(2);
    store.restore(&PersistedFeedings {
        cursor: 1,
        slots: vec![
            FeedEvent::new(1, 1),
            FeedEvent::new(2, 1),
            FeedEvent::new(3, 1),
        ],
    });
    assert_eq!(store.feedings(), &[FeedEvent::new(1, 1), FeedEvent::new(2, 1)]);
}

#[rstest]
fn memory_backend_round_trips_slots_and_cursor() {
    let mut backend = MemoryPersistence::new();
    assert_eq!(backend.load(3).unwrap(), PersistedFeedings::empty(3));

    let mut store = FeedingStore::new(3);
    for as_of in [10, 20, 30, 40] {
        let event = FeedEvent::new(as_of, 2);
        let idx = store.add_feeding(event);
        backend.store(idx, &event, store.cursor()).unwrap();
    }

    let mut restored = FeedingStore::new(3);
    restored.restore(&backend.load(3).unwrap());
    assert_eq!(restored.feedings(), store.feedings());
    assert_eq!(restored.cursor(), store.cursor());
}

#[rstest]
fn file_backend_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state").join("history.toml");

    let mut first = FilePersistence::new(&path);
    let image = first.load(4).unwrap();
    assert_eq!(image, PersistedFeedings::empty(4));
    assert!(!path.exists());

    first.store(0, &FeedEvent::new(1000, 3), 1).unwrap();
    first.store(1, &FeedEvent::new(2000, 2), 2).unwrap();
    assert!(path.exists());

    // A fresh backend (new boot) sees both slots and the cursor.
    let mut second = FilePersistence::new(&path);
    let image = second.load(4).unwrap();
    assert_eq!(image.cursor, 2);
    assert_eq!(image.slots[0], FeedEvent::new(1000, 3));
    assert_eq!(image.slots[1], FeedEvent::new(2000, 2));
    assert_eq!(image.slots[2], FeedEvent::default());
    assert_eq!(read_history_file(&path).unwrap(), image);
}

#[rstest]
fn corrupt_history_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.toml");
    std::fs::write(&path, "cursor = \"nope\"").unwrap();
    let err = FilePersistence::new(&path).load(4).expect_err("corrupt");
    assert!(err.to_string().contains("parse history"));
}

#[rstest]
fn unreadable_history_file_is_never_overwritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.toml");

    let mut backend = FilePersistence::new(&path);
    backend.load(4).unwrap();
    for (i, as_of) in [100u64, 101, 102].into_iter().enumerate() {
        backend.store(i, &FeedEvent::new(as_of, 1), i + 1).unwrap();
    }
    let good = std::fs::read_to_string(&path).unwrap();
    let damaged = good.replace("cursor = 3", "cursor = \"3\"");
    assert_ne!(good, damaged);
    std::fs::write(&path, &damaged).unwrap();

    let mut feeder = Feeder::builder()
        .with_sensor(ScriptedSensor::new(true))
        .with_motor(RecordingMotor::new())
        .with_history(HistoryCfg { capacity: 4 })
        .with_clock(Box::new(ManualClock::new()))
        .with_persistence(FilePersistence::new(&path))
        .build()
        .expect("an unreadable history does not block startup");
    assert_eq!(feeder.history().written(), 0);

    feeder
        .trigger_feed(FeedRequest::new(1000, 1000, 1))
        .expect("feed proceeds with in-memory history");
    assert_eq!(feeder.history().latest(), Some(FeedEvent::new(1000, 1)));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), damaged);
}

#[rstest]
fn file_backend_stores_again_after_a_good_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.toml");
    std::fs::write(&path, "cursor = \"nope\"").unwrap();

    let mut backend = FilePersistence::new(&path);
    assert!(backend.load(4).is_err());
    let err = backend
        .store(0, &FeedEvent::new(1, 1), 1)
        .expect_err("refuses to replace an unreadable file");
    assert!(err.to_string().contains("could not be read"));

    std::fs::remove_file(&path).unwrap();
    backend.load(4).unwrap();
    backend.store(0, &FeedEvent::new(1, 1), 1).unwrap();
    assert_eq!(read_history_file(&path).unwrap().cursor, 1);
}
