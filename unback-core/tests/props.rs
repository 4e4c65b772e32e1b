use std::path::{Path, PathBuf};

use proptest::prelude::*;

use unback_core::plan::{self, PlannedAction};
use unback_core::record::FileAttributes;
use unback_core::timestamp::DosTimestamp;
use unback_core::volume::RestoreMode;

const CHUNK: u32 = 10;

/// A well-formed k-fragment run for one destination, last fragment final.
fn fragment_run(dest: &str, k: usize) -> Vec<PlannedAction> {
    (1..=k)
        .map(|i| PlannedAction {
            control: PathBuf::from("CONTROL.001"),
            payload: PathBuf::from("BACKUP.001"),
            offset: 0,
            length: CHUNK,
            fragment: i as u16,
            complete: i == k,
            final_size: CHUNK * k as u32,
            destination: PathBuf::from(dest),
            attributes: FileAttributes::empty(),
            stamp: DosTimestamp::decode([0; 4]),
        })
        .collect()
}

/// Clean pass: no fatal error and no incomplete-file warnings.
fn clean(actions: &[PlannedAction]) -> bool {
    plan::validate(actions, RestoreMode::FullSet, false, Path::new("no-such-root"))
        .map(|report| report.warnings.is_empty())
        .unwrap_or(false)
}

proptest! {
    #[test]
    fn contiguous_runs_validate(k in 1usize..=8) {
        prop_assert!(clean(&fragment_run("BIG.DAT", k)));
    }

    #[test]
    fn any_fragment_bump_is_rejected(k in 2usize..=8, p in 0usize..8, delta in 1u16..=3) {
        let p = p % k;
        let mut actions = fragment_run("BIG.DAT", k);
        actions[p].fragment += delta;
        prop_assert!(!clean(&actions));
    }

    #[test]
    fn any_swap_is_rejected(k in 2usize..=8, i in 0usize..8, j in 0usize..8) {
        let i = i % k;
        let j = j % k;
        prop_assume!(i != j);
        let mut actions = fragment_run("BIG.DAT", k);
        actions.swap(i, j);
        prop_assert!(!clean(&actions));
    }

    #[test]
    fn any_dropped_fragment_is_rejected(k in 2usize..=8, p in 0usize..8) {
        let p = p % k;
        let mut actions = fragment_run("BIG.DAT", k);
        actions.remove(p);
        prop_assert!(!clean(&actions));
    }

    #[test]
    fn timestamp_decode_is_total(raw in any::<[u8; 4]>()) {
        let ts = DosTimestamp::decode(raw);
        prop_assert!(ts.seconds2 <= 31);
        prop_assert!(ts.minutes <= 63);
        prop_assert!(ts.hours <= 31);
        prop_assert!(ts.day <= 31);
        prop_assert!(ts.month <= 15);
        prop_assert!((1980..=2107).contains(&ts.year));
        // Rendering and conversion are total too.
        let _ = ts.to_string();
        let _ = ts.to_system_time();
    }
}
