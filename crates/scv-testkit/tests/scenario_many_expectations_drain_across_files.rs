use std::sync::Arc;

use scv_testkit::*;
use scv_types::{ConsensusTimestamp, SidecarRecord};

const N: i64 = 24;

fn actual(i: i64) -> SidecarRecord {
    SidecarRecord::actions(
        ConsensusTimestamp::new(1_700_000_000 + i, 0),
        vec![call_action(1001, 1002, 50_000, 21_000 + i as u64, &[0xa9], &[0x01])],
    )
}

async fn drain_across_files(writer: SidecarDirWriter) {
    let watcher = Arc::new(writer.watcher(fast_timing(5_000)).unwrap());

    // Register from several threads at once.
    std::thread::scope(|s| {
        for t in 0..4 {
            let watcher = Arc::clone(&watcher);
            s.spawn(move || {
                for i in (t..N).step_by(4) {
                    watcher.add_expected_sidecar(format!("scenario-{t}"), actual(i));
                }
            });
        }
    });

    writer.emit(&[actual(0), actual(1)]).unwrap();

    // Remaining actuals in four files, written out of timestamp order.
    let mut rest: Vec<i64> = (2..N).rev().collect();
    rest.rotate_left(5);
    for chunk in rest.chunks(6) {
        let records: Vec<_> = chunk.iter().map(|i| actual(*i)).collect();
        writer
            .write_complete(&format!("batch-{}", chunk[0]), &records)
            .unwrap();
    }

    let report = watcher.assert_expectations().await.unwrap();
    assert_eq!(report.matched, N as usize);
    assert!(watcher.there_are_no_mismatched_sidecars());
    assert!(watcher.there_are_no_pending_sidecars());
    assert_eq!(watcher.files_processed(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_suffix_convention_drains_without_mismatch() {
    drain_across_files(SidecarDirWriter::with_suffix().unwrap()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_marker_convention_drains_without_mismatch() {
    drain_across_files(SidecarDirWriter::with_marker().unwrap()).await;
}
