//! Cross-tree nearest-neighbor merge.
//!
//! Both trees already yield their own nondecreasing distance streams; this
//! module interleaves them into one. Each tree runs on its own producer
//! thread and parks after every yielded element until the consumer has
//! drained it, so a producer is never more than one element ahead. The
//! consumer pops whichever queue head is closer, which keeps the merged
//! stream sorted and memory bounded even when the caller stops early.

use std::collections::VecDeque;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::geom::Item;
use crate::rtree::RTree;

const SIDE_2D: usize = 0;
const SIDE_3D: usize = 1;

#[derive(Default)]
struct MergeState {
    queues: [VecDeque<(Item, f64)>; 2],
    done: [bool; 2],
    exit: bool,
}

struct Rendezvous {
    state: Mutex<MergeState>,
    ready: Condvar,
}

impl Rendezvous {
    /// Producer side: enqueue one element, then park until the consumer
    /// drains it. Returns `false` once the consumer has signaled exit,
    /// which unwinds the producer's tree traversal.
    fn produce(&self, side: usize, item: &Item, dist: f64) -> bool {
        let mut st = self.state.lock();
        if st.exit {
            return false;
        }
        st.queues[side].push_back((item.clone(), dist));
        debug_assert!(
            st.queues[side].len() == 1,
            "producer ran ahead of the consumer"
        );
        self.ready.notify_all();
        while !st.exit && !st.queues[side].is_empty() {
            self.ready.wait(&mut st);
        }
        !st.exit
    }

    fn finish(&self, side: usize) {
        let mut st = self.state.lock();
        st.done[side] = true;
        self.ready.notify_all();
    }
}

/// Which queue head may be delivered next, if any.
///
/// A head may be delivered alone only once the other producer is done and
/// drained; otherwise its next element could still undercut this one. With
/// both heads present the smaller distance wins, ties going to the 3D
/// stream.
fn next_side(st: &MergeState) -> Option<usize> {
    let head2 = st.queues[SIDE_2D].front().map(|&(_, dist)| dist);
    let head3 = st.queues[SIDE_3D].front().map(|&(_, dist)| dist);
    match (head2, head3) {
        (Some(d2), Some(d3)) => Some(if d2 < d3 { SIDE_2D } else { SIDE_3D }),
        (Some(_), None) if st.done[SIDE_3D] => Some(SIDE_2D),
        (None, Some(_)) if st.done[SIDE_2D] => Some(SIDE_3D),
        _ => None,
    }
}

/// Merge the nearest-neighbor streams of both trees into one nondecreasing
/// stream delivered through `cb` on the calling thread. Returns only after
/// both producers have terminated; `false` means the callback stopped the
/// stream.
pub(super) fn knn_merged(
    tree2: &RTree<2>,
    tree3: &RTree<3>,
    pos: [f64; 3],
    mut cb: impl FnMut(&Item, f64) -> bool,
) -> bool {
    let rv = Rendezvous {
        state: Mutex::new(MergeState::default()),
        ready: Condvar::new(),
    };
    let mut stopped = false;

    thread::scope(|s| {
        s.spawn(|| {
            tree2.knn([pos[0], pos[1]], |item, dist| rv.produce(SIDE_2D, item, dist));
            rv.finish(SIDE_2D);
        });
        s.spawn(|| {
            tree3.knn(pos, |item, dist| rv.produce(SIDE_3D, item, dist));
            rv.finish(SIDE_3D);
        });

        let mut st = rv.state.lock();
        loop {
            while let Some(side) = next_side(&st) {
                let Some((item, dist)) = st.queues[side].pop_front() else {
                    break;
                };
                // wake the producer that just got drained
                rv.ready.notify_all();
                if !cb(&item, dist) {
                    st.exit = true;
                    rv.ready.notify_all();
                    stopped = true;
                    break;
                }
            }
            if stopped || (st.done[SIDE_2D] && st.done[SIDE_3D] && next_side(&st).is_none()) {
                break;
            }
            rv.ready.wait(&mut st);
        }
    });

    !stopped
}
