//! The fixed-cadence tick driver: one tick per 50 ms of wall time, with
//! drift correction. Overruns are absorbed by moving the schedule forward
//! instead of firing catch-up ticks.

use std::time::{Duration, Instant};

use crate::core::Core;

/// Wall time per tick.
pub const TICK_DURATION: Duration = Duration::from_millis(50);

/// Sleep slack under which the loop stops sleeping and takes the next tick.
const MIN_SLEEP: Duration = Duration::from_micros(10);

/// Runs the tick loop until `keep_running` returns false.
pub fn run_tick_loop(core: &mut Core, mut keep_running: impl FnMut() -> bool) {
    let mut desired_start = Instant::now();

    while keep_running() {
        core.tick_start = desired_start;
        core.tick();

        let mut next_desired = desired_start + TICK_DURATION;
        let now = Instant::now();
        if now > next_desired {
            // Accept the lag rather than compounding it with short ticks.
            log::info!(
                "Tick took too long: {}ms",
                now.duration_since(desired_start).as_millis()
            );
            next_desired = now;
        }

        // Sleep in a loop; a sleep can end early on interruption.
        loop {
            let remaining = next_desired.saturating_duration_since(Instant::now());
            if remaining < MIN_SLEEP {
                break;
            }
            std::thread::sleep(remaining);
        }
        desired_start = next_desired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::map::ChunkMap;
    use crate::task::TaskQueue;

    #[test]
    fn loop_holds_cadence_and_stops() {
        let tasks = TaskQueue::start(1);
        let map = ChunkMap::new(
            tasks.clone(),
            std::env::temp_dir().join("ember-tick-test-world"),
        );
        let mut core = Core::new(map, tasks, 10);

        let mut ticks = 0;
        let start = Instant::now();
        run_tick_loop(&mut core, || {
            ticks += 1;
            ticks <= 4
        });
        // Four full ticks plus slack; generous bounds to stay robust on
        // loaded machines.
        assert!(start.elapsed() >= Duration::from_millis(150));
        assert_eq!(core.world.current_tick, 10 + 4);
    }
}
