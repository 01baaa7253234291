use std::{
    fmt::Display,
    io::{stdout, Write},
    time::Instant,
};

use super::metrics::MetricSummary;

/// Colour of numbers in progress output.
pub const NUM_CS: i32 = 36;

pub fn ansi<T: Display, U: Display>(x: T, y: U) -> String {
    format!("\x1b[{y}m{x}\x1b[0m")
}

pub fn report_epoch_start(epoch: usize, lr: f32) {
    println!("{} {} | LR {}", ansi("Epoch", "34;1"), ansi(epoch, NUM_CS), ansi(lr, NUM_CS));
}

pub fn report_epoch_progress(epoch: usize, batches: usize, finished_batches: usize, epoch_timer: &Instant, positions: usize, running_loss: f32) {
    let epoch_time = epoch_timer.elapsed().as_secs_f32();
    let pct = finished_batches as f32 / batches as f32;
    let pos_per_sec = positions as f32 / epoch_time;

    let seconds = epoch_time / pct - epoch_time;

    print!(
        "epoch {} [{}% ({}/{} batches, {} pos/sec, running loss {})]\n\
        Estimated time to end of epoch: {}s     \x1b[F",
        ansi(epoch, NUM_CS),
        ansi(format!("{:.1}", pct * 100.0), 35),
        ansi(finished_batches, NUM_CS),
        ansi(batches, NUM_CS),
        ansi(format!("{pos_per_sec:.0}"), NUM_CS),
        ansi(format!("{running_loss:.6}"), NUM_CS),
        ansi(format!("{seconds:.1}"), NUM_CS),
    );
    let _ = stdout().flush();
}

pub fn report_epoch_finished(epoch: usize, train_loss: f32, test: Option<&MetricSummary>, epoch_time: f32, total_time: f32, positions: usize) {
    let pos_per_sec = positions as f32 / epoch_time;

    println!(
        "epoch {} | time {}s | train loss {} | {} pos/sec | total time {}s",
        ansi(epoch, NUM_CS),
        ansi(format!("{epoch_time:.1}"), NUM_CS),
        ansi(format!("{train_loss:.6}"), NUM_CS),
        ansi(format!("{pos_per_sec:.0}"), NUM_CS),
        ansi(format!("{total_time:.1}"), NUM_CS),
    );

    if let Some(test) = test {
        println!(
            "epoch {} | test loss {} | test accuracy {}",
            ansi(epoch, NUM_CS),
            ansi(format!("{:.6}", test.loss), NUM_CS),
            ansi(format!("{:.4}", test.accuracy), NUM_CS),
        );
    }
}

pub fn report_time_left(start_epoch: usize, end_epoch: usize, epoch: usize, total_time: f32) {
    let finished = epoch - start_epoch + 1;
    let total = end_epoch - start_epoch;
    let pct = finished as f32 / total as f32;
    let time_left = total_time / pct - total_time;

    let (hours, minutes, seconds) = seconds_to_hms(time_left as u32);

    println!(
        "Estimated time remaining in training: {}h {}m {}s",
        ansi(hours, NUM_CS),
        ansi(minutes, NUM_CS),
        ansi(seconds, NUM_CS),
    );
}

pub fn seconds_to_hms(mut seconds: u32) -> (u32, u32, u32) {
    let mut minutes = seconds / 60;
    let hours = minutes / 60;
    seconds -= minutes * 60;
    minutes -= hours * 60;

    (hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hms() {
        assert_eq!(seconds_to_hms(0), (0, 0, 0));
        assert_eq!(seconds_to_hms(59), (0, 0, 59));
        assert_eq!(seconds_to_hms(3600 + 2 * 60 + 5), (1, 2, 5));
    }

    #[test]
    fn ansi_wraps_value() {
        assert_eq!(ansi(5, 31), "\x1b[31m5\x1b[0m");
    }

    #[test]
    fn numbers_reset_after_value() {
        assert_eq!(ansi(0.5, NUM_CS), "\x1b[36m0.5\x1b[0m");
    }
}
