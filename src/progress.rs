use std::time::{Duration, Instant};

/// Wall-clock time per pipeline stage
pub struct StageClock {
    start: Instant,
    last: Instant,
    stages: Vec<(&'static str, Duration)>,
}

impl StageClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            stages: Vec::new(),
        }
    }

    /// Close the current stage and return its duration
    pub fn lap(&mut self, stage: &'static str) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.last;
        self.last = now;
        self.stages.push((stage, elapsed));
        elapsed
    }

    pub fn stages(&self) -> &[(&'static str, Duration)] {
        &self.stages
    }

    pub fn total(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for StageClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Format time as "xx h xx m xx.xxx s" format
pub fn format_time_used(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs_f64();
    let hours = (total_secs / 3600.0) as u64;
    let minutes = ((total_secs % 3600.0) / 60.0) as u64;
    let seconds = total_secs % 60.0;

    if hours > 0 {
        format!("[Time used] {:02} h {:02} m {:05.3} s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("[Time used] {:02} m {:05.3} s", minutes, seconds)
    } else {
        format!("[Time used] {:05.3} s", seconds)
    }
}
